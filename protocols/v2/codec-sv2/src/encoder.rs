use const_sv2::ENCRYPTED_SV2_FRAME_HEADER_SIZE;
use framing_sv2::Sv2Frame;
use noise_sv2::NoiseCodec;

use crate::error::{Error, Result};

/// Encrypts plaintext Sv2 frames for the wire.
pub struct NoiseEncoder;

impl NoiseEncoder {
    /// Produces the on-wire bytes of `frame`: the AEAD-sealed header
    /// followed by the chunked-and-sealed payload.
    ///
    /// The two seals consume two send nonces; a frame must therefore be
    /// written out exactly once and in order.
    pub fn encode(frame: &Sv2Frame, codec: &mut NoiseCodec) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(
            ENCRYPTED_SV2_FRAME_HEADER_SIZE
                + NoiseCodec::encrypted_message_size(frame.payload.len()),
        );
        codec
            .encrypt_message(&frame.header.to_bytes(), &mut out)
            .map_err(Error::AeadError)?;
        codec
            .encrypt_message(&frame.payload, &mut out)
            .map_err(Error::AeadError)?;
        Ok(out)
    }
}
