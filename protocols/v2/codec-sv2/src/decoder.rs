use const_sv2::ENCRYPTED_SV2_FRAME_HEADER_SIZE;
use framing_sv2::{Header, Sv2Frame};
use noise_sv2::NoiseCodec;

use crate::error::{Error, Result};

/// Incremental decoder for encrypted Sv2 frames.
///
/// Socket reads are fed in as they arrive; [`NoiseDecoder::next_frame`]
/// yields complete frames and leaves partial input buffered. The header is
/// decrypted as soon as its 22 ciphertext bytes are available and kept
/// until the payload completes, since decrypting it advances the receive
/// nonce and cannot be repeated.
#[derive(Debug, Default)]
pub struct NoiseDecoder {
    buf: Vec<u8>,
    pending_header: Option<Header>,
}

impl NoiseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly received ciphertext.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Decrypts and returns the next complete frame, if any.
    ///
    /// Any error is fatal for the session: either authentication failed or
    /// the peer sent a malformed header, and in both cases the receive
    /// nonce can no longer be trusted.
    pub fn next_frame(&mut self, codec: &mut NoiseCodec) -> Result<Option<Sv2Frame>> {
        let header = match self.pending_header {
            Some(header) => header,
            None => {
                if self.buf.len() < ENCRYPTED_SV2_FRAME_HEADER_SIZE {
                    return Ok(None);
                }
                let encrypted_header: Vec<u8> =
                    self.buf.drain(..ENCRYPTED_SV2_FRAME_HEADER_SIZE).collect();
                let mut plain = Vec::new();
                codec
                    .decrypt_message(&encrypted_header, &mut plain)
                    .map_err(Error::AeadError)?;
                let header = Header::from_bytes(&plain)?;
                self.pending_header = Some(header);
                header
            }
        };
        let expanded_size = NoiseCodec::encrypted_message_size(header.len());
        if self.buf.len() < expanded_size {
            return Ok(None);
        }
        let encrypted_payload: Vec<u8> = self.buf.drain(..expanded_size).collect();
        let mut payload = Vec::new();
        codec
            .decrypt_message(&encrypted_payload, &mut payload)
            .map_err(Error::AeadError)?;
        self.pending_header = None;
        Ok(Some(Sv2Frame { header, payload }))
    }
}
