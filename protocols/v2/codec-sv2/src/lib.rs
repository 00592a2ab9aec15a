//! # Codec Sv2
//!
//! The encrypted framing layer of an Sv2 connection and the state machine
//! that carries a session from handshake to transport.
//!
//! Every transport message is a 22-byte encrypted header (6 plaintext bytes
//! plus the AEAD MAC) followed by the chunked-encrypted payload. The header
//! carries the payload's plaintext length; the receiver decrypts the fixed
//! size header first, then waits for
//! [`noise_sv2::NoiseCodec::encrypted_message_size`] ciphertext bytes and
//! decrypts those. Multiple frames may be pipelined in a single socket read;
//! [`NoiseDecoder`] buffers partial input between reads.

mod decoder;
mod encoder;
pub mod error;

pub use decoder::NoiseDecoder;
pub use encoder::NoiseEncoder;
pub use error::{Error, Result};

pub use framing_sv2::{Header, Sv2Frame};
pub use noise_sv2::{self, Initiator, NoiseCodec, Responder};

/// The role a session plays in the Noise handshake.
#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
pub enum HandshakeRole {
    /// The party that opens the connection and sends message E.
    Initiator(Box<noise_sv2::Initiator>),
    /// The party that listens, replies with message ES and proves its
    /// identity through the certificate.
    Responder(Box<noise_sv2::Responder>),
}

/// Session state of an Sv2 connection.
///
/// `HandShake` carries the handshake material; once the second handshake
/// message has been processed the state moves to `Transport` and only the
/// two directional cipher states survive.
#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
pub enum State {
    /// Handshake in progress.
    HandShake(HandshakeRole),
    /// Encrypted transport, fully operational.
    Transport(NoiseCodec),
}

impl State {
    pub fn initialized(role: HandshakeRole) -> Self {
        Self::HandShake(role)
    }

    pub fn is_in_transport_mode(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Initiator handshake start: produces message E.
    pub fn step_0(&mut self) -> Result<[u8; noise_sv2::ELLSWIFT_ENCODING_SIZE]> {
        match self {
            Self::HandShake(HandshakeRole::Initiator(i)) => i.step_0().map_err(Error::from),
            Self::HandShake(HandshakeRole::Responder(_)) => Err(Error::InvalidStepForResponder),
            _ => Err(Error::NotInHandShakeState),
        }
    }

    /// Responder handshake: consumes message E, produces message ES and the
    /// transport state to transition into.
    pub fn step_1(
        &mut self,
        re_pub: [u8; noise_sv2::ELLSWIFT_ENCODING_SIZE],
    ) -> Result<([u8; noise_sv2::INITIATOR_EXPECTED_HANDSHAKE_MESSAGE_SIZE], Self)> {
        match self {
            Self::HandShake(HandshakeRole::Responder(r)) => {
                let (message, codec) = r.step_1(re_pub)?;
                Ok((message, Self::Transport(codec)))
            }
            Self::HandShake(HandshakeRole::Initiator(_)) => Err(Error::InvalidStepForInitiator),
            _ => Err(Error::NotInHandShakeState),
        }
    }

    /// Initiator handshake completion: consumes message ES, verifies the
    /// certificate and produces the transport state.
    pub fn step_2(
        &mut self,
        message: [u8; noise_sv2::INITIATOR_EXPECTED_HANDSHAKE_MESSAGE_SIZE],
    ) -> Result<Self> {
        match self {
            Self::HandShake(HandshakeRole::Initiator(i)) => {
                i.step_2(message).map(Self::Transport).map_err(Error::from)
            }
            Self::HandShake(HandshakeRole::Responder(_)) => Err(Error::InvalidStepForResponder),
            _ => Err(Error::NotInHandShakeState),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noise_sv2::{Initiator, Responder};
    use secp256k1::{Keypair, Secp256k1, SecretKey};

    fn keypair(fill: u8) -> Keypair {
        let secp = Secp256k1::new();
        Keypair::from_secret_key(&secp, &SecretKey::from_slice(&[fill; 32]).unwrap())
    }

    fn transport_pair() -> (NoiseCodec, NoiseCodec) {
        let authority = keypair(0x21);
        let static_key = keypair(0x22);
        let mut initiator = State::initialized(HandshakeRole::Initiator(Initiator::new(
            authority.x_only_public_key().0,
        )));
        let mut responder = State::initialized(HandshakeRole::Responder(Responder::new(
            authority, static_key, 31449600,
        )));

        let msg_e = initiator.step_0().unwrap();
        let (msg_es, responder) = responder.step_1(msg_e).unwrap();
        let initiator = initiator.step_2(msg_es).unwrap();
        match (initiator, responder) {
            (State::Transport(i), State::Transport(r)) => (i, r),
            _ => panic!("handshake did not reach transport mode"),
        }
    }

    #[test]
    fn handshake_steps_respect_roles() {
        let authority = keypair(0x21);
        let static_key = keypair(0x22);
        let mut responder = State::initialized(HandshakeRole::Responder(Responder::new(
            authority, static_key, 31449600,
        )));
        assert!(matches!(
            responder.step_0(),
            Err(Error::InvalidStepForResponder)
        ));
    }

    #[test]
    fn frame_round_trip_through_codec() {
        let (mut client, mut server) = transport_pair();

        let frame = Sv2Frame::from_message(0x70, vec![1, 0, 0, 0]).unwrap();
        let wire = NoiseEncoder::encode(&frame, &mut client).unwrap();
        // 22 byte header + 4 byte payload + MAC.
        assert_eq!(wire.len(), 22 + 4 + 16);

        let mut decoder = NoiseDecoder::new();
        decoder.feed(&wire);
        let decoded = decoder.next_frame(&mut server).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(decoder.next_frame(&mut server).unwrap().is_none());
    }

    #[test]
    fn pipelined_and_fragmented_frames() {
        let (mut client, mut server) = transport_pair();

        let frame_a = Sv2Frame::from_message(0x73, vec![0xde; 8]).unwrap();
        let frame_b = Sv2Frame::from_message(0x76, vec![0xad; 50]).unwrap();
        let mut wire = NoiseEncoder::encode(&frame_a, &mut client).unwrap();
        wire.extend(NoiseEncoder::encode(&frame_b, &mut client).unwrap());

        // Deliver in awkward fragments: a partial header first, then a
        // partial payload, then the rest.
        let mut decoder = NoiseDecoder::new();
        let mut out = Vec::new();
        decoder.feed(&wire[..10]);
        assert!(decoder.next_frame(&mut server).unwrap().is_none());
        decoder.feed(&wire[10..40]);
        if let Some(frame) = decoder.next_frame(&mut server).unwrap() {
            out.push(frame);
        }
        decoder.feed(&wire[40..]);
        while let Some(frame) = decoder.next_frame(&mut server).unwrap() {
            out.push(frame);
        }
        assert_eq!(out, vec![frame_a, frame_b]);
    }
}
