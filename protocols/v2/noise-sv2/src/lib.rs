//! # Noise-SV2
//!
//! Noise protocol handshake and transport encryption between Sv2 roles.
//!
//! The handshake pattern is a modified NX: the responder's static key is
//! transmitted during the handshake in ElligatorSwift encoding and
//! authenticated by a certificate signed with an out-of-band pinned
//! authority key ([`SignatureNoiseMessage`]). The initiator stays anonymous
//! at the Noise layer.
//!
//! - ECDH on secp256k1, using the x-only-from-ElligatorSwift variant.
//! - AEAD with ChaCha20-Poly1305 (an AES-GCM cipher state is carried as a
//!   hardware-optimized alternative).
//! - BIP-340 Schnorr signatures over the certificate.
//!
//! After the two handshake messages both parties hold a [`NoiseCodec`]: two
//! cipher states, one per direction, with independent 64-bit nonces.

use aes_gcm::aead::Buffer;
pub use aes_gcm::aead::Error as AeadError;
use cipher_state::GenericCipher;

mod aed_cipher;
mod cipher_state;
mod error;
mod handshake;
mod initiator;
mod responder;
mod signature_message;
#[cfg(test)]
mod test;

pub use const_sv2::{
    ELLSWIFT_ENCODING_SIZE, INITIATOR_EXPECTED_HANDSHAKE_MESSAGE_SIZE, NOISE_MAX_CHUNK_SIZE,
    RESPONDER_EXPECTED_HANDSHAKE_MESSAGE_SIZE, SIGNATURE_NOISE_MESSAGE_SIZE,
};

// The parity every generated keypair is normalized to, so that x-only key
// reconstruction on the remote side is unambiguous.
const PARITY: secp256k1::Parity = secp256k1::Parity::Even;

/// A codec for the transport phase of a Noise session.
///
/// Produced by [`Initiator::step_2`] or [`Responder::step_1`] once the
/// handshake is complete. Holds one cipher per direction; the initiator
/// sends with the first [`CipherState`](cipher_state::CipherState) of the
/// split and receives with the second, the responder the other way around.
pub struct NoiseCodec {
    // Cipher to encrypt outgoing messages.
    encryptor: GenericCipher,

    // Cipher to decrypt incoming messages.
    decryptor: GenericCipher,
}

impl core::fmt::Debug for NoiseCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NoiseCodec").finish()
    }
}

impl NoiseCodec {
    /// Encrypts a single Noise message (`msg`) in place, appending the
    /// 16-byte MAC. `msg` must not exceed [`NOISE_MAX_CHUNK_SIZE`].
    pub fn encrypt<T: Buffer>(&mut self, msg: &mut T) -> Result<(), AeadError> {
        self.encryptor.encrypt(msg)
    }

    /// Decrypts a single Noise message (`msg`) in place, stripping the MAC.
    pub fn decrypt<T: Buffer>(&mut self, msg: &mut T) -> Result<(), AeadError> {
        self.decryptor.decrypt(msg)
    }

    /// Encrypts an arbitrary-length message, splitting it into
    /// [`NOISE_MAX_CHUNK_SIZE`] chunks that are sealed independently.
    ///
    /// The ciphertext appended to `output` is
    /// [`NoiseCodec::encrypted_message_size`] of the plaintext length.
    pub fn encrypt_message(&mut self, plaintext: &[u8], output: &mut Vec<u8>) -> Result<(), AeadError> {
        self.encryptor.encrypt_message(plaintext, output)
    }

    /// Decrypts a chunked message produced by [`NoiseCodec::encrypt_message`].
    ///
    /// Fails if any chunk fails to authenticate; the session must be
    /// considered dead in that case, since the receive nonce is no longer
    /// aligned with the peer.
    pub fn decrypt_message(&mut self, ciphertext: &[u8], output: &mut Vec<u8>) -> Result<(), AeadError> {
        self.decryptor.decrypt_message(ciphertext, output)
    }

    /// Exact on-wire size of a chunked-and-MACed message of `msg_len`
    /// plaintext bytes.
    pub const fn encrypted_message_size(msg_len: usize) -> usize {
        msg_len + msg_len.div_ceil(NOISE_MAX_CHUNK_SIZE) * const_sv2::AEAD_MAC_LEN
    }
}

pub use error::Error;
pub use initiator::Initiator;
pub use responder::Responder;
pub use signature_message::SignatureNoiseMessage;
