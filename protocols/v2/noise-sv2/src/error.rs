use core::fmt;

use const_sv2::SIGNATURE_NOISE_MESSAGE_SIZE;

#[derive(Debug)]
pub enum Error {
    /// AEAD encryption or decryption failed. On the transport this is fatal
    /// for the session: the nonces are no longer aligned with the peer.
    AeadError(aes_gcm::Error),
    /// The certificate received during the handshake failed validation,
    /// either the Schnorr signature or the validity window.
    InvalidCertificate([u8; SIGNATURE_NOISE_MESSAGE_SIZE]),
    /// A handshake message had an unexpected length.
    InvalidMessageLength,
    /// The provided 32 bytes are not a valid secp256k1 secret key.
    InvalidRawPrivateKey,
    /// The provided 32 bytes are not a valid x-only secp256k1 public key.
    InvalidRawPublicKey,
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;
        match self {
            AeadError(e) => write!(f, "AEAD error: `{:?}`", e),
            InvalidCertificate(_) => write!(f, "Invalid certificate"),
            InvalidMessageLength => write!(f, "Invalid handshake message length"),
            InvalidRawPrivateKey => write!(f, "Invalid raw private key"),
            InvalidRawPublicKey => write!(f, "Invalid raw public key"),
        }
    }
}

impl std::error::Error for Error {}

impl From<aes_gcm::Error> for Error {
    fn from(e: aes_gcm::Error) -> Self {
        Error::AeadError(e)
    }
}
