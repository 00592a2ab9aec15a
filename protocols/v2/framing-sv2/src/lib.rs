//! # Framing Sv2
//!
//! The plaintext Sv2 frame: a 6-byte header (`extension_type:u16`,
//! `msg_type:u8`, `msg_length:u24`, all little-endian) followed by
//! `msg_length` payload bytes. On an encrypted connection the header and the
//! payload are AEAD-sealed separately; that layer lives in `codec_sv2`.

pub mod framing;
pub mod header;

pub use framing::Sv2Frame;
pub use header::Header;

/// Errors raised while reading frame headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The header slice was not exactly 6 bytes.
    UnexpectedHeaderLength(usize),
    /// The payload does not fit a U24 length field.
    PayloadTooBig(usize),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::UnexpectedHeaderLength(l) => {
                write!(f, "expected a {} byte header, got {}", Header::SIZE, l)
            }
            Error::PayloadTooBig(l) => write!(f, "payload of {} bytes does not fit a U24", l),
        }
    }
}

impl std::error::Error for Error {}
