//! # Binary Sv2
//!
//! Wire primitives of the Sv2 binary protocol and their (de)serialization.
//!
//! ```txt
//! Rust       <-> Sv2
//! bool       <-> BOOL
//! u8         <-> U8
//! u16        <-> U16
//! u32        <-> U32
//! u64        <-> U64
//! U256       <-> U256
//! Str0255    <-> STR0_255
//! B0255      <-> B0_255
//! B064K      <-> B0_64K
//! B016M      <-> B0_16M
//! Seq064K<T> <-> SEQ0_64K[T]
//! ```
//!
//! All integers are little-endian. Strings and short byte blobs carry a
//! one-byte length prefix, `B064K` a two-byte prefix and `B016M` a
//! three-byte (U24) prefix. Sequences carry a two-byte element count.
//!
//! Messages are closed sum types with explicit encode/decode per variant,
//! built on top of [`Encoder`], [`Decoder`] and the [`Encodable`] /
//! [`Decodable`] traits defined here.

mod codec;
mod datatypes;

pub use codec::{Decoder, Encoder};
pub use datatypes::{Seq064K, Str0255, B016M, B0255, B064K, U256};

/// Errors raised while encoding or decoding Sv2 wire data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Ran out of bytes while decoding.
    OutOfBound,
    /// A BOOL field held something other than 0 or 1.
    NotABool(u8),
    /// A U24 length prefix cannot represent the given value.
    U24TooBig(u32),
    /// A STR0_255 was built from more than 255 bytes.
    InvalidStr0255Size(usize),
    /// A STR0_255 did not hold valid UTF-8.
    NonUtf8String,
    /// A B0_255 was built from more than 255 bytes.
    InvalidB0255Size(usize),
    /// A B0_64K was built from more than 65535 bytes.
    InvalidB064KSize(usize),
    /// A B0_16M was built from more than 2^24 - 1 bytes.
    InvalidB016MSize(usize),
    /// A SEQ0_64K was built from more than 65535 elements.
    InvalidSeq064KSize(usize),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use Error::*;
        match self {
            OutOfBound => write!(f, "premature end of input"),
            NotABool(b) => write!(f, "expected BOOL, got `{}`", b),
            U24TooBig(v) => write!(f, "value `{}` does not fit a U24", v),
            InvalidStr0255Size(l) => write!(f, "STR0_255 of length `{}`", l),
            NonUtf8String => write!(f, "STR0_255 is not valid UTF-8"),
            InvalidB0255Size(l) => write!(f, "B0_255 of length `{}`", l),
            InvalidB064KSize(l) => write!(f, "B0_64K of length `{}`", l),
            InvalidB016MSize(l) => write!(f, "B0_16M of length `{}`", l),
            InvalidSeq064KSize(l) => write!(f, "SEQ0_64K of length `{}`", l),
        }
    }
}

impl std::error::Error for Error {}

/// A value that can be written to an Sv2 byte stream.
pub trait Encodable {
    fn encode(&self, encoder: &mut Encoder);
}

/// A value that can be read back from an Sv2 byte stream.
pub trait Decodable: Sized {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, Error>;
}

/// Serializes an encodable value to a fresh byte vector.
pub fn to_bytes<T: Encodable>(src: &T) -> Vec<u8> {
    let mut encoder = Encoder::new();
    src.encode(&mut encoder);
    encoder.into_vec()
}

/// Deserializes a decodable value, requiring the input to be fully consumed.
pub fn from_bytes<T: Decodable>(data: &[u8]) -> Result<T, Error> {
    let mut decoder = Decoder::new(data);
    let value = T::decode(&mut decoder)?;
    if decoder.is_empty() {
        Ok(value)
    } else {
        Err(Error::OutOfBound)
    }
}
