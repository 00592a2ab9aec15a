// Length-prefixed Sv2 datatypes. All of them enforce their maximum size at
// construction so encoding can never produce an out-of-range prefix.


use crate::{Decodable, Decoder, Encodable, Encoder, Error};

/// STR0_255: UTF-8 string with a one-byte length prefix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Str0255(String);

impl Str0255 {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Str0255 {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Error> {
        if value.len() > 255 {
            return Err(Error::InvalidStr0255Size(value.len()));
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for Str0255 {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Error> {
        Self::try_from(value.to_string())
    }
}

impl core::fmt::Display for Str0255 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Encodable for Str0255 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_u8(self.0.len() as u8);
        encoder.write_bytes(self.0.as_bytes());
    }
}

impl Decodable for Str0255 {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        let len = decoder.read_u8()? as usize;
        let bytes = decoder.read_bytes(len)?;
        let s = core::str::from_utf8(bytes).map_err(|_| Error::NonUtf8String)?;
        Ok(Self(s.to_string()))
    }
}

macro_rules! byte_blob {
    ($name:ident, $max:expr, $err:ident, $write_len:ident, $read_len:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Default)]
        pub struct $name(Vec<u8>);

        impl $name {
            pub fn as_slice(&self) -> &[u8] {
                &self.0
            }

            pub fn to_vec(&self) -> Vec<u8> {
                self.0.clone()
            }

            pub fn into_vec(self) -> Vec<u8> {
                self.0
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl TryFrom<Vec<u8>> for $name {
            type Error = Error;

            fn try_from(value: Vec<u8>) -> Result<Self, Error> {
                if value.len() > $max {
                    return Err(Error::$err(value.len()));
                }
                Ok(Self(value))
            }
        }

        impl Encodable for $name {
            fn encode(&self, encoder: &mut Encoder) {
                encoder.$write_len(self.0.len() as _);
                encoder.write_bytes(&self.0);
            }
        }

        impl Decodable for $name {
            fn decode(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
                let len = decoder.$read_len()? as usize;
                let bytes = decoder.read_bytes(len)?;
                Ok(Self(bytes.to_vec()))
            }
        }
    };
}

// B0_255: up to 255 raw bytes, one-byte length prefix.
byte_blob!(B0255, 255, InvalidB0255Size, write_u8, read_u8);
// B0_64K: up to 65535 raw bytes, two-byte length prefix.
byte_blob!(B064K, 65535, InvalidB064KSize, write_u16, read_u16);
// B0_16M: up to 2^24 - 1 raw bytes, three-byte length prefix.
byte_blob!(B016M, 0xff_ff_ff, InvalidB016MSize, write_u24, read_u24);

/// U256: 32 raw bytes, no prefix. Used for hashes and targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct U256([u8; 32]);

impl U256 {
    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl From<[u8; 32]> for U256 {
    fn from(value: [u8; 32]) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for U256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Encodable for U256 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_bytes(&self.0);
    }
}

impl Decodable for U256 {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        let bytes = decoder.read_bytes(32)?;
        let mut inner = [0u8; 32];
        inner.copy_from_slice(bytes);
        Ok(Self(inner))
    }
}

/// SEQ0_64K: sequence with a two-byte element count prefix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Seq064K<T>(Vec<T>);

impl<T> Seq064K<T> {
    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<T> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> TryFrom<Vec<T>> for Seq064K<T> {
    type Error = Error;

    fn try_from(value: Vec<T>) -> Result<Self, Error> {
        if value.len() > 65535 {
            return Err(Error::InvalidSeq064KSize(value.len()));
        }
        Ok(Self(value))
    }
}

impl<T: Encodable> Encodable for Seq064K<T> {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_u16(self.0.len() as u16);
        for elem in &self.0 {
            elem.encode(encoder);
        }
    }
}

impl<T: Decodable> Decodable for Seq064K<T> {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        let len = decoder.read_u16()? as usize;
        let mut out = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            out.push(T::decode(decoder)?);
        }
        Ok(Self(out))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{from_bytes, to_bytes};
    use quickcheck::TestResult;

    #[test]
    fn str0255_round_trip() {
        let s = Str0255::try_from("template-id-not-found").unwrap();
        let bytes = to_bytes(&s);
        assert_eq!(bytes.len(), 1 + 21);
        assert_eq!(bytes[0], 21);
        let back: Str0255 = from_bytes(&bytes).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn str0255_rejects_oversize() {
        let s = "a".repeat(256);
        assert_eq!(
            Str0255::try_from(s).unwrap_err(),
            Error::InvalidStr0255Size(256)
        );
    }

    #[test]
    fn b016m_uses_u24_prefix() {
        let blob = B016M::try_from(vec![7u8; 70000]).unwrap();
        let bytes = to_bytes(&blob);
        assert_eq!(bytes.len(), 3 + 70000);
        let back: B016M = from_bytes(&bytes).unwrap();
        assert_eq!(back.len(), 70000);
    }

    #[test]
    fn seq064k_of_u256_round_trip() {
        let path: Vec<U256> = vec![U256::from([1u8; 32]), U256::from([2u8; 32])];
        let seq = Seq064K::try_from(path.clone()).unwrap();
        let bytes = to_bytes(&seq);
        assert_eq!(bytes.len(), 2 + 64);
        let back: Seq064K<U256> = from_bytes(&bytes).unwrap();
        assert_eq!(back.as_slice(), &path[..]);
    }

    #[test]
    fn truncated_input_is_out_of_bound() {
        let blob = B064K::try_from(vec![1, 2, 3]).unwrap();
        let mut bytes = to_bytes(&blob);
        bytes.pop();
        assert_eq!(from_bytes::<B064K>(&bytes).unwrap_err(), Error::OutOfBound);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = to_bytes(&7u32);
        bytes.push(0);
        assert_eq!(from_bytes::<u32>(&bytes).unwrap_err(), Error::OutOfBound);
    }

    #[test]
    fn bool_rejects_junk() {
        assert_eq!(from_bytes::<bool>(&[2]).unwrap_err(), Error::NotABool(2));
    }

    #[quickcheck_macros::quickcheck]
    fn prop_bytes_round_trip(data: Vec<u8>) -> TestResult {
        if data.len() > 65535 {
            return TestResult::discard();
        }
        let blob = B064K::try_from(data.clone()).unwrap();
        let back: B064K = from_bytes(&to_bytes(&blob)).unwrap();
        TestResult::from_bool(back.into_vec() == data)
    }

    #[quickcheck_macros::quickcheck]
    fn prop_ints_round_trip(a: u16, b: u32, c: u64) -> bool {
        from_bytes::<u16>(&to_bytes(&a)).unwrap() == a
            && from_bytes::<u32>(&to_bytes(&b)).unwrap() == b
            && from_bytes::<u64>(&to_bytes(&c)).unwrap() == c
    }
}
