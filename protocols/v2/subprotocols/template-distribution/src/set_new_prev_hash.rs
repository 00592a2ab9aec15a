use binary_sv2::{Decodable, Decoder, Encodable, Encoder, Error, U256};
use const_sv2::MESSAGE_TYPE_SET_NEW_PREV_HASH;

/// ## SetNewPrevHash (Server -> Client)
///
/// Sent when the chain tip changes. Work referring to any earlier prev hash
/// is invalid from this point on; the referenced template becomes the one
/// to mine on. Always preceded on the connection by the [`crate::NewTemplate`]
/// carrying the same `template_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetNewPrevHash {
    /// Template the new prev hash applies to.
    pub template_id: u64,
    /// Hash of the new chain tip block.
    pub prev_hash: U256,
    /// Timestamp to use in the block header.
    pub header_timestamp: u32,
    /// Compact difficulty target for the next block.
    pub n_bits: u32,
    /// Expanded difficulty target, redundant with `n_bits`.
    pub target: U256,
}

impl SetNewPrevHash {
    pub const MESSAGE_TYPE: u8 = MESSAGE_TYPE_SET_NEW_PREV_HASH;
}

impl Encodable for SetNewPrevHash {
    fn encode(&self, encoder: &mut Encoder) {
        self.template_id.encode(encoder);
        self.prev_hash.encode(encoder);
        self.header_timestamp.encode(encoder);
        self.n_bits.encode(encoder);
        self.target.encode(encoder);
    }
}

impl Decodable for SetNewPrevHash {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            template_id: u64::decode(decoder)?,
            prev_hash: U256::decode(decoder)?,
            header_timestamp: u32::decode(decoder)?,
            n_bits: u32::decode(decoder)?,
            target: U256::decode(decoder)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use binary_sv2::{from_bytes, to_bytes};

    #[test]
    fn payload_is_80_bytes() {
        let msg = SetNewPrevHash {
            template_id: 7,
            prev_hash: U256::from([0x44; 32]),
            header_timestamp: 1_700_000_000,
            n_bits: 0x1d00_ffff,
            target: U256::from([0xff; 32]),
        };
        let bytes = to_bytes(&msg);
        assert_eq!(bytes.len(), 80);
        assert_eq!(from_bytes::<SetNewPrevHash>(&bytes).unwrap(), msg);
    }
}
