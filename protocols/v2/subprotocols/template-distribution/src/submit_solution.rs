use binary_sv2::{Decodable, Decoder, Encodable, Encoder, Error, B064K};
use const_sv2::MESSAGE_TYPE_SUBMIT_SOLUTION;

/// ## SubmitSolution (Client -> Server)
///
/// A complete solution for a previously distributed template. The server
/// reconstitutes the block from its cached template, the supplied coinbase
/// and the supplied header fields, and hands it to block validation. The
/// server never replies to this message on the Sv2 channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitSolution {
    pub template_id: u64,
    /// The version field in the block header.
    pub version: u32,
    /// The nTime field in the block header.
    pub header_timestamp: u32,
    /// The nonce field in the block header.
    pub header_nonce: u32,
    /// The full, consensus-serialized coinbase transaction, ready for
    /// inclusion in the block.
    pub coinbase_tx: B064K,
}

impl SubmitSolution {
    pub const MESSAGE_TYPE: u8 = MESSAGE_TYPE_SUBMIT_SOLUTION;
}

impl Encodable for SubmitSolution {
    fn encode(&self, encoder: &mut Encoder) {
        self.template_id.encode(encoder);
        self.version.encode(encoder);
        self.header_timestamp.encode(encoder);
        self.header_nonce.encode(encoder);
        self.coinbase_tx.encode(encoder);
    }
}

impl Decodable for SubmitSolution {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            template_id: u64::decode(decoder)?,
            version: u32::decode(decoder)?,
            header_timestamp: u32::decode(decoder)?,
            header_nonce: u32::decode(decoder)?,
            coinbase_tx: B064K::decode(decoder)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use binary_sv2::{from_bytes, to_bytes};

    #[test]
    fn round_trip() {
        let msg = SubmitSolution {
            template_id: 9,
            version: 0x2000_0000,
            header_timestamp: 1_700_000_000,
            header_nonce: 0x1234_5678,
            coinbase_tx: vec![0xaa; 120].try_into().unwrap(),
        };
        let bytes = to_bytes(&msg);
        assert_eq!(bytes.len(), 8 + 4 + 4 + 4 + 2 + 120);
        assert_eq!(from_bytes::<SubmitSolution>(&bytes).unwrap(), msg);
    }
}
