use binary_sv2::{Decodable, Decoder, Encodable, Encoder, Error, Seq064K, B0255, B064K, U256};
use const_sv2::MESSAGE_TYPE_NEW_TEMPLATE;

/// ## NewTemplate (Server -> Client)
///
/// The primary template-providing message. The `coinbase_tx_outputs` bytes
/// appear as-is at the end of the coinbase transaction the client builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTemplate {
    /// Server's identification of the template. Strictly increasing for
    /// the process lifetime.
    pub template_id: u64,
    /// True if the template is intended for a future [`crate::SetNewPrevHash`]
    /// sent on the connection. If false, the template refers to the last
    /// sent [`crate::SetNewPrevHash`] and the miner should start working
    /// on it immediately.
    pub future_template: bool,
    /// Valid header version field that reflects current network consensus.
    pub version: u32,
    /// The coinbase transaction nVersion field.
    pub coinbase_tx_version: u32,
    /// Up to 8 bytes (not including the length byte) to be placed at the
    /// beginning of the coinbase field in the coinbase transaction.
    pub coinbase_prefix: B0255,
    /// The coinbase transaction input's nSequence field.
    pub coinbase_tx_input_sequence: u32,
    /// The value, in satoshis, available for spending in coinbase outputs
    /// added by the client. Includes both transaction fees and block
    /// subsidy.
    pub coinbase_tx_value_remaining: u64,
    /// The number of transaction outputs included in `coinbase_tx_outputs`.
    pub coinbase_tx_outputs_count: u32,
    /// Bitcoin transaction outputs to be included as the last outputs in
    /// the coinbase transaction.
    pub coinbase_tx_outputs: B064K,
    /// The locktime field in the coinbase transaction.
    pub coinbase_tx_locktime: u32,
    /// Merkle path hashes ordered from deepest.
    pub merkle_path: Seq064K<U256>,
}

impl NewTemplate {
    pub const MESSAGE_TYPE: u8 = MESSAGE_TYPE_NEW_TEMPLATE;
}

impl Encodable for NewTemplate {
    fn encode(&self, encoder: &mut Encoder) {
        self.template_id.encode(encoder);
        self.future_template.encode(encoder);
        self.version.encode(encoder);
        self.coinbase_tx_version.encode(encoder);
        self.coinbase_prefix.encode(encoder);
        self.coinbase_tx_input_sequence.encode(encoder);
        self.coinbase_tx_value_remaining.encode(encoder);
        self.coinbase_tx_outputs_count.encode(encoder);
        self.coinbase_tx_outputs.encode(encoder);
        self.coinbase_tx_locktime.encode(encoder);
        self.merkle_path.encode(encoder);
    }
}

impl Decodable for NewTemplate {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            template_id: u64::decode(decoder)?,
            future_template: bool::decode(decoder)?,
            version: u32::decode(decoder)?,
            coinbase_tx_version: u32::decode(decoder)?,
            coinbase_prefix: B0255::decode(decoder)?,
            coinbase_tx_input_sequence: u32::decode(decoder)?,
            coinbase_tx_value_remaining: u64::decode(decoder)?,
            coinbase_tx_outputs_count: u32::decode(decoder)?,
            coinbase_tx_outputs: B064K::decode(decoder)?,
            coinbase_tx_locktime: u32::decode(decoder)?,
            merkle_path: Seq064K::<U256>::decode(decoder)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use binary_sv2::{from_bytes, to_bytes};

    #[test]
    fn round_trip_with_merkle_path() {
        let msg = NewTemplate {
            template_id: 2,
            future_template: true,
            version: 0x2000_0000,
            coinbase_tx_version: 2,
            coinbase_prefix: vec![0x03, 0x2a, 0x01, 0x00].try_into().unwrap(),
            coinbase_tx_input_sequence: u32::MAX,
            coinbase_tx_value_remaining: 625_000_000,
            coinbase_tx_outputs_count: 1,
            coinbase_tx_outputs: vec![0u8; 43].try_into().unwrap(),
            coinbase_tx_locktime: 0,
            merkle_path: vec![U256::from([0xab; 32])].try_into().unwrap(),
        };
        let bytes = to_bytes(&msg);
        // 8+1+4+4+(1+4)+4+8+4+(2+43)+4+(2+32)
        assert_eq!(bytes.len(), 121);
        let decoded: NewTemplate = from_bytes(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn empty_merkle_path_encodes_two_bytes() {
        let msg = NewTemplate {
            template_id: 1,
            future_template: false,
            version: 0x2000_0000,
            coinbase_tx_version: 2,
            coinbase_prefix: vec![].try_into().unwrap(),
            coinbase_tx_input_sequence: 0,
            coinbase_tx_value_remaining: 0,
            coinbase_tx_outputs_count: 0,
            coinbase_tx_outputs: vec![].try_into().unwrap(),
            coinbase_tx_locktime: 0,
            merkle_path: Vec::<U256>::new().try_into().unwrap(),
        };
        let bytes = to_bytes(&msg);
        assert_eq!(bytes.len(), 8 + 1 + 4 + 4 + 1 + 4 + 8 + 4 + 2 + 4 + 2);
    }
}
