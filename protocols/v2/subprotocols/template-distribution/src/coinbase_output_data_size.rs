use binary_sv2::{Decodable, Decoder, Encodable, Encoder, Error};
use const_sv2::MESSAGE_TYPE_COINBASE_OUTPUT_DATA_SIZE;

/// ## CoinbaseOutputDataSize (Client -> Server)
///
/// Ultimately a parameter of block assembly: the maximum additional
/// serialized bytes the client will add to the coinbase transaction's
/// outputs. The server subtracts this from the maximum block weight it
/// assembles templates for, so the client's outputs can never push the
/// final block over consensus limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinbaseOutputDataSize {
    /// Additional serialized bytes needed in coinbase transaction outputs.
    pub coinbase_output_max_additional_size: u32,
}

impl CoinbaseOutputDataSize {
    pub const MESSAGE_TYPE: u8 = MESSAGE_TYPE_COINBASE_OUTPUT_DATA_SIZE;
}

impl Encodable for CoinbaseOutputDataSize {
    fn encode(&self, encoder: &mut Encoder) {
        self.coinbase_output_max_additional_size.encode(encoder);
    }
}

impl Decodable for CoinbaseOutputDataSize {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            coinbase_output_max_additional_size: u32::decode(decoder)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use binary_sv2::{from_bytes, to_bytes};

    #[test]
    fn four_byte_payload() {
        let msg = CoinbaseOutputDataSize {
            coinbase_output_max_additional_size: 1,
        };
        let bytes = to_bytes(&msg);
        assert_eq!(bytes, vec![1, 0, 0, 0]);
        assert_eq!(from_bytes::<CoinbaseOutputDataSize>(&bytes).unwrap(), msg);
    }
}
