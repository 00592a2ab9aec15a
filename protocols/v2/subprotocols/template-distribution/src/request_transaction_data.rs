use binary_sv2::{Decodable, Decoder, Encodable, Encoder, Error, Seq064K, Str0255, B016M, B064K};
use const_sv2::{
    MESSAGE_TYPE_REQUEST_TRANSACTION_DATA, MESSAGE_TYPE_REQUEST_TRANSACTION_DATA_ERROR,
    MESSAGE_TYPE_REQUEST_TRANSACTION_DATA_SUCCESS,
};

/// ## RequestTransactionData (Client -> Server)
///
/// Asks for the transaction set of a previously received template, e.g. to
/// propagate the full block on its own or to declare the job to a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTransactionData {
    pub template_id: u64,
}

impl RequestTransactionData {
    pub const MESSAGE_TYPE: u8 = MESSAGE_TYPE_REQUEST_TRANSACTION_DATA;
}

impl Encodable for RequestTransactionData {
    fn encode(&self, encoder: &mut Encoder) {
        self.template_id.encode(encoder);
    }
}

impl Decodable for RequestTransactionData {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            template_id: u64::decode(decoder)?,
        })
    }
}

/// ## RequestTransactionData.Success (Server -> Client)
///
/// The transaction list excludes the coinbase; `excess_data` carries the
/// witness reserve value committed to by the template's coinbase, when
/// present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTransactionDataSuccess {
    pub template_id: u64,
    pub excess_data: B064K,
    /// Consensus-serialized transactions of the template, in block order.
    pub transaction_list: Seq064K<B016M>,
}

impl RequestTransactionDataSuccess {
    pub const MESSAGE_TYPE: u8 = MESSAGE_TYPE_REQUEST_TRANSACTION_DATA_SUCCESS;
}

impl Encodable for RequestTransactionDataSuccess {
    fn encode(&self, encoder: &mut Encoder) {
        self.template_id.encode(encoder);
        self.excess_data.encode(encoder);
        self.transaction_list.encode(encoder);
    }
}

impl Decodable for RequestTransactionDataSuccess {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            template_id: u64::decode(decoder)?,
            excess_data: B064K::decode(decoder)?,
            transaction_list: Seq064K::<B016M>::decode(decoder)?,
        })
    }
}

/// ## RequestTransactionData.Error (Server -> Client)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTransactionDataError {
    pub template_id: u64,
    pub error_code: Str0255,
}

impl RequestTransactionDataError {
    pub const MESSAGE_TYPE: u8 = MESSAGE_TYPE_REQUEST_TRANSACTION_DATA_ERROR;

    /// The id refers to a template that never existed or was swapped out
    /// by a tip change.
    pub const TEMPLATE_ID_NOT_FOUND: &'static str = "template-id-not-found";
}

impl Encodable for RequestTransactionDataError {
    fn encode(&self, encoder: &mut Encoder) {
        self.template_id.encode(encoder);
        self.error_code.encode(encoder);
    }
}

impl Decodable for RequestTransactionDataError {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            template_id: u64::decode(decoder)?,
            error_code: Str0255::decode(decoder)?,
        })
    }
}
