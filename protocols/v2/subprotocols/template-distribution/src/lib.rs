//! # Template Distribution Protocol Messages
//!
//! The messages of the Sv2 Template Distribution subprotocol
//! (discriminant 0x02), used by a node to export block templates to a
//! miner or pool that controls its own coinbase.
//!
//! Server to client flow: a [`NewTemplate`] (possibly flagged as a future
//! template) followed, on chain tip changes, by a [`SetNewPrevHash`]
//! referring to the same template id. Clients answer with
//! [`RequestTransactionData`] to fetch the template's transactions and
//! [`SubmitSolution`] once a block is found.

mod coinbase_output_data_size;
mod new_template;
mod request_transaction_data;
mod set_new_prev_hash;
mod submit_solution;

pub use coinbase_output_data_size::CoinbaseOutputDataSize;
pub use new_template::NewTemplate;
pub use request_transaction_data::{
    RequestTransactionData, RequestTransactionDataError, RequestTransactionDataSuccess,
};
pub use set_new_prev_hash::SetNewPrevHash;
pub use submit_solution::SubmitSolution;
