//! # Common Sv2 Messages
//!
//! The connection setup messages every Sv2 subprotocol starts with:
//! [`SetupConnection`] and its [`SetupConnectionSuccess`] /
//! [`SetupConnectionError`] responses.

mod setup_connection;

pub use setup_connection::{
    Protocol, SetupConnection, SetupConnectionError, SetupConnectionSuccess,
};
