//! Error types of the Template Provider role.
//!
//! [`TpError`] covers startup and node-facing failures. [`Sv2ClientError`]
//! is the disposition of a failed client interaction, raised by the
//! dispatch path and caught at the event-loop boundary where it flags the
//! session for disconnection.

use std::fmt;

/// Role-level errors, surfaced to the embedding node.
#[derive(Debug)]
pub enum TpError {
    /// I/O error outside a client session.
    Io(std::io::Error),
    /// The listen port could not be bound; the node should refuse to start
    /// with the current configuration.
    Bind(std::io::Error),
    /// Invalid configuration value.
    BadConfig(String),
    /// The worker thread is already running.
    AlreadyStarted,
}

impl fmt::Display for TpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TpError::*;
        match self {
            Io(e) => write!(f, "I/O error: `{}`", e),
            Bind(e) => write!(f, "Failed to bind Sv2 listen port: `{}`", e),
            BadConfig(e) => write!(f, "Invalid configuration: {}", e),
            AlreadyStarted => write!(f, "Template Provider thread already started"),
        }
    }
}

impl std::error::Error for TpError {}

impl From<std::io::Error> for TpError {
    fn from(e: std::io::Error) -> Self {
        TpError::Io(e)
    }
}

/// Why a client interaction failed, and implicitly how: every variant ends
/// the session, but only a policy reject is preceded by a typed Sv2 error
/// message on the wire.
#[derive(Debug)]
pub enum Sv2ClientError {
    /// Decryption failure, socket error or handshake breakage. The session
    /// is torn down without a reply.
    TransportFatal(codec_sv2::Error),
    /// The client sent a message that is malformed or not valid in the
    /// session's current state.
    ProtocolViolation(&'static str),
    /// The client was refused on policy grounds; a typed error message has
    /// already been sent.
    PolicyReject(&'static str),
    /// Socket error while writing a reply.
    Io(std::io::Error),
    /// Block assembly failed while producing work for the session.
    BlockAssembly(crate::interfaces::BlockAssemblyError),
}

impl fmt::Display for Sv2ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Sv2ClientError::*;
        match self {
            TransportFatal(e) => write!(f, "Transport failure: `{}`", e),
            ProtocolViolation(what) => write!(f, "Protocol violation: {}", what),
            PolicyReject(code) => write!(f, "Policy reject: {}", code),
            Io(e) => write!(f, "I/O error: `{}`", e),
            BlockAssembly(e) => write!(f, "{}", e),
        }
    }
}

impl From<codec_sv2::Error> for Sv2ClientError {
    fn from(e: codec_sv2::Error) -> Self {
        Sv2ClientError::TransportFatal(e)
    }
}

impl From<std::io::Error> for Sv2ClientError {
    fn from(e: std::io::Error) -> Self {
        Sv2ClientError::Io(e)
    }
}
