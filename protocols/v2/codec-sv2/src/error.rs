use core::fmt;

#[derive(Debug)]
pub enum Error {
    /// AEAD seal or open failed; the session is dead.
    AeadError(noise_sv2::AeadError),
    /// Error from the `framing_sv2` crate.
    FramingError(framing_sv2::Error),
    /// Error from the `noise_sv2` crate.
    NoiseSv2Error(noise_sv2::Error),
    /// A handshake step was driven on a state that is not in handshake.
    NotInHandShakeState,
    /// `step_1` was called on an initiator.
    InvalidStepForInitiator,
    /// `step_0` or `step_2` was called on a responder.
    InvalidStepForResponder,
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;
        match self {
            AeadError(e) => write!(f, "AEAD error: `{:?}`", e),
            FramingError(e) => write!(f, "Framing error: `{}`", e),
            NoiseSv2Error(e) => write!(f, "Noise error: `{}`", e),
            NotInHandShakeState => write!(f, "Handshake step on a non-handshake state"),
            InvalidStepForInitiator => write!(f, "Responder handshake step on an initiator"),
            InvalidStepForResponder => write!(f, "Initiator handshake step on a responder"),
        }
    }
}

impl std::error::Error for Error {}

impl From<noise_sv2::AeadError> for Error {
    fn from(e: noise_sv2::AeadError) -> Self {
        Error::AeadError(e)
    }
}

impl From<framing_sv2::Error> for Error {
    fn from(e: framing_sv2::Error) -> Self {
        Error::FramingError(e)
    }
}

impl From<noise_sv2::Error> for Error {
    fn from(e: noise_sv2::Error) -> Self {
        Error::NoiseSv2Error(e)
    }
}
