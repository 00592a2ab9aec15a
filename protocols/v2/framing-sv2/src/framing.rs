use crate::{header::Header, Error};

/// A complete plaintext Sv2 frame: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sv2Frame {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Sv2Frame {
    /// Frames an already-serialized message payload.
    pub fn from_message(msg_type: u8, payload: Vec<u8>) -> Result<Self, Error> {
        let header = Header::new(msg_type, payload.len())?;
        Ok(Self { header, payload })
    }

    /// Total plaintext size of the frame on an unencrypted wire.
    pub fn encoded_length(&self) -> usize {
        Header::SIZE + self.payload.len()
    }
}
