use core::fmt;

use binary_sv2::{Decodable, Decoder, Encodable, Encoder, Error, Str0255};
use const_sv2::{
    MESSAGE_TYPE_SETUP_CONNECTION, MESSAGE_TYPE_SETUP_CONNECTION_ERROR,
    MESSAGE_TYPE_SETUP_CONNECTION_SUCCESS, SV2_JOB_DECLARATION_PROTOCOL_DISCRIMINANT,
    SV2_MINING_PROTOCOL_DISCRIMINANT, SV2_TEMPLATE_DISTRIBUTION_PROTOCOL_DISCRIMINANT,
};

/// The Sv2 (sub)protocol a connection is set up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Protocol {
    MiningProtocol = SV2_MINING_PROTOCOL_DISCRIMINANT,
    JobDeclarationProtocol = SV2_JOB_DECLARATION_PROTOCOL_DISCRIMINANT,
    TemplateDistributionProtocol = SV2_TEMPLATE_DISTRIBUTION_PROTOCOL_DISCRIMINANT,
}

impl TryFrom<u8> for Protocol {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            SV2_MINING_PROTOCOL_DISCRIMINANT => Ok(Protocol::MiningProtocol),
            SV2_JOB_DECLARATION_PROTOCOL_DISCRIMINANT => Ok(Protocol::JobDeclarationProtocol),
            SV2_TEMPLATE_DISTRIBUTION_PROTOCOL_DISCRIMINANT => {
                Ok(Protocol::TemplateDistributionProtocol)
            }
            other => Err(other),
        }
    }
}

/// Initiates an Sv2 connection, sent by the downstream right after the
/// Noise handshake completes.
///
/// Downstreams that do not wish to provide telemetry data should leave
/// `device_id` empty; `vendor` should still describe the software in use. A
/// valid response is either [`SetupConnectionSuccess`] or
/// [`SetupConnectionError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupConnection {
    /// Protocol to be used for the connection. The subprotocol a server
    /// does not speak is rejected with `unsupported-protocol`.
    ///
    /// Carried as a raw byte so a message with an unknown discriminant
    /// still decodes and can be answered with a typed error.
    pub protocol: u8,
    /// The minimum protocol version supported.
    pub min_version: u16,
    /// The maximum protocol version supported.
    pub max_version: u16,
    /// Flags indicating optional protocol features the downstream supports.
    pub flags: u32,
    /// ASCII representation of the server hostname or IP address.
    pub endpoint_host: Str0255,
    /// Server port.
    pub endpoint_port: u16,
    /// Device vendor name.
    pub vendor: Str0255,
    /// Device hardware version.
    pub hardware_version: Str0255,
    /// Device firmware version.
    pub firmware: Str0255,
    /// Device identifier.
    pub device_id: Str0255,
}

impl SetupConnection {
    pub const MESSAGE_TYPE: u8 = MESSAGE_TYPE_SETUP_CONNECTION;
}

impl fmt::Display for SetupConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SetupConnection(protocol: {}, min_version: {}, max_version: {}, flags: 0x{:08x}, endpoint: {}:{}, vendor: {}, hardware_version: {}, firmware: {}, device_id: {})",
            self.protocol,
            self.min_version,
            self.max_version,
            self.flags,
            self.endpoint_host,
            self.endpoint_port,
            self.vendor,
            self.hardware_version,
            self.firmware,
            self.device_id
        )
    }
}

impl Encodable for SetupConnection {
    fn encode(&self, encoder: &mut Encoder) {
        self.protocol.encode(encoder);
        self.min_version.encode(encoder);
        self.max_version.encode(encoder);
        self.flags.encode(encoder);
        self.endpoint_host.encode(encoder);
        self.endpoint_port.encode(encoder);
        self.vendor.encode(encoder);
        self.hardware_version.encode(encoder);
        self.firmware.encode(encoder);
        self.device_id.encode(encoder);
    }
}

impl Decodable for SetupConnection {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            protocol: u8::decode(decoder)?,
            min_version: u16::decode(decoder)?,
            max_version: u16::decode(decoder)?,
            flags: u32::decode(decoder)?,
            endpoint_host: Str0255::decode(decoder)?,
            endpoint_port: u16::decode(decoder)?,
            vendor: Str0255::decode(decoder)?,
            hardware_version: Str0255::decode(decoder)?,
            firmware: Str0255::decode(decoder)?,
            device_id: Str0255::decode(decoder)?,
        })
    }
}

/// Accepts a [`SetupConnection`] request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupConnectionSuccess {
    /// Version selected from the downstream's min/max range; used for the
    /// rest of the connection's life.
    pub used_version: u16,
    /// Flags indicating optional protocol features the upstream supports.
    pub flags: u32,
}

impl SetupConnectionSuccess {
    pub const MESSAGE_TYPE: u8 = MESSAGE_TYPE_SETUP_CONNECTION_SUCCESS;
}

impl Encodable for SetupConnectionSuccess {
    fn encode(&self, encoder: &mut Encoder) {
        self.used_version.encode(encoder);
        self.flags.encode(encoder);
    }
}

impl Decodable for SetupConnectionSuccess {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            used_version: u16::decode(decoder)?,
            flags: u32::decode(decoder)?,
        })
    }
}

/// Rejects a [`SetupConnection`] request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupConnectionError {
    /// Feature flags the upstream does not support, when the error code is
    /// `unsupported-feature-flags`; zero otherwise.
    pub flags: u32,
    /// Reason for the rejection.
    pub error_code: Str0255,
}

impl SetupConnectionError {
    pub const MESSAGE_TYPE: u8 = MESSAGE_TYPE_SETUP_CONNECTION_ERROR;

    pub const UNSUPPORTED_PROTOCOL: &'static str = "unsupported-protocol";
    pub const PROTOCOL_VERSION_MISMATCH: &'static str = "protocol-version-mismatch";
}

impl Encodable for SetupConnectionError {
    fn encode(&self, encoder: &mut Encoder) {
        self.flags.encode(encoder);
        self.error_code.encode(encoder);
    }
}

impl Decodable for SetupConnectionError {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        Ok(Self {
            flags: u32::decode(decoder)?,
            error_code: Str0255::decode(decoder)?,
        })
    }
}
