//! Constants used across the Sv2 protocol stack: framing sizes, Noise
//! handshake material and the message type identifiers of the common and
//! Template Distribution subprotocols.
//!
//! The Template Provider only speaks the Template Distribution subprotocol,
//! so the Mining and Job Declaration message catalogues are out of scope
//! here.

/// Identifier for the `extension_type` field in the Sv2 frame header,
/// indicating no extensions.
pub const EXTENSION_TYPE_NO_EXTENSION: u16 = 0;

/// Size of the plaintext Sv2 frame header in bytes.
pub const SV2_FRAME_HEADER_SIZE: usize = 6;

/// Maximum size of a Noise message chunk in bytes.
///
/// Section 3 of the Noise specification: all Noise messages are less than or
/// equal to 65535 bytes in length.
pub const NOISE_MAX_CHUNK_SIZE: usize = 65535;

/// Size of the MAC of the supported AEAD algorithms (ChaChaPoly, AES-GCM).
pub const AEAD_MAC_LEN: usize = 16;

/// Size of the encrypted Sv2 frame header, including the MAC.
pub const ENCRYPTED_SV2_FRAME_HEADER_SIZE: usize = SV2_FRAME_HEADER_SIZE + AEAD_MAC_LEN;

/// Size in bytes of an ElligatorSwift encoded secp256k1 public key.
pub const ELLSWIFT_ENCODING_SIZE: usize = 64;

/// Size of the handshake message the responder expects from the initiator,
/// a single plaintext ElligatorSwift encoded ephemeral key.
pub const RESPONDER_EXPECTED_HANDSHAKE_MESSAGE_SIZE: usize = ELLSWIFT_ENCODING_SIZE;

/// Size in bytes of an encrypted ElligatorSwift encoded public key.
pub const ENCRYPTED_ELLSWIFT_ENCODING_SIZE: usize = ELLSWIFT_ENCODING_SIZE + AEAD_MAC_LEN;

/// Size in bytes of the SIGNATURE_NOISE_MESSAGE certificate carried in the
/// second handshake message: version, valid_from, not_valid_after and a
/// 64-byte Schnorr signature.
pub const SIGNATURE_NOISE_MESSAGE_SIZE: usize = 2 + 4 + 4 + 64;

/// Size in bytes of the encrypted SIGNATURE_NOISE_MESSAGE.
pub const ENCRYPTED_SIGNATURE_NOISE_MESSAGE_SIZE: usize =
    SIGNATURE_NOISE_MESSAGE_SIZE + AEAD_MAC_LEN;

/// Size in bytes of the handshake message the initiator expects back from
/// the responder:
/// - plaintext ElligatorSwift encoded ephemeral key
/// - encrypted ElligatorSwift encoded static key
/// - encrypted SIGNATURE_NOISE_MESSAGE
///
/// 64 + 80 + 90 = 234 bytes.
pub const INITIATOR_EXPECTED_HANDSHAKE_MESSAGE_SIZE: usize = ELLSWIFT_ENCODING_SIZE
    + ENCRYPTED_ELLSWIFT_ENCODING_SIZE
    + ENCRYPTED_SIGNATURE_NOISE_MESSAGE_SIZE;

/// SHA-256 of the ascii encoding of "Noise_NX_EllSwiftXonly_ChaChaPoly_SHA256".
///
/// This is the initial chaining key of the handshake.
pub const NOISE_HASHED_PROTOCOL_NAME_CHACHA: [u8; 32] = [
    27, 97, 156, 90, 248, 120, 254, 68, 34, 119, 45, 129, 209, 41, 152, 82, 26, 137, 97, 115, 62,
    44, 177, 60, 145, 24, 250, 214, 68, 188, 1, 128,
];

// Discriminants for distinct Stratum V2 (sub)protocols.
pub const SV2_MINING_PROTOCOL_DISCRIMINANT: u8 = 0;
pub const SV2_JOB_DECLARATION_PROTOCOL_DISCRIMINANT: u8 = 1;
pub const SV2_TEMPLATE_DISTRIBUTION_PROTOCOL_DISCRIMINANT: u8 = 2;

// Common message types used across all Stratum V2 (sub)protocols.
pub const MESSAGE_TYPE_SETUP_CONNECTION: u8 = 0x00;
pub const MESSAGE_TYPE_SETUP_CONNECTION_SUCCESS: u8 = 0x01;
pub const MESSAGE_TYPE_SETUP_CONNECTION_ERROR: u8 = 0x02;

// Template Distribution Protocol message types.
pub const MESSAGE_TYPE_COINBASE_OUTPUT_DATA_SIZE: u8 = 0x70;
pub const MESSAGE_TYPE_NEW_TEMPLATE: u8 = 0x71;
pub const MESSAGE_TYPE_SET_NEW_PREV_HASH: u8 = 0x72;
pub const MESSAGE_TYPE_REQUEST_TRANSACTION_DATA: u8 = 0x73;
pub const MESSAGE_TYPE_REQUEST_TRANSACTION_DATA_SUCCESS: u8 = 0x74;
pub const MESSAGE_TYPE_REQUEST_TRANSACTION_DATA_ERROR: u8 = 0x75;
pub const MESSAGE_TYPE_SUBMIT_SOLUTION: u8 = 0x76;
