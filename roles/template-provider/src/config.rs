//! Configuration of the Template Provider role.
//!
//! The embedding node usually carries these options in its own TOML
//! configuration; [`Sv2TemplateProviderConfig::from_toml`] parses a
//! `[template_provider]`-style table.

use bitcoin::hex::FromHex;
use secp256k1::{Keypair, Secp256k1, SecretKey, XOnlyPublicKey};
use serde::Deserialize;
use tracing::info;

use crate::error::TpError;

/// Default Sv2 listen port.
pub const DEFAULT_SV2_PORT: u16 = 8336;
/// Protocol version currently spoken.
pub const DEFAULT_SV2_PROTOCOL_VERSION: u16 = 2;
/// Default coinbase weight reserve, in serialized bytes, applied when a
/// client declares a zero additional output size.
pub const DEFAULT_COINBASE_TX_ADDITIONAL_OUTPUT_SIZE: u32 = 4000;
/// Default period of the mempool-driven template rebuild timer, seconds.
pub const DEFAULT_SV2_INTERVAL: u64 = 30;
/// Default minimum fee improvement, in satoshis, required to push an
/// updated template during a single tip.
pub const DEFAULT_SV2_FEE_DELTA: i64 = 1000;
/// Default certificate validity, seconds (one year of two-week periods).
pub const DEFAULT_CERT_VALIDITY_SEC: u32 = 31_449_600;

fn default_port() -> u16 {
    DEFAULT_SV2_PORT
}

fn default_protocol_version() -> u16 {
    DEFAULT_SV2_PROTOCOL_VERSION
}

fn default_coinbase_output_size() -> u32 {
    DEFAULT_COINBASE_TX_ADDITIONAL_OUTPUT_SIZE
}

fn default_future_templates() -> bool {
    true
}

fn default_interval() -> u64 {
    DEFAULT_SV2_INTERVAL
}

fn default_fee_delta() -> i64 {
    DEFAULT_SV2_FEE_DELTA
}

fn default_cert_validity() -> u32 {
    DEFAULT_CERT_VALIDITY_SEC
}

/// Options recognized by the Template Provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Sv2TemplateProviderConfig {
    /// Listen port, bound on 0.0.0.0 once IBD has ended.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Sv2 protocol version offered in SetupConnection.Success.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u16,
    /// Optional feature flags echoed in SetupConnection.Success.
    #[serde(default)]
    pub optional_features: u32,
    /// Coinbase weight reserve used for a client that declared a zero
    /// `coinbase_output_max_additional_size`.
    #[serde(default = "default_coinbase_output_size")]
    pub default_coinbase_tx_additional_output_size: u32,
    /// Whether the NewTemplate preceding a SetNewPrevHash is flagged as a
    /// future template, letting ASICs preload work.
    #[serde(default = "default_future_templates")]
    pub default_future_templates: bool,
    /// Period of the mempool-driven template rebuild timer, in seconds.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Minimum additional absolute fee over the last sent template
    /// required to justify sending another, in satoshis.
    #[serde(default = "default_fee_delta")]
    pub fee_delta: i64,
    /// Validity window of the certificate presented during the handshake,
    /// in seconds from the moment of each handshake.
    #[serde(default = "default_cert_validity")]
    pub cert_validity_sec: u32,
    /// Hex-encoded 32-byte authority secret key. Generated at startup when
    /// absent; pin it to keep a stable identity across restarts.
    #[serde(default)]
    pub authority_secret_key: Option<String>,
    /// Hex-encoded 32-byte static secret key. Generated at startup when
    /// absent.
    #[serde(default)]
    pub static_secret_key: Option<String>,
}

impl Default for Sv2TemplateProviderConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            protocol_version: default_protocol_version(),
            optional_features: 0,
            default_coinbase_tx_additional_output_size: default_coinbase_output_size(),
            default_future_templates: default_future_templates(),
            interval: default_interval(),
            fee_delta: default_fee_delta(),
            cert_validity_sec: default_cert_validity(),
            authority_secret_key: None,
            static_secret_key: None,
        }
    }
}

impl Sv2TemplateProviderConfig {
    pub fn from_toml(raw: &str) -> Result<Self, TpError> {
        toml::from_str(raw).map_err(|e| TpError::BadConfig(e.to_string()))
    }
}

/// The key material loaded at start: the process-wide static key and the
/// authority key whose signature over it clients pin.
#[derive(Debug, Clone, Copy)]
pub struct Keystore {
    static_key: Keypair,
    authority_key: Keypair,
}

impl Keystore {
    /// Loads keys from the config, generating any that are not pinned.
    pub fn from_config(config: &Sv2TemplateProviderConfig) -> Result<Self, TpError> {
        let static_key = match &config.static_secret_key {
            Some(hex) => parse_secret_key(hex)?,
            None => generate_keypair(),
        };
        let authority_key = match &config.authority_secret_key {
            Some(hex) => parse_secret_key(hex)?,
            None => {
                let kp = generate_keypair();
                info!(
                    "Generated Template Provider authority key: {}",
                    kp.x_only_public_key().0
                );
                kp
            }
        };
        Ok(Self {
            static_key,
            authority_key,
        })
    }

    pub fn static_key(&self) -> Keypair {
        self.static_key
    }

    pub fn authority_key(&self) -> Keypair {
        self.authority_key
    }

    /// The x-only public key clients must pin to validate certificates.
    pub fn authority_public_key(&self) -> XOnlyPublicKey {
        self.authority_key.x_only_public_key().0
    }
}

fn parse_secret_key(hex: &str) -> Result<Keypair, TpError> {
    let bytes = <[u8; 32]>::from_hex(hex)
        .map_err(|e| TpError::BadConfig(format!("invalid secret key hex: {}", e)))?;
    let secret = SecretKey::from_slice(&bytes)
        .map_err(|e| TpError::BadConfig(format!("invalid secret key: {}", e)))?;
    Ok(Keypair::from_secret_key(&Secp256k1::new(), &secret))
}

fn generate_keypair() -> Keypair {
    let secp = Secp256k1::new();
    let (secret, _) = secp.generate_keypair(&mut rand::thread_rng());
    Keypair::from_secret_key(&secp, &secret)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = Sv2TemplateProviderConfig::default();
        assert_eq!(config.port, 8336);
        assert_eq!(config.protocol_version, 2);
        assert_eq!(config.interval, 30);
        assert_eq!(config.fee_delta, 1000);
        assert!(config.default_future_templates);
    }

    #[test]
    fn parse_partial_toml() {
        let config =
            Sv2TemplateProviderConfig::from_toml("port = 18447\nfee_delta = 500\n").unwrap();
        assert_eq!(config.port, 18447);
        assert_eq!(config.fee_delta, 500);
        assert_eq!(config.protocol_version, 2);
    }

    #[test]
    fn keystore_honours_pinned_keys() {
        let config = Sv2TemplateProviderConfig {
            authority_secret_key: Some(
                "1111111111111111111111111111111111111111111111111111111111111111".into(),
            ),
            ..Default::default()
        };
        let a = Keystore::from_config(&config).unwrap();
        let b = Keystore::from_config(&config).unwrap();
        assert_eq!(a.authority_public_key(), b.authority_public_key());
    }

    #[test]
    fn keystore_rejects_bad_hex() {
        let config = Sv2TemplateProviderConfig {
            authority_secret_key: Some("not-hex".into()),
            ..Default::default()
        };
        assert!(Keystore::from_config(&config).is_err());
    }
}
