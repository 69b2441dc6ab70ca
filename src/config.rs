//! Endpoint and handoff configuration
//!
//! Both types deserialize from JSON so the CLI can load them from a file, and
//! both validate before use; nothing downstream re-checks these fields.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    data_structures::{Network, PrivateKey},
    linkage::{MAX_SALT_BYTES, MIN_SALT_BYTES},
};

/// Storage URL selecting the in-memory wallet
pub const MEMORY_STORAGE_URL: &str = "memory://";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// One wallet endpoint as configured by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EndpointConfig {
    pub name: String,
    pub network: Network,
    /// Root private key, 64 lowercase hex characters
    pub private_key_hex: String,
    /// Where outputs are stored; `None` or `memory://` for the in-memory wallet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_url: Option<String>,
}

impl EndpointConfig {
    pub fn new(name: impl Into<String>, network: Network, private_key_hex: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            network,
            private_key_hex: private_key_hex.into(),
            storage_url: None,
        }
    }

    /// Config with a freshly generated root key
    pub fn generate(name: impl Into<String>, network: Network) -> Self {
        Self::new(name, network, PrivateKey::random().to_hex())
    }

    pub fn with_storage_url(mut self, storage_url: impl Into<String>) -> Self {
        self.storage_url = Some(storage_url.into());
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("name", "must not be empty"));
        }
        let key = &self.private_key_hex;
        if key.len() != 64
            || !key
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(ConfigError::invalid(
                "privateKeyHex",
                "expected 64 lowercase hex characters",
            ));
        }
        Ok(())
    }

    pub fn private_key(&self) -> ConfigResult<PrivateKey> {
        self.validate()?;
        PrivateKey::from_hex(&self.private_key_hex)
            .map_err(|e| ConfigError::invalid("privateKeyHex", e.to_string()))
    }

    /// Last four hex characters of the identity key, for display
    pub fn pub_key_suffix(&self) -> ConfigResult<String> {
        let identity = self.private_key()?.public_key().to_hex();
        Ok(identity[identity.len() - 4..].to_string())
    }

    pub fn uses_memory_storage(&self) -> bool {
        match self.storage_url.as_deref() {
            None => true,
            Some(url) => url == MEMORY_STORAGE_URL,
        }
    }
}

fn default_entropy_bytes() -> usize {
    MIN_SALT_BYTES
}

fn default_description() -> String {
    "Wallet handoff".to_string()
}

fn default_sender_label() -> String {
    "handoff".to_string()
}

/// Parameters of one handoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HandoffConfig {
    /// Satoshis moved from payer to payee
    pub amount: u64,
    /// Random bytes in each derivation salt
    #[serde(default = "default_entropy_bytes")]
    pub derivation_entropy_bytes: usize,
    /// Description of the funding and internalized actions
    #[serde(default = "default_description")]
    pub description: String,
    /// Label attached to the payer's funding action
    #[serde(default = "default_sender_label")]
    pub sender_label: String,
}

impl HandoffConfig {
    pub fn new(amount: u64) -> Self {
        Self {
            amount,
            derivation_entropy_bytes: default_entropy_bytes(),
            description: default_description(),
            sender_label: default_sender_label(),
        }
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_entropy_bytes(mut self, bytes: usize) -> Self {
        self.derivation_entropy_bytes = bytes;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_sender_label(mut self, label: impl Into<String>) -> Self {
        self.sender_label = label.into();
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.amount == 0 {
            return Err(ConfigError::invalid("amount", "must be greater than zero"));
        }
        if self.derivation_entropy_bytes < MIN_SALT_BYTES {
            return Err(ConfigError::invalid(
                "derivationEntropyBytes",
                format!("at least {MIN_SALT_BYTES} bytes (64 bits) required"),
            ));
        }
        if self.derivation_entropy_bytes > MAX_SALT_BYTES {
            return Err(ConfigError::invalid(
                "derivationEntropyBytes",
                format!("at most {MAX_SALT_BYTES} bytes, or the key id overflows"),
            ));
        }
        if self.description.trim().is_empty() {
            return Err(ConfigError::invalid("description", "must not be empty"));
        }
        Ok(())
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: HandoffConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_config_validation() {
        let config = EndpointConfig::generate("alice", Network::Test);
        assert!(config.validate().is_ok());
        assert_eq!(config.pub_key_suffix().unwrap().len(), 4);
        assert!(config.uses_memory_storage());

        let upper = EndpointConfig::new("alice", Network::Test, "AB".repeat(32));
        assert!(matches!(
            upper.validate(),
            Err(ConfigError::InvalidField { field: "privateKeyHex", .. })
        ));

        let unnamed = EndpointConfig::generate(" ", Network::Main);
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn test_suffix_matches_identity() {
        let key = PrivateKey::random();
        let identity = key.public_key().to_hex();
        let config = EndpointConfig::new("bob", Network::Main, key.to_hex());
        assert!(identity.ends_with(&config.pub_key_suffix().unwrap()));
    }

    #[test]
    fn test_handoff_config_defaults_from_json() {
        let config: HandoffConfig = serde_json::from_str(r#"{"amount": 5000}"#).unwrap();
        assert_eq!(config, HandoffConfig::new(5000));
        assert_eq!(config.derivation_entropy_bytes, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_handoff_config_rejects_weak_entropy_and_zero_amount() {
        assert!(HandoffConfig::new(0).validate().is_err());
        assert!(HandoffConfig::new(10).with_entropy_bytes(4).validate().is_err());
        assert!(HandoffConfig::new(10)
            .with_entropy_bytes(MAX_SALT_BYTES)
            .validate()
            .is_ok());
        assert!(matches!(
            HandoffConfig::new(10).with_entropy_bytes(700).validate(),
            Err(ConfigError::InvalidField {
                field: "derivationEntropyBytes",
                ..
            })
        ));
        assert!(serde_json::from_str::<HandoffConfig>(r#"{"amount": 1, "extra": true}"#).is_err());
    }
}
