//! Loading handoff and endpoint configuration from disk

use std::io::Write;

use tempfile::NamedTempFile;
use wallet_handoff_libs::{
    config::{ConfigError, EndpointConfig, HandoffConfig},
    data_structures::Network,
    wallet::WalletEndpointBuilder,
};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write config");
    file
}

#[test]
fn test_load_handoff_config_with_defaults() {
    let file = write_config(r#"{ "amount": 5000 }"#);
    let config = HandoffConfig::from_json_file(file.path()).unwrap();

    assert_eq!(config, HandoffConfig::new(5000));
    assert_eq!(config.derivation_entropy_bytes, 8);
    assert_eq!(config.sender_label, "handoff");
}

#[test]
fn test_load_handoff_config_overrides() {
    let file = write_config(
        r#"{
            "amount": 1200,
            "derivationEntropyBytes": 32,
            "description": "Move savings",
            "senderLabel": "savings"
        }"#,
    );
    let config = HandoffConfig::from_json_file(file.path()).unwrap();

    assert_eq!(config.amount, 1200);
    assert_eq!(config.derivation_entropy_bytes, 32);
    assert_eq!(config.description, "Move savings");
    assert_eq!(config.sender_label, "savings");
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = HandoffConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_malformed_config_is_parse_error() {
    let file = write_config(r#"{ "amount": "lots" }"#);
    assert!(matches!(
        HandoffConfig::from_json_file(file.path()),
        Err(ConfigError::Parse(_))
    ));

    let file = write_config(r#"{ "amount": 10, "colour": "blue" }"#);
    assert!(matches!(
        HandoffConfig::from_json_file(file.path()),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_weak_entropy_is_rejected_after_parsing() {
    let file = write_config(r#"{ "amount": 10, "derivationEntropyBytes": 4 }"#);
    assert!(matches!(
        HandoffConfig::from_json_file(file.path()),
        Err(ConfigError::InvalidField {
            field: "derivationEntropyBytes",
            ..
        })
    ));
}

#[test]
fn test_oversized_entropy_is_rejected_on_load() {
    let file = write_config(r#"{ "amount": 1000, "derivationEntropyBytes": 700 }"#);
    assert!(matches!(
        HandoffConfig::from_json_file(file.path()),
        Err(ConfigError::InvalidField {
            field: "derivationEntropyBytes",
            ..
        })
    ));
}

#[tokio::test]
async fn test_endpoint_config_builds_matching_endpoint() {
    let config = EndpointConfig::generate("carol", Network::Main);
    let json = serde_json::to_string(&config).unwrap();
    let parsed: EndpointConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);

    let endpoint = WalletEndpointBuilder::from_config(&parsed)
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(endpoint.name(), "carol");
    assert_eq!(endpoint.network().await.unwrap(), Network::Main);
    assert_eq!(
        endpoint.identity_key().await.unwrap(),
        parsed.private_key().unwrap().public_key()
    );
}
