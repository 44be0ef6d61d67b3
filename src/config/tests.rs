use super::{parse_port, ClientConfig, Protocol, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT};
use crate::error::WriteError;
use crate::timestamp::Precision;
use anyhow::Error;
use std::collections::HashMap;
use std::time::Duration;

fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    move |name: &str| vars.get(name).cloned()
}

#[test]
fn test_endpoint_with_port() -> Result<(), WriteError> {
    let config = ClientConfig::new("192.168.1.9", "lyfe");

    assert_eq!(
        config.build_endpoint()?.as_str(),
        "http://192.168.1.9:8086/write?db=lyfe&precision=s"
    );
    Ok(())
}

#[test]
fn test_endpoint_without_port() -> Result<(), WriteError> {
    let mut config = ClientConfig::new("influx.example.com", "lyfe");
    config.port = None;
    config.protocol = Protocol::Https;
    config.precision = Precision::Microseconds;

    assert_eq!(
        config.build_endpoint()?.as_str(),
        "https://influx.example.com/write?db=lyfe&precision=u"
    );
    Ok(())
}

#[test]
fn test_endpoint_precision_tokens() -> Result<(), WriteError> {
    let mut config = ClientConfig::new("localhost", "metrics");
    config.precision = Precision::Milliseconds;

    let url = config.build_endpoint()?;
    let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert_eq!(
        query,
        vec![
            ("db".to_string(), "metrics".to_string()),
            ("precision".to_string(), "ms".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn test_endpoint_empty_server_is_config_error() {
    let config = ClientConfig::new("", "lyfe");
    assert!(matches!(config.build_endpoint(), Err(WriteError::Config(_))));
}

#[test]
fn test_endpoint_empty_database_is_config_error() {
    let config = ClientConfig::new("localhost", "");
    assert!(matches!(config.build_endpoint(), Err(WriteError::Config(_))));
}

#[test]
fn test_endpoint_malformed_server_is_config_error() {
    let config = ClientConfig::new("bad host name", "lyfe");
    assert!(matches!(config.build_endpoint(), Err(WriteError::Config(_))));
}

#[test]
fn test_from_vars_defaults() -> Result<(), Error> {
    let config = ClientConfig::from_vars(lookup_from(&[
        ("server", "localhost"),
        ("database_name", "lyfe"),
    ]))?;

    assert_eq!(config, ClientConfig::new("localhost", "lyfe"));
    assert_eq!(config.port, Some(DEFAULT_PORT));
    assert_eq!(config.protocol, Protocol::Http);
    assert_eq!(config.precision, Precision::Seconds);
    assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    Ok(())
}

#[test]
fn test_from_vars_all_values() -> Result<(), Error> {
    let config = ClientConfig::from_vars(lookup_from(&[
        ("server", "influx.example.com"),
        ("database_name", "lyfe"),
        ("port", "none"),
        ("protocol", "https"),
        ("precision", "us"),
        ("request_timeout_ms", "2500"),
    ]))?;

    assert_eq!(config.server, "influx.example.com");
    assert_eq!(config.port, None);
    assert_eq!(config.protocol, Protocol::Https);
    assert_eq!(config.precision, Precision::Microseconds);
    assert_eq!(config.request_timeout, Duration::from_millis(2500));
    Ok(())
}

#[test]
fn test_from_vars_missing_server() {
    let result = ClientConfig::from_vars(lookup_from(&[("database_name", "lyfe")]));
    assert!(result.is_err());
}

#[test]
fn test_from_vars_missing_database() {
    let result = ClientConfig::from_vars(lookup_from(&[("server", "localhost")]));
    assert!(result.is_err());
}

#[test]
fn test_from_vars_invalid_values() {
    for (name, value) in [
        ("port", "70000"),
        ("protocol", "udp"),
        ("precision", "ns"),
        ("request_timeout_ms", "soon"),
    ] {
        let result = ClientConfig::from_vars(lookup_from(&[
            ("server", "localhost"),
            ("database_name", "lyfe"),
            (name, value),
        ]));
        assert!(result.is_err(), "{name}={value} should be rejected");
    }
}

#[test]
fn test_parse_port() -> Result<(), Error> {
    assert_eq!(parse_port("8086")?, Some(8086));
    assert_eq!(parse_port("")?, None);
    assert_eq!(parse_port("None")?, None);
    assert!(parse_port("-1").is_err());
    Ok(())
}

#[test]
fn test_protocol_round_trip() -> Result<(), String> {
    assert_eq!("HTTPS".parse::<Protocol>()?, Protocol::Https);
    assert_eq!(Protocol::Http.to_string(), "http");
    Ok(())
}
