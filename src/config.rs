use crate::error::WriteError;
use crate::timestamp::Precision;
use anyhow::{anyhow, Error};
use log::trace;
use reqwest::Url;
use std::str::FromStr;
use std::time::{Duration, Instant};

pub const DEFAULT_PORT: u16 = 8086;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const SERVER_VAR: &str = "server";
const DATABASE_NAME_VAR: &str = "database_name";
const PORT_VAR: &str = "port";
const PROTOCOL_VAR: &str = "protocol";
const PRECISION_VAR: &str = "precision";
const REQUEST_TIMEOUT_MS_VAR: &str = "request_timeout_ms";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Protocol::Http => "http".fmt(f),
            Protocol::Https => "https".fmt(f),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(format!("unsupported protocol {other}, expected http or https")),
        }
    }
}

/// Where and how points are written.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub protocol: Protocol,
    pub server: String,
    /// `None` leaves the port out of the URL.
    pub port: Option<u16>,
    /// Must already exist on the server.
    pub database: String,
    pub precision: Precision,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(server: impl Into<String>, database: impl Into<String>) -> Self {
        ClientConfig {
            protocol: Protocol::default(),
            server: server.into(),
            port: Some(DEFAULT_PORT),
            database: database.into(),
            precision: Precision::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// `{protocol}://{server}[:{port}]/write?db={database}&precision={token}`
    pub fn build_endpoint(&self) -> Result<Url, WriteError> {
        if self.server.is_empty() {
            return Err(WriteError::Config("server is empty".to_string()));
        }
        if self.database.is_empty() {
            return Err(WriteError::Config("database is empty".to_string()));
        }

        let base = match self.port {
            Some(port) => format!("{}://{}:{}/write", self.protocol, self.server, port),
            None => format!("{}://{}/write", self.protocol, self.server),
        };
        let mut url = Url::parse(&base)
            .map_err(|error| WriteError::Config(format!("{base}: {error}")))?;
        if url.host_str().is_none() {
            return Err(WriteError::Config(format!("{base}: missing host")));
        }
        url.query_pairs_mut()
            .append_pair("db", &self.database)
            .append_pair("precision", self.precision.token());
        Ok(url)
    }

    /// Builds the configuration from the process environment.
    pub fn from_env() -> Result<ClientConfig, Error> {
        ClientConfig::from_vars(|name: &str| std::env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, which maps variable names to
    /// values the way the process environment does.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<ClientConfig, Error> {
        validate_variables(&lookup)?;

        let function_start = Instant::now();
        let mut config = ClientConfig::new(
            lookup(SERVER_VAR).unwrap_or_default(),
            lookup(DATABASE_NAME_VAR).unwrap_or_default(),
        );

        if let Some(port) = lookup(PORT_VAR) {
            config.port = parse_port(&port)?;
        }
        if let Some(protocol) = lookup(PROTOCOL_VAR) {
            config.protocol = protocol.parse().map_err(|error: String| anyhow!(error))?;
        }
        if let Some(precision) = lookup(PRECISION_VAR) {
            config.precision = precision.parse().map_err(|error: String| anyhow!(error))?;
        }
        if let Some(timeout) = lookup(REQUEST_TIMEOUT_MS_VAR) {
            config.request_timeout = Duration::from_millis(timeout.parse()?);
        }

        trace!("from_vars duration: {:?}", function_start.elapsed());
        Ok(config)
    }
}

pub fn validate_env_variables() -> Result<(), Error> {
    // Validate environment variables before any client is built
    validate_variables(&|name: &str| std::env::var(name).ok())
}

fn validate_variables(lookup: &impl Fn(&str) -> Option<String>) -> Result<(), Error> {
    let function_start = Instant::now();

    match lookup(SERVER_VAR) {
        Some(server) if !server.is_empty() => (),
        _ => return Err(anyhow!("server environment variable is not defined")),
    }
    match lookup(DATABASE_NAME_VAR) {
        Some(database) if !database.is_empty() => (),
        _ => return Err(anyhow!("database_name environment variable is not defined")),
    }

    if let Some(port) = lookup(PORT_VAR) {
        parse_port(&port)?;
    }
    if let Some(protocol) = lookup(PROTOCOL_VAR) {
        Protocol::from_str(&protocol).map_err(|error| anyhow!(error))?;
    }
    if let Some(precision) = lookup(PRECISION_VAR) {
        Precision::from_str(&precision).map_err(|error| anyhow!(error))?;
    }
    if let Some(timeout) = lookup(REQUEST_TIMEOUT_MS_VAR) {
        if timeout.parse::<u64>().is_err() {
            return Err(anyhow!(
                "request_timeout_ms must be a whole number of milliseconds, got {timeout}"
            ));
        }
    }

    trace!(
        "validate_variables duration: {:?}",
        function_start.elapsed()
    );
    Ok(())
}

/// An empty value or `none` disables the port.
pub fn parse_port(value: &str) -> Result<Option<u16>, Error> {
    match value.to_lowercase().as_str() {
        "" | "none" => Ok(None),
        port => port
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("port must be a number between 0 and 65535, got {value}")),
    }
}

#[cfg(test)]
pub mod tests;
