//! Parsing of the configuration string a pool is built from.

use crate::core::distribution::DistributionKind;
use crate::core::option::DEFAULT_PORT;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_POOL_MIN: usize = 1;
const DEFAULT_POOL_MAX: usize = 2;

/// Heaviest weight a single server may carry
pub const MAX_WEIGHT: u32 = 1000;

/// One server the pool distributes keys over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
    pub weight: u32,
}

impl ServerAddress {
    /// `host:port` form usable for socket address resolution
    pub fn endpoint(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Settings parsed out of a configuration string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub servers: Vec<ServerAddress>,
    pub binary_protocol: bool,
    pub pool_min: usize,
    pub pool_max: usize,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub tcp_nodelay: bool,
    pub tcp_keepalive: bool,
    pub distribution: DistributionKind,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            binary_protocol: false,
            pool_min: DEFAULT_POOL_MIN,
            pool_max: DEFAULT_POOL_MAX,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            tcp_nodelay: false,
            tcp_keepalive: false,
            distribution: DistributionKind::Modula,
        }
    }
}

impl PoolSettings {
    /// Parse a configuration string such as
    /// `--SERVER=127.0.0.1:11211 --BINARY-PROTOCOL --POOL-MAX=8`.
    pub fn parse(configuration: &str) -> Result<Self, OptionError> {
        let mut settings = PoolSettings::default();

        for token in configuration.split_whitespace() {
            let (name, value) = match token.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (token, None),
            };

            match (name.to_ascii_uppercase().as_str(), value) {
                ("--SERVER", Some(value)) => settings.servers.push(parse_server(value)?),
                ("--BINARY-PROTOCOL", None) => settings.binary_protocol = true,
                ("--TCP-NODELAY", None) => settings.tcp_nodelay = true,
                ("--TCP-KEEPALIVE", None) => settings.tcp_keepalive = true,
                ("--POOL-MIN", Some(value)) => settings.pool_min = parse_number(name, value)?,
                ("--POOL-MAX", Some(value)) => settings.pool_max = parse_number(name, value)?,
                ("--CONNECT-TIMEOUT", Some(value)) => {
                    settings.connect_timeout = Some(parse_millis(name, value)?)
                }
                ("--RCV-TIMEOUT", Some(value)) => {
                    settings.read_timeout = Some(parse_millis(name, value)?)
                }
                ("--SND-TIMEOUT", Some(value)) => {
                    settings.write_timeout = Some(parse_millis(name, value)?)
                }
                ("--DISTRIBUTION", Some(value)) => {
                    settings.distribution = value.parse().map_err(|_| OptionError::InvalidValue {
                        option: name.to_string(),
                        value: value.to_string(),
                    })?
                }
                _ => return Err(OptionError::UnknownOption(token.to_string())),
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), OptionError> {
        if self.servers.is_empty() {
            return Err(OptionError::NoServers);
        }
        if self.pool_max == 0 || self.pool_min > self.pool_max {
            return Err(OptionError::InvalidPoolSize {
                min: self.pool_min,
                max: self.pool_max,
            });
        }
        Ok(())
    }
}

impl FromStr for PoolSettings {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PoolSettings::parse(s)
    }
}

fn parse_server(value: &str) -> Result<ServerAddress, OptionError> {
    let invalid = || OptionError::InvalidServer(value.to_string());

    let (address, weight) = match value.split_once('/') {
        Some((address, weight)) => (address, weight.parse::<u32>().map_err(|_| invalid())?),
        None => (value, 1),
    };

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        // [v6-address]:port
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        match tail.strip_prefix(':') {
            Some(port) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None if tail.is_empty() => (host, DEFAULT_PORT),
            None => return Err(invalid()),
        }
    } else {
        match address.split_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None => (address, DEFAULT_PORT),
        }
    };

    if host.is_empty() || weight == 0 || weight > MAX_WEIGHT {
        return Err(invalid());
    }

    Ok(ServerAddress {
        host: host.to_string(),
        port,
        weight,
    })
}

fn parse_number(option: &str, value: &str) -> Result<usize, OptionError> {
    value.parse::<usize>().map_err(|_| OptionError::InvalidValue {
        option: option.to_string(),
        value: value.to_string(),
    })
}

/// Socket timeouts must be positive; leave the option out to block forever
fn parse_millis(option: &str, value: &str) -> Result<Duration, OptionError> {
    match value.parse::<u64>() {
        Ok(millis) if millis > 0 => Ok(Duration::from_millis(millis)),
        _ => Err(OptionError::InvalidValue {
            option: option.to_string(),
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionError {
    #[error("unknown option: {0}")]
    UnknownOption(String),
    #[error("invalid value for {option}: {value}")]
    InvalidValue { option: String, value: String },
    #[error("invalid server entry: {0}")]
    InvalidServer(String),
    #[error("no servers defined")]
    NoServers,
    #[error("invalid pool size (min {min}, max {max})")]
    InvalidPoolSize { min: usize, max: usize },
}
