use crate::core::distribution::DistributionKind;
use crate::core::option::{ConnectionOption, ServerOption, DEFAULT_PORT};
use crate::core::settings::{PoolSettings, MAX_WEIGHT};
use serde::{Deserialize, Serialize};

/// Client configuration as loaded from YAML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub binary_protocol: bool,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// `modula` or `consistent`
    #[serde(default)]
    pub distribution: Option<String>,
    #[serde(default)]
    pub tcp_nodelay: bool,
    #[serde(default)]
    pub tcp_keepalive: bool,
    /// Extra literal flags appended to the configuration string
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub weight: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    #[serde(default = "default_min_links")]
    pub min: usize,
    #[serde(default = "default_max_links")]
    pub max: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min: default_min_links(),
            max: default_max_links(),
        }
    }
}

/// Socket timeouts in milliseconds; unset means block indefinitely
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default)]
    pub connect_ms: Option<u64>,
    #[serde(default)]
    pub read_ms: Option<u64>,
    #[serde(default)]
    pub write_ms: Option<u64>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_min_links() -> usize {
    1
}
fn default_max_links() -> usize {
    2
}

impl ClientConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound(path.to_string()),
            _ => ConfigError::IoError(e.to_string()),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from a YAML string (useful for testing)
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for common errors
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one server is required".to_string(),
            ));
        }

        for server in &self.servers {
            if server.host.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "server host must not be empty".to_string(),
                ));
            }
            if server.weight == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "server '{}' has zero weight",
                    server.host
                )));
            }
            if server.weight.is_some_and(|weight| weight > MAX_WEIGHT) {
                return Err(ConfigError::ValidationError(format!(
                    "server '{}' weight exceeds {}",
                    server.host, MAX_WEIGHT
                )));
            }
        }

        if self.pool.max == 0 || self.pool.min > self.pool.max {
            return Err(ConfigError::ValidationError(format!(
                "invalid pool size (min {}, max {})",
                self.pool.min, self.pool.max
            )));
        }

        let timeouts = [
            ("connect_ms", self.timeouts.connect_ms),
            ("read_ms", self.timeouts.read_ms),
            ("write_ms", self.timeouts.write_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, ms)| *ms == Some(0)) {
            return Err(ConfigError::ValidationError(format!(
                "timeouts.{} must be greater than zero",
                name
            )));
        }

        if let Some(distribution) = &self.distribution {
            distribution
                .parse::<DistributionKind>()
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }

        Ok(())
    }

    /// Render into connection options for a pool
    pub fn to_options(&self) -> ConnectionOption {
        let mut options: Vec<ConnectionOption> = self
            .servers
            .iter()
            .map(|server| {
                let mut option = ServerOption::new(server.host.clone()).port(server.port);
                if let Some(weight) = server.weight {
                    option = option.weight(weight);
                }
                ConnectionOption::Server(option)
            })
            .collect();

        if self.binary_protocol {
            options.push(ConnectionOption::binary_protocol());
        }
        options.push(ConnectionOption::literal(format!("--POOL-MIN={}", self.pool.min)));
        options.push(ConnectionOption::literal(format!("--POOL-MAX={}", self.pool.max)));

        let timeouts = [
            ("--CONNECT-TIMEOUT", self.timeouts.connect_ms),
            ("--RCV-TIMEOUT", self.timeouts.read_ms),
            ("--SND-TIMEOUT", self.timeouts.write_ms),
        ];
        for (flag, millis) in timeouts {
            if let Some(millis) = millis {
                options.push(ConnectionOption::literal(format!("{}={}", flag, millis)));
            }
        }

        if self.tcp_nodelay {
            options.push(ConnectionOption::literal("--TCP-NODELAY"));
        }
        if self.tcp_keepalive {
            options.push(ConnectionOption::literal("--TCP-KEEPALIVE"));
        }
        if let Some(distribution) = &self.distribution {
            options.push(ConnectionOption::literal(format!(
                "--DISTRIBUTION={}",
                distribution
            )));
        }

        options.extend(self.options.iter().cloned().map(ConnectionOption::Literal));
        ConnectionOption::Composite(options)
    }

    /// Parse the rendered options the same way a pool would
    pub fn to_settings(&self) -> Result<PoolSettings, ConfigError> {
        PoolSettings::parse(&self.to_options().configuration())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}
