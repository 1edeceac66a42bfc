use std::fmt;

/// Port memcached listens on unless told otherwise
pub const DEFAULT_PORT: u16 = 11211;

/// One fragment of pool configuration
///
/// Options render into the space separated configuration string consumed by
/// [`ConnectionPool::new`](crate::core::ConnectionPool::new). Nothing is
/// validated here; malformed fragments surface when the pool parses them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOption {
    /// Rendered verbatim, e.g. `--BINARY-PROTOCOL`
    Literal(String),
    /// Rendered as `--SERVER=<host>:<port>[/<weight>]`
    Server(ServerOption),
    /// Children rendered in order, joined by single spaces
    Composite(Vec<ConnectionOption>),
}

/// A cache server entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOption {
    pub host: String,
    pub port: u16,
    pub weight: Option<u32>,
}

impl ServerOption {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            weight: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn configuration(&self) -> String {
        match self.weight {
            Some(weight) => format!("--SERVER={}:{}/{}", self.host, self.port, weight),
            None => format!("--SERVER={}:{}", self.host, self.port),
        }
    }
}

impl ConnectionOption {
    pub fn literal(value: impl Into<String>) -> Self {
        ConnectionOption::Literal(value.into())
    }

    pub fn server(host: impl Into<String>) -> Self {
        ConnectionOption::Server(ServerOption::new(host))
    }

    /// Flag selecting the binary wire protocol
    pub fn binary_protocol() -> Self {
        ConnectionOption::literal("--BINARY-PROTOCOL")
    }

    pub fn composite<I, T>(options: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ConnectionOption>,
    {
        ConnectionOption::Composite(options.into_iter().map(Into::into).collect())
    }

    /// Build a composite out of raw literal fragments
    pub fn from_literals<I, S>(literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConnectionOption::Composite(
            literals
                .into_iter()
                .map(|s| ConnectionOption::Literal(s.into()))
                .collect(),
        )
    }

    /// Render this option into configuration string form
    pub fn configuration(&self) -> String {
        match self {
            ConnectionOption::Literal(value) => value.clone(),
            ConnectionOption::Server(server) => server.configuration(),
            ConnectionOption::Composite(children) => children
                .iter()
                .map(ConnectionOption::configuration)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl fmt::Display for ConnectionOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.configuration())
    }
}

impl From<&str> for ConnectionOption {
    fn from(value: &str) -> Self {
        ConnectionOption::Literal(value.to_string())
    }
}

impl From<String> for ConnectionOption {
    fn from(value: String) -> Self {
        ConnectionOption::Literal(value)
    }
}

impl From<ServerOption> for ConnectionOption {
    fn from(server: ServerOption) -> Self {
        ConnectionOption::Server(server)
    }
}

impl<T: Into<ConnectionOption>> FromIterator<T> for ConnectionOption {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ConnectionOption::composite(iter)
    }
}
