use std::fmt;

/// Result type for pool and connection operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the pool and its connections
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Any failure reported by a server, the transport or the pool.
    ///
    /// The message is the best diagnostic available and uses the server
    /// client vocabulary verbatim ("NOT FOUND", "CONNECTION DATA EXISTS", ...).
    #[error("{0}")]
    Connection(String),
    /// Payload conversion failure. Reserved: the value codec degrades bad
    /// payloads to a missing value instead of raising this.
    #[error("value conversion failed")]
    Convert,
}

/// Coarse failure categories derived from the diagnostic text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    NotStored,
    Exhausted,
    Other,
}

impl Error {
    pub fn message(&self) -> &str {
        match self {
            Error::Connection(message) => message,
            Error::Convert => "",
        }
    }

    /// Classify this error by matching the diagnostic text.
    pub fn kind(&self) -> ErrorKind {
        match self.message() {
            m if m == ReturnCode::NotFound.as_str() => ErrorKind::NotFound,
            m if m == ReturnCode::DataExists.as_str() => ErrorKind::AlreadyExists,
            m if m == ReturnCode::NotStored.as_str() => ErrorKind::NotStored,
            m if m == ReturnCode::PoolExhausted.as_str() => ErrorKind::Exhausted,
            _ => ErrorKind::Other,
        }
    }
}

/// Status of one wire exchange (or local pre-flight check)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    Success,
    NotFound,
    DataExists,
    NotStored,
    ItemTooBig,
    InvalidArguments,
    BadKeyProvided,
    NonNumericValue,
    ClientError,
    ServerError,
    ServerMemoryFailure,
    UnknownCommand,
    ProtocolError,
    HostLookupFailure,
    ConnectionFailure,
    WriteFailure,
    ReadFailure,
    Timeout,
    NoServers,
    PoolExhausted,
    PoolShutDown,
    /// Status value the client has no name for
    Unknown(u16),
}

impl ReturnCode {
    pub fn is_success(self) -> bool {
        self == ReturnCode::Success
    }

    /// Fixed diagnostic text for this status. Empty for unknown statuses.
    pub fn as_str(self) -> &'static str {
        match self {
            ReturnCode::Success => "SUCCESS",
            ReturnCode::NotFound => "NOT FOUND",
            ReturnCode::DataExists => "CONNECTION DATA EXISTS",
            ReturnCode::NotStored => "NOT STORED",
            ReturnCode::ItemTooBig => "ITEM TOO BIG",
            ReturnCode::InvalidArguments => "INVALID ARGUMENTS",
            ReturnCode::BadKeyProvided => "A BAD KEY WAS PROVIDED/CHARACTERS OUT OF RANGE",
            ReturnCode::NonNumericValue => "CANNOT INCREMENT OR DECREMENT NON-NUMERIC VALUE",
            ReturnCode::ClientError => "CLIENT ERROR",
            ReturnCode::ServerError => "SERVER ERROR",
            ReturnCode::ServerMemoryFailure => "SERVER FAILED TO ALLOCATE OBJECT",
            ReturnCode::UnknownCommand => "UNKNOWN COMMAND",
            ReturnCode::ProtocolError => "PROTOCOL ERROR",
            ReturnCode::HostLookupFailure => "HOSTNAME LOOKUP FAILURE",
            ReturnCode::ConnectionFailure => "CONNECTION FAILURE",
            ReturnCode::WriteFailure => "WRITE FAILURE",
            ReturnCode::ReadFailure => "READ FAILURE",
            ReturnCode::Timeout => "A TIMEOUT OCCURRED",
            ReturnCode::NoServers => "NO SERVERS DEFINED",
            ReturnCode::PoolExhausted => "CONNECTION POOL EXHAUSTED",
            ReturnCode::PoolShutDown => "CONNECTION POOL SHUT DOWN",
            ReturnCode::Unknown(_) => "",
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnCode::Unknown(status) => write!(f, "UNKNOWN STATUS {:#06x}", status),
            code => f.write_str(code.as_str()),
        }
    }
}

/// Source of human readable failure text
pub trait Diagnostics {
    /// Text describing a specific status. May be empty.
    fn status_message(&self, code: ReturnCode) -> String {
        code.as_str().to_string()
    }

    /// Text of the most recent failure seen on the underlying connection.
    fn last_error_message(&self) -> String;
}

/// Diagnostics for failures that never reached a link
#[derive(Debug, Default, Clone)]
pub struct StaticDiagnostics {
    pub last_error: String,
}

impl Diagnostics for StaticDiagnostics {
    fn last_error_message(&self) -> String {
        self.last_error.clone()
    }
}

/// Map a return code onto the error taxonomy.
///
/// The status-specific text is preferred; when it is empty the provider's
/// last error is used, and failing that the message is empty.
pub fn check(code: ReturnCode, diagnostics: &dyn Diagnostics) -> Result<()> {
    if code.is_success() {
        return Ok(());
    }
    Err(error_for(code, diagnostics))
}

/// Build the error for a failed return code
pub fn error_for(code: ReturnCode, diagnostics: &dyn Diagnostics) -> Error {
    let mut message = diagnostics.status_message(code);
    if message.is_empty() {
        message = diagnostics.last_error_message();
    }
    Error::Connection(message)
}
