use crate::core::error::ReturnCode;
use std::io::{self, BufRead, BufReader, Read, Write};

pub mod ascii;
pub mod binary;

pub use ascii::{AsciiCommand, AsciiProtocol, AsciiResponse};
pub use binary::{BinaryProtocol, Opcode};

/// Longest key memcached accepts
pub const MAX_KEY_LENGTH: usize = 250;

/// Largest value body accepted from a server (memcached's default item limit plus headroom)
pub const MAX_BODY_LEN: usize = 16 * 1024 * 1024;

/// Core trait for wire protocol codecs
///
/// A protocol turns one [`Request`] into bytes on the transport and reads
/// back exactly one [`Reply`]. Server side failures come back as a reply with
/// a non-success code; only transport and framing failures are errors.
pub trait Protocol: Send + Sync {
    fn execute(&self, io: &mut dyn Transport, request: &Request<'_>) -> Result<Reply, ProtocolError>;

    /// Check a key before anything is written
    fn validate_key(&self, key: &[u8]) -> ReturnCode {
        if key.is_empty() || key.len() > MAX_KEY_LENGTH {
            ReturnCode::BadKeyProvided
        } else {
            ReturnCode::Success
        }
    }

    /// Protocol name
    fn name(&self) -> &str;
}

/// Protocol factory
pub fn create_protocol(binary: bool) -> Box<dyn Protocol> {
    if binary {
        Box::new(BinaryProtocol::new())
    } else {
        Box::new(AsciiProtocol::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Set,
    Add,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithMode {
    Increment,
    Decrement,
}

/// One command as the link hands it to a protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    Get {
        key: &'a [u8],
    },
    Store {
        mode: StoreMode,
        key: &'a [u8],
        data: &'a [u8],
        flags: u32,
        expire: u32,
    },
    Delete {
        key: &'a [u8],
        expire: u32,
    },
    Arith {
        mode: ArithMode,
        key: &'a [u8],
        delta: u64,
        initial: u64,
        expire: u32,
    },
    Flush {
        expire: u32,
    },
    Version,
}

impl<'a> Request<'a> {
    /// The key this request is routed by, if any
    pub fn key(&self) -> Option<&'a [u8]> {
        match self {
            Request::Get { key }
            | Request::Store { key, .. }
            | Request::Delete { key, .. }
            | Request::Arith { key, .. } => Some(key),
            Request::Flush { .. } | Request::Version => None,
        }
    }
}

/// Data carried by a successful reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Item { data: Vec<u8>, flags: u32 },
    Counter(u64),
    Version(String),
}

/// Outcome of one exchange with a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: ReturnCode,
    pub payload: Option<Payload>,
    /// Text the server sent along with a failure
    pub message: String,
}

impl Reply {
    pub fn success(payload: Option<Payload>) -> Self {
        Self {
            code: ReturnCode::Success,
            payload,
            message: String::new(),
        }
    }

    pub fn status(code: ReturnCode) -> Self {
        Self {
            code,
            payload: None,
            message: String::new(),
        }
    }

    pub fn failure(code: ReturnCode, message: impl Into<String>) -> Self {
        Self {
            code,
            payload: None,
            message: message.into(),
        }
    }
}

/// Byte stream a protocol talks over
pub trait Transport: BufRead + Write {}

impl<T: BufRead + Write> Transport for T {}

/// Buffered reads with direct writes over one duplex stream
pub struct Wire<T> {
    reader: BufReader<T>,
}

impl<T: Read + Write> Wire<T> {
    pub fn new(io: T) -> Self {
        Self {
            reader: BufReader::new(io),
        }
    }

    pub fn get_ref(&self) -> &T {
        self.reader.get_ref()
    }
}

impl<T: Read> Read for Wire<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<T: Read> BufRead for Wire<T> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt)
    }
}

impl<T: Write> Write for Wire<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.reader.get_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.reader.get_mut().flush()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("write failed: {0}")]
    Write(io::Error),
    #[error("read failed: {0}")]
    Read(io::Error),
    #[error("Protocol parse error: {0}")]
    ParseError(String),
}

impl ProtocolError {
    /// Return code reported for this transport failure
    pub fn return_code(&self) -> ReturnCode {
        match self {
            ProtocolError::Write(e) | ProtocolError::Read(e)
                if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) =>
            {
                ReturnCode::Timeout
            }
            ProtocolError::Write(_) => ReturnCode::WriteFailure,
            ProtocolError::Read(_) => ReturnCode::ReadFailure,
            ProtocolError::ParseError(_) => ReturnCode::ProtocolError,
        }
    }
}
