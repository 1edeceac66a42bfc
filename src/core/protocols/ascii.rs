use super::{
    ArithMode, Payload, Protocol, ProtocolError, Reply, Request, StoreMode, Transport,
    MAX_BODY_LEN,
};
use crate::core::error::ReturnCode;

/// ASCII protocol command types
#[derive(Debug, Clone, PartialEq)]
pub enum AsciiCommand<'a> {
    Get {
        key: &'a str,
    },
    Set {
        key: &'a str,
        flags: u32,
        exptime: u32,
        bytes: usize,
    },
    Add {
        key: &'a str,
        flags: u32,
        exptime: u32,
        bytes: usize,
    },
    Replace {
        key: &'a str,
        flags: u32,
        exptime: u32,
        bytes: usize,
    },
    Delete {
        key: &'a str,
        exptime: u32,
    },
    Incr {
        key: &'a str,
        value: u64,
    },
    Decr {
        key: &'a str,
        value: u64,
    },
    FlushAll {
        exptime: u32,
    },
    Version,
}

impl AsciiCommand<'_> {
    /// Format the command line, including the trailing CRLF
    pub fn format(&self) -> String {
        match self {
            AsciiCommand::Get { key } => format!("get {}\r\n", key),
            AsciiCommand::Set {
                key,
                flags,
                exptime,
                bytes,
            } => format!("set {} {} {} {}\r\n", key, flags, exptime, bytes),
            AsciiCommand::Add {
                key,
                flags,
                exptime,
                bytes,
            } => format!("add {} {} {} {}\r\n", key, flags, exptime, bytes),
            AsciiCommand::Replace {
                key,
                flags,
                exptime,
                bytes,
            } => format!("replace {} {} {} {}\r\n", key, flags, exptime, bytes),
            AsciiCommand::Delete { key, exptime: 0 } => format!("delete {}\r\n", key),
            AsciiCommand::Delete { key, exptime } => format!("delete {} {}\r\n", key, exptime),
            AsciiCommand::Incr { key, value } => format!("incr {} {}\r\n", key, value),
            AsciiCommand::Decr { key, value } => format!("decr {} {}\r\n", key, value),
            AsciiCommand::FlushAll { exptime: 0 } => "flush_all\r\n".to_string(),
            AsciiCommand::FlushAll { exptime } => format!("flush_all {}\r\n", exptime),
            AsciiCommand::Version => "version\r\n".to_string(),
        }
    }
}

/// ASCII protocol response types
#[derive(Debug, Clone, PartialEq)]
pub enum AsciiResponse {
    Value { key: String, flags: u32, bytes: usize },
    Stored,
    NotStored,
    Exists,
    NotFound,
    Deleted,
    Ok,
    End,
    Numeric(u64),
    Version(String),
    Error(String),
    ClientError(String),
    ServerError(String),
}

impl AsciiResponse {
    /// Parse an ASCII response from a line
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(rest) = line.strip_prefix("VALUE ") {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            if parts.len() < 3 {
                return Err(ProtocolError::ParseError(
                    "Invalid VALUE response".to_string(),
                ));
            }
            let flags = parts[1]
                .parse::<u32>()
                .map_err(|_| ProtocolError::ParseError("Invalid flags".to_string()))?;
            let bytes = parts[2]
                .parse::<usize>()
                .map_err(|_| ProtocolError::ParseError("Invalid bytes".to_string()))?;
            return Ok(AsciiResponse::Value {
                key: parts[0].to_string(),
                flags,
                bytes,
            });
        }

        match line {
            "STORED" => Ok(AsciiResponse::Stored),
            "NOT_STORED" => Ok(AsciiResponse::NotStored),
            "EXISTS" => Ok(AsciiResponse::Exists),
            "NOT_FOUND" => Ok(AsciiResponse::NotFound),
            "DELETED" => Ok(AsciiResponse::Deleted),
            "OK" => Ok(AsciiResponse::Ok),
            "END" => Ok(AsciiResponse::End),
            _ if line.starts_with("CLIENT_ERROR") => Ok(AsciiResponse::ClientError(
                tail(line, "CLIENT_ERROR"),
            )),
            _ if line.starts_with("SERVER_ERROR") => Ok(AsciiResponse::ServerError(
                tail(line, "SERVER_ERROR"),
            )),
            _ if line.starts_with("ERROR") => Ok(AsciiResponse::Error(tail(line, "ERROR"))),
            _ if line.starts_with("VERSION ") => {
                Ok(AsciiResponse::Version(tail(line, "VERSION")))
            }
            _ if !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()) => line
                .parse::<u64>()
                .map(AsciiResponse::Numeric)
                .map_err(|_| ProtocolError::ParseError(format!("Invalid counter: {}", line))),
            _ => Err(ProtocolError::ParseError(format!(
                "Unknown response: {}",
                line
            ))),
        }
    }

    /// Return code and server text for a response that is not the success
    /// reply of the command that produced it
    fn into_failure(self) -> Reply {
        match self {
            AsciiResponse::NotStored => Reply::status(ReturnCode::NotStored),
            AsciiResponse::Exists => Reply::status(ReturnCode::DataExists),
            AsciiResponse::NotFound => Reply::status(ReturnCode::NotFound),
            AsciiResponse::Error(message) => Reply::failure(ReturnCode::UnknownCommand, message),
            AsciiResponse::ClientError(message) => {
                let code = if message.contains("non-numeric") {
                    ReturnCode::NonNumericValue
                } else {
                    ReturnCode::ClientError
                };
                Reply::failure(code, message)
            }
            AsciiResponse::ServerError(message) => {
                let code = if message.contains("out of memory") {
                    ReturnCode::ServerMemoryFailure
                } else if message.contains("too large") {
                    ReturnCode::ItemTooBig
                } else {
                    ReturnCode::ServerError
                };
                Reply::failure(code, message)
            }
            other => Reply::failure(ReturnCode::ProtocolError, format!("{:?}", other)),
        }
    }
}

fn tail(line: &str, prefix: &str) -> String {
    line[prefix.len()..].trim().to_string()
}

/// memcached text protocol codec
#[derive(Debug)]
pub struct AsciiProtocol {
    pub name: String,
}

impl AsciiProtocol {
    pub fn new() -> Self {
        Self {
            name: "ascii".to_string(),
        }
    }

    fn send(
        &self,
        io: &mut dyn Transport,
        command: &AsciiCommand<'_>,
        data: Option<&[u8]>,
    ) -> Result<(), ProtocolError> {
        io.write_all(command.format().as_bytes())
            .map_err(ProtocolError::Write)?;
        if let Some(data) = data {
            io.write_all(data).map_err(ProtocolError::Write)?;
            io.write_all(b"\r\n").map_err(ProtocolError::Write)?;
        }
        io.flush().map_err(ProtocolError::Write)
    }

    fn read_line(&self, io: &mut dyn Transport) -> Result<AsciiResponse, ProtocolError> {
        let mut line = Vec::new();
        let n = io.read_until(b'\n', &mut line).map_err(ProtocolError::Read)?;
        if n == 0 {
            return Err(ProtocolError::Read(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        let line = String::from_utf8(line)
            .map_err(|_| ProtocolError::ParseError("Response line is not UTF-8".to_string()))?;
        AsciiResponse::parse(&line)
    }

    fn get(&self, io: &mut dyn Transport, key: &str) -> Result<Reply, ProtocolError> {
        self.send(io, &AsciiCommand::Get { key }, None)?;

        let (flags, bytes) = match self.read_line(io)? {
            AsciiResponse::End => return Ok(Reply::status(ReturnCode::NotFound)),
            AsciiResponse::Value { flags, bytes, .. } => (flags, bytes),
            other => return Ok(other.into_failure()),
        };

        if bytes > MAX_BODY_LEN {
            return Err(ProtocolError::ParseError(format!(
                "value of {} bytes exceeds limit",
                bytes
            )));
        }

        // Read the data block plus its trailing CRLF
        let mut data = vec![0u8; bytes + 2];
        io.read_exact(&mut data).map_err(ProtocolError::Read)?;
        if !data.ends_with(b"\r\n") {
            return Err(ProtocolError::ParseError(
                "Data block not terminated by CRLF".to_string(),
            ));
        }
        data.truncate(bytes);

        match self.read_line(io)? {
            AsciiResponse::End => Ok(Reply::success(Some(Payload::Item { data, flags }))),
            other => Err(ProtocolError::ParseError(format!(
                "Expected END after value, got {:?}",
                other
            ))),
        }
    }

    fn store(
        &self,
        io: &mut dyn Transport,
        command: &AsciiCommand<'_>,
        data: &[u8],
    ) -> Result<Reply, ProtocolError> {
        self.send(io, command, Some(data))?;
        match self.read_line(io)? {
            AsciiResponse::Stored => Ok(Reply::success(None)),
            other => Ok(other.into_failure()),
        }
    }

    fn arith(&self, io: &mut dyn Transport, mode: ArithMode, key: &str, delta: u64) -> Result<Reply, ProtocolError> {
        let command = match mode {
            ArithMode::Increment => AsciiCommand::Incr { key, value: delta },
            ArithMode::Decrement => AsciiCommand::Decr { key, value: delta },
        };
        self.send(io, &command, None)?;
        match self.read_line(io)? {
            AsciiResponse::Numeric(value) => Ok(Reply::success(Some(Payload::Counter(value)))),
            other => Ok(other.into_failure()),
        }
    }

    /// incr/decr with an initial value. The text protocol has no such
    /// command, so a miss seeds the key with `add` and a lost `add` race
    /// retries the counter command once.
    fn arith_with_initial(
        &self,
        io: &mut dyn Transport,
        mode: ArithMode,
        key: &str,
        delta: u64,
        initial: u64,
        expire: u32,
    ) -> Result<Reply, ProtocolError> {
        let reply = self.arith(io, mode, key, delta)?;
        if reply.code != ReturnCode::NotFound {
            return Ok(reply);
        }

        let seed = initial.to_string();
        let add = AsciiCommand::Add {
            key,
            flags: 0,
            exptime: expire,
            bytes: seed.len(),
        };
        let seeded = self.store(io, &add, seed.as_bytes())?;
        match seeded.code {
            ReturnCode::Success => Ok(Reply::success(Some(Payload::Counter(initial)))),
            ReturnCode::NotStored => self.arith(io, mode, key, delta),
            _ => Ok(seeded),
        }
    }
}

impl Default for AsciiProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for AsciiProtocol {
    fn execute(&self, io: &mut dyn Transport, request: &Request<'_>) -> Result<Reply, ProtocolError> {
        let key = match request.key() {
            Some(key) => match std::str::from_utf8(key) {
                Ok(key) => key,
                Err(_) => return Ok(Reply::status(ReturnCode::BadKeyProvided)),
            },
            None => "",
        };

        match *request {
            Request::Get { .. } => self.get(io, key),
            Request::Store {
                mode,
                data,
                flags,
                expire,
                ..
            } => {
                let bytes = data.len();
                let command = match mode {
                    StoreMode::Set => AsciiCommand::Set {
                        key,
                        flags,
                        exptime: expire,
                        bytes,
                    },
                    StoreMode::Add => AsciiCommand::Add {
                        key,
                        flags,
                        exptime: expire,
                        bytes,
                    },
                    StoreMode::Replace => AsciiCommand::Replace {
                        key,
                        flags,
                        exptime: expire,
                        bytes,
                    },
                };
                self.store(io, &command, data)
            }
            Request::Delete { expire, .. } => {
                self.send(io, &AsciiCommand::Delete { key, exptime: expire }, None)?;
                match self.read_line(io)? {
                    AsciiResponse::Deleted => Ok(Reply::success(None)),
                    other => Ok(other.into_failure()),
                }
            }
            Request::Arith {
                mode,
                delta,
                initial,
                expire,
                ..
            } => self.arith_with_initial(io, mode, key, delta, initial, expire),
            Request::Flush { expire } => {
                self.send(io, &AsciiCommand::FlushAll { exptime: expire }, None)?;
                match self.read_line(io)? {
                    AsciiResponse::Ok => Ok(Reply::success(None)),
                    other => Ok(other.into_failure()),
                }
            }
            Request::Version => {
                self.send(io, &AsciiCommand::Version, None)?;
                match self.read_line(io)? {
                    AsciiResponse::Version(version) => {
                        Ok(Reply::success(Some(Payload::Version(version))))
                    }
                    other => Ok(other.into_failure()),
                }
            }
        }
    }

    /// Text protocol keys must also be free of whitespace and control bytes
    fn validate_key(&self, key: &[u8]) -> ReturnCode {
        if key.is_empty()
            || key.len() > super::MAX_KEY_LENGTH
            || key.iter().any(|b| b.is_ascii_whitespace() || b.is_ascii_control())
        {
            ReturnCode::BadKeyProvided
        } else {
            ReturnCode::Success
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
