use super::{
    ArithMode, Payload, Protocol, ProtocolError, Reply, Request, StoreMode, Transport,
    MAX_BODY_LEN,
};
use crate::core::error::ReturnCode;
use std::sync::atomic::{AtomicU32, Ordering};

pub const REQUEST_MAGIC: u8 = 0x80;
pub const RESPONSE_MAGIC: u8 = 0x81;
pub const HEADER_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Get = 0x00,
    Set = 0x01,
    Add = 0x02,
    Replace = 0x03,
    Delete = 0x04,
    Increment = 0x05,
    Decrement = 0x06,
    Flush = 0x08,
    Version = 0x0b,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Opcode::Get),
            0x01 => Some(Opcode::Set),
            0x02 => Some(Opcode::Add),
            0x03 => Some(Opcode::Replace),
            0x04 => Some(Opcode::Delete),
            0x05 => Some(Opcode::Increment),
            0x06 => Some(Opcode::Decrement),
            0x08 => Some(Opcode::Flush),
            0x0b => Some(Opcode::Version),
            _ => None,
        }
    }
}

/// Map a binary response status onto a return code
pub fn status_to_code(status: u16) -> ReturnCode {
    match status {
        0x0000 => ReturnCode::Success,
        0x0001 => ReturnCode::NotFound,
        0x0002 => ReturnCode::DataExists,
        0x0003 => ReturnCode::ItemTooBig,
        0x0004 => ReturnCode::InvalidArguments,
        0x0005 => ReturnCode::NotStored,
        0x0006 => ReturnCode::NonNumericValue,
        0x0081 => ReturnCode::UnknownCommand,
        0x0082 => ReturnCode::ServerMemoryFailure,
        other => ReturnCode::Unknown(other),
    }
}

/// Decoded response header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub opcode: u8,
    pub key_len: u16,
    pub extras_len: u8,
    pub status: u16,
    pub body_len: u32,
    pub opaque: u32,
    pub cas: u64,
}

impl ResponseHeader {
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self, ProtocolError> {
        if bytes[0] != RESPONSE_MAGIC {
            return Err(ProtocolError::ParseError(format!(
                "bad response magic {:#04x}",
                bytes[0]
            )));
        }
        Ok(Self {
            opcode: bytes[1],
            key_len: u16::from_be_bytes([bytes[2], bytes[3]]),
            extras_len: bytes[4],
            status: u16::from_be_bytes([bytes[6], bytes[7]]),
            body_len: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            opaque: u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            cas: u64::from_be_bytes([
                bytes[16], bytes[17], bytes[18], bytes[19], bytes[20], bytes[21], bytes[22],
                bytes[23],
            ]),
        })
    }
}

/// Encode one request frame
pub fn encode_request(
    opcode: Opcode,
    key: &[u8],
    extras: &[u8],
    value: &[u8],
    opaque: u32,
    out: &mut Vec<u8>,
) {
    let body_len = (extras.len() + key.len() + value.len()) as u32;
    out.reserve(HEADER_LEN + body_len as usize);
    out.push(REQUEST_MAGIC);
    out.push(opcode as u8);
    out.extend_from_slice(&(key.len() as u16).to_be_bytes());
    out.push(extras.len() as u8);
    out.push(0); // data type
    out.extend_from_slice(&0u16.to_be_bytes()); // vbucket
    out.extend_from_slice(&body_len.to_be_bytes());
    out.extend_from_slice(&opaque.to_be_bytes());
    out.extend_from_slice(&0u64.to_be_bytes()); // cas
    out.extend_from_slice(extras);
    out.extend_from_slice(key);
    out.extend_from_slice(value);
}

/// Read one response frame, returning its header and full body
pub fn read_response(io: &mut dyn Transport) -> Result<(ResponseHeader, Vec<u8>), ProtocolError> {
    let mut header = [0u8; HEADER_LEN];
    io.read_exact(&mut header).map_err(ProtocolError::Read)?;
    let header = ResponseHeader::parse(&header)?;

    let body_len = header.body_len as usize;
    if body_len > MAX_BODY_LEN {
        return Err(ProtocolError::ParseError(format!(
            "response body of {} bytes exceeds limit",
            body_len
        )));
    }
    if (header.extras_len as usize + header.key_len as usize) > body_len {
        return Err(ProtocolError::ParseError(
            "extras and key longer than body".to_string(),
        ));
    }

    let mut body = vec![0u8; body_len];
    io.read_exact(&mut body).map_err(ProtocolError::Read)?;
    Ok((header, body))
}

/// memcached binary protocol codec
#[derive(Debug)]
pub struct BinaryProtocol {
    pub name: String,
    opaque: AtomicU32,
}

impl BinaryProtocol {
    pub fn new() -> Self {
        Self {
            name: "binary".to_string(),
            opaque: AtomicU32::new(0),
        }
    }

    fn next_opaque(&self) -> u32 {
        self.opaque.fetch_add(1, Ordering::Relaxed)
    }

    fn round_trip(
        &self,
        io: &mut dyn Transport,
        opcode: Opcode,
        key: &[u8],
        extras: &[u8],
        value: &[u8],
    ) -> Result<(ResponseHeader, Vec<u8>), ProtocolError> {
        let opaque = self.next_opaque();
        let mut frame = Vec::new();
        encode_request(opcode, key, extras, value, opaque, &mut frame);
        io.write_all(&frame).map_err(ProtocolError::Write)?;
        io.flush().map_err(ProtocolError::Write)?;

        let (header, body) = read_response(io)?;
        if header.opaque != opaque || Opcode::from_u8(header.opcode) != Some(opcode) {
            return Err(ProtocolError::ParseError(format!(
                "response does not match request (opcode {:#04x}, opaque {})",
                header.opcode, header.opaque
            )));
        }
        Ok((header, body))
    }
}

impl Default for BinaryProtocol {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a response body into (extras, key, value)
fn split_body(header: &ResponseHeader, body: &[u8]) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let extras_end = header.extras_len as usize;
    let key_end = extras_end + header.key_len as usize;
    (
        body[..extras_end].to_vec(),
        body[extras_end..key_end].to_vec(),
        body[key_end..].to_vec(),
    )
}

fn failure_reply(header: &ResponseHeader, body: &[u8]) -> Reply {
    let (_, _, value) = split_body(header, body);
    Reply::failure(
        status_to_code(header.status),
        String::from_utf8_lossy(&value).into_owned(),
    )
}

impl Protocol for BinaryProtocol {
    fn execute(&self, io: &mut dyn Transport, request: &Request<'_>) -> Result<Reply, ProtocolError> {
        match *request {
            Request::Get { key } => {
                let (header, body) = self.round_trip(io, Opcode::Get, key, &[], &[])?;
                if header.status != 0 {
                    return Ok(failure_reply(&header, &body));
                }
                let (extras, _, data) = split_body(&header, &body);
                let flags = match extras.as_slice() {
                    [a, b, c, d] => u32::from_be_bytes([*a, *b, *c, *d]),
                    _ => {
                        return Err(ProtocolError::ParseError(
                            "GET response without flags".to_string(),
                        ))
                    }
                };
                Ok(Reply::success(Some(Payload::Item { data, flags })))
            }
            Request::Store {
                mode,
                key,
                data,
                flags,
                expire,
            } => {
                let opcode = match mode {
                    StoreMode::Set => Opcode::Set,
                    StoreMode::Add => Opcode::Add,
                    StoreMode::Replace => Opcode::Replace,
                };
                let mut extras = [0u8; 8];
                extras[..4].copy_from_slice(&flags.to_be_bytes());
                extras[4..].copy_from_slice(&expire.to_be_bytes());
                let (header, body) = self.round_trip(io, opcode, key, &extras, data)?;
                if header.status != 0 {
                    return Ok(failure_reply(&header, &body));
                }
                Ok(Reply::success(None))
            }
            Request::Delete { key, expire } => {
                // Binary DELETE has no expiration field
                if expire != 0 {
                    return Ok(Reply::status(ReturnCode::InvalidArguments));
                }
                let (header, body) = self.round_trip(io, Opcode::Delete, key, &[], &[])?;
                if header.status != 0 {
                    return Ok(failure_reply(&header, &body));
                }
                Ok(Reply::success(None))
            }
            Request::Arith {
                mode,
                key,
                delta,
                initial,
                expire,
            } => {
                let opcode = match mode {
                    ArithMode::Increment => Opcode::Increment,
                    ArithMode::Decrement => Opcode::Decrement,
                };
                let mut extras = [0u8; 20];
                extras[..8].copy_from_slice(&delta.to_be_bytes());
                extras[8..16].copy_from_slice(&initial.to_be_bytes());
                extras[16..].copy_from_slice(&expire.to_be_bytes());
                let (header, body) = self.round_trip(io, opcode, key, &extras, &[])?;
                if header.status != 0 {
                    return Ok(failure_reply(&header, &body));
                }
                let (_, _, value) = split_body(&header, &body);
                let counter: [u8; 8] = value.as_slice().try_into().map_err(|_| {
                    ProtocolError::ParseError("counter response is not 8 bytes".to_string())
                })?;
                Ok(Reply::success(Some(Payload::Counter(u64::from_be_bytes(counter)))))
            }
            Request::Flush { expire } => {
                let (header, body) =
                    self.round_trip(io, Opcode::Flush, &[], &expire.to_be_bytes(), &[])?;
                if header.status != 0 {
                    return Ok(failure_reply(&header, &body));
                }
                Ok(Reply::success(None))
            }
            Request::Version => {
                let (header, body) = self.round_trip(io, Opcode::Version, &[], &[], &[])?;
                if header.status != 0 {
                    return Ok(failure_reply(&header, &body));
                }
                let (_, _, value) = split_body(&header, &body);
                Ok(Reply::success(Some(Payload::Version(
                    String::from_utf8_lossy(&value).into_owned(),
                ))))
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
