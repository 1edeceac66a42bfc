/// Flags value stored alongside UTF-8 text payloads
pub const TEXT_FLAG: u32 = 1;

/// Flags value stored alongside opaque byte payloads
pub const BYTES_FLAG: u32 = 2;

/// A cached payload tagged with how it should be read back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// The flags value written next to this payload
    pub fn flags(&self) -> u32 {
        match self {
            Value::Text(_) => TEXT_FLAG,
            Value::Bytes(_) => BYTES_FLAG,
        }
    }

    /// Raw payload as it goes on the wire
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Value::Text(text) => text.as_bytes(),
            Value::Bytes(bytes) => bytes,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            Value::Bytes(_) => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            Value::Text(text) => Some(text),
            Value::Bytes(_) => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            Value::Text(_) => None,
        }
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Bytes(bytes.to_vec())
    }
}

/// Encode a value into its wire payload and flags
pub fn encode(value: &Value) -> (&[u8], u32) {
    (value.as_bytes(), value.flags())
}

/// Decode a stored payload using its flags.
///
/// Unknown flags and text that is not valid UTF-8 decode to `None`, which
/// callers treat the same as a missing key.
pub fn decode(payload: Vec<u8>, flags: u32) -> Option<Value> {
    match flags {
        TEXT_FLAG => String::from_utf8(payload).ok().map(Value::Text),
        BYTES_FLAG => Some(Value::Bytes(payload)),
        _ => None,
    }
}
