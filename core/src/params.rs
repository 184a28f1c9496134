//! Ordered `key=value&key=value` parameter lists for query strings and
//! form bodies.
//!
//! Values are percent-encoded as UTF-8; field names are written verbatim and
//! must be literals that are already safe in a query string, which is why they
//! are `&'static str`. Serialization consumes the builder, so a list cannot be
//! mutated after it has been turned into a request.

use std::fmt;

use crate::error::ApiError;

/// Builder for an encoded parameter list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    encoded: String,
}

impl Params {
    /// An empty list.
    pub fn start() -> Self {
        Self::default()
    }

    /// A list seeded with one pair.
    pub fn start_with(field: &'static str, value: impl fmt::Display) -> Self {
        Self::start().add_param(field, value)
    }

    /// Append `field=value`, separating from any previous pair with `&`.
    pub fn add_param(mut self, field: &'static str, value: impl fmt::Display) -> Self {
        if !self.encoded.is_empty() {
            self.encoded.push('&');
        }
        self.encoded.push_str(field);
        self.encoded.push('=');
        encode_into(&mut self.encoded, &value.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }

    /// Serialize the list. An empty list yields the empty string.
    pub fn finish(self) -> String {
        self.encoded
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Percent-encode a single value.
pub fn encode_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    encode_into(&mut out, value);
    out
}

/// Interpret foreign bytes as the UTF-8 text of parameter `field`.
///
/// Fails instead of substituting a lossy or empty value.
pub fn utf8_value<'a>(field: &'static str, bytes: &'a [u8]) -> Result<&'a str, ApiError> {
    std::str::from_utf8(bytes).map_err(|e| ApiError::Encoding {
        field,
        reason: e.to_string(),
    })
}

fn encode_into(out: &mut String, value: &str) {
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                out.push('%');
                out.push(HEX[(byte >> 4) as usize] as char);
                out.push(HEX[(byte & 0x0F) as usize] as char);
            }
        }
    }
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";
