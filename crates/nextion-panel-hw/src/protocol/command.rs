//! Outbound command encoding.
//!
//! Commands are ASCII instructions in the display's attribute-access
//! grammar, followed by the three-byte terminator:
//! - `get <object>.<attr>`
//! - `<object>.txt="<value>"`
//! - `<object>.val=<value>`

use std::borrow::Cow;

use super::frame::TERMINATOR;
use crate::{Error, Result};

/// Component attributes addressed by get/set commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    /// Text content (`.txt`).
    Text,
    /// Numeric value (`.val`).
    Value,
}

impl Attribute {
    pub fn as_str(self) -> &'static str {
        match self {
            Attribute::Text => "txt",
            Attribute::Value => "val",
        }
    }
}

/// Checks that a name can be spliced into a command unquoted.
pub fn validate_object_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && b != b'"' && b != b'=');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidObjectName(name.to_string()))
    }
}

/// Escapes quotes and backslashes inside a quoted text value.
pub fn escape_text(value: &str) -> Cow<'_, str> {
    if !value.contains(|c| c == '"' || c == '\\') {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Builds `get <object>.<attr>`.
pub fn build_get_command(object: &str, attribute: Attribute) -> Result<String> {
    validate_object_name(object)?;
    Ok(format!("get {}.{}", object, attribute.as_str()))
}

/// Builds `<object>.txt="<value>"`.
pub fn build_set_text_command(object: &str, value: &str) -> Result<String> {
    validate_object_name(object)?;
    Ok(format!("{}.txt=\"{}\"", object, escape_text(value)))
}

/// Builds `<object>.val=<value>`.
pub fn build_set_value_command(object: &str, value: i32) -> Result<String> {
    validate_object_name(object)?;
    Ok(format!("{}.val={}", object, value))
}

/// Appends the terminator to a command body.
pub fn build_packet(body: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(body.len() + TERMINATOR.len());
    packet.extend_from_slice(body);
    packet.extend_from_slice(&TERMINATOR);
    packet
}
