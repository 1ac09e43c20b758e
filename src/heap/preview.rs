//! Best-effort content previews of block payloads
//!
//! The bytes at a block's `addr` are arbitrary allocator payload. They are read
//! as a NUL-terminated run capped at the configured limit, and anything that is
//! not printable ASCII is escaped. A failed read becomes a placeholder rather
//! than an error: the preview is diagnostic only.

use crate::session::value::Address;
use crate::session::InspectionSession;
use serde::Serialize;
use std::fmt;

/// Rendered content of the bytes a block points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Preview {
    /// Escaped text; `truncated` when no terminator was seen within the limit
    Text { text: String, truncated: bool },
    /// The payload address could not be read
    Unreadable { reason: String },
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preview::Text { text, truncated } => {
                write!(f, "\"{}\"", text)?;
                if *truncated {
                    write!(f, "...")?;
                }
                Ok(())
            }
            Preview::Unreadable { reason } => write!(f, "<error: {}>", reason),
        }
    }
}

/// Read and render up to `limit` bytes at `addr`
pub(crate) fn read_preview<S>(session: &S, addr: Address, limit: usize) -> Preview
where
    S: InspectionSession + ?Sized,
{
    // One byte past the limit tells a terminated run from a truncated one
    let bytes = match session.read_memory(addr, limit.saturating_add(1)) {
        Ok(bytes) => bytes,
        Err(e) => {
            return Preview::Unreadable {
                reason: e.to_string(),
            }
        }
    };

    match bytes.iter().position(|&b| b == 0) {
        Some(end) if end <= limit => Preview::Text {
            text: escape_bytes(&bytes[..end]),
            truncated: false,
        },
        _ => Preview::Text {
            text: escape_bytes(&bytes[..bytes.len().min(limit)]),
            truncated: true,
        },
    }
}

/// Escape a byte run the way a debugger prints a `char *`
pub(crate) fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b' '..=b'~' => out.push(byte as char),
            _ => out.push_str(&format!("\\{:03o}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_printable_and_binary() {
        assert_eq!(escape_bytes(b"tag"), "tag");
        assert_eq!(escape_bytes(b"a\"b\\c"), "a\\\"b\\\\c");
        assert_eq!(escape_bytes(&[0xff, b'x', 0x01]), "\\377x\\001");
        assert_eq!(escape_bytes(b"line\n"), "line\\n");
    }

    #[test]
    fn test_display() {
        let text = Preview::Text {
            text: "hello".to_string(),
            truncated: false,
        };
        assert_eq!(text.to_string(), "\"hello\"");

        let cut = Preview::Text {
            text: "hel".to_string(),
            truncated: true,
        };
        assert_eq!(cut.to_string(), "\"hel\"...");

        let bad = Preview::Unreadable {
            reason: "cannot access memory at address 0x10".to_string(),
        };
        assert_eq!(
            bad.to_string(),
            "<error: cannot access memory at address 0x10>"
        );
    }
}
