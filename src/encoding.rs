//! Text helpers: ASCII-safe rendering for public messages and decoding of
//! raw bytes into text.

use crate::types::Value;

/// Start of the private-use block that carries undecodable bytes when
/// decoding with [`ByteDecoding::Escape`]. Byte `b` maps to `ESCAPE_BASE + b`.
const ESCAPE_BASE: u32 = 0x10_FE00;

/// How a text field turns raw bytes into a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteDecoding {
    /// Input must be valid UTF-8.
    #[default]
    Strict,
    /// Invalid bytes are kept as private-use characters
    /// (U+10FE80..U+10FEFF), so the original bytes can be restored.
    Escape,
}

impl ByteDecoding {
    /// Parse a decoding name (`"strict"` or `"escape"`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(ByteDecoding::Strict),
            "escape" => Some(ByteDecoding::Escape),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ByteDecoding::Strict => "strict",
            ByteDecoding::Escape => "escape",
        }
    }
}

/// Decode UTF-8 bytes, replacing each invalid byte with its escape character.
///
/// Never fails; [`encode_escaped`] restores the original bytes, unless the
/// input already holds genuine characters in U+10FE80..U+10FEFF. Those are
/// indistinguishable from escapes: they encode back as single raw bytes,
/// and byte-length checks count them as one byte each.
pub fn decode_escaped(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(err) => {
                let (valid, after) = rest.split_at(err.valid_up_to());
                // valid_up_to() guarantees this prefix is UTF-8
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let bad_len = err.error_len().unwrap_or(after.len());
                for &b in &after[..bad_len] {
                    out.push(escape_char(b));
                }
                rest = &after[bad_len..];
            }
        }
    }
}

/// Encode a string to UTF-8, turning escape characters back into the
/// bytes they stand for.
pub fn encode_escaped(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut buf = [0u8; 4];
    for c in s.chars() {
        match unescape_char(c) {
            Some(b) => out.push(b),
            None => out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes()),
        }
    }
    out
}

fn escape_char(b: u8) -> char {
    char::from_u32(ESCAPE_BASE + u32::from(b)).unwrap_or(char::REPLACEMENT_CHARACTER)
}

fn unescape_char(c: char) -> Option<u8> {
    let cp = c as u32;
    if (ESCAPE_BASE + 0x80..=ESCAPE_BASE + 0xFF).contains(&cp) {
        u8::try_from(cp - ESCAPE_BASE).ok()
    } else {
        None
    }
}

/// Convert a string to an ASCII-only representation.
///
/// Non-ASCII characters are written as `\xNN`, `\uNNNN` or `\UNNNNNNNN`;
/// escaped bytes come out as `\xNN` of the original byte.
pub fn ascii_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        let cp = match unescape_char(c) {
            Some(b) => u32::from(b),
            None => c as u32,
        };
        if cp <= 0xFF {
            out.push_str(&format!("\\x{:02x}", cp));
        } else if cp <= 0xFFFF {
            out.push_str(&format!("\\u{:04x}", cp));
        } else {
            out.push_str(&format!("\\U{:08x}", cp));
        }
    }
    out
}

/// ASCII-only rendering of any value, for use inside public messages.
pub fn ascii_repr(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => ascii_str(s),
        Value::Bytes(b) => ascii_str(&decode_escaped(b)),
        Value::DateTime(dt) => dt.to_rfc3339(),
        Value::ZonedDateTime(dt) => dt.to_rfc3339(),
        Value::NaiveDateTime(dt) => dt.to_string(),
        Value::Net(ip, prefix) => format!("{}/{}", ascii_str(ip), prefix),
        Value::List(items) => format!(
            "[{}]",
            items.iter().map(quoted_repr).collect::<Vec<_>>().join(", ")
        ),
        Value::Dict(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("'{}': {}", ascii_str(k), quoted_repr(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn quoted_repr(value: &Value) -> String {
    if value.is_text() {
        format!("'{}'", ascii_repr(value))
    } else {
        ascii_repr(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn decode_escaped_keeps_valid_utf8() {
        assert_eq!(decode_escaped("ołówek".as_bytes()), "ołówek");
    }

    #[test]
    fn decode_escaped_is_reversible() {
        let raw: &[u8] = b"http://x/\xdd-TRALAL\xc4\x85.html\xcc";
        let decoded = decode_escaped(raw);
        assert_eq!(decoded.chars().count(), 24);
        assert!(decoded.contains("TRALALą"));
        assert_eq!(encode_escaped(&decoded), raw);
    }

    #[test]
    fn genuine_escape_range_characters_collapse() {
        let raw = "a\u{10FE80}".as_bytes();
        let decoded = decode_escaped(raw);
        assert_eq!(decoded, "a\u{10FE80}");
        assert_eq!(encode_escaped(&decoded), b"a\x80");
        // just outside the range is untouched
        let outside = "a\u{10FE7F}";
        assert_eq!(encode_escaped(outside), outside.as_bytes());
    }

    #[test]
    fn ascii_str_escapes_non_ascii() {
        assert_eq!(ascii_str("Ala ma kota\n"), "Ala ma kota\n");
        assert_eq!(ascii_str("błąd"), "b\\u0142\\u0105d");
        assert_eq!(ascii_str("ó"), "\\xf3");
        assert_eq!(ascii_str("\u{1F600}"), "\\U0001f600");
    }

    #[test]
    fn ascii_str_shows_escaped_bytes() {
        let decoded = decode_escaped(b"xyz\xdd");
        assert_eq!(ascii_str(&decoded), "xyz\\xdd");
    }

    #[test]
    fn ascii_repr_of_composite_values() {
        let mut item = BTreeMap::new();
        item.insert("ip".to_string(), Value::from("333.1.1.1"));
        item.insert("asn".to_string(), Value::Int(5));
        let value = Value::List(vec![Value::Dict(item)]);
        assert_eq!(ascii_repr(&value), "[{'asn': 5, 'ip': '333.1.1.1'}]");
    }

    #[test]
    fn byte_decoding_parse() {
        assert_eq!(ByteDecoding::parse("escape"), Some(ByteDecoding::Escape));
        assert_eq!(ByteDecoding::parse("strict"), Some(ByteDecoding::Strict));
        assert_eq!(ByteDecoding::parse("ignore"), None);
    }
}
