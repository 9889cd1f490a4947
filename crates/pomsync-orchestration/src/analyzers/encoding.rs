//! Character encodings for descriptor files

use std::fmt;

use lazy_static::lazy_static;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

lazy_static! {
    static ref XML_DECL_ENCODING: Regex =
        Regex::new(r#"^<\?xml[^>]*?\sencoding\s*=\s*["']([A-Za-z][A-Za-z0-9._-]*)["']"#).unwrap();
}

/// Encodings a descriptor may declare in its prologue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    Utf8,
    Latin1,
    Ascii,
}

impl Encoding {
    /// Resolves an encoding label such as `UTF-8` or `iso-8859-1`
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Encoding::Utf8),
            "iso-8859-1" | "iso8859-1" | "iso_8859-1" | "latin1" | "latin-1" => {
                Some(Encoding::Latin1)
            }
            "us-ascii" | "ascii" => Some(Encoding::Ascii),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Latin1 => "ISO-8859-1",
            Encoding::Ascii => "US-ASCII",
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> std::result::Result<String, String> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string()),
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Encoding::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(offset) => Err(format!("non-ASCII byte at offset {}", offset)),
                None => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            },
        }
    }

    pub fn encode(&self, text: &str) -> std::result::Result<Vec<u8>, String> {
        let limit = match self {
            Encoding::Utf8 => return Ok(text.as_bytes().to_vec()),
            Encoding::Latin1 => 0xFF,
            Encoding::Ascii => 0x7F,
        };
        text.chars()
            .map(|c| {
                u8::try_from(u32::from(c))
                    .ok()
                    .filter(|b| u32::from(*b) <= limit)
                    .ok_or_else(|| format!("{:?} can not be encoded as {}", c, self.label()))
            })
            .collect()
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw descriptor bytes split into byte-order mark, declared encoding and body
#[derive(Debug)]
pub(crate) struct Sniffed<'a> {
    pub bom: bool,
    pub declared: Option<String>,
    pub body: &'a [u8],
}

pub(crate) fn sniff(bytes: &[u8]) -> Sniffed<'_> {
    let (bom, body) = match bytes.strip_prefix(UTF8_BOM) {
        Some(rest) => (true, rest),
        None => (false, bytes),
    };
    let declared = XML_DECL_ENCODING
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned());
    Sniffed {
        bom,
        declared,
        body,
    }
}

pub(crate) fn bom_bytes() -> &'static [u8] {
    UTF8_BOM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label() {
        assert_eq!(Encoding::from_label("UTF-8"), Some(Encoding::Utf8));
        assert_eq!(Encoding::from_label("iso-8859-1"), Some(Encoding::Latin1));
        assert_eq!(Encoding::from_label("US-ASCII"), Some(Encoding::Ascii));
        assert_eq!(Encoding::from_label("EBCDIC"), None);
    }

    #[test]
    fn test_sniff_declared_encoding() {
        let sniffed = sniff(b"<?xml version=\"1.0\" encoding='ISO-8859-1'?>\n<project/>");
        assert_eq!(sniffed.declared.as_deref(), Some("ISO-8859-1"));
        assert!(!sniffed.bom);

        let sniffed = sniff(b"<project/>");
        assert_eq!(sniffed.declared, None);
    }

    #[test]
    fn test_sniff_strips_bom() {
        let sniffed = sniff(b"\xEF\xBB\xBF<?xml version=\"1.0\" encoding=\"UTF-8\"?><a/>");
        assert!(sniffed.bom);
        assert!(sniffed.body.starts_with(b"<?xml"));
        assert_eq!(sniffed.declared.as_deref(), Some("UTF-8"));
    }

    #[test]
    fn test_latin1_round_trip() {
        let bytes = b"caf\xE9";
        let text = Encoding::Latin1.decode(bytes).unwrap();
        assert_eq!(text, "café");
        assert_eq!(Encoding::Latin1.encode(&text).unwrap(), bytes.to_vec());
    }

    #[test]
    fn test_unencodable_characters_fail() {
        assert!(Encoding::Latin1.encode("€").is_err());
        assert!(Encoding::Ascii.encode("é").is_err());
        assert!(Encoding::Ascii.decode(b"\xE9").is_err());
    }
}
