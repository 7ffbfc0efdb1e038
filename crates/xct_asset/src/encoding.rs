//! Text encodings used by table and markup assets.

use crate::error::{Error, Result};
use std::fmt;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Encoding of a text asset, kept so that write-back reproduces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8 { bom: bool },
    /// ISO-8859-1. Declared `windows-1252` files are read as this too.
    Latin1,
}

impl Default for TextEncoding {
    fn default() -> Self {
        TextEncoding::Utf8 { bom: false }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextEncoding::Utf8 { .. } => f.write_str("UTF-8"),
            TextEncoding::Latin1 => f.write_str("ISO-8859-1"),
        }
    }
}

impl TextEncoding {
    /// Map an encoding label (as found in a markup declaration) to an encoding.
    pub fn from_label(label: &str) -> Result<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8 { bom: false }),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "windows-1252" | "cp1252" => {
                Ok(TextEncoding::Latin1)
            }
            _ => Err(Error::UnsupportedEncoding(label.to_string())),
        }
    }

    /// Decode bytes. A UTF-8 BOM is stripped and remembered.
    pub fn decode(self, bytes: &[u8], path: &str) -> Result<(String, TextEncoding)> {
        match self {
            TextEncoding::Utf8 { .. } => {
                let (bom, body) = match bytes.strip_prefix(&UTF8_BOM) {
                    Some(rest) => (true, rest),
                    None => (false, bytes),
                };
                let text = std::str::from_utf8(body).map_err(|e| Error::Decode {
                    path: path.to_string(),
                    reason: e.to_string(),
                })?;
                Ok((text.to_string(), TextEncoding::Utf8 { bom }))
            }
            TextEncoding::Latin1 => Ok((latin1_to_string(bytes), TextEncoding::Latin1)),
        }
    }

    /// UTF-8 when valid, latin-1 otherwise.
    pub fn decode_lenient(bytes: &[u8]) -> (String, TextEncoding) {
        let (bom, body) = match bytes.strip_prefix(&UTF8_BOM) {
            Some(rest) => (true, rest),
            None => (false, bytes),
        };
        match std::str::from_utf8(body) {
            Ok(text) => (text.to_string(), TextEncoding::Utf8 { bom }),
            Err(_) => (latin1_to_string(bytes), TextEncoding::Latin1),
        }
    }

    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            TextEncoding::Utf8 { bom } => {
                let mut out = Vec::with_capacity(text.len() + 3);
                if bom {
                    out.extend_from_slice(&UTF8_BOM);
                }
                out.extend_from_slice(text.as_bytes());
                Ok(out)
            }
            TextEncoding::Latin1 => text
                .chars()
                .map(|ch| {
                    u8::try_from(u32::from(ch)).map_err(|_| Error::Unencodable {
                        encoding: self.to_string(),
                        ch,
                    })
                })
                .collect(),
        }
    }
}

fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_bom_preserved() {
        let bytes = b"\xEF\xBB\xBF<t/>".to_vec();
        let (text, enc) = TextEncoding::default().decode(&bytes, "a.xml").unwrap();
        assert_eq!(text, "<t/>");
        assert_eq!(enc, TextEncoding::Utf8 { bom: true });
        assert_eq!(enc.encode(&text).unwrap(), bytes);
    }

    #[test]
    fn test_latin1_round_trip() {
        let bytes = vec![b'M', 0xE4, b'r', b'z'];
        let (text, enc) = TextEncoding::decode_lenient(&bytes);
        assert_eq!(enc, TextEncoding::Latin1);
        assert_eq!(text, "M\u{e4}rz");
        assert_eq!(enc.encode(&text).unwrap(), bytes);
    }

    #[test]
    fn test_latin1_unencodable() {
        let err = TextEncoding::Latin1.encode("\u{20ac}");
        assert!(matches!(err, Err(Error::Unencodable { .. })));
    }

    #[test]
    fn test_label_lookup() {
        assert_eq!(
            TextEncoding::from_label("ISO-8859-1").unwrap(),
            TextEncoding::Latin1
        );
        assert!(TextEncoding::from_label("shift_jis").is_err());
    }
}
