//! Markup (XML) assets, kept verbatim.

use crate::encoding::TextEncoding;
use crate::error::Result;

/// A markup document held as text plus the encoding it was read in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupAsset {
    pub text: String,
    encoding: TextEncoding,
}

impl MarkupAsset {
    pub fn new(text: String, encoding: TextEncoding) -> Self {
        Self { text, encoding }
    }

    /// Decode bytes using the first line's encoding declaration, or UTF-8.
    pub fn decode(bytes: &[u8], path: &str) -> Result<Self> {
        let encoding = match declared_encoding(bytes) {
            Some(label) => TextEncoding::from_label(&label)?,
            None => TextEncoding::default(),
        };
        let (text, encoding) = encoding.decode(bytes, path)?;
        Ok(Self { text, encoding })
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        self.encoding.encode(&self.text)
    }
}

/// Encoding label from a `<?xml ... encoding="..."?>` declaration on the first line.
pub fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let end = bytes.iter().position(|&b| b == b'\n').unwrap_or(bytes.len());
    // The declaration itself is always ASCII.
    let first_line: String = bytes[..end].iter().map(|&b| char::from(b)).collect();

    let decl_start = first_line.find("<?xml")?;
    let decl = &first_line[decl_start..];
    let decl = &decl[..decl.find("?>")?];

    let attr = decl.find("encoding")?;
    let rest = decl[attr + "encoding".len()..].trim_start();
    let rest = rest.strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    let close = value.find(quote)?;
    Some(value[..close].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_declared_encoding() {
        let bytes = b"<?xml version=\"1.0\" encoding='ISO-8859-1' ?>\n<a/>";
        assert_eq!(declared_encoding(bytes).as_deref(), Some("ISO-8859-1"));
        assert_eq!(declared_encoding(b"<a/>\n<?xml encoding=\"x\"?>"), None);
    }

    #[test]
    fn test_decode_latin1_round_trip() {
        let mut bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<t>".to_vec();
        bytes.push(0xFC);
        bytes.extend_from_slice(b"</t>\n");

        let asset = MarkupAsset::decode(&bytes, "t/0001.xml").unwrap();
        assert_eq!(asset.encoding(), TextEncoding::Latin1);
        assert!(asset.text.contains('\u{fc}'));
        assert_eq!(asset.encode().unwrap(), bytes);
    }

    #[test]
    fn test_default_utf8() {
        let asset = MarkupAsset::decode("<t>\u{e9}</t>".as_bytes(), "a.xml").unwrap();
        assert_eq!(asset.encoding(), TextEncoding::Utf8 { bom: false });
    }

    #[test]
    fn test_unsupported_declared_encoding() {
        let err = MarkupAsset::decode(b"<?xml encoding=\"UTF-16\"?>\n", "a.xml");
        assert!(matches!(err, Err(Error::UnsupportedEncoding(_))));
    }
}
