//! Offset-verified byte substitutions in compiled artifacts.
//!
//! A [`BinaryPatch`] names an artifact, an offset relative to the artifact's
//! logical start, the bytes expected there and the bytes to put there instead.
//! Reference and replacement must have the same length: the artifacts are
//! fixed-layout bytecode and shifting anything corrupts every later offset.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Header bytes preceding the logical start, per artifact extension.
pub const HEADER_LENGTHS: &[(&str, usize)] = &[("obj", 8)];

/// Header length for an artifact path, chosen by its extension.
pub fn header_len_for(artifact: &str) -> usize {
    let file_name = artifact.rsplit(['/', '\\']).next().unwrap_or(artifact);
    let ext = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return 0,
    };
    HEADER_LENGTHS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, len)| *len)
        .unwrap_or(0)
}

/// One byte substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryPatch {
    /// Virtual path of the artifact.
    pub artifact: String,
    /// Offset from the artifact's logical start.
    pub offset: u64,
    #[serde(serialize_with = "to_hex", deserialize_with = "from_hex")]
    pub reference: Vec<u8>,
    #[serde(serialize_with = "to_hex", deserialize_with = "from_hex")]
    pub replacement: Vec<u8>,
}

impl BinaryPatch {
    /// Build a validated patch.
    pub fn new(
        artifact: impl Into<String>,
        offset: u64,
        reference: Vec<u8>,
        replacement: Vec<u8>,
    ) -> Result<Self> {
        let patch = Self {
            artifact: artifact.into(),
            offset,
            reference,
            replacement,
        };
        patch.validate()?;
        Ok(patch)
    }

    /// Build from hex strings. Whitespace between digits is ignored.
    pub fn from_hex(
        artifact: impl Into<String>,
        offset: u64,
        reference: &str,
        replacement: &str,
    ) -> Result<Self> {
        Self::new(
            artifact,
            offset,
            decode_hex(reference)?,
            decode_hex(replacement)?,
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.reference.is_empty() {
            return Err(Error::EmptyReference);
        }
        if self.reference.len() != self.replacement.len() {
            return Err(Error::LengthMismatch {
                reference: self.reference.len(),
                replacement: self.replacement.len(),
            });
        }
        Ok(())
    }

    /// Verify the reference bytes at `header_len + offset` and overwrite them.
    ///
    /// On any error `buf` is left unchanged.
    pub fn apply(&self, buf: &mut [u8], header_len: usize) -> Result<()> {
        self.validate()?;
        let len = self.reference.len();
        let out_of_range = || Error::OutOfRange {
            offset: self.offset,
            len,
            size: buf.len().saturating_sub(header_len),
        };

        let start = usize::try_from(self.offset)
            .ok()
            .and_then(|offset| offset.checked_add(header_len))
            .ok_or_else(out_of_range)?;
        let end = start.checked_add(len).ok_or_else(out_of_range)?;
        if end > buf.len() {
            return Err(out_of_range());
        }

        let found = &buf[start..end];
        if found != self.reference.as_slice() {
            return Err(Error::ReferenceMismatch {
                artifact: self.artifact.clone(),
                offset: self.offset,
                expected: hex::encode(&self.reference),
                found: hex::encode(found),
            });
        }

        buf[start..end].copy_from_slice(&self.replacement);
        tracing::debug!(
            "Patched {} bytes in {} at offset {}",
            len,
            self.artifact,
            self.offset
        );
        Ok(())
    }
}

/// Outcome of [`apply_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Indices of applied patches.
    pub applied: Vec<usize>,
    /// Indices of rejected patches with the reason.
    pub failed: Vec<(usize, Error)>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Apply independent substitutions to one artifact buffer.
///
/// A rejected patch does not stop its siblings.
pub fn apply_batch(buf: &mut [u8], header_len: usize, patches: &[BinaryPatch]) -> BatchReport {
    let mut report = BatchReport::default();
    for (index, patch) in patches.iter().enumerate() {
        match patch.apply(buf, header_len) {
            Ok(()) => report.applied.push(index),
            Err(e) => {
                tracing::warn!("Skipping binary patch {} for {}: {}", index, patch.artifact, e);
                report.failed.push((index, e));
            }
        }
    }
    report
}

/// Parse a JSON array of patch descriptors, validating each.
pub fn load_descriptors(json: &str) -> Result<Vec<BinaryPatch>> {
    let patches: Vec<BinaryPatch> = serde_json::from_str(json)?;
    for patch in &patches {
        patch.validate()?;
    }
    Ok(patches)
}

fn decode_hex(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(hex::decode(compact)?)
}

fn to_hex<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

fn from_hex<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error> {
    let text = String::deserialize(deserializer)?;
    decode_hex(&text).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lengths() {
        assert_eq!(header_len_for("L/!init.obj"), 8);
        assert_eq!(header_len_for("L/!INIT.OBJ"), 8);
        assert_eq!(header_len_for("objects/a.bod"), 0);
        assert_eq!(header_len_for("dir.obj/noext"), 0);
    }

    #[test]
    fn test_apply_respects_header() {
        let mut buf = vec![0u8; 8];
        buf.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        let patch = BinaryPatch::from_hex("L/a.obj", 1, "bb cc", "1122").unwrap();
        patch.apply(&mut buf, 8).unwrap();
        assert_eq!(&buf[8..], &[0xAA, 0x11, 0x22, 0xDD]);
    }

    #[test]
    fn test_reference_mismatch_leaves_buffer() {
        let mut buf = vec![1, 2, 3, 4];
        let before = buf.clone();
        let patch = BinaryPatch::new("a.bin", 1, vec![9, 9], vec![5, 5]).unwrap();
        let err = patch.apply(&mut buf, 0).unwrap_err();
        assert!(matches!(err, Error::ReferenceMismatch { ref found, .. } if found == "0203"));
        assert_eq!(buf, before);
    }

    #[test]
    fn test_length_rules() {
        assert!(matches!(
            BinaryPatch::new("a.bin", 0, vec![1, 2], vec![1]),
            Err(Error::LengthMismatch {
                reference: 2,
                replacement: 1
            })
        ));
        assert!(matches!(
            BinaryPatch::new("a.bin", 0, vec![], vec![]),
            Err(Error::EmptyReference)
        ));
    }

    #[test]
    fn test_out_of_range() {
        let mut buf = vec![0u8; 4];
        let patch = BinaryPatch::new("a.bin", 3, vec![0, 0], vec![1, 1]).unwrap();
        assert!(matches!(
            patch.apply(&mut buf, 0),
            Err(Error::OutOfRange { .. })
        ));
        let patch = BinaryPatch::new("a.bin", u64::MAX, vec![0], vec![1]).unwrap();
        assert!(matches!(
            patch.apply(&mut buf, 0),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_batch_siblings_proceed() {
        let mut buf = vec![1, 2, 3, 4];
        let patches = vec![
            BinaryPatch::new("a.bin", 0, vec![1], vec![7]).unwrap(),
            BinaryPatch::new("a.bin", 1, vec![9], vec![8]).unwrap(),
            BinaryPatch::new("a.bin", 3, vec![4], vec![6]).unwrap(),
        ];
        let report = apply_batch(&mut buf, 0, &patches);
        assert_eq!(report.applied, vec![0, 2]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 1);
        assert_eq!(buf, vec![7, 2, 3, 6]);
    }

    #[test]
    fn test_load_descriptors() {
        let json = r#"[
            {"artifact": "L/!init.obj", "offset": 16, "reference": "00 01", "replacement": "ff fe"}
        ]"#;
        let patches = load_descriptors(json).unwrap();
        assert_eq!(patches[0].reference, vec![0x00, 0x01]);
        assert_eq!(patches[0].replacement, vec![0xff, 0xfe]);

        let bad = r#"[{"artifact": "a.bin", "offset": 0, "reference": "00", "replacement": "0102"}]"#;
        assert!(matches!(
            load_descriptors(bad),
            Err(Error::LengthMismatch { .. })
        ));
    }
}
