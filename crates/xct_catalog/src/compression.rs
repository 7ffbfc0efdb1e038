//! DEFLATE helpers for compressed entries and loose compressed files.

use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Inflate a compressed payload.
///
/// Gzip and zlib wrappers are detected from the header; anything else is
/// treated as a raw DEFLATE stream. `name` is only used for error reporting.
pub fn inflate(data: &[u8], name: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len().saturating_mul(4));
    let res = if data.starts_with(&GZIP_MAGIC) {
        GzDecoder::new(data).read_to_end(&mut out)
    } else if has_zlib_header(data) {
        ZlibDecoder::new(data).read_to_end(&mut out)
    } else {
        tracing::trace!("No gzip/zlib header on '{}', inflating as raw deflate", name);
        DeflateDecoder::new(data).read_to_end(&mut out)
    };

    res.map_err(|source| Error::Decompression {
        path: name.to_string(),
        source,
    })?;
    Ok(out)
}

/// Compress a payload with gzip framing.
pub fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// A zlib stream starts with CM=8 and a header checksum divisible by 31.
fn has_zlib_header(data: &[u8]) -> bool {
    match data {
        [cmf, flg, ..] => cmf & 0x0F == 8 && (u16::from(*cmf) << 8 | u16::from(*flg)) % 31 == 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{DeflateEncoder, ZlibEncoder};

    #[test]
    fn test_gzip_round_trip() {
        let data = b"1;2;3;\n".repeat(50);
        let packed = deflate(&data).unwrap();
        assert!(packed.starts_with(&GZIP_MAGIC));
        assert_eq!(inflate(&packed, "x.pck").unwrap(), data);
    }

    #[test]
    fn test_zlib_and_raw_inflate() {
        let data = b"<language id=\"44\"/>".to_vec();

        let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
        zlib.write_all(&data).unwrap();
        assert_eq!(inflate(&zlib.finish().unwrap(), "z").unwrap(), data);

        let mut raw = DeflateEncoder::new(Vec::new(), Compression::default());
        raw.write_all(&data).unwrap();
        assert_eq!(inflate(&raw.finish().unwrap(), "r").unwrap(), data);
    }

    #[test]
    fn test_inflate_garbage_fails() {
        let err = inflate(&[0x1F, 0x8B, 0x00, 0x01, 0x02], "bad.pck");
        assert!(matches!(err, Err(Error::Decompression { .. })));
    }
}
