//! DAVE-tagged compressed frame: a one-shot zlib wrapper around one data
//! frame. Unlike the teacher's persistent, streaming `flate2::Compress`
//! (reused across many VNC rectangles), each LED frame gets a fresh
//! deflate stream — the client decompresses each frame independently.

use std::io::Write;

use bytes::{BufMut, Bytes, BytesMut};
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// Magic tag identifying a compressed frame ("DAVE" as little-endian u32).
pub const COMPRESSED_HEADER_TAG: u32 = 0x4445_4156;

/// Tag written after the length fields, currently unused by decoders but
/// carried for wire compatibility.
pub const CUSTOM_TAG: u32 = 0x1234_5678;

/// Wraps `data` (an uncompressed data frame) in the DAVE-tagged header with
/// a best-speed zlib stream.
pub fn compress_frame(data: &[u8]) -> Bytes {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len()), Compression::fast());
    encoder
        .write_all(data)
        .expect("in-memory zlib encoder write cannot fail");
    let compressed = encoder.finish().expect("in-memory zlib encoder finish cannot fail");

    let mut buf = BytesMut::with_capacity(16 + compressed.len());
    buf.put_u32_le(COMPRESSED_HEADER_TAG);
    buf.put_u32_le(compressed.len() as u32);
    buf.put_u32_le(data.len() as u32);
    buf.put_u32_le(CUSTOM_TAG);
    buf.put_slice(&compressed);
    buf.freeze()
}

/// Reverses `compress_frame`, returning the original uncompressed bytes.
/// Used by tests to verify the round-trip property; real clients do their
/// own decompression.
pub fn decompress_frame(frame: &[u8]) -> Result<Bytes> {
    use bytes::Buf;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    if frame.len() < 16 {
        return Err(Error::Protocol("compressed frame shorter than header".into()));
    }
    let mut b = frame;
    let tag = b.get_u32_le();
    if tag != COMPRESSED_HEADER_TAG {
        return Err(Error::Protocol(format!("bad compressed frame tag: {tag:#x}")));
    }
    let compressed_len = b.get_u32_le() as usize;
    let original_len = b.get_u32_le() as usize;
    let _custom_tag = b.get_u32_le();

    if b.remaining() < compressed_len {
        return Err(Error::Protocol("compressed payload shorter than declared length".into()));
    }
    let payload = &b[..compressed_len];

    let mut decoder = ZlibDecoder::new(payload);
    let mut out = Vec::with_capacity(original_len);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Protocol(format!("zlib decompress failed: {e}")))?;
    Ok(Bytes::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_original_bytes() {
        let original = b"hello LED matrix, this is a data frame payload".to_vec();
        let compressed = compress_frame(&original);
        let decompressed = decompress_frame(&compressed).unwrap();
        assert_eq!(decompressed.as_ref(), original.as_slice());
    }

    #[test]
    fn header_fields_match_layout() {
        let original = vec![1u8, 2, 3, 4, 5];
        let compressed = compress_frame(&original);
        use bytes::Buf;
        let mut b = &compressed[..];
        assert_eq!(b.get_u32_le(), COMPRESSED_HEADER_TAG);
        let compressed_len = b.get_u32_le() as usize;
        let original_len = b.get_u32_le();
        assert_eq!(original_len, 5);
        assert_eq!(b.get_u32_le(), CUSTOM_TAG);
        assert_eq!(compressed.len(), 16 + compressed_len);
    }
}
