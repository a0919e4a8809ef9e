//! Wire-level types shared by the socket channel: the client status record
//! and its little-endian, length-prefixed framing.

use bytes::{Buf, BufMut, BytesMut};

/// Size in bytes of the current `ClientResponse` struct on the wire (12
/// fields: u32 + u64 + u32 + 5 * f64 + 4 * u32).
pub const CLIENT_RESPONSE_SIZE: usize = 72;

/// Size in bytes of the legacy variant (no `sequence` field, 11 fields).
pub const LEGACY_CLIENT_RESPONSE_SIZE: usize = 64;

/// Status record returned by a client after receiving frames. Matches the
/// 72-byte little-endian packed layout; a legacy 64-byte variant (no
/// `sequence`) is recognized and translated with `sequence` zeroed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientResponse {
    pub size: u32,
    pub sequence: u64,
    pub flash_version: u32,
    pub current_clock: f64,
    pub oldest_packet: f64,
    pub newest_packet: f64,
    pub brightness: f64,
    pub wifi_signal: f64,
    pub buffer_size: u32,
    pub buffer_pos: u32,
    pub fps_drawing: u32,
    pub watts: u32,
}

impl ClientResponse {
    /// Decodes the current 72-byte struct from a little-endian buffer.
    /// Byte order on the wire is always little-endian; on a big-endian
    /// host every multi-byte field is logically byte-swapped by virtue of
    /// reading with explicit `_le` accessors, so no separate swap step is
    /// needed here regardless of host endianness.
    pub fn decode(buf: &[u8]) -> Option<ClientResponse> {
        if buf.len() < CLIENT_RESPONSE_SIZE {
            return None;
        }
        let mut b = buf;
        Some(ClientResponse {
            size: b.get_u32_le(),
            sequence: b.get_u64_le(),
            flash_version: b.get_u32_le(),
            current_clock: b.get_f64_le(),
            oldest_packet: b.get_f64_le(),
            newest_packet: b.get_f64_le(),
            brightness: b.get_f64_le(),
            wifi_signal: b.get_f64_le(),
            buffer_size: b.get_u32_le(),
            buffer_pos: b.get_u32_le(),
            fps_drawing: b.get_u32_le(),
            watts: b.get_u32_le(),
        })
    }

    /// Decodes the legacy 64-byte struct (no `sequence`), zeroing `sequence`.
    pub fn decode_legacy(buf: &[u8]) -> Option<ClientResponse> {
        if buf.len() < LEGACY_CLIENT_RESPONSE_SIZE {
            return None;
        }
        let mut b = buf;
        Some(ClientResponse {
            size: b.get_u32_le(),
            sequence: 0,
            flash_version: b.get_u32_le(),
            current_clock: b.get_f64_le(),
            oldest_packet: b.get_f64_le(),
            newest_packet: b.get_f64_le(),
            brightness: b.get_f64_le(),
            wifi_signal: b.get_f64_le(),
            buffer_size: b.get_u32_le(),
            buffer_pos: b.get_u32_le(),
            fps_drawing: b.get_u32_le(),
            watts: b.get_u32_le(),
        })
    }

    /// Encodes as the current 72-byte little-endian struct. Used by tests
    /// to exercise the endianness round-trip property.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(CLIENT_RESPONSE_SIZE);
        buf.put_u32_le(self.size);
        buf.put_u64_le(self.sequence);
        buf.put_u32_le(self.flash_version);
        buf.put_f64_le(self.current_clock);
        buf.put_f64_le(self.oldest_packet);
        buf.put_f64_le(self.newest_packet);
        buf.put_f64_le(self.brightness);
        buf.put_f64_le(self.wifi_signal);
        buf.put_u32_le(self.buffer_size);
        buf.put_u32_le(self.buffer_pos);
        buf.put_u32_le(self.fps_drawing);
        buf.put_u32_le(self.watts);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClientResponse {
        ClientResponse {
            size: CLIENT_RESPONSE_SIZE as u32,
            sequence: 42,
            flash_version: 7,
            current_clock: 123.5,
            oldest_packet: 1.0,
            newest_packet: 2.0,
            brightness: 0.8,
            wifi_signal: -55.0,
            buffer_size: 100,
            buffer_pos: 3,
            fps_drawing: 30,
            watts: 12,
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let original = sample();
        let encoded = original.encode();
        let decoded = ClientResponse::decode(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn legacy_decode_zeroes_sequence() {
        // Build a legacy 64-byte buffer by encoding then splicing out the
        // 8 sequence bytes at offset 4.
        let full = sample().encode();
        let mut legacy = BytesMut::new();
        legacy.extend_from_slice(&full[0..4]);
        legacy.extend_from_slice(&full[12..]);
        assert_eq!(legacy.len(), LEGACY_CLIENT_RESPONSE_SIZE);

        let decoded = ClientResponse::decode_legacy(&legacy).unwrap();
        assert_eq!(decoded.sequence, 0);
        assert_eq!(decoded.flash_version, 7);
        assert_eq!(decoded.watts, 12);
    }
}
