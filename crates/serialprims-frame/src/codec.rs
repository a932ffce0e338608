use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: magic (2) + length (4) = 6 bytes.
pub const HEADER_SIZE: usize = 6;

/// Magic bytes: "SP" (0x53 0x50).
pub const MAGIC: [u8; 2] = [0x53, 0x50];

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Append one frame to `dst`.
///
/// ```text
/// +------+------+----------------+-----------------+
/// | 0x53 | 0x50 | length (u32 LE)| payload ...     |
/// +------+------+----------------+-----------------+
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(len);
    dst.put_slice(payload);
    Ok(())
}

/// Wire length of the first frame in `src` if all of it is buffered.
///
/// Header problems (bad magic, oversized length) are reported as soon as the
/// header is complete, without waiting for the payload.
pub fn complete_frame_len(src: &[u8], max_payload: usize) -> Result<Option<usize>> {
    let Some(header) = src.get(..HEADER_SIZE) else {
        return Ok(None);
    };
    if header[..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let payload_len = u32::from_le_bytes([header[2], header[3], header[4], header[5]]) as usize;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    Ok((src.len() >= total).then_some(total))
}

/// Split the first complete frame off `src` and return its payload.
///
/// `Ok(None)` leaves `src` untouched. The payload shares `src`'s allocation.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    let Some(total) = complete_frame_len(src, max_payload)? else {
        return Ok(None);
    };
    let mut frame = src.split_to(total);
    frame.advance(HEADER_SIZE);
    Ok(Some(frame.freeze()))
}

/// Configuration for framed stream ports.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
