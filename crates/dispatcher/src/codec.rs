//! Frame codec
//!
//! A frame is `varint(len) || utf8(message)`: the length is written in
//! little-endian 7-bit groups with the high bit set on every byte except the
//! last, the same scheme length-prefixed game protocols use for strings.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::DispatcherError;

/// Longest varint the decoder accepts (enough for any `u64`)
pub const MAX_VARINT_LEN: usize = 10;

/// Turns a rendered message into a frame.
pub trait Encoder: Send + Sync {
    /// Encode `message`; infallible
    fn encode(&self, message: &str) -> Bytes;
}

/// Default [`Encoder`]: varint length prefix followed by UTF-8 bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEncoder;

impl Encoder for FrameEncoder {
    fn encode(&self, message: &str) -> Bytes {
        encode_frame(message)
    }
}

/// Encode a single frame
pub fn encode_frame(message: &str) -> Bytes {
    let body = message.as_bytes();
    let length = body.len() as u64;
    let mut buf = BytesMut::with_capacity(varint_len(length) + body.len());
    put_varint(&mut buf, length);
    buf.put_slice(body);
    buf.freeze()
}

/// Write `value` as a base-128 varint
pub fn put_varint(buf: &mut impl BufMut, mut value: u64) {
    while value & !0x7F != 0 {
        buf.put_u8((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Number of bytes `put_varint` writes for `value`
pub fn varint_len(value: u64) -> usize {
    let bits = (u64::BITS - value.leading_zeros()) as usize;
    bits.max(1).div_ceil(7)
}

/// Read a varint from the start of `buf`
///
/// Returns the value and the number of bytes consumed.
///
/// # Errors
/// Truncated, overlong or overflowing prefixes.
pub fn read_varint(buf: &[u8]) -> Result<(u64, usize), DispatcherError> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        let shift = 7 * i as u32;
        let group = u64::from(byte & 0x7F);
        // the tenth byte may only carry the top bit of a u64
        if shift == 63 && group > 1 {
            return Err(DispatcherError::PrefixOverflow);
        }
        value |= group << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    if buf.len() >= MAX_VARINT_LEN {
        Err(DispatcherError::PrefixTooLong {
            max: MAX_VARINT_LEN,
        })
    } else {
        Err(DispatcherError::TruncatedPrefix)
    }
}

/// Decode one frame from the start of `buf`
///
/// Returns the message and the number of bytes consumed, so consecutive
/// frames in a stream can be decoded one after another.
///
/// # Errors
/// Any prefix error, a short body, or a body that is not UTF-8.
pub fn decode_frame(buf: &[u8]) -> Result<(String, usize), DispatcherError> {
    let (length, prefix_len) = read_varint(buf)?;
    let expected =
        usize::try_from(length).map_err(|_| DispatcherError::LengthOverflow { length })?;
    let end = prefix_len
        .checked_add(expected)
        .ok_or(DispatcherError::LengthOverflow { length })?;

    let body = buf
        .get(prefix_len..end)
        .ok_or(DispatcherError::TruncatedBody {
            expected,
            available: buf.len() - prefix_len,
        })?;

    let message = std::str::from_utf8(body)?.to_owned();
    Ok((message, end))
}
