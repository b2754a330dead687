//! Little-endian integer extraction
//!
//! Every frame decoder in the crate reads its fields through these helpers.
//! Reads are bounds-checked and never panic.

use crate::error::StreamError;

/// Read an unsigned little-endian integer of `length` bytes at `offset`.
pub fn read_uint(buf: &[u8], offset: usize, length: usize) -> Result<u64, StreamError> {
    let bytes = slice(buf, offset, length)?;
    Ok(bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// Read a two's-complement little-endian integer of `length` bytes at `offset`,
/// sign-extended to `i64`.
pub fn read_int(buf: &[u8], offset: usize, length: usize) -> Result<i64, StreamError> {
    let raw = read_uint(buf, offset, length)?;
    Ok(sign_extend(raw, (length * 8) as u32))
}

/// Read a 3-byte signed sample, the packing used by ECG and PPG frames.
pub fn read_i24(buf: &[u8], offset: usize) -> Result<i32, StreamError> {
    // 24 bits always fit in i32 after sign extension
    Ok(read_int(buf, offset, 3)? as i32)
}

/// Replicate bit `bits - 1` of `raw` into all higher bits.
pub fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        return raw as i64;
    }
    let shift = 64 - bits;
    ((raw << shift) as i64) >> shift
}

fn slice(buf: &[u8], offset: usize, length: usize) -> Result<&[u8], StreamError> {
    if !(1..=8).contains(&length) {
        return Err(StreamError::InvalidWidth(length));
    }
    let end = offset
        .checked_add(length)
        .filter(|&end| end <= buf.len())
        .ok_or(StreamError::OutOfBounds {
            offset,
            length,
            len: buf.len(),
        })?;
    Ok(&buf[offset..end])
}
