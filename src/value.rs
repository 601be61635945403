//! Typed value decoder (C3): turns a leaf element's raw payload into a
//! [`Value`](crate::element::Value).
//!
//! Every conversion here is total: a malformed size for a given type never
//! fails the parse, it logs a warning and substitutes a default (§7). The
//! caller decides size and type from the schema; this module only does the
//! byte-to-value arithmetic.

use std::io::{Read, Seek};
use std::time::{Duration, SystemTime};

use crate::error::{Error, Result};
use crate::source::Source;

/// Nanoseconds between the Unix epoch and the Matroska date epoch
/// (2001-01-01T00:00:00Z).
const MATROSKA_EPOCH_OFFSET_NS: i128 = 978_307_200_000_000_000;

/// Big-endian unsigned integer, 1-8 bytes wide.
pub fn decode_uint(bytes: &[u8]) -> u64 {
    let mut value = 0u64;
    for &b in bytes {
        value = (value << 8) | u64::from(b);
    }
    value
}

/// Big-endian signed integer, 1-8 bytes wide, sign-extended from the first byte.
pub fn decode_int(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let negative = bytes[0] & 0x80 != 0;
    let mut value: i64 = if negative { -1 } else { 0 };
    for &b in bytes {
        value = (value << 8) | i64::from(b);
    }
    value
}

/// UTF-8 decode, lossily substituting the replacement character for
/// malformed sequences rather than failing the parse.
pub fn decode_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// 4/8-byte IEEE-754 float, or a 10-byte 80-bit x87 extended float. Any
/// other size logs a warning and yields `0.0`.
pub fn decode_float(bytes: &[u8]) -> f64 {
    match bytes.len() {
        4 => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(bytes);
            f32::from_be_bytes(buf) as f64
        }
        8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(bytes);
            f64::from_be_bytes(buf)
        }
        10 => decode_f80(bytes),
        other => {
            log::warn!("float element has unexpected size {other} (want 4, 8, or 10); using 0.0");
            0.0
        }
    }
}

/// Decode an 80-bit x87 extended-precision float (sign | 15-bit biased
/// exponent | explicit integer bit | 63-bit fraction, transmitted
/// big-endian) into the nearest IEEE-754 binary64 value.
fn decode_f80(bytes: &[u8]) -> f64 {
    debug_assert_eq!(bytes.len(), 10);
    let mut bits: u128 = 0;
    for &b in bytes {
        bits = (bits << 8) | u128::from(b);
    }
    let sign = (bits >> 79) & 1;
    let exponent = ((bits >> 64) & 0x7FFF) as i64;
    let fraction = bits & ((1u128 << 63) - 1);

    const BIAS80: i64 = 0x3FFF;
    const BIAS64: i64 = 0x3FF;

    if exponent == 0 {
        // Zero, subnormal, or denormal: not representable at this
        // precision boundary, collapse to signed zero.
        return f64::from_bits((sign as u64) << 63);
    }
    if exponent == 0x7FFF {
        return if fraction != 0 {
            f64::NAN
        } else if sign == 1 {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let rebiased = exponent - BIAS80 + BIAS64;
    if rebiased <= 0 {
        return f64::from_bits((sign as u64) << 63);
    }
    if rebiased >= 0x7FF {
        return if sign == 1 { f64::NEG_INFINITY } else { f64::INFINITY };
    }

    let f64_fraction = (fraction >> (63 - 52)) as u64;
    let out_bits = ((sign as u64) << 63) | ((rebiased as u64) << 52) | f64_fraction;
    f64::from_bits(out_bits)
}

/// 8-byte signed nanosecond offset from 2001-01-01T00:00:00Z, converted to
/// a host wall-clock time. Any other size logs a warning and yields the
/// Matroska epoch itself.
pub fn decode_date(bytes: &[u8]) -> SystemTime {
    if bytes.len() != 8 {
        log::warn!("date element has unexpected size {} (want 8); using epoch", bytes.len());
        return matroska_epoch();
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    let ns = i64::from_be_bytes(buf);
    offset_from_epoch(ns)
}

fn matroska_epoch() -> SystemTime {
    offset_from_epoch(0)
}

fn offset_from_epoch(ns: i64) -> SystemTime {
    let total = MATROSKA_EPOCH_OFFSET_NS + i128::from(ns);
    if total >= 0 {
        SystemTime::UNIX_EPOCH + Duration::from_nanos(total as u64)
    } else {
        SystemTime::UNIX_EPOCH - Duration::from_nanos((-total) as u64)
    }
}

/// Read a binary leaf's payload, honoring `binary_size_limit`.
///
/// `is_seek_id` forces a full read regardless of the limit (§4.3): SeekHead
/// entries must always be read in full or the selective-read controller
/// cannot resolve offsets. A negative limit means unlimited. Returns the
/// (possibly truncated) bytes and whether truncation occurred.
pub fn decode_binary<R: Seek + Read>(
    source: &mut Source<R>,
    size: u64,
    binary_size_limit: i64,
    is_seek_id: bool,
) -> Result<(Vec<u8>, bool)> {
    let offset = source.position()?;
    if offset + size > source.len() {
        return Err(Error::TruncatedElement { offset, size });
    }

    let effective_limit = if is_seek_id || binary_size_limit < 0 {
        None
    } else {
        Some(binary_size_limit as u64)
    };

    match effective_limit {
        None => {
            let bytes = source.read_exact(size as usize)?;
            Ok((bytes, false))
        }
        Some(limit) if size <= limit => {
            let bytes = source.read_exact(size as usize)?;
            Ok((bytes, false))
        }
        Some(limit) => {
            let bytes = source.read_exact(limit as usize)?;
            source.advance(size - limit)?;
            Ok((bytes, true))
        }
    }
}

/// Read an unrecognized element's payload: a short printable-ASCII preview
/// is retained (useful for diagnosing mis-framed streams), the rest is
/// skipped over without being copied into memory (§4.5 "unknown IDs").
pub fn decode_unknown<R: Seek + Read>(source: &mut Source<R>, size: u64) -> Result<(Vec<u8>, Option<String>)> {
    let offset = source.position()?;
    if offset + size > source.len() {
        return Err(Error::TruncatedElement { offset, size });
    }
    const PREVIEW_LEN: u64 = 32;
    let preview_len = size.min(PREVIEW_LEN) as usize;
    let preview = source.read_exact(preview_len)?;
    source.advance(size - preview_len as u64)?;
    let printable = (!preview.is_empty() && preview.iter().all(|&b| (0x20..0x7f).contains(&b)))
        .then(|| String::from_utf8_lossy(&preview).into_owned());
    Ok((preview, printable))
}
