//! Root finder / resync (C8, §4.5 edge case, §7 `NotAMatroskaFile`).
//!
//! Locates the `EBML` (`0x1A45DFA3`) or `Segment` (`0x18538067`) magic
//! bytes at or near the start of the stream, tolerating leading junk a
//! misframed or partially-written capture might carry.

use std::io::{Read, Seek};

use crate::error::{Error, Result};
use crate::source::Source;

const EBML_ID: u64 = 0x1A45DFA3;
const SEGMENT_ID: u64 = 0x18538067;

/// Bound on how far into the stream the resync scan will look before
/// giving up and reporting `NotAMatroskaFile`.
const RESYNC_BOUND: u64 = 4096;

/// Position the source at the start of the first `EBML` or `Segment`
/// element, scanning forward through leading junk if necessary.
pub fn locate<R: Read + Seek>(source: &mut Source<R>) -> Result<u64> {
    source.seek_to(0)?;
    if let Some(pos) = probe(source, 0)? {
        return Ok(pos);
    }

    let len = source.len().min(RESYNC_BOUND);
    if len < 4 {
        return Err(Error::NotAMatroskaFile);
    }
    source.seek_to(0)?;
    let window = source.read_exact(len as usize)?;
    for i in 0..window.len().saturating_sub(3) {
        let candidate = u32::from_be_bytes([window[i], window[i + 1], window[i + 2], window[i + 3]]) as u64;
        if candidate == EBML_ID || candidate == SEGMENT_ID {
            let pos = i as u64;
            source.seek_to(pos)?;
            log::warn!("resynchronized at offset {pos} after leading junk");
            return Ok(pos);
        }
    }
    Err(Error::NotAMatroskaFile)
}

/// Check whether the 4 bytes at `pos` are the EBML or Segment magic.
fn probe<R: Read + Seek>(source: &mut Source<R>, pos: u64) -> Result<Option<u64>> {
    if source.len() < pos + 4 {
        return Ok(None);
    }
    source.seek_to(pos)?;
    let bytes = source.read_exact(4)?;
    let candidate = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64;
    source.seek_to(pos)?;
    Ok((candidate == EBML_ID || candidate == SEGMENT_ID).then_some(pos))
}
