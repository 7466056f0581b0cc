//! Sign-run-length coding of the atlas.
//!
//! The stream is a sequence of signed 16-bit run codes over 2-byte units:
//! `-n` repeats the following unit `n` times, `n` copies the following `n`
//! units verbatim. A zero code never occurs in valid data.

use super::ATLAS_BYTES;
use crate::cursor::Cursor;
use crate::error::{Error, Result};

/// Longest run a single code can describe.
const MAX_RUN: usize = i16::MAX as usize;

/// Decode a complete run-length stream of at most one atlas.
pub fn decode_runs(stream: &[u8]) -> Result<Vec<u8>> {
    let mut c = Cursor::new(stream);
    let mut out = Vec::new();
    decode_runs_until(&mut c, stream.len(), ATLAS_BYTES, &mut out)?;
    Ok(out)
}

/// Decode runs while the cursor is before `stop`, appending to `out`.
/// A run that would grow `out` past `limit` bytes is an error.
///
/// The last run may read past `stop` if the cursor allows it.
pub(crate) fn decode_runs_until(
    c: &mut Cursor<'_>,
    stop: usize,
    limit: usize,
    out: &mut Vec<u8>,
) -> Result<()> {
    while c.position() < stop {
        let offset = c.position();
        let run = c.read_i16()?;
        if run == 0 {
            return Err(Error::MalformedRunLength { offset });
        }
        let len = 2 * usize::from(run.unsigned_abs());
        if out.len() + len > limit {
            return Err(Error::RunLengthOverflow { offset, limit });
        }
        if run < 0 {
            let unit = c.read_array::<2>()?;
            for _ in 0..run.unsigned_abs() {
                out.extend_from_slice(&unit);
            }
        } else {
            out.extend_from_slice(c.read_bytes(len)?);
        }
    }
    Ok(())
}

/// Encode `data` as a run-length stream.
///
/// `data` is processed in 2-byte units; an odd trailing byte is padded with
/// zero.
pub fn encode_runs(data: &[u8]) -> Vec<u8> {
    let units: Vec<[u8; 2]> = data
        .chunks(2)
        .map(|c| [c[0], c.get(1).copied().unwrap_or(0)])
        .collect();

    let mut out = Vec::with_capacity(data.len() + data.len() / 8);
    let mut i = 0;
    while i < units.len() {
        let repeats = repeat_len(&units[i..]);
        if repeats >= 2 {
            out.extend_from_slice(&(-(repeats as i32) as i16).to_le_bytes());
            out.extend_from_slice(&units[i]);
            i += repeats;
            continue;
        }

        // Literal block up to the next repeated pair.
        let start = i;
        while i < units.len() && i - start < MAX_RUN && repeat_len(&units[i..]) < 2 {
            i += 1;
        }
        out.extend_from_slice(&((i - start) as i16).to_le_bytes());
        for unit in &units[start..i] {
            out.extend_from_slice(unit);
        }
    }
    out
}

fn repeat_len(units: &[[u8; 2]]) -> usize {
    let Some(first) = units.first() else {
        return 0;
    };
    units
        .iter()
        .take(MAX_RUN)
        .take_while(|u| *u == first)
        .count()
}
