//! The patch interpreter: the control-triple loop that reconstructs the
//! output buffer from the old byte sequence and the three sub-streams.
//!
//! Grounded on `bspatch.c`'s `main` loop (the `ctrl[0..3]` read, the
//! `extralen`/`ctrl_len` bounds checks, the `old[oldpos+i] += new[...]`
//! wrap-around addition) translated into bounds-checked Rust with explicit
//! `Result` propagation in place of the original's `errx`/global `state`.

use std::io::{Read, Seek, SeekFrom};

use crate::container::{self, Header, Substreams};
use crate::error::{BsdiffError, Result};
use crate::facade::ReadSeek;

/// Runs the control-triple loop against `old` and `substreams`, returning
/// the fully reconstructed output buffer (exactly `header.new_size` bytes).
///
/// `old` is taken as `&mut dyn ReadSeek` rather than a generic `R: Read +
/// Seek` bound: the driver facade hands this a boxed trait object (plain
/// file or extent stream), and a `dyn ReadSeek` only implements `ReadSeek`
/// itself, not the `Read`/`Seek` supertraits a generic bound would demand.
pub fn apply<S: Read>(
    old: &mut dyn ReadSeek,
    header: &Header,
    substreams: &mut Substreams<S>,
) -> Result<Vec<u8>> {
    let old_size = old.seek(SeekFrom::End(0))?;
    let mut output = vec![0u8; header.new_size as usize];

    let mut oldpos: i64 = 0;
    let mut newpos: u64 = 0;

    while newpos < header.new_size {
        let x = container::read_signed(&mut substreams.control)?;
        let y = container::read_signed(&mut substreams.control)?;
        let z = container::read_signed(&mut substreams.control)?;

        if x < 0 || y < 0 {
            return Err(BsdiffError::corrupt(format!(
                "control triple has negative X or Y: ({x}, {y}, {z})"
            )));
        }
        let x = x as u64;
        let y = y as u64;

        let diff_end = checked_bound(newpos, x, header.new_size)?;
        read_substream_exact(&mut substreams.diff, &mut output[newpos as usize..diff_end as usize])?;
        add_old_bytes(old, old_size, oldpos, &mut output[newpos as usize..diff_end as usize])?;
        newpos = diff_end;
        oldpos += x as i64;

        let extra_end = checked_bound(newpos, y, header.new_size)?;
        read_substream_exact(&mut substreams.extra, &mut output[newpos as usize..extra_end as usize])?;
        newpos = extra_end;
        oldpos += z;
    }

    Ok(output)
}

/// Computes `newpos + step`, rejecting the triple if it would run past
/// `new_size`.
fn checked_bound(newpos: u64, step: u64, new_size: u64) -> Result<u64> {
    let end = newpos.checked_add(step).ok_or_else(|| {
        BsdiffError::corrupt(format!("control triple step {step} overflows at newpos {newpos}"))
    })?;
    if end > new_size {
        return Err(BsdiffError::corrupt(format!(
            "control triple runs past new_size: newpos={newpos} step={step} new_size={new_size}"
        )));
    }
    Ok(end)
}

/// Reads exactly `buf.len()` bytes from a patch sub-stream; any short read
/// or decoder error is a corrupt-patch error, never propagated as a bare I/O
/// error.
fn read_substream_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader
        .read_exact(buf)
        .map_err(|e| BsdiffError::corrupt(format!("short read from sub-stream: {e}")))
}

/// Adds old-file bytes into the diff window just written to `output`: for
/// each position `oldpos + i` that falls within `[0, old_size)`, the old
/// byte is added (mod 256); positions outside that range contribute zero.
/// Seeks once to the clamped overlap and reads it in a single contiguous
/// run rather than probing byte-by-byte.
fn add_old_bytes(
    old: &mut dyn ReadSeek,
    old_size: u64,
    oldpos: i64,
    window: &mut [u8],
) -> Result<()> {
    let window_len = window.len() as i64;
    let lo = oldpos.max(0);
    let hi = oldpos.saturating_add(window_len).min(old_size as i64);
    if hi <= lo {
        return Ok(());
    }

    let run_len = (hi - lo) as usize;
    old.seek(SeekFrom::Start(lo as u64))?;
    let mut run = vec![0u8; run_len];
    old.read_exact(&mut run)?;

    let window_offset = (lo - oldpos) as usize;
    for (w, o) in window[window_offset..window_offset + run_len].iter_mut().zip(run) {
        *w = w.wrapping_add(o);
    }

    Ok(())
}
