//! Positional I/O: a simpler pread/pwrite-driven reader/writer over a list of
//! (offset, length) regions, with no persistent cursor between calls.
//!
//! Grounded on the `off,len(:off,len)*` grammar in `extents.h` and the
//! `PositionsStringIsValid` alternating-separator state machine retrieved
//! alongside `bspatch.c`; the seek-then-read/write transfer loop is grounded
//! on `exfile.cc`'s `exfile_io`, specialized to a handle with no cursor to
//! maintain across calls.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{BsdiffError, Result};
use crate::extent::{parse_i64_strict, Extent, SPARSE};

/// Sanity ceiling on the total length requested by a single positional read,
/// guarding against an attacker-controlled position string driving an
/// unreasonably large allocation.
pub const MAX_POSITIONAL_READ_LEN: u64 = 1 << 30;

/// Parse the positional-I/O grammar: `off,len(:off,len)*`. Pairs are
/// separated by `:`; within a pair, `off` and `len` are separated by `,`.
/// `off` is `-1` (sparse) or a non-negative decimal fitting in a signed
/// 64-bit integer; `len` is a non-negative decimal fitting in a signed
/// 64-bit integer. An empty string yields an empty list.
pub fn parse(s: &str) -> Result<Vec<Extent>> {
    if s.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for pair in s.split(':') {
        let (off_str, len_str) = pair.split_once(',').ok_or_else(|| {
            BsdiffError::invalid_extents(format!("missing ',' in positional pair '{pair}'"))
        })?;

        let offset = parse_i64_strict(off_str)?;
        if offset < SPARSE {
            return Err(BsdiffError::invalid_extents(format!(
                "negative offset {offset} is not the sparse sentinel -1"
            )));
        }

        let length_signed = parse_i64_strict(len_str)?;
        if length_signed < 0 {
            return Err(BsdiffError::invalid_extents(format!("negative length {length_signed}")));
        }

        out.push(Extent { offset, length: length_signed as u64 });
    }

    Ok(out)
}

/// Reads the concatenation of every region in `spec` from `handle`, using an
/// explicit seek before each region rather than a carried-over cursor. A
/// sparse region contributes `length` zero bytes without touching `handle`.
pub fn positional_read<H: Read + Seek>(handle: &mut H, spec: &[Extent]) -> Result<Vec<u8>> {
    let total: u64 = spec.iter().map(|ex| ex.length).sum();
    if total > MAX_POSITIONAL_READ_LEN {
        return Err(BsdiffError::AllocationFailure(format!(
            "positional read of {total} bytes exceeds the {MAX_POSITIONAL_READ_LEN}-byte ceiling"
        )));
    }

    let mut out = Vec::with_capacity(total as usize);
    for ex in spec {
        if ex.is_sparse() {
            out.resize(out.len() + ex.length as usize, 0);
            continue;
        }
        handle.seek(SeekFrom::Start(ex.offset as u64))?;
        let start = out.len();
        out.resize(start + ex.length as usize, 0);
        handle.read_exact(&mut out[start..])?;
    }

    Ok(out)
}

/// Writes `data` to `handle` split across the regions in `spec`, in order.
/// A sparse region silently consumes and discards its share of `data`
/// without touching `handle`. `data` must contain exactly the sum of the
/// regions' lengths.
pub fn positional_write<H: Write + Seek>(handle: &mut H, spec: &[Extent], data: &[u8]) -> Result<()> {
    let total: u64 = spec.iter().map(|ex| ex.length).sum();
    if total as usize != data.len() {
        return Err(BsdiffError::invalid_extents(format!(
            "positional write of {} bytes does not match {total} bytes of region lengths",
            data.len()
        )));
    }

    let mut rest = data;
    for ex in spec {
        let n = ex.length as usize;
        let (chunk, remainder) = rest.split_at(n);
        rest = remainder;
        if ex.is_sparse() {
            continue;
        }
        handle.seek(SeekFrom::Start(ex.offset as u64))?;
        handle.write_all(chunk)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_single_pair() {
        let spec = parse("10,5").unwrap();
        assert_eq!(spec, vec![Extent { offset: 10, length: 5 }]);
    }

    #[test]
    fn parses_multiple_pairs() {
        let spec = parse("0,5:10,3:-1,2").unwrap();
        assert_eq!(
            spec,
            vec![
                Extent { offset: 0, length: 5 },
                Extent { offset: 10, length: 3 },
                Extent { offset: -1, length: 2 },
            ]
        );
    }

    #[test]
    fn empty_string_is_empty_spec() {
        assert_eq!(parse("").unwrap(), Vec::new());
    }

    #[test]
    fn rejects_non_sparse_negative_offset() {
        assert!(parse("-2,5").is_err());
    }

    #[test]
    fn rejects_negative_length() {
        assert!(parse("0,-5").is_err());
    }

    #[test]
    fn rejects_missing_comma() {
        assert!(parse("10:5").is_err());
    }

    #[test]
    fn read_concatenates_regions_with_sparse_zero_fill() {
        let data = b"0123456789".to_vec();
        let mut cursor = Cursor::new(data);
        let spec = parse("2,3:-1,2:7,2").unwrap();
        let out = positional_read(&mut cursor, &spec).unwrap();
        assert_eq!(out, b"234\x00\x0078");
    }

    #[test]
    fn read_rejects_oversized_total() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let spec = vec![Extent { offset: 0, length: MAX_POSITIONAL_READ_LEN + 1 }];
        assert!(positional_read(&mut cursor, &spec).is_err());
    }

    #[test]
    fn write_splits_across_regions_and_skips_sparse() {
        let mut cursor = Cursor::new(vec![b'.'; 10]);
        let spec = parse("2,3:-1,2:7,2").unwrap();
        positional_write(&mut cursor, &spec, b"234XX78").unwrap();
        assert_eq!(cursor.into_inner(), b"..234..78.".to_vec());
    }

    #[test]
    fn write_rejects_length_mismatch() {
        let mut cursor = Cursor::new(vec![0u8; 10]);
        let spec = parse("0,5").unwrap();
        assert!(positional_write(&mut cursor, &spec, b"abc").is_err());
    }
}
