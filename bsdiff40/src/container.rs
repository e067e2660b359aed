//! BSDIFF40 container: 32-byte header plus three bzip2-compressed
//! sub-streams (control, diff, extra), each attached independently.
//!
//! Grounded on `bspatch.c`'s header decode (`offtin`, the `BSDIFF40` magic
//! check, the three `BZ2_bzReadOpen` handles at computed offsets) and, for
//! the Rust idiom of a byteorder-driven fixed-layout header reader plus
//! per-block `bzip2::read::BzDecoder` attachment, on `udif`'s
//! `KolyHeader::read` and `DmgReader::decompress_partition`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use bzip2::read::BzDecoder;

use crate::error::{BsdiffError, Result};

/// Magic bytes identifying a BSDIFF40 patch file.
pub const MAGIC: &[u8; 8] = b"BSDIFF40";

/// Size in bytes of the fixed patch header.
pub const HEADER_LEN: u64 = 32;

/// Decoded and validated patch header.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub ctrl_len: u64,
    pub data_len: u64,
    pub new_size: u64,
}

impl Header {
    /// Reads and validates the 32-byte header from the current position of
    /// `reader`, which must be the start of the file.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(BsdiffError::corrupt(format!(
                "bad magic: expected {:?}, found {:?}",
                MAGIC, magic
            )));
        }

        let ctrl_len = read_offset(reader)?;
        let data_len = read_offset(reader)?;
        let new_size = read_offset(reader)?;

        Ok(Header { ctrl_len, data_len, new_size })
    }
}

/// Decodes one sign-magnitude 64-bit little-endian integer and rejects a
/// negative result, as every header field must be non-negative.
fn read_offset<R: Read>(reader: &mut R) -> Result<u64> {
    let raw = reader.read_u64::<LittleEndian>()?;
    let (value, negative) = decode_sign_magnitude(raw);
    if negative {
        return Err(BsdiffError::corrupt(format!("negative header field (raw {raw:#x})")));
    }
    Ok(value)
}

/// Splits a little-endian sign-magnitude 64-bit field into (magnitude, sign).
/// Bit 63 of the field (the high bit of the last byte) is the sign; the
/// remaining 63 bits are the magnitude. This is *not* two's complement: the
/// redundant negative zero (sign set, magnitude 0) decodes as 0 and is not
/// treated as negative.
pub(crate) fn decode_sign_magnitude(raw: u64) -> (u64, bool) {
    let magnitude = raw & 0x7FFF_FFFF_FFFF_FFFF;
    let negative = (raw & 0x8000_0000_0000_0000) != 0 && magnitude != 0;
    (magnitude, negative)
}

/// Decodes one sign-magnitude 64-bit little-endian integer as a signed
/// value, for the control triples' old-position delta which may be
/// negative. A short read from the control sub-stream is a corrupt-patch
/// error, not a bare I/O error: a truncated patch with fewer triples than
/// `new_size` demands must reach the same error kind as a short diff/extra
/// sub-stream read.
pub(crate) fn read_signed<R: Read>(reader: &mut R) -> Result<i64> {
    let raw = reader
        .read_u64::<LittleEndian>()
        .map_err(|e| BsdiffError::corrupt(format!("short read from control sub-stream: {e}")))?;
    let (magnitude, negative) = decode_sign_magnitude(raw);
    if magnitude > i64::MAX as u64 {
        return Err(BsdiffError::corrupt(format!("control value {magnitude} overflows i64")));
    }
    let value = magnitude as i64;
    Ok(if negative { -value } else { value })
}

/// The three independently-positioned bzip2 decoder handles that together
/// drive the interpreter loop. Generic over the underlying reader so tests
/// can back it with an in-memory buffer instead of a real file.
pub struct Substreams<R> {
    pub control: BzDecoder<R>,
    pub diff: BzDecoder<R>,
    pub extra: BzDecoder<R>,
}

/// Opens `patch_path` three times and attaches an independent bzip2 decoder
/// to each handle at the offset computed from `header`, so the three
/// sub-streams can be read in lockstep without sharing any cursor.
pub fn open_substreams<P: AsRef<Path>>(patch_path: P, header: &Header) -> Result<Substreams<File>> {
    let control_start = HEADER_LEN;
    let diff_start = HEADER_LEN + header.ctrl_len;
    let extra_start = HEADER_LEN + header.ctrl_len + header.data_len;

    let mut control_file = File::open(&patch_path)?;
    control_file.seek(SeekFrom::Start(control_start))?;

    let mut diff_file = File::open(&patch_path)?;
    diff_file.seek(SeekFrom::Start(diff_start))?;

    let mut extra_file = File::open(&patch_path)?;
    extra_file.seek(SeekFrom::Start(extra_start))?;

    Ok(Substreams {
        control: BzDecoder::new(control_file),
        diff: BzDecoder::new(diff_file),
        extra: BzDecoder::new(extra_file),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header_bytes(ctrl_len: u64, data_len: u64, new_size: u64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        buf.extend_from_slice(MAGIC);
        for v in [ctrl_len, data_len, new_size] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }

    #[test]
    fn decodes_well_formed_header() {
        let bytes = header_bytes(10, 20, 30);
        let mut cursor = Cursor::new(bytes);
        let header = Header::read(&mut cursor).unwrap();
        assert_eq!(header.ctrl_len, 10);
        assert_eq!(header.data_len, 20);
        assert_eq!(header.new_size, 30);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = header_bytes(10, 20, 30);
        bytes[7] = b'1'; // "BSDIFF41"
        let mut cursor = Cursor::new(bytes);
        assert!(Header::read(&mut cursor).is_err());
    }

    #[test]
    fn rejects_negative_field() {
        let mut bytes = header_bytes(10, 20, 30);
        // set the sign bit on ctrl_len's top byte
        bytes[15] |= 0x80;
        let mut cursor = Cursor::new(bytes);
        assert!(Header::read(&mut cursor).is_err());
    }

    #[test]
    fn redundant_negative_zero_decodes_as_zero() {
        let raw = 0x8000_0000_0000_0000u64;
        let (value, negative) = decode_sign_magnitude(raw);
        assert_eq!(value, 0);
        assert!(!negative);
    }

    #[test]
    fn decode_sign_magnitude_splits_correctly() {
        assert_eq!(decode_sign_magnitude(5), (5, false));
        assert_eq!(decode_sign_magnitude(0x8000_0000_0000_0005), (5, true));
    }

    #[test]
    fn read_signed_handles_negative_delta() {
        let raw = 0x8000_0000_0000_0007u64; // -7
        let mut cursor = Cursor::new(raw.to_le_bytes().to_vec());
        assert_eq!(read_signed(&mut cursor).unwrap(), -7);
    }
}
