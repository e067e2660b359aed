//! End-to-end scenarios from spec.md §8, driven through the public
//! `bsdiff40::apply` facade against real temp files rather than the
//! in-memory cursors `interpreter`'s unit tests use.

use std::fs;
use std::io::Write;

use bzip2::write::BzEncoder;
use bzip2::Compression;
use tempfile::tempdir;

fn bzip2_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn sign_magnitude_bytes(value: i64) -> [u8; 8] {
    let magnitude = value.unsigned_abs();
    let mut raw = magnitude;
    if value < 0 {
        raw |= 0x8000_0000_0000_0000;
    }
    raw.to_le_bytes()
}

fn triple(x: i64, y: i64, z: i64) -> Vec<u8> {
    let mut out = Vec::with_capacity(24);
    out.extend_from_slice(&sign_magnitude_bytes(x));
    out.extend_from_slice(&sign_magnitude_bytes(y));
    out.extend_from_slice(&sign_magnitude_bytes(z));
    out
}

/// Hand-builds a full BSDIFF40 container: header + three independently
/// bzip2-compressed sub-streams, mirroring the on-disk layout of §6.
fn build_patch(control: &[u8], diff: &[u8], extra: &[u8], new_size: u64) -> Vec<u8> {
    let ctrl_block = bzip2_compress(control);
    let diff_block = bzip2_compress(diff);
    let extra_block = bzip2_compress(extra);

    let mut out = Vec::new();
    out.extend_from_slice(b"BSDIFF40");
    out.extend_from_slice(&(ctrl_block.len() as u64).to_le_bytes());
    out.extend_from_slice(&(diff_block.len() as u64).to_le_bytes());
    out.extend_from_slice(&new_size.to_le_bytes());
    out.extend_from_slice(&ctrl_block);
    out.extend_from_slice(&diff_block);
    out.extend_from_slice(&extra_block);
    out
}

#[test]
fn identity_patch() {
    let dir = tempdir().unwrap();
    let old_path = dir.path().join("old");
    let new_path = dir.path().join("new");
    let patch_path = dir.path().join("patch");

    fs::write(&old_path, b"hello").unwrap();
    let patch = build_patch(&triple(5, 0, 0), &[0u8; 5], &[], 5);
    fs::write(&patch_path, patch).unwrap();

    bsdiff40::apply(&old_path, &new_path, &patch_path, None, None).unwrap();
    assert_eq!(fs::read(&new_path).unwrap(), b"hello");
}

#[test]
fn pure_insertion() {
    let dir = tempdir().unwrap();
    let old_path = dir.path().join("old");
    let new_path = dir.path().join("new");
    let patch_path = dir.path().join("patch");

    fs::write(&old_path, b"").unwrap();
    let patch = build_patch(&triple(0, 3, 0), &[], b"abc", 3);
    fs::write(&patch_path, patch).unwrap();

    bsdiff40::apply(&old_path, &new_path, &patch_path, None, None).unwrap();
    assert_eq!(fs::read(&new_path).unwrap(), b"abc");
}

#[test]
fn byte_delta() {
    let dir = tempdir().unwrap();
    let old_path = dir.path().join("old");
    let new_path = dir.path().join("new");
    let patch_path = dir.path().join("patch");

    fs::write(&old_path, b"aaaa").unwrap();
    let patch = build_patch(&triple(4, 0, 0), &[0, 1, 2, 3], &[], 4);
    fs::write(&patch_path, patch).unwrap();

    bsdiff40::apply(&old_path, &new_path, &patch_path, None, None).unwrap();
    assert_eq!(fs::read(&new_path).unwrap(), b"abcd");
}

#[test]
fn negative_z_rewinds_old_cursor() {
    let dir = tempdir().unwrap();
    let old_path = dir.path().join("old");
    let new_path = dir.path().join("new");
    let patch_path = dir.path().join("patch");

    fs::write(&old_path, b"abcdef").unwrap();
    let mut control = triple(3, 0, -3);
    control.extend_from_slice(&triple(3, 0, 0));
    let patch = build_patch(&control, &[0u8; 6], &[], 6);
    fs::write(&patch_path, patch).unwrap();

    bsdiff40::apply(&old_path, &new_path, &patch_path, None, None).unwrap();
    assert_eq!(fs::read(&new_path).unwrap(), b"abcabc");
}

#[test]
fn extent_read_scatters_across_old_file() {
    let dir = tempdir().unwrap();
    let old_path = dir.path().join("old");
    let new_path = dir.path().join("new");
    let patch_path = dir.path().join("patch");

    // old extent list selects "234", 2 sparse zeros, "78" out of "0123456789",
    // which the interpreter then diff-adds zero onto to reproduce it verbatim.
    fs::write(&old_path, b"0123456789").unwrap();
    let patch = build_patch(&triple(7, 0, 0), &[0u8; 7], &[], 7);
    fs::write(&patch_path, patch).unwrap();

    bsdiff40::apply(&old_path, &new_path, &patch_path, Some("2:3,-1:2,7:2"), None).unwrap();
    assert_eq!(fs::read(&new_path).unwrap(), b"234\x00\x0078");
}

#[test]
fn corrupt_magic_is_rejected_before_touching_old_or_output() {
    let dir = tempdir().unwrap();
    let old_path = dir.path().join("old");
    let new_path = dir.path().join("new");
    let patch_path = dir.path().join("patch");

    fs::write(&old_path, b"hello").unwrap();
    let mut patch = build_patch(&triple(5, 0, 0), &[0u8; 5], &[], 5);
    patch[7] = b'1'; // "BSDIFF40" -> "BSDIFF41"
    fs::write(&patch_path, patch).unwrap();

    assert!(bsdiff40::apply(&old_path, &new_path, &patch_path, None, None).is_err());
    assert!(!new_path.exists());
}

#[test]
fn new_size_zero_creates_empty_output() {
    let dir = tempdir().unwrap();
    let old_path = dir.path().join("old");
    let new_path = dir.path().join("new");
    let patch_path = dir.path().join("patch");

    fs::write(&old_path, b"").unwrap();
    let patch = build_patch(&[], &[], &[], 0);
    fs::write(&patch_path, patch).unwrap();

    bsdiff40::apply(&old_path, &new_path, &patch_path, None, None).unwrap();
    assert_eq!(fs::read(&new_path).unwrap(), b"");
}

#[test]
fn mismatched_extent_args_are_rejected() {
    let dir = tempdir().unwrap();
    let old_path = dir.path().join("old");
    let new_path = dir.path().join("new");
    let patch_path = dir.path().join("patch");

    fs::write(&old_path, b"hello").unwrap();
    let patch = build_patch(&triple(5, 0, 0), &[0u8; 5], &[], 5);
    fs::write(&patch_path, patch).unwrap();

    let err = bsdiff40::apply(&old_path, &new_path, &patch_path, Some("0:5"), None).unwrap_err();
    assert!(matches!(err, bsdiff40::BsdiffError::InvalidExtents(_)));
}
