//! Extent file stream: a seekable `Read + Write + Seek` view over a region
//! that is physically scattered across a backing file plus sparse holes.
//!
//! Grounded on `exfile.cc`/`exfile.h` (the `exfile_t` cookie, `exfile_io`,
//! `exfile_seek`, `exfile_open`/`exfile_close`) and, for the Rust idiom of a
//! generic `Read + Seek` reader wrapping scattered physical extents, on
//! `hfsplus::extents::ForkReader`.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{BsdiffError, Result};
use crate::extent::ExtentList;

/// Access mode an extent file is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl OpenMode {
    fn open_options(self) -> OpenOptions {
        let mut opts = OpenOptions::new();
        match self {
            OpenMode::ReadOnly => {
                opts.read(true);
            }
            OpenMode::WriteOnly => {
                opts.write(true);
            }
            OpenMode::ReadWrite => {
                opts.read(true).write(true);
            }
        }
        opts
    }
}

/// Whether an `ExtentFile` owns its extent list (frees it on drop, the
/// historical `ex_free` callback) or merely borrows one kept alive by the
/// caller for the stream's lifetime.
enum ExtentsHandle<'a> {
    Owned(ExtentList),
    Borrowed(&'a ExtentList),
}

impl ExtentsHandle<'_> {
    fn get(&self) -> &ExtentList {
        match self {
            ExtentsHandle::Owned(e) => e,
            ExtentsHandle::Borrowed(e) => e,
        }
    }
}

/// A seekable byte-stream view over an extent list. Not thread-safe: the
/// cached physical position and logical cursor are mutated in place by every
/// operation, mirroring `exfile_t`.
pub struct ExtentFile<'a, H> {
    handle: H,
    extents: ExtentsHandle<'a>,
    /// Last known physical offset of `handle`, or `None` if unknown
    /// (invalidated on any backing seek failure).
    phys_pos: Option<u64>,
    curr_ex_idx: usize,
    curr_ex_pos: u64,
    curr_pos: u64,
}

impl<'a, H: Read + Write + Seek> ExtentFile<'a, H> {
    fn new(mut handle: H, extents: ExtentsHandle<'a>) -> Result<Self> {
        if extents.get().is_empty() {
            return Err(BsdiffError::invalid_extents("extent list must be non-empty"));
        }
        let phys_pos = handle.stream_position().ok();
        Ok(ExtentFile { handle, extents, phys_pos, curr_ex_idx: 0, curr_ex_pos: 0, curr_pos: 0 })
    }

    /// Wrap an already-open handle, taking ownership of the extent list.
    pub fn from_handle(handle: H, extents: ExtentList) -> Result<Self> {
        Self::new(handle, ExtentsHandle::Owned(extents))
    }

    /// Wrap an already-open handle, borrowing the extent list for the
    /// stream's lifetime; the caller remains responsible for the list.
    pub fn from_handle_borrowed(handle: H, extents: &'a ExtentList) -> Result<Self> {
        Self::new(handle, ExtentsHandle::Borrowed(extents))
    }

    fn extents(&self) -> &ExtentList {
        self.extents.get()
    }

    /// Close the stream. Resources are actually released by `Drop` (the
    /// backing handle and the extent list/prefix table are ordinary owned
    /// Rust values); this method exists so callers have an explicit,
    /// fallible close point to mirror `exfile_close`, which always succeeds.
    pub fn close(self) -> Result<()> {
        Ok(())
    }

    pub fn logical_length(&self) -> u64 {
        self.extents().logical_length()
    }
}

impl<'a> ExtentFile<'a, File> {
    /// Open `path` against `extents` with `mode`. Does not create the
    /// backing file when writing, and does not truncate it.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode, extents: ExtentList) -> Result<Self> {
        let file = mode.open_options().open(path)?;
        Self::from_handle(file, extents)
    }

    /// As [`Self::open`], but borrows `extents` for the stream's lifetime.
    pub fn open_borrowed<P: AsRef<Path>>(
        path: P,
        mode: OpenMode,
        extents: &'a ExtentList,
    ) -> Result<Self> {
        let file = mode.open_options().open(path)?;
        Self::from_handle_borrowed(file, extents)
    }
}

impl<H: Read + Write + Seek> Read for ExtentFile<'_, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut done = 0usize;
        loop {
            if done == buf.len() {
                return Ok(done);
            }
            match self.step(buf.len() - done, true, |handle, count| {
                handle.read(&mut buf[done..done + count])
            }) {
                Ok(StepOutcome::Transferred(n, requested)) => {
                    done += n;
                    if n < requested {
                        return Ok(done); // backing I/O was short; stop here
                    }
                }
                Ok(StepOutcome::SparseZeroed(n)) => {
                    for b in &mut buf[done..done + n] {
                        *b = 0;
                    }
                    done += n;
                }
                Ok(StepOutcome::EndOfFile) => return Ok(done),
                Err(e) => return if done == 0 { Err(e) } else { Ok(done) },
            }
        }
    }
}

impl<H: Read + Write + Seek> Write for ExtentFile<'_, H> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut done = 0usize;
        loop {
            if done == buf.len() {
                return Ok(done);
            }
            match self.step(buf.len() - done, false, |handle, count| {
                handle.write(&buf[done..done + count])
            }) {
                Ok(StepOutcome::Transferred(n, requested)) => {
                    done += n;
                    if n < requested {
                        return Ok(done);
                    }
                }
                Ok(StepOutcome::SparseZeroed(n)) => {
                    // sparse write: bytes silently discarded, counted as sent
                    done += n;
                }
                Ok(StepOutcome::EndOfFile) => return Ok(done),
                Err(e) => return if done == 0 { Err(e) } else { Ok(done) },
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.handle.flush()
    }
}

/// Outcome of a single [`ExtentFile::step`] call. The `usize` in the first
/// two variants is `(transferred, requested)`: when `transferred < requested`
/// the backing I/O was partial and the caller must not attempt another step.
enum StepOutcome {
    /// Bytes moved to/from the backing handle via the real-extent path.
    Transferred(usize, usize),
    /// Bytes served from (or discarded into) a sparse extent. Always full,
    /// since zero-fill/discard cannot itself report a short count.
    SparseZeroed(usize),
    /// The cursor is already at the end of the extent list.
    EndOfFile,
}

impl<H: Read + Write + Seek> ExtentFile<'_, H> {
    /// Advances past any zero-length or fully-consumed extents, then
    /// performs one I/O step against the extent the cursor now sits in: at
    /// most `min(want, bytes remaining in that extent)` bytes, via `backing`
    /// for a real extent or a zero-fill/discard for a sparse one. On success
    /// the cursor (and, for a real extent, the physical-position cache) is
    /// advanced by exactly the number of bytes transferred.
    fn step(
        &mut self,
        want: usize,
        _do_read: bool,
        backing: impl FnOnce(&mut H, usize) -> io::Result<usize>,
    ) -> io::Result<StepOutcome> {
        let n = self.extents().len();
        loop {
            if self.curr_ex_idx == n {
                return Ok(StepOutcome::EndOfFile);
            }
            let ex = self.extents().extent(self.curr_ex_idx);
            if ex.length == self.curr_ex_pos {
                self.curr_ex_idx += 1;
                self.curr_ex_pos = 0;
                continue;
            }
            break;
        }

        let ex = self.extents().extent(self.curr_ex_idx);
        let ex_rem = (ex.length - self.curr_ex_pos) as usize;
        let count = want.min(ex_rem);

        let outcome = if ex.is_sparse() {
            self.curr_ex_pos += count as u64;
            self.curr_pos += count as u64;
            StepOutcome::SparseZeroed(count)
        } else {
            let target = ex.offset as u64 + self.curr_ex_pos;
            if self.phys_pos != Some(target) {
                match self.handle.seek(SeekFrom::Start(target)) {
                    Ok(_) => self.phys_pos = Some(target),
                    Err(e) => {
                        self.phys_pos = None;
                        return Err(e);
                    }
                }
            }
            let io_bytes = backing(&mut self.handle, count)?;
            self.phys_pos = Some(target + io_bytes as u64);
            self.curr_ex_pos += io_bytes as u64;
            self.curr_pos += io_bytes as u64;
            StepOutcome::Transferred(io_bytes, count)
        };

        Ok(outcome)
    }
}

impl<H: Read + Write + Seek> Seek for ExtentFile<'_, H> {
    /// Computes the new absolute logical position, rejects it if negative or
    /// past `logical_length`, and otherwise relocates the cursor via a
    /// galloping + binary search from the current extent index.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let logical_length = self.logical_length() as i128;
        let new_pos: i128 = match pos {
            SeekFrom::Start(off) => off as i128,
            SeekFrom::Current(off) => self.curr_pos as i128 + off as i128,
            SeekFrom::End(off) => logical_length + off as i128,
        };

        if new_pos < 0 || new_pos > logical_length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek position out of extent file bounds",
            ));
        }
        let new_pos = new_pos as u64;

        if new_pos != self.curr_pos {
            let n = self.extents().len();
            let new_ex_idx = if new_pos == self.logical_length() {
                n
            } else {
                self.extents().search_from(new_pos, self.curr_ex_idx)
            };

            self.curr_ex_pos = if new_ex_idx < n {
                new_pos - prec_of(self.extents(), new_ex_idx)
            } else {
                0
            };
            self.curr_ex_idx = new_ex_idx;
            self.curr_pos = new_pos;
        }

        Ok(new_pos)
    }
}

fn prec_of(list: &ExtentList, idx: usize) -> u64 {
    list.prec_at(idx)
}
