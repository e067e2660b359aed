//! BSDIFF40 patch application: a parser and interpreter for the historical
//! BSDIFF40 binary patch format, plus an extent-indexed file abstraction
//! that lets the old and new byte sequences be scattered, sparse-aware
//! regions of a file rather than whole files.
//!
//! The entry point is [`apply`]; everything else is exposed for callers
//! that want to drive the pieces themselves (e.g. applying a patch against
//! an already-open handle, or reusing the extent model elsewhere).

mod container;
mod error;
mod exfile;
mod extent;
mod facade;
mod interpreter;
mod pio;

pub use error::{BsdiffError, Result};
pub use exfile::{ExtentFile, OpenMode};
pub use extent::{Extent, ExtentList, SPARSE};
pub use facade::{apply, ReadSeek, WriteSeek};
pub use pio::{positional_read, positional_write, MAX_POSITIONAL_READ_LEN};
