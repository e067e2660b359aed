//! The extent model: a typed (offset, length) pair plus the owning list and
//! its prefix-length table, as parsed from the `off:len(,off:len)*` grammar.
//!
//! Grounded on `extents.h`/`extents_parse` (the comma/colon grammar) and the
//! `prefix_len_t` bookkeeping in `exfile.cc` (`prec`/`total` per extent).

use crate::error::{BsdiffError, Result};

/// Sentinel offset marking a sparse (zero-filled, write-discarding) extent.
pub const SPARSE: i64 = -1;

/// A single (offset, length) region. `offset == SPARSE` denotes a virtual
/// region that reads as zeros and silently discards writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub offset: i64,
    pub length: u64,
}

impl Extent {
    pub fn is_sparse(&self) -> bool {
        self.offset == SPARSE
    }
}

/// Prefix-length record for extent index *i*: `prec` is the sum of lengths
/// of extents strictly before *i*, `total` is `prec + len[i]`.
#[derive(Debug, Clone, Copy)]
struct PrefixLen {
    prec: u64,
    total: u64,
}

/// An ordered sequence of extents plus the auxiliary prefix table needed for
/// O(log D) seeks (see [`crate::exfile::ExtentFile`]).
#[derive(Debug, Clone)]
pub struct ExtentList {
    extents: Vec<Extent>,
    prefix: Vec<PrefixLen>,
    logical_length: u64,
}

impl ExtentList {
    /// Build an extent list from an already-parsed array, computing the
    /// prefix table. `prec[0] = 0`; `total[i] = prec[i] + len[i]`;
    /// `prec[i+1] = total[i]`; `logical_length = total[n-1]` (or 0 if empty).
    pub fn from_extents(extents: Vec<Extent>) -> Self {
        let mut prefix = Vec::with_capacity(extents.len());
        let mut running = 0u64;
        for ex in &extents {
            let prec = running;
            running += ex.length;
            prefix.push(PrefixLen { prec, total: running });
        }
        let logical_length = running;
        ExtentList { extents, prefix, logical_length }
    }

    /// Parse the canonical extent grammar: `off:len(,off:len)*`. `off` is
    /// `-1` or a non-negative decimal fitting in a signed 64-bit integer;
    /// `len` is a non-negative decimal fitting in a signed 64-bit integer.
    /// Whitespace is not accepted. An empty string yields an empty list.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(ExtentList::from_extents(Vec::new()));
        }

        let mut extents = Vec::new();
        for pair in s.split(',') {
            let (off_str, len_str) = pair.split_once(':').ok_or_else(|| {
                BsdiffError::invalid_extents(format!("missing ':' in extent pair '{pair}'"))
            })?;

            let offset = parse_i64_strict(off_str)?;
            if offset < SPARSE {
                return Err(BsdiffError::invalid_extents(format!(
                    "negative offset {offset} is not the sparse sentinel -1"
                )));
            }

            let length_signed = parse_i64_strict(len_str)?;
            if length_signed < 0 {
                return Err(BsdiffError::invalid_extents(format!(
                    "negative length {length_signed}"
                )));
            }

            extents.push(Extent { offset, length: length_signed as u64 });
        }

        Ok(ExtentList::from_extents(extents))
    }

    pub fn len(&self) -> usize {
        self.extents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    pub fn logical_length(&self) -> u64 {
        self.logical_length
    }

    pub fn extent(&self, idx: usize) -> Extent {
        self.extents[idx]
    }

    fn prec(&self, idx: usize) -> u64 {
        self.prefix[idx].prec
    }

    /// Crate-visible accessor for the prefix length of extent `idx`, used by
    /// [`crate::exfile::ExtentFile`] to compute a cursor's offset within the
    /// extent it lands in after a seek.
    pub(crate) fn prec_at(&self, idx: usize) -> u64 {
        self.prec(idx)
    }

    fn total(&self, idx: usize) -> u64 {
        self.prefix[idx].total
    }

    /// Locate the unique index `i` such that `prec[i] <= pos < total[i]`,
    /// using a galloping search from `init_idx` followed by a binary search
    /// within the bracketing window. `pos` must be `< logical_length()`.
    /// Grounded on `ex_arr_search` in `exfile.cc`.
    pub(crate) fn search_from(&self, pos: u64, init_idx: usize) -> usize {
        let n = self.extents.len();
        debug_assert!(n > 0);
        debug_assert!(pos < self.logical_length);

        let last = n - 1;
        let mut init_idx = init_idx;
        if init_idx == n {
            init_idx = last;
        }

        let mut i = init_idx as isize;
        let mut j = i;
        let mut leap: isize = 1;

        while i > 0 && pos < self.prec(i as usize) {
            j = i - 1;
            i -= leap;
            if i < 0 {
                i = 0;
            }
            leap <<= 1;
        }
        while (j as usize) < last && pos >= self.total(j as usize) {
            i = j + 1;
            j += leap;
            if j > last as isize {
                j = last as isize;
            }
            leap <<= 1;
        }

        loop {
            let k = (i + j) / 2;
            if pos < self.prec(k as usize) {
                j = k - 1;
            } else if pos >= self.total(k as usize) {
                i = k + 1;
            } else {
                return k as usize;
            }
        }
    }
}

/// Parses a decimal signed-64-bit integer, rejecting overflow and any
/// non-decimal content (no whitespace, no leading `+`). Shared with the
/// positional-I/O grammar in [`crate::pio`], which reuses the same integer
/// lexis inside a different pair/separator layout.
pub(crate) fn parse_i64_strict(s: &str) -> Result<i64> {
    s.parse::<i64>()
        .map_err(|_| BsdiffError::invalid_extents(format!("'{s}' is not a valid i64")))
}
