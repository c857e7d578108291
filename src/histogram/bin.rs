//! Read-only bin views and the forward/backward cursor over a histogram's
//! non-empty bins.

use crate::error::{Error, Result};
use crate::histogram::Histogram;

/// A snapshot of one bin: its index, bounds clamped to the histogram's
/// current `[min, max]`, and the running counts of samples strictly before
/// and after it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    bin_index: i32,
    count: u64,
    less_count: u64,
    greater_count: u64,
    lower_bound: f64,
    upper_bound: f64,
    is_underflow: bool,
    is_overflow: bool,
}

impl Bin {
    pub fn bin_index(&self) -> i32 {
        self.bin_index
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn less_count(&self) -> u64 {
        self.less_count
    }

    pub fn greater_count(&self) -> u64 {
        self.greater_count
    }

    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }

    pub fn is_underflow_bin(&self) -> bool {
        self.is_underflow
    }

    pub fn is_overflow_bin(&self) -> bool {
        self.is_overflow
    }

    pub fn is_first_non_empty_bin(&self) -> bool {
        self.less_count == 0
    }

    pub fn is_last_non_empty_bin(&self) -> bool {
        self.greater_count == 0
    }
}

/// A mutable cursor over a histogram's non-empty bins, advancing in either
/// direction. Any mutation of the source histogram invalidates an
/// outstanding iterator; nothing here detects that, matching the spec's
/// "undefined behavior" contract rather than paying for a generation
/// counter on every query.
#[derive(Clone)]
pub struct BinIterator<'h> {
    source: &'h Histogram,
    bin_index: i32,
    less_count: u64,
    greater_count: u64,
}

impl<'h> BinIterator<'h> {
    pub(crate) fn new(
        source: &'h Histogram,
        bin_index: i32,
        less_count: u64,
        greater_count: u64,
    ) -> Self {
        BinIterator {
            source,
            bin_index,
            less_count,
            greater_count,
        }
    }

    pub fn bin_index(&self) -> i32 {
        self.bin_index
    }

    pub fn less_count(&self) -> u64 {
        self.less_count
    }

    pub fn greater_count(&self) -> u64 {
        self.greater_count
    }

    pub fn is_first_non_empty_bin(&self) -> bool {
        self.less_count == 0
    }

    pub fn is_last_non_empty_bin(&self) -> bool {
        self.greater_count == 0
    }

    /// Materializes the [`Bin`] view the cursor currently points at.
    pub fn bin(&self) -> Bin {
        let layout = self.source.get_layout();
        let count = self.source.count_at(self.bin_index);
        let lower = layout.bin_lower_bound(self.bin_index).max(self.source.get_min());
        let upper = layout.bin_upper_bound(self.bin_index).min(self.source.get_max());
        Bin {
            bin_index: self.bin_index,
            count,
            less_count: self.less_count,
            greater_count: self.greater_count,
            lower_bound: lower,
            upper_bound: upper,
            is_underflow: self.bin_index <= layout.underflow_bin_index(),
            is_overflow: self.bin_index >= layout.overflow_bin_index(),
        }
    }

    /// Advances to the non-empty bin with the smallest index strictly
    /// greater than the current one. Fails if already at the last
    /// non-empty bin.
    pub fn next(&mut self) -> Result<()> {
        let next_index = self.source.next_bin_index(self.bin_index).ok_or_else(|| {
            Error::InvalidArgument("iterator is already at the last non-empty bin".to_string())
        })?;
        self.less_count += self.source.count_at(self.bin_index);
        self.bin_index = next_index;
        let current_count = self.source.count_at(self.bin_index);
        self.greater_count = self.source.get_total_count() - self.less_count - current_count;
        Ok(())
    }

    /// Symmetric to [`Self::next`].
    pub fn previous(&mut self) -> Result<()> {
        let prev_index = self.source.prev_bin_index(self.bin_index).ok_or_else(|| {
            Error::InvalidArgument("iterator is already at the first non-empty bin".to_string())
        })?;
        self.greater_count += self.source.count_at(self.bin_index);
        self.bin_index = prev_index;
        let current_count = self.source.count_at(self.bin_index);
        self.less_count = self.source.get_total_count() - self.greater_count - current_count;
        Ok(())
    }

    /// A detached snapshot: advancing the copy does not affect `self`.
    pub fn copy(&self) -> BinIterator<'h> {
        self.clone()
    }
}
