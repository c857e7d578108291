//! A histogram with guaranteed relative and absolute error bounds on any
//! value it stores, exact tracking of the minimum and maximum recorded
//! value, and a compact binary serialization format.
//!
//! The crate is organized around four layers, in dependency order:
//! [`layout`] maps values to bin indices under a chosen error budget,
//! [`histogram`] stores and queries bin counts against a layout,
//! [`estimators`] turns a bin-plus-rank back into a concrete value or
//! quantile, and [`serialization`] encodes/decodes a histogram's state.
//! [`algorithms`], [`bitio`], and [`varint`] are the low-level numeric and
//! byte-stream primitives the upper layers share.
//!
//! ```
//! use dynahist::{Histogram, Layout, ValueEstimator, QuantileEstimator};
//!
//! let layout = Layout::log_linear(1e-3, 1e-2, -1e6, 1e6).unwrap();
//! let mut histogram = Histogram::create_dynamic(layout);
//! for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
//!     histogram.add_value(value).unwrap();
//! }
//!
//! let median = histogram
//!     .get_quantile(0.5, &QuantileEstimator::linear(), &ValueEstimator::Uniform)
//!     .unwrap();
//! assert!(median > 2.0 && median < 4.0);
//! ```

pub mod algorithms;
pub mod bitio;
pub mod error;
pub mod estimators;
pub mod histogram;
pub mod layout;
pub mod serialization;
pub mod varint;

pub use error::{Error, Result};
pub use estimators::{QuantileEstimator, ValueEstimator};
pub use histogram::{Bin, BinIterator, DynamicHistogram, Histogram, PreprocessedHistogram, StaticHistogram};
pub use layout::{CustomLayout, Layout, LogApproximation, LogBasedLayout, OtelExponentialBucketsLayout};
