use std::fmt;
use std::io;

/// The error type returned by every fallible operation in this crate.
#[derive(Debug)]
pub enum Error {
    /// A caller-supplied argument violates a documented precondition:
    /// a NaN passed to `add_value`, a negative increment, a probability
    /// outside `[0, 1]`, an invalid layout configuration, unsorted or
    /// non-finite custom breakpoints, or an out-of-range rank.
    InvalidArgument(String),
    /// A counter would exceed its representable range: `total + n` would
    /// overflow `u64`, or a dynamic histogram's bit-packed storage would
    /// need to grow past mode 6 (64 bits per cell).
    ArithmeticOverflow(String),
    /// Propagated from the caller-supplied byte sink or source.
    Io(io::Error),
    /// The wire format is unreadable: unknown serial version, an oversized
    /// or truncated varint, or any other structural inconsistency.
    MalformedData(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Error::ArithmeticOverflow(msg) => write!(f, "arithmetic overflow: {msg}"),
            Error::Io(e) => write!(f, "i/o error: {e}"),
            Error::MalformedData(msg) => write!(f, "malformed data: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
