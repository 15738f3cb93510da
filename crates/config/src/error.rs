//! Config Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A configuration source could not be read or parsed.
    #[display("could not load configuration")]
    Load,
    /// A setting holds a value outside its allowed range.
    #[display("invalid value for `{_0}`")]
    InvalidValue(#[error(not(source))] &'static str),
    /// An include/exclude setting is not a valid regular expression.
    #[display("invalid include/exclude pattern")]
    InvalidPattern,
}
