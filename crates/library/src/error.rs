//! Library Error Types
//!
//! Storage failures are wrapped rather than flattened, so the underlying
//! backend error (and where it was raised) stays in the error tree.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A storage backend failed after its own retries were exhausted.
    #[display("storage operation failed")]
    Storage,
    /// The listing could not be written out.
    #[display("failed to write listing")]
    Output,
}
