use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("source directory does not exist: {}", _0.display())]
    MissingSource(#[error(not(source))] PathBuf),
    #[display("could not open storage")]
    Storage,
    #[display("listing failed")]
    Listing,
    #[display("sync failed")]
    Sync,
}
