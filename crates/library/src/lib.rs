//! What album-rsync does with storages: print them as a tree, or sync one
//! into another.

pub mod error;
pub mod sync;
pub mod walker;

pub use crate::sync::{SyncOptions, SyncSummary, sync};
pub use crate::walker::{TreeWalker, WalkOptions, WalkSummary};
