//! Grouping a directory tree into size-bounded chunks.
//!
//! [`walk`] traverses the input tree and folds its entries into an ordered
//! list of [`Chunk`]s. Any file larger than the limit is first cut into
//! fragments by [`split`]; fragments live in a [`Staging`] directory outside
//! the input tree so the ongoing walk never sees them.

mod chunker;
mod splitter;

pub use chunker::{Chunk, ChunkEntry, EntryKind, walk};
pub use splitter::{Fragment, Staging, split};
