//! # Lineed Buffer
//!
//! Text storage engine for a line-oriented editor. Line text lives in a
//! scratch file on disk; memory only holds an index of `(offset, length)`
//! records, so document size is bounded by disk space rather than RAM.
//!
//! ## Key Concepts for Learning Rust
//!
//! ### Arenas instead of pointers
//! - `LineIndex` stores its nodes in a `Vec` and links them with `NodeId`
//!   indices, so a circular doubly-linked list needs no `unsafe`
//! - Slot 0 is the sentinel: "before the first line / after the last"
//!
//! ### Ownership of the scratch file
//! - `ScratchStore` owns the file handle and the path that deletes it
//! - `Buffer` owns exactly one store and the index that points into it
//!
//! ### Errors as values
//! - Every fallible operation returns `BufferResult<T>`
//! - `Buffer` also remembers the last failure message for display

mod buffer;
mod interrupt;
mod line_index;
mod scratch;
mod translit;

pub use buffer::{Buffer, BufferConfig, DEFAULT_MAX_LINE_LEN};
pub use interrupt::{HoldGuard, Interrupts};
pub use line_index::{LineIndex, NodeId};
pub use scratch::{
    Backing, DEFAULT_SCRATCH_DIR, DocumentFlags, LineRecord, SCRATCH_PREFIX, ScratchStats,
    ScratchStore, resolve_scratch_dir,
};
pub use translit::Transliterator;

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

pub(crate) const OPEN_FAILED: &str = "cannot open temp file";
pub(crate) const CLOSE_FAILED: &str = "cannot close temp file";
pub(crate) const SEEK_FAILED: &str = "cannot seek temp file";
pub(crate) const READ_FAILED: &str = "cannot read temp file";
pub(crate) const WRITE_FAILED: &str = "cannot write temp file";

/// Errors that can occur during buffer operations
///
/// The `Display` text of each variant is the short message an editor shows
/// to its user; the I/O cause stays reachable through `source()`.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("{message}")]
    Io {
        message: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("line too long")]
    LineTooLong { len: usize, max: usize },

    #[error("out of memory")]
    OutOfMemory,

    #[error("invalid address")]
    InvalidAddress,

    #[error("interrupted")]
    Interrupted,
}

impl BufferError {
    pub(crate) fn io(message: &'static str, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Returns true for failures against the backing file.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

impl From<std::collections::TryReserveError> for BufferError {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::OutOfMemory
    }
}
