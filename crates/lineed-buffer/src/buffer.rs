//! The buffer engine: one scratch store plus the line index that points
//! into it.
//!
//! ## Learning: Keeping Two Structures in Step
//!
//! Every record in the [`LineIndex`] refers to bytes in the open
//! [`ScratchStore`]. `Buffer` owns both, so nothing else can close the store
//! while records still point into it: closing empties the index, and opening
//! a new store always starts with an empty index.
//!
//! ## Learning: Errors Twice
//!
//! Operations return `BufferResult<T>` so callers can use `?`. The message of
//! the most recent failure is also kept in the buffer, for an editor that
//! prints `?` first and explains only when asked.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::interrupt::Interrupts;
use crate::line_index::{LineIndex, NodeId};
use crate::scratch::{DocumentFlags, ScratchStats, ScratchStore, resolve_scratch_dir};
use crate::translit::Transliterator;
use crate::{BufferError, BufferResult};

/// Default maximum line length, in bytes.
pub const DEFAULT_MAX_LINE_LEN: usize = i32::MAX as usize;

/// Configuration for buffer behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Directory for scratch files; falls back to `TMPDIR`, then `/tmp`
    pub scratch_dir: Option<PathBuf>,

    /// Lines must be shorter than this many bytes
    pub max_line_len: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

/// A document held as a line index over a scratch file.
///
/// # Thread Safety
///
/// `Buffer` is meant to be driven by one thread. It is `Send` but not `Sync`;
/// interrupts reach it through [`Interrupts`], never by touching the index.
#[derive(Debug)]
pub struct Buffer {
    /// Resolved once at initialisation
    scratch_dir: PathBuf,
    max_line_len: usize,

    store: ScratchStore,
    index: LineIndex,
    translit: Transliterator,
    interrupts: Interrupts,

    /// Message of the most recent failure
    last_error: Option<String>,
}

impl Buffer {
    /// Opens the first scratch store and an empty index.
    ///
    /// # Errors
    ///
    /// Returns `cannot open temp file` if the scratch file cannot be created.
    /// No buffer can exist without one, so an editor should treat this as
    /// fatal; see [`Buffer::initialize_or_exit`].
    pub fn initialize(config: &BufferConfig) -> BufferResult<Self> {
        let scratch_dir = resolve_scratch_dir(config.scratch_dir.as_deref());
        let store = ScratchStore::create(&scratch_dir, config.max_line_len)?;
        tracing::debug!(dir = %scratch_dir.display(), "buffer initialised");

        Ok(Self {
            scratch_dir,
            max_line_len: config.max_line_len,
            store,
            index: LineIndex::new(),
            translit: Transliterator::new(),
            interrupts: Interrupts::new(),
            last_error: None,
        })
    }

    /// Like [`Buffer::initialize`], but ends the process with status 2 on
    /// failure.
    pub fn initialize_or_exit(config: &BufferConfig) -> Self {
        match Self::initialize(config) {
            Ok(buffer) => buffer,
            Err(err) => {
                tracing::error!(error = %err, "cannot initialise buffer");
                eprintln!("{err}");
                std::process::exit(2);
            }
        }
    }

    // ==================== Lifecycle ====================

    /// Returns true while the scratch store is open.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.store.is_open()
    }

    /// Directory scratch files are created in.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Path of the current scratch file.
    pub fn scratch_path(&self) -> Option<&Path> {
        self.store.path()
    }

    /// Closes and deletes the scratch file and empties the index.
    ///
    /// # Errors
    ///
    /// Returns `cannot close temp file`; the store and the index are then
    /// left untouched so the text can still be read back.
    pub fn close(&mut self) -> BufferResult<()> {
        let result = self.store.close();
        let result = self.note(result);
        if result.is_ok() {
            self.index.clear();
        }
        result
    }

    /// Starts a fresh document on a new scratch file, closing the current
    /// one first.
    ///
    /// # Errors
    ///
    /// Returns the error of closing the old store or creating the new one.
    pub fn open(&mut self) -> BufferResult<()> {
        self.close()?;
        let result = ScratchStore::create(&self.scratch_dir, self.max_line_len);
        self.store = self.note(result)?;
        tracing::debug!(path = ?self.store.path(), "buffer reset");
        Ok(())
    }

    /// Releases the scratch file and ends the process with `code`.
    ///
    /// Works on a closed store too, and never fails.
    pub fn terminate(mut self, code: i32) -> ! {
        self.store.discard();
        std::process::exit(code)
    }

    // ==================== Lines ====================

    /// The line index, for counters and traversal.
    #[inline]
    pub fn index(&self) -> &LineIndex {
        &self.index
    }

    #[inline]
    pub fn last_line(&self) -> usize {
        self.index.last_line()
    }

    #[inline]
    pub fn current_line(&self) -> usize {
        self.index.current_line()
    }

    /// # Errors
    ///
    /// Returns `invalid address` if `n` is past the last line.
    pub fn set_current(&mut self, n: usize) -> BufferResult<()> {
        let result = self.index.set_current(n);
        self.note(result)
    }

    /// Node of line `n`; line 0 is the sentinel.
    ///
    /// # Errors
    ///
    /// Returns `invalid address` if `n` is past the last line.
    pub fn node_at(&mut self, n: usize) -> BufferResult<NodeId> {
        let result = {
            let _hold = self.interrupts.hold();
            self.index.node_at(n)
        };
        self.note(result)
    }

    /// Line number of `node`, by a scan from the first line.
    ///
    /// # Errors
    ///
    /// Returns `invalid address` if the node is not in the index.
    pub fn position_of(&mut self, node: NodeId) -> BufferResult<usize> {
        let result = self.index.position_of(node);
        self.note(result)
    }

    /// Text of `node`, `None` for the sentinel.
    ///
    /// The returned slice borrows a buffer reused by the next read.
    ///
    /// # Errors
    ///
    /// Returns `invalid address` for a removed node, or the scratch store's
    /// seek or read error. The index is unchanged either way.
    pub fn read_line(&mut self, node: NodeId) -> BufferResult<Option<&[u8]>> {
        if node.is_sentinel() {
            return Ok(None);
        }
        let Some(record) = self.index.record(node) else {
            self.last_error = Some(BufferError::InvalidAddress.to_string());
            return Err(BufferError::InvalidAddress);
        };
        match self.store.read_line(record) {
            Ok(text) => Ok(Some(text)),
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Text of line `n`, `None` for line 0.
    ///
    /// # Errors
    ///
    /// See [`Buffer::node_at`] and [`Buffer::read_line`].
    pub fn get_line(&mut self, n: usize) -> BufferResult<Option<&[u8]>> {
        let node = self.node_at(n)?;
        self.read_line(node)
    }

    /// Stores the first line of `text` and links it after the current line.
    ///
    /// Returns the new node and the input following the consumed newline.
    ///
    /// # Errors
    ///
    /// - `line too long`, with no I/O and no change to the index
    /// - the scratch store's seek or write error
    /// - `out of memory` if the node cannot be allocated
    pub fn put_line<'a>(&mut self, text: &'a [u8]) -> BufferResult<(NodeId, &'a [u8])> {
        let appended = self.store.append_line(text);
        let (record, rest) = self.note(appended)?;

        let linked = {
            let _hold = self.interrupts.hold();
            self.index.insert_after_current(record)
        };
        let node = self.note(linked)?;
        Ok((node, rest))
    }

    /// Stores every line of `text` after the current line.
    ///
    /// A final line without a newline is stored as well and sets
    /// [`DocumentFlags::newline_added`]. Interrupts are polled between lines;
    /// lines stored before an interrupt stay in the buffer.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`Buffer::put_line`], or `interrupted`.
    pub fn put_lines(&mut self, text: &[u8]) -> BufferResult<usize> {
        let mut rest = text;
        let mut added = 0;
        while !rest.is_empty() {
            let polled = self.interrupts.poll();
            self.note(polled)?;
            let unterminated = memchr::memchr(b'\n', rest).is_none();
            let (_, next) = self.put_line(rest)?;
            if unterminated {
                self.store.flags_mut().newline_added = true;
            }
            rest = next;
            added += 1;
        }
        Ok(added)
    }

    /// Removes lines `first..=last`; the line before them becomes current.
    ///
    /// # Errors
    ///
    /// Returns `invalid address` for a range outside the buffer.
    pub fn delete_lines(&mut self, first: usize, last: usize) -> BufferResult<usize> {
        let removed = {
            let _hold = self.interrupts.hold();
            self.index.unlink_range(first, last)
        };
        self.note(removed).map(|records| records.len())
    }

    // ==================== Utilities ====================

    /// Maps `from` to `to` over `text`; see [`Transliterator::apply`].
    pub fn transliterate<'a>(&mut self, text: &'a mut [u8], from: u8, to: u8) -> &'a mut [u8] {
        self.translit.apply(text, from, to)
    }

    #[inline]
    pub fn interrupts(&self) -> &Interrupts {
        &self.interrupts
    }

    #[inline]
    pub fn interrupts_mut(&mut self) -> &mut Interrupts {
        &mut self.interrupts
    }

    #[inline]
    pub fn flags(&self) -> DocumentFlags {
        self.store.flags()
    }

    #[inline]
    pub fn flags_mut(&mut self) -> &mut DocumentFlags {
        self.store.flags_mut()
    }

    /// I/O counters of the current scratch store.
    #[inline]
    pub fn stats(&self) -> ScratchStats {
        self.store.stats()
    }

    /// Message of the most recent failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    fn note<T>(&mut self, result: BufferResult<T>) -> BufferResult<T> {
        if let Err(err) = &result {
            self.last_error = Some(err.to_string());
        }
        result
    }
}
