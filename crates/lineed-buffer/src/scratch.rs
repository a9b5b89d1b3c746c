//! Disk-backed line storage.
//!
//! ## Learning: Append-only Pools
//!
//! The scratch file is never rewritten in place. Each committed line is
//! appended at the end and addressed afterwards by `(offset, len)`.
//! Deleting a line only forgets its record; the bytes stay on disk until
//! the whole store is closed.
//!
//! ## Learning: Tracking the File Position
//!
//! Seeks are the expensive part of scratch I/O, so the store remembers where
//! the file position should be. A read that continues where the previous one
//! stopped skips the seek entirely. After any read the next write has to go
//! back to the end of the file first, and after a failed write nobody knows
//! where the position is, so it is marked unknown (`None`) and the next write
//! seeks unconditionally.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::TempPath;

use crate::{
    BufferError, BufferResult, CLOSE_FAILED, OPEN_FAILED, READ_FAILED, SEEK_FAILED, WRITE_FAILED,
};

/// Directory used when neither the configuration nor `TMPDIR` names one.
pub const DEFAULT_SCRATCH_DIR: &str = "/tmp";

/// File name prefix of every scratch file.
pub const SCRATCH_PREFIX: &str = "ed.";

const SUFFIX_LEN: usize = 10;

/// Location of one stored line inside the scratch file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LineRecord {
    /// Byte offset of the first character
    pub offset: u64,
    /// Length in bytes, newline excluded
    pub len: usize,
}

/// Counters of the I/O calls made against the backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScratchStats {
    pub seeks: u64,
    pub reads: u64,
    pub writes: u64,
}

/// Per-document flags, cleared whenever a store is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentFlags {
    /// The loaded text contained NUL bytes
    pub is_binary: bool,
    /// A newline was supplied for a final line that had none
    pub newline_added: bool,
}

/// A handle the scratch store can read, write and reposition.
pub trait Backing: Read + Write + Seek {
    /// Flushes everything written so far. Called before the handle is
    /// released; an error here keeps the backing file on disk.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the data cannot be flushed.
    fn finish(&mut self) -> io::Result<()>;
}

impl Backing for File {
    fn finish(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_data()
    }
}

/// Resolves the directory scratch files are created in.
///
/// The configured directory wins, then `TMPDIR`, then [`DEFAULT_SCRATCH_DIR`].
/// Trailing separators are trimmed; a value that trims down to nothing (or
/// to the root) is skipped.
pub fn resolve_scratch_dir(configured: Option<&Path>) -> PathBuf {
    let tmpdir = std::env::var_os("TMPDIR");
    resolve_scratch_dir_from(configured, tmpdir.as_deref())
}

fn resolve_scratch_dir_from(configured: Option<&Path>, tmpdir: Option<&OsStr>) -> PathBuf {
    configured
        .and_then(trim_trailing_separators)
        .or_else(|| tmpdir.map(Path::new).and_then(trim_trailing_separators))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRATCH_DIR))
}

fn trim_trailing_separators(dir: &Path) -> Option<PathBuf> {
    let trimmed: PathBuf = dir.components().collect();
    if trimmed.as_os_str().is_empty() || trimmed.parent().is_none() {
        None
    } else {
        Some(trimmed)
    }
}

/// Append-mostly byte pool holding line text outside of memory.
///
/// `F` is the backing handle; production code uses a [`File`] created by
/// [`ScratchStore::create`], tests substitute in-memory handles through
/// [`ScratchStore::with_backing`].
#[derive(Debug)]
pub struct ScratchStore<F: Backing = File> {
    /// Open handle, `None` once closed
    file: Option<F>,

    /// Removes the scratch file when closed or dropped
    path: Option<TempPath>,

    /// Presumed file position, `None` when unknown
    offset: Option<u64>,

    /// A read moved the position away from the end of the file
    seek_before_write: bool,

    /// Reused for every line read
    line_buf: Vec<u8>,

    max_line_len: usize,
    stats: ScratchStats,
    flags: DocumentFlags,
}

impl ScratchStore<File> {
    /// Creates and opens a uniquely named scratch file `<dir>/ed.XXXXXXXXXX`.
    ///
    /// # Errors
    ///
    /// Returns `cannot open temp file` if the file cannot be created.
    pub fn create(dir: &Path, max_line_len: usize) -> BufferResult<Self> {
        let named = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .rand_bytes(SUFFIX_LEN)
            .tempfile_in(dir)
            .map_err(|source| {
                tracing::warn!(dir = %dir.display(), error = %source, "{OPEN_FAILED}");
                BufferError::io(OPEN_FAILED, source)
            })?;

        let (file, path) = named.into_parts();
        tracing::debug!(path = %path.display(), "opened scratch file");

        let mut store = Self::with_backing(file, max_line_len);
        store.path = Some(path);
        Ok(store)
    }
}

impl<F: Backing> ScratchStore<F> {
    /// Wraps an already open, empty handle.
    pub fn with_backing(file: F, max_line_len: usize) -> Self {
        Self {
            file: Some(file),
            path: None,
            offset: Some(0),
            seek_before_write: false,
            line_buf: Vec::new(),
            max_line_len,
            stats: ScratchStats::default(),
            flags: DocumentFlags::default(),
        }
    }

    /// Returns true until the store has been closed.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Path of the backing file, if it lives on disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Longest accepted line is `max_line_len - 1` bytes.
    #[inline]
    pub fn max_line_len(&self) -> usize {
        self.max_line_len
    }

    #[inline]
    pub fn stats(&self) -> ScratchStats {
        self.stats
    }

    #[inline]
    pub fn flags(&self) -> DocumentFlags {
        self.flags
    }

    #[inline]
    pub fn flags_mut(&mut self) -> &mut DocumentFlags {
        &mut self.flags
    }

    /// Flushes and closes the backing file, then deletes it.
    ///
    /// Closing an already closed store is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `cannot close temp file` if the flush fails. The handle and
    /// the file on disk are kept in that case so a later close can retry.
    pub fn close(&mut self) -> BufferResult<()> {
        if let Some(file) = self.file.as_mut() {
            if let Err(source) = file.finish() {
                tracing::warn!(error = %source, "{CLOSE_FAILED}");
                return Err(BufferError::io(CLOSE_FAILED, source));
            }
            self.file = None;
            self.remove_file();
        }
        self.offset = Some(0);
        self.seek_before_write = false;
        Ok(())
    }

    /// Drops the handle and deletes the file without flushing.
    ///
    /// Used on the way out of the process, where nothing can be reported.
    pub fn discard(&mut self) {
        self.file = None;
        self.remove_file();
        self.offset = Some(0);
        self.seek_before_write = false;
    }

    fn remove_file(&mut self) {
        if let Some(path) = self.path.take() {
            let shown = path.display().to_string();
            match path.close() {
                Ok(()) => tracing::debug!(path = %shown, "removed scratch file"),
                Err(err) => tracing::warn!(path = %shown, error = %err, "cannot remove temp file"),
            }
        }
    }

    /// Reads the text of one stored line into the reusable line buffer.
    ///
    /// No seek is issued when the file is already positioned at
    /// `record.offset`, so reading consecutively stored lines in order costs
    /// one positioning for the first line only.
    ///
    /// # Errors
    ///
    /// Returns `cannot seek temp file` or `cannot read temp file`; the
    /// file position is marked unknown afterwards.
    pub fn read_line(&mut self, record: LineRecord) -> BufferResult<&[u8]> {
        let Some(file) = self.file.as_mut() else {
            return Err(BufferError::io(READ_FAILED, closed()));
        };

        self.seek_before_write = true;

        if self.offset != Some(record.offset) {
            self.stats.seeks += 1;
            tracing::trace!(offset = record.offset, "seek for read");
            if let Err(source) = file.seek(SeekFrom::Start(record.offset)) {
                self.offset = None;
                tracing::warn!(offset = record.offset, error = %source, "{SEEK_FAILED}");
                return Err(BufferError::io(SEEK_FAILED, source));
            }
            self.offset = Some(record.offset);
        }

        self.line_buf.clear();
        self.line_buf.try_reserve(record.len)?;
        self.line_buf.resize(record.len, 0);

        self.stats.reads += 1;
        if let Err(source) = file.read_exact(&mut self.line_buf) {
            self.offset = None;
            tracing::warn!(offset = record.offset, len = record.len, error = %source, "{READ_FAILED}");
            return Err(BufferError::io(READ_FAILED, source));
        }

        self.offset = Some(record.offset + record.len as u64);
        Ok(&self.line_buf)
    }

    /// Appends the first line of `text` to the scratch file.
    ///
    /// The line runs up to the first newline, or to the end of `text` if it
    /// has none. Returns the record of the stored line together with the
    /// input that follows the consumed newline, so a caller can feed several
    /// lines from one buffer in sequence.
    ///
    /// # Errors
    ///
    /// - `line too long` before any I/O if the line reaches the maximum length
    /// - `cannot seek temp file` if the end of the file cannot be found
    /// - `cannot write temp file` on a failed or short write; the position is
    ///   then unknown and the next append seeks to the end before writing
    pub fn append_line<'a>(&mut self, text: &'a [u8]) -> BufferResult<(LineRecord, &'a [u8])> {
        let (line, rest) = match memchr::memchr(b'\n', text) {
            Some(end) => (&text[..end], &text[end + 1..]),
            None => (text, &text[text.len()..]),
        };

        if line.len() >= self.max_line_len {
            return Err(BufferError::LineTooLong {
                len: line.len(),
                max: self.max_line_len,
            });
        }

        let Some(file) = self.file.as_mut() else {
            return Err(BufferError::io(WRITE_FAILED, closed()));
        };

        let offset = match self.offset {
            Some(offset) if !self.seek_before_write => offset,
            _ => {
                self.stats.seeks += 1;
                tracing::trace!("seek to end for write");
                let end = file.seek(SeekFrom::End(0)).map_err(|source| {
                    tracing::warn!(error = %source, "{SEEK_FAILED}");
                    BufferError::io(SEEK_FAILED, source)
                })?;
                self.offset = Some(end);
                self.seek_before_write = false;
                end
            }
        };

        self.stats.writes += 1;
        if let Err(source) = file.write_all(line) {
            self.offset = None;
            tracing::warn!(offset, error = %source, "{WRITE_FAILED}; file position now unknown");
            return Err(BufferError::io(WRITE_FAILED, source));
        }

        self.offset = Some(offset + line.len() as u64);
        Ok((
            LineRecord {
                offset,
                len: line.len(),
            },
            rest,
        ))
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "scratch store is closed")
}
