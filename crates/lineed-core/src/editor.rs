//! Main editor orchestration.
//!
//! ## Learning: The Facade Pattern
//!
//! `Editor` gives line-range operations (print, delete, transliterate) on
//! top of the single-line primitives of [`Buffer`]. It never touches the
//! scratch file or the index directly; new lines always go through
//! [`Buffer::put_lines`] and removals through [`Buffer::delete_lines`].

use std::io::Write;

use lineed_buffer::{Buffer, BufferError};

use crate::config::{Config, EditorConfig};
use crate::{CoreError, CoreResult};

/// The editor state for one document.
pub struct Editor {
    buffer: Buffer,
    config: EditorConfig,

    /// Message of the most recent failed operation
    last_error: Option<String>,
}

impl Editor {
    /// Creates an editor with an empty document.
    ///
    /// # Errors
    ///
    /// Returns the buffer's initialisation error. Callers should exit, since
    /// there is no document without a scratch file.
    pub fn new(config: &Config) -> CoreResult<Self> {
        let buffer = Buffer::initialize(&config.buffer)?;
        Ok(Self {
            buffer,
            config: config.editor.clone(),
            last_error: None,
        })
    }

    /// Like [`Editor::new`], but a buffer that cannot be initialised ends the
    /// process with status 2; see [`Buffer::initialize_or_exit`].
    pub fn new_or_exit(config: &Config) -> Self {
        Self {
            buffer: Buffer::initialize_or_exit(&config.buffer),
            config: config.editor.clone(),
            last_error: None,
        }
    }

    /// Prompt to show before reading a command, empty for none.
    pub fn prompt(&self) -> &str {
        &self.config.prompt
    }

    #[inline]
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    #[inline]
    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    /// Replaces the document with the lines of `text`.
    ///
    /// Returns the number of lines read. The last line becomes current.
    pub fn load_text(&mut self, text: &[u8]) -> CoreResult<usize> {
        let result = self.load_text_inner(text);
        self.note(result)
    }

    fn load_text_inner(&mut self, text: &[u8]) -> CoreResult<usize> {
        self.buffer.open()?;
        self.buffer.flags_mut().is_binary = memchr::memchr(0, text).is_some();
        let lines = self.buffer.put_lines(text)?;
        tracing::debug!(lines, bytes = text.len(), "document loaded");
        Ok(lines)
    }

    /// Inserts the lines of `text` after line `line` (0 inserts at the top).
    pub fn append_after(&mut self, line: usize, text: &[u8]) -> CoreResult<usize> {
        let result = self
            .buffer
            .set_current(line)
            .and_then(|()| self.buffer.put_lines(text))
            .map_err(CoreError::from);
        self.note(result)
    }

    /// Writes lines `first..=last` to `out`, each followed by a newline.
    /// The last printed line becomes current.
    pub fn print_range(
        &mut self,
        first: usize,
        last: usize,
        out: &mut impl Write,
    ) -> CoreResult<()> {
        let result = self.print_range_inner(first, last, out);
        self.note(result)
    }

    fn print_range_inner(
        &mut self,
        first: usize,
        last: usize,
        out: &mut impl Write,
    ) -> CoreResult<()> {
        self.check_range(first, last)?;
        for n in first..=last {
            self.buffer.interrupts().poll()?;
            let text = self.buffer.get_line(n)?.unwrap_or_default();
            out.write_all(text)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        self.buffer.set_current(last)?;
        Ok(())
    }

    /// Removes lines `first..=last`.
    pub fn delete_range(&mut self, first: usize, last: usize) -> CoreResult<usize> {
        let result = self.buffer.delete_lines(first, last).map_err(CoreError::from);
        self.note(result)
    }

    /// Maps byte `from` to `to` in lines `first..=last`.
    ///
    /// The scratch file is append-only, so each line containing `from` is
    /// rewritten as a new line stored after it, and the old one is unlinked.
    /// Lines without `from` are left in place. Mapping to `\n` splits a line.
    /// Interrupts are held while a line is replaced and polled between lines.
    /// The last line of the range becomes current.
    pub fn transliterate_range(
        &mut self,
        first: usize,
        last: usize,
        from: u8,
        to: u8,
    ) -> CoreResult<()> {
        let result = self.transliterate_range_inner(first, last, from, to);
        self.note(result)
    }

    fn transliterate_range_inner(
        &mut self,
        first: usize,
        last: usize,
        from: u8,
        to: u8,
    ) -> CoreResult<()> {
        self.check_range(first, last)?;

        let mut n = first;
        for i in 0..=(last - first) {
            if i > 0 {
                self.buffer.interrupts().poll()?;
            }
            let line = self.buffer.get_line(n)?.unwrap_or_default();
            if memchr::memchr(from, line).is_none() {
                n += 1;
                continue;
            }
            let mut text = line.to_vec();
            self.buffer.transliterate(&mut text, from, to);
            text.push(b'\n');

            let _hold = self.buffer.interrupts().hold();
            self.buffer.set_current(n)?;
            let added = self.buffer.put_lines(&text)?;
            self.buffer.delete_lines(n, n)?;
            n += added;
        }
        self.buffer.set_current(n - 1)?;
        Ok(())
    }

    fn check_range(&self, first: usize, last: usize) -> CoreResult<()> {
        if first == 0 || first > last || last > self.buffer.last_line() {
            return Err(BufferError::InvalidAddress.into());
        }
        Ok(())
    }

    /// Message of the most recent failure.
    pub fn error_message(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Writes `?`, followed by the message when errors are verbose.
    pub fn report(&self, err: &CoreError, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "?")?;
        if self.config.verbose_errors {
            writeln!(out, "{err}")?;
        }
        Ok(())
    }

    /// Removes the scratch file and exits with `code`.
    pub fn quit(self, code: i32) -> ! {
        tracing::info!(code, "quitting");
        self.buffer.terminate(code)
    }

    fn note<T>(&mut self, result: CoreResult<T>) -> CoreResult<T> {
        if let Err(err) = &result {
            tracing::debug!(error = %err, "operation failed");
            self.last_error = Some(err.to_string());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn editor_in(dir: &std::path::Path) -> Editor {
        let mut config = Config::default();
        config.buffer.scratch_dir = Some(dir.to_path_buf());
        Editor::new(&config).unwrap()
    }

    fn printed(editor: &mut Editor) -> String {
        let mut out = Vec::new();
        let last = editor.buffer().last_line();
        if last > 0 {
            editor.print_range(1, last, &mut out).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_load_and_print() {
        let dir = tempdir().unwrap();
        let mut editor = editor_in(dir.path());

        assert_eq!(editor.load_text(b"alpha\nbeta\ngamma\n").unwrap(), 3);
        assert_eq!(editor.buffer().current_line(), 3);
        assert!(!editor.buffer().flags().newline_added);

        let mut out = Vec::new();
        editor.print_range(2, 3, &mut out).unwrap();
        assert_eq!(out, b"beta\ngamma\n");
    }

    #[test]
    fn test_load_replaces_document() {
        let dir = tempdir().unwrap();
        let mut editor = editor_in(dir.path());
        editor.load_text(b"one\ntwo\n").unwrap();
        let first_file = editor.buffer().scratch_path().unwrap().to_path_buf();

        editor.load_text(b"bin\0ary").unwrap();
        assert!(!first_file.exists());
        assert_eq!(editor.buffer().last_line(), 1);
        assert!(editor.buffer().flags().is_binary);
        assert!(editor.buffer().flags().newline_added);
    }

    #[test]
    fn test_append_after() {
        let dir = tempdir().unwrap();
        let mut editor = editor_in(dir.path());
        editor.load_text(b"a\nd\n").unwrap();

        assert_eq!(editor.append_after(1, b"b\nc\n").unwrap(), 2);
        assert_eq!(editor.append_after(0, b"top\n").unwrap(), 1);
        assert_eq!(printed(&mut editor), "top\na\nb\nc\nd\n");
    }

    #[test]
    fn test_delete_range() {
        let dir = tempdir().unwrap();
        let mut editor = editor_in(dir.path());
        editor.load_text(b"1\n2\n3\n4\n5\n").unwrap();

        assert_eq!(editor.delete_range(2, 4).unwrap(), 3);
        assert_eq!(printed(&mut editor), "1\n5\n");
    }

    #[test]
    fn test_transliterate_range() {
        let dir = tempdir().unwrap();
        let mut editor = editor_in(dir.path());
        editor.load_text(b"a-b\nc-d\ne-f\n").unwrap();

        editor.transliterate_range(1, 2, b'-', b'+').unwrap();
        assert_eq!(editor.buffer().current_line(), 2);
        assert_eq!(printed(&mut editor), "a+b\nc+d\ne-f\n");
    }

    #[test]
    fn test_transliterate_to_newline_splits() {
        let dir = tempdir().unwrap();
        let mut editor = editor_in(dir.path());
        editor.load_text(b"x,y\nz\n").unwrap();

        editor.transliterate_range(1, 2, b',', b'\n').unwrap();
        assert_eq!(editor.buffer().last_line(), 3);
        assert_eq!(editor.buffer().current_line(), 3);
        assert_eq!(printed(&mut editor), "x\ny\nz\n");
    }

    #[test]
    fn test_transliterate_skips_lines_without_match() {
        let dir = tempdir().unwrap();
        let mut editor = editor_in(dir.path());
        editor.load_text(b"abc\ndef\na-b\n").unwrap();
        let untouched = editor.buffer_mut().node_at(1).unwrap();
        let writes = editor.buffer().stats().writes;

        editor.transliterate_range(1, 2, b'-', b'+').unwrap();
        assert_eq!(editor.buffer().stats().writes, writes);
        assert_eq!(editor.buffer_mut().node_at(1).unwrap(), untouched);
        assert_eq!(editor.buffer().current_line(), 2);

        editor.transliterate_range(1, 3, b'-', b'+').unwrap();
        assert_eq!(editor.buffer().stats().writes, writes + 1);
        assert_eq!(printed(&mut editor), "abc\ndef\na+b\n");
    }

    #[test]
    fn test_interrupt_never_splits_a_line_in_half() {
        let dir = tempdir().unwrap();
        let mut editor = editor_in(dir.path());
        editor.load_text(b"x,y\nz,w\n").unwrap();

        editor.buffer().interrupts().raise();
        let err = editor.transliterate_range(1, 2, b',', b'\n').unwrap_err();
        assert!(matches!(err, CoreError::Buffer(BufferError::Interrupted)));
        assert!(!editor.buffer().interrupts().is_held());
        assert_eq!(printed(&mut editor), "x\ny\nz,w\n");

        editor.buffer().interrupts().raise();
        editor.transliterate_range(3, 3, b',', b'\n').unwrap();
        assert!(editor.buffer().interrupts().is_pending());
        assert!(editor.buffer().interrupts().poll().is_err());
        assert_eq!(printed(&mut editor), "x\ny\nz\nw\n");
    }

    #[test]
    fn test_invalid_range_records_message() {
        let dir = tempdir().unwrap();
        let mut editor = editor_in(dir.path());
        editor.load_text(b"only\n").unwrap();

        let mut out = Vec::new();
        let err = editor.print_range(1, 2, &mut out).unwrap_err();
        assert_eq!(editor.error_message(), Some("invalid address"));

        let mut report = Vec::new();
        editor.report(&err, &mut report).unwrap();
        assert_eq!(report, b"?\ninvalid address\n");
        assert!(editor.delete_range(0, 1).is_err());
    }

    #[test]
    fn test_quiet_report() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.buffer.scratch_dir = Some(dir.path().to_path_buf());
        config.editor.verbose_errors = false;
        config.editor.prompt = String::from("*");
        let editor = Editor::new_or_exit(&config);
        assert_eq!(editor.prompt(), "*");

        let mut report = Vec::new();
        let err = CoreError::from(BufferError::InvalidAddress);
        editor.report(&err, &mut report).unwrap();
        assert_eq!(report, b"?\n");
    }
}
