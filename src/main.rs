//! # Lineed - A Scratch-File Line Editor
//!
//! Loads a file into the scratch-backed buffer and prints a range of it.
//!
//! ## Quick Start
//!
//! ```bash
//! # Count the lines of a file
//! cargo run -- path/to/file.txt
//!
//! # Print lines 10 through 20
//! cargo run -- path/to/file.txt --print 10,20
//!
//! # Keep scratch files somewhere else
//! cargo run -- --scratch-dir /var/tmp path/to/file.txt
//! ```

use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lineed_core::{Config, Editor};

/// Lineed - a line editor whose text lives in a scratch file
#[derive(Parser, Debug)]
#[command(name = "lineed")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to load
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Directory for scratch files (default: $TMPDIR, then /tmp)
    #[arg(long, value_name = "DIR")]
    scratch_dir: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Lines to print, as `N` or `FIRST,LAST`
    #[arg(short, long, value_name = "RANGE", value_parser = parse_range)]
    print: Option<(usize, usize)>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Parses `N` or `FIRST,LAST` into an inclusive line range.
fn parse_range(s: &str) -> Result<(usize, usize), String> {
    let number = |part: &str| {
        part.trim()
            .parse::<usize>()
            .map_err(|_| format!("not a line number: {part:?}"))
    };
    match s.split_once(',') {
        Some((first, last)) => Ok((number(first)?, number(last)?)),
        None => {
            let n = number(s)?;
            Ok((n, n))
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting lineed v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    if args.scratch_dir.is_some() {
        config.buffer.scratch_dir = args.scratch_dir.clone();
    }

    // No document can exist without its scratch file.
    let mut editor = Editor::new_or_exit(&config);

    if let Err(err) = editor.buffer_mut().interrupts_mut().register_sigint() {
        tracing::warn!(error = %err, "interrupts will not be deferred");
    }

    let stdout = std::io::stdout();
    let code = run(&mut editor, &args, &mut stdout.lock()).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "cannot write to stdout");
        1
    });
    editor.quit(code)
}

/// Loads and prints as requested; returns the process exit status.
///
/// Editor failures are reported to `out` and give status 1. Only failing to
/// write to `out` is returned as an error.
fn run(editor: &mut Editor, args: &Args, out: &mut impl Write) -> io::Result<i32> {
    if let Some(path) = &args.file {
        let text = match std::fs::read(path) {
            Ok(text) => text,
            Err(err) => {
                writeln!(out, "?\n{}: {err}", path.display())?;
                return Ok(1);
            }
        };
        match editor.load_text(&text) {
            Ok(_) => writeln!(out, "{}", text.len())?,
            Err(err) => {
                editor.report(&err, out)?;
                return Ok(1);
            }
        }
    }

    if let Some((first, last)) = args.print {
        if let Err(err) = editor.print_range(first, last, out) {
            editor.report(&err, out)?;
            return Ok(1);
        }
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["lineed"]);
        assert!(args.file.is_none());
        assert!(args.print.is_none());
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_args_with_file_and_range() {
        let args = Args::parse_from(["lineed", "notes.txt", "--print", "2,5", "-vv"]);
        assert_eq!(args.file, Some(PathBuf::from("notes.txt")));
        assert_eq!(args.print, Some((2, 5)));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("7"), Ok((7, 7)));
        assert_eq!(parse_range("1, 3"), Ok((1, 3)));
        assert!(parse_range("x").is_err());
        assert!(parse_range("1,").is_err());
    }

    #[test]
    fn test_run_prints_range() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        std::fs::write(&file, "a\nb\nc\n").unwrap();

        let mut config = Config::default();
        config.buffer.scratch_dir = Some(dir.path().to_path_buf());
        let mut editor = Editor::new(&config).unwrap();

        let mut out = Vec::new();
        let args = Args::parse_from(["lineed", file.to_str().unwrap(), "-p", "2"]);
        assert_eq!(run(&mut editor, &args, &mut out).unwrap(), 0);
        assert_eq!(editor.buffer().current_line(), 2);
        assert_eq!(out, b"6\nb\n");

        out.clear();
        let args = Args::parse_from(["lineed", "-p", "9"]);
        assert_eq!(run(&mut editor, &args, &mut out).unwrap(), 1);
        assert_eq!(out, b"?\ninvalid address\n");
    }

    #[test]
    fn test_run_reports_write_failure() {
        struct Closed;

        impl Write for Closed {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::ErrorKind::BrokenPipe.into())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        std::fs::write(&file, "a\n").unwrap();

        let mut config = Config::default();
        config.buffer.scratch_dir = Some(dir.path().to_path_buf());
        let mut editor = Editor::new(&config).unwrap();

        let args = Args::parse_from(["lineed", file.to_str().unwrap()]);
        let err = run(&mut editor, &args, &mut Closed).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
