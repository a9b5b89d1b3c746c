//! # Lineed Core
//!
//! Editor-side logic on top of the buffer engine.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                   Editor                      │
//! │  ┌──────────┐   ┌──────────────────────────┐  │
//! │  │  Config  │   │          Buffer          │  │
//! │  └──────────┘   │  ┌───────────┐ ┌───────┐ │  │
//! │                 │  │ LineIndex │ │Scratch│ │  │
//! │                 │  └───────────┘ └───────┘ │  │
//! │                 └──────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Learning: Layering
//!
//! `lineed-buffer` knows nothing about commands or files. Everything here
//! is built only from the engine's public operations, the way any other
//! collaborator (an undo log, a file reader) would have to use it.

pub mod config;
pub mod editor;

pub use config::{Config, ConfigError, EditorConfig};
pub use editor::Editor;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    Buffer(#[from] lineed_buffer::BufferError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
