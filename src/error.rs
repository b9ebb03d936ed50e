//! Error types for sepview
//!
//! This module provides error types for all subsystems:
//! - Configuration errors (channel tables, multipliers)
//! - Source errors (channel readers, scanline assembly)
//! - Render errors (surface allocation, compositing parameters)
//!
//! All errors use the `thiserror` crate for minimal boilerplate and
//! proper error trait implementations.
//!
//! Failures are component-local by design: a broken channel entry or an
//! unreadable layer never aborts the compositor as a whole. Callers log
//! the error, skip the offending item, and keep going.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sepview operations
///
/// This is a convenience type that uses our Error type as the error variant.
///
/// # Examples
///
/// ```
/// use sepview::Result;
///
/// fn load_layer() -> Result<()> {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for sepview
///
/// This enum covers all possible errors that can occur while loading and
/// rendering a separation. Each variant wraps a more specific error type
/// for that subsystem.
#[derive(Error, Debug)]
pub enum Error {
  /// Channel-table or multiplier configuration error
  #[error("Config error: {0}")]
  Config(#[from] ConfigError),

  /// Channel reader or scanline assembly error
  #[error("Source error: {0}")]
  Source(#[from] SourceError),

  /// Surface allocation or compositing error
  #[error("Render error: {0}")]
  Render(#[from] RenderError),

  /// I/O error (file reading, etc.)
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

/// Errors raised while building the channel-multiplier table
///
/// Both variants are load-time validation failures. The loader reports
/// the offending entry and continues with the rest of the table; the
/// reserved "c"/"m"/"y"/"k" channels are always present regardless.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
  /// A channel name or alias collides with one already registered.
  /// Names and aliases share one case-insensitive namespace.
  #[error("duplicate channel name or alias {name:?}")]
  DuplicateChannel { name: String },

  /// A multiplier component is NaN or infinite
  #[error("channel {name:?} has a non-finite {component} multiplier")]
  InvalidMultiplier {
    name: String,
    component: &'static str,
  },
}

/// Errors raised by channel readers and the scanline source
#[derive(Error, Debug)]
pub enum SourceError {
  /// A required channel file could not be opened or decoded.
  /// Optional channels (white ink, varnish) never produce this; their
  /// absence simply contributes nothing.
  #[error("required channel {channel:?} is missing or unreadable: {path}")]
  MissingChannel { channel: String, path: PathBuf },

  /// A row was requested before the source was opened
  #[error("row {row} requested before the scanline source was opened")]
  NotOpened { row: usize },

  /// A row index past the end of the source
  #[error("row {row} out of range (height {height})")]
  RowOutOfRange { row: usize, height: usize },

  /// A reader's buffer does not match its declared geometry
  #[error("channel {channel:?} buffer holds {actual} bytes, expected {expected}")]
  BufferSize {
    channel: String,
    expected: usize,
    actual: usize,
  },

  /// A reader failed mid-scan
  #[error("channel {channel:?} failed reading row {row}: {message}")]
  ReadFailed {
    channel: String,
    row: usize,
    message: String,
  },
}

/// Errors raised while allocating or writing output surfaces
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
  /// Invalid surface dimensions, buffer sizes, or compositing parameters
  #[error("Invalid parameters: {message}")]
  InvalidParameters { message: String },
}
