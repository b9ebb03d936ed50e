//! Output surface allocation
//!
//! Wraps `tiny_skia::Pixmap` creation with dimension and size guards so
//! a hostile or corrupt separation cannot abort the process on OOM. All
//! surfaces in the engine go through [`new_surface_with_context`].

use crate::error::RenderError;
use tiny_skia::{IntSize, Pixmap};

const BYTES_PER_PIXEL: u64 = 4;

/// Upper bound on a single surface allocation
pub(crate) const MAX_SURFACE_BYTES: u64 = 256 * 1024 * 1024;

fn guard_dimensions(width: u32, height: u32, context: &str) -> Result<u64, RenderError> {
  if width == 0 || height == 0 {
    return Err(RenderError::InvalidParameters {
      message: format!("{context}: surface size is zero ({width}x{height})"),
    });
  }
  let bytes = (width as u64)
    .checked_mul(height as u64)
    .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
    .ok_or_else(|| RenderError::InvalidParameters {
      message: format!("{context}: surface byte size overflows ({width}x{height})"),
    })?;
  if bytes > MAX_SURFACE_BYTES {
    return Err(RenderError::InvalidParameters {
      message: format!(
        "{context}: surface {width}x{height} would allocate {bytes} bytes (limit {MAX_SURFACE_BYTES})"
      ),
    });
  }
  Ok(bytes)
}

/// Allocates a zeroed surface, failing loudly instead of aborting
pub(crate) fn new_surface_with_context(
  width: u32,
  height: u32,
  context: &str,
) -> Result<Pixmap, RenderError> {
  let bytes = guard_dimensions(width, height, context)?;
  let mut buffer = Vec::new();
  buffer
    .try_reserve_exact(bytes as usize)
    .map_err(|err| RenderError::InvalidParameters {
      message: format!("{context}: surface allocation failed for {bytes} bytes: {err}"),
    })?;
  buffer.resize(bytes as usize, 0);
  let size = IntSize::from_wh(width, height).ok_or_else(|| RenderError::InvalidParameters {
    message: format!("{context}: surface dimensions out of range ({width}x{height})"),
  })?;
  Pixmap::from_vec(buffer, size).ok_or_else(|| RenderError::InvalidParameters {
    message: format!("{context}: surface creation failed for {width}x{height}"),
  })
}
