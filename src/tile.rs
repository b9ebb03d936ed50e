//! Tile rendering and pyramid reduction
//!
//! The generic ink pipeline works on fixed-size tiles rather than the
//! layer list. Each tile arrives as interleaved multi-channel samples
//! plus a multiplier table; this module renders it to RGB at full
//! resolution, or 8x reduced by averaging each 8x8 sample block per
//! channel before the same ink conversion. Both operations are pure
//! functions of their inputs.
//!
//! Averaging is an integer division of the block sum by 64 — the floor
//! here is reference behavior, preserved like the multiplicative
//! white-ink truncation (see [`crate::ink`]).

use crate::error::RenderError;
use crate::ink::{self, ChannelMultipliers};
use crate::surface::new_surface_with_context;
use tiny_skia::Pixmap;

/// Edge length of one tile, in pixels
pub const TILE_SIZE: usize = 64;

/// Linear reduction factor between pyramid levels
pub const REDUCE_FACTOR: usize = 8;

fn check_tile(
  samples: &[u8],
  width: usize,
  height: usize,
  channel_count: usize,
) -> Result<(), RenderError> {
  if channel_count == 0 {
    return Err(RenderError::InvalidParameters {
      message: "tile has zero channels".to_string(),
    });
  }
  let expected = width * height * channel_count;
  if samples.len() != expected {
    return Err(RenderError::InvalidParameters {
      message: format!(
        "tile buffer holds {} bytes, expected {} ({}x{}x{})",
        samples.len(),
        expected,
        width,
        height,
        channel_count
      ),
    });
  }
  Ok(())
}

/// Renders one tile's samples to a full-resolution RGB surface
///
/// `samples` is row-major, `channels.len()` interleaved samples per
/// pixel; each pixel goes through the ink model unchanged.
pub fn render_tile(
  samples: &[u8],
  width: usize,
  height: usize,
  channels: &[ChannelMultipliers],
) -> Result<Pixmap, RenderError> {
  check_tile(samples, width, height, channels.len())?;
  let mut out = new_surface_with_context(width as u32, height as u32, "tile render")?;
  let count = channels.len();
  let data = out.data_mut();
  for pixel in 0..width * height {
    let accum = ink::accumulate_samples(channels, &samples[pixel * count..(pixel + 1) * count]);
    let (r, g, b) = ink::to_rgb(accum);
    data[pixel * 4] = r;
    data[pixel * 4 + 1] = g;
    data[pixel * 4 + 2] = b;
    data[pixel * 4 + 3] = 255;
  }
  Ok(out)
}

/// Averages each 8x8 block of samples per channel
///
/// Input dimensions must be multiples of [`REDUCE_FACTOR`]; the output
/// is `width/8 x height/8` with the same channel interleave. Each
/// output sample is the block sum integer-divided by 64.
pub fn reduce_samples(
  samples: &[u8],
  width: usize,
  height: usize,
  channel_count: usize,
) -> Result<Vec<u8>, RenderError> {
  check_tile(samples, width, height, channel_count)?;
  if width % REDUCE_FACTOR != 0 || height % REDUCE_FACTOR != 0 {
    return Err(RenderError::InvalidParameters {
      message: format!(
        "tile {width}x{height} is not a multiple of the reduction factor {REDUCE_FACTOR}"
      ),
    });
  }
  let out_width = width / REDUCE_FACTOR;
  let out_height = height / REDUCE_FACTOR;
  let mut out = vec![0u8; out_width * out_height * channel_count];
  for oy in 0..out_height {
    for ox in 0..out_width {
      for ch in 0..channel_count {
        let mut sum = 0u32;
        for dy in 0..REDUCE_FACTOR {
          for dx in 0..REDUCE_FACTOR {
            let sy = oy * REDUCE_FACTOR + dy;
            let sx = ox * REDUCE_FACTOR + dx;
            sum += samples[(sy * width + sx) * channel_count + ch] as u32;
          }
        }
        out[(oy * out_width + ox) * channel_count + ch] =
          (sum / (REDUCE_FACTOR * REDUCE_FACTOR) as u32) as u8;
      }
    }
  }
  Ok(out)
}

/// Renders one tile 8x reduced
///
/// Per-channel averaging happens on raw samples first; the averaged tile
/// then goes through the same ink conversion as [`render_tile`].
pub fn reduce_tile(
  samples: &[u8],
  width: usize,
  height: usize,
  channels: &[ChannelMultipliers],
) -> Result<Pixmap, RenderError> {
  let reduced = reduce_samples(samples, width, height, channels.len())?;
  render_tile(
    &reduced,
    width / REDUCE_FACTOR,
    height / REDUCE_FACTOR,
    channels,
  )
}
