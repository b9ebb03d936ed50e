//! Layer compositing
//!
//! Merges every visible layer of a [`LayerStack`] into the stack's
//! canonical ink buffer and converts the touched region to RGB on an
//! output surface. Work is confined to the dirty rectangle: the union of
//! the bounding boxes of all layers whose visibility toggled since the
//! last pass (or the whole canvas right after the layer set changed).
//!
//! Ink accumulation saturates per channel: overlapping layers add up to
//! a ceiling of 255, never wrapping. Two accumulation paths exist with
//! identical results. Layers aligned with the canvas rows run as a
//! single contiguous slice walk; positioned layers re-anchor at every
//! layer row boundary instead of assuming rows tile edge to edge.

use crate::error::RenderError;
use crate::geometry::Rect;
use crate::ink;
use crate::layer::{Layer, LayerStack};
use tiny_skia::Pixmap;

/// Union bounding rectangle of all layers with a pending toggle
///
/// With `anchor_at_origin` the rectangle is stretched to start at the
/// canvas origin, for passes that must consider everything above and
/// left of the toggled layers (e.g. a full visibility inversion).
pub fn dirty_rect(stack: &LayerStack, anchor_at_origin: bool) -> Rect {
  let mut dirty = Rect::ZERO;
  for (i, layer) in stack.layers().iter().enumerate() {
    if stack.mask().is_toggled(i) {
      dirty = dirty.union(layer.bounds());
    }
  }
  if anchor_at_origin && !dirty.is_empty() {
    let canvas = stack.canvas();
    let right = dirty.right().max(canvas.x as i64);
    let bottom = dirty.bottom().max(canvas.y as i64);
    dirty = Rect::from_xywh(
      canvas.x,
      canvas.y,
      (right - canvas.x as i64) as u32,
      (bottom - canvas.y as i64) as u32,
    );
  }
  dirty
}

// Saturating per-channel accumulation over two equal-length slices.
fn accumulate_span(ink: &mut [u8], samples: &[u8]) {
  for (current, &sample) in ink.iter_mut().zip(samples) {
    // A ceiling, not a wraparound: current += min(sample, 255 - current).
    *current = current.saturating_add(sample);
  }
}

// Fast path: the layer's rows coincide with canvas rows, so the whole
// intersection is one contiguous slice in both buffers.
fn accumulate_contiguous(layer: &Layer, isect: Rect, canvas: Rect, spp: usize, ink: &mut [u8]) {
  let row_bytes = canvas.width as usize * spp;
  let ink_start = (isect.y - canvas.y) as usize * row_bytes;
  let layer_start = (isect.y - layer.bounds().y) as usize * row_bytes;
  let len = isect.height as usize * row_bytes;
  accumulate_span(
    &mut ink[ink_start..ink_start + len],
    &layer.samples()[layer_start..layer_start + len],
  );
}

// Positioned path: one span per layer row, skipping to the next image
// row at each layer row boundary.
fn accumulate_rows(layer: &Layer, isect: Rect, canvas: Rect, spp: usize, ink: &mut [u8]) {
  let bounds = layer.bounds();
  let canvas_stride = canvas.width as usize * spp;
  let span = isect.width as usize * spp;
  let layer_col = (isect.x - bounds.x) as usize * spp;
  for dy in 0..isect.height as usize {
    let layer_row = layer.row((isect.y - bounds.y) as usize + dy);
    let ink_start =
      ((isect.y - canvas.y) as usize + dy) * canvas_stride + (isect.x - canvas.x) as usize * spp;
    accumulate_span(
      &mut ink[ink_start..ink_start + span],
      &layer_row[layer_col..layer_col + span],
    );
  }
}

/// Applies pending visibility toggles and recomposites the dirty region
///
/// The surface must cover the stack's canvas exactly. Returns the dirty
/// rectangle that was recomputed; an empty rectangle means nothing
/// changed and the surface bytes are untouched. Layers outside the dirty
/// rectangle are skipped, not errors.
pub fn composite(stack: &mut LayerStack, surface: &mut Pixmap) -> Result<Rect, RenderError> {
  composite_with_stale(stack, surface, Rect::ZERO)
}

/// Like [`composite`], but additionally rebuilds `stale`
///
/// `stale` is a region whose surface bytes are invalid regardless of the
/// pending toggles: an earlier cache invalidation zeroed it, and the
/// toggles that caused it may since have been cancelled or shrunk. The
/// region is unioned into the dirty rectangle so every zeroed pixel is
/// recomposited.
pub fn composite_with_stale(
  stack: &mut LayerStack,
  surface: &mut Pixmap,
  stale: Rect,
) -> Result<Rect, RenderError> {
  let canvas = stack.canvas();
  if canvas.is_empty() {
    stack.take_full_redraw();
    stack.mask_mut().apply_toggles();
    return Ok(Rect::ZERO);
  }
  if surface.width() != canvas.width || surface.height() != canvas.height {
    return Err(RenderError::InvalidParameters {
      message: format!(
        "surface is {}x{}, canvas needs {}x{}",
        surface.width(),
        surface.height(),
        canvas.width,
        canvas.height
      ),
    });
  }

  let dirty = if stack.take_full_redraw() {
    canvas
  } else {
    dirty_rect(stack, false).union(stale)
  };
  stack.mask_mut().apply_toggles();
  let Some(dirty) = dirty.intersect(canvas) else {
    return Ok(Rect::ZERO);
  };

  let spp = stack.samples_per_pixel();
  {
    let (layers, mask, ink) = stack.layers_and_ink_mut();

    // Everything in the dirty region is rebuilt from scratch.
    let canvas_stride = canvas.width as usize * spp;
    let span = dirty.width as usize * spp;
    for dy in 0..dirty.height as usize {
      let start =
        ((dirty.y - canvas.y) as usize + dy) * canvas_stride + (dirty.x - canvas.x) as usize * spp;
      ink[start..start + span].fill(0);
    }

    for (i, layer) in layers.iter().enumerate() {
      if !mask.is_visible(i) {
        continue;
      }
      let Some(isect) = layer.bounds().intersect(dirty) else {
        continue;
      };
      let bounds = layer.bounds();
      if bounds.x == canvas.x && bounds.width == canvas.width && isect.width == canvas.width {
        accumulate_contiguous(layer, isect, canvas, spp, ink);
      } else {
        accumulate_rows(layer, isect, canvas, spp, ink);
      }
    }
  }

  let channels = stack.channels().to_vec();
  let ink_buf = stack.ink();
  let data = surface.data_mut();
  let cw = canvas.width as usize;
  for dy in 0..dirty.height as usize {
    let row = (dirty.y - canvas.y) as usize + dy;
    for dx in 0..dirty.width as usize {
      let col = (dirty.x - canvas.x) as usize + dx;
      let pixel = row * cw + col;
      let accum = ink::accumulate_samples(&channels, &ink_buf[pixel * spp..pixel * spp + spp]);
      let (r, g, b) = ink::to_rgb(accum);
      data[pixel * 4] = r;
      data[pixel * 4 + 1] = g;
      data[pixel * 4 + 2] = b;
      data[pixel * 4 + 3] = 255;
    }
  }

  Ok(dirty)
}
