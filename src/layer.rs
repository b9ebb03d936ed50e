//! Layers and visibility state
//!
//! A [`Layer`] is one positioned, read-only raster of canonical ink
//! samples, produced once from its channel files and owned by the stack
//! until the presentation goes away. The [`LayerStack`] keeps the
//! ordered layer list, the visibility bit vectors, the derived canvas
//! rectangle, and the canonical ink accumulation buffer the compositor
//! works in.
//!
//! Visibility edits are deferred: toggling a layer flips its bit in the
//! `toggled` vector, and the next composite pass applies all pending
//! toggles at once (`visible ^= toggled`). Toggling the same layer twice
//! between composites therefore cancels out, which is what coalescing
//! rapid UI clicks requires.

use crate::error::{Error, RenderError};
use crate::geometry::Rect;
use crate::ink::ChannelMultipliers;
use crate::source::ScanlineSource;

/// One positioned, immutable raster of interleaved canonical samples
///
/// Fixed at 8 bits per sample; `samples_per_pixel` interleaved samples
/// per pixel, row-major.
#[derive(Debug, Clone)]
pub struct Layer {
  x: i32,
  y: i32,
  width: u32,
  height: u32,
  samples_per_pixel: usize,
  data: Vec<u8>,
}

impl Layer {
  /// Wraps an owned sample buffer as a layer
  ///
  /// The buffer must hold exactly `width * height * samples_per_pixel`
  /// bytes.
  pub fn new(
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    samples_per_pixel: usize,
    data: Vec<u8>,
  ) -> Result<Self, RenderError> {
    if samples_per_pixel == 0 {
      return Err(RenderError::InvalidParameters {
        message: "layer has zero samples per pixel".to_string(),
      });
    }
    let expected = width as usize * height as usize * samples_per_pixel;
    if data.len() != expected {
      return Err(RenderError::InvalidParameters {
        message: format!(
          "layer buffer holds {} bytes, expected {} ({}x{}x{})",
          data.len(),
          expected,
          width,
          height,
          samples_per_pixel
        ),
      });
    }
    Ok(Self {
      x,
      y,
      width,
      height,
      samples_per_pixel,
      data,
    })
  }

  /// Reads every combined row out of an opened scanline source
  pub fn from_source(x: i32, y: i32, source: &mut ScanlineSource) -> Result<Self, Error> {
    let width = source.width();
    let height = source.height();
    let count = source.channel_count();
    let mut data = Vec::with_capacity(width * height * count);
    for row in 0..height {
      data.extend_from_slice(&source.read_combined_row(row)?);
    }
    Ok(Self::new(x, y, width as u32, height as u32, count, data)?)
  }

  /// Positioned bounding rectangle in canvas space
  pub fn bounds(&self) -> Rect {
    Rect::from_xywh(self.x, self.y, self.width, self.height)
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn samples_per_pixel(&self) -> usize {
    self.samples_per_pixel
  }

  /// One row of interleaved samples
  pub fn row(&self, row: usize) -> &[u8] {
    let stride = self.width as usize * self.samples_per_pixel;
    &self.data[row * stride..(row + 1) * stride]
  }

  /// Whole interleaved sample buffer
  pub fn samples(&self) -> &[u8] {
    &self.data
  }
}

/// Pending and applied visibility bits over the ordered layer list
///
/// Two equal-length bit vectors: `toggled` accumulates visibility edits
/// since the last composite, `visible` holds the currently composited
/// set. [`VisibilityMask::apply_toggles`] folds one into the other.
#[derive(Debug, Clone, Default)]
pub struct VisibilityMask {
  toggled: Vec<u64>,
  visible: Vec<u64>,
  len: usize,
}

const WORD_BITS: usize = u64::BITS as usize;

fn word_bit(index: usize) -> (usize, u64) {
  (index / WORD_BITS, 1u64 << (index % WORD_BITS))
}

impl VisibilityMask {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Appends one layer's bits; a new layer starts hidden and toggled,
  /// so the next composite flips it visible.
  pub fn push(&mut self) {
    let (word, bit) = word_bit(self.len);
    if word == self.toggled.len() {
      self.toggled.push(0);
      self.visible.push(0);
    }
    self.toggled[word] |= bit;
    self.len += 1;
  }

  /// Flips a layer's pending-toggle bit
  ///
  /// Toggling twice between composites cancels out; rapid repeated
  /// toggles coalesce into the correct final state.
  pub fn toggle(&mut self, index: usize) {
    assert!(index < self.len, "layer index {index} out of range");
    let (word, bit) = word_bit(index);
    self.toggled[word] ^= bit;
  }

  pub fn is_toggled(&self, index: usize) -> bool {
    let (word, bit) = word_bit(index);
    self.toggled[word] & bit != 0
  }

  pub fn is_visible(&self, index: usize) -> bool {
    let (word, bit) = word_bit(index);
    self.visible[word] & bit != 0
  }

  /// Folds pending toggles into the visible set and clears them
  pub fn apply_toggles(&mut self) {
    for (visible, toggled) in self.visible.iter_mut().zip(&mut self.toggled) {
      *visible ^= *toggled;
      *toggled = 0;
    }
  }

  pub fn any_toggled(&self) -> bool {
    self.toggled.iter().any(|&word| word != 0)
  }

  /// Whether every layer has a pending toggle
  pub fn all_toggled(&self) -> bool {
    self.len > 0 && (0..self.len).all(|i| self.is_toggled(i))
  }

  /// Number of layers with a pending toggle
  pub fn toggled_count(&self) -> usize {
    self.toggled.iter().map(|word| word.count_ones() as usize).sum()
  }
}

/// The ordered layer list plus everything derived from it
///
/// Owns the canonical ink accumulation buffer covering the canvas: one
/// byte per sample, one interleaved sample per canonical channel, in
/// canvas row-major order. The compositor mutates that buffer
/// incrementally inside dirty rectangles; the final ink → RGB pass maps
/// each canonical channel through its [`ChannelMultipliers`].
#[derive(Debug, Clone)]
pub struct LayerStack {
  layers: Vec<Layer>,
  mask: VisibilityMask,
  canvas: Rect,
  channels: Vec<ChannelMultipliers>,
  ink: Vec<u8>,
  // Set when the layer set (and thus the canvas) changed; the next
  // composite treats the whole canvas as dirty.
  full_redraw: bool,
}

impl LayerStack {
  /// A stack over the four process channels (identity CMYK)
  pub fn new() -> Self {
    Self::with_channels(vec![
      ChannelMultipliers::CYAN,
      ChannelMultipliers::MAGENTA,
      ChannelMultipliers::YELLOW,
      ChannelMultipliers::KEY,
    ])
  }

  /// A stack over an arbitrary canonical ink set
  ///
  /// The multiplier order defines the interleave order every layer in
  /// this stack must use.
  pub fn with_channels(channels: Vec<ChannelMultipliers>) -> Self {
    Self {
      layers: Vec::new(),
      mask: VisibilityMask::new(),
      canvas: Rect::ZERO,
      channels,
      ink: Vec::new(),
      full_redraw: false,
    }
  }

  /// Adds a layer and recomputes the canvas
  ///
  /// The layer's samples per pixel must match the stack's canonical
  /// channel count. The ink buffer is rebuilt for the new canvas and the
  /// next composite renders it in full.
  pub fn push_layer(&mut self, layer: Layer) -> Result<usize, RenderError> {
    if layer.samples_per_pixel() != self.channels.len() {
      return Err(RenderError::InvalidParameters {
        message: format!(
          "layer has {} samples per pixel, stack has {} canonical channels",
          layer.samples_per_pixel(),
          self.channels.len()
        ),
      });
    }
    let index = self.layers.len();
    self.layers.push(layer);
    self.mask.push();
    self.recompute_canvas();
    Ok(index)
  }

  fn recompute_canvas(&mut self) {
    let mut canvas = Rect::ZERO;
    for layer in &self.layers {
      canvas = canvas.union(layer.bounds());
    }
    self.canvas = canvas;
    let size = canvas.width as usize * canvas.height as usize * self.channels.len();
    self.ink = vec![0; size];
    self.full_redraw = true;
  }

  /// Union bounding rectangle of all layers
  pub fn canvas(&self) -> Rect {
    self.canvas
  }

  pub fn layers(&self) -> &[Layer] {
    &self.layers
  }

  /// Canonical channel multipliers, in interleave order
  pub fn channels(&self) -> &[ChannelMultipliers] {
    &self.channels
  }

  pub fn samples_per_pixel(&self) -> usize {
    self.channels.len()
  }

  pub fn mask(&self) -> &VisibilityMask {
    &self.mask
  }

  /// Flips one layer's pending visibility toggle
  pub fn toggle(&mut self, index: usize) {
    self.mask.toggle(index);
  }

  pub(crate) fn mask_mut(&mut self) -> &mut VisibilityMask {
    &mut self.mask
  }

  pub(crate) fn ink(&self) -> &[u8] {
    &self.ink
  }

  // Disjoint borrows for the accumulation pass.
  pub(crate) fn layers_and_ink_mut(&mut self) -> (&[Layer], &VisibilityMask, &mut [u8]) {
    (&self.layers, &self.mask, &mut self.ink)
  }

  pub(crate) fn take_full_redraw(&mut self) -> bool {
    std::mem::take(&mut self.full_redraw)
  }
}

impl Default for LayerStack {
  fn default() -> Self {
    Self::new()
  }
}
