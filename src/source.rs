//! Scanline assembly from per-channel readers
//!
//! A separation arrives as one file per ink. The (out-of-scope) TIFF
//! decoder hands us one [`RowReader`] per channel; this module combines
//! them, one row at a time, into the interleaved canonical sample layout
//! the compositor consumes.
//!
//! A channel slot may be empty — a missing required channel contributes
//! all-zero rows so the rest of the separation still loads. Two optional
//! readers ride along: a white-ink channel blended into every color
//! sample (see [`crate::ink::blend`]) and a varnish channel carried as a
//! separate overlay, never merged into the color data.

use crate::error::SourceError;
use crate::ink::{blend, BlendMode};

/// One row-at-a-time reader over a single channel's raster
///
/// Implemented externally over TIFF scanline decoding; in-process
/// buffers use [`MemoryRowReader`]. Rows are raw 8-bit samples, one byte
/// per pixel.
pub trait RowReader: Send {
  /// Channel or file label used in error messages
  fn label(&self) -> &str;

  fn width(&self) -> usize;

  fn height(&self) -> usize;

  /// Pixel aspect ratio carried by the source file
  fn pixel_aspect(&self) -> f32 {
    1.0
  }

  /// Reads one row into `out`, which is exactly `width()` bytes
  fn read_row(&mut self, row: usize, out: &mut [u8]) -> Result<(), SourceError>;
}

/// A [`RowReader`] over an owned in-memory buffer
#[derive(Debug, Clone)]
pub struct MemoryRowReader {
  label: String,
  width: usize,
  height: usize,
  pixel_aspect: f32,
  data: Vec<u8>,
}

impl MemoryRowReader {
  /// Wraps an owned buffer, which must hold exactly `width * height`
  /// bytes
  pub fn new(
    label: impl Into<String>,
    width: usize,
    height: usize,
    data: Vec<u8>,
  ) -> Result<Self, SourceError> {
    let label = label.into();
    if data.len() != width * height {
      return Err(SourceError::BufferSize {
        channel: label,
        expected: width * height,
        actual: data.len(),
      });
    }
    Ok(Self {
      label,
      width,
      height,
      pixel_aspect: 1.0,
      data,
    })
  }

  pub fn with_pixel_aspect(mut self, pixel_aspect: f32) -> Self {
    self.pixel_aspect = pixel_aspect;
    self
  }
}

impl RowReader for MemoryRowReader {
  fn label(&self) -> &str {
    &self.label
  }

  fn width(&self) -> usize {
    self.width
  }

  fn height(&self) -> usize {
    self.height
  }

  fn pixel_aspect(&self) -> f32 {
    self.pixel_aspect
  }

  fn read_row(&mut self, row: usize, out: &mut [u8]) -> Result<(), SourceError> {
    if row >= self.height {
      return Err(SourceError::RowOutOfRange {
        row,
        height: self.height,
      });
    }
    out.copy_from_slice(&self.data[row * self.width..(row + 1) * self.width]);
    Ok(())
  }
}

/// Combines N channel readers into rows of interleaved canonical samples
///
/// Channel order is fixed at construction and determines the interleave
/// order of the output. The source must be [`ScanlineSource::open`]ed
/// before the first row read.
pub struct ScanlineSource {
  channels: Vec<Option<Box<dyn RowReader>>>,
  white: Option<Box<dyn RowReader>>,
  varnish: Option<Box<dyn RowReader>>,
  white_mode: BlendMode,
  width: usize,
  height: usize,
  pixel_aspect: f32,
  opened: bool,
  // Scratch rows, allocated at open.
  channel_buf: Vec<u8>,
  white_buf: Vec<u8>,
}

impl ScanlineSource {
  /// Builds a source over the given channel slots
  ///
  /// `channels` holds one slot per required ink, in output interleave
  /// order; `None` slots contribute all-zero rows. `white` and `varnish`
  /// are the two optional overlay channels.
  pub fn new(
    channels: Vec<Option<Box<dyn RowReader>>>,
    white: Option<Box<dyn RowReader>>,
    varnish: Option<Box<dyn RowReader>>,
    white_mode: BlendMode,
  ) -> Self {
    Self {
      channels,
      white,
      varnish,
      white_mode,
      width: 0,
      height: 0,
      pixel_aspect: 1.0,
      opened: false,
      channel_buf: Vec::new(),
      white_buf: Vec::new(),
    }
  }

  /// Validates the reader set and fixes the aggregate geometry
  ///
  /// Width, height, and pixel aspect ratio come from the first present
  /// required channel. Channels disagreeing on resolution or aspect are
  /// reported with `log::warn!` and read clipped/padded to the aggregate
  /// geometry; the image still loads.
  pub fn open(&mut self) -> Result<(), SourceError> {
    let first = self.channels.iter().flatten().next();
    let Some(first) = first else {
      // No required channel present at all: a degenerate but legal
      // source producing nothing but zero rows of width zero.
      self.opened = true;
      return Ok(());
    };
    self.width = first.width();
    self.height = first.height();
    self.pixel_aspect = first.pixel_aspect();

    let mut scratch = self.width;
    for reader in self
      .channels
      .iter()
      .flatten()
      .chain(&self.white)
      .chain(&self.varnish)
    {
      if reader.width() != self.width || reader.height() != self.height {
        log::warn!(
          "channel {:?} is {}x{}, expected {}x{}; using first channel's geometry",
          reader.label(),
          reader.width(),
          reader.height(),
          self.width,
          self.height,
        );
      }
      if (reader.pixel_aspect() - self.pixel_aspect).abs() > f32::EPSILON {
        log::warn!(
          "channel {:?} has pixel aspect {}, expected {}; using first channel's ratio",
          reader.label(),
          reader.pixel_aspect(),
          self.pixel_aspect,
        );
      }
      scratch = scratch.max(reader.width());
    }

    self.channel_buf = vec![0; scratch];
    self.white_buf = vec![0; scratch];
    self.opened = true;
    Ok(())
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  /// Number of interleaved output channels per pixel
  pub fn channel_count(&self) -> usize {
    self.channels.len()
  }

  /// Aggregate pixel aspect ratio (first required channel's)
  pub fn pixel_aspect(&self) -> f32 {
    self.pixel_aspect
  }

  fn ensure_opened(&self, row: usize) -> Result<(), SourceError> {
    if !self.opened {
      return Err(SourceError::NotOpened { row });
    }
    if row >= self.height {
      return Err(SourceError::RowOutOfRange {
        row,
        height: self.height,
      });
    }
    Ok(())
  }

  // Reads one row from `reader` into the first `width` bytes of `buf`,
  // zero-padding where the reader is shorter or narrower than the
  // aggregate geometry.
  fn read_clipped(
    reader: &mut Box<dyn RowReader>,
    row: usize,
    width: usize,
    buf: &mut [u8],
  ) -> Result<(), SourceError> {
    buf[..width].fill(0);
    if row >= reader.height() {
      return Ok(());
    }
    let rw = reader.width();
    reader.read_row(row, &mut buf[..rw])?;
    if rw > width {
      buf[width..rw].fill(0);
    }
    Ok(())
  }

  /// Produces one row of interleaved canonical samples
  ///
  /// The output holds `width() * channel_count()` bytes: for each pixel,
  /// one sample per channel in construction order, each blended against
  /// the white-ink row under the configured mode.
  pub fn read_combined_row(&mut self, row: usize) -> Result<Vec<u8>, SourceError> {
    self.ensure_opened(row)?;
    let width = self.width;
    let count = self.channels.len();
    let mut out = vec![0u8; width * count];

    match &mut self.white {
      Some(reader) => Self::read_clipped(reader, row, width, &mut self.white_buf)?,
      None => self.white_buf[..width].fill(0),
    }

    for (ci, slot) in self.channels.iter_mut().enumerate() {
      match slot {
        Some(reader) => Self::read_clipped(reader, row, width, &mut self.channel_buf)?,
        None => self.channel_buf[..width].fill(0),
      }
      for x in 0..width {
        out[x * count + ci] = blend(self.white_buf[x], self.channel_buf[x], self.white_mode);
      }
    }
    Ok(out)
  }

  /// Reads one varnish overlay row, if a varnish channel is present
  ///
  /// Varnish is never blended into the color channels; callers render it
  /// as a separate translucent pass.
  pub fn read_varnish_row(&mut self, row: usize) -> Result<Option<Vec<u8>>, SourceError> {
    self.ensure_opened(row)?;
    let Some(reader) = &mut self.varnish else {
      return Ok(None);
    };
    Self::read_clipped(reader, row, self.width, &mut self.channel_buf)?;
    Ok(Some(self.channel_buf[..self.width].to_vec()))
  }
}
