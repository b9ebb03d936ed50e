//! sepview: print-separation compositing and caching engine
//!
//! Renders large multi-channel separation images (process CMYK plus
//! arbitrary custom ink sets) as interactive raster layers, composited
//! into RGB for on-screen display at multiple zoom levels.
//!
//! # Pipeline
//!
//! 1. **Channels**: ink name → CMYK-contribution multipliers
//! 2. **Scanlines**: per-channel row readers → interleaved canonical samples
//! 3. **Layers**: positioned, read-only canonical rasters
//! 4. **Composite**: visible layers → canonical ink buffer → RGB surface
//! 5. **Mipmaps**: zoom level → lazily derived, background-filled surfaces
//!
//! File parsing, TIFF decoding, and widget wiring live outside this
//! crate; it consumes opened row readers and produces `tiny_skia`
//! pixmaps ready for display.

pub mod channels;
pub mod compositor;
pub mod error;
pub mod geometry;
pub mod ink;
pub mod layer;
pub mod mipmap;
pub mod pool;
pub mod source;
mod surface;
pub mod tile;
pub mod view;

pub use error::{Error, Result};
pub use geometry::Rect;
pub use ink::{BlendMode, ChannelMultipliers, InkAccum};
pub use layer::{Layer, LayerStack, VisibilityMask};
pub use mipmap::{CacheLookup, MipmapCache};
pub use pool::{RedrawRequest, RenderQueue};
pub use view::SeparationView;
