//! Multi-resolution cache of the composited image
//!
//! Zoom level 0 is the full-resolution composite; each more negative
//! level halves the previous one with a 2x2 box filter. Levels above 0
//! (magnification) reuse level 0 — zooming in never needs a new raster.
//! Levels are created on demand, strictly in the order 0, -1, -2, …, so
//! a level never exists before the levels it derives from.
//!
//! All cache mutation happens inside one critical section per fill; the
//! caller-visible pending flag keeps at most one fill job in flight per
//! cache. Lock order is always layer stack first, then the level map —
//! [`MipmapCache::invalidate`] takes an already-locked stack for the
//! same reason.

use crate::compositor;
use crate::error::{Error, RenderError};
use crate::geometry::Rect;
use crate::layer::LayerStack;
use crate::surface::new_surface_with_context;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tiny_skia::Pixmap;

/// Result of a non-blocking cache query
#[derive(Debug, Clone)]
pub enum CacheLookup {
  /// The cached surface for the requested level
  Ready(Arc<Pixmap>),
  /// Nothing usable yet; schedule a fill and try again on the next
  /// redraw request
  NotReady,
}

impl CacheLookup {
  pub fn is_ready(&self) -> bool {
    matches!(self, CacheLookup::Ready(_))
  }
}

#[derive(Default)]
struct Levels {
  map: FxHashMap<i32, Arc<Pixmap>>,
  // Level 0 exists but was zeroed (fully or in its dirty region) by an
  // invalidation; it must be recomposited before use.
  level0_clear: bool,
  // Union of every region zeroed since the last refill. The toggles that
  // caused a zeroing may cancel out before the next fill runs, so the
  // refill cannot rely on the pending-toggle set alone to find the hole.
  stale: Rect,
}

impl Levels {
  fn level0_valid(&self) -> bool {
    self.map.contains_key(&0) && !self.level0_clear
  }
}

/// Lazily filled zoom-level → surface cache for one presentation
#[derive(Default)]
pub struct MipmapCache {
  levels: Mutex<Levels>,
  pending: AtomicBool,
}

impl MipmapCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Non-blocking query for the surface at a zoom level
  ///
  /// Returns [`CacheLookup::NotReady`] when level 0 is absent or stale,
  /// or when the requested reduction has not been derived yet. Never
  /// computes anything itself.
  pub fn lookup(&self, zoom: i32) -> CacheLookup {
    let level = zoom.min(0);
    let levels = self.levels.lock().unwrap();
    if !levels.level0_valid() {
      return CacheLookup::NotReady;
    }
    match levels.map.get(&level) {
      Some(surface) => CacheLookup::Ready(Arc::clone(surface)),
      None => CacheLookup::NotReady,
    }
  }

  /// Claims the single fill slot
  ///
  /// Returns true if the caller should schedule a fill job; false means
  /// one is already pending and a second would be a duplicate.
  pub fn try_begin_fill(&self) -> bool {
    !self.pending.swap(true, Ordering::AcqRel)
  }

  pub fn fill_pending(&self) -> bool {
    self.pending.load(Ordering::Acquire)
  }

  /// Background job body: composite level 0 and derive reductions
  ///
  /// Runs to completion once started; there is no mid-job abort. A fill
  /// that finds its target level already cached is a no-op. On failure
  /// previously valid levels are left untouched and the pending flag is
  /// released so the next lookup retries.
  pub fn fill(&self, zoom: i32, stack: &Mutex<LayerStack>) -> Result<(), Error> {
    // Stack before levels, always.
    let mut stack = stack.lock().unwrap();
    let mut levels = self.levels.lock().unwrap();
    let result = Self::fill_levels(&mut stack, &mut levels, zoom);
    self.pending.store(false, Ordering::Release);
    result
  }

  fn fill_levels(stack: &mut LayerStack, levels: &mut Levels, zoom: i32) -> Result<(), Error> {
    let canvas = stack.canvas();
    if canvas.is_empty() {
      return Ok(());
    }

    if !levels.level0_valid() {
      let mut surface = match levels.map.remove(&0) {
        Some(existing)
          if existing.width() == canvas.width && existing.height() == canvas.height =>
        {
          // Reuse the partially-zeroed surface; only its dirty region
          // gets recomposited.
          match Arc::try_unwrap(existing) {
            Ok(surface) => surface,
            Err(shared) => (*shared).clone(),
          }
        }
        _ => new_surface_with_context(canvas.width, canvas.height, "mipmap level 0")?,
      };
      compositor::composite_with_stale(stack, &mut surface, levels.stale)?;
      levels.map.insert(0, Arc::new(surface));
      levels.level0_clear = false;
      levels.stale = Rect::ZERO;
    }

    let target = zoom.min(0);
    let mut current = Arc::clone(&levels.map[&0]);
    let mut level = 0;
    while level > target {
      level -= 1;
      current = match levels.map.get(&level) {
        Some(existing) => Arc::clone(existing),
        None => {
          let reduced = Arc::new(reduce_half(&current)?);
          levels.map.insert(level, Arc::clone(&reduced));
          reduced
        }
      };
    }
    Ok(())
  }

  /// Drops derived levels and stales level 0 according to pending toggles
  ///
  /// Three-way policy on level 0: untouched when nothing is toggled,
  /// zeroed only inside the toggled layers' dirty rectangle when a
  /// strict subset is toggled, zeroed whole when every layer toggled at
  /// once. Every zeroed region is accumulated so the next fill rebuilds
  /// it even if the toggles that caused it cancel out first. The caller
  /// holds the stack lock (stack before levels).
  pub fn invalidate(&self, stack: &LayerStack) {
    let mut levels = self.levels.lock().unwrap();
    levels.map.retain(|&level, _| level == 0);

    let toggled = stack.mask().toggled_count();
    if toggled == 0 {
      return;
    }
    let Some(level0) = levels.map.get_mut(&0) else {
      return;
    };

    let surface = Arc::make_mut(level0);
    if toggled == stack.mask().len() {
      surface.data_mut().fill(0);
      levels.stale = stack.canvas();
    } else {
      let canvas = stack.canvas();
      let Some(dirty) = compositor::dirty_rect(stack, false).intersect(canvas) else {
        return;
      };
      let stride = canvas.width as usize * 4;
      let data = surface.data_mut();
      let span = dirty.width as usize * 4;
      for dy in 0..dirty.height as usize {
        let start =
          ((dirty.y - canvas.y) as usize + dy) * stride + (dirty.x - canvas.x) as usize * 4;
        data[start..start + span].fill(0);
      }
      levels.stale = levels.stale.union(dirty);
    }
    levels.level0_clear = true;
  }
}

/// Halves a surface with a 2x2 box filter
///
/// Each output pixel averages the four source pixels of its block,
/// per component, integer-dividing by 4. Odd trailing rows/columns
/// replicate the last source row/column.
pub fn reduce_half(src: &Pixmap) -> Result<Pixmap, RenderError> {
  let sw = src.width() as usize;
  let sh = src.height() as usize;
  let dw = (sw / 2).max(1);
  let dh = (sh / 2).max(1);
  let mut out = new_surface_with_context(dw as u32, dh as u32, "mipmap reduction")?;
  let source = src.data();
  let dest = out.data_mut();
  for y in 0..dh {
    let sy0 = (2 * y).min(sh - 1);
    let sy1 = (2 * y + 1).min(sh - 1);
    for x in 0..dw {
      let sx0 = (2 * x).min(sw - 1);
      let sx1 = (2 * x + 1).min(sw - 1);
      for component in 0..4 {
        let sum = source[(sy0 * sw + sx0) * 4 + component] as u32
          + source[(sy0 * sw + sx1) * 4 + component] as u32
          + source[(sy1 * sw + sx0) * 4 + component] as u32
          + source[(sy1 * sw + sx1) * 4 + component] as u32;
        dest[(y * dw + x) * 4 + component] = (sum / 4) as u8;
      }
    }
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::layer::Layer;

  fn uniform_stack(width: u32, height: u32, cmyk: [u8; 4]) -> Mutex<LayerStack> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..width * height {
      data.extend_from_slice(&cmyk);
    }
    let mut stack = LayerStack::new();
    stack
      .push_layer(Layer::new(0, 0, width, height, 4, data).unwrap())
      .unwrap();
    Mutex::new(stack)
  }

  #[test]
  fn cold_cache_reports_not_ready() {
    let cache = MipmapCache::new();
    assert!(!cache.lookup(0).is_ready());
    assert!(!cache.lookup(-3).is_ready());
  }

  #[test]
  fn fill_populates_levels_in_order() {
    let stack = uniform_stack(8, 8, [255, 0, 0, 0]);
    let cache = MipmapCache::new();
    cache.fill(-2, &stack).unwrap();

    for zoom in [0, -1, -2] {
      match cache.lookup(zoom) {
        CacheLookup::Ready(surface) => {
          let expected = 8u32 >> (-zoom) as u32;
          assert_eq!(surface.width(), expected);
          assert_eq!(surface.height(), expected);
        }
        CacheLookup::NotReady => panic!("level {zoom} missing after fill"),
      }
    }
    // -3 was not requested, so it must not exist yet.
    assert!(!cache.lookup(-3).is_ready());
  }

  #[test]
  fn magnification_levels_reuse_level_zero() {
    let stack = uniform_stack(4, 4, [0, 0, 0, 0]);
    let cache = MipmapCache::new();
    cache.fill(0, &stack).unwrap();
    let base = match cache.lookup(0) {
      CacheLookup::Ready(surface) => surface,
      CacheLookup::NotReady => panic!("level 0 missing"),
    };
    match cache.lookup(5) {
      CacheLookup::Ready(surface) => assert!(Arc::ptr_eq(&base, &surface)),
      CacheLookup::NotReady => panic!("magnification must reuse level 0"),
    }
  }

  #[test]
  fn uniform_canvas_reduces_to_the_same_color() {
    // 50% cyan over a 10x6 canvas (odd reductions included).
    let stack = uniform_stack(10, 6, [128, 0, 0, 0]);
    let cache = MipmapCache::new();
    cache.fill(-3, &stack).unwrap();
    for zoom in [0, -1, -2, -3] {
      let CacheLookup::Ready(surface) = cache.lookup(zoom) else {
        panic!("level {zoom} missing");
      };
      let first = surface.pixel(0, 0).unwrap();
      for px in surface.pixels() {
        assert_eq!(*px, first, "level {zoom} not uniform");
      }
      assert_eq!(first.red(), 127); // 255 - 128
      assert_eq!(first.green(), 255);
    }
  }

  #[test]
  fn fill_is_idempotent() {
    let stack = uniform_stack(4, 4, [0, 128, 0, 0]);
    let cache = MipmapCache::new();
    cache.fill(-1, &stack).unwrap();
    let CacheLookup::Ready(before) = cache.lookup(-1) else {
      panic!("level -1 missing");
    };
    cache.fill(-1, &stack).unwrap();
    let CacheLookup::Ready(after) = cache.lookup(-1) else {
      panic!("level -1 missing");
    };
    assert!(Arc::ptr_eq(&before, &after));
  }

  #[test]
  fn pending_flag_admits_one_fill() {
    let cache = MipmapCache::new();
    assert!(cache.try_begin_fill());
    assert!(!cache.try_begin_fill());
    assert!(cache.fill_pending());

    let stack = uniform_stack(2, 2, [0, 0, 0, 0]);
    cache.fill(0, &stack).unwrap();
    assert!(!cache.fill_pending());
    assert!(cache.try_begin_fill());
  }

  #[test]
  fn reduce_half_averages_blocks() {
    let mut src = new_surface_with_context(2, 2, "test").unwrap();
    {
      let data = src.data_mut();
      // Red components 10, 20, 30, 40 -> average 25.
      for (i, red) in [10u8, 20, 30, 40].iter().enumerate() {
        data[i * 4] = *red;
        data[i * 4 + 3] = 255;
      }
    }
    let out = reduce_half(&src).unwrap();
    assert_eq!(out.width(), 1);
    assert_eq!(out.height(), 1);
    assert_eq!(out.data()[0], 25);
    assert_eq!(out.data()[3], 255);
  }

  #[test]
  fn reduce_half_floor_divides() {
    let mut src = new_surface_with_context(2, 1, "test").unwrap();
    {
      let data = src.data_mut();
      // Single row replicates; red sum is 1+2+1+2 = 6 -> 6/4 = 1.
      data[0] = 1;
      data[4] = 2;
      data[3] = 255;
      data[7] = 255;
    }
    let out = reduce_half(&src).unwrap();
    assert_eq!(out.data()[0], 1);
  }

  #[test]
  fn invalidate_with_no_toggles_keeps_level_zero() {
    let stack = uniform_stack(4, 4, [128, 0, 0, 0]);
    let cache = MipmapCache::new();
    cache.fill(-1, &stack).unwrap();

    cache.invalidate(&stack.lock().unwrap());
    assert!(cache.lookup(0).is_ready());
    // Derived levels are always dropped.
    assert!(!cache.lookup(-1).is_ready());
  }

  #[test]
  fn partial_invalidation_zeroes_only_the_toggled_footprint() {
    // A 4x4 base layer with a 2x2 layer at (2,2).
    let mut stack = LayerStack::new();
    let mut base = Vec::new();
    for _ in 0..16 {
      base.extend_from_slice(&[128, 0, 0, 0]);
    }
    stack.push_layer(Layer::new(0, 0, 4, 4, 4, base).unwrap()).unwrap();
    stack
      .push_layer(Layer::new(2, 2, 2, 2, 4, vec![0, 0, 0, 255].repeat(4)).unwrap())
      .unwrap();
    let stack = Mutex::new(stack);

    let cache = MipmapCache::new();
    cache.fill(0, &stack).unwrap();
    let reference = match cache.lookup(0) {
      CacheLookup::Ready(surface) => surface.data().to_vec(),
      CacheLookup::NotReady => panic!("level 0 missing"),
    };

    {
      let mut stack = stack.lock().unwrap();
      stack.toggle(1);
      cache.invalidate(&stack);
    }

    // The cache reports stale, but the surface bytes are inspectable.
    assert!(!cache.lookup(0).is_ready());
    let levels = cache.levels.lock().unwrap();
    let data = levels.map[&0].data();
    let footprint = crate::geometry::Rect::from_xywh(2, 2, 2, 2);
    for y in 0..4 {
      for x in 0..4 {
        let px = (y * 4 + x) * 4;
        if footprint.contains(x as i32, y as i32) {
          assert_eq!(&data[px..px + 4], &[0, 0, 0, 0], "({x},{y}) not zeroed");
        } else {
          assert_eq!(&data[px..px + 4], &reference[px..px + 4], "({x},{y}) disturbed");
        }
      }
    }
  }

  #[test]
  fn refill_after_cancelled_toggles_restores_zeroed_bytes() {
    let mut stack = LayerStack::new();
    let mut base = Vec::new();
    for _ in 0..16 {
      base.extend_from_slice(&[128, 0, 0, 0]);
    }
    stack.push_layer(Layer::new(0, 0, 4, 4, 4, base).unwrap()).unwrap();
    stack
      .push_layer(Layer::new(2, 2, 2, 2, 4, vec![0, 0, 0, 255].repeat(4)).unwrap())
      .unwrap();
    let stack = Mutex::new(stack);

    let cache = MipmapCache::new();
    cache.fill(0, &stack).unwrap();
    let reference = match cache.lookup(0) {
      CacheLookup::Ready(surface) => surface.data().to_vec(),
      CacheLookup::NotReady => panic!("level 0 missing"),
    };

    // Toggle the same layer twice, invalidating after each edit. The net
    // visibility change is nothing, but the first invalidation zeroed the
    // layer's footprint; the refill must rebuild it anyway.
    for _ in 0..2 {
      let mut stack = stack.lock().unwrap();
      stack.toggle(1);
      cache.invalidate(&stack);
    }

    cache.fill(0, &stack).unwrap();
    let CacheLookup::Ready(after) = cache.lookup(0) else {
      panic!("level 0 missing after refill");
    };
    assert_eq!(after.data(), reference.as_slice());
  }

  #[test]
  fn invalidate_with_all_toggled_clears_everything() {
    let stack = uniform_stack(4, 4, [128, 0, 0, 0]);
    let cache = MipmapCache::new();
    cache.fill(0, &stack).unwrap();

    {
      let mut stack = stack.lock().unwrap();
      stack.toggle(0);
      cache.invalidate(&stack);
    }
    assert!(!cache.lookup(0).is_ready());
  }
}
