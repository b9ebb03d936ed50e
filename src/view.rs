//! Presentation-facing view over one separation
//!
//! Ties the layer stack, the mipmap cache, and the render queue
//! together behind a non-blocking surface query. The interactive thread
//! calls [`SeparationView::surface`]; on a cold cache it gets
//! [`CacheLookup::NotReady`] back immediately and a single background
//! fill job is scheduled. When the job finishes, a [`RedrawRequest`]
//! arrives on the receiver handed out at construction and the caller
//! queries again.

use crate::error::Error;
use crate::layer::{Layer, LayerStack};
use crate::mipmap::{CacheLookup, MipmapCache};
use crate::pool::{RedrawRequest, RenderQueue};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

/// Interactive handle to one composited separation
pub struct SeparationView {
  stack: Arc<Mutex<LayerStack>>,
  cache: Arc<MipmapCache>,
  queue: RenderQueue,
}

impl SeparationView {
  /// Wraps a loaded stack; the receiver delivers redraw requests from
  /// background fills
  pub fn new(stack: LayerStack) -> (Self, Receiver<RedrawRequest>) {
    let (queue, redraws) = RenderQueue::new();
    (
      Self {
        stack: Arc::new(Mutex::new(stack)),
        cache: Arc::new(MipmapCache::new()),
        queue,
      },
      redraws,
    )
  }

  /// Non-blocking surface query for a zoom level
  ///
  /// NotReady schedules at most one background fill; repeated calls
  /// while that fill is pending observe the pending state and do not
  /// enqueue duplicates. Callers receiving a redraw request must query
  /// again — the request may be stale after an invalidation.
  pub fn surface(&self, zoom: i32) -> CacheLookup {
    match self.cache.lookup(zoom) {
      ready @ CacheLookup::Ready(_) => ready,
      CacheLookup::NotReady => {
        if self.cache.try_begin_fill() {
          let cache = Arc::clone(&self.cache);
          let stack = Arc::clone(&self.stack);
          self.queue.submit(zoom, move || {
            if let Err(err) = cache.fill(zoom, &stack) {
              log::warn!("background fill for zoom {zoom} failed: {err}");
            }
          });
        }
        CacheLookup::NotReady
      }
    }
  }

  /// Synchronous fill for callers that want the surface now
  ///
  /// Runs the same fill body as the background path, on the calling
  /// thread, respecting the same cache mutex.
  pub fn render_blocking(&self, zoom: i32) -> Result<CacheLookup, Error> {
    self.cache.fill(zoom, &self.stack)?;
    Ok(self.cache.lookup(zoom))
  }

  /// Queues a visibility toggle and invalidates the cache accordingly
  pub fn toggle_layer(&self, index: usize) {
    let mut stack = self.stack.lock().unwrap();
    stack.toggle(index);
    self.cache.invalidate(&stack);
  }

  /// Adds a layer to the stack and drops every cached level
  ///
  /// The canvas may have changed size, so derived levels are useless and
  /// level 0 will be recomposited in full by the next fill.
  pub fn push_layer(&self, layer: Layer) -> Result<usize, Error> {
    let mut stack = self.stack.lock().unwrap();
    let index = stack.push_layer(layer)?;
    self.cache.invalidate(&stack);
    Ok(index)
  }

  /// Runs `f` with the stack locked (metadata queries, tests)
  pub fn with_stack<R>(&self, f: impl FnOnce(&LayerStack) -> R) -> R {
    f(&self.stack.lock().unwrap())
  }
}
