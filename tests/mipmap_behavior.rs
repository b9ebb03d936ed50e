//! Mipmap cache behavior through the presentation-facing view: uniform
//! reduction, partial refills, and background scheduling.

use sepview::mipmap::CacheLookup;
use sepview::{Layer, LayerStack, SeparationView};
use std::time::Duration;

fn uniform_layer(width: u32, height: u32, cmyk: [u8; 4]) -> Layer {
  let mut data = Vec::with_capacity((width * height * 4) as usize);
  for _ in 0..width * height {
    data.extend_from_slice(&cmyk);
  }
  Layer::new(0, 0, width, height, 4, data).unwrap()
}

fn ready(lookup: CacheLookup) -> std::sync::Arc<tiny_skia::Pixmap> {
  match lookup {
    CacheLookup::Ready(surface) => surface,
    CacheLookup::NotReady => panic!("expected a ready surface"),
  }
}

#[test]
fn uniform_canvas_is_the_same_color_at_every_level() {
  let mut stack = LayerStack::new();
  // 100 magenta over a deliberately odd canvas size.
  stack.push_layer(uniform_layer(13, 9, [0, 100, 0, 0])).unwrap();
  let (view, _redraws) = SeparationView::new(stack);

  for zoom in [0, -1, -2, -3] {
    let surface = ready(view.render_blocking(zoom).unwrap());
    let first = surface.pixel(0, 0).unwrap();
    assert_eq!(first.green(), 155); // 255 - 100
    for px in surface.pixels() {
      assert_eq!(*px, first, "level {zoom} not uniform");
    }
  }
}

#[test]
fn deeper_levels_halve_until_one_pixel() {
  let mut stack = LayerStack::new();
  stack.push_layer(uniform_layer(16, 16, [0, 0, 0, 64])).unwrap();
  let (view, _redraws) = SeparationView::new(stack);

  let expected = [(0, 16), (-1, 8), (-2, 4), (-3, 2), (-4, 1), (-5, 1)];
  for (zoom, size) in expected {
    let surface = ready(view.render_blocking(zoom).unwrap());
    assert_eq!(surface.width(), size, "level {zoom}");
    assert_eq!(surface.height(), size, "level {zoom}");
  }
}

#[test]
fn partial_refill_matches_a_full_recompute() {
  let build = |hide_second: bool| {
    let mut stack = two_layer_stack();
    if hide_second {
      stack.toggle(1);
    }
    stack
  };

  // Incremental: render both layers, then hide the small one and refill
  // through the invalidation path.
  let (view, _redraws) = SeparationView::new(build(false));
  view.render_blocking(0).unwrap();
  view.toggle_layer(1);
  let incremental = ready(view.render_blocking(0).unwrap());

  // Reference: a fresh view that never showed the small layer.
  let (reference_view, _redraws) = SeparationView::new(build(true));
  let reference = ready(reference_view.render_blocking(0).unwrap());

  assert_eq!(incremental.data(), reference.data());
}

fn two_layer_stack() -> LayerStack {
  let mut stack = LayerStack::new();
  let mut base = Vec::new();
  for i in 0..8 * 8 {
    base.extend_from_slice(&[(i * 3 % 256) as u8, 0, 40, 0]);
  }
  stack.push_layer(Layer::new(0, 0, 8, 8, 4, base).unwrap()).unwrap();
  stack
    .push_layer(Layer::new(3, 3, 2, 2, 4, vec![0, 0, 0, 200].repeat(4)).unwrap())
    .unwrap();
  stack
}

#[test]
fn cancelled_toggles_refill_their_zeroed_footprint() {
  let (view, _redraws) = SeparationView::new(two_layer_stack());
  let before = ready(view.render_blocking(0).unwrap()).data().to_vec();

  // Hide then re-show the small layer before any refill; each edit
  // invalidates the cache on its own, but the net change is nothing.
  view.toggle_layer(1);
  view.toggle_layer(1);

  let after = ready(view.render_blocking(0).unwrap());
  assert_eq!(after.data(), before.as_slice());
}

#[test]
fn shrinking_toggle_sets_refill_every_zeroed_pixel() {
  let (view, _redraws) = SeparationView::new(two_layer_stack());
  view.render_blocking(0).unwrap();

  // Queue hiding both layers, then cancel the base one. The middle
  // invalidation zeroed the whole canvas; the final toggle set covers
  // only the small layer's box.
  view.toggle_layer(1);
  view.toggle_layer(0);
  view.toggle_layer(0);
  let incremental = ready(view.render_blocking(0).unwrap());

  // Reference: a fresh view where only the small layer is hidden.
  let mut reference_stack = two_layer_stack();
  reference_stack.toggle(1);
  let (reference_view, _redraws) = SeparationView::new(reference_stack);
  let reference = ready(reference_view.render_blocking(0).unwrap());

  assert_eq!(incremental.data(), reference.data());
}

#[test]
fn background_fill_notifies_exactly_once() {
  let mut stack = LayerStack::new();
  stack.push_layer(uniform_layer(6, 6, [30, 0, 0, 0])).unwrap();
  let (view, redraws) = SeparationView::new(stack);

  assert!(!view.surface(-1).is_ready());
  // Immediate second query: must observe the pending fill, not enqueue
  // another one.
  let _ = view.surface(-1);

  let request = redraws
    .recv_timeout(Duration::from_secs(5))
    .expect("background fill completion");
  assert_eq!(request.zoom, -1);
  assert!(
    redraws.recv_timeout(Duration::from_millis(200)).is_err(),
    "a second fill was scheduled for the same cold lookup"
  );

  let surface = ready(view.surface(-1));
  assert_eq!(surface.width(), 3);
}

#[test]
fn stale_notifications_are_survivable() {
  let mut stack = LayerStack::new();
  stack.push_layer(uniform_layer(4, 4, [0, 0, 0, 0])).unwrap();
  stack.push_layer(uniform_layer(4, 4, [50, 0, 0, 0])).unwrap();
  let (view, redraws) = SeparationView::new(stack);

  assert!(!view.surface(0).is_ready());
  redraws
    .recv_timeout(Duration::from_secs(5))
    .expect("first fill");

  // Invalidate after the fill completed; the earlier notification now
  // refers to stale data. Re-querying must simply schedule a new fill.
  view.toggle_layer(1);
  assert!(!view.surface(0).is_ready());
  redraws
    .recv_timeout(Duration::from_secs(5))
    .expect("refill after invalidation");
  assert!(view.surface(0).is_ready());
}
