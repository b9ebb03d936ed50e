//! Integer pixel-space geometry
//!
//! This module provides the rectangle type used throughout the engine.
//! All units are whole device pixels in a shared canvas coordinate space.
//!
//! # Coordinate System
//!
//! The coordinate system has its origin at the top-left corner:
//! - Positive X extends to the right
//! - Positive Y extends downward
//!
//! Layers may be positioned at negative offsets; the canvas is the union
//! bounding rectangle of all layers and may therefore have a nonzero
//! origin.

use std::fmt;

/// An axis-aligned rectangle in canvas pixel space
///
/// Width and height are unsigned; a rectangle with zero width or height
/// is considered empty and intersects nothing.
///
/// # Examples
///
/// ```
/// use sepview::Rect;
///
/// let r = Rect::from_xywh(10, 20, 100, 50);
/// assert_eq!(r.right(), 110);
/// assert_eq!(r.bottom(), 70);
/// assert!(!r.is_empty());
/// assert!(Rect::ZERO.is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
  /// X coordinate of the left edge
  pub x: i32,
  /// Y coordinate of the top edge
  pub y: i32,
  /// Width in pixels
  pub width: u32,
  /// Height in pixels
  pub height: u32,
}

impl Rect {
  /// The empty rectangle at the origin
  pub const ZERO: Self = Self {
    x: 0,
    y: 0,
    width: 0,
    height: 0,
  };

  /// Creates a rectangle from position and size
  pub const fn from_xywh(x: i32, y: i32, width: u32, height: u32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  /// X coordinate one past the right edge
  pub fn right(&self) -> i64 {
    self.x as i64 + self.width as i64
  }

  /// Y coordinate one past the bottom edge
  pub fn bottom(&self) -> i64 {
    self.y as i64 + self.height as i64
  }

  /// Whether this rectangle covers no pixels
  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  /// Whether the given pixel lies inside this rectangle
  pub fn contains(&self, x: i32, y: i32) -> bool {
    !self.is_empty()
      && x >= self.x
      && y >= self.y
      && (x as i64) < self.right()
      && (y as i64) < self.bottom()
  }

  /// Intersection of two rectangles
  ///
  /// Returns `None` when the rectangles do not overlap (or either is
  /// empty).
  ///
  /// # Examples
  ///
  /// ```
  /// use sepview::Rect;
  ///
  /// let a = Rect::from_xywh(0, 0, 10, 10);
  /// let b = Rect::from_xywh(5, 5, 10, 10);
  /// assert_eq!(a.intersect(b), Some(Rect::from_xywh(5, 5, 5, 5)));
  ///
  /// let c = Rect::from_xywh(20, 20, 4, 4);
  /// assert_eq!(a.intersect(c), None);
  /// ```
  pub fn intersect(self, other: Rect) -> Option<Rect> {
    if self.is_empty() || other.is_empty() {
      return None;
    }
    let x = self.x.max(other.x);
    let y = self.y.max(other.y);
    let right = self.right().min(other.right());
    let bottom = self.bottom().min(other.bottom());
    if (x as i64) >= right || (y as i64) >= bottom {
      return None;
    }
    Some(Rect {
      x,
      y,
      width: (right - x as i64) as u32,
      height: (bottom - y as i64) as u32,
    })
  }

  /// Smallest rectangle covering both inputs
  ///
  /// An empty rectangle acts as the identity: the union of anything with
  /// an empty rectangle is the other operand unchanged.
  pub fn union(self, other: Rect) -> Rect {
    if self.is_empty() {
      return other;
    }
    if other.is_empty() {
      return self;
    }
    let x = self.x.min(other.x);
    let y = self.y.min(other.y);
    let right = self.right().max(other.right());
    let bottom = self.bottom().max(other.bottom());
    Rect {
      x,
      y,
      width: (right - x as i64) as u32,
      height: (bottom - y as i64) as u32,
    }
  }
}

impl fmt::Display for Rect {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}x{}@({}, {})", self.width, self.height, self.x, self.y)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn intersect_is_commutative() {
    let a = Rect::from_xywh(-5, -5, 20, 20);
    let b = Rect::from_xywh(0, 0, 30, 8);
    assert_eq!(a.intersect(b), b.intersect(a));
    assert_eq!(a.intersect(b), Some(Rect::from_xywh(0, 0, 15, 8)));
  }

  #[test]
  fn empty_rect_never_intersects() {
    let a = Rect::from_xywh(0, 0, 10, 10);
    assert_eq!(a.intersect(Rect::ZERO), None);
    assert_eq!(Rect::ZERO.intersect(a), None);
  }

  #[test]
  fn union_with_empty_is_identity() {
    let a = Rect::from_xywh(3, 4, 5, 6);
    assert_eq!(a.union(Rect::ZERO), a);
    assert_eq!(Rect::ZERO.union(a), a);
  }

  #[test]
  fn union_covers_disjoint_rects() {
    let a = Rect::from_xywh(0, 0, 2, 2);
    let b = Rect::from_xywh(10, 10, 2, 2);
    assert_eq!(a.union(b), Rect::from_xywh(0, 0, 12, 12));
  }

  #[test]
  fn contains_respects_half_open_edges() {
    let r = Rect::from_xywh(0, 0, 4, 4);
    assert!(r.contains(0, 0));
    assert!(r.contains(3, 3));
    assert!(!r.contains(4, 0));
    assert!(!r.contains(0, 4));
  }

  #[test]
  fn negative_offsets_round_trip() {
    let a = Rect::from_xywh(-10, -10, 5, 5);
    let b = Rect::from_xywh(-8, -8, 10, 10);
    assert_eq!(a.intersect(b), Some(Rect::from_xywh(-8, -8, 3, 3)));
    assert_eq!(a.union(b), Rect::from_xywh(-10, -10, 12, 12));
  }
}
