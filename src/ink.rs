//! The ink-mixing model
//!
//! Converts per-channel ink intensities into a canonical subtractive
//! CMYK accumulation and from there into display RGB. Every rendering
//! path in the engine (layer compositing, tile rendering, pyramid
//! reduction) funnels through these functions, so their numeric
//! behavior is pinned precisely:
//!
//! - Each channel contribution is rounded *before* summation, never
//!   after, so summation order cannot change the result.
//! - The summed accumulation is clamped to [0, 255] per component,
//!   after summation rather than per term.
//! - CMYK → RGB is a direct subtractive-to-additive conversion with no
//!   gamma correction; alpha is always fully opaque.
//!
//! The white-ink blend lives here too: a two-channel interaction applied
//! per sample when a separation carries a white/backing ink. Its
//! multiplicative mode uses plain integer division (`base / overlay`),
//! reproducing long-standing reference behavior; the truncation is
//! covered by tests and must not be "fixed" without a product decision.

/// How one unit of a channel's intensity contributes to the canonical
/// CMYK accumulation
///
/// The four reserved process channels use the identity quadruples
/// ([`ChannelMultipliers::CYAN`] etc.); custom spot inks carry arbitrary
/// non-negative weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelMultipliers {
  /// Contribution toward cyan
  pub c: f32,
  /// Contribution toward magenta
  pub m: f32,
  /// Contribution toward yellow
  pub y: f32,
  /// Contribution toward key (black)
  pub k: f32,
}

impl ChannelMultipliers {
  /// Identity quadruple for the process cyan channel
  pub const CYAN: Self = Self::new(1.0, 0.0, 0.0, 0.0);
  /// Identity quadruple for the process magenta channel
  pub const MAGENTA: Self = Self::new(0.0, 1.0, 0.0, 0.0);
  /// Identity quadruple for the process yellow channel
  pub const YELLOW: Self = Self::new(0.0, 0.0, 1.0, 0.0);
  /// Identity quadruple for the process key channel
  pub const KEY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

  pub const fn new(c: f32, m: f32, y: f32, k: f32) -> Self {
    Self { c, m, y, k }
  }

  /// Whether every component is a finite number
  pub fn is_finite(&self) -> bool {
    self.c.is_finite() && self.m.is_finite() && self.y.is_finite() && self.k.is_finite()
  }
}

/// Canonical per-pixel CMYK accumulation, each component in [0, 255]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InkAccum {
  pub c: u8,
  pub m: u8,
  pub y: u8,
  pub k: u8,
}

impl InkAccum {
  pub const fn new(c: u8, m: u8, y: u8, k: u8) -> Self {
    Self { c, m, y, k }
  }
}

fn clamp_component(sum: i32) -> u8 {
  sum.clamp(0, 255) as u8
}

/// Accumulates channel contributions into a canonical CMYK tuple
///
/// For each of C, M, Y, K independently: sum `round(multiplier * sample)`
/// over all terms, then clamp the sum to [0, 255]. Rounding happens per
/// term, so the result is independent of term order.
///
/// # Examples
///
/// ```
/// use sepview::ink::{accumulate, ChannelMultipliers, InkAccum};
///
/// let terms = [
///     (ChannelMultipliers::CYAN, 200u8),
///     (ChannelMultipliers::KEY, 40u8),
/// ];
/// assert_eq!(accumulate(&terms), InkAccum::new(200, 0, 0, 40));
/// ```
pub fn accumulate(terms: &[(ChannelMultipliers, u8)]) -> InkAccum {
  let mut c = 0i32;
  let mut m = 0i32;
  let mut y = 0i32;
  let mut k = 0i32;
  for (mults, sample) in terms {
    let s = *sample as f32;
    c += (mults.c * s).round() as i32;
    m += (mults.m * s).round() as i32;
    y += (mults.y * s).round() as i32;
    k += (mults.k * s).round() as i32;
  }
  InkAccum {
    c: clamp_component(c),
    m: clamp_component(m),
    y: clamp_component(y),
    k: clamp_component(k),
  }
}

/// Accumulates parallel multiplier and sample slices
///
/// Zip-form of [`accumulate`] for interleaved pixel data; callers must
/// ensure the two slices have the same length.
pub fn accumulate_samples(mults: &[ChannelMultipliers], samples: &[u8]) -> InkAccum {
  let mut c = 0i32;
  let mut m = 0i32;
  let mut y = 0i32;
  let mut k = 0i32;
  for (mult, &sample) in mults.iter().zip(samples) {
    let s = sample as f32;
    c += (mult.c * s).round() as i32;
    m += (mult.m * s).round() as i32;
    y += (mult.y * s).round() as i32;
    k += (mult.k * s).round() as i32;
  }
  InkAccum {
    c: clamp_component(c),
    m: clamp_component(m),
    y: clamp_component(y),
    k: clamp_component(k),
  }
}

/// Converts a canonical CMYK accumulation to display RGB
///
/// `black = 1 - K/255`; each additive component is
/// `255 * (1 - ink/255) * black`. The output is always fully opaque and
/// no gamma correction is applied.
pub fn to_rgb(ink: InkAccum) -> (u8, u8, u8) {
  let black = 1.0 - ink.k as f32 / 255.0;
  let r = 255.0 * (1.0 - ink.c as f32 / 255.0) * black;
  let g = 255.0 * (1.0 - ink.m as f32 / 255.0) * black;
  let b = 255.0 * (1.0 - ink.y as f32 / 255.0) * black;
  (r.round() as u8, g.round() as u8, b.round() as u8)
}

/// Blend mode for combining a color channel sample with a white-ink
/// overlay sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
  /// The white overlay is ignored entirely
  #[default]
  None,
  /// The overlay knocks ink out of the sample: `max(sample - white, 0)`
  Subtractive,
  /// Integer division of the sample by the overlay. Not normalized; a
  /// white value of zero passes the sample through unchanged. The
  /// truncation here is reference behavior, preserved deliberately.
  Multiplicative,
}

/// Combines a white-ink overlay sample with a color channel sample
///
/// The overlay comes first: `blend(white, sample, mode)` returns the
/// color sample after the white ink has acted on it.
///
/// # Examples
///
/// ```
/// use sepview::ink::{blend, BlendMode};
///
/// assert_eq!(blend(100, 100, BlendMode::None), 100);
/// assert_eq!(blend(100, 100, BlendMode::Subtractive), 0);
/// assert_eq!(blend(100, 100, BlendMode::Multiplicative), 1);
/// ```
pub fn blend(white: u8, sample: u8, mode: BlendMode) -> u8 {
  match mode {
    BlendMode::None => sample,
    BlendMode::Subtractive => {
      if white >= sample {
        0
      } else {
        sample - white
      }
    }
    BlendMode::Multiplicative => {
      if white > 0 {
        sample / white
      } else {
        sample
      }
    }
  }
}
