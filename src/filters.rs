// filters.rs — Analysis filter bank for the forward DWT.
//
// A filter bank is two equal-length real coefficient sequences: a low-pass
// filter producing approximation coefficients and a high-pass filter
// producing detail coefficients. Both kernels (CPU and GPU) treat the bank
// as read-only; on the GPU the taps travel in a uniform buffer so every
// thread reads them through the constant path.
//
// TAP PADDING IS LOAD-BEARING
// ────────────────────────────
// The stock CDF 9/7 analysis pair has 9 and 7 taps. The sequences below are
// padded to a common length of 10, and the padding is NOT symmetric: the
// low-pass pads one leading zero, the high-pass pads one leading and two
// trailing zeros. The convolution kernels index the taps reversed
// (`maskwidth - 1 - j`), and the phase of each output sample depends on
// where the zeros sit. Re-centering "for tidiness" shifts the subbands and
// breaks agreement with the reference transform. Leave them as they are.

use std::fmt;

/// CDF 9/7 analysis low-pass taps, padded to 10 entries (one leading zero).
pub const CDF97_ANALYSIS_LO: [f32; 10] = [
    0.0,
    0.026748757411,
    -0.016864118443,
    -0.078223266529,
    0.266864118443,
    0.602949018236,
    0.266864118443,
    -0.078223266529,
    -0.016864118443,
    0.026748757411,
];

/// CDF 9/7 analysis high-pass taps, padded to 10 entries (one leading,
/// two trailing zeros).
pub const CDF97_ANALYSIS_HI: [f32; 10] = [
    0.0,
    0.091271763114,
    -0.057543526229,
    -0.591271763114,
    1.11508705,
    -0.591271763114,
    -0.057543526229,
    0.091271763114,
    0.0,
    0.0,
];

/// An immutable low-pass / high-pass analysis pair of equal length.
///
/// Constructed once and shared across all transforms and channels.
#[derive(Debug, Clone)]
pub struct FilterBank {
    lo: Vec<f32>,
    hi: Vec<f32>,
}

impl FilterBank {
    /// Build a filter bank from explicit tap sequences.
    ///
    /// # Errors
    /// Returns [`FilterError::LengthMismatch`] if the sequences differ in
    /// length, and [`FilterError::Empty`] if they are empty. Both are
    /// caller contract violations caught before any device allocation.
    pub fn new(lo: Vec<f32>, hi: Vec<f32>) -> Result<Self, FilterError> {
        if lo.is_empty() {
            return Err(FilterError::Empty);
        }
        if lo.len() != hi.len() {
            return Err(FilterError::LengthMismatch {
                lo: lo.len(),
                hi: hi.len(),
            });
        }
        Ok(FilterBank { lo, hi })
    }

    /// The fixed 10-tap CDF 9/7 analysis pair.
    pub fn cdf97() -> Self {
        // Lengths are equal by construction; unwrap cannot fire.
        FilterBank::new(CDF97_ANALYSIS_LO.to_vec(), CDF97_ANALYSIS_HI.to_vec())
            .expect("built-in CDF 9/7 taps have equal length")
    }

    /// Filter length — the `maskwidth` every output dimension derives from.
    #[inline]
    pub fn len(&self) -> usize {
        self.lo.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lo.is_empty()
    }

    /// Low-pass (approximation) taps.
    #[inline]
    pub fn lo(&self) -> &[f32] {
        &self.lo
    }

    /// High-pass (detail) taps.
    #[inline]
    pub fn hi(&self) -> &[f32] {
        &self.hi
    }
}

/// Errors from filter bank construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterError {
    /// Low-pass and high-pass sequences have different lengths.
    LengthMismatch { lo: usize, hi: usize },
    /// Empty tap sequences.
    Empty,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::LengthMismatch { lo, hi } => write!(
                f,
                "filter length mismatch: low-pass has {lo} taps, high-pass has {hi}"
            ),
            FilterError::Empty => write!(f, "filter bank must have at least one tap"),
        }
    }
}

impl std::error::Error for FilterError {}
