// dwt.rs — CPU reference forward DWT (separable, zero-padding boundary).
//
// This is the authoritative implementation the GPU pipeline in gpu/dwt.rs
// is validated against. It mirrors the two-kernel split exactly:
//   analyze_rows() — convolve each row with both filters, decimate by 2
//                    along the width → two M × C intermediates
//   analyze_cols() — convolve each intermediate column-wise with both
//                    filters, decimate by 2 along the height → four
//                    R × C subbands
//
// SAMPLE/TAP INDEXING
// ────────────────────
// Both passes compute, per output index t along the filtered axis,
//
//     out[t] = Σ_j  x̃[2t + j + 2 − maskwidth] · f[maskwidth − 1 − j]
//
// with x̃ zero outside the signal. That is full convolution against the
// reversed taps, evaluated at odd indices 2t+1. The j-loop below adds
// terms in the same order as the GPU kernels' tap loop, so CPU and GPU
// sums round identically apart from hardware-level differences, keeping
// the elementwise comparison tolerance tight (5e-7).

use crate::filters::FilterBank;
use crate::geometry::coeff_len;
use crate::image::Image;

/// The four outputs of one 2D DWT stage, each `R × C` where
/// `R = coeff_len(M)`, `C = coeff_len(N)`.
#[derive(Debug)]
pub struct Subbands {
    /// Approximation (low/low).
    pub ca: Image<f32>,
    /// Horizontal detail (low rows, high columns).
    pub ch: Image<f32>,
    /// Vertical detail (high rows, low columns).
    pub cv: Image<f32>,
    /// Diagonal detail (high/high).
    pub cd: Image<f32>,
}

impl Subbands {
    /// Common shape of the four subbands as (rows, cols).
    pub fn shape(&self) -> (usize, usize) {
        (self.ca.height(), self.ca.width())
    }
}

/// One forward DWT level of a single channel.
///
/// Output subbands are routed as: `ca` = lo(row)∘lo(col),
/// `ch` = lo(row)∘hi(col), `cv` = hi(row)∘lo(col), `cd` = hi(row)∘hi(col).
pub fn forward(src: &Image<f32>, filters: &FilterBank) -> Subbands {
    let (tmp_lo, tmp_hi) = analyze_rows(src, filters);
    analyze_cols(&tmp_lo, &tmp_hi, filters)
}

/// Row pass: 1D convolution + horizontal downsample against both filters.
///
/// Returns `(low, high)` intermediates of shape `M × coeff_len(N)`.
pub fn analyze_rows(src: &Image<f32>, filters: &FilterBank) -> (Image<f32>, Image<f32>) {
    let mask = filters.len();
    let n = src.width();
    let m = src.height();
    let c = coeff_len(n, mask);

    let mut out_lo = Image::<f32>::new(c, m);
    let mut out_hi = Image::<f32>::new(c, m);

    for y in 0..m {
        let row = src.row(y);
        for t in 0..c {
            let mut lo = 0.0f32;
            let mut hi = 0.0f32;
            // First sample the window touches; negative near the left edge.
            let base = 2 * t as isize + 2 - mask as isize;
            for j in 0..mask {
                let x = base + j as isize;
                if x >= 0 && (x as usize) < n {
                    let s = row[x as usize];
                    let k = mask - 1 - j; // reversed taps: convolution
                    lo += s * filters.lo()[k];
                    hi += s * filters.hi()[k];
                }
            }
            out_lo.set(t, y, lo);
            out_hi.set(t, y, hi);
        }
    }
    (out_lo, out_hi)
}

/// Column pass: convolve both intermediates down their columns with both
/// filters and downsample by 2 along the height, yielding the four subbands.
pub fn analyze_cols(
    tmp_lo: &Image<f32>,
    tmp_hi: &Image<f32>,
    filters: &FilterBank,
) -> Subbands {
    assert_eq!(tmp_lo.width(), tmp_hi.width());
    assert_eq!(tmp_lo.height(), tmp_hi.height());

    let mask = filters.len();
    let m = tmp_lo.height();
    let c = tmp_lo.width();
    let r = coeff_len(m, mask);

    let mut ca = Image::<f32>::new(c, r);
    let mut ch = Image::<f32>::new(c, r);
    let mut cv = Image::<f32>::new(c, r);
    let mut cd = Image::<f32>::new(c, r);

    for t in 0..r {
        let base = 2 * t as isize + 2 - mask as isize;
        for x in 0..c {
            let mut a = 0.0f32;
            let mut h = 0.0f32;
            let mut v = 0.0f32;
            let mut d = 0.0f32;
            for j in 0..mask {
                let y = base + j as isize;
                if y >= 0 && (y as usize) < m {
                    let s1 = tmp_lo.get(x, y as usize);
                    let s2 = tmp_hi.get(x, y as usize);
                    let k = mask - 1 - j;
                    a += s1 * filters.lo()[k];
                    h += s1 * filters.hi()[k];
                    v += s2 * filters.lo()[k];
                    d += s2 * filters.hi()[k];
                }
            }
            ca.set(x, t, a);
            ch.set(x, t, h);
            cv.set(x, t, v);
            cd.set(x, t, d);
        }
    }

    Subbands { ca, ch, cv, cd }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::coeff_len;

    fn ones(w: usize, h: usize) -> Image<f32> {
        Image::from_vec(w, h, vec![1.0; w * h])
    }

    #[test]
    fn test_shape_law() {
        let fb = FilterBank::cdf97();
        for (m, n) in [(100, 100), (97, 33), (200, 100), (1, 1), (3, 5)] {
            let out = forward(&ones(n, m), &fb);
            let (r, c) = out.shape();
            assert_eq!(r, coeff_len(m, 10), "rows for {m}×{n}");
            assert_eq!(c, coeff_len(n, 10), "cols for {m}×{n}");
            assert_eq!(out.ch.height(), r);
            assert_eq!(out.cv.width(), c);
            assert_eq!(out.cd.height(), r);
        }
    }

    #[test]
    fn test_intermediate_shape() {
        let fb = FilterBank::cdf97();
        let (lo, hi) = analyze_rows(&ones(100, 40), &fb);
        assert_eq!(lo.height(), 40);
        assert_eq!(lo.width(), coeff_len(100, 10));
        assert_eq!(hi.height(), 40);
        assert_eq!(hi.width(), lo.width());
    }

    #[test]
    fn test_zero_input_zero_output() {
        // Zero-padding boundary: an all-zero image must produce exactly
        // zero in all four subbands, not merely small values.
        let fb = FilterBank::cdf97();
        let out = forward(&Image::<f32>::new(64, 48), &fb);
        for band in [&out.ca, &out.ch, &out.cv, &out.cd] {
            for (x, y, v) in band.pixels() {
                assert_eq!(v, 0.0, "nonzero at ({x},{y})");
            }
        }
    }

    #[test]
    fn test_linearity() {
        // Convolution is linear: scaling the input by k scales every
        // subband by k.
        let fb = FilterBank::cdf97();
        let mut rng = 7u32;
        let data: Vec<f32> = (0..48 * 32)
            .map(|_| {
                rng = rng.wrapping_mul(1664525).wrapping_add(1013904223);
                (rng >> 8) as f32 / (1u32 << 24) as f32
            })
            .collect();
        let img = Image::from_vec(48, 32, data.clone());
        let scaled = Image::from_vec(48, 32, data.iter().map(|v| v * 3.5).collect());

        let out1 = forward(&img, &fb);
        let out2 = forward(&scaled, &fb);
        for (b1, b2) in [
            (&out1.ca, &out2.ca),
            (&out1.ch, &out2.ch),
            (&out1.cv, &out2.cv),
            (&out1.cd, &out2.cd),
        ] {
            for ((_, _, v1), (_, _, v2)) in b1.pixels().zip(b2.pixels()) {
                assert!((v1 * 3.5 - v2).abs() < 1e-4, "{v1} vs {v2}");
            }
        }
    }

    #[test]
    fn test_constant_image_interior() {
        // 100×100 of ones → 55×55 subbands. Away from the border the
        // window sees only ones, so cA = Σlo · Σlo = 1 and the detail
        // bands vanish (the analysis high-pass has zero DC response).
        // Border deviations come solely from zero padding.
        let fb = FilterBank::cdf97();
        let out = forward(&ones(100, 100), &fb);
        assert_eq!(out.shape(), (55, 55));

        for y in 5..50 {
            for x in 5..50 {
                assert!(
                    (out.ca.get(x, y) - 1.0).abs() < 1e-5,
                    "cA({x},{y}) = {}",
                    out.ca.get(x, y)
                );
                for (name, band) in [("cH", &out.ch), ("cV", &out.cv), ("cD", &out.cd)] {
                    assert!(
                        band.get(x, y).abs() < 1e-5,
                        "{name}({x},{y}) = {}",
                        band.get(x, y)
                    );
                }
            }
        }
    }

    #[test]
    fn test_degenerate_smaller_than_filter() {
        // M, N below maskwidth still transform; the halo is all padding.
        let fb = FilterBank::cdf97();
        let img = Image::from_vec(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let out = forward(&img, &fb);
        assert_eq!(out.shape(), (6, 6));
        // Finite everywhere; no out-of-bounds reads turned into garbage.
        for (_, _, v) in out.ca.pixels() {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn test_separability_order() {
        // forward() must equal analyze_rows then analyze_cols explicitly.
        let fb = FilterBank::cdf97();
        let data: Vec<f32> = (0..30 * 20).map(|i| (i % 17) as f32).collect();
        let img = Image::from_vec(30, 20, data);
        let direct = forward(&img, &fb);
        let (lo, hi) = analyze_rows(&img, &fb);
        let staged = analyze_cols(&lo, &hi, &fb);
        for (b1, b2) in [
            (&direct.ca, &staged.ca),
            (&direct.ch, &staged.ch),
            (&direct.cv, &staged.cv),
            (&direct.cd, &staged.cd),
        ] {
            for ((_, _, v1), (_, _, v2)) in b1.pixels().zip(b2.pixels()) {
                assert_eq!(v1, v2);
            }
        }
    }
}
