// geometry.rs — Dimension and tile/grid math for the two-pass transform.
//
// Everything here is a pure function of the image shape, the filter length
// and the block width. The orchestrator computes these once, validates
// them, and only then touches the device. Launch geometry is always
// derived from the already-fixed output shapes, never the other way
// around.
//
// TILE SIZING
// ────────────
// Each workgroup is BLOCK_WIDTH × BLOCK_WIDTH threads and produces an
// output tile O_TILE_WIDTH wide along the downsampled axis, where
//
//     O_TILE_WIDTH = (BLOCK_WIDTH - maskwidth) / 2 + 1
//
// This is chosen so the shared-memory span needed for one output tile,
// 2·(O_TILE_WIDTH − 1) + maskwidth input samples, is exactly BLOCK_WIDTH:
// every thread in the block loads exactly one sample and none sit idle
// during the cooperative load.

use std::fmt;

/// Length of a downsampled coefficient axis: `ceil((n + maskwidth - 1) / 2)`.
///
/// This single law fixes every output and intermediate dimension:
/// intermediates are `M × coeff_len(N)`, subbands are
/// `coeff_len(M) × coeff_len(N)`. It holds for degenerate axes too
/// (`n < maskwidth` still yields a small valid shape).
#[inline]
pub fn coeff_len(n: usize, maskwidth: usize) -> usize {
    (n + maskwidth) / 2
}

/// Validated tile geometry for one `(block_width, maskwidth)` pair.
///
/// Construct via [`TileConfig::new`]; a constructed value satisfies
/// `o_tile_width >= 1` and `2*(o_tile_width - 1) + maskwidth == block_width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileConfig {
    block_width: u32,
    maskwidth: u32,
}

impl TileConfig {
    /// Largest filter length the GPU pipeline supports: taps are packed
    /// into three `vec4<f32>` uniform slots per filter (see `gpu::dwt`).
    pub const MAX_MASKWIDTH: u32 = 12;

    /// Validate a block width against a filter length.
    ///
    /// Requirements:
    /// - `2 <= maskwidth <= 12`
    /// - `block_width > maskwidth` (so the output tile is non-empty)
    /// - `block_width - maskwidth` even (so the tile width is integral)
    pub fn new(block_width: u32, maskwidth: u32) -> Result<Self, TileError> {
        if maskwidth < 2 || maskwidth > Self::MAX_MASKWIDTH {
            return Err(TileError::UnsupportedMaskwidth { maskwidth });
        }
        if block_width <= maskwidth {
            return Err(TileError::BlockTooSmall {
                block_width,
                maskwidth,
            });
        }
        if (block_width - maskwidth) % 2 != 0 {
            return Err(TileError::OddTileSpan {
                block_width,
                maskwidth,
            });
        }
        Ok(TileConfig {
            block_width,
            maskwidth,
        })
    }

    #[inline]
    pub fn block_width(&self) -> u32 {
        self.block_width
    }

    #[inline]
    pub fn maskwidth(&self) -> u32 {
        self.maskwidth
    }

    /// Output-tile width along the downsampled axis.
    #[inline]
    pub fn o_tile_width(&self) -> u32 {
        (self.block_width - self.maskwidth) / 2 + 1
    }

    /// Workgroups for the row pass: the grid tiles the intermediate shape
    /// `M × C`, O_TILE_WIDTH output columns and BLOCK_WIDTH rows per group.
    pub fn row_pass_grid(&self, rows: usize, cols_half: usize) -> (u32, u32) {
        (
            div_ceil(cols_half as u32, self.o_tile_width()),
            div_ceil(rows as u32, self.block_width),
        )
    }

    /// Workgroups for the column pass: the grid tiles the subband shape
    /// `R × C`, BLOCK_WIDTH columns and O_TILE_WIDTH output rows per group.
    pub fn col_pass_grid(&self, rows_half: usize, cols_half: usize) -> (u32, u32) {
        (
            div_ceil(cols_half as u32, self.block_width),
            div_ceil(rows_half as u32, self.o_tile_width()),
        )
    }
}

#[inline]
fn div_ceil(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

/// Errors from tile geometry validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileError {
    /// `block_width <= maskwidth` leaves no room for an output tile.
    BlockTooSmall { block_width: u32, maskwidth: u32 },
    /// `block_width - maskwidth` must be even for an integral tile width.
    OddTileSpan { block_width: u32, maskwidth: u32 },
    /// Filter length outside the supported range.
    UnsupportedMaskwidth { maskwidth: u32 },
}

impl fmt::Display for TileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileError::BlockTooSmall {
                block_width,
                maskwidth,
            } => write!(
                f,
                "block width {block_width} must exceed filter length {maskwidth}"
            ),
            TileError::OddTileSpan {
                block_width,
                maskwidth,
            } => write!(
                f,
                "block width {block_width} minus filter length {maskwidth} must be even"
            ),
            TileError::UnsupportedMaskwidth { maskwidth } => write!(
                f,
                "filter length {maskwidth} outside supported range 2..={}",
                TileConfig::MAX_MASKWIDTH
            ),
        }
    }
}

impl std::error::Error for TileError {}
