// dwt2d — tiled separable 2D discrete wavelet transform.
//
// One forward DWT level of a single image channel: the image is convolved
// with a fixed low-pass / high-pass filter pair along rows then columns,
// decimated by 2 in each pass, producing four subbands (cA, cH, cV, cD).
//
// The CPU implementation in `dwt` is the authoritative reference. The wgpu
// compute pipeline in `gpu::dwt` mirrors it term-for-term and is validated
// against it elementwise in the GPU integration tests.

pub mod dwt;
pub mod filters;
pub mod geometry;
pub mod image;

pub mod gpu;
