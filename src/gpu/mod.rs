// gpu/mod.rs — wgpu compute layer.
//
// Mirrors the CPU transform in the parent crate. The CPU implementation in
// `dwt` remains the authoritative reference; the tiled pipeline here is
// validated against it elementwise.
//
// Execution model: a grid of independent BLOCK_WIDTH × BLOCK_WIDTH
// workgroups per kernel. Threads within a workgroup synchronize exactly
// once (after the cooperative shared-tile load); workgroups never
// communicate. The row pass and column pass are recorded in one command
// buffer on one queue, so the row-pass output is fully visible in global
// memory before any column-pass thread reads it.

pub mod device;
pub mod dwt;
