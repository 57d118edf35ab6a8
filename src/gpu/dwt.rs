// gpu/dwt.rs — tiled separable forward DWT on the GPU.
//
// Two compute kernels in strict sequence on one queue:
//
//   row_pass (dwt_row.wgsl)  : input (M×N) → tmp_lo, tmp_hi (M×C)
//   col_pass (dwt_col.wgsl)  : tmp_lo, tmp_hi → cA, cH, cV, cD (R×C)
//
// with C = coeff_len(N) and R = coeff_len(M). The intermediates live only
// inside `forward()`; the caller owns the four subbands on return.
//
// SHADER SPECIALIZATION
// ──────────────────────
// The kernels are compiled once per (maskwidth, block_width) pair — the
// tile constants are baked into the WGSL source via {{TOKEN}} substitution
// because the shared tiles must be compile-time sized. Image dimensions
// are runtime values in the params uniform, so one pipeline serves every
// image shape without recompilation.
//
// TIMING
// ───────
// Elapsed time spans both kernels. With TIMESTAMP_QUERY it comes from a
// query written at the start of the row pass and the end of the column
// pass, scaled by the queue's timestamp period — pure device execution
// time, excluding transfers. Without the feature, `elapsed` is host wall
// time from submit to queue idle and `device_timed` is false.

use std::time::{Duration, Instant};

use wgpu::util::DeviceExt;

use crate::dwt::Subbands;
use crate::filters::FilterBank;
use crate::geometry::{coeff_len, TileConfig};
use crate::gpu::device::{GpuDevice, GpuError};
use crate::image::Image;

// ---------------------------------------------------------------------------
// Params uniform (must match DwtParams in both WGSL files exactly)
// ---------------------------------------------------------------------------

/// Shared uniform for both passes.
///
/// Layout must match `DwtParams` in dwt_row.wgsl / dwt_col.wgsl:
///   offset  0: rows, cols, cols_half, rows_half (4 × u32)
///   offset 16: filter_lo (3 × vec4<f32>)
///   offset 64: filter_hi (3 × vec4<f32>)
///   total: 112 bytes
///
/// Filter taps ride in the uniform rather than a storage buffer: uniform
/// reads broadcast to all threads (the constant-memory path), and it keeps
/// the column pass within the 8-storage-buffer default limit.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct DwtParams {
    rows: u32,
    cols: u32,
    cols_half: u32,
    rows_half: u32,
    /// filter_lo[i/4][i%4] = tap i. WGSL uniform arrays have 16-byte
    /// stride, hence the vec4 packing; 3 × 4 slots cap maskwidth at 12.
    filter_lo: [[f32; 4]; 3],
    filter_hi: [[f32; 4]; 3],
}

impl DwtParams {
    fn new(rows: u32, cols: u32, cols_half: u32, rows_half: u32, filters: &FilterBank) -> Self {
        DwtParams {
            rows,
            cols,
            cols_half,
            rows_half,
            filter_lo: pack_taps(filters.lo()),
            filter_hi: pack_taps(filters.hi()),
        }
    }
}

/// Pack up to 12 taps into the vec4-strided uniform layout, zero-filling
/// the tail. Callers validate the length beforehand (TileConfig caps
/// maskwidth at 12).
fn pack_taps(taps: &[f32]) -> [[f32; 4]; 3] {
    debug_assert!(taps.len() <= 12);
    let mut packed = [[0.0f32; 4]; 3];
    for (i, &t) in taps.iter().enumerate() {
        packed[i / 4][i % 4] = t;
    }
    packed
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Result of one GPU transform: the four subbands plus the elapsed time
/// spanning both kernel executions.
#[derive(Debug)]
pub struct DwtOutput {
    pub subbands: Subbands,
    /// Time spanning both kernels. Device timestamps when available,
    /// host wall time otherwise (see `device_timed`).
    pub elapsed: Duration,
    /// True when `elapsed` came from GPU timestamp queries.
    pub device_timed: bool,
}

// ---------------------------------------------------------------------------
// GpuDwtPipeline
// ---------------------------------------------------------------------------

/// Compiled pipeline pair for one `(block_width, maskwidth)` tile geometry.
///
/// Create once per geometry; call [`forward`](Self::forward) per image.
/// Shader compilation happens here, not per transform.
pub struct GpuDwtPipeline {
    row_pipeline: wgpu::ComputePipeline,
    col_pipeline: wgpu::ComputePipeline,
    row_bgl: wgpu::BindGroupLayout,
    col_bgl: wgpu::BindGroupLayout,
    tile: TileConfig,
}

impl GpuDwtPipeline {
    /// Compile both kernels specialized for `tile`.
    ///
    /// # Errors
    /// Rejects tile geometry the device cannot host: more invocations per
    /// workgroup than the granted limits, or shared tiles exceeding the
    /// workgroup storage budget (the column pass stages two tiles).
    pub fn new(gpu: &GpuDevice, tile: TileConfig) -> Result<Self, GpuError> {
        let bw = tile.block_width();

        let invocations = bw * bw;
        let max_invocations = gpu.limits.max_compute_invocations_per_workgroup;
        if invocations > max_invocations
            || bw > gpu.limits.max_compute_workgroup_size_x
            || bw > gpu.limits.max_compute_workgroup_size_y
        {
            return Err(GpuError::WorkgroupTooLarge {
                required: invocations,
                max: max_invocations,
            });
        }

        // f32 tiles: one in the row pass, two in the column pass.
        let storage_bytes = 2 * bw * bw * 4;
        if storage_bytes > gpu.limits.max_compute_workgroup_storage_size {
            return Err(GpuError::WorkgroupStorageTooLarge {
                required: storage_bytes,
                max: gpu.limits.max_compute_workgroup_storage_size,
            });
        }

        let row_shader = compile_shader(
            gpu,
            include_str!("../shaders/dwt_row.wgsl"),
            "dwt_row.wgsl",
            &tile,
        );
        let col_shader = compile_shader(
            gpu,
            include_str!("../shaders/dwt_col.wgsl"),
            "dwt_col.wgsl",
            &tile,
        );

        // Row pass @group(0): input (read), tmp_lo, tmp_hi (read_write),
        // params (uniform).
        let row_bgl = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("dwt row BGL"),
                entries: &[
                    storage_entry(0, true),
                    storage_entry(1, false),
                    storage_entry(2, false),
                    uniform_entry(3),
                ],
            });

        // Column pass @group(0): tmp_lo, tmp_hi (read), four subbands
        // (read_write), params (uniform).
        let col_bgl = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("dwt col BGL"),
                entries: &[
                    storage_entry(0, true),
                    storage_entry(1, true),
                    storage_entry(2, false),
                    storage_entry(3, false),
                    storage_entry(4, false),
                    storage_entry(5, false),
                    uniform_entry(6),
                ],
            });

        let row_layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("dwt row pipeline layout"),
                bind_group_layouts: &[&row_bgl],
                push_constant_ranges: &[],
            });
        let col_layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("dwt col pipeline layout"),
                bind_group_layouts: &[&col_bgl],
                push_constant_ranges: &[],
            });

        let row_pipeline = gpu
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("row_pass"),
                layout: Some(&row_layout),
                module: &row_shader,
                entry_point: "row_pass",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
        let col_pipeline = gpu
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("col_pass"),
                layout: Some(&col_layout),
                module: &col_shader,
                entry_point: "col_pass",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        Ok(GpuDwtPipeline {
            row_pipeline,
            col_pipeline,
            row_bgl,
            col_bgl,
            tile,
        })
    }

    /// The tile geometry this pipeline was specialized for.
    pub fn tile(&self) -> TileConfig {
        self.tile
    }

    /// Transform one channel: upload, run both kernels in order, read the
    /// four subbands back.
    ///
    /// # Errors
    /// Returns [`GpuError::FilterLength`] if the bank's length disagrees
    /// with the maskwidth baked into the shaders. No partial results: any
    /// failure aborts the whole transform.
    pub fn forward(
        &self,
        gpu: &GpuDevice,
        src: &Image<f32>,
        filters: &FilterBank,
    ) -> Result<DwtOutput, GpuError> {
        let mask = self.tile.maskwidth();
        if filters.len() != mask as usize {
            return Err(GpuError::FilterLength {
                expected: mask,
                got: filters.len(),
            });
        }

        let m = src.height();
        let n = src.width();
        let c = coeff_len(n, mask as usize);
        let r = coeff_len(m, mask as usize);

        let tmp_bytes = (m * c * 4) as u64;
        let band_bytes = (r * c * 4) as u64;

        // --- Buffers -------------------------------------------------------
        let input_buf = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("dwt input"),
                contents: bytemuck::cast_slice(src.as_slice()),
                usage: wgpu::BufferUsages::STORAGE,
            });

        // wgpu zero-initializes; every element the column pass reads is
        // written by the row pass anyway (the grids cover M × C exactly).
        let tmp_lo = storage_buffer(gpu, "dwt tmp_lo", tmp_bytes);
        let tmp_hi = storage_buffer(gpu, "dwt tmp_hi", tmp_bytes);

        let bands: Vec<wgpu::Buffer> = ["dwt cA", "dwt cH", "dwt cV", "dwt cD"]
            .iter()
            .map(|label| {
                gpu.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(label),
                    size: band_bytes,
                    usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                    mapped_at_creation: false,
                })
            })
            .collect();

        let params = DwtParams::new(m as u32, n as u32, c as u32, r as u32, filters);
        let params_buf = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("dwt params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let readback = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("dwt readback"),
            size: 4 * band_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // --- Bind groups ---------------------------------------------------
        let row_bind = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("dwt row bind group"),
            layout: &self.row_bgl,
            entries: &[
                bind(0, &input_buf),
                bind(1, &tmp_lo),
                bind(2, &tmp_hi),
                bind(3, &params_buf),
            ],
        });
        let col_bind = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("dwt col bind group"),
            layout: &self.col_bgl,
            entries: &[
                bind(0, &tmp_lo),
                bind(1, &tmp_hi),
                bind(2, &bands[0]),
                bind(3, &bands[1]),
                bind(4, &bands[2]),
                bind(5, &bands[3]),
                bind(6, &params_buf),
            ],
        });

        // --- Timestamp queries (device timing spanning both passes) --------
        let timing = gpu.supports_timestamps.then(|| {
            let query_set = gpu.device.create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("dwt timestamps"),
                ty: wgpu::QueryType::Timestamp,
                count: 2,
            });
            let resolve = gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("dwt ts resolve"),
                size: 16,
                usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            });
            let rb = gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("dwt ts readback"),
                size: 16,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            (query_set, resolve, rb)
        });

        // --- Record both passes in one command buffer ----------------------
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("dwt forward"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("row_pass"),
                timestamp_writes: timing.as_ref().map(|(qs, _, _)| {
                    wgpu::ComputePassTimestampWrites {
                        query_set: qs,
                        beginning_of_pass_write_index: Some(0),
                        end_of_pass_write_index: None,
                    }
                }),
            });
            pass.set_pipeline(&self.row_pipeline);
            pass.set_bind_group(0, &row_bind, &[]);
            let (gx, gy) = self.tile.row_pass_grid(m, c);
            pass.dispatch_workgroups(gx, gy, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("col_pass"),
                timestamp_writes: timing.as_ref().map(|(qs, _, _)| {
                    wgpu::ComputePassTimestampWrites {
                        query_set: qs,
                        beginning_of_pass_write_index: None,
                        end_of_pass_write_index: Some(1),
                    }
                }),
            });
            pass.set_pipeline(&self.col_pipeline);
            pass.set_bind_group(0, &col_bind, &[]);
            let (gx, gy) = self.tile.col_pass_grid(r, c);
            pass.dispatch_workgroups(gx, gy, 1);
        }

        for (i, band) in bands.iter().enumerate() {
            encoder.copy_buffer_to_buffer(band, 0, &readback, i as u64 * band_bytes, band_bytes);
        }
        if let Some((qs, resolve, rb)) = &timing {
            encoder.resolve_query_set(qs, 0..2, resolve, 0);
            encoder.copy_buffer_to_buffer(resolve, 0, rb, 0, 16);
        }

        let wall_start = Instant::now();
        gpu.queue.submit(std::iter::once(encoder.finish()));
        gpu.device.poll(wgpu::Maintain::Wait);
        let wall_elapsed = wall_start.elapsed();

        // --- Readback ------------------------------------------------------
        let flat = map_read_f32(gpu, &readback);
        let per_band = r * c;
        let mut it = flat.chunks_exact(per_band);
        let mut next_band = || Image::from_vec(c, r, it.next().expect("four bands").to_vec());
        let subbands = Subbands {
            ca: next_band(),
            ch: next_band(),
            cv: next_band(),
            cd: next_band(),
        };

        let (elapsed, device_timed) = match &timing {
            Some((_, _, rb)) => {
                let ticks = map_read_u64(gpu, rb);
                let period = gpu.queue.get_timestamp_period() as f64;
                let nanos = (ticks[1].saturating_sub(ticks[0])) as f64 * period;
                (Duration::from_nanos(nanos as u64), true)
            }
            None => (wall_elapsed, false),
        };

        Ok(DwtOutput {
            subbands,
            elapsed,
            device_timed,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Bake the tile constants into a WGSL template and compile it.
fn compile_shader(
    gpu: &GpuDevice,
    template: &str,
    label: &str,
    tile: &TileConfig,
) -> wgpu::ShaderModule {
    let bw = tile.block_width();
    let src = template
        .replace("{{BLOCK_WIDTH}}", &bw.to_string())
        .replace("{{O_TILE_WIDTH}}", &tile.o_tile_width().to_string())
        .replace("{{MASKWIDTH}}", &tile.maskwidth().to_string())
        .replace("{{TILE_LEN}}", &(bw * bw).to_string());
    gpu.device
        .create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(src.into()),
        })
}

fn storage_buffer(gpu: &GpuDevice, label: &str, size: u64) -> wgpu::Buffer {
    gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::STORAGE,
        mapped_at_creation: false,
    })
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bind<'a>(binding: u32, buf: &'a wgpu::Buffer) -> wgpu::BindGroupEntry<'a> {
    wgpu::BindGroupEntry {
        binding,
        resource: buf.as_entire_binding(),
    }
}

/// Map a MAP_READ buffer and copy its contents out as f32.
///
/// Synchronous — stalls until the GPU queue is idle.
fn map_read_f32(gpu: &GpuDevice, buf: &wgpu::Buffer) -> Vec<f32> {
    let slice = buf.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |r| {
        tx.send(r).expect("readback channel closed");
    });
    gpu.device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .expect("readback callback never fired")
        .expect("readback map failed");
    let mapped = slice.get_mapped_range();
    let out: Vec<f32> = bytemuck::cast_slice(&mapped).to_vec();
    drop(mapped);
    buf.unmap();
    out
}

/// Map a MAP_READ buffer holding u64 timestamp ticks.
fn map_read_u64(gpu: &GpuDevice, buf: &wgpu::Buffer) -> Vec<u64> {
    let slice = buf.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |r| {
        tx.send(r).expect("readback channel closed");
    });
    gpu.device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .expect("readback callback never fired")
        .expect("readback map failed");
    let mapped = slice.get_mapped_range();
    let out: Vec<u64> = bytemuck::cast_slice(&mapped).to_vec();
    drop(mapped);
    buf.unmap();
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
