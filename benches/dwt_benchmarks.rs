// CPU vs GPU forward transform, plus a BLOCK_WIDTH sweep.
//
// The GPU numbers include upload, both kernels and readback — end-to-end
// latency as a caller sees it, not bare kernel time (the transform reports
// device kernel time separately via DwtOutput::elapsed).
//
// Run with: cargo bench

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use dwt2d::dwt;
use dwt2d::filters::FilterBank;
use dwt2d::geometry::TileConfig;
use dwt2d::gpu::device::GpuDevice;
use dwt2d::gpu::dwt::GpuDwtPipeline;
use dwt2d::image::Image;

fn test_image(w: usize, h: usize) -> Image<f32> {
    let mut seed = 0x2a2a2a2au32;
    let data: Vec<f32> = (0..w * h)
        .map(|_| {
            seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
            (seed >> 8) as f32 / (1u32 << 24) as f32
        })
        .collect();
    Image::from_vec(w, h, data)
}

fn bench_cpu_forward(c: &mut Criterion) {
    let fb = FilterBank::cdf97();
    let mut group = c.benchmark_group("cpu_forward");
    for size in [128usize, 512, 1024] {
        let img = test_image(size, size);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &img, |b, img| {
            b.iter(|| dwt::forward(img, &fb));
        });
    }
    group.finish();
}

fn bench_gpu_forward(c: &mut Criterion) {
    let gpu = match GpuDevice::new() {
        Ok(gpu) => gpu,
        Err(e) => {
            eprintln!("[bench] skipping GPU benchmarks: {e}");
            return;
        }
    };
    let fb = FilterBank::cdf97();

    let mut group = c.benchmark_group("gpu_forward");
    let tile = TileConfig::new(32, 10).expect("valid tile");
    let pipeline = GpuDwtPipeline::new(&gpu, tile).expect("pipeline");
    for size in [128usize, 512, 1024] {
        let img = test_image(size, size);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &img, |b, img| {
            b.iter(|| pipeline.forward(&gpu, img, &fb).expect("transform"));
        });
    }
    group.finish();

    // Block width changes occupancy and halo overhead, never the output.
    let mut sweep = c.benchmark_group("gpu_block_width_sweep");
    let img = test_image(1024, 1024);
    for bw in [16u32, 32, 64] {
        let tile = TileConfig::new(bw, 10).expect("valid tile");
        let pipeline = match GpuDwtPipeline::new(&gpu, tile) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("[bench] skipping BLOCK_WIDTH {bw}: {e}");
                continue;
            }
        };
        sweep.bench_with_input(BenchmarkId::from_parameter(bw), &img, |b, img| {
            b.iter(|| pipeline.forward(&gpu, img, &fb).expect("transform"));
        });
    }
    sweep.finish();
}

criterion_group!(benches, bench_cpu_forward, bench_gpu_forward);
criterion_main!(benches);
