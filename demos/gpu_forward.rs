// One forward DWT level on the GPU, checked against the CPU reference.
//
// Run with: cargo run --example gpu_forward --release

use std::process::ExitCode;

use dwt2d::dwt;
use dwt2d::filters::FilterBank;
use dwt2d::geometry::TileConfig;
use dwt2d::gpu::device::GpuDevice;
use dwt2d::gpu::dwt::GpuDwtPipeline;
use dwt2d::image::Image;

const WIDTH: usize = 640;
const HEIGHT: usize = 480;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[gpu_forward] error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let gpu = GpuDevice::new()?;
    println!("{gpu}");

    let tile = TileConfig::new(32, 10)?;
    let pipeline = GpuDwtPipeline::new(&gpu, tile)?;
    let filters = FilterBank::cdf97();

    // Synthetic test pattern: a smooth gradient with a superimposed grid.
    // The gradient lands in cA, the grid lines light up cH and cV.
    let mut img = Image::<f32>::new(WIDTH, HEIGHT);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let gradient = (x + y) as f32 / (WIDTH + HEIGHT) as f32;
            let grid = if x % 32 == 0 || y % 32 == 0 { 0.5 } else { 0.0 };
            img.set(x, y, gradient + grid);
        }
    }

    let out = pipeline.forward(&gpu, &img, &filters)?;
    let (r, c) = out.subbands.shape();
    println!(
        "{WIDTH}x{HEIGHT} -> 4 x {c}x{r} subbands in {:?} ({})",
        out.elapsed,
        if out.device_timed { "device timestamps" } else { "wall clock" },
    );

    for (name, band) in [
        ("cA", &out.subbands.ca),
        ("cH", &out.subbands.ch),
        ("cV", &out.subbands.cv),
        ("cD", &out.subbands.cd),
    ] {
        let energy: f64 = band.pixels().map(|(_, _, v)| (v as f64) * (v as f64)).sum();
        println!("  {name}: energy {energy:.3}");
    }

    // Cross-check against the CPU reference.
    let cpu = dwt::forward(&img, &filters);
    let mut max_err = 0.0f32;
    for (g, c) in [
        (&out.subbands.ca, &cpu.ca),
        (&out.subbands.ch, &cpu.ch),
        (&out.subbands.cv, &cpu.cv),
        (&out.subbands.cd, &cpu.cd),
    ] {
        for ((_, _, gv), (_, _, cv)) in g.pixels().zip(c.pixels()) {
            max_err = max_err.max((gv - cv).abs());
        }
    }
    println!("max |GPU - CPU| = {max_err:.2e}");
    if max_err > 5e-7 {
        return Err(format!("GPU/CPU mismatch: {max_err:.2e}").into());
    }
    Ok(())
}
