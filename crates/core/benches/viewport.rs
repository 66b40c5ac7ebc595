use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use retro_core::types::GameGeometry;
use retro_core::{compute_viewport, ScalingPolicy};

fn nes_geometry() -> GameGeometry {
    GameGeometry {
        base_width: 256,
        base_height: 240,
        max_width: 256,
        max_height: 240,
        aspect_ratio: 4.0 / 3.0,
    }
}

fn bench_single_viewport(c: &mut Criterion) {
    let mut group = c.benchmark_group("viewport_single");
    let geometry = nes_geometry();

    for policy in ScalingPolicy::ALL.iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(policy.name()),
            policy,
            |b, &policy| {
                b.iter(|| black_box(compute_viewport(&geometry, 1920, 1080, policy)));
            },
        );
    }

    group.finish();
}

fn bench_resize_sweep(c: &mut Criterion) {
    // Simulates a window being dragged through many sizes.
    c.bench_function("viewport_resize_sweep", |b| {
        let geometry = nes_geometry();
        b.iter(|| {
            let mut area = 0u64;
            for w in (200..2000).step_by(7) {
                let vp = compute_viewport(&geometry, w, w * 9 / 16, ScalingPolicy::PixelPerfect);
                area += vp.width as u64 * vp.height as u64;
            }
            black_box(area);
        });
    });
}

criterion_group!(benches, bench_single_viewport, bench_resize_sweep);
criterion_main!(benches);
