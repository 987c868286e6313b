//! Benchmarks for statistics and normalization

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use foresight_algorithms::normalization::{normalize_raster, plan_normalization, NormalizationParams};
use foresight_algorithms::statistics::{analyze_raster, SelectorParams};
use foresight_core::{CancelFlag, GeoTransform, Raster};

fn create_layer(size: usize) -> Raster<f32> {
    let mut layer = Raster::new(size, size);
    layer.set_transform(GeoTransform::new(-120.0, 45.0, 0.001, -0.001));
    layer.set_nodata(Some(-9999.0));

    // Right-skewed surface so a transformation gets selected
    for row in 0..size {
        for col in 0..size {
            let v = ((row * 7 + col * 13) % 100) as f32 / 25.0;
            layer.set(row, col, v.exp()).unwrap();
        }
    }
    layer
}

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze_raster");

    for size in [256, 512, 1024].iter() {
        let layer = create_layer(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| analyze_raster(black_box(&layer), &SelectorParams::default()).unwrap())
        });
    }

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_raster");
    let cancel = CancelFlag::new();

    for size in [256, 512, 1024, 2048].iter() {
        let layer = create_layer(*size);
        let analysis = analyze_raster(&layer, &SelectorParams::default()).unwrap();
        let plan = plan_normalization(&analysis, &NormalizationParams::default()).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| normalize_raster(black_box(&layer), &plan, 256, -9999.0, &cancel).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_analyze, bench_normalize);
criterion_main!(benches);
