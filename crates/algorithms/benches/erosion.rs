//! Benchmarks for the erosion pipeline and its stages

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use soilflux_algorithms::erosion::{ErosionConfig, ErosionInputs, ErosionPipeline, ModelKind};
use soilflux_algorithms::hydrology::{flow_accumulation, flow_direction, FlowAccumulationParams};
use soilflux_algorithms::terrain::{slope_aspect, SlopeAspectParams};
use soilflux_core::{GeoTransform, Raster};

/// Hill with ridges: a dome plus a periodic pattern so flow paths branch
fn create_hill_dem(size: usize) -> Raster<f64> {
    let mut dem = Raster::new(size, size);
    dem.set_transform(GeoTransform::new(0.0, size as f64 * 10.0, 10.0, -10.0));
    let center = size as f64 / 2.0;
    for row in 0..size {
        for col in 0..size {
            let dx = col as f64 - center;
            let dy = row as f64 - center;
            let dist = (dx * dx + dy * dy).sqrt();
            let ridges = ((row * 7 + col * 13) % 17) as f64 * 0.05;
            dem.set(row, col, 500.0 - dist + ridges).unwrap();
        }
    }
    dem
}

fn bench_flow_accumulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/flow_accumulation");
    for size in [256, 512, 1024] {
        let dem = create_hill_dem(size);
        let fdir = flow_direction(&dem).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                flow_accumulation(black_box(&dem), black_box(&fdir), FlowAccumulationParams::default())
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_slope_aspect(c: &mut Criterion) {
    let mut group = c.benchmark_group("terrain/slope_aspect");
    for size in [256, 512, 1024] {
        let dem = create_hill_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| slope_aspect(black_box(&dem), SlopeAspectParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("erosion/pipeline");
    group.sample_size(20);
    for model in [ModelKind::Rusle3d, ModelKind::Usped] {
        let pipeline = ErosionPipeline::new(ErosionConfig::for_model(model)).unwrap();
        for size in [256, 512] {
            let inputs = ErosionInputs::new(create_hill_dem(size));
            group.bench_with_input(
                BenchmarkId::new(model.to_string(), size),
                &size,
                |b, _| b.iter(|| pipeline.run(black_box(&inputs)).unwrap()),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_flow_accumulation, bench_slope_aspect, bench_pipeline);
criterion_main!(benches);
