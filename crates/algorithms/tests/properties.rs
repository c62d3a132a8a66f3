//! Invariants that hold for any DEM, checked on synthetic surfaces.

use std::f64::consts::{FRAC_PI_2, TAU};

use approx::assert_relative_eq;
use soilflux_algorithms::erosion::{
    ErosionConfig, ErosionInputs, ErosionPipeline, FactorInput, ModelKind, RFactorSource,
};
use soilflux_algorithms::hydrology::{
    flow_accumulation, flow_direction, FlowAccumulationParams, FlowWeighting,
};
use soilflux_algorithms::terrain::{slope_aspect, SlopeAspectParams};
use soilflux_core::raster::d8;
use soilflux_core::{EdgeMode, GeoTransform, Raster};

fn build(rows: usize, cols: usize, cell: f64, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
    let mut dem = Raster::new(rows, cols);
    dem.set_transform(GeoTransform::new(0.0, rows as f64 * cell, cell, -cell));
    dem.set_nodata(Some(-9999.0));
    for row in 0..rows {
        for col in 0..cols {
            dem.set(row, col, f(row, col)).unwrap();
        }
    }
    dem
}

/// Rough terrain with a general tilt, repeated values and a couple of holes
fn rough_dem() -> Raster<f64> {
    let mut dem = build(24, 31, 5.0, |row, col| {
        let noise = ((row * 7919 + col * 104_729) % 97) as f64 / 10.0;
        100.0 - row as f64 * 0.8 - col as f64 * 0.3 + noise
    });
    dem.set(5, 7, -9999.0).unwrap();
    dem.set(17, 20, -9999.0).unwrap();
    dem.set(0, 30, -9999.0).unwrap();
    dem
}

/// Smooth, nowhere-flat, asymmetric surface on a square grid
fn smooth_dem(n: usize) -> Raster<f64> {
    build(n, n, 2.0, |row, col| {
        let (x, y) = (col as f64, row as f64);
        0.3 * x * x + 0.1 * x * y - 0.7 * y + 0.05 * y * y * y + 3.0 * x
    })
}

/// Rotate 90° clockwise: `new[r][c] = old[n - 1 - c][r]`
fn rotate_cw(dem: &Raster<f64>) -> Raster<f64> {
    let n = dem.rows();
    build(n, n, dem.cell_size(), |r, c| dem.get(n - 1 - c, r).unwrap())
}

#[test]
fn accumulation_is_at_least_own_weight() {
    let dem = rough_dem();
    let fdir = flow_direction(&dem).unwrap();
    for weighting in [FlowWeighting::CellCount, FlowWeighting::CellArea] {
        let acc = flow_accumulation(&dem, &fdir, FlowAccumulationParams { weighting }).unwrap();
        let own = weighting.cell_weight(dem.cell_size());
        dem.for_each_cell(|row, col, z| {
            let a = acc.get(row, col).unwrap();
            if dem.is_nodata(z) {
                assert!(a.is_nan());
            } else {
                assert!(a >= own, "({row}, {col}): {a} < {own}");
            }
        });
    }
}

#[test]
fn outlets_collect_every_valid_cell() {
    let dem = rough_dem();
    let fdir = flow_direction(&dem).unwrap();
    let acc = flow_accumulation(&dem, &fdir, FlowAccumulationParams::default()).unwrap();

    let mut outlet_total = 0.0;
    fdir.for_each_cell(|row, col, dir| {
        if dir == d8::NO_FLOW {
            outlet_total += acc.get(row, col).unwrap();
        }
    });
    assert_eq!(outlet_total, dem.valid_count() as f64);
}

#[test]
fn directions_never_leave_the_grid_or_enter_nodata() {
    let dem = rough_dem();
    let (rows, cols) = dem.shape();
    let fdir = flow_direction(&dem).unwrap();
    fdir.for_each_cell(|row, col, dir| {
        if !d8::is_flow(dir) {
            return;
        }
        let (nr, nc) = d8::receiver(row, col, dir, rows, cols).expect("points inside the grid");
        assert!(!dem.is_nodata_at(nr, nc).unwrap());
        assert!(dem.get(nr, nc).unwrap() < dem.get(row, col).unwrap());
    });
}

#[test]
fn flow_direction_is_deterministic() {
    // Terraces of equal elevation produce many exact ties
    let dem = build(20, 20, 1.0, |row, col| ((row / 3) + (col / 4)) as f64 * -1.0);
    let first = flow_direction(&dem).unwrap();
    for _ in 0..10 {
        assert_eq!(flow_direction(&dem).unwrap().data(), first.data());
    }
}

#[test]
fn slope_invariant_and_aspect_rotates_under_rotation() {
    let dem = smooth_dem(11);
    let rotated = rotate_cw(&dem);
    let n = dem.rows();

    let params = SlopeAspectParams::default();
    let before = slope_aspect(&dem, params.clone()).unwrap();
    let after = slope_aspect(&rotated, params).unwrap();

    for r in 0..n {
        for c in 0..n {
            let (or, oc) = (n - 1 - c, r);
            assert_relative_eq!(
                after.slope.get(r, c).unwrap(),
                before.slope.get(or, oc).unwrap(),
                epsilon = 1e-9
            );

            let expected = (before.aspect.get(or, oc).unwrap() - FRAC_PI_2).rem_euclid(TAU);
            let got = after.aspect.get(r, c).unwrap();
            let diff = (got - expected).rem_euclid(TAU);
            assert!(
                diff < 1e-9 || TAU - diff < 1e-9,
                "({r}, {c}): aspect {got} vs expected {expected}"
            );
        }
    }
}

#[test]
fn rusle_erosion_is_non_negative() {
    let dem = rough_dem();
    let k = build(24, 31, 5.0, |row, col| ((row + 2 * col) % 5) as f64 * 0.1);
    let c = build(24, 31, 5.0, |row, _| 0.05 + row as f64 * 0.01);
    let inputs = ErosionInputs::new(dem)
        .with_r(RFactorSource::Event {
            intensity: FactorInput::Constant(35.0),
            duration: 20.0,
        })
        .with_k(k)
        .with_c(c);

    let out = ErosionPipeline::new(ErosionConfig::default())
        .unwrap()
        .run(&inputs)
        .unwrap();
    out.result.erosion.for_each_cell(|row, col, v| {
        assert!(v.is_nan() || v >= 0.0, "({row}, {col}): {v}");
    });
}

#[test]
fn nodata_propagates_to_every_layer() {
    let dem = rough_dem();
    for model in [ModelKind::Rusle3d, ModelKind::Usped] {
        for edge in [EdgeMode::Reduced, EdgeMode::NoData] {
            let config = ErosionConfig {
                edge,
                ..ErosionConfig::for_model(model)
            };
            let out = ErosionPipeline::new(config)
                .unwrap()
                .run(&ErosionInputs::new(dem.clone()))
                .unwrap();

            for (row, col) in [(5, 7), (17, 20), (0, 30)] {
                assert_eq!(out.flow_direction.get(row, col).unwrap(), d8::NODATA);
                assert!(out.flow_accumulation.get(row, col).unwrap().is_nan());
                assert!(out.slope.get(row, col).unwrap().is_nan());
                assert!(out.aspect.get(row, col).unwrap().is_nan());
                assert!(out.result.erosion.get(row, col).unwrap().is_nan());
                assert_eq!(out.result.change_class.value(row, col).unwrap(), None);
                if let Some(dep) = &out.result.deposition {
                    assert!(dep.get(row, col).unwrap().is_nan());
                }
                if let Some(net) = &out.result.net_change {
                    assert!(net.get(row, col).unwrap().is_nan());
                }
            }
        }
    }
}

#[test]
fn wide_flat_wavefront_matches_a_downstream_walk() {
    // 70x70 basin floor at z = 0 (one wavefront of 4900 cells) inside an
    // apron rising one metre per ring towards the south-east edges
    let n = 80;
    let dem = build(n, n, 1.0, |row, col| row.max(col).saturating_sub(69) as f64);
    let fdir = flow_direction(&dem).unwrap();
    let acc = flow_accumulation(&dem, &fdir, FlowAccumulationParams::default()).unwrap();

    // every cell adds its weight to itself and to each cell downstream
    let mut expected = vec![0.0; n * n];
    for start in 0..n * n {
        let (mut row, mut col) = (start / n, start % n);
        loop {
            expected[row * n + col] += 1.0;
            let dir = fdir.get(row, col).unwrap();
            if !d8::is_flow(dir) {
                break;
            }
            (row, col) = d8::receiver(row, col, dir, n, n).unwrap();
        }
    }

    let mut outlet_total = 0.0;
    for row in 0..n {
        for col in 0..n {
            assert_eq!(acc.get(row, col).unwrap(), expected[row * n + col], "({row}, {col})");
            if fdir.get(row, col).unwrap() == d8::NO_FLOW {
                outlet_total += acc.get(row, col).unwrap();
            }
        }
    }
    assert_eq!(outlet_total, (n * n) as f64);
    // the floor collects the apron
    assert!(acc.get(69, 69).unwrap() > 1.0);
}
