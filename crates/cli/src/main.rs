//! SoilFlux CLI - soil erosion and deposition modelling on DEM rasters

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use soilflux_algorithms::erosion::{
    event_r_factor, event_r_factor_raster, ErosionConfig, ErosionFactors, ErosionInputs,
    ErosionOutputs, ErosionPipeline, FactorInput, ModelKind, OutputUnits, RFactorSource,
};
use soilflux_algorithms::hydrology::{
    fill_depressions, flow_accumulation, flow_direction, DepressionHandling,
    FlowAccumulationParams, FillParams, FlowWeighting,
};
use soilflux_algorithms::terrain::{
    aspect, slope, AspectConvention, AspectParams, AspectUnits, SlopeParams, SlopeUnits,
};
use soilflux_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use soilflux_core::{EdgeMode, Raster, RasterElement};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "soilflux")]
#[command(author, version, about = "Soil erosion and deposition modelling (RUSLE3D / USPED)", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Run an erosion model and write every layer into a directory
    Erosion(ErosionArgs),
    /// Hydrology algorithms
    Hydrology {
        #[command(subcommand)]
        algorithm: HydrologyCommands,
    },
    /// Terrain analysis algorithms
    Terrain {
        #[command(subcommand)]
        algorithm: TerrainCommands,
    },
    /// Event-based rainfall erosivity (R factor)
    Rfactor {
        /// Rainfall intensity in mm/h: a number or a raster file
        #[arg(short, long, default_value = "50")]
        intensity: String,
        /// Storm duration in minutes
        #[arg(short, long, default_value = "5")]
        duration: f64,
        /// Output file, required when the intensity is a raster
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct ErosionArgs {
    /// Input DEM file
    dem: PathBuf,
    /// Output directory
    output_dir: PathBuf,
    /// TOML file with model settings; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Model: rusle3d (alias rusle) or usped
    #[arg(short, long)]
    model: Option<String>,
    /// Upslope area exponent (model default when omitted)
    #[arg(long)]
    m: Option<f64>,
    /// Slope exponent (model default when omitted)
    #[arg(long)]
    n: Option<f64>,
    /// Rainfall erosivity R: a number or a raster file
    #[arg(short, long, conflicts_with = "rain_intensity")]
    r_factor: Option<String>,
    /// Soil erodibility K: a number or a raster file
    #[arg(short, long, default_value = "0.25")]
    k_factor: String,
    /// Cover management C: a number or a raster file
    #[arg(short = 'C', long, default_value = "0.1")]
    c_factor: String,
    /// Derive R from a storm of this intensity (mm/h): a number or a raster file
    #[arg(long, requires = "rain_duration")]
    rain_intensity: Option<String>,
    /// Storm duration in minutes
    #[arg(long, requires = "rain_intensity")]
    rain_duration: Option<f64>,
    /// Flow accumulation weighting: count or area
    #[arg(long)]
    weighting: Option<String>,
    /// Edge handling for 3x3 windows: reduced or nodata
    #[arg(long)]
    edge: Option<String>,
    /// Fill depressions before routing, with this minimum gradient
    #[arg(long)]
    fill: Option<f64>,
    /// Output units: kg-m2 or t-ha
    #[arg(short, long)]
    units: Option<String>,
    /// Net change magnitude classified as stable
    #[arg(long)]
    stable_threshold: Option<f64>,
}

// ─── Hydrology subcommands ──────────────────────────────────────────────

#[derive(Subcommand)]
enum HydrologyCommands {
    /// Fill depressions in a DEM (Priority-Flood, Barnes 2014)
    Fill {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Minimum elevation step across filled areas
        #[arg(long, default_value = "0.00001")]
        epsilon: f64,
    },
    /// D8 flow direction from DEM
    FlowDirection {
        /// Input DEM file
        input: PathBuf,
        /// Output file (D8 codes 1-8 counter-clockwise from east, 0 = sink)
        output: PathBuf,
    },
    /// Flow accumulation from DEM
    FlowAccumulation {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Precomputed D8 flow direction raster (computed from the DEM if omitted)
        #[arg(long)]
        flow_dir: Option<PathBuf>,
        /// Accumulate contributing area (m²) instead of cell counts
        #[arg(long)]
        area: bool,
    },
}

// ─── Terrain subcommands ────────────────────────────────────────────────

#[derive(Subcommand)]
enum TerrainCommands {
    /// Calculate slope from DEM
    Slope {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Output units: radians, degrees, percent
        #[arg(short, long, default_value = "radians")]
        units: String,
        /// Vertical exaggeration
        #[arg(short, long, default_value = "1.0")]
        z_factor: f64,
        /// Edge handling: reduced or nodata
        #[arg(long, default_value = "reduced")]
        edge: String,
    },
    /// Calculate aspect from DEM
    Aspect {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Convention: east (counter-clockwise from east) or compass (clockwise from north)
        #[arg(long, default_value = "east")]
        convention: String,
        /// Write degrees instead of radians
        #[arg(long)]
        degrees: bool,
        /// Edge handling: reduced or nodata
        #[arg(long, default_value = "reduced")]
        edge: String,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn read_raster<T: RasterElement>(path: &Path) -> Result<Raster<T>> {
    let pb = spinner(&format!("Reading {}...", path.display()))?;
    let raster: Raster<T> = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    debug!("{}: {} x {}", path.display(), raster.cols(), raster.rows());
    Ok(raster)
}

fn read_dem(path: &Path) -> Result<Raster<f64>> {
    let raster = read_raster::<f64>(path)?;
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_result<T: RasterElement>(raster: &Raster<T>, path: &Path) -> Result<()> {
    let pb = spinner(&format!("Writing {}...", path.display()))?;
    write_geotiff(raster, path, Some(GeoTiffOptions::default()))
        .with_context(|| format!("Failed to write output {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

/// A number becomes a constant factor, anything else is read as a raster
fn parse_factor(value: &str) -> Result<FactorInput> {
    match value.trim().parse::<f64>() {
        Ok(v) => Ok(FactorInput::Constant(v)),
        Err(_) => Ok(FactorInput::Raster(read_raster(Path::new(value))?)),
    }
}

fn parse_edge(s: &str) -> Result<EdgeMode> {
    match s.to_lowercase().as_str() {
        "reduced" | "extrapolate" => Ok(EdgeMode::Reduced),
        "nodata" | "no-data" | "no_data" => Ok(EdgeMode::NoData),
        _ => anyhow::bail!("Unknown edge mode: {}. Use reduced or nodata.", s),
    }
}

fn parse_weighting(s: &str) -> Result<FlowWeighting> {
    match s.to_lowercase().as_str() {
        "count" | "cells" => Ok(FlowWeighting::CellCount),
        "area" => Ok(FlowWeighting::CellArea),
        _ => anyhow::bail!("Unknown weighting: {}. Use count or area.", s),
    }
}

fn parse_units(s: &str) -> Result<OutputUnits> {
    match s.to_lowercase().as_str() {
        "kg-m2" | "kg/m2" | "kg_m2" => Ok(OutputUnits::KilogramsPerSquareMeter),
        "t-ha" | "t/ha" | "t_ha" => Ok(OutputUnits::TonnesPerHectare),
        _ => anyhow::bail!("Unknown units: {}. Use kg-m2 or t-ha.", s),
    }
}

fn parse_slope_units(s: &str) -> Result<SlopeUnits> {
    match s.to_lowercase().as_str() {
        "radians" | "rad" => Ok(SlopeUnits::Radians),
        "degrees" | "deg" => Ok(SlopeUnits::Degrees),
        "percent" | "pct" | "%" => Ok(SlopeUnits::Percent),
        _ => anyhow::bail!("Unknown units: {}. Use radians, degrees, or percent.", s),
    }
}

fn parse_convention(s: &str) -> Result<AspectConvention> {
    match s.to_lowercase().as_str() {
        "east" | "ccw" => Ok(AspectConvention::EastCounterClockwise),
        "compass" | "north" | "cw" => Ok(AspectConvention::NorthClockwise),
        _ => anyhow::bail!("Unknown convention: {}. Use east or compass.", s),
    }
}

/// Configuration file (if any) with command-line overrides applied
fn erosion_config(args: &ErosionArgs) -> Result<ErosionConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            ErosionConfig::from_toml(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => ErosionConfig::default(),
    };

    if let Some(model) = &args.model {
        config.model = model.parse::<ModelKind>()?;
    }
    if args.m.is_some() {
        config.m = args.m;
    }
    if args.n.is_some() {
        config.n = args.n;
    }
    if let Some(w) = &args.weighting {
        config.weighting = parse_weighting(w)?;
    }
    if let Some(e) = &args.edge {
        config.edge = parse_edge(e)?;
    }
    if let Some(epsilon) = args.fill {
        config.depressions = DepressionHandling::Fill { epsilon };
    }
    if let Some(u) = &args.units {
        config.units = parse_units(u)?;
    }
    if let Some(t) = args.stable_threshold {
        config.stable_threshold = t;
    }
    Ok(config)
}

fn erosion_inputs(args: &ErosionArgs) -> Result<ErosionInputs> {
    let dem = read_dem(&args.dem)?;
    let r = match (&args.r_factor, &args.rain_intensity, args.rain_duration) {
        (Some(r), _, _) => RFactorSource::Input(parse_factor(r)?),
        (None, Some(i), Some(duration)) => RFactorSource::Event {
            intensity: parse_factor(i)?,
            duration,
        },
        _ => RFactorSource::default(),
    };
    Ok(ErosionInputs::new(dem)
        .with_r(r)
        .with_k(parse_factor(&args.k_factor)?)
        .with_c(parse_factor(&args.c_factor)?))
}

fn write_layer<T: RasterElement>(
    raster: &Raster<T>,
    dir: &Path,
    name: &str,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    let path = dir.join(format!("{name}.tif"));
    // recorded before writing so a half-written file is cleaned up too
    written.push(path.clone());
    write_result(raster, &path)
}

fn write_layers(out: &ErosionOutputs, dir: &Path, written: &mut Vec<PathBuf>) -> Result<()> {
    write_layer(&out.flow_direction, dir, "flow_direction", written)?;
    write_layer(&out.flow_accumulation, dir, "flow_accumulation", written)?;
    write_layer(&out.slope, dir, "slope", written)?;
    write_layer(&out.aspect, dir, "aspect", written)?;
    match &out.factors {
        ErosionFactors::LsFactor(ls) => write_layer(ls, dir, "ls_factor", written)?,
        ErosionFactors::SedimentFlux(flux) => {
            write_layer(&flux.capacity, dir, "transport_capacity", written)?;
            write_layer(&flux.qx, dir, "flux_x", written)?;
            write_layer(&flux.qy, dir, "flux_y", written)?;
        }
    }
    write_layer(&out.result.erosion, dir, "erosion", written)?;
    if let Some(deposition) = &out.result.deposition {
        write_layer(deposition, dir, "deposition", written)?;
    }
    if let Some(net) = &out.result.net_change {
        write_layer(net, dir, "net_change", written)?;
    }
    write_layer(&out.result.change_class, dir, "change_class", written)
}

/// Write every layer of a run; returns the written paths.
///
/// Either all layers end up in `dir` or none do: on a failed write the
/// layers already written are removed again.
fn write_erosion_outputs(out: &ErosionOutputs, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut written = Vec::new();
    if let Err(e) = write_layers(out, dir, &mut written) {
        for path in &written {
            if path.exists() {
                if let Err(rm) = std::fs::remove_file(path) {
                    warn!("could not remove partial output {}: {}", path.display(), rm);
                }
            }
        }
        return Err(e.context(format!(
            "Erosion outputs not written to {}",
            dir.display()
        )));
    }
    Ok(written)
}

fn print_info(input: &Path, raster: &Raster<f64>) {
    let (rows, cols) = raster.shape();
    let bounds = raster.bounds();

    let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
    let mut valid = 0usize;
    raster.for_each_cell(|_, _, v| {
        if !raster.is_nodata(v) {
            min = min.min(v);
            max = max.max(v);
            sum += v;
            valid += 1;
        }
    });

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Cell size: {}", raster.cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(nodata) = raster.nodata() {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if valid > 0 {
        println!("  Min: {:.4}", min);
        println!("  Max: {:.4}", max);
        println!("  Mean: {:.4}", sum / valid as f64);
    }
    println!(
        "  Valid cells: {} ({:.1}%)",
        valid,
        100.0 * valid as f64 / raster.len().max(1) as f64
    );
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_dem(&input)?;
            print_info(&input, &raster);
        }

        // ── Erosion ──────────────────────────────────────────────────
        Commands::Erosion(args) => {
            let config = erosion_config(&args)?;
            let pipeline = ErosionPipeline::new(config).context("Invalid erosion settings")?;
            let inputs = erosion_inputs(&args)?;

            let start = Instant::now();
            let pb = spinner(&format!("Running {}...", pipeline.config().model))?;
            let out = pipeline.run(&inputs).context("Erosion model failed")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            let written = write_erosion_outputs(&out, &args.output_dir)?;
            for path in &written {
                debug!("wrote {}", path.display());
            }
            println!(
                "{} layers ({}) written to: {}",
                written.len(),
                pipeline.config().model,
                args.output_dir.display()
            );
            println!("  Processing time: {:.2?}", elapsed);
        }

        // ── Hydrology ────────────────────────────────────────────────
        Commands::Hydrology { algorithm } => match algorithm {
            HydrologyCommands::Fill {
                input,
                output,
                epsilon,
            } => {
                let dem = read_dem(&input)?;
                let start = Instant::now();
                let result = fill_depressions(&dem, FillParams { epsilon })
                    .context("Failed to fill depressions")?;
                let elapsed = start.elapsed();
                write_result(&result, &output)?;
                done("Filled DEM", &output, elapsed);
            }
            HydrologyCommands::FlowDirection { input, output } => {
                let dem = read_dem(&input)?;
                let start = Instant::now();
                let result = flow_direction(&dem).context("Failed to compute flow direction")?;
                let elapsed = start.elapsed();
                write_result(&result, &output)?;
                done("Flow direction", &output, elapsed);
            }
            HydrologyCommands::FlowAccumulation {
                input,
                output,
                flow_dir,
                area,
            } => {
                let dem = read_dem(&input)?;
                let fdir = match flow_dir {
                    Some(path) => read_raster::<u8>(&path)?,
                    None => flow_direction(&dem).context("Failed to compute flow direction")?,
                };
                let weighting = if area {
                    FlowWeighting::CellArea
                } else {
                    FlowWeighting::CellCount
                };
                let start = Instant::now();
                let result = flow_accumulation(&dem, &fdir, FlowAccumulationParams { weighting })
                    .context("Failed to compute flow accumulation")?;
                let elapsed = start.elapsed();
                write_result(&result, &output)?;
                done("Flow accumulation", &output, elapsed);
            }
        },

        // ── Terrain ──────────────────────────────────────────────────
        Commands::Terrain { algorithm } => match algorithm {
            TerrainCommands::Slope {
                input,
                output,
                units,
                z_factor,
                edge,
            } => {
                let params = SlopeParams {
                    units: parse_slope_units(&units)?,
                    z_factor,
                    edge: parse_edge(&edge)?,
                };
                let dem = read_dem(&input)?;
                let start = Instant::now();
                let result = slope(&dem, params).context("Failed to calculate slope")?;
                let elapsed = start.elapsed();
                write_result(&result, &output)?;
                done("Slope", &output, elapsed);
            }
            TerrainCommands::Aspect {
                input,
                output,
                convention,
                degrees,
                edge,
            } => {
                let params = AspectParams {
                    convention: parse_convention(&convention)?,
                    units: if degrees {
                        AspectUnits::Degrees
                    } else {
                        AspectUnits::Radians
                    },
                    edge: parse_edge(&edge)?,
                };
                let dem = read_dem(&input)?;
                let start = Instant::now();
                let result = aspect(&dem, params).context("Failed to calculate aspect")?;
                let elapsed = start.elapsed();
                write_result(&result, &output)?;
                done("Aspect", &output, elapsed);
            }
        },

        // ── R factor ─────────────────────────────────────────────────
        Commands::Rfactor {
            intensity,
            duration,
            output,
        } => match parse_factor(&intensity)? {
            FactorInput::Constant(i) => {
                let r = event_r_factor(i, duration).context("Invalid storm event")?;
                println!("R factor: {:.4} MJ mm ha^-1 h^-1 yr^-1", r);
                if let Some(path) = output {
                    anyhow::bail!(
                        "--output {} needs an intensity raster; a constant intensity gives a single value",
                        path.display()
                    );
                }
            }
            FactorInput::Raster(raster) => {
                let Some(output) = output else {
                    anyhow::bail!("--output is required when the intensity is a raster");
                };
                let start = Instant::now();
                let result =
                    event_r_factor_raster(&raster, duration).context("Invalid storm event")?;
                let elapsed = start.elapsed();
                write_result(&result, &output)?;
                done("R factor", &output, elapsed);
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use soilflux_core::GeoTransform;

    fn small_run(model: ModelKind) -> ErosionOutputs {
        let mut dem = Raster::new(6, 6);
        dem.set_transform(GeoTransform::new(0.0, 60.0, 10.0, -10.0));
        for row in 0..6 {
            for col in 0..6 {
                dem.set(row, col, 50.0 - row as f64 - 0.5 * col as f64).unwrap();
            }
        }
        ErosionPipeline::new(ErosionConfig::for_model(model))
            .unwrap()
            .run(&ErosionInputs::new(dem))
            .unwrap()
    }

    #[test]
    fn rain_duration_needs_an_intensity() {
        let parsed = Cli::try_parse_from([
            "soilflux", "erosion", "dem.tif", "out", "--rain-duration", "30",
        ]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from([
            "soilflux",
            "erosion",
            "dem.tif",
            "out",
            "--rain-duration",
            "30",
            "--rain-intensity",
            "40",
        ]);
        assert!(parsed.is_ok());
    }

    #[test]
    fn flags_override_the_config_defaults() {
        let cli = Cli::try_parse_from([
            "soilflux", "erosion", "dem.tif", "out", "--model", "usped", "--n", "1.1", "--fill",
            "0.001",
        ])
        .unwrap();
        let Commands::Erosion(args) = cli.command else {
            panic!("expected the erosion command");
        };
        let config = erosion_config(&args).unwrap();
        assert_eq!(config.model, ModelKind::Usped);
        assert_eq!(config.n, Some(1.1));
        assert_eq!(config.depressions, DepressionHandling::Fill { epsilon: 0.001 });
    }

    #[test]
    fn every_layer_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_erosion_outputs(&small_run(ModelKind::Usped), dir.path()).unwrap();
        assert_eq!(written.len(), 11);
        assert!(written.iter().all(|p| p.is_file()));
    }

    #[test]
    fn failed_write_leaves_no_layers_behind() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where a layer file should go makes that write fail
        std::fs::create_dir(dir.path().join("slope.tif")).unwrap();

        let result = write_erosion_outputs(&small_run(ModelKind::Rusle3d), dir.path());
        assert!(result.is_err());
        assert!(!dir.path().join("flow_direction.tif").exists());
        assert!(!dir.path().join("flow_accumulation.tif").exists());
        assert!(!dir.path().join("erosion.tif").exists());
    }
}
