//! Foresight CLI - Climate Foresight raster pipeline

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use foresight_algorithms::alignment::{align_to_grid, Resampling};
use foresight_algorithms::normalization::{
    normalize_raster, plan_normalization, NormalizationParams, Orientation,
};
use foresight_algorithms::promote::{promote, PromoteParams};
use foresight_algorithms::statistics::{analyze_raster, SelectorParams};
use foresight_core::io::{read_geotiff, write_geotiff};
use foresight_core::{CancelFlag, PlanningArea, Raster, RasterElement, DEFAULT_NODATA};
use foresight_pipeline::{
    CoreConfig, InMemoryCatalog, LocalRasterStore, Orchestrator, RunRecord, StageStatus,
    StaticFutureLibrary, StaticRunContext,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "foresight")]
#[command(author, version, about = "Climate Foresight raster pipeline", long_about = None)]
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
    /// Statistics and selected skew-correcting transformation, as JSON
    Stats {
        /// Input raster file
        input: PathBuf,
        /// Target number of pixels in the working sample
        #[arg(long, default_value = "10000000")]
        sample_size: usize,
    },
    /// Normalize a layer to [0, 1] with a fuzzy membership curve
    Normalize {
        /// Input raster in raw units
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Small values are desirable (Z curve)
        #[arg(long)]
        favor_low: bool,
        /// Desirable interior band as raw-unit endpoints "a,m1,m2,b"
        #[arg(long, conflicts_with = "favor_low")]
        trapezoid: Option<String>,
    },
    /// Clip and align a raster to a planning area's reference grid
    Align {
        /// Input raster
        input: PathBuf,
        /// Planning area JSON: {"crs": 4269, "polygons": [...]}
        area: PathBuf,
        /// Output file
        output: PathBuf,
        /// Reference grid resolution in planning-area CRS units
        #[arg(short, long, default_value = "0.0008983")]
        resolution: f64,
        /// Nearest-neighbour resampling for categorical layers
        #[arg(long)]
        nearest: bool,
    },
    /// PROMOTe scores and MPAT products from current and future landscapes
    Promote {
        /// Current-conditions landscape (0-100)
        current: PathBuf,
        /// Future-conditions landscape on the same grid
        future: PathBuf,
        /// Directory the eight output rasters are written to
        out_dir: PathBuf,
    },
    /// Run every stage of a manifest through the orchestrator
    Run {
        /// Manifest JSON with "run" and "library" sections
        manifest: PathBuf,
        /// Configuration JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Contents of a `run` manifest
#[derive(Deserialize)]
struct Manifest {
    run: RunRecord,
    #[serde(default)]
    library: StaticFutureLibrary,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f32>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f32> = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_result<T: RasterElement>(raster: &Raster<T>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_endpoints(s: &str) -> Result<Vec<f64>> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().with_context(|| format!("Invalid endpoint: {}", v)))
        .collect::<Result<Vec<_>>>()?;
    if values.len() != 4 {
        anyhow::bail!("Trapezoid needs 4 endpoints 'a,m1,m2,b', got {}", values.len());
    }
    Ok(values)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let cancel = CancelFlag::new();

    match cli.command {
        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Resolution: {:?}", raster.transform().resolution());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            println!("Transform: {:?}", raster.transform().to_gdal());
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
            );
        }

        Commands::Stats { input, sample_size } => {
            let raster = read_raster(&input)?;
            let params = SelectorParams {
                target_sample_size: sample_size,
                ..SelectorParams::default()
            };
            let analysis = analyze_raster(&raster, &params).context("Failed to analyze raster")?;
            let selection = &analysis.selection;
            let candidates: Vec<_> = selection
                .candidates
                .iter()
                .map(|c| json!({ "transformation": c.kind, "skew": c.skew }))
                .collect();
            print_json(&json!({
                "statistics": analysis.statistics,
                "downsample_factor": analysis.downsample_factor,
                "transformation": selection.transformation.kind(),
                "transformation_params": selection.transformation.params(),
                "original_skew": selection.original_skew,
                "transformed_skew": selection.transformed_skew,
                "candidates": candidates,
            }))?;
        }

        Commands::Normalize {
            input,
            output,
            favor_low,
            trapezoid,
        } => {
            let raster = read_raster(&input)?;
            let start = Instant::now();
            let mut params = NormalizationParams {
                favor_high: Some(!favor_low),
                ..NormalizationParams::default()
            };
            if let Some(points) = trapezoid {
                params.orientation = Some(Orientation::Interior);
                params.endpoints = Some(parse_endpoints(&points)?);
            }
            let analysis = analyze_raster(&raster, &SelectorParams::default())
                .context("Failed to analyze raster")?;
            let plan = plan_normalization(&analysis, &params).context("Failed to plan normalization")?;
            let result = normalize_raster(&raster, &plan, params.block_size, params.nodata, &cancel)
                .context("Failed to normalize")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            print_json(&plan.to_block())?;
            done("Normalized layer", &output, elapsed);
        }

        Commands::Align {
            input,
            area,
            output,
            resolution,
            nearest,
        } => {
            let raster = read_raster(&input)?;
            let text = std::fs::read_to_string(&area)
                .with_context(|| format!("Failed to read {}", area.display()))?;
            let area: PlanningArea =
                serde_json::from_str(&text).context("Invalid planning area")?;
            let grid = area
                .reference_grid(resolution, DEFAULT_NODATA)
                .context("Cannot derive reference grid")?;
            let method = if nearest {
                Resampling::Nearest
            } else {
                Resampling::Bilinear
            };
            let start = Instant::now();
            let result = align_to_grid(&raster, &area, &grid, method).context("Failed to align")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            info!("Reference grid: {} x {}", grid.width, grid.height);
            done("Aligned raster", &output, elapsed);
        }

        Commands::Promote {
            current,
            future,
            out_dir,
        } => {
            let current = read_raster(&current)?;
            let future = read_raster(&future)?;
            let start = Instant::now();
            let outputs = promote(&current, &future, &PromoteParams::default(), &cancel)
                .context("Failed to score")?;
            let elapsed = start.elapsed();

            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("Failed to create {}", out_dir.display()))?;
            for (name, raster) in outputs.float_layers() {
                write_result(raster, &out_dir.join(format!("{}.tif", name)))?;
            }
            for (name, raster) in outputs.categorical_layers() {
                write_result(raster, &out_dir.join(format!("{}.tif", name)))?;
            }
            print_json(&outputs.summary)?;
            done("PROMOTe products", &out_dir, elapsed);
        }

        Commands::Run { manifest, config } => {
            let config = match config {
                Some(path) => CoreConfig::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => CoreConfig::default(),
            };
            let text = std::fs::read_to_string(&manifest)
                .with_context(|| format!("Failed to read {}", manifest.display()))?;
            let manifest: Manifest = serde_json::from_str(&text).context("Invalid manifest")?;
            let run_id = manifest.run.id;

            let store = LocalRasterStore::new(&config.raster_root);
            let catalog = InMemoryCatalog::new();
            let runs = StaticRunContext::new([manifest.run]);
            let orchestrator =
                Orchestrator::new(&config, &store, &catalog, &runs, &manifest.library);

            let pb = spinner("Running stages...");
            let start = Instant::now();
            let report = orchestrator.run(run_id, &cancel).context("Failed to schedule run")?;
            pb.finish_and_clear();

            println!("Run {} ({} rounds, {:.2?})", run_id, report.rounds, start.elapsed());
            for (task, record) in report.book.iter() {
                let status = match record.status {
                    StageStatus::Completed => "ok",
                    StageStatus::Failed => "FAILED",
                    StageStatus::Running => "running",
                    StageStatus::Pending => "pending",
                };
                print!("  {:<24} {}", task.to_string(), status);
                if let Some(message) = &record.message {
                    print!(" ({})", message);
                }
                println!();
                for layer in report.artifacts.get(task).into_iter().flatten() {
                    println!("      #{} {} -> {}", layer.id, layer.name, layer.url);
                }
            }

            if let Some((task, message)) = report.first_failure() {
                anyhow::bail!("{} failed: {}", task, message);
            }
        }
    }

    Ok(())
}
