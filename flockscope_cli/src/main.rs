//! Flockscope CLI
//!
//! Inspect swarm recordings and compute their flocking and safety series.

use clap::{Args as ClapArgs, Parser, Subcommand};
use flockscope_cli::{write_synthetic, MetricsExport, Result, SynthConfig};
use flockscope_core::axes::{all_agents_series, axis_label, axis_series, normalize_axis};
use flockscope_core::params::{Overrides, ParamTables};
use flockscope_core::report::{axes_lines, format_sig6, params_lines, RecordingSummary};
use flockscope_core::{analyze, load_recording, AnalysisConfig, ObstacleScenario, Recording};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Flockscope swarm recording inspector
#[derive(Parser, Debug)]
#[command(name = "flockscope")]
#[command(
    about = "Decode swarm recordings and compute flocking/safety diagnostics",
    long_about = None
)]
struct Args {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the recording summary
    Info {
        /// Recording file
        file: PathBuf,

        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// List the axes available for `series`
    Axes {
        /// Recording file
        file: PathBuf,
    },

    /// Print one axis over time
    Series {
        /// Recording file
        file: PathBuf,

        /// Axis name (t, x, y, z, vx, ...)
        #[arg(short = 'x', long)]
        axis: String,

        /// Agent index (all agents when omitted)
        #[arg(short, long)]
        agent: Option<usize>,

        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Compute flocking, safety and control series
    Metrics(MetricsArgs),

    /// Write a synthetic recording
    Synth(SynthArgs),
}

#[derive(ClapArgs, Debug)]
struct MetricsArgs {
    /// Recording file
    file: PathBuf,

    /// Neighbor radius r (overrides metadata)
    #[arg(long)]
    neighbor_radius: Option<f64>,

    /// Desired inter-agent distance d (overrides metadata)
    #[arg(long)]
    desired_distance: Option<f64>,

    /// Safe inter-agent distance (overrides metadata)
    #[arg(long)]
    safe_distance: Option<f64>,

    /// Obstacle scenario (auto, paper, none)
    #[arg(long, default_value = "auto")]
    obstacles: ObstacleScenario,

    /// JSON file replacing the fallback parameter tables
    #[arg(long)]
    fallback_table: Option<PathBuf>,

    /// JSON output (full series)
    #[arg(long)]
    json: bool,

    /// Export the full analysis to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct SynthArgs {
    /// Output file
    output: PathBuf,

    /// Seed for determinism
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of agents
    #[arg(short, long, default_value = "16")]
    agents: usize,

    /// Number of recorded frames
    #[arg(short, long, default_value = "200")]
    frames: usize,

    /// Simulation timestep in seconds
    #[arg(long, default_value = "0.02")]
    dt: f64,

    /// Simulation steps per recorded frame
    #[arg(long, default_value = "5")]
    stride: u64,

    /// Velocity noise standard deviation
    #[arg(long, default_value = "0.05")]
    noise: f64,

    /// Record z/vz as well
    #[arg(long)]
    three_d: bool,

    /// Also record safety-filter debug fields
    #[arg(long)]
    control: bool,

    /// Algorithm id written to the metadata
    #[arg(long, default_value = "flocking-alpha")]
    algorithm: String,
}

fn load(path: &Path) -> Result<Recording> {
    let recording = load_recording(path)?;
    debug!(
        "{}: {} frames x {} agents x {} fields",
        path.display(),
        recording.frame_count,
        recording.agent_count,
        recording.field_count()
    );
    Ok(recording)
}

fn run_info(file: &Path, json: bool) -> Result<()> {
    let recording = load(file)?;
    let summary = RecordingSummary::new(file, &recording);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for line in summary.lines() {
            println!("{}", line);
        }
    }
    Ok(())
}

fn run_axes(file: &Path) -> Result<()> {
    let recording = load(file)?;
    for line in axes_lines(&recording) {
        println!("{}", line);
    }
    Ok(())
}

fn run_series(file: &Path, axis: &str, agent: Option<usize>, json: bool) -> Result<()> {
    let recording = load(file)?;
    let axis = normalize_axis(axis);
    let label = axis_label(&axis)?;
    let columns = match agent {
        Some(index) => vec![axis_series(&recording, &axis, index)?],
        None => all_agents_series(&recording, &axis)?,
    };

    if json {
        let doc = serde_json::json!({
            "axis": axis,
            "label": label,
            "agent": agent,
            "time": recording.time,
            "values": columns,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("# t, {}", label);
    for (f, t) in recording.time.iter().enumerate() {
        let row: Vec<String> = columns.iter().map(|c| format_sig6(c[f])).collect();
        println!("{}\t{}", format_sig6(*t), row.join("\t"));
    }
    Ok(())
}

/// `(min, mean, max, last)` over the finite values.
fn series_stats(values: &[f64]) -> Option<(f64, f64, f64, f64)> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let last = *finite.last()?;
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    Some((min, mean, max, last))
}

fn run_metrics(args: &MetricsArgs) -> Result<()> {
    let recording = load(&args.file)?;

    let tables = match &args.fallback_table {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            info!("Fallback tables from {}", path.display());
            ParamTables::from_json(&text)?
        }
        None => ParamTables::default(),
    };
    let config = AnalysisConfig {
        overrides: Overrides {
            neighbor_radius: args.neighbor_radius,
            desired_distance: args.desired_distance,
            safe_distance: args.safe_distance,
        },
        scenario: args.obstacles,
        tables,
    };

    let analysis = analyze(&recording, &config)?;
    let summary = RecordingSummary::new(&args.file, &recording);
    let export = MetricsExport::new(summary, &analysis, args.obstacles)
        .with_warnings(recording.warnings.iter().map(|w| w.to_string()));

    if let Some(path) = &args.export {
        export.write_to_file(path)?;
        info!("Exported {} series to {}", analysis.series.len(), path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&export)?);
        return Ok(());
    }

    for line in params_lines(&analysis.params) {
        println!("{}", line);
    }
    println!(
        "dimension: {}D, obstacles: {} ({})",
        analysis.dim, analysis.obstacle_count, args.obstacles
    );
    println!("{:<20} {:>12} {:>12} {:>12} {:>12}", "series", "min", "mean", "max", "last");
    for (name, values) in analysis.series.iter() {
        match series_stats(values) {
            Some((min, mean, max, last)) => println!(
                "{:<20} {:>12} {:>12} {:>12} {:>12}",
                name,
                format_sig6(min),
                format_sig6(mean),
                format_sig6(max),
                format_sig6(last)
            ),
            None => println!("{:<20} {:>12}", name, "nan"),
        }
    }
    Ok(())
}

fn run_synth(args: &SynthArgs) -> Result<()> {
    let config = SynthConfig {
        seed: args.seed,
        agents: args.agents,
        frames: args.frames,
        dt: args.dt,
        stride: args.stride,
        noise_std: args.noise,
        plane2d: !args.three_d,
        control: args.control,
        algorithm_id: args.algorithm.clone(),
        ..SynthConfig::default()
    };
    let bytes = write_synthetic(config, &args.output)?;
    info!(
        "Wrote {} frames x {} agents ({} bytes) to {}",
        args.frames,
        args.agents,
        bytes,
        args.output.display()
    );
    Ok(())
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Info { file, json } => run_info(&file, json),
        Command::Axes { file } => run_axes(&file),
        Command::Series {
            file,
            axis,
            agent,
            json,
        } => run_series(&file, &axis, agent, json),
        Command::Metrics(metrics) => run_metrics(&metrics),
        Command::Synth(synth) => run_synth(&synth),
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging; stdout stays reserved for results
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        warn!("tracing subscriber already installed");
    }

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
