//! PFTRACK SIM: a headless runner for the pftrack particle filter.
//!
//! A scripted target moves through a rectangular area, a noisy sensor reports its position every
//! frame, and the filter tracks it with one of three resampling strategies:
//!
//! - Elitist: keep the particles closest to the reading and refill the rest at random.
//! - Proportional: redraw survivors with probability proportional to inverse distance.
//! - Hybrid: a few elites verbatim, the rest of the survivors by weighted draws.
//!
//! You can run simulations either by:
//!   1. Loading all parameters from one or more configuration files (TOML/JSON/YAML)
//!   2. Specifying parameters via command-line flags
//!
//! Every processed frame is written to a CSV file for later analysis.

mod common;

use clap::{Args, Parser, Subcommand, ValueEnum};
use common::{get_config_files, init_logger, output_for_run, validate_output_path};
use log::{error, info};
use pftrack::config::{MotionNoise, SensorNoise};
use pftrack::sim::{LogLevel, LoggingConfig, SimulationConfig, TargetPath, run_simulation};
use pftrack::{FilterConfig, ResamplingStrategy};
use rayon::prelude::*;
use std::error::Error;
use std::path::{Path, PathBuf};

const LONG_ABOUT: &str = "PFTRACK SIM: a headless runner for the pftrack particle filter.

A scripted target moves through a rectangular area, a noisy sensor reports its position every
frame, and the filter tracks it with one of three resampling strategies (elitist, proportional
or hybrid). Runs are fully reproducible from their seed.

You can run simulations either by:
  1. Loading all parameters from one or more configuration files (TOML/JSON/YAML)
  2. Specifying parameters via command-line flags

Every processed frame is written to a CSV file (target, sensor reading, motion delta, estimate
and estimate error).";

type RunError = Box<dyn Error + Send + Sync>;

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "A headless runner for the pftrack particle filter.", long_about = LONG_ABOUT)]
struct Cli {
    /// Run simulations from a configuration file, or from every configuration file in a
    /// directory (TOML/JSON/YAML). This option overrides any subcommand
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Command to execute (ignored if --config is provided)
    #[command(subcommand)]
    command: Option<Command>,

    /// Output CSV file path. When running several configurations, output filenames are
    /// generated as: {output_stem}_{name}.csv
    #[arg(short, long, global = true, default_value = "pftrack.csv")]
    output: PathBuf,

    /// Also write the final particle cloud to this CSV file
    #[arg(long, global = true)]
    particles: Option<PathBuf>,

    /// Log level, overrides the configuration file
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    /// Log file path, overrides the configuration file (logs to stderr if neither is set)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Run simulations in parallel when processing multiple configuration files
    #[arg(long, global = true)]
    parallel: bool,
}

/// Top-level commands
#[derive(Subcommand, Clone)]
enum Command {
    #[command(
        name = "run",
        about = "Run a single simulation configured from flags",
        long_about = "Run a single simulation with every parameter taken from command-line flags. Unset flags fall back to the defaults of the tracker (1000 particles, stay rate 0.9, best-select rate 0.3, an 800x600 area and the elitist strategy)."
    )]
    Run(RunArgs),

    #[command(name = "config", about = "Generate a template configuration file")]
    CreateConfig(CreateConfigArgs),
}

/// Shape of the scripted target path, scaled to the area.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PathKind {
    Stationary,
    Line,
    Circle,
    Lissajous,
}

/// Arguments for a single flag-configured run
#[derive(Args, Clone, Debug)]
struct RunArgs {
    /// Name of the run, used in logs
    #[arg(long, default_value = "simulation")]
    name: String,

    /// Resampling strategy
    #[arg(short, long, value_enum, default_value_t = ResamplingStrategy::Elitist)]
    strategy: ResamplingStrategy,

    /// Number of particles
    #[arg(short = 'n', long, default_value_t = 1000)]
    samples: usize,

    /// Fraction of the population kept from one generation to the next
    #[arg(long, default_value_t = 0.9)]
    stay_rate: f64,

    /// Fraction of the population kept verbatim by the hybrid strategy
    #[arg(long, default_value_t = 0.3)]
    best_select_rate: f64,

    /// Width of the tracking area
    #[arg(long, default_value_t = 800.0)]
    width: f64,

    /// Height of the tracking area
    #[arg(long, default_value_t = 600.0)]
    height: f64,

    /// Number of frames to simulate
    #[arg(short, long, default_value_t = 500)]
    frames: usize,

    /// Seed for the random number generator
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Target path
    #[arg(long, value_enum, default_value_t = PathKind::Circle)]
    path: PathKind,

    /// Frames per period of the target path
    #[arg(long, default_value_t = 240)]
    period: usize,

    /// Mean of the Gaussian noise added to every motion radius
    #[arg(long, default_value_t = 0.1)]
    motion_noise_mean: f64,

    /// Standard deviation of the Gaussian noise added to every motion radius
    #[arg(long, default_value_t = 5.0)]
    motion_noise_std: f64,

    /// Disable motion and sensor noise entirely
    #[arg(long)]
    no_noise: bool,
}

/// Arguments for create-config command
#[derive(Args, Clone, Debug)]
struct CreateConfigArgs {
    /// Output file path for the config file
    /// File extension determines format: .json, .yaml/.yml, or .toml (recommended)
    #[arg(value_parser)]
    path: PathBuf,
}

impl RunArgs {
    fn target_path(&self) -> TargetPath {
        let (w, h) = (self.width, self.height);
        match self.path {
            PathKind::Stationary => TargetPath::Stationary {
                x: w / 2.0,
                y: h / 2.0,
            },
            PathKind::Line => TargetPath::Line {
                from_x: 0.1 * w,
                from_y: 0.5 * h,
                to_x: 0.9 * w,
                to_y: 0.5 * h,
                period: self.period,
            },
            PathKind::Circle => TargetPath::Circle {
                center_x: w / 2.0,
                center_y: h / 2.0,
                radius: w.min(h) / 4.0,
                period: self.period,
            },
            PathKind::Lissajous => TargetPath::Lissajous {
                center_x: w / 2.0,
                center_y: h / 2.0,
                amplitude_x: 0.4 * w,
                amplitude_y: 0.4 * h,
                frequency_x: 3.0,
                frequency_y: 2.0,
                period: self.period,
            },
        }
    }

    fn to_config(&self) -> SimulationConfig {
        let (motion_noise, sensor_noise) = if self.no_noise {
            (MotionNoise::none(), SensorNoise::none())
        } else {
            (
                MotionNoise {
                    mean: self.motion_noise_mean,
                    std_dev: self.motion_noise_std,
                },
                SensorNoise::default(),
            )
        };
        SimulationConfig {
            name: self.name.clone(),
            frames: self.frames,
            seed: self.seed,
            start: [0.0, 0.0],
            filter: FilterConfig {
                samples_count: self.samples,
                stay_rate: self.stay_rate,
                best_select_rate: self.best_select_rate,
                area_width: self.width,
                area_height: self.height,
                strategy: self.strategy,
                motion_noise,
                sensor_noise,
                ..Default::default()
            },
            path: self.target_path(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Run one simulation and write its CSV outputs
fn execute(
    config: &SimulationConfig,
    output: &Path,
    particles: Option<&Path>,
) -> Result<(), RunError> {
    let result = run_simulation(config)?;
    result.to_csv(output)?;
    info!(
        "Wrote {} frame records for '{}' to {}",
        result.records.len(),
        result.name,
        output.display()
    );
    if let Some(path) = particles {
        result.particles_to_csv(path)?;
        info!("Wrote final particle set to {}", path.display());
    }
    match result.final_error() {
        Some(err) => info!("'{}' final estimate error: {:.3}", result.name, err),
        None => info!("'{}' produced no estimates", result.name),
    }
    Ok(())
}

/// Output paths for a batch of runs; a single run writes to the paths as given.
fn plan_outputs(
    configs: &[SimulationConfig],
    output: &Path,
    particles: Option<&Path>,
) -> Vec<(PathBuf, Option<PathBuf>)> {
    if configs.len() == 1 {
        return vec![(output.to_path_buf(), particles.map(Path::to_path_buf))];
    }
    configs
        .iter()
        .map(|config| {
            (
                output_for_run(output, &config.name),
                particles.map(|p| output_for_run(p, &config.name)),
            )
        })
        .collect()
}

fn run_job(
    (config, output, particles): &(&SimulationConfig, &Path, Option<&Path>),
) -> Result<(), (String, String)> {
    execute(config, output, *particles).map_err(|e| (config.name.clone(), e.to_string()))
}

/// Execute every loaded configuration, sequentially or on the rayon pool
fn run_configs(
    configs: &[SimulationConfig],
    output: &Path,
    particles: Option<&Path>,
    parallel: bool,
) -> Result<(), Box<dyn Error>> {
    let outputs = plan_outputs(configs, output, particles);
    for (out, parts) in &outputs {
        validate_output_path(out)?;
        if let Some(p) = parts {
            validate_output_path(p)?;
        }
    }

    let jobs: Vec<(&SimulationConfig, &Path, Option<&Path>)> = configs
        .iter()
        .zip(outputs.iter())
        .map(|(config, (out, parts))| (config, out.as_path(), parts.as_deref()))
        .collect();

    let results: Vec<Result<(), (String, String)>> = if parallel && jobs.len() > 1 {
        info!("Running {} simulations in parallel", jobs.len());
        jobs.par_iter().map(run_job).collect()
    } else {
        jobs.iter().map(run_job).collect()
    };

    let failures: Vec<(String, String)> = results.into_iter().filter_map(Result::err).collect();
    if failures.is_empty() {
        return Ok(());
    }
    if configs.len() == 1 {
        let (_, message) = &failures[0];
        return Err(message.clone().into());
    }
    for (name, message) in &failures {
        error!("Simulation '{}' failed: {}", name, message);
    }
    Err(format!("{} simulation(s) failed", failures.len()).into())
}

/// Load every configuration file found at `path`
fn load_configs(path: &Path) -> Result<Vec<SimulationConfig>, Box<dyn Error>> {
    get_config_files(path)?
        .iter()
        .map(|file| {
            SimulationConfig::from_file(file)
                .map_err(|e| format!("Failed to load {}: {}", file.display(), e).into())
        })
        .collect()
}

/// Write a template configuration with every default spelled out
fn create_config_file(path: &Path) -> Result<(), Box<dyn Error>> {
    validate_output_path(path)?;
    let config = SimulationConfig {
        name: path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("simulation")
            .to_string(),
        ..Default::default()
    };
    config.to_file(path)?;
    println!("Template configuration written to {}", path.display());
    println!("\nYou can now run the simulation with:");
    println!("  pftrack-sim --config {}", path.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    // If --config is provided, load configs first so their logging preferences can apply
    if let Some(ref config_path) = cli.config {
        let configs = load_configs(config_path)?;
        let logging = configs
            .first()
            .map(|c| c.logging.clone())
            .unwrap_or_default();

        // CLI flags take precedence over the configuration
        let log_level = cli.log_level.unwrap_or(logging.level);
        let config_log_file = logging.file.as_ref().map(PathBuf::from);
        let log_file = cli.log_file.as_ref().or(config_log_file.as_ref());
        init_logger(log_level.as_str(), log_file)?;

        info!(
            "Loaded {} configuration(s) from {}",
            configs.len(),
            config_path.display()
        );
        return run_configs(&configs, &cli.output, cli.particles.as_deref(), cli.parallel);
    }

    let log_level = cli.log_level.unwrap_or_default();
    init_logger(log_level.as_str(), cli.log_file.as_ref())?;

    match cli.command {
        Some(Command::Run(args)) => {
            info!(
                "Running '{}' with the {} strategy on a {:?} path",
                args.name, args.strategy, args.path
            );
            let config = args.to_config();
            run_configs(&[config], &cli.output, cli.particles.as_deref(), false)
        }
        Some(Command::CreateConfig(args)) => create_config_file(&args.path),
        None => {
            eprintln!("Error: No command provided. Use -h or --help for usage information.");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse_run(args: &[&str]) -> (Cli, RunArgs) {
        let cli = Cli::try_parse_from(args).unwrap();
        let run = match &cli.command {
            Some(Command::Run(run)) => run.clone(),
            _ => panic!("expected the run subcommand"),
        };
        (cli, run)
    }

    #[test]
    fn test_run_defaults() {
        let (cli, args) = parse_run(&["pftrack-sim", "run"]);
        assert_eq!(cli.output, PathBuf::from("pftrack.csv"));
        assert!(cli.log_level.is_none());
        let config = args.to_config();
        assert_eq!(config.filter, FilterConfig::default());
        assert_eq!(config.frames, 500);
        assert_eq!(config.seed, 42);
        assert_eq!(config.path, TargetPath::default());
    }

    #[test]
    fn test_run_flags() {
        let (cli, args) = parse_run(&[
            "pftrack-sim",
            "run",
            "--strategy",
            "hybrid",
            "-n",
            "250",
            "--stay-rate",
            "0.5",
            "--path",
            "lissajous",
            "--no-noise",
            "--log-level",
            "debug",
            "-o",
            "out/run.csv",
        ]);
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        assert_eq!(cli.output, PathBuf::from("out/run.csv"));
        let config = args.to_config();
        assert_eq!(config.filter.strategy, ResamplingStrategy::Hybrid);
        assert_eq!(config.filter.samples_count, 250);
        assert_eq!(config.filter.stay_rate, 0.5);
        assert_eq!(config.filter.motion_noise, MotionNoise::none());
        assert_eq!(config.filter.sensor_noise, SensorNoise::none());
        assert!(matches!(config.path, TargetPath::Lissajous { .. }));
    }

    #[test]
    fn test_invalid_strategy_rejected() {
        assert!(Cli::try_parse_from(["pftrack-sim", "run", "--strategy", "greedy"]).is_err());
    }

    #[test]
    fn test_target_paths_stay_in_area() {
        for kind in [
            PathKind::Stationary,
            PathKind::Line,
            PathKind::Circle,
            PathKind::Lissajous,
        ] {
            let (_, mut args) =
                parse_run(&["pftrack-sim", "run", "--width", "320", "--height", "200"]);
            args.path = kind;
            let path = args.target_path();
            for frame in 0..args.period {
                let p = path.position(frame);
                assert!((0.0..=320.0).contains(&p.x), "{kind:?} x={}", p.x);
                assert!((0.0..=200.0).contains(&p.y), "{kind:?} y={}", p.y);
            }
        }
    }

    #[test]
    fn test_plan_outputs() {
        let single = plan_outputs(
            &[SimulationConfig::default()],
            Path::new("out.csv"),
            Some(Path::new("cloud.csv")),
        );
        assert_eq!(
            single,
            vec![(PathBuf::from("out.csv"), Some(PathBuf::from("cloud.csv")))]
        );

        let configs = [
            SimulationConfig {
                name: "a".to_string(),
                ..Default::default()
            },
            SimulationConfig {
                name: "b".to_string(),
                ..Default::default()
            },
        ];
        let many = plan_outputs(&configs, Path::new("res/out.csv"), None);
        assert_eq!(many[0], (PathBuf::from("res/out_a.csv"), None));
        assert_eq!(many[1], (PathBuf::from("res/out_b.csv"), None));
    }

    #[test]
    fn test_run_configs_writes_outputs() {
        let dir = tempdir().unwrap();
        let configs: Vec<SimulationConfig> = ["first", "second"]
            .iter()
            .map(|name| SimulationConfig {
                name: name.to_string(),
                frames: 20,
                filter: FilterConfig {
                    samples_count: 50,
                    ..Default::default()
                },
                ..Default::default()
            })
            .collect();
        let output = dir.path().join("nested").join("run.csv");
        let particles = dir.path().join("cloud.csv");
        run_configs(&configs, &output, Some(&particles), true).unwrap();
        for name in ["first", "second"] {
            assert!(dir.path().join("nested").join(format!("run_{name}.csv")).exists());
            assert!(dir.path().join(format!("cloud_{name}.csv")).exists());
        }
    }

    #[test]
    fn test_run_configs_reports_failure() {
        let dir = tempdir().unwrap();
        let bad = SimulationConfig {
            filter: FilterConfig {
                stay_rate: 3.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let result = run_configs(&[bad], &dir.path().join("run.csv"), None, false);
        assert!(result.is_err());
    }

    #[test]
    fn test_create_and_load_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("template.toml");
        create_config_file(&path).unwrap();
        let configs = load_configs(&path).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, "template");
        assert_eq!(configs[0].filter, FilterConfig::default());

        let from_dir = load_configs(dir.path()).unwrap();
        assert_eq!(from_dir, configs);
    }
}
