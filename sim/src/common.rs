//! Common utility functions for the simulation binary.
//!
//! This module contains shared utilities for the CLI including:
//! - Logger initialization
//! - Configuration file discovery
//! - Output path handling

use std::error::Error;
use std::path::{Path, PathBuf};

const CONFIG_EXTENSIONS: [&str; 4] = ["json", "yaml", "yml", "toml"];

/// Initialize the logger with the specified configuration.
///
/// # Arguments
/// * `log_level` - Log level string (off, error, warn, info, debug, trace)
/// * `log_file` - Optional path to log file (logs to stderr if None)
///
/// # Errors
/// Returns an error if the log file cannot be opened or logger initialization fails.
pub fn init_logger(log_level: &str, log_file: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    use std::io::Write;

    let level = log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
        log::LevelFilter::Info
    });

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let target = Box::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?,
        );
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.try_init()?;
    Ok(())
}

fn is_config_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| CONFIG_EXTENSIONS.contains(&s.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Get all configuration files from a path (either a single file or every
/// `.json`, `.yaml`, `.yml` and `.toml` file in a directory).
///
/// # Returns
/// A sorted vector of PathBuf for each configuration file found.
///
/// # Errors
/// Returns an error if:
/// - The path does not exist
/// - The input file does not have a configuration extension
/// - No configuration files are found in the directory
pub fn get_config_files(input: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    if input.is_file() {
        if !is_config_file(input) {
            return Err(format!(
                "Input file '{}' is not a JSON, YAML or TOML file.",
                input.display()
            )
            .into());
        }
        Ok(vec![input.to_path_buf()])
    } else if input.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(input)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_config_file(path))
            .collect();

        if files.is_empty() {
            return Err(format!(
                "No configuration files found in directory '{}'.",
                input.display()
            )
            .into());
        }

        files.sort();
        Ok(files)
    } else {
        Err(format!("Input path '{}' does not exist.", input.display()).into())
    }
}

/// Create the parent directory of an output file if needed.
///
/// # Errors
/// Returns an error if directory creation fails.
pub fn validate_output_path(output: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Output file for one of several runs: `{output_stem}_{name}.csv` next to `output`.
pub fn output_for_run(output: &Path, name: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    output.with_file_name(format!("{stem}_{name}.csv"))
}
