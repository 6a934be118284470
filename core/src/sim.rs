//! Headless simulation driver.
//!
//! This module replaces an interactive frame loop with a scripted one:
//! - `TargetPath` generates the true target position for every frame
//! - `SimulationConfig` bundles the filter configuration, the path and run settings, and is read
//!   from or written to JSON, YAML or TOML
//! - `run_simulation` drives a [`ParticleFilter`] through the path and collects one `FrameRecord`
//!   per processed frame
//! - `SimulationResult` exports the records (and the final particle cloud) as CSV
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::config::FilterConfig;
use crate::filter::ParticleFilter;
use crate::geometry::distance;
use crate::{FilterError, ParticleSet, Point};

/// Scripted motion of the true target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetPath {
    /// The target never moves.
    Stationary { x: f64, y: f64 },
    /// Back and forth between two points, one full round trip every `period` frames.
    Line {
        from_x: f64,
        from_y: f64,
        to_x: f64,
        to_y: f64,
        period: usize,
    },
    /// Counter-clockwise circle, one revolution every `period` frames.
    Circle {
        center_x: f64,
        center_y: f64,
        radius: f64,
        period: usize,
    },
    /// Lissajous figure `(cx + ax sin(fx t), cy + ay sin(fy t))` with `t` advancing `2π/period`
    /// per frame.
    Lissajous {
        center_x: f64,
        center_y: f64,
        amplitude_x: f64,
        amplitude_y: f64,
        frequency_x: f64,
        frequency_y: f64,
        period: usize,
    },
}

impl Default for TargetPath {
    fn default() -> Self {
        TargetPath::Circle {
            center_x: 400.0,
            center_y: 300.0,
            radius: 150.0,
            period: 240,
        }
    }
}

fn phase(frame: usize, period: usize) -> f64 {
    TAU * (frame % period.max(1)) as f64 / period.max(1) as f64
}

impl TargetPath {
    /// True target position at `frame`.
    pub fn position(&self, frame: usize) -> Point {
        match *self {
            TargetPath::Stationary { x, y } => Point::new(x, y),
            TargetPath::Line {
                from_x,
                from_y,
                to_x,
                to_y,
                period,
            } => {
                let period = period.max(2);
                let half = period as f64 / 2.0;
                let step = (frame % period) as f64;
                let t = if step <= half {
                    step / half
                } else {
                    (period as f64 - step) / half
                };
                Point::new(from_x + (to_x - from_x) * t, from_y + (to_y - from_y) * t)
            }
            TargetPath::Circle {
                center_x,
                center_y,
                radius,
                period,
            } => {
                let theta = phase(frame, period);
                Point::new(
                    center_x + radius * theta.cos(),
                    center_y + radius * theta.sin(),
                )
            }
            TargetPath::Lissajous {
                center_x,
                center_y,
                amplitude_x,
                amplitude_y,
                frequency_x,
                frequency_y,
                period,
            } => {
                let t = phase(frame, period);
                Point::new(
                    center_x + amplitude_x * (frequency_x * t).sin(),
                    center_y + amplitude_y * (frequency_y * t).sin(),
                )
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Where and how much to log.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Log file path; stderr when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

fn default_frames() -> usize {
    500
}

fn default_seed() -> u64 {
    42
}

fn default_name() -> String {
    "simulation".to_string()
}

/// A complete, reproducible simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Identifier used in logs and output file names.
    #[serde(default = "default_name")]
    pub name: String,
    /// Number of frames to drive.
    #[serde(default = "default_frames")]
    pub frames: usize,
    /// Seed of the single random source shared by every step of the run.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Target position assumed before the first frame.
    #[serde(default)]
    pub start: [f64; 2],
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub path: TargetPath,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            name: default_name(),
            frames: default_frames(),
            seed: default_seed(),
            start: [0.0, 0.0],
            filter: FilterConfig::default(),
            path: TargetPath::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Write the configuration to a JSON file (pretty-printed).
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(io::Error::other)
    }

    /// Read the configuration from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(file).map_err(io::Error::other)
    }

    /// Write the configuration as YAML.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = serde_yaml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }

    /// Read the configuration from YAML.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_yaml::from_reader(file).map_err(io::Error::other)
    }

    /// Write the configuration as TOML.
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = toml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }

    /// Read the configuration from TOML.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut s = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut s)?;
        toml::from_str(&s).map_err(io::Error::other)
    }

    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => self.to_json(p),
            Some("yaml") | Some("yml") => self.to_yaml(p),
            Some("toml") => self.to_toml(p),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported file extension",
            )),
        }
    }

    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => Self::from_json(p),
            Some("yaml") | Some("yml") => Self::from_yaml(p),
            Some("toml") => Self::from_toml(p),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported file extension",
            )),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
}

/// One processed frame, flattened for CSV export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: usize,
    pub target_x: f64,
    pub target_y: f64,
    pub sensor_x: f64,
    pub sensor_y: f64,
    pub motion_radius: f64,
    pub motion_angle: f64,
    pub estimate_x: Option<f64>,
    pub estimate_y: Option<f64>,
    /// Distance from the estimate to the true target.
    pub error: Option<f64>,
}

#[derive(Serialize)]
struct ParticleRecord {
    x: f64,
    y: f64,
}

/// Output of [`run_simulation`].
#[derive(Clone, Debug)]
pub struct SimulationResult {
    pub name: String,
    pub records: Vec<FrameRecord>,
    /// Frames on which the target did not move.
    pub skipped_frames: usize,
    /// Frames whose update failed and was discarded.
    pub failed_frames: usize,
    /// Particle set after the last frame.
    pub particles: ParticleSet,
}

impl SimulationResult {
    /// Mean estimate error over every frame that produced an estimate.
    pub fn mean_error(&self) -> Option<f64> {
        let errors: Vec<f64> = self.records.iter().filter_map(|r| r.error).collect();
        if errors.is_empty() {
            None
        } else {
            Some(errors.iter().sum::<f64>() / errors.len() as f64)
        }
    }

    /// Estimate error of the last frame that produced an estimate.
    pub fn final_error(&self) -> Option<f64> {
        self.records.iter().rev().find_map(|r| r.error)
    }

    /// Write the per-frame records to a CSV file.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the final particle set to a CSV file with `x,y` columns.
    pub fn particles_to_csv<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for p in &self.particles {
            writer.serialize(ParticleRecord { x: p.x, y: p.y })?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Drive a seeded filter along the configured target path.
///
/// A frame whose update fails is logged and dropped; the filter keeps its previous particle set
/// and the run continues. Only an invalid configuration aborts the run.
pub fn run_simulation(config: &SimulationConfig) -> Result<SimulationResult, FilterError> {
    info!(
        "Starting simulation '{}': {} frames, {} particles, {} strategy",
        config.name, config.frames, config.filter.samples_count, config.filter.strategy
    );
    let mut pf = ParticleFilter::from_seed(config.filter.clone(), config.seed)?
        .with_start(Point::new(config.start[0], config.start[1]));
    let mut records = Vec::with_capacity(config.frames);
    let mut failed_frames = 0;
    for frame in 0..config.frames {
        let target = config.path.position(frame);
        match pf.track(&target) {
            Ok(Some(update)) => {
                let error = update.estimate.map(|e| distance(&e, &target));
                records.push(FrameRecord {
                    frame,
                    target_x: target.x,
                    target_y: target.y,
                    sensor_x: update.sensor.x,
                    sensor_y: update.sensor.y,
                    motion_radius: update.motion.radius,
                    motion_angle: update.motion.angle,
                    estimate_x: update.estimate.map(|e| e.x),
                    estimate_y: update.estimate.map(|e| e.y),
                    error,
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Frame {} dropped: {}", frame, e);
                failed_frames += 1;
            }
        }
    }
    let result = SimulationResult {
        name: config.name.clone(),
        records,
        skipped_frames: pf.skipped_frames(),
        failed_frames,
        particles: pf.particles().to_vec(),
    };
    info!(
        "Simulation '{}' complete: {} frames processed, {} skipped, {} failed",
        result.name,
        result.records.len(),
        result.skipped_frames,
        result.failed_frames
    );
    if let Some(mean) = result.mean_error() {
        info!("Mean estimate error: {:.3}", mean);
    }
    Ok(result)
}
