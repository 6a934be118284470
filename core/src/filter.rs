//! Particle filter state holder for a frame driver.
//!
//! [`ParticleFilter`] owns the population, the validated configuration and the single random
//! source used by every step, so a driver only has to hand it the true target position once per
//! frame (or, for finer control, a motion delta and a sensor reading).
//!
//! # Usage
//!
//! ```rust
//! use pftrack::{FilterConfig, ParticleFilter, Point};
//!
//! let mut pf = ParticleFilter::from_seed(FilterConfig::default(), 42).unwrap();
//! for frame in 1..=10 {
//!     let target = Point::new(100.0 + 5.0 * frame as f64, 200.0);
//!     if let Some(update) = pf.track(&target).unwrap() {
//!         println!("frame {frame}: estimate {:?}", update.estimate);
//!     }
//! }
//! assert_eq!(pf.particles().len(), 1000);
//! ```
use log::warn;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::{self, Debug};

use crate::config::FilterConfig;
use crate::geometry::estimate;
use crate::motion::{MotionDelta, propagate};
use crate::particle::{initialize_population, resample};
use crate::sensor::SensorModel;
use crate::{FilterError, ParticleSet, Point};

/// Everything one processed frame produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameUpdate {
    /// True target position supplied by the driver.
    pub target: Point,
    /// Noisy motion delta applied to the particle cloud.
    pub motion: MotionDelta,
    /// Sensor reading the population was resampled against.
    pub sensor: Point,
    /// Location estimate reported by the strategy, if it reports one.
    pub estimate: Option<Point>,
}

pub struct ParticleFilter<R: Rng = StdRng> {
    config: FilterConfig,
    sensor: SensorModel,
    particles: ParticleSet,
    rng: R,
    previous_target: Point,
    last_estimate: Option<Point>,
    skipped_frames: usize,
}

impl<R: Rng> Debug for ParticleFilter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mean = estimate(&self.particles);
        f.debug_struct("ParticleFilter")
            .field("num_particles", &self.particles.len())
            .field("strategy", &self.config.strategy)
            .field(
                "population_mean",
                &mean.map(|m| format!("({:.2}, {:.2})", m.x, m.y)),
            )
            .field(
                "last_estimate",
                &self.last_estimate.map(|m| format!("({:.2}, {:.2})", m.x, m.y)),
            )
            .field("skipped_frames", &self.skipped_frames)
            .finish()
    }
}

impl ParticleFilter<StdRng> {
    /// Create a filter with a seeded [`StdRng`], for reproducible runs.
    pub fn from_seed(config: FilterConfig, seed: u64) -> Result<Self, FilterError> {
        Self::new(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ParticleFilter<R> {
    /// Validate `config` and draw the initial population from `rng`.
    ///
    /// The previous target position starts at the origin.
    pub fn new(config: FilterConfig, mut rng: R) -> Result<Self, FilterError> {
        let particles = initialize_population(&config, &mut rng)?;
        Ok(ParticleFilter {
            sensor: SensorModel::new(config.sensor_noise),
            config,
            particles,
            rng,
            previous_target: Point::origin(),
            last_estimate: None,
            skipped_frames: 0,
        })
    }

    /// Set the position the first motion delta is measured from.
    pub fn with_start(mut self, start: Point) -> Self {
        self.previous_target = start;
        self
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn particles(&self) -> &[Point] {
        &self.particles
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    /// Most recent estimate reported by the strategy.
    pub fn last_estimate(&self) -> Option<Point> {
        self.last_estimate
    }

    pub fn previous_target(&self) -> Point {
        self.previous_target
    }

    /// Frames ignored by [`track`](Self::track) because the target had not moved.
    pub fn skipped_frames(&self) -> usize {
        self.skipped_frames
    }

    /// Motion step: translate every particle.
    pub fn advance(&mut self, radius: f64, angle: f64) {
        propagate(&mut self.particles, radius, angle);
    }

    /// Replace the population by resampling against `sensor`.
    ///
    /// On failure the current population is left untouched.
    pub fn resample(&mut self, sensor: &Point) -> Result<Option<Point>, FilterError> {
        let resampled = resample(&self.particles, sensor, &self.config, &mut self.rng)?;
        self.particles = resampled.particles;
        if resampled.estimate.is_some() {
            self.last_estimate = resampled.estimate;
        }
        Ok(resampled.estimate)
    }

    /// Motion step followed by resampling.
    ///
    /// If resampling fails the population is restored to what it was before the motion step.
    pub fn update(
        &mut self,
        motion: MotionDelta,
        sensor: &Point,
    ) -> Result<Option<Point>, FilterError> {
        let prior = self.particles.clone();
        self.advance(motion.radius, motion.angle);
        match self.resample(sensor) {
            Ok(estimate) => Ok(estimate),
            Err(e) => {
                warn!("Update failed, keeping the previous particle set: {}", e);
                self.particles = prior;
                Err(e)
            }
        }
    }

    /// Process one frame given the true target position.
    ///
    /// Returns `Ok(None)` without touching the population when the target is where it was on the
    /// previous processed frame.
    pub fn track(&mut self, target: &Point) -> Result<Option<FrameUpdate>, FilterError> {
        if *target == self.previous_target {
            self.skipped_frames += 1;
            return Ok(None);
        }
        let motion = MotionDelta::between(&self.previous_target, target)
            .with_noise(&self.config.motion_noise, &mut self.rng)?;
        let sensor = self.sensor.observe(target, &mut self.rng);
        let estimate = self.update(motion, &sensor)?;
        self.previous_target = *target;
        Ok(Some(FrameUpdate {
            target: *target,
            motion,
            sensor,
            estimate,
        }))
    }
}
