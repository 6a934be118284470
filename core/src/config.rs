//! Filter configuration.
//!
//! All tunable constants of the filter live in [`FilterConfig`], which is validated once and then
//! passed by reference to every entry point. Nothing in the crate reads process-wide settings.
use log::warn;
use serde::{Deserialize, Serialize};

use crate::FilterError;
use crate::particle::ResamplingStrategy;

/// Gaussian noise added to the radius of every motion delta.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionNoise {
    /// Mean of the radius noise (pixels).
    pub mean: f64,
    /// Standard deviation of the radius noise (pixels).
    pub std_dev: f64,
}

impl Default for MotionNoise {
    fn default() -> Self {
        MotionNoise {
            mean: 0.1,
            std_dev: 5.0,
        }
    }
}

impl MotionNoise {
    /// No noise at all; the particle cloud moves exactly like the target.
    pub fn none() -> Self {
        MotionNoise {
            mean: 0.0,
            std_dev: 0.0,
        }
    }
}

/// Multiplicative and additive per-axis noise of the position sensor.
///
/// A reading is `(x * sx + x_offset, y * sy + y_offset)` with `sx` and `sy` drawn independently
/// and uniformly from `[scale_min, scale_max]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorNoise {
    pub scale_min: f64,
    pub scale_max: f64,
    pub x_offset: f64,
    pub y_offset: f64,
}

impl Default for SensorNoise {
    fn default() -> Self {
        SensorNoise {
            scale_min: 0.6,
            scale_max: 1.4,
            x_offset: 0.2,
            y_offset: 0.0,
        }
    }
}

impl SensorNoise {
    /// A perfect sensor that reports the true position.
    pub fn none() -> Self {
        SensorNoise {
            scale_min: 1.0,
            scale_max: 1.0,
            x_offset: 0.0,
            y_offset: 0.0,
        }
    }
}

/// Immutable parameters of one filter run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Population size, kept constant across every resample.
    pub samples_count: usize,
    /// Fraction of each generation carried over from the previous one.
    pub stay_rate: f64,
    /// Fraction of the population taken verbatim by the hybrid strategy's elite step.
    pub best_select_rate: f64,
    /// Width of the sampling area; refill x coordinates lie in `[0, area_width)`.
    pub area_width: f64,
    /// Height of the sampling area; refill y coordinates lie in `[0, area_height)`.
    pub area_height: f64,
    /// Active resampling strategy.
    pub strategy: ResamplingStrategy,
    /// Smallest distance used when weighting, so that a particle on top of the reading gets a
    /// finite weight of `1 / distance_floor`.
    pub distance_floor: f64,
    pub motion_noise: MotionNoise,
    pub sensor_noise: SensorNoise,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            samples_count: 1000,
            stay_rate: 0.9,
            best_select_rate: 0.3,
            area_width: 800.0,
            area_height: 600.0,
            strategy: ResamplingStrategy::default(),
            distance_floor: 1e-9,
            motion_noise: MotionNoise::default(),
            sensor_noise: SensorNoise::default(),
        }
    }
}

fn check_rate(name: &str, value: f64) -> Result<(), FilterError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(FilterError::Configuration(format!(
            "{name} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<(), FilterError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(FilterError::Configuration(format!(
            "{name} must be a positive finite number, got {value}"
        )));
    }
    Ok(())
}

impl FilterConfig {
    /// Check every field and fail on the first invalid one.
    ///
    /// Also warns when the hybrid elite count has to be clamped to the stay quota.
    pub fn validate(&self) -> Result<(), FilterError> {
        self.check()?;
        if self.strategy == ResamplingStrategy::Hybrid {
            let requested = (self.best_select_rate * self.samples_count as f64).floor() as usize;
            let quota = self.proportional_stay_count();
            if requested > quota {
                warn!(
                    "Hybrid elite count {} exceeds the stay quota {}; elites will be clamped",
                    requested, quota
                );
            }
        }
        Ok(())
    }

    /// Field checks of [`validate`](Self::validate) without logging, run on every resample.
    pub(crate) fn check(&self) -> Result<(), FilterError> {
        if self.samples_count == 0 {
            return Err(FilterError::Configuration(
                "samples_count must be greater than zero".to_string(),
            ));
        }
        check_rate("stay_rate", self.stay_rate)?;
        check_rate("best_select_rate", self.best_select_rate)?;
        check_positive("area_width", self.area_width)?;
        check_positive("area_height", self.area_height)?;
        check_positive("distance_floor", self.distance_floor)?;
        if !(1.0 / self.distance_floor).is_finite() {
            return Err(FilterError::Configuration(format!(
                "distance_floor {} is too small to give a finite weight",
                self.distance_floor
            )));
        }
        if !self.motion_noise.mean.is_finite()
            || !self.motion_noise.std_dev.is_finite()
            || self.motion_noise.std_dev < 0.0
        {
            return Err(FilterError::Configuration(format!(
                "motion noise needs a finite mean and a non-negative std_dev, got {:?}",
                self.motion_noise
            )));
        }
        let sensor = &self.sensor_noise;
        if ![sensor.scale_min, sensor.scale_max, sensor.x_offset, sensor.y_offset]
            .iter()
            .all(|v| v.is_finite())
            || sensor.scale_min > sensor.scale_max
        {
            return Err(FilterError::Configuration(format!(
                "sensor noise needs finite values with scale_min <= scale_max, got {:?}",
                sensor
            )));
        }
        Ok(())
    }

    /// Survivors kept by elitist truncation: `floor(stay_rate * N)`.
    pub fn elitist_stay_count(&self) -> usize {
        let count = (self.stay_rate * self.samples_count as f64).floor() as usize;
        count.min(self.samples_count)
    }

    /// Survivors drawn by proportional resampling: `ceil(stay_rate * N)`.
    pub fn proportional_stay_count(&self) -> usize {
        let count = (self.stay_rate * self.samples_count as f64).ceil() as usize;
        count.min(self.samples_count)
    }

    /// Split of a hybrid generation into `(elite, weighted, refill)` counts.
    ///
    /// The elite portion counts against the stay quota, so the three always sum to
    /// `samples_count`.
    pub fn hybrid_counts(&self) -> (usize, usize, usize) {
        let quota = self.proportional_stay_count();
        let elite = ((self.best_select_rate * self.samples_count as f64).floor() as usize).min(quota);
        (elite, quota - elite, self.samples_count - quota)
    }
}
