//! Two-dimensional particle filter for tracking a single moving target
//!
//! This crate provides the update cycle of a simple particle filter that follows an unknown target
//! on a bounded plane. A population of hypotheses ("particles") is moved rigidly along with the
//! target's observed motion, scored against a noisy sensor reading by inverse distance, and then
//! replaced by one of three resampling strategies. A fraction of every new generation is always
//! redrawn uniformly over the whole area so that the filter can recover when it loses the target.
//!
//! The filter is deliberately not a Bayesian-optimal estimator: weights are the raw reciprocal of
//! the particle-to-reading distance rather than a calibrated likelihood. What it does provide is a
//! small, deterministic (under a fixed seed) core that can be driven by any frame loop.
//!
//! This crate is primarily built off of the following dependencies:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): Provides the point type used for particles and readings.
//! - [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr): Provides the random source and noise distributions.
//! - [`serde`](https://crates.io/crates/serde): Configuration and simulation records (JSON, YAML, TOML, CSV).
//!
//! ## Crate overview
//!
//! - [geometry]: Distance, bearing and the arithmetic-mean location estimator.
//! - [particle]: Population generation, inverse-distance weighting and the resampling strategies.
//! - [motion]: The rigid motion model and the noisy motion delta.
//! - [sensor]: The per-axis scale and offset noise model that turns a true position into a reading.
//! - [config]: The validated, immutable filter configuration.
//! - [filter]: [`ParticleFilter`](filter::ParticleFilter), which owns the population and the random source for a frame driver.
//! - [sim]: A headless simulation driver with scripted target paths and CSV output.
//!
//! ## Update cycle
//!
//! Every frame the driver supplies the true target position. The filter then
//!
//! 1. skips the frame if the target has not moved since the previous frame,
//! 2. computes the motion delta $(r, \theta)$ from the previous to the current position and adds
//!    Gaussian noise to $r$,
//! 3. translates every particle by $(r \cos\theta, r \sin\theta)$,
//! 4. derives a noisy sensor reading $z$ from the true position,
//! 5. resamples the population against $z$ and optionally reports an estimate.
//!
//! Particle weights are
//!
//! $$
//! w_i = \frac{1}{\max(\lVert p_i - z \rVert, \epsilon)}
//! $$
//!
//! where $\epsilon$ is the configured distance floor, so a particle sitting exactly on the reading
//! receives a large but finite weight.
pub mod config;
pub mod filter;
pub mod geometry;
pub mod motion;
pub mod particle;
pub mod sensor;
pub mod sim;

use nalgebra::Point2;

pub use config::FilterConfig;
pub use filter::ParticleFilter;
pub use geometry::{bearing, distance, estimate};
pub use motion::{MotionDelta, advance, propagate};
pub use particle::{Resampled, ResamplingStrategy, generate_random, initialize_population, resample};

/// A position on the tracking plane.
pub type Point = Point2<f64>;

/// The full population of particle positions.
pub type ParticleSet = Vec<Point>;

/// Errors raised by the filter core.
///
/// None of these are recoverable in the middle of a resampling call. A frame driver that receives
/// one should keep the particle set it had before the failed update.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    /// The filter configuration is invalid.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// A resampling call was handed an empty population.
    #[error("cannot resample an empty particle set")]
    EmptyPopulation,
    /// A strategy produced a population of the wrong size.
    #[error("resampling produced {actual} particles, expected {expected}")]
    PopulationSize { expected: usize, actual: usize },
    /// The particle weights cannot be normalized into a distribution.
    #[error("particle weights sum to {0} and cannot be normalized")]
    DegenerateWeights(f64),
    /// A noise distribution could not be constructed.
    #[error("invalid noise distribution: {0}")]
    Noise(String),
}
