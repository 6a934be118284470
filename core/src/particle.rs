//! Particle population, inverse-distance weighting and the resampling strategies.
use log::{debug, trace};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::config::FilterConfig;
use crate::geometry::{distance, estimate};
use crate::{FilterError, ParticleSet, Point};

/// Draw `count` points uniformly over `[0, width) x [0, height)`.
pub fn generate_random<R: Rng + ?Sized>(
    count: usize,
    width: f64,
    height: f64,
    rng: &mut R,
) -> ParticleSet {
    (0..count)
        .map(|_| Point::new(rng.random_range(0.0..width), rng.random_range(0.0..height)))
        .collect()
}

/// Create the initial population for a validated configuration.
pub fn initialize_population<R: Rng + ?Sized>(
    config: &FilterConfig,
    rng: &mut R,
) -> Result<ParticleSet, FilterError> {
    config.validate()?;
    Ok(generate_random(
        config.samples_count,
        config.area_width,
        config.area_height,
        rng,
    ))
}

/// Selection weight of a single particle: `1 / max(distance, distance_floor)`.
pub fn weight(particle: &Point, sensor: &Point, distance_floor: f64) -> f64 {
    1.0 / distance(particle, sensor).max(distance_floor)
}

/// Weights of every particle against one sensor reading.
pub fn weights(particles: &[Point], sensor: &Point, distance_floor: f64) -> Vec<f64> {
    let weights: Vec<f64> = particles
        .iter()
        .map(|p| weight(p, sensor, distance_floor))
        .collect();
    let ceiling = 1.0 / distance_floor;
    let clamped = weights.iter().filter(|&&w| w >= ceiling).count();
    if clamped > 0 {
        trace!("{} particle(s) within the distance floor of the reading", clamped);
    }
    weights
}

/// Scale weights so they sum to one.
pub fn normalize(weights: &[f64]) -> Result<Vec<f64>, FilterError> {
    let sum: f64 = weights.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return Err(FilterError::DegenerateWeights(sum));
    }
    Ok(weights.iter().map(|w| w / sum).collect())
}

/// Draw `count` particles with replacement, each with probability proportional to its
/// inverse distance to `sensor` (roulette wheel selection).
pub fn proportional_select<R: Rng + ?Sized>(
    particles: &[Point],
    sensor: &Point,
    count: usize,
    distance_floor: f64,
    rng: &mut R,
) -> Result<ParticleSet, FilterError> {
    if particles.is_empty() {
        return Err(FilterError::EmptyPopulation);
    }
    let probabilities = normalize(&weights(particles, sensor, distance_floor))?;
    let cumulative: Vec<f64> = probabilities
        .iter()
        .scan(0.0, |acc, &p| {
            *acc += p;
            Some(*acc)
        })
        .collect();
    let total = cumulative[cumulative.len() - 1];
    let last = particles.len() - 1;
    Ok((0..count)
        .map(|_| {
            let u = rng.random::<f64>() * total;
            let index = cumulative.partition_point(|&c| c <= u).min(last);
            particles[index]
        })
        .collect())
}

/// The `count` particles closest to `sensor`, nearest first.
///
/// Ranking uses a stable sort, so particles at equal distance keep their original relative order.
pub fn select_best(particles: &[Point], sensor: &Point, count: usize) -> ParticleSet {
    let mut ranked: Vec<(f64, usize)> = particles
        .iter()
        .enumerate()
        .map(|(i, p)| (distance(p, sensor), i))
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
    ranked
        .into_iter()
        .take(count)
        .map(|(_, i)| particles[i])
        .collect()
}

/// Result of one resampling call.
#[derive(Clone, Debug, PartialEq)]
pub struct Resampled {
    /// The next generation.
    pub particles: ParticleSet,
    /// Mean of the verbatim-selected survivors, when the strategy has any.
    pub estimate: Option<Point>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ResamplingStrategy {
    /// Keep the closest `floor(stay_rate * N)` particles verbatim.
    #[default]
    Elitist,
    /// Draw `ceil(stay_rate * N)` particles with replacement by inverse-distance weight.
    Proportional,
    /// Elitist selection for `floor(best_select_rate * N)` particles, proportional draws for
    /// the rest of the stay quota.
    Hybrid,
}

impl Display for ResamplingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResamplingStrategy::Elitist => "elitist",
            ResamplingStrategy::Proportional => "proportional",
            ResamplingStrategy::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

impl ResamplingStrategy {
    /// Build the next generation from `particles` against one sensor reading.
    ///
    /// The returned population always holds `config.samples_count` particles: a survivor
    /// portion derived from `particles` followed by a refill portion drawn uniformly over the
    /// whole area.
    pub fn resample<R: Rng + ?Sized>(
        &self,
        particles: &[Point],
        sensor: &Point,
        config: &FilterConfig,
        rng: &mut R,
    ) -> Result<Resampled, FilterError> {
        if particles.is_empty() {
            return Err(FilterError::EmptyPopulation);
        }
        config.check()?;
        let resampled = match self {
            ResamplingStrategy::Elitist => Self::elitist_resample(particles, sensor, config, rng),
            ResamplingStrategy::Proportional => {
                Self::proportional_resample(particles, sensor, config, rng)?
            }
            ResamplingStrategy::Hybrid => Self::hybrid_resample(particles, sensor, config, rng)?,
        };
        if resampled.particles.len() != config.samples_count {
            return Err(FilterError::PopulationSize {
                expected: config.samples_count,
                actual: resampled.particles.len(),
            });
        }
        Ok(resampled)
    }

    fn elitist_resample<R: Rng + ?Sized>(
        particles: &[Point],
        sensor: &Point,
        config: &FilterConfig,
        rng: &mut R,
    ) -> Resampled {
        let stay_count = config.elitist_stay_count();
        let mut next = select_best(particles, sensor, stay_count);
        let estimate = estimate(&next);
        let refill = config.samples_count - stay_count;
        next.extend(generate_random(
            refill,
            config.area_width,
            config.area_height,
            rng,
        ));
        debug!(
            "elitist resample: {} survivors, {} refill",
            stay_count, refill
        );
        Resampled {
            particles: next,
            estimate,
        }
    }

    fn proportional_resample<R: Rng + ?Sized>(
        particles: &[Point],
        sensor: &Point,
        config: &FilterConfig,
        rng: &mut R,
    ) -> Result<Resampled, FilterError> {
        let stay_count = config.proportional_stay_count();
        let mut next =
            proportional_select(particles, sensor, stay_count, config.distance_floor, rng)?;
        let refill = config.samples_count - stay_count;
        next.extend(generate_random(
            refill,
            config.area_width,
            config.area_height,
            rng,
        ));
        debug!(
            "proportional resample: {} survivors, {} refill",
            stay_count, refill
        );
        Ok(Resampled {
            particles: next,
            estimate: None,
        })
    }

    fn hybrid_resample<R: Rng + ?Sized>(
        particles: &[Point],
        sensor: &Point,
        config: &FilterConfig,
        rng: &mut R,
    ) -> Result<Resampled, FilterError> {
        let (elite_count, weighted_count, refill) = config.hybrid_counts();
        let mut next = select_best(particles, sensor, elite_count);
        let estimate = estimate(&next);
        // weighted draws range over the whole population, elites included
        next.extend(proportional_select(
            particles,
            sensor,
            weighted_count,
            config.distance_floor,
            rng,
        )?);
        next.extend(generate_random(
            refill,
            config.area_width,
            config.area_height,
            rng,
        ));
        debug!(
            "hybrid resample: {} elite, {} weighted, {} refill",
            elite_count, weighted_count, refill
        );
        Ok(Resampled {
            particles: next,
            estimate,
        })
    }
}

/// Resample `particles` with the strategy selected in `config`.
pub fn resample<R: Rng + ?Sized>(
    particles: &[Point],
    sensor: &Point,
    config: &FilterConfig,
    rng: &mut R,
) -> Result<Resampled, FilterError> {
    config.strategy.resample(particles, sensor, config, rng)
}
