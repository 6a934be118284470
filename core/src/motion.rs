//! Rigid motion model.
//!
//! The whole particle cloud is assumed to move the way the target moved between two frames. The
//! only uncertainty injected here is Gaussian noise on the displacement radius; the direction is
//! taken as observed.
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::config::MotionNoise;
use crate::geometry::{bearing, distance};
use crate::{FilterError, ParticleSet, Point};

/// A displacement expressed as a length and a heading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionDelta {
    /// Length of the displacement.
    pub radius: f64,
    /// Heading of the displacement in radians, measured from the positive x axis.
    pub angle: f64,
}

impl MotionDelta {
    pub fn new(radius: f64, angle: f64) -> Self {
        MotionDelta { radius, angle }
    }

    /// The displacement that takes `previous` to `current`.
    pub fn between(previous: &Point, current: &Point) -> Self {
        MotionDelta {
            radius: distance(current, previous),
            angle: bearing(current, previous),
        }
    }

    /// Copy of this delta with `Normal(noise.mean, noise.std_dev)` added to the radius.
    pub fn with_noise<R: Rng + ?Sized>(
        &self,
        noise: &MotionNoise,
        rng: &mut R,
    ) -> Result<Self, FilterError> {
        if !noise.mean.is_finite() || !(noise.std_dev >= 0.0) || !noise.std_dev.is_finite() {
            return Err(FilterError::Noise(format!(
                "radius noise needs a finite mean and a non-negative std_dev, got {:?}",
                noise
            )));
        }
        let normal = Normal::new(noise.mean, noise.std_dev)
            .map_err(|e| FilterError::Noise(e.to_string()))?;
        Ok(MotionDelta {
            radius: self.radius + normal.sample(rng),
            angle: self.angle,
        })
    }

    /// Cartesian components `(dx, dy)` of the displacement.
    pub fn components(&self) -> (f64, f64) {
        (
            self.radius * self.angle.cos(),
            self.radius * self.angle.sin(),
        )
    }
}

/// Translate every particle in place by `(radius * cos(angle), radius * sin(angle))`.
pub fn propagate(particles: &mut [Point], radius: f64, angle: f64) {
    let (dx, dy) = MotionDelta::new(radius, angle).components();
    for particle in particles.iter_mut() {
        particle.x += dx;
        particle.y += dy;
    }
}

/// Owning form of [`propagate`].
pub fn advance(mut particles: ParticleSet, radius: f64, angle: f64) -> ParticleSet {
    propagate(&mut particles, radius, angle);
    particles
}
