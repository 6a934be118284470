//! Noisy position sensor.
use rand::Rng;

use crate::Point;
use crate::config::SensorNoise;

/// Turns the true target position into a noisy reading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorModel {
    noise: SensorNoise,
}

impl SensorModel {
    pub fn new(noise: SensorNoise) -> Self {
        SensorModel { noise }
    }

    /// Observe `truth`, scaling each axis by an independent uniform factor and then adding the
    /// per-axis offset.
    pub fn observe<R: Rng + ?Sized>(&self, truth: &Point, rng: &mut R) -> Point {
        let sx = self.scale(rng);
        let sy = self.scale(rng);
        Point::new(
            truth.x * sx + self.noise.x_offset,
            truth.y * sy + self.noise.y_offset,
        )
    }

    fn scale<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.noise.scale_min == self.noise.scale_max {
            return self.noise.scale_min;
        }
        rng.random_range(self.noise.scale_min..=self.noise.scale_max)
    }
}
