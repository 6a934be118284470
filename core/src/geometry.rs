//! Planar geometry helpers used by the motion and weighting steps.
use crate::Point;

/// Euclidean distance between two points.
pub fn distance(p: &Point, q: &Point) -> f64 {
    nalgebra::distance(p, q)
}

/// Signed angle (radians) of the vector pointing from `source` to `destination`.
///
/// Uses the four-quadrant arctangent, so the result lies in $(-\pi, \pi]$. A zero-length vector
/// yields `0.0`.
pub fn bearing(destination: &Point, source: &Point) -> f64 {
    let delta = destination - source;
    delta.y.atan2(delta.x)
}

/// Arithmetic mean of a set of points, each axis averaged independently.
///
/// Returns `None` when `points` is empty.
pub fn estimate(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let count = points.len() as f64;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sum_x / count, sum_y / count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_distance_three_four_five() {
        let d = distance(&Point::new(0.0, 0.0), &Point::new(3.0, 4.0));
        assert_approx_eq!(d, 5.0, 1e-12);
    }

    #[test]
    fn test_distance_symmetric_and_zero() {
        let a = Point::new(12.5, -3.0);
        let b = Point::new(-7.0, 40.25);
        assert_approx_eq!(distance(&a, &b), distance(&b, &a), 1e-12);
        assert_eq!(distance(&a, &a), 0.0);
    }

    #[test]
    fn test_bearing_quadrants() {
        let origin = Point::new(0.0, 0.0);
        assert_approx_eq!(bearing(&Point::new(1.0, 1.0), &origin), PI / 4.0, 1e-12);
        assert_approx_eq!(bearing(&Point::new(-1.0, 1.0), &origin), 3.0 * PI / 4.0, 1e-12);
        assert_approx_eq!(bearing(&Point::new(-1.0, -1.0), &origin), -3.0 * PI / 4.0, 1e-12);
        assert_approx_eq!(bearing(&Point::new(0.0, -2.0), &origin), -PI / 2.0, 1e-12);
        assert_approx_eq!(bearing(&Point::new(-1.0, 0.0), &origin), PI, 1e-12);
    }

    #[test]
    fn test_bearing_is_relative_to_source() {
        let source = Point::new(10.0, 10.0);
        let destination = Point::new(10.0, 20.0);
        assert_approx_eq!(bearing(&destination, &source), PI / 2.0, 1e-12);
    }

    #[test]
    fn test_bearing_degenerate() {
        let p = Point::new(3.0, 3.0);
        assert_eq!(bearing(&p, &p), 0.0);
    }

    #[test]
    fn test_estimate_mean() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(1.0, 3.0),
        ];
        let mean = estimate(&points).unwrap();
        assert_approx_eq!(mean.x, 1.0, 1e-12);
        assert_approx_eq!(mean.y, 1.0, 1e-12);
    }

    #[test]
    fn test_estimate_empty() {
        assert!(estimate(&[]).is_none());
    }
}
