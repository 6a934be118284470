//! End-to-end tests for the tracking loop
//!
//! These tests drive the filter the way a frame loop would: through `ParticleFilter`, through the
//! free functions that make up one step, and through `run_simulation` with configurations loaded
//! from disk.

use assert_approx_eq::assert_approx_eq;
use pftrack::config::{MotionNoise, SensorNoise};
use pftrack::motion::MotionDelta;
use pftrack::sim::{LogLevel, SimulationConfig, TargetPath, run_simulation};
use pftrack::{
    FilterConfig, FilterError, ParticleFilter, Point, ResamplingStrategy, advance, distance,
    estimate, initialize_population, resample,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::tempdir;

fn quiet(strategy: ResamplingStrategy) -> FilterConfig {
    FilterConfig {
        samples_count: 500,
        strategy,
        motion_noise: MotionNoise::none(),
        sensor_noise: SensorNoise::none(),
        ..Default::default()
    }
}

#[test]
fn test_stationary_reading_converges() {
    for strategy in [ResamplingStrategy::Elitist, ResamplingStrategy::Hybrid] {
        let mut pf = ParticleFilter::from_seed(quiet(strategy), 11).unwrap();
        let reading = Point::new(250.0, 410.0);
        let mut estimates = Vec::new();
        for _ in 0..60 {
            let estimate = pf.update(MotionDelta::new(0.0, 0.0), &reading).unwrap();
            estimates.push(estimate.unwrap());
        }
        let first = distance(&estimates[0], &reading);
        let last = distance(&estimates[estimates.len() - 1], &reading);
        assert!(last < first, "{strategy}: {first} -> {last}");
        assert!(last < 25.0, "{strategy}: final error {last}");
    }
}

#[test]
fn test_step_functions_compose() {
    let config = quiet(ResamplingStrategy::Elitist);
    let mut rng = StdRng::seed_from_u64(3);
    let particles = initialize_population(&config, &mut rng).unwrap();
    let before = estimate(&particles).unwrap();

    let moved = advance(particles.clone(), 10.0, std::f64::consts::FRAC_PI_2);
    let after = estimate(&moved).unwrap();
    assert_approx_eq!(after.x, before.x, 1e-9);
    assert_approx_eq!(after.y, before.y + 10.0, 1e-9);

    let result = resample(&moved, &Point::new(400.0, 300.0), &config, &mut rng).unwrap();
    assert_eq!(result.particles.len(), config.samples_count);
    assert!(result.estimate.is_some());
}

#[test]
fn test_first_frame_measured_from_origin() {
    let config = FilterConfig {
        samples_count: 300,
        ..Default::default()
    };
    let mut pf = ParticleFilter::from_seed(config, 21).unwrap();
    let update = pf.track(&Point::new(30.0, 40.0)).unwrap().unwrap();
    // radius noise is N(0.1, 5); the angle is never perturbed
    assert!((update.motion.radius - 50.0).abs() < 30.0);
    assert_approx_eq!(update.motion.angle, 40.0f64.atan2(30.0), 1e-12);
    assert_eq!(pf.num_particles(), 300);
    assert_eq!(pf.previous_target(), Point::new(30.0, 40.0));
}

#[test]
fn test_degenerate_reading_is_recoverable() {
    let mut pf = ParticleFilter::from_seed(quiet(ResamplingStrategy::Hybrid), 5).unwrap();
    let before = pf.particles().to_vec();
    let err = pf
        .update(MotionDelta::new(3.0, 1.0), &Point::new(f64::INFINITY, 0.0))
        .unwrap_err();
    assert!(matches!(err, FilterError::DegenerateWeights(_)));
    assert_eq!(pf.particles(), before.as_slice());

    // the next good frame goes through normally
    let estimate = pf
        .update(MotionDelta::new(3.0, 1.0), &Point::new(200.0, 200.0))
        .unwrap();
    assert!(estimate.is_some());
    assert_eq!(pf.num_particles(), 500);
}

#[test]
fn test_simulation_is_reproducible() {
    let config = SimulationConfig {
        frames: 60,
        seed: 7,
        filter: FilterConfig {
            samples_count: 200,
            strategy: ResamplingStrategy::Hybrid,
            ..Default::default()
        },
        ..Default::default()
    };
    let a = run_simulation(&config).unwrap();
    let b = run_simulation(&config).unwrap();
    assert_eq!(a.records, b.records);
    assert_eq!(a.particles, b.particles);

    let other = run_simulation(&SimulationConfig { seed: 8, ..config }).unwrap();
    assert_ne!(a.particles, other.particles);
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempdir().unwrap();
    let mut config = SimulationConfig {
        name: "roundtrip".to_string(),
        frames: 123,
        seed: 99,
        start: [12.5, 7.25],
        path: TargetPath::Lissajous {
            center_x: 400.0,
            center_y: 300.0,
            amplitude_x: 250.0,
            amplitude_y: 150.0,
            frequency_x: 3.0,
            frequency_y: 2.0,
            period: 480,
        },
        ..Default::default()
    };
    config.filter.strategy = ResamplingStrategy::Proportional;
    config.filter.stay_rate = 0.75;
    config.logging.level = LogLevel::Debug;
    config.logging.file = Some("run.log".to_string());

    for name in ["config.json", "config.yaml", "config.yml", "config.toml"] {
        let path = dir.path().join(name);
        config.to_file(&path).unwrap();
        let loaded = SimulationConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config, "{name}");
    }
}

#[test]
fn test_config_file_rejects_unknown_extension() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.ini");
    assert!(SimulationConfig::default().to_file(&path).is_err());
    assert!(SimulationConfig::from_file(&path).is_err());
}

#[test]
fn test_partial_toml_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("partial.toml");
    std::fs::write(
        &path,
        r#"
frames = 10

[filter]
samples_count = 64
strategy = "hybrid"

[path]
kind = "stationary"
x = 5.0
y = 6.0
"#,
    )
    .unwrap();
    let config = SimulationConfig::from_file(&path).unwrap();
    assert_eq!(config.frames, 10);
    assert_eq!(config.seed, 42);
    assert_eq!(config.filter.samples_count, 64);
    assert_eq!(config.filter.strategy, ResamplingStrategy::Hybrid);
    assert_eq!(config.filter.best_select_rate, 0.3);
    assert_eq!(config.path, TargetPath::Stationary { x: 5.0, y: 6.0 });

    let result = run_simulation(&config).unwrap();
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.skipped_frames, 9);
}

#[test]
fn test_csv_export() {
    let dir = tempdir().unwrap();
    let config = SimulationConfig {
        frames: 25,
        filter: FilterConfig {
            samples_count: 100,
            ..Default::default()
        },
        ..Default::default()
    };
    let result = run_simulation(&config).unwrap();
    let records = dir.path().join("records.csv");
    let particles = dir.path().join("particles.csv");
    result.to_csv(&records).unwrap();
    result.particles_to_csv(&particles).unwrap();

    let mut reader = csv::Reader::from_path(&records).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], "frame");
    assert_eq!(&headers[9], "error");
    assert_eq!(reader.records().count(), result.records.len());

    let mut reader = csv::Reader::from_path(&particles).unwrap();
    assert_eq!(reader.records().count(), 100);
}
