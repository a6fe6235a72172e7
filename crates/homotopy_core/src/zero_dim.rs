//! Zero-dimensional solving: every isolated solution of a square polynomial
//! system, found by tracking the total-degree homotopy from `t = 1` to `t = 0`.

use anyhow::{anyhow, Context, Result};
use nalgebra::DVector;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::amp::AmpConfig;
use crate::function_tree::Node;
use crate::numeric::MpComplex;
use crate::system::{random_gamma, System, SystemSnapshot, TotalDegree};
use crate::tracking::{PathPoint, PrecisionMode, SuccessCode, Tracker, TrackerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZeroDimConfig {
    pub tracker: TrackerConfig,
    /// Measure the AMP bounds from the homotopy instead of using the configured ones.
    pub amp_bounds_from_system: bool,
    /// Worker threads; paths are tracked on the calling thread when at most one.
    pub num_threads: usize,
    pub seed: u64,
}

impl Default for ZeroDimConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            amp_bounds_from_system: true,
            num_threads: 1,
            seed: 0,
        }
    }
}

/// Outcome of one path.
#[derive(Debug, Clone)]
pub struct PathResult {
    pub index: usize,
    pub code: SuccessCode,
    /// Endpoint in the homotopy's coordinates, homogenizing variable first.
    pub endpoint: PathPoint,
    /// Endpoint in the target's natural coordinates, when the path succeeded.
    pub solution: Option<DVector<Complex64>>,
    pub num_steps: u64,
    pub precision: u32,
}

/// The homotopy and start points prepared from a target system.
pub struct ZeroDimSetup {
    pub homotopy: System,
    pub start_points: Vec<PathPoint>,
    pub tracker: TrackerConfig,
}

/// Homogenizes and patches a copy of `target`, builds its total-degree start
/// system and the straight-line homotopy between them.
pub fn prepare(target: &System, config: &ZeroDimConfig) -> Result<ZeroDimSetup> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut target = target.clone_deep().context("Failed to copy target system")?;
    target.homogenize().context("Failed to homogenize target system")?;
    target.auto_patch(&mut rng).context("Failed to patch target system")?;

    let start = TotalDegree::new(&target, &mut rng).context("Failed to build total degree start system")?;
    tracing::info!(
        degrees = ?start.degrees(),
        paths = start.num_start_points(),
        "Built total degree start system"
    );

    let t = Node::variable("t");
    let gamma = random_gamma(&mut rng);
    let homotopy = System::straight_line_homotopy(&target, start.system(), &gamma, &t)
        .context("Failed to build homotopy")?;

    let mut tracker = config.tracker;
    if config.amp_bounds_from_system && tracker.precision == PrecisionMode::Adaptive {
        let measured = AmpConfig::from_system(&homotopy, &mut rng).context("Failed to measure AMP bounds")?;
        tracker.amp = AmpConfig {
            coefficient_bound: measured.coefficient_bound,
            degree_bound: measured.degree_bound,
            phi: measured.phi,
            psi: measured.psi,
            ..tracker.amp
        };
        tracing::debug!(
            coefficient_bound = tracker.amp.coefficient_bound,
            degree_bound = tracker.amp.degree_bound,
            "Measured AMP bounds"
        );
    }

    let start_points = (0..start.num_start_points())
        .map(|i| -> Result<PathPoint> {
            let point = match tracker.precision {
                PrecisionMode::Multiple(_) => PathPoint::Multiple(start.start_point::<MpComplex>(i)?),
                _ => PathPoint::Double(start.start_point::<Complex64>(i)?),
            };
            Ok(point)
        })
        .collect::<Result<Vec<_>>>()
        .context("Failed to generate start points")?;

    Ok(ZeroDimSetup {
        homotopy,
        start_points,
        tracker,
    })
}

fn track_all(
    homotopy: &mut System,
    config: &TrackerConfig,
    seed: u64,
    paths: &[(usize, PathPoint)],
) -> Result<Vec<PathResult>> {
    let mut tracker = Tracker::new(homotopy, *config)?.with_seed(seed);
    let mut tracked = Vec::with_capacity(paths.len());
    for (index, start) in paths {
        let result = tracker
            .track_path(start, Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0))
            .with_context(|| format!("Failed to track path {}", index))?;
        tracing::debug!(path = index, code = ?result.code, steps = result.num_steps, "Tracked path");
        tracked.push((*index, result));
    }
    drop(tracker);

    tracked
        .into_iter()
        .map(|(index, result)| {
            let solution = if result.code == SuccessCode::Success {
                let natural = homotopy
                    .dehomogenize_point(&result.point.to_double())
                    .with_context(|| format!("Failed to dehomogenize endpoint of path {}", index))?;
                Some(natural)
            } else {
                None
            };
            Ok(PathResult {
                index,
                code: result.code,
                endpoint: result.point,
                solution,
                num_steps: result.num_steps,
                precision: result.precision,
            })
        })
        .collect()
}

/// Tracks every prepared path, across worker threads when configured. Each
/// worker rebuilds its own homotopy from a snapshot, since node values and
/// precision are shared mutable state.
pub fn track(setup: ZeroDimSetup, config: &ZeroDimConfig) -> Result<Vec<PathResult>> {
    let ZeroDimSetup {
        mut homotopy,
        start_points,
        tracker,
    } = setup;
    let paths: Vec<(usize, PathPoint)> = start_points.into_iter().enumerate().collect();

    if config.num_threads <= 1 || paths.len() <= 1 {
        return track_all(&mut homotopy, &tracker, config.seed, &paths);
    }

    let snapshot: SystemSnapshot = homotopy.snapshot();
    let num_workers = config.num_threads.min(paths.len());
    let mut assignments: Vec<Vec<(usize, PathPoint)>> = vec![Vec::new(); num_workers];
    for (k, path) in paths.into_iter().enumerate() {
        assignments[k % num_workers].push(path);
    }

    let mut results: Vec<PathResult> = std::thread::scope(|s| {
        let handles: Vec<_> = assignments
            .iter()
            .enumerate()
            .map(|(worker, assigned)| {
                let snapshot = &snapshot;
                s.spawn(move || -> Result<Vec<PathResult>> {
                    let mut homotopy = snapshot
                        .restore()
                        .with_context(|| format!("Worker {} failed to rebuild the homotopy", worker))?;
                    track_all(&mut homotopy, &tracker, config.seed.wrapping_add(worker as u64), assigned)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().map_err(|_| anyhow!("Path tracking worker panicked"))?)
            .collect::<Result<Vec<Vec<PathResult>>>>()
    })?
    .into_iter()
    .flatten()
    .collect();
    results.sort_by_key(|r| r.index);
    Ok(results)
}

/// Solves `target`: prepares the homotopy and tracks every path.
pub fn solve(target: &System, config: &ZeroDimConfig) -> Result<Vec<PathResult>> {
    config.tracker.validate().context("Invalid tracker configuration")?;
    let setup = prepare(target, config)?;
    let num_paths = setup.start_points.len();
    let results = track(setup, config)?;
    let successes = results.iter().filter(|r| r.code == SuccessCode::Success).count();
    tracing::info!(paths = num_paths, successes, "Zero-dimensional solve finished");
    Ok(results)
}
