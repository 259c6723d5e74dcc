//! Centroid-relative growth physics
//!
//! One transition per generator per frame:
//!
//! 1. [`PhysicsMode::decide`] maps `(acute_count, threshold)` to grow,
//!    shrink or hold.
//! 2. The raw flux is `|score - threshold| ^ growth_power`, signed positive
//!    for growth.
//! 3. Raw fluxes are optionally normalized by the frame's largest magnitude.
//! 4. `delta = FLUX_SCALE * flux * growth_rate`, blended with the previous
//!    frame's delta by `damping` and clamped to `±max_delta`.
//! 5. The generator moves `delta` along `normalize(position - centroid)`:
//!    positive delta moves it away from its centroid, negative toward it.
//!    The result is clamped to the `±bound` cube.
//!
//! A held generator does not move and its damping memory is cleared.

use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::seeds::{DEFAULT_BOUND, Generator};

/// Base displacement, in world units, for a flux of 1 at growth rate 1
pub const FLUX_SCALE: f32 = 0.01;

/// Default acute-count threshold
pub const DEFAULT_THRESHOLD: f32 = 6.0;

/// Default growth rate multiplier
pub const DEFAULT_GROWTH_RATE: f32 = 1.0;

/// Default flux exponent (1 = linear response)
pub const DEFAULT_GROWTH_POWER: f32 = 1.0;

/// Default weight of the previous frame's delta
pub const DEFAULT_DAMPING: f32 = 0.5;

/// Default per-frame displacement limit
pub const DEFAULT_MAX_DELTA: f32 = 0.02;

/// Separations shorter than this use the fallback direction
const DIRECTION_EPSILON: f32 = 1e-6;

/// How the acute score and threshold decide growth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhysicsMode {
    /// Grow above the threshold, shrink below it
    #[default]
    Balanced,
    /// Grow above the threshold, never shrink
    GrowthOnly,
    /// Shrink above the threshold, never grow
    ShrinkOnly,
    /// Grow below the threshold, shrink above it
    Inverse,
}

/// Outcome of the mode table for one generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluxDecision {
    Grow,
    Shrink,
    Hold,
}

impl PhysicsMode {
    pub const ALL: [PhysicsMode; 4] = [
        PhysicsMode::Balanced,
        PhysicsMode::GrowthOnly,
        PhysicsMode::ShrinkOnly,
        PhysicsMode::Inverse,
    ];

    /// Apply the mode table to a score
    pub fn decide(self, score: f32, threshold: f32) -> FluxDecision {
        let (grow, shrink) = match self {
            PhysicsMode::Balanced => (score > threshold, score < threshold),
            PhysicsMode::GrowthOnly => (score > threshold, false),
            PhysicsMode::ShrinkOnly => (false, score > threshold),
            PhysicsMode::Inverse => (score < threshold, score > threshold),
        };
        if grow {
            FluxDecision::Grow
        } else if shrink {
            FluxDecision::Shrink
        } else {
            FluxDecision::Hold
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhysicsMode::Balanced => "balanced",
            PhysicsMode::GrowthOnly => "growth_only",
            PhysicsMode::ShrinkOnly => "shrink_only",
            PhysicsMode::Inverse => "inverse",
        }
    }
}

impl fmt::Display for PhysicsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhysicsMode {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        PhysicsMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| SimError::InvalidSettings(format!("unknown physics mode: {s}")))
    }
}

/// Per-frame flux normalization policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FluxNormalization {
    /// Use raw fluxes; only `max_delta` bounds the step
    None,
    /// Divide every flux by the frame's largest |flux|, bounding it to ±1
    #[default]
    MaxAbs,
}

/// Physics configuration; fixed for the duration of a frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    pub threshold: f32,
    pub growth_rate: f32,
    pub mode: PhysicsMode,
    pub growth_power: f32,
    /// Weight of the previous frame's delta, in `[0, 1]`
    pub damping: f32,
    pub max_delta: f32,
    pub normalization: FluxNormalization,
    /// Half-width of the cube positions are clamped to, in `(0, 1]`
    pub bound: f32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            growth_rate: DEFAULT_GROWTH_RATE,
            mode: PhysicsMode::default(),
            growth_power: DEFAULT_GROWTH_POWER,
            damping: DEFAULT_DAMPING,
            max_delta: DEFAULT_MAX_DELTA,
            normalization: FluxNormalization::default(),
            bound: DEFAULT_BOUND,
        }
    }
}

impl PhysicsSettings {
    /// Set the mode
    pub fn with_mode(mut self, mode: PhysicsMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the acute-count threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        let finite = [
            ("threshold", self.threshold),
            ("growth_rate", self.growth_rate),
            ("growth_power", self.growth_power),
            ("damping", self.damping),
            ("max_delta", self.max_delta),
            ("bound", self.bound),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SimError::InvalidSettings(format!(
                "{name} must be finite, got {value}"
            )));
        }
        if self.growth_rate < 0.0 {
            return Err(SimError::InvalidSettings(format!(
                "growth_rate must be non-negative, got {}",
                self.growth_rate
            )));
        }
        if self.growth_power <= 0.0 {
            return Err(SimError::InvalidSettings(format!(
                "growth_power must be positive, got {}",
                self.growth_power
            )));
        }
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(SimError::InvalidSettings(format!(
                "damping must be in [0, 1], got {}",
                self.damping
            )));
        }
        if self.max_delta < 0.0 {
            return Err(SimError::InvalidSettings(format!(
                "max_delta must be non-negative, got {}",
                self.max_delta
            )));
        }
        if self.bound <= 0.0 || self.bound > 1.0 {
            return Err(SimError::InvalidSettings(format!(
                "bound must be in (0, 1], got {}",
                self.bound
            )));
        }
        Ok(())
    }

    /// Signed raw flux for an acute score, before normalization
    pub fn raw_flux(&self, score: f32) -> f32 {
        let magnitude = (score - self.threshold).abs();
        match self.mode.decide(score, self.threshold) {
            FluxDecision::Grow => magnitude.powf(self.growth_power),
            FluxDecision::Shrink => -magnitude.powf(self.growth_power),
            FluxDecision::Hold => 0.0,
        }
    }
}

/// Summary of one physics step
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhysicsStats {
    /// Generators whose delta was non-zero
    pub active_points: u32,
    /// Generators with positive flux
    pub growing_points: u32,
    /// Generators with negative flux
    pub shrinking_points: u32,
    /// Sum of |delta|
    pub total_delta: f32,
    /// Largest |delta|
    pub max_delta: f32,
}

/// Unit direction pointing from a generator's centroid to the generator
///
/// Falls back to [`fallback_direction`] when the two coincide.
pub fn growth_direction(index: usize, position: Vec3, centroid: Vec3) -> Vec3 {
    let separation = position - centroid;
    if separation.length() < DIRECTION_EPSILON {
        fallback_direction(index)
    } else {
        separation.normalize()
    }
}

/// Deterministic pseudo-random unit vector derived from a generator index
pub fn fallback_direction(index: usize) -> Vec3 {
    let base = (index as u32).wrapping_mul(3);
    let component =
        |salt: u32| hash_u32(base.wrapping_add(salt)) as f32 / u32::MAX as f32 * 2.0 - 1.0;
    Vec3::new(component(1), component(2), component(3))
        .try_normalize()
        .unwrap_or(Vec3::X)
}

fn hash_u32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x45d9f3b);
    h ^= h >> 16;
    h = h.wrapping_mul(0x45d9f3b);
    h ^= h >> 16;
    h
}

/// Physics stage with per-generator damping memory
#[derive(Debug, Clone, Default)]
pub struct PhysicsEngine {
    previous_delta: Vec<f32>,
}

impl PhysicsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all damping memory and size it for `count` generators
    pub fn reset(&mut self, count: usize) {
        self.previous_delta.clear();
        self.previous_delta.resize(count, 0.0);
    }

    /// Delta applied to each generator on the last step
    pub fn previous_delta(&self) -> &[f32] {
        &self.previous_delta
    }

    pub(crate) fn restore(&mut self, previous_delta: Vec<f32>) {
        self.previous_delta = previous_delta;
    }

    /// Move every generator according to its acute count and centroid
    ///
    /// `dt` only scales the reported velocity.
    pub fn step(
        &mut self,
        generators: &mut [Generator],
        settings: &PhysicsSettings,
        dt: f32,
    ) -> PhysicsStats {
        if generators.is_empty() {
            return PhysicsStats::default();
        }
        self.previous_delta.resize(generators.len(), 0.0);

        let raw: Vec<f32> = generators
            .par_iter()
            .map(|g| settings.raw_flux(g.acute_count as f32))
            .collect();

        let scale = match settings.normalization {
            FluxNormalization::None => 1.0,
            FluxNormalization::MaxAbs => {
                let max = raw.iter().fold(0.0f32, |m, r| m.max(r.abs()));
                if max > 0.0 { 1.0 / max } else { 1.0 }
            }
        };

        let deltas: Vec<f32> = generators
            .par_iter_mut()
            .zip(self.previous_delta.par_iter_mut())
            .zip(raw.par_iter())
            .enumerate()
            .map(|(index, ((generator, previous), &raw))| {
                apply_flux(index, generator, previous, raw * scale, settings, dt)
            })
            .collect();

        let mut stats = PhysicsStats::default();
        for (&delta, &raw) in deltas.iter().zip(&raw) {
            if raw > 0.0 {
                stats.growing_points += 1;
            } else if raw < 0.0 {
                stats.shrinking_points += 1;
            }
            if delta != 0.0 {
                stats.active_points += 1;
            }
            stats.total_delta += delta.abs();
            stats.max_delta = stats.max_delta.max(delta.abs());
        }
        stats
    }
}

fn apply_flux(
    index: usize,
    generator: &mut Generator,
    previous: &mut f32,
    flux: f32,
    settings: &PhysicsSettings,
    dt: f32,
) -> f32 {
    if flux == 0.0 {
        *previous = 0.0;
        generator.velocity = Vec3::ZERO;
        return 0.0;
    }

    let direction = growth_direction(index, generator.position, generator.centroid);
    let target = FLUX_SCALE * flux * settings.growth_rate;
    let delta = (settings.damping * *previous + (1.0 - settings.damping) * target)
        .clamp(-settings.max_delta, settings.max_delta);
    *previous = delta;

    let before = generator.position;
    let bound = Vec3::splat(settings.bound);
    generator.position = (before + direction * delta).clamp(-bound, bound);
    generator.velocity = if dt > 0.0 {
        (generator.position - before) / dt
    } else {
        Vec3::ZERO
    };
    delta
}
