//! voxcell - discrete 3D Voronoi growth simulation
//!
//! Each frame moves a set of weighted generators, voxelizes their Voronoi
//! partition of the `[-1, 1]³` cube with the Jump Flooding Algorithm and
//! analyzes the result: cell centroids, multi-cell junctions and how many
//! acute junction angles every generator takes part in. The acute counts
//! drive the next frame's motion.
//!
//! [`Simulation`] is the entry point; the stage engines ([`JfaEngine`],
//! [`AnalysisEngine`], [`PhysicsEngine`]) can also be used on their own.

pub mod analysis;
pub mod config;
pub mod error;
pub mod grid;
pub mod jfa;
pub mod legend;
pub mod physics;
pub mod pipeline;
pub mod seeds;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use analysis::{AnalysisEngine, AnalysisReport, AnalysisSettings, Junction};
pub use config::{ConfigFormat, SimulationConfig};
pub use error::{ConfigError, SimError, SimResult};
pub use grid::{UNASSIGNED, VolumeGrid, VoxelGrid};
pub use jfa::JfaEngine;
pub use legend::AcuteLegend;
pub use physics::{FluxNormalization, PhysicsEngine, PhysicsMode, PhysicsSettings, PhysicsStats};
pub use pipeline::{FrameStats, GeneratorSnapshot, Simulation};
pub use seeds::{Generator, SeedStore};
