//! Active Brownian particles confined to a cylinder.
//!
//! Each step computes short-range pair forces, advances orientations and positions with an
//! Euler–Maruyama update and folds escaped particles back into the cylinder. The initial
//! ensemble is drawn at random and separated by [`overlap::resolve_overlaps`].

pub mod boundary;
pub mod ensemble;
pub mod error;
pub mod forces;
pub mod integrator;
pub mod noise;
pub mod output;
pub mod overlap;
pub mod simulation;

pub use boundary::{enforce_boundary, Cylinder};
pub use ensemble::{ParticleState, Placement};
pub use error::{Result, SimError};
pub use forces::{select_force_engine, ForceEngine, ForceField, ForceParams, ParallelCpuForces};
pub use integrator::{integrate_step, IntegrationConstants};
pub use noise::ParticleStreams;
pub use output::{open_writer, TrajectoryWriter};
pub use overlap::{resolve_overlaps, OverlapReport};
pub use simulation::{AbpSimulation, RunSummary};
