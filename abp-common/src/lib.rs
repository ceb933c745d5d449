pub mod config;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{
    Backend, ConfigError, ConfinementConfig, DynamicsConfig, ExecutionConfig, InitialConditions,
    InteractionConfig, OrientationNoise, OutputConfig, OutputFormat, PairPotential,
    ParticlesConfig, SimulationConfig, TimingConfig,
};
pub use sim_params::SimParams;
pub use snapshot::Snapshot;
pub use vecmath::Vec3;
