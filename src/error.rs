use abp_common::ConfigError;
use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, SimError>;

/// Failures surfaced by the engine to its driver.
#[derive(Debug, Error)]
pub enum SimError {
    /// Parameters rejected before the run starts.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The overlap resolver ran out of redraws: parameters are individually valid but
    /// the requested number of particles does not fit the confinement volume.
    #[error("particle density too high for the confinement volume: {reason}")]
    DensityInfeasible { reason: String },

    /// The accelerator could not be set up or failed during a force pass.
    #[error("force backend error: {0}")]
    Backend(String),

    /// A caller handed in a buffer sized for a different ensemble.
    #[error("buffer length mismatch: expected {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Trajectory serialization failed.
    #[error("output encoding error: {0}")]
    Encode(String),
}

impl SimError {
    pub fn is_density_infeasible(&self) -> bool {
        matches!(self, SimError::DensityInfeasible { .. })
    }
}
