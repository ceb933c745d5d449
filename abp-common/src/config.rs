use serde::{Deserialize, Serialize};
use crate::sim_params::SimParams;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML from '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid { field, reason: reason.into() }
    }
}

// Particle ensemble size and geometry
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ParticlesConfig {
    pub count: u32,
    #[serde(default = "default_diameter")]
    pub diameter: f64, // L
}

// Equations of motion, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DynamicsConfig {
    pub timestep: f64,                // delta
    pub translational_diffusion: f64, // Dt
    pub rotational_diffusion: f64,    // De
    pub self_propulsion: f64,         // vs
    #[serde(default)]
    pub orientation_noise: OrientationNoise,
}

/// Distribution of the three rotational noise samples drawn per particle and step.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrientationNoise {
    /// Standard normal samples.
    #[default]
    Gaussian,
    /// Uniform samples on [0, 1).
    Uniform,
}

/// Pair interaction used by the force pass.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PairPotential {
    /// `48·ε·(2/R¹⁴ − 1/R⁸)`
    #[default]
    LennardJones,
    /// `24·ε/R¹⁴`
    Repulsive,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InteractionConfig {
    pub epsilon: f64,
    #[serde(default)]
    pub potential: PairPotential,
    /// Defaults to five particle diameters.
    #[serde(default)]
    pub cutoff_radius: Option<f64>,
    #[serde(default = "default_force_cap")]
    pub force_cap: f64,
}

// Cylinder spanning -height..height along z
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ConfinementConfig {
    pub wall_radius: f64,
    pub height: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub total_steps: u32,
    pub output_interval: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InitialConditions {
    /// Seed for every random stream of the run. Drawn from OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_min_separation_factor")]
    pub min_separation_factor: f64,
    #[serde(default = "default_max_redraw_attempts")]
    pub max_redraw_attempts: u32,
    #[serde(default = "default_max_overlap_sweeps")]
    pub max_overlap_sweeps: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// CPU below `gpu_particle_threshold`, accelerator above it when available.
    #[default]
    Auto,
    Cpu,
    Gpu,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ExecutionConfig {
    /// Rayon worker count; Rayon's default when absent.
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_gpu_particle_threshold")]
    pub gpu_particle_threshold: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Binary,
    Json,
    Bincode,
    MessagePack,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Binary => "bin",
            OutputFormat::Json => "jsonl",
            OutputFormat::Bincode => "bincode",
            OutputFormat::MessagePack => "msgpack",
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub save_final_state: bool,
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub particles: ParticlesConfig,
    pub dynamics: DynamicsConfig,
    pub interaction: InteractionConfig,
    pub confinement: ConfinementConfig,
    pub timing: TimingConfig,
    #[serde(default)]
    pub initial_conditions: InitialConditions,
    #[serde(default)]
    pub execution: ExecutionConfig,
    pub output: OutputConfig,
}

impl Default for InitialConditions {
    fn default() -> Self {
        InitialConditions {
            seed: None,
            min_separation_factor: default_min_separation_factor(),
            max_redraw_attempts: default_max_redraw_attempts(),
            max_overlap_sweeps: default_max_overlap_sweeps(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            threads: None,
            backend: Backend::Auto,
            gpu_particle_threshold: default_gpu_particle_threshold(),
        }
    }
}

impl SimulationConfig {
    /// Loads and validates the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|source| ConfigError::Io { path: path_ref.to_path_buf(), source })?;
        let config: SimulationConfig = toml::from_str(&config_str)
            .map_err(|source| ConfigError::Parse { path: path_ref.to_path_buf(), source })?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects physically or numerically invalid parameters before any state is allocated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let l = self.particles.diameter;
        if self.particles.count == 0 {
            return Err(ConfigError::invalid("particles.count", "must be greater than 0"));
        }
        if !(l > 0.0) {
            return Err(ConfigError::invalid("particles.diameter", format!("must be positive (got {l})")));
        }

        let d = &self.dynamics;
        if !(d.timestep > 0.0) {
            return Err(ConfigError::invalid("dynamics.timestep", format!("must be positive (got {})", d.timestep)));
        }
        non_negative("dynamics.translational_diffusion", d.translational_diffusion)?;
        non_negative("dynamics.rotational_diffusion", d.rotational_diffusion)?;
        non_negative("dynamics.self_propulsion", d.self_propulsion)?;

        let i = &self.interaction;
        non_negative("interaction.epsilon", i.epsilon)?;
        if let Some(r) = i.cutoff_radius {
            if !(r > 0.0) {
                return Err(ConfigError::invalid("interaction.cutoff_radius", format!("must be positive (got {r})")));
            }
        }
        if !(i.force_cap > 0.0) {
            return Err(ConfigError::invalid("interaction.force_cap", format!("must be positive (got {})", i.force_cap)));
        }

        let c = &self.confinement;
        if !(c.wall_radius > 0.0) {
            return Err(ConfigError::invalid("confinement.wall_radius", format!("must be positive (got {})", c.wall_radius)));
        }
        if !(c.height > 0.0) {
            return Err(ConfigError::invalid("confinement.height", format!("must be positive (got {})", c.height)));
        }
        // Reflection and reset targets must land inside [-height_L, height_L].
        if c.height < 2.5 * l {
            return Err(ConfigError::invalid(
                "confinement.height",
                format!("must be at least 2.5 particle diameters (got {} for L = {l})", c.height),
            ));
        }

        if self.timing.total_steps == 0 {
            return Err(ConfigError::invalid("timing.total_steps", "must be greater than 0"));
        }
        if self.timing.output_interval == 0 {
            return Err(ConfigError::invalid("timing.output_interval", "must be greater than 0"));
        }

        let ic = &self.initial_conditions;
        if !(ic.min_separation_factor > 0.0) {
            return Err(ConfigError::invalid(
                "initial_conditions.min_separation_factor",
                format!("must be positive (got {})", ic.min_separation_factor),
            ));
        }
        if ic.max_overlap_sweeps == 0 {
            return Err(ConfigError::invalid("initial_conditions.max_overlap_sweeps", "must be greater than 0"));
        }

        if self.execution.threads == Some(0) {
            return Err(ConfigError::invalid("execution.threads", "must be greater than 0 when set"));
        }
        if self.output.base_filename.trim().is_empty() {
            return Err(ConfigError::invalid("output.base_filename", "must not be empty"));
        }
        Ok(())
    }

    /// Converts the configuration into the constants used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        let l = self.particles.diameter;
        let delta = self.dynamics.timestep;
        let de = self.dynamics.rotational_diffusion;
        let dt = self.dynamics.translational_diffusion;
        let epsilon = self.interaction.epsilon;
        let cutoff = self.interaction.cutoff_radius.unwrap_or(DEFAULT_CUTOFF_DIAMETERS * l);

        let prefactor_interaction = match self.interaction.potential {
            PairPotential::LennardJones => 48.0 * epsilon,
            PairPotential::Repulsive => 24.0 * epsilon,
        };

        SimParams {
            num_particles: self.particles.count,
            particle_diameter: l,
            delta,
            rotational_diffusion: de,
            translational_diffusion: dt,
            self_propulsion: self.dynamics.self_propulsion,
            prefactor_orientation: (2.0 * delta * de).sqrt(),
            prefactor_translation: (2.0 * delta * dt).sqrt(),
            orientation_noise: self.dynamics.orientation_noise,
            potential: self.interaction.potential,
            prefactor_interaction,
            cutoff_radius: cutoff,
            cutoff_sq: cutoff * cutoff,
            force_cap: self.interaction.force_cap,
            wall_radius: self.confinement.wall_radius,
            half_height: self.confinement.height,
            height_l: self.confinement.height - l / 2.0,
            min_separation: self.initial_conditions.min_separation_factor * l,
            total_steps: self.timing.total_steps,
            output_interval: self.timing.output_interval,
        }
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be non-negative (got {value})")))
    }
}

/// Cutoff radius in particle diameters when none is configured.
pub const DEFAULT_CUTOFF_DIAMETERS: f64 = 5.0;

fn default_diameter() -> f64 {
    1.0
}

fn default_force_cap() -> f64 {
    1.0 // Upper bound on a single pair coefficient
}

fn default_min_separation_factor() -> f64 {
    1.5
}

fn default_max_redraw_attempts() -> u32 {
    3
}

fn default_max_overlap_sweeps() -> u32 {
    32
}

fn default_gpu_particle_threshold() -> u32 {
    500
}
