use abp_common::{SimParams, SimulationConfig, Snapshot};
use crate::boundary::{enforce_boundary, Cylinder};
use crate::ensemble::{ParticleState, Placement};
use crate::error::{Result, SimError};
use crate::forces::{select_force_engine, ForceEngine, ForceField, ForceParams};
use crate::integrator::{integrate_step, IntegrationConstants};
use crate::noise::ParticleStreams;
use crate::output::TrajectoryWriter;
use crate::overlap::{resolve_overlaps, OverlapReport};
use log::{debug, info, trace};
use rand::prelude::*;
use rand::rngs::StdRng;
use std::time::{Duration, Instant};

/// Seconds between progress lines when no frame is being written.
const PROGRESS_INTERVAL_SECS: f64 = 5.0;

/// Totals of a completed [`AbpSimulation::run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub steps: u32,
    pub frames: u32,
    pub elapsed: Duration,
}

/// Owns the ensemble and every per-run resource, and advances them one step at a time.
pub struct AbpSimulation {
    config: SimulationConfig,
    params: SimParams,
    seed: u64,

    state: ParticleState,
    forces: ForceField,
    streams: ParticleStreams,

    engine: Box<dyn ForceEngine>,
    force_params: ForceParams,
    constants: IntegrationConstants,
    cylinder: Cylinder,

    overlap: OverlapReport,
    current_step: u32,
}

impl AbpSimulation {
    /// Validates `config`, draws the initial ensemble, separates overlapping particles
    /// and picks the force strategy.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let params = config.get_sim_params();

        let seed = config.initial_conditions.seed.unwrap_or_else(rand::random);
        info!("Run seed: {}", seed);
        let mut rng = StdRng::seed_from_u64(seed);

        let n = params.num_particles as usize;
        let placement = Placement::from_params(&params)?;
        let mut state = ParticleState::random(n, &placement, &mut rng);

        let overlap = resolve_overlaps(
            &mut state,
            &placement,
            params.min_separation,
            config.initial_conditions.max_redraw_attempts,
            config.initial_conditions.max_overlap_sweeps,
            &mut rng,
        )?;
        info!(
            "Initial overlaps resolved: {} redraws over {} sweeps (min separation {:.3}).",
            overlap.redraws, overlap.sweeps, params.min_separation
        );

        let stream_seed: u64 = rng.random();
        let mut sim = Self::assemble(config, params, seed, state, stream_seed);
        sim.overlap = overlap;
        Ok(sim)
    }

    /// Starts from an explicit ensemble instead of a random draw. No overlap resolution is
    /// applied; `seed` keys the per-particle noise streams.
    pub fn from_state(config: SimulationConfig, state: ParticleState, seed: u64) -> Result<Self> {
        config.validate()?;
        state.check_consistent()?;
        let params = config.get_sim_params();
        if state.len() != params.num_particles as usize {
            return Err(SimError::LengthMismatch {
                expected: params.num_particles as usize,
                found: state.len(),
            });
        }
        Ok(Self::assemble(config, params, seed, state, seed))
    }

    fn assemble(config: SimulationConfig, params: SimParams, seed: u64, state: ParticleState, stream_seed: u64) -> Self {
        let n = state.len();
        let engine = select_force_engine(config.execution.backend, n, config.execution.gpu_particle_threshold);
        info!("Force strategy: {}", engine.name());

        Self {
            force_params: ForceParams::from_params(&params),
            constants: IntegrationConstants::from_params(&params),
            cylinder: Cylinder::from_params(&params),
            forces: ForceField::zeros(n),
            streams: ParticleStreams::new(stream_seed, n),
            engine,
            state,
            config,
            params,
            seed,
            overlap: OverlapReport::default(),
            current_step: 0,
        }
    }

    /// Advances the ensemble by one timestep: force pass, integration, then confinement.
    pub fn step(&mut self) -> Result<()> {
        self.engine.compute_forces(&self.state, &self.force_params, &mut self.forces)?;
        integrate_step(&mut self.state, &self.forces, &self.constants, &mut self.streams)?;
        enforce_boundary(&mut self.state, &self.cylinder);
        self.current_step += 1;
        Ok(())
    }

    /// Runs the configured number of steps. Whenever `t % output_interval == 0`, the state
    /// after `t` steps (`t` counted from zero) goes to `writer` before step `t + 1` is taken,
    /// so the first frame is the initial configuration.
    pub fn run(&mut self, writer: &mut dyn TrajectoryWriter) -> Result<RunSummary> {
        let total_steps = self.params.total_steps;
        let interval = self.params.output_interval;
        info!("Starting simulation loop for {} steps, recording every {} steps...", total_steps, interval);

        let start_time = Instant::now();
        let mut previous_print_time = start_time;
        let mut frames = 0u32;

        for t in 0..total_steps {
            // The frame labelled `t` holds the state after `t` steps, so it is taken first.
            let is_record_step = t % interval == 0;
            if is_record_step {
                writer.write_frame(&self.snapshot())?;
                frames += 1;
                debug!("Recorded frame {} at step {}", frames, t);
            }

            let step_start_time = Instant::now();
            self.step()?;
            let step_duration = step_start_time.elapsed();

            let now = Instant::now();
            let should_print_status = now.duration_since(previous_print_time).as_secs_f64() >= PROGRESS_INTERVAL_SECS;
            if should_print_status || is_record_step || t + 1 == total_steps {
                info!(
                    "Step [{}/{}] (t = {:.4}) | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                    t + 1,
                    total_steps,
                    (t + 1) as f64 * self.params.delta,
                    step_duration.as_secs_f64() * 1000.0,
                    start_time.elapsed().as_secs_f64()
                );
                previous_print_time = now;
            } else {
                trace!("Step [{}/{}] completed in {:.2} ms", t + 1, total_steps, step_duration.as_secs_f64() * 1000.0);
            }
        }

        writer.finish()?;
        let elapsed = start_time.elapsed();
        info!("Simulation finished in {:.3} seconds, {} frames written.", elapsed.as_secs_f64(), frames);
        Ok(RunSummary { steps: total_steps, frames, elapsed })
    }

    /// Current state labelled with the number of steps taken so far.
    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot(self.current_step, self.params.delta)
    }

    pub fn state(&self) -> &ParticleState {
        &self.state
    }

    pub fn forces(&self) -> &ForceField {
        &self.forces
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn overlap_report(&self) -> OverlapReport {
        self.overlap
    }

    /// Steps taken so far.
    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn force_engine_name(&self) -> &'static str {
        self.engine.name()
    }
}
