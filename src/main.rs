use abp_common::{Backend, SimulationConfig};
use abp_engine::output::{final_state_path, open_writer, trajectory_path, write_final_state};
use abp_engine::{AbpSimulation, SimError};
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

/// Particle count above which a run is flagged as slow on the all-pairs force pass.
const LARGE_ENSEMBLE_WARNING: u32 = 10_000;

/// Exit code for an ensemble too dense to place without overlaps.
const EXIT_DENSITY_INFEASIBLE: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about = "Active Brownian particles in a cylindrical confinement")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the run seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the force backend (auto, cpu, gpu)
    #[arg(long, value_parser = parse_backend)]
    backend: Option<Backend>,

    /// Override the number of steps
    #[arg(long)]
    steps: Option<u32>,
}

fn parse_backend(s: &str) -> Result<Backend, String> {
    match s.to_ascii_lowercase().as_str() {
        "auto" => Ok(Backend::Auto),
        "cpu" => Ok(Backend::Cpu),
        "gpu" => Ok(Backend::Gpu),
        other => Err(format!("unknown backend '{other}', expected auto, cpu or gpu")),
    }
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            let density = e.downcast_ref::<SimError>().is_some_and(SimError::is_density_infeasible);
            if density {
                ExitCode::from(EXIT_DENSITY_INFEASIBLE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    info!("Starting active Brownian particle engine...");

    // --- Load Configuration ---
    let mut config = SimulationConfig::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    if let Some(seed) = args.seed {
        config.initial_conditions.seed = Some(seed);
    }
    if let Some(backend) = args.backend {
        config.execution.backend = backend;
    }
    if let Some(steps) = args.steps {
        config.timing.total_steps = steps;
    }

    // --- Configure Rayon Thread Pool (Optional) ---
    if let Some(threads) = config.execution.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("configuring the Rayon thread pool")?;
    }
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    if config.timing.output_interval > config.timing.total_steps {
        warn!(
            "Output interval ({}) exceeds the step count ({}); only the initial configuration will be recorded.",
            config.timing.output_interval, config.timing.total_steps
        );
    }
    if config.particles.count > LARGE_ENSEMBLE_WARNING {
        warn!(
            "{} particles requested; the all-pairs force pass scales quadratically.",
            config.particles.count
        );
    }

    // --- Initialize Simulation ---
    let mut sim = AbpSimulation::new(config)?;
    let params = sim.params().clone();
    info!(
        "Initialized {} particles in cylinder R = {}, h = {} (L = {}).",
        params.num_particles, params.wall_radius, params.half_height, params.particle_diameter
    );
    debug!("Simulation Parameters: {:#?}", params);

    // --- Simulation Loop ---
    let output = sim.config().output.clone();
    let path = trajectory_path(&output.base_filename, output.format);
    let mut writer = open_writer(
        output.format,
        &path,
        params.num_particles as usize,
        params.frame_count(),
        params.total_steps,
    )
    .with_context(|| format!("creating trajectory file {}", path.display()))?;
    info!("Writing {:?} trajectory to {}", output.format, path.display());

    let summary = sim.run(writer.as_mut())?;
    info!(
        "{} steps, {} frames in {:.3} s ({:.3} ms/step).",
        summary.steps,
        summary.frames,
        summary.elapsed.as_secs_f64(),
        summary.elapsed.as_secs_f64() * 1000.0 / summary.steps.max(1) as f64
    );

    // --- Save Final State ---
    if output.save_final_state {
        let final_path = final_state_path(&output.base_filename);
        write_final_state(&final_path, &sim.snapshot())
            .with_context(|| format!("writing final state to {}", final_path.display()))?;
        info!("Final state saved to {}", final_path.display());
    } else {
        info!("Skipping final state as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}
