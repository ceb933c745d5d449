use abp_common::{OrientationNoise, SimulationConfig};
use abp_engine::output::{BinaryTrajectoryWriter, CsvTrajectoryWriter};
use abp_engine::overlap::min_pair_distance;
use abp_engine::{
    enforce_boundary, integrate_step, resolve_overlaps, AbpSimulation, Cylinder, ForceEngine, ForceField,
    ForceParams, IntegrationConstants, ParallelCpuForces, ParticleState, ParticleStreams, Placement,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn single(position: [f64; 3]) -> ParticleState {
    ParticleState::from_vectors(&[position], &[[0.0, 0.0, 1.0]]).unwrap()
}

fn config(extra: &str) -> SimulationConfig {
    let text = format!(
        r#"
        [particles]
        count = 30

        [dynamics]
        timestep = 0.001
        translational_diffusion = 1.0
        rotational_diffusion = 3.0
        self_propulsion = 5.0

        [interaction]
        epsilon = 1.0

        [confinement]
        wall_radius = 5.0
        height = 6.0

        [timing]
        total_steps = 40
        output_interval = 8

        [initial_conditions]
        seed = 2024

        [execution]
        backend = "cpu"

        [output]
        base_filename = "scenario"
        {extra}
        "#
    );
    toml::from_str(&text).unwrap()
}

#[test]
fn particle_outside_wall_is_projected() {
    let mut state = single([15.0, 0.0, 0.0]);
    enforce_boundary(&mut state, &Cylinder::new(10.0, 20.0, 1.0));
    assert!((state.x[0] - 10.0).abs() < 1e-12);
    assert_eq!((state.y[0], state.z[0]), (0.0, 0.0));
}

#[test]
fn particle_at_centre_is_untouched() {
    let mut state = single([0.0, 0.0, 0.0]);
    enforce_boundary(&mut state, &Cylinder::new(10.0, 20.0, 1.0));
    assert_eq!(state.position(0).to_array(), [0.0, 0.0, 0.0]);
}

#[test]
fn close_pair_is_pushed_apart() {
    let mut state =
        ParticleState::from_vectors(&[[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]], &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]).unwrap();
    let placement = Placement::new(10.0, 19.5).unwrap();
    let mut rng = StdRng::seed_from_u64(77);
    resolve_overlaps(&mut state, &placement, 1.5, 3, 32, &mut rng).unwrap();
    assert!(min_pair_distance(&state) >= 1.5);
}

#[test]
fn deep_escape_above_the_lid_resets() {
    let mut state = single([0.0, 0.0, 19.5 + 10.0]);
    enforce_boundary(&mut state, &Cylinder::new(10.0, 20.0, 1.0));
    assert_eq!(state.z[0], 18.0);
}

#[test]
fn free_rotation_only_leaves_positions() {
    let placement = Placement::new(10.0, 19.5).unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let mut state = ParticleState::random(20, &placement, &mut rng);
    let before = state.clone();

    // ε = 0 makes the force pass inert.
    let params = ForceParams {
        potential: abp_common::PairPotential::LennardJones,
        prefactor: 0.0,
        cutoff: 5.0,
        force_cap: 1.0,
    };
    let mut forces = ForceField::zeros(20);
    ParallelCpuForces::new().compute_forces(&state, &params, &mut forces).unwrap();

    let constants = IntegrationConstants {
        delta: 0.01,
        self_propulsion: 0.0,
        prefactor_orientation: (2.0 * 0.01 * 1.0f64).sqrt(),
        prefactor_translation: 0.0,
        orientation_noise: OrientationNoise::Gaussian,
    };
    let mut streams = ParticleStreams::new(5, 20);
    integrate_step(&mut state, &forces, &constants, &mut streams).unwrap();

    assert_eq!((&state.x, &state.y, &state.z), (&before.x, &before.y, &before.z));
}

#[test]
fn full_run_stays_contained_and_normalized() {
    let mut sim = AbpSimulation::new(config("")).unwrap();
    let cylinder = Cylinder::from_params(sim.params());
    for _ in 0..60 {
        sim.step().unwrap();
        let state = sim.state();
        for k in 0..state.len() {
            let p = state.position(k);
            assert!(cylinder.contains(p.x, p.y, p.z), "particle {k} escaped: {p:?}");
            assert!((state.orientation(k).length() - 1.0).abs() < 1e-10);
        }
    }
}

#[test]
fn binary_trajectory_header_matches_run() {
    let mut sim = AbpSimulation::new(config("format = \"binary\"")).unwrap();
    let frames = sim.params().frame_count();
    assert_eq!(frames, 5);

    let mut writer = BinaryTrajectoryWriter::new(Vec::new(), 30, frames, sim.params().total_steps).unwrap();
    let summary = sim.run(&mut writer).unwrap();
    assert_eq!(summary.frames, frames);

    let bytes = writer.into_inner();
    let frame_bytes = 4 + 6 * 30 * 8;
    assert_eq!(bytes.len(), 8 + frames as usize * frame_bytes);
    let step_of = |frame: usize| {
        let at = 8 + frame * frame_bytes;
        i32::from_ne_bytes(bytes[at..at + 4].try_into().unwrap())
    };
    assert_eq!((0..5).map(step_of).collect::<Vec<_>>(), vec![0, 8, 16, 24, 32]);
}

#[test]
fn csv_trajectory_has_one_row_per_particle_and_frame() {
    let mut sim = AbpSimulation::new(config("")).unwrap();
    let mut writer = CsvTrajectoryWriter::new(Vec::new()).unwrap();
    sim.run(&mut writer).unwrap();
    let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
    assert_eq!(text.lines().count(), 1 + 5 * 30);
    assert!(text.starts_with("Particles,x-position,y-position,z-position,"));
}

#[test]
fn overcrowded_configuration_is_density_infeasible() {
    let mut config = config("");
    config.particles.count = 400;
    config.confinement.wall_radius = 2.0;
    config.confinement.height = 3.0;
    let err = AbpSimulation::new(config).err().unwrap();
    assert!(err.is_density_infeasible());
}
