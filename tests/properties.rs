use abp_common::OrientationNoise;
use abp_engine::{enforce_boundary, integrate_step, Cylinder, ForceField, IntegrationConstants, ParticleState, ParticleStreams};
use proptest::prelude::*;

fn coordinate() -> impl Strategy<Value = f64> {
    -1.0e3..1.0e3f64
}

fn positions(max: usize) -> impl Strategy<Value = Vec<[f64; 3]>> {
    prop::collection::vec([coordinate(), coordinate(), coordinate()], 1..max)
}

fn cylinder() -> impl Strategy<Value = Cylinder> {
    (0.5..50.0f64, 0.5..4.0f64, 2.5..10.0f64).prop_map(|(wall, diameter, height_in_diameters)| {
        Cylinder::new(wall, height_in_diameters * diameter, diameter)
    })
}

fn ensemble(points: &[[f64; 3]]) -> ParticleState {
    ParticleState::from_vectors(points, &vec![[0.0, 0.0, 1.0]; points.len()]).unwrap()
}

proptest! {
    #[test]
    fn boundary_pass_contains_every_particle(points in positions(40), cyl in cylinder()) {
        let mut state = ensemble(&points);
        enforce_boundary(&mut state, &cyl);
        for k in 0..state.len() {
            let p = state.position(k);
            prop_assert!(cyl.contains(p.x, p.y, p.z), "{:?} outside {:?}", p, cyl);
        }
    }

    #[test]
    fn boundary_pass_is_idempotent(points in positions(40), cyl in cylinder()) {
        let mut state = ensemble(&points);
        enforce_boundary(&mut state, &cyl);
        let once = state.clone();
        enforce_boundary(&mut state, &cyl);
        prop_assert_eq!(state, once);
    }

    #[test]
    fn integrator_keeps_unit_orientation(
        seed in any::<u64>(),
        de in 0.0..50.0f64,
        uniform in any::<bool>(),
        orientations in prop::collection::vec([-1.0..1.0f64, -1.0..1.0f64, 0.1..1.0f64], 1..30),
    ) {
        let n = orientations.len();
        let mut state = ParticleState::from_vectors(&vec![[0.0; 3]; n], &orientations).unwrap();
        let constants = IntegrationConstants {
            delta: 0.01,
            self_propulsion: 1.0,
            prefactor_orientation: (2.0 * 0.01 * de).sqrt(),
            prefactor_translation: 0.1,
            orientation_noise: if uniform { OrientationNoise::Uniform } else { OrientationNoise::Gaussian },
        };
        let mut streams = ParticleStreams::new(seed, n);
        let forces = ForceField::zeros(n);
        for _ in 0..5 {
            integrate_step(&mut state, &forces, &constants, &mut streams).unwrap();
            for k in 0..n {
                prop_assert!((state.orientation(k).length() - 1.0).abs() < 1e-10);
            }
        }
    }
}
