//! End-to-end minimiser runs: convergence, iteration hooks and agreement of
//! distributed runs with single-rank ones.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use approx::assert_abs_diff_eq;
use minim::context::{MinimiserContext, MinimiserKind};
use minim::core::{Potential, State};
use minim::minimiser::{GradDescent, Lbfgs, Minimiser};
use minim::parallel::UniverseComm;
use minim::potentials::Lj3d;
use minim::utils::Status;

fn parabola() -> Arc<Potential> {
    Arc::new(Potential::new(|x: &[f64]| x[0] * x[0], |x: &[f64]| vec![2.0 * x[0]]))
}

fn dimer(separation: f64) -> (Arc<Potential>, Vec<f64>) {
    let pot = Arc::new(Lj3d::default().potential(6).unwrap());
    (pot, vec![0.0, 0.0, 0.0, separation, 0.0, 0.0])
}

fn pair_distances(coords: &[f64]) -> Vec<f64> {
    let n = coords.len() / 3;
    let mut out = Vec::new();
    for i in 0..n {
        for j in i + 1..n {
            let d2: f64 = (0..3).map(|k| (coords[3 * i + k] - coords[3 * j + k]).powi(2)).sum();
            out.push(d2.sqrt());
        }
    }
    out.sort_by(f64::total_cmp);
    out
}

fn separation(state: &State) -> f64 {
    pair_distances(&state.coords().unwrap())[0]
}

#[test]
fn grad_descent_energy_never_increases() {
    let pot = parabola();
    let mut state = pot.new_state(&[3.0], UniverseComm::Serial).unwrap();
    let energies = Rc::new(RefCell::new(Vec::new()));
    let mut gd = GradDescent::new();
    gd.set_alpha(0.1);
    let record = Rc::clone(&energies);
    gd.set_adjust_model(move |_, state| record.borrow_mut().push(state.energy().unwrap()));

    let stats = gd.minimise(&mut state).unwrap();
    assert!(stats.converged());
    assert!(stats.rms_gradient < 1e-6);
    let energies = energies.borrow();
    assert_eq!(energies.len(), stats.iterations);
    assert!(energies.windows(2).all(|w| w[1] <= w[0]));
}

#[test]
fn adjust_model_sees_every_iteration_number() {
    let pot = parabola();
    let mut state = pot.new_state(&[1.0], UniverseComm::Serial).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&seen);
    let mut gd = GradDescent::new();
    gd.set_max_iter(5).set_adjust_model(move |iter, _| record.borrow_mut().push(iter));

    let stats = gd.minimise(&mut state).unwrap();
    assert_eq!(stats.status, Status::MaxIterReached);
    assert_eq!(*seen.borrow(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn adjust_model_can_change_the_state() {
    // pinning the coordinate back each iteration keeps the run from converging
    let pot = parabola();
    let mut state = pot.new_state(&[1.0], UniverseComm::Serial).unwrap();
    let mut gd = GradDescent::new();
    gd.set_alpha(0.25).set_max_iter(4);
    gd.set_adjust_model(|_, state| state.set_block_coords(&[1.0]).unwrap());
    let stats = gd.minimise(&mut state).unwrap();
    assert_eq!(stats.status, Status::MaxIterReached);
    assert_abs_diff_eq!(state.coords().unwrap()[0], 0.5, epsilon = 1e-15);
}

#[test]
fn lbfgs_finds_the_lj_dimer_minimum() {
    let (pot, coords) = dimer(1.5);
    let mut state = pot.new_state(&coords, UniverseComm::Serial).unwrap();
    let mut lbfgs = Lbfgs::new();
    let stats = lbfgs.minimise(&mut state).unwrap();

    assert!(stats.converged());
    assert_eq!(stats.failed_line_searches, 0);
    assert_abs_diff_eq!(separation(&state), 2f64.powf(1.0 / 6.0), epsilon = 1e-5);
    assert_abs_diff_eq!(stats.energy, -1.0, epsilon = 1e-10);
}

#[test]
fn lbfgs_needs_fewer_iterations_than_grad_descent() {
    let (pot, coords) = dimer(1.5);

    let mut lbfgs_state = pot.new_state(&coords, UniverseComm::Serial).unwrap();
    let lbfgs = Lbfgs::new().minimise(&mut lbfgs_state).unwrap();

    let mut gd_state = pot.new_state(&coords, UniverseComm::Serial).unwrap();
    let mut gd = GradDescent::new();
    gd.set_alpha(0.005);
    let gd = gd.minimise(&mut gd_state).unwrap();

    assert!(lbfgs.converged() && gd.converged());
    assert!(lbfgs.iterations < gd.iterations, "{} vs {}", lbfgs.iterations, gd.iterations);
    assert_abs_diff_eq!(separation(&lbfgs_state), separation(&gd_state), epsilon = 1e-5);
}

#[test]
fn zero_step_pair_is_rejected_and_counted() {
    let pot = Arc::new(Potential::new(|_: &[f64]| 0.0, |x: &[f64]| vec![0.0; x.len()]));
    let mut state = pot.new_state(&[1.0, 2.0], UniverseComm::Serial).unwrap();
    let mut lbfgs = Lbfgs::new();
    let stats = lbfgs.minimise(&mut state).unwrap();
    assert!(stats.converged());
    assert_eq!(stats.iterations, 1);
    assert_eq!(stats.rejected_pairs, 1);
    assert!(lbfgs.history().is_some_and(|h| h.is_empty()));
    assert_eq!(state.coords().unwrap(), vec![1.0, 2.0]);
}

#[test]
fn context_respects_the_iteration_cap() {
    let (pot, coords) = dimer(1.5);
    let mut state = pot.new_state(&coords, UniverseComm::Serial).unwrap();
    let stats = MinimiserContext::new(MinimiserKind::GradDescent)
        .with_max_iter(7)
        .run(&mut state)
        .unwrap();
    assert_eq!(stats.status, Status::MaxIterReached);
    assert_eq!(stats.iterations, 7);
}

#[test]
fn looser_convergence_stops_earlier() {
    let (pot, coords) = dimer(1.5);
    let mut tight = pot.new_state(&coords, UniverseComm::Serial).unwrap();
    let mut loose = pot.new_state(&coords, UniverseComm::Serial).unwrap();
    loose.set_convergence(1e-2);
    let tight = Lbfgs::new().minimise(&mut tight).unwrap();
    let loose = Lbfgs::new().minimise(&mut loose).unwrap();
    assert!(loose.converged());
    assert!(loose.rms_gradient < 1e-2);
    assert!(loose.iterations <= tight.iterations);
}

#[cfg(feature = "rayon")]
mod distributed {
    use super::*;
    use minim::parallel::RayonComm;

    /// Slightly distorted tetrahedron; relaxes to the regular one at E = -6.
    const CLUSTER: [f64; 12] = [0.0, 0.0, 0.0, 1.2, 0.1, 0.0, 0.5, 1.0, -0.1, 0.6, 0.4, 0.95];

    #[test]
    fn lbfgs_on_three_ranks_matches_one_rank() {
        let pot = Arc::new(Lj3d::default().potential(CLUSTER.len()).unwrap());

        let mut serial = pot.new_state(&CLUSTER, UniverseComm::Serial).unwrap();
        let reference = Lbfgs::new().minimise(&mut serial).unwrap();
        assert!(reference.converged());
        assert_abs_diff_eq!(reference.energy, -6.0, epsilon = 1e-8);
        let reference_distances = pair_distances(&serial.coords().unwrap());

        let out = RayonComm::run(3, |comm| {
            let mut state = pot.new_state(&CLUSTER, comm.into()).unwrap();
            let stats = Lbfgs::new().minimise(&mut state).unwrap();
            (stats, state.coords().unwrap())
        })
        .unwrap();

        for (stats, coords) in &out {
            assert!(stats.converged());
            assert_eq!(stats.iterations, out[0].0.iterations);
            assert_abs_diff_eq!(stats.energy, reference.energy, epsilon = 1e-8);
            for (d, r) in pair_distances(coords).iter().zip(&reference_distances) {
                assert_abs_diff_eq!(d, r, epsilon = 1e-5);
                assert_abs_diff_eq!(*d, 2f64.powf(1.0 / 6.0), epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn grad_descent_on_four_ranks_matches_one_rank() {
        let pot = Arc::new(Lj3d::default().potential(CLUSTER.len()).unwrap());
        let run = |state: &mut State| {
            let mut gd = GradDescent::new();
            gd.set_alpha(0.002).set_max_iter(50);
            gd.minimise(state).unwrap()
        };

        let mut serial = pot.new_state(&CLUSTER, UniverseComm::Serial).unwrap();
        let reference = run(&mut serial);

        let out = RayonComm::run(4, |comm| {
            let mut state = pot.new_state(&CLUSTER, comm.into()).unwrap();
            let stats = run(&mut state);
            (stats.energy, state.coords().unwrap())
        })
        .unwrap();
        for (energy, coords) in out {
            assert_abs_diff_eq!(energy, reference.energy, epsilon = 1e-10);
            for (a, b) in coords.iter().zip(serial.coords().unwrap()) {
                assert_abs_diff_eq!(*a, b, epsilon = 1e-10);
            }
        }
    }

    const TARGET: [f64; 7] = [0.3, -0.2, 0.9, 0.1, -0.6, 0.4, 0.05];

    /// `(|x|^2 - 1)^2 + 0.5 |x - t|^2`: every DOF couples to every other one,
    /// so it only makes sense as a whole-vector potential.
    fn coupled_energy(x: &[f64]) -> f64 {
        let r2: f64 = x.iter().map(|v| v * v).sum();
        let pull: f64 = x.iter().zip(&TARGET).map(|(v, t)| (v - t).powi(2)).sum();
        (r2 - 1.0).powi(2) + 0.5 * pull
    }

    fn coupled_gradient(x: &[f64]) -> Vec<f64> {
        let r2: f64 = x.iter().map(|v| v * v).sum();
        x.iter().zip(&TARGET).map(|(v, t)| 4.0 * (r2 - 1.0) * v + (v - t)).collect()
    }

    fn coupled_potentials() -> Vec<Arc<Potential>> {
        vec![
            Arc::new(Potential::new(coupled_energy, coupled_gradient)),
            Arc::new(Potential::with_energy_gradient(|x: &[f64], e: Option<&mut f64>, g: Option<&mut [f64]>| {
                if let Some(e) = e {
                    *e = coupled_energy(x);
                }
                if let Some(g) = g {
                    g.copy_from_slice(&coupled_gradient(x));
                }
            })),
        ]
    }

    #[test]
    fn whole_vector_potential_on_several_ranks_matches_one_rank() {
        let start = [1.0, 0.5, -0.5, 0.8, 0.0, -0.3, 0.7];
        for pot in coupled_potentials() {
            let mut serial = pot.new_state(&start, UniverseComm::Serial).unwrap();
            let e0 = serial.energy().unwrap();
            let g0 = serial.gradient().unwrap();
            let reference = Lbfgs::new().minimise(&mut serial).unwrap();
            assert!(reference.converged());
            let x_ref = serial.coords().unwrap();

            for nproc in 2..=4 {
                let out = RayonComm::run(nproc, |comm| {
                    let mut state = pot.new_state(&start, comm.into()).unwrap();
                    let e = state.energy().unwrap();
                    let g = state.gradient().unwrap();
                    let stats = Lbfgs::new().minimise(&mut state).unwrap();
                    (e, g, stats, state.coords().unwrap())
                })
                .unwrap();

                for (e, g, stats, x) in &out {
                    assert_eq!(e.to_bits(), e0.to_bits());
                    assert_eq!(g, &g0);
                    assert!(stats.converged(), "{nproc} ranks: {stats:?}");
                    assert_eq!(stats.iterations, out[0].2.iterations);
                    assert_abs_diff_eq!(stats.energy, reference.energy, epsilon = 1e-10);
                    for (a, b) in x.iter().zip(&x_ref) {
                        assert_abs_diff_eq!(a, b, epsilon = 1e-5);
                    }
                }
            }
        }
    }

    #[test]
    fn a_single_owning_rank_still_minimises() {
        let (pot, coords) = dimer(1.5);
        let out = RayonComm::run(2, |comm| {
            let mut state = pot.new_state_on_ranks(&coords, comm.into(), &[1]).unwrap();
            let nblock = state.comm.nblock();
            let stats = Lbfgs::new().minimise(&mut state).unwrap();
            (nblock, stats, separation(&state))
        })
        .unwrap();
        assert_eq!(out[0].0, 0);
        assert_eq!(out[1].0, 6);
        for (_, stats, r) in out {
            assert!(stats.converged());
            assert_abs_diff_eq!(r, 2f64.powf(1.0 / 6.0), epsilon = 1e-5);
        }
    }
}
