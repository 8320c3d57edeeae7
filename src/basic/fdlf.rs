use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};

use super::{
    error::Result,
    options::SolverOptions,
    solver::{DefaultSolver, Solve},
    system::{
        admittance::{YBus, build_ybus},
        network::{BusPartition, Network},
    },
    trace::{IterationSnapshot, Trace, fold_mismatch},
};

/// Fast decoupled load flow.
///
/// `B'` and `B''` are formed and inverted once per call; every iteration is a
/// P-δ half followed by a Q-V half using those constant inverses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FastDecoupled {
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for FastDecoupled {
    fn default() -> Self {
        Self::from(&SolverOptions::default())
    }
}

impl From<&SolverOptions> for FastDecoupled {
    fn from(opt: &SolverOptions) -> Self {
        Self {
            max_iter: opt.max_iter,
            tolerance: opt.tolerance,
        }
    }
}

/// Trace plus the constant matrices, kept for display.
#[derive(Debug, Clone, PartialEq)]
pub struct FdlfResult {
    pub trace: Trace,
    /// `-Im(Y)` over all non-slack buses.
    pub b_prime: DMatrix<f64>,
    /// `-Im(Y)` over PQ buses only.
    pub b_double_prime: DMatrix<f64>,
}

/// Forms `B'` (non-slack buses) and `B''` (PQ buses) from the Y-Bus.
pub fn decoupled_matrices(ybus: &YBus, part: &BusPartition) -> (DMatrix<f64>, DMatrix<f64>) {
    let restrict = |idx: &[usize]| {
        DMatrix::from_fn(idx.len(), idx.len(), |r, c| -ybus[(idx[r], idx[c])].im)
    };
    (restrict(&part.non_slack), restrict(&part.pq))
}

/// `P_i = Σ_j |V_i||V_j| (G_ij cos δ_ij + B_ij sin δ_ij)`
#[inline(always)]
fn p_calc(
    i: usize,
    vm: &DVector<f64>,
    va: &DVector<f64>,
    g: &DMatrix<f64>,
    b: &DMatrix<f64>,
) -> f64 {
    (0..vm.len())
        .map(|j| {
            let d = va[i] - va[j];
            vm[i] * vm[j] * (g[(i, j)] * d.cos() + b[(i, j)] * d.sin())
        })
        .sum()
}

/// `Q_i = Σ_j |V_i||V_j| (G_ij sin δ_ij - B_ij cos δ_ij)`
#[inline(always)]
fn q_calc(
    i: usize,
    vm: &DVector<f64>,
    va: &DVector<f64>,
    g: &DMatrix<f64>,
    b: &DMatrix<f64>,
) -> f64 {
    (0..vm.len())
        .map(|j| {
            let d = va[i] - va[j];
            vm[i] * vm[j] * (g[(i, j)] * d.sin() - b[(i, j)] * d.cos())
        })
        .sum()
}

impl FastDecoupled {
    pub fn new(max_iter: usize, tolerance: f64) -> Self {
        Self { max_iter, tolerance }
    }

    /// Runs with the default linear backend.
    pub fn solve(&self, net: &Network) -> Result<FdlfResult> {
        self.solve_with(net, &mut DefaultSolver::default())
    }

    /// Runs with an injected linear backend, used only to invert `B'`/`B''`.
    ///
    /// # Errors
    ///
    /// [`PowerFlowError::SingularMatrix`](super::error::PowerFlowError::SingularMatrix)
    /// if `B'` or a non-empty `B''` cannot be inverted, e.g. for a disconnected network.
    pub fn solve_with<S: Solve>(&self, net: &Network, solver: &mut S) -> Result<FdlfResult> {
        net.validate()?;
        let ybus = build_ybus(net)?;
        let part = net.partition()?;

        let (b_prime, b_double_prime) = decoupled_matrices(&ybus, &part);
        let b_prime_inv = solver.inverse(&b_prime)?;
        let b_double_prime_inv = if part.pq.is_empty() {
            None
        } else {
            Some(solver.inverse(&b_double_prime)?)
        };

        let g = ybus.g();
        let b = ybus.b();
        let p_spec = net.p_spec_pu();
        let q_spec = net.q_spec_pu();
        let mut vm = DVector::from_iterator(net.n_bus(), net.buses.iter().map(|b| b.vm_pu));
        let mut va = DVector::from_iterator(
            net.n_bus(),
            net.buses.iter().map(|b| b.va_degree.to_radians()),
        );

        let mut trace = Trace::default();
        trace.push(IterationSnapshot::from_polar(0, 0.0, net, &vm, &va));

        for iteration in 1..=self.max_iter {
            let mut max_mismatch = 0.0f64;

            // P-δ half
            let dp_over_v = DVector::from_iterator(
                part.non_slack.len(),
                part.non_slack.iter().map(|&i| {
                    let dp = p_spec[i] - p_calc(i, &vm, &va, &g, &b);
                    max_mismatch = fold_mismatch(max_mismatch, dp.abs());
                    dp / vm[i]
                }),
            );
            let d_delta = &b_prime_inv * dp_over_v;
            for (k, &i) in part.non_slack.iter().enumerate() {
                va[i] += d_delta[k];
            }

            // Q-V half, on the angles just updated
            if let Some(inv) = &b_double_prime_inv {
                let dq_over_v = DVector::from_iterator(
                    part.pq.len(),
                    part.pq.iter().map(|&i| {
                        let dq = q_spec[i] - q_calc(i, &vm, &va, &g, &b);
                        max_mismatch = fold_mismatch(max_mismatch, dq.abs());
                        dq / vm[i]
                    }),
                );
                let d_vm = inv * dq_over_v;
                for (k, &i) in part.pq.iter().enumerate() {
                    vm[i] += d_vm[k];
                }
            }

            trace.push(IterationSnapshot::from_polar(iteration, max_mismatch, net, &vm, &va));
            debug!("fdlf iteration {iteration}: max mismatch {max_mismatch:.3e}");

            if !max_mismatch.is_finite() {
                warn!("fdlf diverged at iteration {iteration}");
                break;
            }
            if max_mismatch <= self.tolerance {
                info!("fdlf converged in {iteration} iterations");
                return Ok(FdlfResult {
                    trace,
                    b_prime,
                    b_double_prime,
                });
            }
        }
        warn!(
            "fdlf stopped after {} iterations, mismatch {:.3e} > {:.3e}",
            trace.iterations(),
            trace.final_mismatch().unwrap_or(f64::NAN),
            self.tolerance
        );
        Ok(FdlfResult {
            trace,
            b_prime,
            b_double_prime,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::basic::{
        error::PowerFlowError,
        solver::DenseLuSolver,
        system::network::{Branch, Bus},
    };
    use crate::testcases::{ieee14, ieee3};

    #[test]
    fn test_matrices_3bus() {
        let res = FastDecoupled::new(1, 1e-3).solve(&ieee3()).unwrap();
        assert_eq!(res.b_prime.shape(), (2, 2));
        assert_eq!(res.b_double_prime.shape(), (1, 1));
        // -Im(Y22) = 20 + 32 - 0.01
        assert_relative_eq!(res.b_prime[(0, 0)], 51.99, epsilon = 1e-9);
        assert_relative_eq!(res.b_prime[(0, 1)], -32.0, epsilon = 1e-9);
        assert_relative_eq!(res.b_prime[(1, 0)], -32.0, epsilon = 1e-9);
        assert_relative_eq!(res.b_prime[(1, 1)], 61.99, epsilon = 1e-9);
        assert_relative_eq!(res.b_double_prime[(0, 0)], 61.99, epsilon = 1e-9);
    }

    #[test]
    fn test_ieee14_converges() {
        let tol = 1e-6;
        let res = FastDecoupled::new(50, tol).solve(&ieee14()).unwrap();
        assert!(res.trace.converged(tol), "mismatch {:?}", res.trace.final_mismatch());
        assert_eq!(res.b_prime.shape(), (13, 13));
        assert_eq!(res.b_double_prime.shape(), (9, 9));

        // Converged state satisfies the scheduled injections.
        let net = ieee14();
        let ybus = build_ybus(&net).unwrap();
        let v = res.trace.final_voltages().unwrap();
        let s = v.component_mul(&(ybus.matrix() * &v).conjugate());
        let p = net.p_spec_pu();
        let q = net.q_spec_pu();
        let part = net.partition().unwrap();
        for &i in &part.non_slack {
            assert_relative_eq!(s[i].re, p[i], epsilon = 1e-5);
        }
        for &i in &part.pq {
            assert_relative_eq!(s[i].im, q[i], epsilon = 1e-5);
        }
    }

    #[test]
    fn test_deterministic() {
        let a = FastDecoupled::new(10, 1e-9).solve(&ieee14()).unwrap();
        let b = FastDecoupled::new(10, 1e-9).solve(&ieee14()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_backends_agree() {
        let a = FastDecoupled::new(30, 1e-8).solve(&ieee14()).unwrap();
        let b = FastDecoupled::new(30, 1e-8)
            .solve_with(&ieee14(), &mut DenseLuSolver)
            .unwrap();
        assert_eq!(a.b_prime, b.b_prime);
        let (va, vb) = (a.trace.final_voltages().unwrap(), b.trace.final_voltages().unwrap());
        for (x, y) in va.iter().zip(vb.iter()) {
            assert_relative_eq!((x - y).norm(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_pv_and_slack_magnitudes_fixed() {
        let res = FastDecoupled::new(20, 1e-9).solve(&ieee14()).unwrap();
        let net = ieee14();
        for s in res.trace.iter() {
            for (bus, v) in net.buses.iter().zip(&s.voltages) {
                if !bus.kind.is_pq() {
                    assert_eq!(v.vm_pu, bus.vm_pu);
                }
                if bus.kind.is_slack() {
                    assert_eq!(v.va_degree, bus.va_degree);
                }
            }
        }
    }

    #[test]
    fn test_mismatch_settles() {
        let res = FastDecoupled::new(50, 1e-8).solve(&ieee14()).unwrap();
        let m: Vec<f64> = res.trace.iter().map(|s| s.max_mismatch).collect();
        assert_eq!(m[0], 0.0);
        let tail = &m[3..];
        assert!(tail.windows(2).all(|w| w[1] <= w[0]), "{m:?}");
    }

    #[test]
    fn test_no_pq_bus() {
        let net = Network::new(
            100.0,
            vec![Bus::slack(1, 1.0, 0.0), Bus::pv(2, 1.02, 30.0)],
            vec![Branch::new(1, 2, 0.01, 0.1, 0.0)],
        );
        let res = FastDecoupled::new(20, 1e-8).solve(&net).unwrap();
        assert_eq!(res.b_double_prime.shape(), (0, 0));
        assert!(res.trace.converged(1e-8));
        assert!(res.trace.final_snapshot().unwrap().voltage(2).unwrap().va_degree > 0.0);
    }

    #[test]
    fn test_disconnected_network_is_singular() {
        let net = Network::new(
            100.0,
            vec![Bus::slack(1, 1.0, 0.0), Bus::pq(2, 10.0, 0.0), Bus::pq(3, 10.0, 0.0)],
            vec![Branch::new(1, 2, 0.01, 0.1, 0.0)],
        );
        assert!(matches!(
            FastDecoupled::default().solve(&net),
            Err(PowerFlowError::SingularMatrix(_))
        ));
    }
}
