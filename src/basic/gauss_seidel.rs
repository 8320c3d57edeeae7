use log::{debug, info, warn};
use nalgebra::DVector;
use num_complex::Complex64;
use num_traits::Zero;

use super::{
    error::{PowerFlowError, Result},
    options::SolverOptions,
    system::{
        admittance::{YBus, build_ybus},
        network::{BusKind, Network},
    },
    trace::{IterationSnapshot, PvReactive, Trace, fold_mismatch},
};

/// Gauss-Seidel load flow working directly on the Y-Bus.
///
/// Each sweep updates buses in order, so bus `i` sees the voltages already
/// updated in this sweep for buses `< i` and last sweep's for buses `≥ i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussSeidel {
    pub max_iter: usize,
    pub tolerance: f64,
    /// Overshoot factor `α` in `V = V_old + α (V_calc - V_old)`. Not validated;
    /// values far above ~1.6 oscillate.
    pub acceleration: f64,
}

impl Default for GaussSeidel {
    fn default() -> Self {
        Self::from(&SolverOptions::default())
    }
}

impl From<&SolverOptions> for GaussSeidel {
    fn from(opt: &SolverOptions) -> Self {
        Self {
            max_iter: opt.max_iter,
            tolerance: opt.tolerance,
            acceleration: opt.acceleration,
        }
    }
}

/// Voltages of a sweep in progress.
///
/// Positions `< updated` hold this sweep's values, the rest last sweep's.
struct SweepState<'a> {
    previous: &'a DVector<Complex64>,
    current: &'a mut DVector<Complex64>,
    updated: usize,
}

impl SweepState<'_> {
    #[inline(always)]
    fn voltage(&self, j: usize) -> Complex64 {
        if j < self.updated {
            self.current[j]
        } else {
            self.previous[j]
        }
    }

    /// `Σ_j Y_ij V_j`, optionally skipping the diagonal.
    #[inline(always)]
    fn injected_current(&self, ybus: &YBus, i: usize, skip_diag: bool) -> Complex64 {
        (0..ybus.ncols())
            .filter(|&j| !(skip_diag && j == i))
            .map(|j| ybus[(i, j)] * self.voltage(j))
            .sum()
    }

    fn commit(&mut self, i: usize, v: Complex64) {
        self.current[i] = v;
        self.updated = i + 1;
    }
}

impl GaussSeidel {
    pub fn new(max_iter: usize, tolerance: f64) -> Self {
        Self {
            max_iter,
            tolerance,
            acceleration: 1.0,
        }
    }

    pub fn with_acceleration(mut self, acceleration: f64) -> Self {
        self.acceleration = acceleration;
        self
    }

    /// Builds the Y-Bus and runs the iteration.
    pub fn solve(&self, net: &Network) -> Result<Trace> {
        net.validate()?;
        let ybus = build_ybus(net)?;
        self.solve_with_ybus(net, &ybus)
    }

    /// Runs the iteration on a Y-Bus built from `net`.
    ///
    /// # Errors
    ///
    /// [`PowerFlowError::DivideByZero`] if a non-slack bus has `Y_ii = 0`.
    pub fn solve_with_ybus(&self, net: &Network, ybus: &YBus) -> Result<Trace> {
        let n = net.n_bus();
        if ybus.shape() != (n, n) {
            return Err(PowerFlowError::InvalidNetwork(format!(
                "Y-Bus is {:?}, network has {} buses",
                ybus.shape(),
                n
            )));
        }
        if let Some(bus) = net
            .buses
            .iter()
            .enumerate()
            .find(|(i, b)| !b.kind.is_slack() && ybus[(*i, *i)].is_zero())
            .map(|(_, b)| b)
        {
            return Err(PowerFlowError::DivideByZero(format!(
                "bus {} is isolated (Y_ii = 0)",
                bus.id
            )));
        }

        let p_spec = net.p_spec_pu();
        let q_spec = net.q_spec_pu();
        let mut v = net.create_v_init();

        let mut trace = Trace::default();
        trace.push(IterationSnapshot::from_phasors(0, 0.0, net, v.as_slice()));

        for iteration in 1..=self.max_iter {
            let previous = v.clone();
            let mut state = SweepState {
                previous: &previous,
                current: &mut v,
                updated: 0,
            };
            let (max_mismatch, pv_reactive) =
                self.sweep(net, ybus, &p_spec, &q_spec, &mut state);

            let mut snapshot =
                IterationSnapshot::from_phasors(iteration, max_mismatch, net, v.as_slice());
            snapshot.pv_reactive = pv_reactive;
            trace.push(snapshot);
            debug!("gauss-seidel iteration {iteration}: max mismatch {max_mismatch:.3e}");

            if !max_mismatch.is_finite() {
                warn!("gauss-seidel diverged at iteration {iteration}");
                return Ok(trace);
            }
            if max_mismatch <= self.tolerance {
                info!("gauss-seidel converged in {iteration} iterations");
                return Ok(trace);
            }
        }
        warn!(
            "gauss-seidel stopped after {} iterations, mismatch {:.3e} > {:.3e}",
            self.max_iter,
            trace.final_mismatch().unwrap_or(f64::NAN),
            self.tolerance
        );
        Ok(trace)
    }

    /// One pass over all buses in order. Returns the largest voltage change.
    fn sweep(
        &self,
        net: &Network,
        ybus: &YBus,
        p_spec: &DVector<f64>,
        q_spec: &DVector<f64>,
        state: &mut SweepState,
    ) -> (f64, Vec<PvReactive>) {
        let mut max_mismatch = 0.0f64;
        let mut pv_reactive = Vec::new();

        for (i, bus) in net.buses.iter().enumerate() {
            let v_old = state.voltage(i);
            if bus.kind.is_slack() {
                state.commit(i, v_old);
                continue;
            }

            let (q_used, hold_magnitude) = match bus.kind {
                BusKind::PV { q_lim } => {
                    let q_est = -(v_old.conj() * state.injected_current(ybus, i, false)).im;
                    let bounds = q_lim.map(|l| (l.min / net.base_mva, l.max / net.base_mva));
                    let (q, clamped) = match bounds {
                        Some((q_min, _)) if q_est < q_min => (q_min, true),
                        Some((_, q_max)) if q_est > q_max => (q_max, true),
                        _ => (q_est, false),
                    };
                    pv_reactive.push(PvReactive {
                        bus_id: bus.id,
                        q_pu: q,
                        clamped,
                    });
                    (q, !clamped)
                }
                _ => (q_spec[i], false),
            };

            let s_conj = Complex64::new(p_spec[i], -q_used);
            let others = state.injected_current(ybus, i, true);
            let v_calc = (s_conj / v_old.conj() - others) / ybus[(i, i)];
            let mut v_new = v_old + (v_calc - v_old) * self.acceleration;
            if hold_magnitude {
                v_new = Complex64::from_polar(bus.vm_pu, v_new.arg());
            }

            max_mismatch = fold_mismatch(max_mismatch, (v_new - v_old).norm());
            state.commit(i, v_new);
        }
        (max_mismatch, pv_reactive)
    }
}
