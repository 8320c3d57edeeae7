use derive_more::derive::Deref;
use nalgebra::DVector;
use num_complex::Complex64;
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

use super::system::network::Network;

/// Voltage of one bus at one iteration; angle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BusVoltage {
    pub bus_id: u32,
    pub vm_pu: f64,
    pub va_degree: f64,
}

impl BusVoltage {
    pub fn from_phasor(bus_id: u32, v: Complex64) -> Self {
        let (vm_pu, va) = v.to_polar();
        Self {
            bus_id,
            vm_pu,
            va_degree: va.to_degrees(),
        }
    }

    pub fn phasor(&self) -> Complex64 {
        Complex64::from_polar(self.vm_pu, self.va_degree.to_radians())
    }
}

/// Reactive power a PV bus was given during one Gauss-Seidel sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PvReactive {
    pub bus_id: u32,
    /// Estimated injection, or the violated bound when `clamped`.
    pub q_pu: f64,
    /// The bus was handled as PQ in that sweep.
    pub clamped: bool,
}

/// State after one iteration. Iteration 0 is the initial state with zero mismatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationSnapshot {
    pub iteration: usize,
    /// Largest absolute mismatch of the round, in p.u.
    pub max_mismatch: f64,
    pub voltages: Vec<BusVoltage>,
    /// Only filled by Gauss-Seidel.
    pub pv_reactive: Vec<PvReactive>,
}

impl IterationSnapshot {
    pub(crate) fn from_phasors(
        iteration: usize,
        max_mismatch: f64,
        net: &Network,
        v: &[Complex64],
    ) -> Self {
        Self {
            iteration,
            max_mismatch,
            voltages: net
                .buses
                .iter()
                .zip(v)
                .map(|(b, &v)| BusVoltage::from_phasor(b.id, v))
                .collect(),
            pv_reactive: Vec::new(),
        }
    }

    pub(crate) fn from_polar(
        iteration: usize,
        max_mismatch: f64,
        net: &Network,
        vm: &DVector<f64>,
        va: &DVector<f64>,
    ) -> Self {
        Self {
            iteration,
            max_mismatch,
            voltages: net
                .buses
                .iter()
                .zip(vm.iter().zip(va.iter()))
                .map(|(b, (&vm_pu, &va))| BusVoltage {
                    bus_id: b.id,
                    vm_pu,
                    va_degree: va.to_degrees(),
                })
                .collect(),
            pv_reactive: Vec::new(),
        }
    }

    pub fn voltage(&self, bus_id: u32) -> Option<&BusVoltage> {
        self.voltages.iter().find(|v| v.bus_id == bus_id)
    }

    pub fn phasors(&self) -> DVector<Complex64> {
        DVector::from_iterator(self.voltages.len(), self.voltages.iter().map(|v| v.phasor()))
    }
}

/// Running maximum of a mismatch metric. Unlike `f64::max`, a NaN on either
/// side sticks, so a diverged round never reads as converged.
pub(crate) fn fold_mismatch(acc: f64, value: f64) -> f64 {
    if acc.is_nan() || value.is_nan() {
        f64::NAN
    } else {
        acc.max(value)
    }
}

/// Ordered iteration history of one solver run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deref)]
pub struct Trace(Vec<IterationSnapshot>);

impl Trace {
    pub(crate) fn push(&mut self, snapshot: IterationSnapshot) {
        self.0.push(snapshot);
    }

    pub fn into_inner(self) -> Vec<IterationSnapshot> {
        self.0
    }

    pub fn final_snapshot(&self) -> Option<&IterationSnapshot> {
        self.0.last()
    }

    /// Number of iterations performed (excluding the initial state).
    pub fn iterations(&self) -> usize {
        self.0.last().map_or(0, |s| s.iteration)
    }

    pub fn final_mismatch(&self) -> Option<f64> {
        self.0.last().map(|s| s.max_mismatch)
    }

    /// True when at least one iteration ran and the last one met `tolerance`
    /// with a finite mismatch.
    pub fn converged(&self, tolerance: f64) -> bool {
        self.0.last().is_some_and(|s| {
            s.iteration > 0 && s.max_mismatch.is_finite() && s.max_mismatch <= tolerance
        })
    }

    /// Complex voltages of the last snapshot, in bus order.
    pub fn final_voltages(&self) -> Option<DVector<Complex64>> {
        self.0.last().map(IterationSnapshot::phasors)
    }

    /// Renders the history as a markdown table, one row per iteration.
    pub fn to_table(&self) -> String {
        let mut builder = Builder::default();
        let mut header = vec!["iter".to_string(), "max mismatch".to_string()];
        if let Some(first) = self.0.first() {
            header.extend(first.voltages.iter().map(|v| format!("V{} (pu∠deg)", v.bus_id)));
        }
        builder.push_record(header);
        for s in &self.0 {
            let mut row = vec![s.iteration.to_string(), format!("{:.6}", s.max_mismatch)];
            row.extend(
                s.voltages
                    .iter()
                    .map(|v| format!("{:.4}∠{:.3}", v.vm_pu, v.va_degree)),
            );
            builder.push_record(row);
        }
        builder.build().with(Style::markdown()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::testcases::ieee3;

    #[test]
    fn test_snapshot_degrees() {
        let net = ieee3();
        let v = vec![
            Complex64::from_polar(1.05, 0.0),
            Complex64::from_polar(1.04, (-10.0f64).to_radians()),
            Complex64::from_polar(0.97, (-20.0f64).to_radians()),
        ];
        let s = IterationSnapshot::from_phasors(3, 1e-4, &net, &v);
        assert_eq!(s.voltages.len(), 3);
        assert_relative_eq!(s.voltage(2).unwrap().va_degree, -10.0, epsilon = 1e-9);
        assert_relative_eq!(s.voltage(3).unwrap().vm_pu, 0.97, epsilon = 1e-12);
        let back = s.phasors();
        for (a, b) in back.iter().zip(v.iter()) {
            assert_relative_eq!((a - b).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_converged_needs_an_iteration() {
        let net = ieee3();
        let mut trace = Trace::default();
        trace.push(IterationSnapshot::from_phasors(0, 0.0, &net, net.create_v_init().as_slice()));
        assert!(!trace.converged(1e-3));
        trace.push(IterationSnapshot::from_phasors(1, 5e-4, &net, net.create_v_init().as_slice()));
        assert!(trace.converged(1e-3));
        assert!(!trace.converged(1e-4));
        assert_eq!(trace.iterations(), 1);
    }

    #[test]
    fn test_non_finite_mismatch_never_converges() {
        assert!(fold_mismatch(0.5, f64::NAN).is_nan());
        assert!(fold_mismatch(f64::NAN, 0.5).is_nan());
        assert_eq!(fold_mismatch(0.5, 0.25), 0.5);

        let net = ieee3();
        let mut trace = Trace::default();
        trace.push(IterationSnapshot::from_phasors(0, 0.0, &net, net.create_v_init().as_slice()));
        trace.push(IterationSnapshot::from_phasors(1, f64::NAN, &net, net.create_v_init().as_slice()));
        assert!(!trace.converged(1e-3));
        trace.push(IterationSnapshot::from_phasors(
            2,
            f64::INFINITY,
            &net,
            net.create_v_init().as_slice(),
        ));
        assert!(!trace.converged(f64::INFINITY));
    }

    #[test]
    fn test_table_has_row_per_iteration() {
        let net = ieee3();
        let mut trace = Trace::default();
        trace.push(IterationSnapshot::from_phasors(0, 0.0, &net, net.create_v_init().as_slice()));
        trace.push(IterationSnapshot::from_phasors(1, 0.25, &net, net.create_v_init().as_slice()));
        let table = trace.to_table();
        assert!(table.contains("V3 (pu∠deg)"));
        assert!(table.contains("0.250000"));
        // header, separator, two rows
        assert_eq!(table.lines().count(), 4);
    }
}
