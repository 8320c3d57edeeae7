use std::collections::HashMap;

use nalgebra::DVector;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::basic::error::{PowerFlowError, Result};

/// A simple structure representing min/max bounds on a value.
///
/// Used for generator reactive output ranges (MVAr).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limit<T> {
    /// Minimum value.
    pub min: T,
    /// Maximum value.
    pub max: T,
}

/// Bus type. Reactive limits can only be attached to a voltage controlled bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BusKind {
    /// Reference bus with fixed magnitude and angle.
    Slack,
    /// Voltage controlled bus with an optional reactive range in MVAr.
    PV { q_lim: Option<Limit<f64>> },
    /// Load bus.
    PQ,
}

impl BusKind {
    pub fn is_slack(&self) -> bool {
        matches!(self, BusKind::Slack)
    }

    pub fn is_pv(&self) -> bool {
        matches!(self, BusKind::PV { .. })
    }

    pub fn is_pq(&self) -> bool {
        matches!(self, BusKind::PQ)
    }

    /// Lower case tag used in the JSON exchange format.
    pub fn label(&self) -> &'static str {
        match self {
            BusKind::Slack => "slack",
            BusKind::PV { .. } => "pv",
            BusKind::PQ => "pq",
        }
    }
}

/// A network bus with its schedule.
///
/// `vm_pu`/`va_degree` are the fixed value for the slack bus, the held setpoint
/// for a PV bus and the starting point for a PQ bus. Powers are in MW/MVAr.
#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    pub id: u32,
    pub kind: BusKind,
    pub vm_pu: f64,
    pub va_degree: f64,
    pub p_gen_mw: f64,
    pub q_gen_mvar: f64,
    pub p_load_mw: f64,
    pub q_load_mvar: f64,
}

impl Bus {
    fn with_kind(id: u32, kind: BusKind, vm_pu: f64) -> Self {
        Self {
            id,
            kind,
            vm_pu,
            va_degree: 0.0,
            p_gen_mw: 0.0,
            q_gen_mvar: 0.0,
            p_load_mw: 0.0,
            q_load_mvar: 0.0,
        }
    }

    pub fn slack(id: u32, vm_pu: f64, va_degree: f64) -> Self {
        Self {
            va_degree,
            ..Self::with_kind(id, BusKind::Slack, vm_pu)
        }
    }

    pub fn pv(id: u32, vm_pu: f64, p_gen_mw: f64) -> Self {
        Self {
            p_gen_mw,
            ..Self::with_kind(id, BusKind::PV { q_lim: None }, vm_pu)
        }
    }

    /// Load bus with a flat (1.0 p.u.) starting voltage.
    pub fn pq(id: u32, p_load_mw: f64, q_load_mvar: f64) -> Self {
        Self {
            p_load_mw,
            q_load_mvar,
            ..Self::with_kind(id, BusKind::PQ, 1.0)
        }
    }

    pub fn with_load(mut self, p_mw: f64, q_mvar: f64) -> Self {
        self.p_load_mw = p_mw;
        self.q_load_mvar = q_mvar;
        self
    }

    pub fn with_generation(mut self, p_mw: f64, q_mvar: f64) -> Self {
        self.p_gen_mw = p_mw;
        self.q_gen_mvar = q_mvar;
        self
    }

    /// Attaches a reactive range to a PV bus. Other bus kinds are returned unchanged.
    pub fn with_q_limits(mut self, q_min_mvar: f64, q_max_mvar: f64) -> Self {
        if let BusKind::PV { q_lim } = &mut self.kind {
            *q_lim = Some(Limit {
                min: q_min_mvar,
                max: q_max_mvar,
            });
        }
        self
    }

    /// Reactive range of a PV bus, if any.
    pub fn q_limits(&self) -> Option<Limit<f64>> {
        match self.kind {
            BusKind::PV { q_lim } => q_lim,
            _ => None,
        }
    }
}

/// A π-model branch between two buses, series `r + jx`, total charging `b`.
///
/// The tap ratio is real and sits on the `from` side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Branch {
    pub from: u32,
    pub to: u32,
    pub r: f64,
    pub x: f64,
    pub b: f64,
    pub tap: Option<f64>,
}

impl Branch {
    pub fn new(from: u32, to: u32, r: f64, x: f64, b: f64) -> Self {
        Self {
            from,
            to,
            r,
            x,
            b,
            tap: None,
        }
    }

    pub fn with_tap(mut self, tap: f64) -> Self {
        self.tap = Some(tap);
        self
    }

    #[inline(always)]
    pub fn tap_ratio(&self) -> f64 {
        self.tap.unwrap_or(1.0)
    }

    #[inline(always)]
    pub fn is_nominal(&self) -> bool {
        self.tap_ratio() == 1.0
    }

    fn invalid(&self, reason: impl Into<String>) -> PowerFlowError {
        PowerFlowError::InvalidBranch {
            from: self.from,
            to: self.to,
            reason: reason.into(),
        }
    }
}

/// Positions of buses in the matrix order, split by bus type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusPartition {
    pub slack: usize,
    pub pv: Vec<usize>,
    pub pq: Vec<usize>,
    /// PV and PQ positions in bus order.
    pub non_slack: Vec<usize>,
}

/// A load flow case. Bus order defines the matrix index.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    pub base_mva: f64,
    pub buses: Vec<Bus>,
    pub branches: Vec<Branch>,
}

impl Network {
    pub fn new(base_mva: f64, buses: Vec<Bus>, branches: Vec<Branch>) -> Self {
        Self {
            base_mva,
            buses,
            branches,
        }
    }

    #[inline(always)]
    pub fn n_bus(&self) -> usize {
        self.buses.len()
    }

    /// Maps bus ids to matrix positions. Rejects duplicated ids.
    pub fn index_map(&self) -> Result<HashMap<u32, usize>> {
        let mut lookup = HashMap::with_capacity(self.buses.len());
        for (idx, bus) in self.buses.iter().enumerate() {
            if lookup.insert(bus.id, idx).is_some() {
                return Err(PowerFlowError::InvalidNetwork(format!(
                    "duplicated bus id {}",
                    bus.id
                )));
            }
        }
        Ok(lookup)
    }

    /// Resolves both ends of a branch, rejecting self-loops, unknown ids and bad taps.
    pub fn branch_indices(
        &self,
        branch: &Branch,
        lookup: &HashMap<u32, usize>,
    ) -> Result<(usize, usize)> {
        if branch.from == branch.to {
            return Err(branch.invalid("self-loop"));
        }
        let from = lookup
            .get(&branch.from)
            .copied()
            .ok_or_else(|| branch.invalid(format!("unknown bus {}", branch.from)))?;
        let to = lookup
            .get(&branch.to)
            .copied()
            .ok_or_else(|| branch.invalid(format!("unknown bus {}", branch.to)))?;
        let tap = branch.tap_ratio();
        if !tap.is_finite() || tap <= 0.0 {
            return Err(branch.invalid(format!("tap ratio {tap} must be positive")));
        }
        Ok((from, to))
    }

    pub fn slack_index(&self) -> Result<usize> {
        let mut slack = self
            .buses
            .iter()
            .enumerate()
            .filter(|(_, b)| b.kind.is_slack())
            .map(|(i, _)| i);
        match (slack.next(), slack.next()) {
            (Some(idx), None) => Ok(idx),
            (None, _) => Err(PowerFlowError::InvalidNetwork(
                "no slack bus found".to_string(),
            )),
            (Some(_), Some(_)) => Err(PowerFlowError::InvalidNetwork(
                "more than one slack bus found".to_string(),
            )),
        }
    }

    /// Checks everything a solver relies on: ids, slack, base power and branches.
    pub fn validate(&self) -> Result<()> {
        if self.buses.is_empty() {
            return Err(PowerFlowError::InvalidNetwork("network has no bus".into()));
        }
        if !(self.base_mva.is_finite() && self.base_mva > 0.0) {
            return Err(PowerFlowError::InvalidNetwork(format!(
                "base power {} must be positive",
                self.base_mva
            )));
        }
        self.slack_index()?;
        let lookup = self.index_map()?;
        for branch in &self.branches {
            self.branch_indices(branch, &lookup)?;
        }
        Ok(())
    }

    pub fn partition(&self) -> Result<BusPartition> {
        let slack = self.slack_index()?;
        let mut pv = Vec::new();
        let mut pq = Vec::new();
        let mut non_slack = Vec::with_capacity(self.buses.len().saturating_sub(1));
        for (idx, bus) in self.buses.iter().enumerate() {
            match bus.kind {
                BusKind::Slack => continue,
                BusKind::PV { .. } => pv.push(idx),
                BusKind::PQ => pq.push(idx),
            }
            non_slack.push(idx);
        }
        Ok(BusPartition {
            slack,
            pv,
            pq,
            non_slack,
        })
    }

    /// Scheduled net active injection (generation - load) in p.u.
    pub fn p_spec_pu(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.n_bus(),
            self.buses
                .iter()
                .map(|b| (b.p_gen_mw - b.p_load_mw) / self.base_mva),
        )
    }

    /// Scheduled net reactive injection (generation - load) in p.u.
    pub fn q_spec_pu(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.n_bus(),
            self.buses
                .iter()
                .map(|b| (b.q_gen_mvar - b.q_load_mvar) / self.base_mva),
        )
    }

    /// Starting voltages: slack at its setpoint, PV at `(vm, 0)`, PQ flat.
    pub fn create_v_init(&self) -> DVector<Complex64> {
        DVector::from_iterator(
            self.n_bus(),
            self.buses.iter().map(|b| match b.kind {
                BusKind::Slack => Complex64::from_polar(b.vm_pu, b.va_degree.to_radians()),
                BusKind::PV { .. } => Complex64::new(b.vm_pu, 0.0),
                BusKind::PQ => Complex64::new(1.0, 0.0),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases::ieee3;

    #[test]
    fn test_partition_keeps_bus_order() {
        let net = ieee3();
        let part = net.partition().unwrap();
        assert_eq!(part.slack, 0);
        assert_eq!(part.pv, vec![1]);
        assert_eq!(part.pq, vec![2]);
        assert_eq!(part.non_slack, vec![1, 2]);
    }

    #[test]
    fn test_spec_in_per_unit() {
        let net = ieee3();
        let p = net.p_spec_pu();
        let q = net.q_spec_pu();
        assert_eq!(p.as_slice(), &[0.0, 2.0, -4.0]);
        assert_eq!(q.as_slice(), &[0.0, 0.0, -2.5]);
    }

    #[test]
    fn test_validate_rejects_two_slacks() {
        let mut net = ieee3();
        net.buses[2] = Bus::slack(3, 1.0, 0.0);
        assert!(matches!(
            net.validate(),
            Err(PowerFlowError::InvalidNetwork(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicated_ids() {
        let mut net = ieee3();
        net.buses[2].id = 2;
        assert!(matches!(
            net.validate(),
            Err(PowerFlowError::InvalidNetwork(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_endpoint() {
        let mut net = ieee3();
        net.branches.push(Branch::new(3, 9, 0.01, 0.1, 0.0));
        assert!(matches!(
            net.validate(),
            Err(PowerFlowError::InvalidBranch { from: 3, to: 9, .. })
        ));
    }

    #[test]
    fn test_q_limits_only_on_pv() {
        let pq = Bus::pq(5, 10.0, 2.0).with_q_limits(-1.0, 1.0);
        assert_eq!(pq.kind, BusKind::PQ);
        assert!(pq.q_limits().is_none());

        let pv = Bus::pv(6, 1.02, 30.0).with_q_limits(-10.0, 20.0);
        let lim = pv.q_limits().unwrap();
        assert_eq!((lim.min, lim.max), (-10.0, 20.0));
    }

    #[test]
    fn test_v_init() {
        let net = ieee3();
        let v = net.create_v_init();
        assert_eq!(v[0], Complex64::new(1.05, 0.0));
        assert_eq!(v[1], Complex64::new(1.04, 0.0));
        assert_eq!(v[2], Complex64::new(1.0, 0.0));
    }
}
