use std::fmt;

use nalgebra::DVector;
use num_complex::Complex64;
use serde::Serialize;
use tabled::{Table, settings::Style};

mod res_display;
use res_display::*;

use super::{
    error::{PowerFlowError, Result},
    system::{admittance::build_ybus_with_stamps, network::Network},
    trace::Trace,
};

/// Solved state of one bus. Injections are positive into the network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BusResult {
    pub bus_id: u32,
    pub kind: &'static str,
    pub vm_pu: f64,
    pub va_degree: f64,
    /// Net injection `V · conj(Y V)` in MW.
    pub p_inj_mw: f64,
    pub q_inj_mvar: f64,
    /// Injection plus the scheduled load, i.e. what the generator supplies.
    pub p_gen_mw: f64,
    pub q_gen_mvar: f64,
}

/// Flow through one branch, measured into the branch at each end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BranchFlow {
    pub from: u32,
    pub to: u32,
    pub p_from_mw: f64,
    pub q_from_mvar: f64,
    pub p_to_mw: f64,
    pub q_to_mvar: f64,
    /// `p_from + p_to`
    pub pl_mw: f64,
    pub ql_mvar: f64,
    pub i_from_pu: f64,
    pub i_to_pu: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerFlowReport {
    pub buses: Vec<BusResult>,
    pub branches: Vec<BranchFlow>,
}

impl PowerFlowReport {
    /// Evaluates injections and flows for the given bus voltages.
    pub fn from_voltages(net: &Network, v: &DVector<Complex64>) -> Result<Self> {
        if v.len() != net.n_bus() {
            return Err(PowerFlowError::InvalidNetwork(format!(
                "{} voltages for {} buses",
                v.len(),
                net.n_bus()
            )));
        }
        let (ybus, stamps) = build_ybus_with_stamps(net)?;
        let base = net.base_mva;
        let s_inj = v.component_mul(&(ybus.matrix() * v).conjugate());

        let buses = net
            .buses
            .iter()
            .zip(v.iter().zip(s_inj.iter()))
            .map(|(bus, (vi, si))| BusResult {
                bus_id: bus.id,
                kind: bus.kind.label(),
                vm_pu: vi.norm(),
                va_degree: vi.arg().to_degrees(),
                p_inj_mw: si.re * base,
                q_inj_mvar: si.im * base,
                p_gen_mw: si.re * base + bus.p_load_mw,
                q_gen_mvar: si.im * base + bus.q_load_mvar,
            })
            .collect();

        let branches = stamps
            .iter()
            .map(|st| {
                let br = &net.branches[st.branch];
                let (vf, vt) = (v[st.from_idx], v[st.to_idx]);
                let (yff, yft, ytf, ytt) = st.entries();
                let i_from = yff * vf + yft * vt;
                let i_to = ytf * vf + ytt * vt;
                let s_from = vf * i_from.conj() * base;
                let s_to = vt * i_to.conj() * base;
                BranchFlow {
                    from: br.from,
                    to: br.to,
                    p_from_mw: s_from.re,
                    q_from_mvar: s_from.im,
                    p_to_mw: s_to.re,
                    q_to_mvar: s_to.im,
                    pl_mw: s_from.re + s_to.re,
                    ql_mvar: s_from.im + s_to.im,
                    i_from_pu: i_from.norm(),
                    i_to_pu: i_to.norm(),
                }
            })
            .collect();

        Ok(Self { buses, branches })
    }

    /// Evaluates the last snapshot of a solver trace.
    pub fn from_trace(net: &Network, trace: &Trace) -> Result<Self> {
        let v = trace
            .final_voltages()
            .ok_or_else(|| PowerFlowError::InvalidNetwork("empty trace".to_string()))?;
        Self::from_voltages(net, &v)
    }

    pub fn bus(&self, bus_id: u32) -> Option<&BusResult> {
        self.buses.iter().find(|b| b.bus_id == bus_id)
    }

    pub fn total_losses_mw(&self) -> f64 {
        self.branches.iter().map(|b| b.pl_mw).sum()
    }

    pub fn bus_table(&self) -> String {
        let rows = self.buses.iter().map(|b| BusResTable {
            Bus: b.bus_id,
            Type: b.kind,
            Vm: FloatWrapper::new(b.vm_pu, 3),
            Va: FloatWrapper::new(b.va_degree, 3),
            P_mw: FloatWrapper::new(b.p_inj_mw, 5),
            Q_mvar: FloatWrapper::new(b.q_inj_mvar, 5),
        });
        Table::new(rows).with(Style::markdown()).to_string()
    }

    pub fn line_table(&self) -> String {
        let rows = self.branches.iter().map(|b| LineResTable {
            from: b.from,
            to: b.to,
            p_from_mw: FloatWrapper::new(b.p_from_mw, 3),
            q_from_mvar: FloatWrapper::new(b.q_from_mvar, 3),
            p_to_mw: FloatWrapper::new(b.p_to_mw, 3),
            q_to_mvar: FloatWrapper::new(b.q_to_mvar, 3),
            pl_mw: FloatWrapper::new(b.pl_mw, 3),
            ql_mvar: FloatWrapper::new(b.ql_mvar, 3),
            i_from_pu: FloatWrapper::new(b.i_from_pu, 3),
            i_to_pu: FloatWrapper::new(b.i_to_pu, 3),
        });
        Table::new(rows).with(Style::markdown()).to_string()
    }
}

impl fmt::Display for PowerFlowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.bus_table())?;
        writeln!(f)?;
        write!(f, "{}", self.line_table())
    }
}
