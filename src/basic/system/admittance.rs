use derive_more::derive::Deref;
use log::debug;
use nalgebra::DMatrix;
use num_complex::Complex64;
use num_traits::Zero;

use super::network::Network;
use crate::basic::error::{PowerFlowError, Result};

/// Nodal admittance matrix, indexed by bus position (not id).
///
/// Built fresh from a [`Network`] and never mutated afterwards; solvers only
/// read it through `Deref`.
#[derive(Debug, Clone, PartialEq, Deref)]
pub struct YBus(DMatrix<Complex64>);

impl YBus {
    pub fn matrix(&self) -> &DMatrix<Complex64> {
        &self.0
    }

    pub fn into_inner(self) -> DMatrix<Complex64> {
        self.0
    }

    /// Conductance part `G = Re(Y)`.
    pub fn g(&self) -> DMatrix<f64> {
        self.0.map(|y| y.re)
    }

    /// Susceptance part `B = Im(Y)`.
    pub fn b(&self) -> DMatrix<f64> {
        self.0.map(|y| y.im)
    }

    pub fn is_symmetric(&self, tol: f64) -> bool {
        let n = self.0.nrows();
        (0..n).all(|i| (0..i).all(|j| (self.0[(i, j)] - self.0[(j, i)]).norm() <= tol))
    }
}

/// Contribution of a single branch to the Y-Bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchStamp {
    /// Position of the branch in the network's branch list.
    pub branch: usize,
    pub from_idx: usize,
    pub to_idx: usize,
    /// `1 / (r + jx)`
    pub y_series: Complex64,
    /// `j b / 2`, added at both ends.
    pub y_shunt: Complex64,
    pub tap: f64,
}

impl BranchStamp {
    /// Entries added to `(ff, ft, tf, tt)`.
    pub fn entries(&self) -> (Complex64, Complex64, Complex64, Complex64) {
        let y = self.y_series;
        if self.tap == 1.0 {
            (y + self.y_shunt, -y, -y, y + self.y_shunt)
        } else {
            let mutual = -y / self.tap;
            (
                y / (self.tap * self.tap) + self.y_shunt,
                mutual,
                mutual,
                y + self.y_shunt,
            )
        }
    }

    #[inline(always)]
    fn apply(&self, ybus: &mut DMatrix<Complex64>) {
        let (f, t) = (self.from_idx, self.to_idx);
        let (yff, yft, ytf, ytt) = self.entries();
        ybus[(f, f)] += yff;
        ybus[(f, t)] += yft;
        ybus[(t, f)] += ytf;
        ybus[(t, t)] += ytt;
    }
}

/// Computes the stamp of every branch, in branch order.
///
/// # Errors
///
/// * [`PowerFlowError::InvalidBranch`] for self-loops, unknown endpoints or a non-positive tap.
/// * [`PowerFlowError::DivideByZero`] for a branch with `r = x = 0`.
pub fn branch_stamps(net: &Network) -> Result<Vec<BranchStamp>> {
    let lookup = net.index_map()?;
    net.branches
        .iter()
        .enumerate()
        .map(|(k, br)| {
            let (from_idx, to_idx) = net.branch_indices(br, &lookup)?;
            let z = Complex64::new(br.r, br.x);
            if z.is_zero() {
                return Err(PowerFlowError::DivideByZero(format!(
                    "branch {}->{} has zero impedance",
                    br.from, br.to
                )));
            }
            Ok(BranchStamp {
                branch: k,
                from_idx,
                to_idx,
                y_series: z.inv(),
                y_shunt: Complex64::new(0.0, br.b / 2.0),
                tap: br.tap_ratio(),
            })
        })
        .collect()
}

/// Creates the nodal admittance matrix and returns the stamps it was built from.
///
/// Parallel branches accumulate additively.
pub fn build_ybus_with_stamps(net: &Network) -> Result<(YBus, Vec<BranchStamp>)> {
    let n = net.n_bus();
    let stamps = branch_stamps(net)?;
    let mut ybus = DMatrix::from_element(n, n, Complex64::zero());
    for stamp in &stamps {
        debug!(
            "branch {}: bus {} -> bus {}, y = {:.4}, tap = {}",
            stamp.branch, stamp.from_idx, stamp.to_idx, stamp.y_series, stamp.tap
        );
        stamp.apply(&mut ybus);
    }
    Ok((YBus(ybus), stamps))
}

/// Creates the nodal admittance matrix (Ybus) of the network.
pub fn build_ybus(net: &Network) -> Result<YBus> {
    build_ybus_with_stamps(net).map(|(ybus, _)| ybus)
}
