//! Step-by-step construction of the bus impedance matrix.
//!
//! Buses are addressed by 0-based position in the matrix. Each building step is
//! recorded so the intermediate matrices can be shown.

use std::fmt;

use log::debug;
use nalgebra::{DMatrix, DVector, RowDVector};
use num_complex::Complex64;
use num_traits::Zero;
use serde::Serialize;

use super::{
    error::{PowerFlowError, Result},
    solver::invert_complex,
    system::admittance::YBus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ZBusCase {
    /// New bus tied to the reference.
    NewToReference,
    /// New bus tied to an existing bus.
    NewToExisting,
    /// Existing bus tied to the reference, Kron-reduced.
    ExistingToReference,
    /// Branch between two existing buses, Kron-reduced.
    ExistingToExisting,
}

impl ZBusCase {
    pub fn number(&self) -> u8 {
        match self {
            ZBusCase::NewToReference => 1,
            ZBusCase::NewToExisting => 2,
            ZBusCase::ExistingToReference => 3,
            ZBusCase::ExistingToExisting => 4,
        }
    }
}

impl fmt::Display for ZBusCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Case {}", self.number())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZBusStep {
    pub case: ZBusCase,
    pub description: String,
    /// Z-Bus after this step.
    pub matrix: DMatrix<Complex64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZBusBuilder {
    z: DMatrix<Complex64>,
    steps: Vec<ZBusStep>,
}

impl Default for ZBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ZBusBuilder {
    /// Starts from an empty matrix, so the first step has to be
    /// [`add_to_reference`](Self::add_to_reference).
    pub fn new() -> Self {
        Self {
            z: DMatrix::zeros(0, 0),
            steps: Vec::new(),
        }
    }

    pub fn matrix(&self) -> &DMatrix<Complex64> {
        &self.z
    }

    pub fn steps(&self) -> &[ZBusStep] {
        &self.steps
    }

    pub fn n_bus(&self) -> usize {
        self.z.nrows()
    }

    pub fn into_matrix(self) -> DMatrix<Complex64> {
        self.z
    }

    /// Case 1: appends a bus connected to the reference through `zb`.
    pub fn add_to_reference(&mut self, zb: Complex64) -> Result<&mut Self> {
        let n = self.n_bus();
        let mut z = self.z.clone().resize(n + 1, n + 1, Complex64::zero());
        z[(n, n)] = zb;
        self.record(
            ZBusCase::NewToReference,
            format!("added bus {} to reference with Zb = {zb}", n + 1),
            z,
        );
        Ok(self)
    }

    /// Case 2: appends a bus connected to existing bus `k` through `zb`.
    pub fn add_radial(&mut self, k: usize, zb: Complex64) -> Result<&mut Self> {
        let n = self.n_bus();
        self.check_index(k, n)?;
        let mut z = self.z.clone().resize(n + 1, n + 1, Complex64::zero());
        for i in 0..n {
            z[(n, i)] = self.z[(k, i)];
            z[(i, n)] = self.z[(i, k)];
        }
        z[(n, n)] = self.z[(k, k)] + zb;
        self.record(
            ZBusCase::NewToExisting,
            format!("added radial bus {} from bus {} with Zb = {zb}", n + 1, k + 1),
            z,
        );
        Ok(self)
    }

    /// Case 3: ties existing bus `k` to the reference through `zb`.
    pub fn link_to_reference(&mut self, k: usize, zb: Complex64) -> Result<&mut Self> {
        let n = self.n_bus();
        self.check_index(k, n)?;
        let loop_z = self.z[(k, k)] + zb;
        let col = self.z.column(k).clone_owned();
        let row = self.z.row(k).clone_owned();
        let z = self.kron(&col, &row, loop_z, k as u32, 0)?;
        self.record(
            ZBusCase::ExistingToReference,
            format!("tied bus {} to reference with Zb = {zb} (Kron reduction)", k + 1),
            z,
        );
        Ok(self)
    }

    /// Case 4: adds a branch `zb` between existing buses `j` and `k`.
    pub fn link(&mut self, j: usize, k: usize, zb: Complex64) -> Result<&mut Self> {
        let n = self.n_bus();
        self.check_index(j, n)?;
        self.check_index(k, n)?;
        if j == k {
            return Err(PowerFlowError::InvalidBranch {
                from: j as u32,
                to: k as u32,
                reason: "loop must join two distinct buses".to_string(),
            });
        }
        let loop_z = self.z[(j, j)] + self.z[(k, k)] - self.z[(j, k)] * 2.0 + zb;
        let col = self.z.column(j) - self.z.column(k);
        let row = self.z.row(j) - self.z.row(k);
        let z = self.kron(&col, &row, loop_z, j as u32, k as u32)?;
        self.record(
            ZBusCase::ExistingToExisting,
            format!(
                "added loop between bus {} and bus {} with Zb = {zb} (Kron reduction)",
                j + 1,
                k + 1
            ),
            z,
        );
        Ok(self)
    }

    /// `Z - col · row / loop_z`, the elimination of the temporary loop row.
    fn kron(
        &self,
        col: &DVector<Complex64>,
        row: &RowDVector<Complex64>,
        loop_z: Complex64,
        from: u32,
        to: u32,
    ) -> Result<DMatrix<Complex64>> {
        if loop_z.is_zero() {
            return Err(PowerFlowError::DivideByZero(format!(
                "loop impedance between {from} and {to} is zero"
            )));
        }
        Ok(&self.z - (col * row) / loop_z)
    }

    fn check_index(&self, k: usize, n: usize) -> Result<()> {
        if k < n {
            Ok(())
        } else {
            Err(PowerFlowError::InvalidBranch {
                from: k as u32,
                to: n as u32,
                reason: format!("bus position {k} out of range for a {n}x{n} Z-Bus"),
            })
        }
    }

    fn record(&mut self, case: ZBusCase, description: String, z: DMatrix<Complex64>) {
        debug!("{case}: {description}");
        self.z = z;
        self.steps.push(ZBusStep {
            case,
            description,
            matrix: self.z.clone(),
        });
    }
}

/// Z-Bus as the inverse of the Y-Bus.
///
/// Fails with `SingularMatrix` when the network has no path to the reference,
/// i.e. no shunt element anywhere.
pub fn zbus_from_ybus(ybus: &YBus) -> Result<DMatrix<Complex64>> {
    invert_complex(ybus.matrix())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::basic::system::admittance::build_ybus;
    use crate::testcases::ieee3;

    fn z(re: f64) -> Complex64 {
        Complex64::new(re, 0.0)
    }

    fn assert_matrix_eq(a: &DMatrix<Complex64>, b: &DMatrix<Complex64>, eps: f64) {
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!((x - y).norm(), 0.0, epsilon = eps);
        }
    }

    #[test]
    fn test_radial_steps() {
        let mut b = ZBusBuilder::new();
        b.add_to_reference(z(0.5)).unwrap().add_radial(0, z(0.2)).unwrap();
        let m = b.matrix();
        assert_eq!(m[(0, 0)], z(0.5));
        assert_eq!(m[(0, 1)], z(0.5));
        assert_eq!(m[(1, 0)], z(0.5));
        assert_relative_eq!(m[(1, 1)].re, 0.7, epsilon = 1e-12);
        let cases: Vec<u8> = b.steps().iter().map(|s| s.case.number()).collect();
        assert_eq!(cases, vec![1, 2]);
        assert_eq!(b.steps()[0].matrix.shape(), (1, 1));
    }

    #[test]
    fn test_steps_match_ybus_inverse() {
        let mut b = ZBusBuilder::new();
        b.add_to_reference(z(0.5))
            .unwrap()
            .add_radial(0, z(0.2))
            .unwrap()
            .link_to_reference(1, z(0.4))
            .unwrap()
            .add_radial(1, z(0.3))
            .unwrap()
            .link(0, 2, z(0.1))
            .unwrap();
        assert_eq!(b.steps().len(), 5);
        assert_eq!(b.steps()[4].case, ZBusCase::ExistingToExisting);

        let y = DMatrix::from_row_slice(
            3,
            3,
            &[
                z(2.0 + 5.0 + 10.0),
                z(-5.0),
                z(-10.0),
                z(-5.0),
                z(5.0 + 2.5 + 1.0 / 0.3),
                z(-1.0 / 0.3),
                z(-10.0),
                z(-1.0 / 0.3),
                z(1.0 / 0.3 + 10.0),
            ],
        );
        let expected = invert_complex(&y).unwrap();
        assert_matrix_eq(b.matrix(), &expected, 1e-10);
    }

    #[test]
    fn test_bad_index() {
        let mut b = ZBusBuilder::new();
        assert!(matches!(
            b.add_radial(0, z(0.1)),
            Err(PowerFlowError::InvalidBranch { .. })
        ));
        b.add_to_reference(z(0.5)).unwrap();
        assert!(matches!(
            b.link(0, 0, z(0.1)),
            Err(PowerFlowError::InvalidBranch { .. })
        ));
        assert!(matches!(
            b.link_to_reference(3, z(0.1)),
            Err(PowerFlowError::InvalidBranch { .. })
        ));
        assert_eq!(b.steps().len(), 1);
    }

    #[test]
    fn test_zero_loop_impedance() {
        let mut b = ZBusBuilder::new();
        b.add_to_reference(z(0.5)).unwrap().add_radial(0, z(0.0)).unwrap();
        // Buses 1 and 2 are the same node; a zero branch between them closes a zero loop.
        assert!(matches!(
            b.link(0, 1, z(0.0)),
            Err(PowerFlowError::DivideByZero(_))
        ));
    }

    #[test]
    fn test_zbus_from_ybus() {
        let ybus = build_ybus(&ieee3()).unwrap();
        let zbus = zbus_from_ybus(&ybus).unwrap();
        let eye = ybus.matrix() * &zbus;
        assert_matrix_eq(&eye, &DMatrix::identity(3, 3), 1e-9);
    }
}
