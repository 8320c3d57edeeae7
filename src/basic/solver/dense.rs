use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

use super::{Solve, check_finite, check_square};
use crate::basic::error::{PowerFlowError, Result};

/// Dense LU with partial pivoting from nalgebra. Always available.
#[derive(Default, Debug, Clone, Copy)]
pub struct DenseLuSolver;

impl Solve for DenseLuSolver {
    fn solve(&mut self, a: &DMatrix<f64>, b: &mut DVector<f64>) -> Result<()> {
        check_square(a)?;
        if a.nrows() == 0 {
            return Ok(());
        }
        let lu = a.clone().lu();
        if !lu.solve_mut(b) {
            return Err(PowerFlowError::SingularMatrix(
                "LU factorization failed".to_string(),
            ));
        }
        check_finite(b.iter())
    }

    fn inverse(&mut self, a: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        check_square(a)?;
        if a.nrows() == 0 {
            return Ok(DMatrix::zeros(0, 0));
        }
        let inv = a.clone().lu().try_inverse().ok_or_else(|| {
            PowerFlowError::SingularMatrix("LU factorization failed".to_string())
        })?;
        check_finite(inv.iter())?;
        Ok(inv)
    }
}

/// Inverts a complex matrix, e.g. the Y-Bus into the Z-Bus.
pub fn invert_complex(a: &DMatrix<Complex64>) -> Result<DMatrix<Complex64>> {
    if !a.is_square() {
        return Err(PowerFlowError::SingularMatrix(format!(
            "matrix is {}x{}, expected square",
            a.nrows(),
            a.ncols()
        )));
    }
    let inv = a
        .clone()
        .try_inverse()
        .ok_or_else(|| PowerFlowError::SingularMatrix("complex inverse failed".to_string()))?;
    if inv.iter().all(|z| z.re.is_finite() && z.im.is_finite()) {
        Ok(inv)
    } else {
        Err(PowerFlowError::SingularMatrix(
            "complex inverse contains non-finite values".to_string(),
        ))
    }
}
