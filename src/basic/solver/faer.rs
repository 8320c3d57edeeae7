use faer::{Mat, MatMut, linalg::solvers::Solve};
use nalgebra::{DMatrix, DVector};

use super::{Solve as PoSolve, check_finite, check_square};
use crate::basic::error::{PowerFlowError, Result};

/// Dense partial-pivot LU from faer.
#[derive(Default)]
pub struct FaerSolver;

impl PoSolve for FaerSolver {
    fn solve(&mut self, a: &DMatrix<f64>, b: &mut DVector<f64>) -> Result<()> {
        check_square(a)?;
        let n = a.nrows();
        if n == 0 {
            return Ok(());
        }
        let mat = Mat::<f64>::from_fn(n, n, |i, j| a[(i, j)]);
        let lu = mat.partial_piv_lu();
        let rhs = MatMut::from_column_major_slice_mut(b.as_mut_slice(), n, 1);
        lu.solve_in_place(rhs);
        // faer does not report singular pivots; they surface as inf/nan.
        check_finite(b.iter()).map_err(|_| {
            PowerFlowError::SingularMatrix("Faer numerical error".to_string())
        })
    }
}
