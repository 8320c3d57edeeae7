use nalgebra::{DMatrix, DVector};

use crate::basic::error::{PowerFlowError, Result};

mod dense;
pub use dense::*;

#[cfg(feature = "faer")]
mod faer;
#[cfg(feature = "faer")]
pub use faer::*;

#[cfg(feature = "rsparse")]
mod rsparse;
#[cfg(feature = "rsparse")]
pub use rsparse::*;

#[cfg(feature = "faer")]
pub type DefaultSolver = FaerSolver;

#[cfg(all(not(feature = "faer"), feature = "rsparse"))]
pub type DefaultSolver = RSparseSolver;

#[cfg(all(not(feature = "faer"), not(feature = "rsparse")))]
pub type DefaultSolver = DenseLuSolver;

/// A trait for solving real linear systems.
///
/// This is the only linear algebra the solvers need: the fast decoupled
/// method inverts `B'`/`B''` once through it.
pub trait Solve {
    /// Solves `a x = b`, overwriting `b` with `x`.
    ///
    /// # Errors
    ///
    /// [`PowerFlowError::SingularMatrix`] if `a` cannot be factorized.
    fn solve(&mut self, a: &DMatrix<f64>, b: &mut DVector<f64>) -> Result<()>;

    /// Computes `a⁻¹` column by column. Backends may override this to factorize once.
    fn inverse(&mut self, a: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        check_square(a)?;
        let n = a.nrows();
        let mut inv = DMatrix::zeros(n, n);
        let mut col = DVector::zeros(n);
        for j in 0..n {
            col.fill(0.0);
            col[j] = 1.0;
            self.solve(a, &mut col)?;
            inv.set_column(j, &col);
        }
        Ok(inv)
    }
}

pub(crate) fn check_square(a: &DMatrix<f64>) -> Result<()> {
    if a.is_square() {
        Ok(())
    } else {
        Err(PowerFlowError::SingularMatrix(format!(
            "matrix is {}x{}, expected square",
            a.nrows(),
            a.ncols()
        )))
    }
}

pub(crate) fn check_finite<'a>(values: impl IntoIterator<Item = &'a f64>) -> Result<()> {
    if values.into_iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(PowerFlowError::SingularMatrix(
            "solution contains non-finite values".to_string(),
        ))
    }
}
