use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;
use rsparse::{data, lsolve, lu, sqr, usolve};

use super::{Solve, check_finite, check_square};
use crate::basic::error::{PowerFlowError, Result};

/// Sparse LU from `rsparse`. `B'`/`B''` are as sparse as the network, so this
/// is the default backend.
#[derive(Default)]
pub struct RSparseSolver {
    x: Vec<f64>,
}

impl RSparseSolver {
    /// Factorizes `a` once and solves every right-hand side in `rhs` in place.
    fn solve_columns(&mut self, a: &DMatrix<f64>, rhs: &mut [DVector<f64>]) -> Result<()> {
        check_square(a)?;
        let n = a.nrows();
        if n == 0 {
            return Ok(());
        }
        let csc = CscMatrix::from(a);
        let (ap, ai, ax) = csc.disassemble();
        let p: Vec<isize> = ap.iter().map(|&v| v as isize).collect();
        let nzmax = ax.len();
        let sp = data::Sprs {
            m: n,
            n,
            i: ai,
            p,
            x: ax,
            nzmax,
        };
        // AMD needs at least two columns; smaller systems keep natural ordering.
        let order = if n < 2 { -1 } else { 1 };
        let mut s = sqr(&sp, order, false);
        let numeric = lu(&sp, &mut s, 1.0)
            .map_err(|_| PowerFlowError::SingularMatrix("LU factorization failed".to_string()))?;
        self.x.resize(n, 0.0);
        for b in rhs.iter_mut() {
            ipvec(&numeric.pinv, b.as_slice(), &mut self.x[..]); // x = P*b
            lsolve(&numeric.l, &mut self.x); // x = L\x
            usolve(&numeric.u, &mut self.x); // x = U\x
            ipvec(&s.q, &self.x, b.as_mut_slice()); // b = Q*x
            check_finite(b.iter())?;
        }
        Ok(())
    }
}

impl Solve for RSparseSolver {
    fn solve(&mut self, a: &DMatrix<f64>, b: &mut DVector<f64>) -> Result<()> {
        let mut rhs = [std::mem::replace(b, DVector::zeros(0))];
        let res = self.solve_columns(a, &mut rhs);
        let [x] = rhs;
        *b = x;
        res
    }

    fn inverse(&mut self, a: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        check_square(a)?;
        let n = a.nrows();
        if n == 0 {
            return Ok(DMatrix::zeros(0, 0));
        }
        let mut cols: Vec<DVector<f64>> = (0..n)
            .map(|j| {
                let mut e = DVector::zeros(n);
                e[j] = 1.0;
                e
            })
            .collect();
        self.solve_columns(a, &mut cols)?;
        Ok(DMatrix::from_columns(&cols))
    }
}

fn ipvec_identity(b: &[f64], x: &mut [f64]) {
    x.copy_from_slice(b);
}

fn ipvec_perm(p: &[isize], b: &[f64], x: &mut [f64]) {
    for k in 0..b.len() {
        x[p[k] as usize] = b[k];
    }
}

fn ipvec(p: &Option<Vec<isize>>, b: &[f64], x: &mut [f64]) {
    match p {
        Some(pvec) => ipvec_perm(pvec, b, x),
        None => ipvec_identity(b, x),
    }
}
