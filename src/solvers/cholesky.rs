//! Cholesky factorization of the normal equations with rank checking.

use faer::{Col, Mat};

/// A pivot smaller than this fraction of its diagonal entry marks the
/// column as linearly dependent on the columns before it.
pub(crate) const PIVOT_TOLERANCE: f64 = 1e-10;

/// Lower-triangular factor `L` with `A = LL'`.
#[derive(Debug, Clone)]
pub(crate) struct Cholesky {
    l: Mat<f64>,
}

impl Cholesky {
    /// Factor a symmetric positive semi-definite matrix.
    ///
    /// Returns the index of the first column whose pivot vanishes, which for
    /// a Gram matrix `X'X` is the first design column lying (numerically) in
    /// the span of the preceding ones.
    pub(crate) fn factor(a: &Mat<f64>, rel_tol: f64) -> Result<Self, usize> {
        let n = a.nrows();
        let mut l: Mat<f64> = Mat::zeros(n, n);
        for j in 0..n {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[(j, k)].powi(2);
            }
            let a_jj = a[(j, j)];
            let diag = a_jj - sum;
            if !(a_jj > 0.0 && diag > rel_tol * a_jj) {
                return Err(j);
            }
            let l_jj = diag.sqrt();
            l[(j, j)] = l_jj;

            for i in (j + 1)..n {
                let mut sum = 0.0;
                for k in 0..j {
                    sum += l[(i, k)] * l[(j, k)];
                }
                l[(i, j)] = (a[(i, j)] - sum) / l_jj;
            }
        }
        Ok(Self { l })
    }

    /// Solve `A x = b`.
    pub(crate) fn solve(&self, b: &Col<f64>) -> Col<f64> {
        let n = self.l.nrows();

        // Forward substitution: Ly = b
        let mut y: Col<f64> = Col::zeros(n);
        for i in 0..n {
            let mut sum = b[i];
            for j in 0..i {
                sum -= self.l[(i, j)] * y[j];
            }
            y[i] = sum / self.l[(i, i)];
        }

        // Backward substitution: L'x = y
        let mut x: Col<f64> = Col::zeros(n);
        for i in (0..n).rev() {
            let mut sum = y[i];
            for j in (i + 1)..n {
                sum -= self.l[(j, i)] * x[j];
            }
            x[i] = sum / self.l[(i, i)];
        }
        x
    }

    /// `A^{-1}`, column by column.
    pub(crate) fn inverse(&self) -> Mat<f64> {
        let n = self.l.nrows();
        let mut inv: Mat<f64> = Mat::zeros(n, n);
        for c in 0..n {
            let e = Col::from_fn(n, |i| if i == c { 1.0 } else { 0.0 });
            let x = self.solve(&e);
            for r in 0..n {
                inv[(r, c)] = x[r];
            }
        }
        inv
    }
}
