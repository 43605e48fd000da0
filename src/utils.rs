//! Small dense linear-algebra helpers over `faer` matrices.

use faer::{Col, Mat};

/// Simple matrix multiplication (A × B).
pub(crate) fn mat_mul(a: &Mat<f64>, b: &Mat<f64>) -> Mat<f64> {
    let m = a.nrows();
    let n = b.ncols();
    let k = a.ncols();
    let mut result: Mat<f64> = Mat::zeros(m, n);
    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0;
            for l in 0..k {
                sum += a[(i, l)] * b[(l, j)];
            }
            result[(i, j)] = sum;
        }
    }
    result
}

/// X'X.
pub(crate) fn crossprod(x: &Mat<f64>) -> Mat<f64> {
    let n = x.nrows();
    let p = x.ncols();
    let mut xtx: Mat<f64> = Mat::zeros(p, p);
    for i in 0..p {
        for j in i..p {
            let mut sum = 0.0;
            for k in 0..n {
                sum += x[(k, i)] * x[(k, j)];
            }
            xtx[(i, j)] = sum;
            xtx[(j, i)] = sum;
        }
    }
    xtx
}

/// X'v.
pub(crate) fn xt_vec(x: &Mat<f64>, v: &Col<f64>) -> Col<f64> {
    let n = x.nrows();
    let p = x.ncols();
    let mut out: Col<f64> = Col::zeros(p);
    for j in 0..p {
        let mut sum = 0.0;
        for i in 0..n {
            sum += x[(i, j)] * v[i];
        }
        out[j] = sum;
    }
    out
}

/// Xv.
pub(crate) fn mat_vec(x: &Mat<f64>, v: &Col<f64>) -> Col<f64> {
    Col::from_fn(x.nrows(), |i| {
        let mut sum = 0.0;
        for j in 0..x.ncols() {
            sum += x[(i, j)] * v[j];
        }
        sum
    })
}

/// Row `i` of X as a column vector.
pub(crate) fn row(x: &Mat<f64>, i: usize) -> Col<f64> {
    Col::from_fn(x.ncols(), |j| x[(i, j)])
}

/// a' M a.
pub(crate) fn quad_form(m: &Mat<f64>, a: &Col<f64>) -> f64 {
    let p = a.nrows();
    let mut sum = 0.0;
    for r in 0..p {
        for c in 0..p {
            sum += a[r] * m[(r, c)] * a[c];
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossprod_matches_mat_mul() {
        let x = Mat::from_fn(4, 2, |i, j| (i + 2 * j) as f64);
        let mut xt: Mat<f64> = Mat::zeros(2, 4);
        for i in 0..4 {
            for j in 0..2 {
                xt[(j, i)] = x[(i, j)];
            }
        }
        let expected = mat_mul(&xt, &x);
        let got = crossprod(&x);
        for r in 0..2 {
            for c in 0..2 {
                assert!((expected[(r, c)] - got[(r, c)]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_quad_form() {
        let m = Mat::from_fn(2, 2, |i, j| if i == j { 2.0 } else { 0.5 });
        let a = Col::from_fn(2, |i| (i + 1) as f64);
        // 1*2*1 + 1*0.5*2 + 2*0.5*1 + 2*2*2
        assert!((quad_form(&m, &a) - 12.0).abs() < 1e-12);
    }
}
