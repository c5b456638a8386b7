//! Sparse matrix and preconditioned conjugate gradient solver.
//!
//! A lightweight CSR matrix plus a Jacobi-preconditioned conjugate gradient
//! solver for the symmetric positive definite systems produced by the
//! harmonic mapping stage.

use nalgebra::DVector;

use crate::error::{MapError, Result};

/// Compressed Sparse Row (CSR) matrix.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    /// `row_ptr[i]..row_ptr[i+1]` indexes the entries of row `i`.
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a CSR matrix from triplets (row, col, value).
    ///
    /// Duplicate entries at the same (row, col) are summed.
    pub fn from_triplets(rows: usize, cols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        triplets.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        // Merge duplicates in place on the sorted triplet list.
        let mut merged: Vec<(usize, usize, f64)> = Vec::with_capacity(triplets.len());
        for (row, col, val) in triplets {
            debug_assert!(row < rows && col < cols);
            match merged.last_mut() {
                Some((r, c, v)) if *r == row && *c == col => *v += val,
                _ => merged.push((row, col, val)),
            }
        }

        // Count entries per row, then prefix-sum into row pointers.
        let mut row_ptr = vec![0usize; rows + 1];
        for &(row, _, _) in &merged {
            row_ptr[row + 1] += 1;
        }
        for i in 0..rows {
            row_ptr[i + 1] += row_ptr[i];
        }

        let col_idx = merged.iter().map(|&(_, c, _)| c).collect();
        let values = merged.iter().map(|&(_, _, v)| v).collect();

        Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// The main diagonal, with zeros for absent entries.
    pub fn diagonal(&self) -> DVector<f64> {
        let mut diag = DVector::zeros(self.rows.min(self.cols));
        for i in 0..diag.len() {
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                if self.col_idx[k] == i {
                    diag[i] = self.values[k];
                    break;
                }
            }
        }
        diag
    }

    /// Multiply matrix by vector: `y = A * x`.
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        assert_eq!(x.len(), self.cols, "vector dimension mismatch");
        let mut y = DVector::zeros(self.rows);
        for i in 0..self.rows {
            let mut sum = 0.0;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                sum += self.values[k] * x[self.col_idx[k]];
            }
            y[i] = sum;
        }
        y
    }
}

/// Solve `A*x = b` with Jacobi-preconditioned conjugate gradient.
///
/// Requires `A` symmetric positive definite. Convergence is measured by the
/// relative residual norm against `tolerance`.
pub fn conjugate_gradient(
    a: &CsrMatrix,
    b: &DVector<f64>,
    max_iter: usize,
    tolerance: f64,
) -> Result<DVector<f64>> {
    let n = b.len();
    assert_eq!(a.nrows(), n, "matrix-vector dimension mismatch");
    assert_eq!(a.ncols(), n, "matrix must be square");

    let b_norm = b.norm();
    if b_norm < 1e-15 {
        return Ok(DVector::zeros(n));
    }

    // Jacobi preconditioner: M⁻¹ = diag(A)⁻¹.
    let diag = a.diagonal();
    let inv_diag: DVector<f64> =
        DVector::from_iterator(n, diag.iter().map(|&d| if d.abs() > 1e-300 { 1.0 / d } else { 1.0 }));

    let mut x = DVector::zeros(n);
    let mut r = b.clone();
    let mut z = inv_diag.component_mul(&r);
    let mut p = z.clone();
    let mut rz = r.dot(&z);

    for _ in 0..max_iter {
        if r.norm() / b_norm < tolerance {
            return Ok(x);
        }

        let ap = a.mul_vec(&p);
        let p_ap = p.dot(&ap);
        if p_ap.abs() < 1e-300 {
            break;
        }
        let alpha = rz / p_ap;

        x += alpha * &p;
        r -= alpha * &ap;

        z = inv_diag.component_mul(&r);
        let rz_next = r.dot(&z);
        let beta = rz_next / rz;
        p = &z + beta * &p;
        rz = rz_next;
    }

    if r.norm() / b_norm < tolerance {
        Ok(x)
    } else {
        Err(MapError::ConvergenceFailed {
            iterations: max_iter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spd_2x2() -> CsrMatrix {
        // [ 4  1 ]
        // [ 1  3 ]
        CsrMatrix::from_triplets(2, 2, vec![(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)])
    }

    #[test]
    fn test_from_triplets_sums_duplicates() {
        let a = CsrMatrix::from_triplets(
            2,
            2,
            vec![(0, 0, 2.0), (0, 0, 2.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)],
        );
        assert_eq!(a.nnz(), 4);
        let y = a.mul_vec(&DVector::from_vec(vec![1.0, 0.0]));
        assert!((y[0] - 4.0).abs() < 1e-12);
        assert!((y[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mul_vec() {
        let a = spd_2x2();
        let y = a.mul_vec(&DVector::from_vec(vec![1.0, 1.0]));
        assert!((y[0] - 5.0).abs() < 1e-12);
        assert!((y[1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_diagonal() {
        let a = spd_2x2();
        let d = a.diagonal();
        assert_eq!(d.as_slice(), &[4.0, 3.0]);
    }

    #[test]
    fn test_cg_solves_small_system() {
        let a = spd_2x2();
        let b = DVector::from_vec(vec![1.0, 2.0]);
        let x = conjugate_gradient(&a, &b, 100, 1e-12).unwrap();
        // Solution: x = 1/11, y = 7/11.
        assert!((x[0] - 1.0 / 11.0).abs() < 1e-9);
        assert!((x[1] - 7.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_cg_diagonally_dominant() {
        let mut triplets = Vec::new();
        let n = 20;
        for i in 0..n {
            triplets.push((i, i, 5.0));
            if i + 1 < n {
                triplets.push((i, i + 1, -1.0));
                triplets.push((i + 1, i, -1.0));
            }
        }
        let a = CsrMatrix::from_triplets(n, n, triplets);
        let b = DVector::from_element(n, 1.0);
        let x = conjugate_gradient(&a, &b, 200, 1e-10).unwrap();
        let residual = a.mul_vec(&x) - b;
        assert!(residual.norm() < 1e-8);
    }

    #[test]
    fn test_cg_reports_non_convergence() {
        let a = spd_2x2();
        let b = DVector::from_vec(vec![1.0, 2.0]);
        let err = conjugate_gradient(&a, &b, 0, 1e-16).unwrap_err();
        assert!(matches!(err, MapError::ConvergenceFailed { iterations: 0 }));
    }
}
