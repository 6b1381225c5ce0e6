//! Sparse assembly and iterative solve for the free-free stiffness
//!
//! Frame stiffness matrices are mostly zeros once the model grows past a few
//! dozen nodes; triplets are gathered in COO form and solved in CSR form with
//! a Jacobi-preconditioned conjugate gradient.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};

/// COO triplet accumulator; duplicate entries are summed on conversion
pub struct SparseMatrixBuilder {
    size: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl SparseMatrixBuilder {
    pub fn new(size: usize) -> Self {
        // ~10 connected nodes x 6 DOFs per row
        Self {
            size,
            entries: Vec::with_capacity(size * 60),
        }
    }

    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if value.abs() > 1e-15 {
            self.entries.push((row, col, value));
        }
    }

    pub fn to_csr(&self) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(self.size, self.size);
        for &(row, col, val) in &self.entries {
            coo.push(row, col, val);
        }
        CsrMatrix::from(&coo)
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut mat = DMatrix::zeros(self.size, self.size);
        for &(row, col, val) in &self.entries {
            mat[(row, col)] += val;
        }
        mat
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Fraction of zero entries
    pub fn sparsity(&self) -> f64 {
        let total = (self.size * self.size).max(1);
        1.0 - (self.entries.len() as f64 / total as f64)
    }
}

/// Result of a PCG run
#[derive(Debug, Clone)]
pub struct PcgOutcome {
    pub x: DVector<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Preconditioned conjugate gradient with a Jacobi preconditioner
///
/// Returns `None` on breakdown (non-positive curvature), which signals that the
/// matrix is not positive definite and a dense fallback is needed.
pub fn solve_pcg(
    csr: &CsrMatrix<f64>,
    b: &DVector<f64>,
    tol: f64,
    max_iter: usize,
) -> Option<PcgOutcome> {
    let n = csr.nrows();

    let mut diag = DVector::from_element(n, 1.0);
    for (row, col, &val) in csr.triplet_iter() {
        if row == col && val.abs() > 1e-15 {
            diag[row] = val;
        }
    }

    let b_norm = b.norm();
    let mut x = DVector::zeros(n);
    if b_norm < f64::MIN_POSITIVE {
        return Some(PcgOutcome { x, iterations: 0, converged: true });
    }
    let threshold = tol * b_norm;

    let mut r = b.clone();
    let mut z = r.component_div(&diag);
    let mut p = z.clone();
    let mut r_dot_z = r.dot(&z);

    for iter in 0..max_iter {
        let ap = sparse_matvec(csr, &p);
        let p_dot_ap = p.dot(&ap);
        if p_dot_ap <= 1e-300 {
            return None;
        }

        let alpha = r_dot_z / p_dot_ap;
        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &ap, 1.0);

        if r.norm() < threshold {
            return Some(PcgOutcome { x, iterations: iter + 1, converged: true });
        }

        z = r.component_div(&diag);
        let r_dot_z_new = r.dot(&z);
        let beta = r_dot_z_new / r_dot_z;
        r_dot_z = r_dot_z_new;
        p = &z + beta * &p;
    }

    Some(PcgOutcome { x, iterations: max_iter, converged: false })
}

/// Smallest over largest Cholesky pivot of the Jacobi-scaled matrix
///
/// `None` when the factorization breaks down, i.e. the matrix is not
/// positive definite.
pub fn cholesky_pivot_ratio(csr: &CsrMatrix<f64>) -> Option<f64> {
    let n = csr.nrows();
    let mut scale = DVector::from_element(n, 1.0);
    for (row, col, &val) in csr.triplet_iter() {
        if row == col && val.abs() > 1e-15 {
            scale[row] = 1.0 / val.abs().sqrt();
        }
    }

    let mut coo = CooMatrix::new(n, n);
    for (row, col, &val) in csr.triplet_iter() {
        coo.push(row, col, scale[row] * val * scale[col]);
    }
    let factor = CscCholesky::factor(&CscMatrix::from(&coo)).ok()?;

    let pivots: Vec<f64> = factor
        .l()
        .triplet_iter()
        .filter(|(i, j, _)| i == j)
        .map(|(_, _, &v)| v * v)
        .collect();
    if pivots.len() < n {
        return None;
    }
    let max = pivots.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return None;
    }
    let min = pivots.iter().copied().fold(f64::INFINITY, f64::min);
    Some(min / max)
}

/// `y = A x` over CSR storage
pub fn sparse_matvec(csr: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    let n = csr.nrows();
    let mut y = DVector::zeros(n);

    let row_offsets = csr.row_offsets();
    let col_indices = csr.col_indices();
    let values = csr.values();

    for row in 0..n {
        let mut sum = 0.0;
        for idx in row_offsets[row]..row_offsets[row + 1] {
            sum += values[idx] * x[col_indices[idx]];
        }
        y[row] = sum;
    }
    y
}
