//! Dense symmetric generalized eigenproblem `B φ = μ A φ`
//!
//! `A` must be symmetric positive definite. With `A = L Lᵀ` the problem is
//! reduced to the standard form `(L⁻¹ B L⁻ᵀ) ψ = μ ψ`, `φ = L⁻ᵀ ψ`, so every
//! returned vector satisfies `φᵀ A φ = 1`.

use nalgebra::linalg::SymmetricEigen;
use nalgebra::DMatrix;
use std::cmp::Ordering;

/// Eigenpairs sorted by descending eigenvalue
#[derive(Debug, Clone)]
pub struct GeneralizedEigen {
    pub values: Vec<f64>,
    /// One eigenvector per column, matching `values`
    pub vectors: DMatrix<f64>,
}

impl GeneralizedEigen {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Solve `b φ = μ a φ`; `None` when `a` is not positive definite
pub fn generalized_eigen(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Option<GeneralizedEigen> {
    let n = a.nrows();
    if n == 0 {
        return Some(GeneralizedEigen {
            values: Vec::new(),
            vectors: DMatrix::zeros(0, 0),
        });
    }

    let chol = a.clone().cholesky()?;
    let l_inv = chol.l().try_inverse()?;

    let reduced = &l_inv * b * l_inv.transpose();
    let reduced = (&reduced + reduced.transpose()) * 0.5;

    let eig = SymmetricEigen::new(reduced);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        eig.eigenvalues[j]
            .partial_cmp(&eig.eigenvalues[i])
            .unwrap_or(Ordering::Equal)
    });

    let back = l_inv.transpose();
    let mut vectors = DMatrix::zeros(n, n);
    let mut values = Vec::with_capacity(n);
    for (col, &idx) in order.iter().enumerate() {
        values.push(eig.eigenvalues[idx]);
        let phi = &back * eig.eigenvectors.column(idx);
        vectors.set_column(col, &phi);
    }

    Some(GeneralizedEigen { values, vectors })
}
