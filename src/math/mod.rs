//! Element kernels and linear-algebra helpers
//!
//! Sign conventions for member end vectors follow the 12-DOF ordering
//! `[Fx_i, Fy_i, Fz_i, Mx_i, My_i, Mz_i, Fx_j, Fy_j, Fz_j, Mx_j, My_j, Mz_j]`.
//! Fixed-end reactions (FER) are the end forces of a fully fixed member under
//! span loads; equivalent nodal loads are their negation.

pub mod eigen;
pub mod sparse;

use nalgebra::{DMatrix, DVector, Matrix3, SMatrix, SVector, Vector3};

pub use eigen::{generalized_eigen, GeneralizedEigen};
pub use sparse::{cholesky_pivot_ratio, solve_pcg, SparseMatrixBuilder};

pub type Mat = DMatrix<f64>;
pub type Vector = DVector<f64>;
pub type Mat3 = Matrix3<f64>;
pub type Vec3 = Vector3<f64>;

/// 12x12 matrix for member stiffness, mass and transformation
pub type Mat12 = SMatrix<f64, 12, 12>;
/// 12-element vector for member forces/displacements
pub type Vec12 = SVector<f64, 12>;

/// Local stiffness matrix of a 3D Euler-Bernoulli frame element
///
/// # Arguments
/// * `e` - Modulus of elasticity
/// * `g` - Shear modulus
/// * `a` - Cross-sectional area
/// * `iy` - Moment of inertia about local y-axis
/// * `iz` - Moment of inertia about local z-axis
/// * `j` - Torsional constant
/// * `length` - Member length
pub fn local_beam_stiffness(e: f64, g: f64, a: f64, iy: f64, iz: f64, j: f64, length: f64) -> Mat12 {
    let l = length;
    let l2 = l * l;
    let l3 = l2 * l;

    let ea_l = e * a / l;
    let gj_l = g * j / l;

    let eiy_l3 = e * iy / l3;
    let eiy_l2 = e * iy / l2;
    let eiy_l = e * iy / l;

    let eiz_l3 = e * iz / l3;
    let eiz_l2 = e * iz / l2;
    let eiz_l = e * iz / l;

    #[rustfmt::skip]
    let data = [
        ea_l,  0.0,          0.0,          0.0,   0.0,         0.0,         -ea_l, 0.0,          0.0,          0.0,   0.0,         0.0,
        0.0,   12.0*eiz_l3,  0.0,          0.0,   0.0,         6.0*eiz_l2,  0.0,   -12.0*eiz_l3, 0.0,          0.0,   0.0,         6.0*eiz_l2,
        0.0,   0.0,          12.0*eiy_l3,  0.0,   -6.0*eiy_l2, 0.0,         0.0,   0.0,          -12.0*eiy_l3, 0.0,   -6.0*eiy_l2, 0.0,
        0.0,   0.0,          0.0,          gj_l,  0.0,         0.0,         0.0,   0.0,          0.0,          -gj_l, 0.0,         0.0,
        0.0,   0.0,          -6.0*eiy_l2,  0.0,   4.0*eiy_l,   0.0,         0.0,   0.0,          6.0*eiy_l2,   0.0,   2.0*eiy_l,   0.0,
        0.0,   6.0*eiz_l2,   0.0,          0.0,   0.0,         4.0*eiz_l,   0.0,   -6.0*eiz_l2,  0.0,          0.0,   0.0,         2.0*eiz_l,
        -ea_l, 0.0,          0.0,          0.0,   0.0,         0.0,         ea_l,  0.0,          0.0,          0.0,   0.0,         0.0,
        0.0,   -12.0*eiz_l3, 0.0,          0.0,   0.0,         -6.0*eiz_l2, 0.0,   12.0*eiz_l3,  0.0,          0.0,   0.0,         -6.0*eiz_l2,
        0.0,   0.0,          -12.0*eiy_l3, 0.0,   6.0*eiy_l2,  0.0,         0.0,   0.0,          12.0*eiy_l3,  0.0,   6.0*eiy_l2,  0.0,
        0.0,   0.0,          0.0,          -gj_l, 0.0,         0.0,         0.0,   0.0,          0.0,          gj_l,  0.0,         0.0,
        0.0,   0.0,          -6.0*eiy_l2,  0.0,   2.0*eiy_l,   0.0,         0.0,   0.0,          6.0*eiy_l2,   0.0,   4.0*eiy_l,   0.0,
        0.0,   6.0*eiz_l2,   0.0,          0.0,   0.0,         2.0*eiz_l,   0.0,   -6.0*eiz_l2,  0.0,          0.0,   0.0,         4.0*eiz_l,
    ];

    Mat12::from_row_slice(&data)
}

/// Local stiffness of an axial-only (truss) element
pub fn local_truss_stiffness(e: f64, a: f64, length: f64) -> Mat12 {
    let ea_l = e * a / length;
    let mut k = Mat12::zeros();
    k[(0, 0)] = ea_l;
    k[(6, 6)] = ea_l;
    k[(0, 6)] = -ea_l;
    k[(6, 0)] = -ea_l;
    k
}

/// Local geometric (stress) stiffness for a member carrying axial force `p`
///
/// `p` is tension-positive; compression softens the bending terms.
pub fn local_geometric_stiffness(p: f64, a: f64, iy: f64, iz: f64, length: f64) -> Mat12 {
    if p.abs() < 1e-12 {
        return Mat12::zeros();
    }

    let l = length;
    let l2 = l * l;
    let ip = iy + iz;
    let p_l = p / l;

    #[rustfmt::skip]
    let data = [
        p_l,   0.0,           0.0,           0.0,         0.0,               0.0,               -p_l,  0.0,           0.0,           0.0,         0.0,               0.0,
        0.0,   6.0*p_l/5.0,   0.0,           0.0,         0.0,               p_l*l/10.0,        0.0,   -6.0*p_l/5.0,  0.0,           0.0,         0.0,               p_l*l/10.0,
        0.0,   0.0,           6.0*p_l/5.0,   0.0,         -p_l*l/10.0,       0.0,               0.0,   0.0,           -6.0*p_l/5.0,  0.0,         -p_l*l/10.0,       0.0,
        0.0,   0.0,           0.0,           p_l*ip/a,    0.0,               0.0,               0.0,   0.0,           0.0,           -p_l*ip/a,   0.0,               0.0,
        0.0,   0.0,           -p_l*l/10.0,   0.0,         2.0*p_l*l2/15.0,   0.0,               0.0,   0.0,           p_l*l/10.0,    0.0,         -p_l*l2/30.0,      0.0,
        0.0,   p_l*l/10.0,    0.0,           0.0,         0.0,               2.0*p_l*l2/15.0,   0.0,   -p_l*l/10.0,   0.0,           0.0,         0.0,               -p_l*l2/30.0,
        -p_l,  0.0,           0.0,           0.0,         0.0,               0.0,               p_l,   0.0,           0.0,           0.0,         0.0,               0.0,
        0.0,   -6.0*p_l/5.0,  0.0,           0.0,         0.0,               -p_l*l/10.0,       0.0,   6.0*p_l/5.0,   0.0,           0.0,         0.0,               -p_l*l/10.0,
        0.0,   0.0,           -6.0*p_l/5.0,  0.0,         p_l*l/10.0,        0.0,               0.0,   0.0,           6.0*p_l/5.0,   0.0,         p_l*l/10.0,        0.0,
        0.0,   0.0,           0.0,           -p_l*ip/a,   0.0,               0.0,               0.0,   0.0,           0.0,           p_l*ip/a,    0.0,               0.0,
        0.0,   0.0,           -p_l*l/10.0,   0.0,         -p_l*l2/30.0,      0.0,               0.0,   0.0,           p_l*l/10.0,    0.0,         2.0*p_l*l2/15.0,   0.0,
        0.0,   p_l*l/10.0,    0.0,           0.0,         0.0,               -p_l*l2/30.0,      0.0,   -p_l*l/10.0,   0.0,           0.0,         0.0,               2.0*p_l*l2/15.0,
    ];

    Mat12::from_row_slice(&data)
}

/// Geometric stiffness of a truss element: string stiffness on the transverse DOFs
pub fn local_truss_geometric_stiffness(p: f64, length: f64) -> Mat12 {
    let mut kg = Mat12::zeros();
    if p.abs() < 1e-12 {
        return kg;
    }
    let p_l = p / length;
    for dof in [1, 2] {
        kg[(dof, dof)] = p_l;
        kg[(dof + 6, dof + 6)] = p_l;
        kg[(dof, dof + 6)] = -p_l;
        kg[(dof + 6, dof)] = -p_l;
    }
    kg
}

/// Consistent mass matrix of a 3D frame element
///
/// `mass_per_length` is the line mass; `polar_ratio` is `Ip / A`, used for the
/// torsional inertia.
pub fn local_consistent_mass(mass_per_length: f64, polar_ratio: f64, length: f64) -> Mat12 {
    let l = length;
    let m = mass_per_length * l;
    let mut mm = Mat12::zeros();

    let mut set = |i: usize, j: usize, v: f64| {
        mm[(i, j)] = v * m;
        mm[(j, i)] = v * m;
    };

    // Axial
    set(0, 0, 1.0 / 3.0);
    set(6, 6, 1.0 / 3.0);
    set(0, 6, 1.0 / 6.0);

    // Torsion
    set(3, 3, polar_ratio / 3.0);
    set(9, 9, polar_ratio / 3.0);
    set(3, 9, polar_ratio / 6.0);

    // Bending in the local x-y plane (v, rz)
    set(1, 1, 13.0 / 35.0);
    set(7, 7, 13.0 / 35.0);
    set(1, 5, 11.0 * l / 210.0);
    set(1, 7, 9.0 / 70.0);
    set(1, 11, -13.0 * l / 420.0);
    set(5, 5, l * l / 105.0);
    set(5, 7, 13.0 * l / 420.0);
    set(5, 11, -l * l / 140.0);
    set(7, 11, -11.0 * l / 210.0);
    set(11, 11, l * l / 105.0);

    // Bending in the local x-z plane (w, ry)
    set(2, 2, 13.0 / 35.0);
    set(8, 8, 13.0 / 35.0);
    set(2, 4, -11.0 * l / 210.0);
    set(2, 8, 9.0 / 70.0);
    set(2, 10, 13.0 * l / 420.0);
    set(4, 4, l * l / 105.0);
    set(4, 8, -13.0 * l / 420.0);
    set(4, 10, -l * l / 140.0);
    set(8, 10, 11.0 * l / 210.0);
    set(10, 10, l * l / 105.0);

    mm
}

/// Consistent mass of a truss element (translations only)
pub fn local_truss_mass(mass_per_length: f64, length: f64) -> Mat12 {
    let m = mass_per_length * length;
    let mut mm = Mat12::zeros();
    for d in 0..3 {
        mm[(d, d)] = m / 3.0;
        mm[(d + 6, d + 6)] = m / 3.0;
        mm[(d, d + 6)] = m / 6.0;
        mm[(d + 6, d)] = m / 6.0;
    }
    mm
}

/// Lumped (diagonal) mass: half the member mass at each end
///
/// Rotational inertia `rotary_per_length * L / 2` is lumped on every
/// rotational DOF; pass zero for truss members.
pub fn local_lumped_mass(mass_per_length: f64, rotary_per_length: f64, length: f64) -> Mat12 {
    let half = mass_per_length * length / 2.0;
    let inertia = rotary_per_length * length / 2.0;
    let mut mm = Mat12::zeros();
    for end in [0, 6] {
        for d in 0..3 {
            mm[(end + d, end + d)] = half;
            mm[(end + 3 + d, end + 3 + d)] = inertia;
        }
    }
    mm
}

/// Member-local load component a span load acts along
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAction {
    /// Force along local x
    Fx,
    /// Force along local y
    Fy,
    /// Force along local z
    Fz,
    /// Couple about local x
    Mx,
    /// Couple about local y
    My,
    /// Couple about local z
    Mz,
}

/// Equivalent nodal loads (local coordinates) of a concentrated action at
/// distance `a` from the i-node, from the cubic Hermite shape functions.
pub fn equivalent_point_action(action: LocalAction, magnitude: f64, a: f64, length: f64) -> Vec12 {
    let l = length;
    let s = (a / l).clamp(0.0, 1.0);
    let s2 = s * s;
    let s3 = s2 * s;

    // Hermite shape functions for (v1, rz1, v2, rz2) and their slopes
    let n = [
        1.0 - 3.0 * s2 + 2.0 * s3,
        l * (s - 2.0 * s2 + s3),
        3.0 * s2 - 2.0 * s3,
        l * (s3 - s2),
    ];
    let dn = [
        (6.0 * s2 - 6.0 * s) / l,
        1.0 - 4.0 * s + 3.0 * s2,
        (6.0 * s - 6.0 * s2) / l,
        3.0 * s2 - 2.0 * s,
    ];

    let mut f = Vec12::zeros();
    match action {
        LocalAction::Fx => {
            f[0] = magnitude * (1.0 - s);
            f[6] = magnitude * s;
        }
        LocalAction::Mx => {
            f[3] = magnitude * (1.0 - s);
            f[9] = magnitude * s;
        }
        LocalAction::Fy => {
            f[1] = magnitude * n[0];
            f[5] = magnitude * n[1];
            f[7] = magnitude * n[2];
            f[11] = magnitude * n[3];
        }
        LocalAction::Fz => {
            // ry = -dw/dx flips the rotational terms
            f[2] = magnitude * n[0];
            f[4] = -magnitude * n[1];
            f[8] = magnitude * n[2];
            f[10] = -magnitude * n[3];
        }
        LocalAction::Mz => {
            f[1] = magnitude * dn[0];
            f[5] = magnitude * dn[1];
            f[7] = magnitude * dn[2];
            f[11] = magnitude * dn[3];
        }
        LocalAction::My => {
            f[2] = -magnitude * dn[0];
            f[4] = magnitude * dn[1];
            f[8] = -magnitude * dn[2];
            f[10] = magnitude * dn[3];
        }
    }
    f
}

// Three-point Gauss-Legendre rule on [-1, 1]; exact for the quartic
// integrand of a linearly varying load against cubic shape functions.
const GAUSS_POINTS: [(f64, f64); 3] = [
    (-0.774_596_669_241_483_4, 5.0 / 9.0),
    (0.0, 8.0 / 9.0),
    (0.774_596_669_241_483_4, 5.0 / 9.0),
];

/// Equivalent nodal loads of a linearly varying line load `w1 -> w2` acting
/// on `[x1, x2]` along the member.
pub fn equivalent_linear_load(
    action: LocalAction,
    w1: f64,
    w2: f64,
    x1: f64,
    x2: f64,
    length: f64,
) -> Vec12 {
    let span = x2 - x1;
    if span.abs() < 1e-12 {
        return Vec12::zeros();
    }
    let half = span / 2.0;
    let mid = (x1 + x2) / 2.0;

    let mut f = Vec12::zeros();
    for (xi, weight) in GAUSS_POINTS {
        let x = mid + half * xi;
        let t = (x - x1) / span;
        let w = w1 + (w2 - w1) * t;
        f += equivalent_point_action(action, w * weight * half, x, length);
    }
    f
}

/// Fixed end reactions for a uniformly distributed load over the full length
pub fn fer_uniform_load(action: LocalAction, w: f64, length: f64) -> Vec12 {
    -equivalent_linear_load(action, w, w, 0.0, length, length)
}

/// Partition helper shared by the release condensations
fn split_released(releases: &[bool; 12]) -> (Vec<usize>, Vec<usize>) {
    (0..12).partition(|&i| !releases[i])
}

/// Static condensation of released member-end DOFs
///
/// Returns the condensed 12x12 matrix with zero rows/columns at the released
/// DOFs. The input is returned unchanged if the released block is singular.
pub fn apply_releases(k: &Mat12, releases: &[bool; 12]) -> Mat12 {
    let (kept, released) = split_released(releases);
    if released.is_empty() {
        return *k;
    }

    let k11 = DMatrix::from_fn(kept.len(), kept.len(), |i, j| k[(kept[i], kept[j])]);
    let k12 = DMatrix::from_fn(kept.len(), released.len(), |i, j| k[(kept[i], released[j])]);
    let k21 = DMatrix::from_fn(released.len(), kept.len(), |i, j| k[(released[i], kept[j])]);
    let k22 = DMatrix::from_fn(released.len(), released.len(), |i, j| {
        k[(released[i], released[j])]
    });

    let Some(k22_inv) = k22.try_inverse() else {
        return *k;
    };
    let condensed = &k11 - &k12 * &k22_inv * &k21;

    let mut result = Mat12::zeros();
    for (i, &ui) in kept.iter().enumerate() {
        for (j, &uj) in kept.iter().enumerate() {
            result[(ui, uj)] = condensed[(i, j)];
        }
    }
    result
}

/// Static condensation of a fixed-end reaction vector:
/// `fer_c = fer1 - k12 * inv(k22) * fer2`
pub fn apply_fer_releases(fer: &Vec12, k: &Mat12, releases: &[bool; 12]) -> Vec12 {
    let (kept, released) = split_released(releases);
    if released.is_empty() {
        return *fer;
    }

    let k12 = DMatrix::from_fn(kept.len(), released.len(), |i, j| k[(kept[i], released[j])]);
    let k22 = DMatrix::from_fn(released.len(), released.len(), |i, j| {
        k[(released[i], released[j])]
    });
    let fer1 = DVector::from_fn(kept.len(), |i, _| fer[kept[i]]);
    let fer2 = DVector::from_fn(released.len(), |i, _| fer[released[i]]);

    let Some(k22_inv) = k22.try_inverse() else {
        return *fer;
    };
    let condensed = &fer1 - &k12 * &k22_inv * &fer2;

    let mut result = Vec12::zeros();
    for (i, &ui) in kept.iter().enumerate() {
        result[ui] = condensed[i];
    }
    result
}

/// Pivot ratio below which a scaled system is treated as singular
pub const SINGULAR_PIVOT_RATIO: f64 = 1e-11;

/// Outcome of a dense solve with pseudo-inverse fallback
#[derive(Debug, Clone)]
pub struct DenseSolution {
    pub x: Vector,
    /// True when the SVD least-squares solution was used
    pub rank_deficient: bool,
    /// Numerical rank (equals the system size on the direct path)
    pub rank: usize,
}

/// Solve `a x = b` by LU on the diagonally scaled system; fall back to the
/// SVD pseudo-inverse when the LU pivots show the matrix is singular or
/// ill-conditioned, or the result is not finite.
pub fn solve_with_fallback(a: &Mat, b: &Vector) -> DenseSolution {
    let n = a.nrows();
    let d = jacobi_scaling(a);
    let scaled = Mat::from_fn(n, n, |i, j| d[i] * a[(i, j)] * d[j]);
    let rhs = b.component_mul(&d);

    let lu = scaled.clone().lu();
    let ratio = pivot_ratio(&lu.u().diagonal());
    if ratio > SINGULAR_PIVOT_RATIO {
        if let Some(y) = lu.solve(&rhs) {
            let x = y.component_mul(&d);
            if x.iter().all(|v| v.is_finite()) && !has_large_residual(a, &x, b) {
                return DenseSolution { x, rank_deficient: false, rank: n };
            }
        }
    }

    let svd = scaled.svd(true, true);
    let max_sv = svd.singular_values.max();
    let eps = (max_sv * n.max(1) as f64 * f64::EPSILON * 1e3).max(f64::MIN_POSITIVE);
    let rank = svd.rank(eps);
    let x = svd
        .solve(&rhs, eps)
        .map(|y| y.component_mul(&d))
        .unwrap_or_else(|_| Vector::zeros(n));
    DenseSolution { x, rank_deficient: true, rank }
}

/// `1/sqrt(|a_ii|)` per row, 1 where the diagonal vanishes
pub fn jacobi_scaling(a: &Mat) -> Vector {
    Vector::from_fn(a.nrows(), |i, _| {
        let aii = a[(i, i)].abs();
        if aii > f64::MIN_POSITIVE {
            1.0 / aii.sqrt()
        } else {
            1.0
        }
    })
}

/// Smallest over largest absolute pivot, 0 for an empty or zero diagonal
pub fn pivot_ratio(pivots: &Vector) -> f64 {
    let max = pivots.iter().fold(0.0_f64, |acc, p| acc.max(p.abs()));
    if max <= 0.0 || !max.is_finite() {
        return 0.0;
    }
    let min = pivots.iter().fold(f64::INFINITY, |acc, p| acc.min(p.abs()));
    min / max
}

fn has_large_residual(a: &Mat, x: &Vector, b: &Vector) -> bool {
    let scale = b.norm().max(a.norm() * x.norm()).max(f64::MIN_POSITIVE);
    (a * x - b).norm() > 1e-6 * scale
}

/// Extract the square sub-matrix `m[rows, rows]`
pub fn submatrix(m: &Mat, rows: &[usize]) -> Mat {
    Mat::from_fn(rows.len(), rows.len(), |i, j| m[(rows[i], rows[j])])
}

/// Extract `v[rows]`
pub fn subvector(v: &Vector, rows: &[usize]) -> Vector {
    Vector::from_fn(rows.len(), |i, _| v[rows[i]])
}

/// Largest absolute asymmetry `|m_ij - m_ji|`
pub fn max_asymmetry(m: &Mat12) -> f64 {
    let mut worst = 0.0_f64;
    for i in 0..12 {
        for j in (i + 1)..12 {
            worst = worst.max((m[(i, j)] - m[(j, i)]).abs());
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn local_stiffness_is_symmetric_and_finite() {
        let cases = [
            (200e9, 77e9, 0.01, 1e-4, 2e-4, 1e-5, 10.0),
            (30e9, 12.5e9, 0.09, 6.75e-4, 6.75e-4, 1.1e-3, 3.0),
            (1.0, 0.4, 1e-6, 1e-12, 1e-12, 1e-12, 1e-3),
            (70e9, 26e9, 2.0, 5.0, 3.0, 1.0, 250.0),
        ];
        for (e, g, a, iy, iz, j, l) in cases {
            let k = local_beam_stiffness(e, g, a, iy, iz, j, l);
            assert!(k.iter().all(|v| v.is_finite()));
            assert!(max_asymmetry(&k) <= 1e-9 * k.amax());
        }
    }

    #[test]
    fn consistent_mass_conserves_translational_mass() {
        let m = local_consistent_mass(78.5, 0.02, 4.0);
        assert!(max_asymmetry(&m) < 1e-12);
        // Rigid translation along local y: u^T M u = total mass
        let mut u = Vec12::zeros();
        u[1] = 1.0;
        u[7] = 1.0;
        assert_relative_eq!((u.transpose() * m * u)[(0, 0)], 78.5 * 4.0, epsilon = 1e-9);
    }

    #[test]
    fn uniform_load_matches_closed_form() {
        let (w, l) = (-5000.0, 6.0);
        let fer = fer_uniform_load(LocalAction::Fy, w, l);
        assert_relative_eq!(fer[1], -w * l / 2.0, epsilon = 1e-9);
        assert_relative_eq!(fer[5], -w * l * l / 12.0, epsilon = 1e-9);
        assert_relative_eq!(fer[7], -w * l / 2.0, epsilon = 1e-9);
        assert_relative_eq!(fer[11], w * l * l / 12.0, epsilon = 1e-9);

        let fer_z = fer_uniform_load(LocalAction::Fz, w, l);
        assert_relative_eq!(fer_z[4], w * l * l / 12.0, epsilon = 1e-9);
        assert_relative_eq!(fer_z[10], -w * l * l / 12.0, epsilon = 1e-9);
    }

    #[test]
    fn point_load_matches_closed_form() {
        let (p, a, l) = (1000.0, 2.0, 5.0);
        let b = l - a;
        let f = equivalent_point_action(LocalAction::Fy, p, a, l);
        assert_relative_eq!(f[1], p * b * b * (3.0 * a + b) / l.powi(3), epsilon = 1e-9);
        assert_relative_eq!(f[5], p * a * b * b / (l * l), epsilon = 1e-9);
        assert_relative_eq!(f[11], -p * a * a * b / (l * l), epsilon = 1e-9);
    }

    #[test]
    fn point_couple_is_self_equilibrated() {
        let f = equivalent_point_action(LocalAction::Mz, 250.0, 1.5, 4.0);
        assert_relative_eq!(f[1] + f[7], 0.0, epsilon = 1e-9);
        assert_relative_eq!(f[5] + f[11] + f[7] * 4.0, 250.0, epsilon = 1e-9);
    }

    #[test]
    fn pin_release_zeroes_end_moment_stiffness() {
        let k = local_beam_stiffness(200e9, 77e9, 0.01, 1e-4, 2e-4, 1e-5, 10.0);
        let mut releases = [false; 12];
        releases[5] = true;
        let kc = apply_releases(&k, &releases);
        for j in 0..12 {
            assert_eq!(kc[(5, j)], 0.0);
        }
        // Propped cantilever transverse stiffness 3EI/L^3
        assert_relative_eq!(kc[(7, 7)], 3.0 * 200e9 * 2e-4 / 1000.0, max_relative = 1e-9);
    }

    #[test]
    fn singular_system_falls_back_to_pseudo_inverse() {
        let a = Mat::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let b = Vector::from_vec(vec![2.0, 2.0]);
        let sol = solve_with_fallback(&a, &b);
        assert!(sol.rank_deficient);
        assert_eq!(sol.rank, 1);
        assert_relative_eq!(sol.x[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(sol.x[1], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn near_singular_system_is_flagged() {
        // Backward-stable LU returns a small residual here; the pivots do not
        let a = Mat::from_row_slice(2, 2, &[1e10, 1e10, 1e10, 1e10 * (1.0 + 1e-15)]);
        let b = Vector::from_vec(vec![1.0, 2.0]);
        let sol = solve_with_fallback(&a, &b);
        assert!(sol.rank_deficient);
        assert_eq!(sol.rank, 1);
        assert!(sol.x.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn badly_scaled_but_regular_system_is_solved_directly() {
        let a = Mat::from_row_slice(2, 2, &[1e12, 0.0, 0.0, 1e-2]);
        let b = Vector::from_vec(vec![1e12, 1e-2]);
        let sol = solve_with_fallback(&a, &b);
        assert!(!sol.rank_deficient);
        assert_relative_eq!(sol.x[0], 1.0, max_relative = 1e-12);
        assert_relative_eq!(sol.x[1], 1.0, max_relative = 1e-12);
    }
}
