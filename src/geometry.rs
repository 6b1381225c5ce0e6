//! Geometry engine: lengths, direction cosines and local axis triads for
//! two-node line elements.
//!
//! Local axes follow the PyNite convention: local x runs from the start node
//! to the end node, local y is taken from an "up" reference (global +Y unless
//! the element supplies its own), and local z completes the right-handed
//! triad. Members parallel to the reference use global +Z as local z. An
//! orientation angle then rotates y and z about local x.

use crate::error::{SolverError, SolverResult};
use crate::math::{Mat12, Mat3, Vec3};

/// Elements shorter than this are rejected as degenerate
pub const LENGTH_EPSILON: f64 = 1e-10;

/// Default up reference for local y
pub const DEFAULT_UP: [f64; 3] = [0.0, 1.0, 0.0];

const PARALLEL_TOL: f64 = 1e-8;

/// Right-handed local coordinate triad of a line element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalAxes {
    /// Local x (element axis, unit vector from start to end)
    pub x: Vec3,
    /// Local y
    pub y: Vec3,
    /// Local z
    pub z: Vec3,
}

impl LocalAxes {
    /// 3x3 direction cosine matrix with the local axes as rows
    pub fn rotation(&self) -> Mat3 {
        Mat3::from_rows(&[
            self.x.transpose(),
            self.y.transpose(),
            self.z.transpose(),
        ])
    }

    /// 12x12 global-to-local transformation with the rotation replicated
    /// across the four 3-DOF blocks
    pub fn transformation(&self) -> Mat12 {
        let r = self.rotation();
        let mut t = Mat12::zeros();
        for block in 0..4 {
            let offset = block * 3;
            t.fixed_view_mut::<3, 3>(offset, offset).copy_from(&r);
        }
        t
    }
}

/// Euclidean length between two points
///
/// Fails with [`SolverError::DegenerateGeometry`] below [`LENGTH_EPSILON`].
pub fn element_length(start: &[f64; 3], end: &[f64; 3]) -> SolverResult<f64> {
    let length = (Vec3::from(*end) - Vec3::from(*start)).norm();
    if length < LENGTH_EPSILON || !length.is_finite() {
        return Err(SolverError::DegenerateGeometry(format!(
            "element from {:?} to {:?} has length {:.3e}",
            start, end, length
        )));
    }
    Ok(length)
}

/// Unit vector from start to end
pub fn direction_cosines(start: &[f64; 3], end: &[f64; 3]) -> SolverResult<Vec3> {
    let length = element_length(start, end)?;
    Ok((Vec3::from(*end) - Vec3::from(*start)) / length)
}

/// Local axis triad for an element.
///
/// `reference` overrides the default up vector; when it is parallel to the
/// element axis the default resolution is used instead. `rotation` (radians)
/// rotates y and z about local x.
pub fn local_axes(
    start: &[f64; 3],
    end: &[f64; 3],
    reference: Option<[f64; 3]>,
    rotation: f64,
) -> SolverResult<LocalAxes> {
    let x = direction_cosines(start, end)?;

    let up = reference
        .map(Vec3::from)
        .filter(|r| r.norm() > PARALLEL_TOL && x.cross(r).norm() > PARALLEL_TOL * r.norm())
        .unwrap_or_else(|| Vec3::from(DEFAULT_UP));

    let z_raw = x.cross(&up);
    let z = if z_raw.norm() > PARALLEL_TOL {
        z_raw.normalize()
    } else {
        // Parallel to global Y: local z is global Z
        Vec3::z()
    };
    let y = z.cross(&x).normalize();

    let (y, z) = if rotation.abs() > 1e-12 {
        let (sin_r, cos_r) = rotation.sin_cos();
        (y * cos_r + z * sin_r, z * cos_r - y * sin_r)
    } else {
        (y, z)
    };

    Ok(LocalAxes { x, y, z })
}

/// Convenience: the 12x12 transformation for an element
pub fn transformation_matrix(
    start: &[f64; 3],
    end: &[f64; 3],
    reference: Option<[f64; 3]>,
    rotation: f64,
) -> SolverResult<Mat12> {
    Ok(local_axes(start, end, reference, rotation)?.transformation())
}
