//! Loads acting on element spans

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};
use crate::geometry::LocalAxes;
use crate::math::{LocalAction, Vec3};

/// Direction of an element load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadDirection {
    /// Force along local x (axial)
    Fx,
    /// Force along local y
    Fy,
    /// Force along local z
    Fz,
    /// Couple about local x (torsion)
    Mx,
    /// Couple about local y
    My,
    /// Couple about local z
    Mz,
    /// Force along global X
    FX,
    /// Force along global Y
    FY,
    /// Force along global Z
    FZ,
    /// Couple about global X
    MX,
    /// Couple about global Y
    MY,
    /// Couple about global Z
    MZ,
}

impl LoadDirection {
    pub fn is_local(self) -> bool {
        matches!(
            self,
            Self::Fx | Self::Fy | Self::Fz | Self::Mx | Self::My | Self::Mz
        )
    }

    /// Resolve a magnitude along this direction into local actions
    pub(crate) fn resolve(self, magnitude: f64, axes: &LocalAxes) -> Vec<(LocalAction, f64)> {
        let global = |axis: Vec3, forces: bool| -> Vec<(LocalAction, f64)> {
            let local = axes.rotation() * axis * magnitude;
            let actions = if forces {
                [LocalAction::Fx, LocalAction::Fy, LocalAction::Fz]
            } else {
                [LocalAction::Mx, LocalAction::My, LocalAction::Mz]
            };
            actions
                .into_iter()
                .zip(local.iter().copied())
                .filter(|(_, v)| v.abs() > 1e-14 * magnitude.abs().max(1.0))
                .collect()
        };

        match self {
            Self::Fx => vec![(LocalAction::Fx, magnitude)],
            Self::Fy => vec![(LocalAction::Fy, magnitude)],
            Self::Fz => vec![(LocalAction::Fz, magnitude)],
            Self::Mx => vec![(LocalAction::Mx, magnitude)],
            Self::My => vec![(LocalAction::My, magnitude)],
            Self::Mz => vec![(LocalAction::Mz, magnitude)],
            Self::FX => global(Vec3::x(), true),
            Self::FY => global(Vec3::y(), true),
            Self::FZ => global(Vec3::z(), true),
            Self::MX => global(Vec3::x(), false),
            Self::MY => global(Vec3::y(), false),
            Self::MZ => global(Vec3::z(), false),
        }
    }
}

/// Concentrated force or couple at `position` (distance from the i-node)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementPointLoad {
    pub element: String,
    pub magnitude: f64,
    pub position: f64,
    pub direction: LoadDirection,
}

impl ElementPointLoad {
    pub fn new(element: &str, magnitude: f64, position: f64, direction: LoadDirection) -> Self {
        Self {
            element: element.to_string(),
            magnitude,
            position,
            direction,
        }
    }
}

/// Shape of a line load along its loaded span
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Distribution {
    /// Constant `w_start`
    Uniform,
    /// Linear from `w_start` to `w_end`
    Trapezoidal,
    /// Zero at both span ends, `w_start` at `peak_position` (fraction of the
    /// element length)
    Triangular { peak_position: f64 },
}

/// Line load over `[position_start, position_end]`, given as fractions of
/// the element length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributedLoad {
    pub element: String,
    pub direction: LoadDirection,
    pub w_start: f64,
    #[serde(default)]
    pub w_end: f64,
    pub distribution: Distribution,
    #[serde(default)]
    pub position_start: f64,
    #[serde(default = "full_length")]
    pub position_end: f64,
}

fn full_length() -> f64 {
    1.0
}

impl DistributedLoad {
    /// Constant intensity over the whole element
    pub fn uniform(element: &str, w: f64, direction: LoadDirection) -> Self {
        Self {
            element: element.to_string(),
            direction,
            w_start: w,
            w_end: w,
            distribution: Distribution::Uniform,
            position_start: 0.0,
            position_end: 1.0,
        }
    }

    /// Linearly varying intensity over the whole element
    pub fn trapezoidal(element: &str, w_start: f64, w_end: f64, direction: LoadDirection) -> Self {
        Self {
            distribution: Distribution::Trapezoidal,
            w_end,
            ..Self::uniform(element, w_start, direction)
        }
    }

    /// Triangle peaking at `peak_position` (fraction of the length)
    pub fn triangular(element: &str, peak: f64, peak_position: f64, direction: LoadDirection) -> Self {
        Self {
            distribution: Distribution::Triangular { peak_position },
            w_end: 0.0,
            ..Self::uniform(element, peak, direction)
        }
    }

    /// Restrict the load to a portion of the span
    pub fn over(mut self, position_start: f64, position_end: f64) -> Self {
        self.position_start = position_start;
        self.position_end = position_end;
        self
    }

    /// Linear pieces `(w1, w2, x1, x2)` in absolute distances along a member
    /// of the given length
    pub(crate) fn segments(&self, length: f64) -> SolverResult<Vec<(f64, f64, f64, f64)>> {
        let (s, e) = (self.position_start, self.position_end);
        if !(0.0..=1.0).contains(&s) || !(0.0..=1.0).contains(&e) || e < s {
            return Err(SolverError::InvalidInput(format!(
                "load on '{}' spans [{s}, {e}]; positions must satisfy 0 <= start <= end <= 1",
                self.element
            )));
        }
        let (x1, x2) = (s * length, e * length);

        let pieces = match self.distribution {
            Distribution::Uniform => vec![(self.w_start, self.w_start, x1, x2)],
            Distribution::Trapezoidal => vec![(self.w_start, self.w_end, x1, x2)],
            Distribution::Triangular { peak_position } => {
                if !(s..=e).contains(&peak_position) {
                    return Err(SolverError::InvalidInput(format!(
                        "peak position {peak_position} on '{}' lies outside the loaded span",
                        self.element
                    )));
                }
                let xp = peak_position * length;
                vec![(0.0, self.w_start, x1, xp), (self.w_start, 0.0, xp, x2)]
            }
        };
        Ok(pieces)
    }

    /// Resultant of the line load (integral of the intensity)
    pub fn total_force(&self, length: f64) -> SolverResult<f64> {
        Ok(self
            .segments(length)?
            .iter()
            .map(|(w1, w2, x1, x2)| (w1 + w2) / 2.0 * (x2 - x1))
            .sum())
    }
}

/// Pressure over a tributary width, converted to a uniform line load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaLoad {
    pub element: String,
    /// Pressure (Pa)
    pub pressure: f64,
    /// Width of surface carried by the element (m)
    pub tributary_width: f64,
    pub direction: LoadDirection,
}

impl AreaLoad {
    pub fn new(element: &str, pressure: f64, tributary_width: f64, direction: LoadDirection) -> Self {
        Self {
            element: element.to_string(),
            pressure,
            tributary_width,
            direction,
        }
    }

    /// Equivalent uniform line load
    pub fn as_line_load(&self) -> DistributedLoad {
        DistributedLoad::uniform(
            &self.element,
            self.pressure * self.tributary_width,
            self.direction,
        )
    }
}
