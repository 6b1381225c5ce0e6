//! Solver settings shared by every analysis type

use serde::{Deserialize, Serialize};

use crate::assembly::MassFormulation;

/// Linear equation solver for the free-free system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearSolver {
    /// LU with SVD pseudo-inverse fallback
    #[default]
    Dense,
    /// Jacobi-preconditioned CG over CSR storage, dense fallback
    Sparse,
}

/// Options for structural analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Convergence tolerance for iterative procedures (relative)
    pub tolerance: f64,
    /// Iteration cap per nonlinear step / P-Delta run / PCG solve (x n)
    pub max_iterations: usize,
    pub solver: LinearSolver,
    pub mass: MassFormulation,
    /// Record the static equilibrium residual in the diagnostics
    pub check_statics: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 30,
            solver: LinearSolver::Dense,
            mass: MassFormulation::Consistent,
            check_statics: false,
        }
    }
}

impl AnalysisOptions {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iter(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_solver(mut self, solver: LinearSolver) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_mass(mut self, mass: MassFormulation) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_statics_check(mut self) -> Self {
        self.check_statics = true;
        self
    }
}
