//! Analysis cases, parameters and the solvers behind them
//!
//! Every analysis type is reached through [`run_analysis`], which owns the
//! case lifecycle. The individual solver modules expose a `run` function
//! taking the model, their typed parameters and a [`SolveContext`].

use serde::{Deserialize, Serialize};

use crate::dof::Dof;

pub mod buckling;
pub mod case;
pub mod dispatcher;
pub mod linear;
pub mod modal;
pub mod nonlinear;
pub mod options;
pub mod p_delta;
pub mod spectrum;
pub mod time_history;

pub use buckling::BucklingParams;
pub use case::{AnalysisCase, AnalysisParameters, AnalysisStatus, AnalysisType};
pub use dispatcher::{run_analysis, AnalysisJob, AnalysisManager, CancelToken, Milestone, SolveContext};
pub use linear::StaticParams;
pub use modal::ModalParams;
pub use nonlinear::{LoadStepping, NonlinearParams};
pub use options::{AnalysisOptions, LinearSolver};
pub use spectrum::{ModalCombination, SpectrumParams};
pub use time_history::{Damping, Excitation, TimeFunction, TimeHistoryParams};

/// Global translation direction for dynamic excitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    X,
    Y,
    Z,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::X, Direction::Y, Direction::Z];

    /// 0, 1, 2 for X, Y, Z
    pub fn index(self) -> usize {
        self as usize
    }

    /// Translational DOF along this direction
    pub fn dof(self) -> Dof {
        Dof::ALL[self.index()]
    }
}
