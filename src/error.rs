//! Error types for the frame solver

use thiserror::Error;

/// Main error type for solver operations
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Node '{0}' already has degrees of freedom assigned")]
    DuplicateNode(String),

    #[error("Node '{0}' has no degrees of freedom assigned")]
    UnassignedNode(String),

    #[error("DOF mapping is finalized; no further node or constraint changes are permitted")]
    DofMappingFinalized,

    #[error("Unsupported analysis type: {0}")]
    UnsupportedAnalysisType(String),

    #[error("Node '{0}' not found in model")]
    NodeNotFound(String),

    #[error("Element '{0}' not found in model")]
    ElementNotFound(String),

    #[error("Material '{0}' not found in model")]
    MaterialNotFound(String),

    #[error("Section '{0}' not found in model")]
    SectionNotFound(String),

    #[error("Load combination '{0}' not found in model")]
    LoadCombinationNotFound(String),

    #[error("Duplicate name '{0}' already exists")]
    DuplicateName(String),

    #[error("No load step converged within {0} iterations")]
    ConvergenceFailed(usize),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Analysis cancelled at {0}")]
    Cancelled(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for solver operations
pub type SolverResult<T> = Result<T, SolverError>;

/// Non-fatal numerical conditions recovered locally and surfaced to the caller
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SolverWarning {
    /// The free-free stiffness was singular; the pseudo-inverse solution was used
    SingularSystem {
        /// Number of free DOFs in the reduced system
        free_dofs: usize,
        /// Numerical rank found by the SVD
        rank: usize,
    },
    /// A nonlinear load step exhausted its iteration budget
    StepNotConverged {
        /// 1-based load step number
        step: usize,
        /// Residual norm at the last iteration
        residual: f64,
    },
    /// Fewer modes exist than were requested
    ModesClamped {
        /// Modes requested by the case
        requested: usize,
        /// Modes actually returned
        returned: usize,
    },
    /// A spectral period fell outside the tabulated curve and was clamped
    SpectrumExtrapolated {
        /// Period in seconds that was clamped
        period: f64,
    },
    /// The static equilibrium check found an unbalanced residual
    StaticsResidual {
        /// Magnitude of the unbalanced force
        residual: f64,
    },
}

impl std::fmt::Display for SolverWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingularSystem { free_dofs, rank } => write!(
                f,
                "singular system: rank {rank} of {free_dofs} free DOFs, pseudo-inverse used"
            ),
            Self::StepNotConverged { step, residual } => {
                write!(f, "load step {step} did not converge (residual {residual:.3e})")
            }
            Self::ModesClamped { requested, returned } => {
                write!(f, "requested {requested} modes, only {returned} available")
            }
            Self::SpectrumExtrapolated { period } => {
                write!(f, "period {period:.4}s outside spectrum; clamped to end value")
            }
            Self::StaticsResidual { residual } => {
                write!(f, "statics check residual {residual:.3e}")
            }
        }
    }
}
