//! Analysis case: type, typed parameters and the run lifecycle

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SolverError, SolverResult};

use super::buckling::BucklingParams;
use super::linear::StaticParams;
use super::modal::ModalParams;
use super::nonlinear::NonlinearParams;
use super::options::AnalysisOptions;
use super::spectrum::SpectrumParams;
use super::time_history::TimeHistoryParams;

/// Type of structural analysis to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisType {
    /// First-order linear static analysis
    LinearStatic,
    /// Natural frequencies and mode shapes
    Modal,
    /// Peak response to a design spectrum
    ResponseSpectrum,
    /// Direct integration of the equations of motion
    TimeHistory,
    /// Incremental-iterative static analysis
    NonlinearStatic,
    /// Linearized elastic buckling
    Buckling,
    /// Second-order P-Delta analysis
    PDelta,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 7] = [
        AnalysisType::LinearStatic,
        AnalysisType::Modal,
        AnalysisType::ResponseSpectrum,
        AnalysisType::TimeHistory,
        AnalysisType::NonlinearStatic,
        AnalysisType::Buckling,
        AnalysisType::PDelta,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinearStatic => "LINEAR_STATIC",
            Self::Modal => "MODAL",
            Self::ResponseSpectrum => "RESPONSE_SPECTRUM",
            Self::TimeHistory => "TIME_HISTORY",
            Self::NonlinearStatic => "NONLINEAR_STATIC",
            Self::Buckling => "BUCKLING",
            Self::PDelta => "P_DELTA",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = SolverError;

    /// Accepts the upper- or lower-case snake form, e.g. `"MODAL"` or `"p_delta"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == key)
            .ok_or_else(|| SolverError::UnsupportedAnalysisType(s.to_string()))
    }
}

/// Case status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl AnalysisStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Typed parameter bag, one variant per analysis type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisParameters {
    LinearStatic(StaticParams),
    Modal(ModalParams),
    ResponseSpectrum(SpectrumParams),
    TimeHistory(TimeHistoryParams),
    NonlinearStatic(NonlinearParams),
    Buckling(BucklingParams),
    PDelta(StaticParams),
}

impl AnalysisParameters {
    /// Default parameters of an analysis type
    pub fn defaults_for(analysis_type: AnalysisType) -> Self {
        match analysis_type {
            AnalysisType::LinearStatic => Self::LinearStatic(StaticParams::default()),
            AnalysisType::Modal => Self::Modal(ModalParams::default()),
            AnalysisType::ResponseSpectrum => Self::ResponseSpectrum(SpectrumParams::default()),
            AnalysisType::TimeHistory => Self::TimeHistory(TimeHistoryParams::default()),
            AnalysisType::NonlinearStatic => Self::NonlinearStatic(NonlinearParams::default()),
            AnalysisType::Buckling => Self::Buckling(BucklingParams::default()),
            AnalysisType::PDelta => Self::PDelta(StaticParams::default()),
        }
    }

    pub fn analysis_type(&self) -> AnalysisType {
        match self {
            Self::LinearStatic(_) => AnalysisType::LinearStatic,
            Self::Modal(_) => AnalysisType::Modal,
            Self::ResponseSpectrum(_) => AnalysisType::ResponseSpectrum,
            Self::TimeHistory(_) => AnalysisType::TimeHistory,
            Self::NonlinearStatic(_) => AnalysisType::NonlinearStatic,
            Self::Buckling(_) => AnalysisType::Buckling,
            Self::PDelta(_) => AnalysisType::PDelta,
        }
    }
}

/// One requested analysis run and its lifecycle
///
/// `Pending → Running → Completed | Failed | Cancelled`. A finished case can
/// be [`reset`](Self::reset) to run again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisCase {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub parameters: AnalysisParameters,
    #[serde(default)]
    pub options: AnalysisOptions,
    #[serde(default)]
    pub status: AnalysisStatus,
    /// Percent, 0 to 100
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_time_seconds: Option<f64>,
}

impl AnalysisCase {
    pub fn new(name: &str, parameters: AnalysisParameters) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            parameters,
            options: AnalysisOptions::default(),
            status: AnalysisStatus::Pending,
            progress: 0.0,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            execution_time_seconds: None,
        }
    }

    /// Case with default parameters for a type given by name
    pub fn for_type(name: &str, analysis_type: &str) -> SolverResult<Self> {
        let analysis_type = analysis_type.parse()?;
        Ok(Self::new(name, AnalysisParameters::defaults_for(analysis_type)))
    }

    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }

    pub fn analysis_type(&self) -> AnalysisType {
        self.parameters.analysis_type()
    }

    /// `Pending → Running`
    pub fn start(&mut self) -> SolverResult<()> {
        if self.status != AnalysisStatus::Pending {
            return Err(SolverError::InvalidInput(format!(
                "case '{}' cannot start from {:?}",
                self.name, self.status
            )));
        }
        self.status = AnalysisStatus::Running;
        self.progress = 0.0;
        self.error_message = None;
        self.started_at = Some(Utc::now());
        self.completed_at = None;
        Ok(())
    }

    /// Progress only moves forward while running
    pub fn set_progress(&mut self, percent: f64) {
        if self.status == AnalysisStatus::Running {
            self.progress = percent.clamp(self.progress, 100.0);
        }
    }

    pub fn complete(&mut self, execution_time: f64) {
        self.status = AnalysisStatus::Completed;
        self.progress = 100.0;
        self.completed_at = Some(Utc::now());
        self.execution_time_seconds = Some(execution_time);
    }

    pub fn fail(&mut self, message: &str) {
        self.status = AnalysisStatus::Failed;
        self.error_message = Some(message.to_string());
        self.completed_at = Some(Utc::now());
        self.execution_time_seconds = self.elapsed();
    }

    pub fn cancel(&mut self) {
        self.status = AnalysisStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        self.execution_time_seconds = self.elapsed();
    }

    /// Back to `Pending`, clearing timestamps and any error
    pub fn reset(&mut self) {
        self.status = AnalysisStatus::Pending;
        self.progress = 0.0;
        self.error_message = None;
        self.started_at = None;
        self.completed_at = None;
        self.execution_time_seconds = None;
    }

    fn elapsed(&self) -> Option<f64> {
        let started = self.started_at?;
        let ended = self.completed_at?;
        Some((ended - started).num_microseconds()? as f64 * 1e-6)
    }
}
