//! Single entry point for every analysis type
//!
//! [`run_analysis`] validates the model, dispatches on the case parameters
//! and drives the case status. Any error leaves the case `Failed` (or
//! `Cancelled`), never `Running`.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SolverError, SolverResult};
use crate::model::StructuralModel;
use crate::results::{AnalysisResult, Diagnostics, ResultPayload};

use super::case::{AnalysisCase, AnalysisParameters, AnalysisStatus};
use super::options::AnalysisOptions;
use super::{buckling, linear, modal, nonlinear, p_delta, spectrum, time_history};

/// Shared cancellation flag, checked by long solvers at step boundaries
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Coarse progress points reported to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Milestone {
    DataLoaded,
    Initialized,
    ModelBuilt,
    Solving,
    PostProcessing,
    Completed,
}

impl Milestone {
    pub fn percent(self) -> f64 {
        match self {
            Self::DataLoaded => 10.0,
            Self::Initialized => 20.0,
            Self::ModelBuilt => 30.0,
            Self::Solving => 50.0,
            Self::PostProcessing => 90.0,
            Self::Completed => 100.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::DataLoaded => "Loading model data",
            Self::Initialized => "Initializing degrees of freedom",
            Self::ModelBuilt => "Model built",
            Self::Solving => "Solving",
            Self::PostProcessing => "Post-processing results",
            Self::Completed => "Completed",
        }
    }
}

/// Per-run context handed to the solvers: options, cancellation and the
/// progress observer
pub struct SolveContext<'a> {
    pub options: &'a AnalysisOptions,
    cancel: &'a CancelToken,
    observer: Option<&'a mut dyn FnMut(Milestone)>,
    reached: Option<Milestone>,
}

impl<'a> SolveContext<'a> {
    pub fn new(options: &'a AnalysisOptions, cancel: &'a CancelToken) -> Self {
        Self {
            options,
            cancel,
            observer: None,
            reached: None,
        }
    }

    pub fn with_observer(mut self, observer: &'a mut dyn FnMut(Milestone)) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Report a milestone; repeated or earlier milestones are ignored
    pub fn milestone(&mut self, milestone: Milestone) {
        if self.reached.is_some_and(|r| r >= milestone) {
            return;
        }
        self.reached = Some(milestone);
        log::debug!("{} ({:.0}%)", milestone.label(), milestone.percent());
        if let Some(observer) = self.observer.as_mut() {
            observer(milestone);
        }
    }

    pub fn reached(&self) -> Option<Milestone> {
        self.reached
    }

    /// Error out if cancellation was requested; `at` names the boundary
    pub fn checkpoint(&self, at: impl FnOnce() -> String) -> SolverResult<()> {
        if self.cancel.is_cancelled() {
            let at = at();
            log::info!("Analysis cancelled at {}", at);
            return Err(SolverError::Cancelled(at));
        }
        Ok(())
    }
}

/// Run one case against a model
///
/// The case must be `Pending`. On success it ends `Completed` with progress
/// 100; on error it ends `Failed` with the message recorded, or `Cancelled`.
pub fn run_analysis(
    case: &mut AnalysisCase,
    model: &StructuralModel,
    mut observer: Option<&mut dyn FnMut(Milestone)>,
    cancel: &CancelToken,
) -> SolverResult<AnalysisResult> {
    case.start()?;
    log::info!("Starting {} analysis '{}' ({})", case.analysis_type(), case.name, case.id);

    let started = Instant::now();
    let options = case.options.clone();
    let mut ctx = SolveContext::new(&options, cancel);
    if let Some(observer) = observer.as_deref_mut() {
        ctx = ctx.with_observer(observer);
    }
    let outcome = dispatch(&case.parameters, model, &mut ctx);
    let elapsed = started.elapsed().as_secs_f64();
    if let Some(reached) = ctx.reached() {
        case.set_progress(reached.percent());
    }

    match outcome {
        Ok((payload, mut diagnostics)) => {
            ctx.milestone(Milestone::Completed);
            diagnostics.solve_time = elapsed;
            case.complete(elapsed);
            log::info!("Analysis '{}' completed in {:.3} s", case.name, elapsed);
            Ok(AnalysisResult {
                case_id: case.id,
                case_name: case.name.clone(),
                analysis_type: case.analysis_type(),
                payload,
                diagnostics,
            })
        }
        Err(SolverError::Cancelled(at)) => {
            case.cancel();
            Err(SolverError::Cancelled(at))
        }
        Err(err) => {
            log::error!("Analysis '{}' failed: {}", case.name, err);
            case.fail(&err.to_string());
            Err(err)
        }
    }
}

fn dispatch(
    parameters: &AnalysisParameters,
    model: &StructuralModel,
    ctx: &mut SolveContext<'_>,
) -> SolverResult<(ResultPayload, Diagnostics)> {
    ctx.checkpoint(|| "start".to_string())?;
    model.validate()?;
    ctx.milestone(Milestone::DataLoaded);

    let outcome = match parameters {
        AnalysisParameters::LinearStatic(params) => {
            let (result, diagnostics) = linear::run(model, params, ctx)?;
            (ResultPayload::LinearStatic(result), diagnostics)
        }
        AnalysisParameters::PDelta(params) => {
            let (result, diagnostics) = p_delta::run(model, params, ctx)?;
            (ResultPayload::PDelta(result), diagnostics)
        }
        AnalysisParameters::Modal(params) => {
            let (result, diagnostics) = modal::run(model, params, ctx)?;
            (ResultPayload::Modal(result), diagnostics)
        }
        AnalysisParameters::ResponseSpectrum(params) => {
            let (result, diagnostics) = spectrum::run(model, params, ctx)?;
            (ResultPayload::ResponseSpectrum(result), diagnostics)
        }
        AnalysisParameters::TimeHistory(params) => {
            let (result, diagnostics) = time_history::run(model, params, ctx)?;
            (ResultPayload::TimeHistory(result), diagnostics)
        }
        AnalysisParameters::NonlinearStatic(params) => {
            let (result, diagnostics) = nonlinear::run(model, params, ctx)?;
            (ResultPayload::NonlinearStatic(result), diagnostics)
        }
        AnalysisParameters::Buckling(params) => {
            let (result, diagnostics) = buckling::run(model, params, ctx)?;
            (ResultPayload::Buckling(result), diagnostics)
        }
    };
    Ok(outcome)
}

type JobRunner = fn(&mut AnalysisCase, &StructuralModel, &CancelToken) -> SolverResult<AnalysisResult>;

fn run_unobserved(
    case: &mut AnalysisCase,
    model: &StructuralModel,
    cancel: &CancelToken,
) -> SolverResult<AnalysisResult> {
    run_analysis(case, model, None, cancel)
}

/// A case paired with the model snapshot it runs against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub case: AnalysisCase,
    pub model: StructuralModel,
}

/// Batch runner for independent cases
///
/// Each job owns its model, so jobs can run on separate threads without
/// sharing any solver state.
#[derive(Debug, Default)]
pub struct AnalysisManager {
    queue: Vec<AnalysisJob>,
    completed: BTreeMap<Uuid, (AnalysisCase, AnalysisResult)>,
    failed: BTreeMap<Uuid, AnalysisCase>,
    cancel: CancelToken,
}

impl AnalysisManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a case; returns its id
    pub fn submit(&mut self, case: AnalysisCase, model: StructuralModel) -> Uuid {
        let id = case.id;
        self.queue.push(AnalysisJob { case, model });
        id
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Token that cancels every queued and running job
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run queued jobs one after another
    pub fn run_all(&mut self) {
        self.run_sequential_with(run_unobserved);
    }

    /// Run queued jobs on scoped threads, one per job
    pub fn run_all_parallel(&mut self) {
        self.run_parallel_with(run_unobserved);
    }

    fn run_sequential_with(&mut self, runner: JobRunner) {
        let jobs = std::mem::take(&mut self.queue);
        for job in jobs {
            let outcome = Self::run_job(job, &self.cancel, runner);
            self.record(outcome);
        }
    }

    fn run_parallel_with(&mut self, runner: JobRunner) {
        let jobs = std::mem::take(&mut self.queue);
        let cancel = &self.cancel;
        let outcomes: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .into_iter()
                .map(|job| {
                    let case = job.case.clone();
                    (case, scope.spawn(move || Self::run_job(job, cancel, runner)))
                })
                .collect();
            handles
                .into_iter()
                .map(|(mut case, handle)| match handle.join() {
                    Ok(outcome) => outcome,
                    Err(payload) => {
                        Self::fail_panicked(&mut case, payload.as_ref());
                        (case, None)
                    }
                })
                .collect()
        });
        for outcome in outcomes {
            self.record(outcome);
        }
    }

    // A panicking solver must still leave its case accounted for as Failed
    fn run_job(
        mut job: AnalysisJob,
        cancel: &CancelToken,
        runner: JobRunner,
    ) -> (AnalysisCase, Option<AnalysisResult>) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| runner(&mut job.case, &job.model, cancel)));
        match outcome {
            Ok(result) => (job.case, result.ok()),
            Err(payload) => {
                Self::fail_panicked(&mut job.case, payload.as_ref());
                (job.case, None)
            }
        }
    }

    fn fail_panicked(case: &mut AnalysisCase, payload: &(dyn Any + Send)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log::error!("Analysis '{}' panicked: {}", case.name, message);
        case.fail(&format!("solver panicked: {message}"));
    }

    fn record(&mut self, (case, result): (AnalysisCase, Option<AnalysisResult>)) {
        match result {
            Some(result) if case.status == AnalysisStatus::Completed => {
                self.completed.insert(case.id, (case, result));
            }
            _ => {
                self.failed.insert(case.id, case);
            }
        }
    }

    pub fn completed(&self) -> &BTreeMap<Uuid, (AnalysisCase, AnalysisResult)> {
        &self.completed
    }

    /// Failed and cancelled cases, with their error message
    pub fn failed(&self) -> &BTreeMap<Uuid, AnalysisCase> {
        &self.failed
    }

    pub fn result(&self, id: &Uuid) -> Option<&AnalysisResult> {
        self.completed.get(id).map(|(_, r)| r)
    }

    /// Status of a finished case
    pub fn status(&self, id: &Uuid) -> Option<AnalysisStatus> {
        self.completed
            .get(id)
            .map(|(c, _)| c.status)
            .or_else(|| self.failed.get(id).map(|c| c.status))
    }
}
