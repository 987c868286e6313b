//! Round-based stage scheduling
//!
//! Each round runs every ready task of the run in parallel on the
//! configured pool, then records the outcomes and asks for the next set of
//! ready tasks. The orchestrator never writes artifacts itself.

use crate::catalog::{Catalog, DataLayer};
use crate::config::{CoreConfig, RetryPolicy};
use crate::context::{FutureClimateLibrary, RunContext};
use crate::error::Result;
use crate::model::RunId;
use crate::stages::{run_stage, StageContext};
use crate::state::{ready_tasks, RunPlan, StageBook, StageKind, StageStatus};
use crate::store::RasterStore;
use foresight_core::CancelFlag;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// Outcome of [`Orchestrator::run`]
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: RunId,
    pub plan: RunPlan,
    pub book: StageBook,
    /// Artifacts returned by each completed task
    pub artifacts: BTreeMap<StageKind, Vec<DataLayer>>,
    /// Number of rounds executed
    pub rounds: usize,
}

impl RunReport {
    /// Whether every task of the run completed
    pub fn succeeded(&self) -> bool {
        self.plan
            .tasks()
            .into_iter()
            .all(|t| self.book.status(t) == StageStatus::Completed)
    }

    pub fn first_failure(&self) -> Option<(StageKind, String)> {
        self.book
            .failures()
            .next()
            .map(|(task, record)| (*task, record.message.clone().unwrap_or_default()))
    }
}

/// One task execution including retries
struct Attempt {
    /// Messages of transient failures that were retried
    retried: Vec<String>,
    result: Result<Vec<DataLayer>>,
}

pub struct Orchestrator<'a> {
    config: &'a CoreConfig,
    store: &'a dyn RasterStore,
    catalog: &'a dyn Catalog,
    runs: &'a dyn RunContext,
    library: &'a dyn FutureClimateLibrary,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a CoreConfig,
        store: &'a dyn RasterStore,
        catalog: &'a dyn Catalog,
        runs: &'a dyn RunContext,
        library: &'a dyn FutureClimateLibrary,
    ) -> Self {
        Self {
            config,
            store,
            catalog,
            runs,
            library,
        }
    }

    /// Drive a run until every task completed, one failed, or nothing is
    /// ready any more.
    ///
    /// Stage failures are reported in the returned [`RunReport`]; `Err` is
    /// only returned when the run cannot be scheduled at all.
    pub fn run(&self, run_id: RunId, cancel: &CancelFlag) -> Result<RunReport> {
        let pool = self.config.thread_pool()?;
        let plan = RunPlan::from_run(&self.runs.get_run(run_id)?);
        let ctx = StageContext {
            config: self.config,
            store: self.store,
            catalog: self.catalog,
            runs: self.runs,
            library: self.library,
            cancel,
        };

        let mut report = RunReport {
            run: run_id,
            plan,
            book: StageBook::new(),
            artifacts: BTreeMap::new(),
            rounds: 0,
        };

        loop {
            let ready = ready_tasks(&report.plan, &report.book);
            if ready.is_empty() {
                break;
            }
            report.rounds += 1;
            info!(
                "run {}: round {} with {} tasks",
                run_id,
                report.rounds,
                ready.len()
            );
            for &task in &ready {
                report.book.start(task)?;
            }

            let outcomes: Vec<(StageKind, Attempt)> = pool.install(|| {
                ready
                    .par_iter()
                    .map(|&task| (task, execute(&ctx, run_id, task, &self.config.retry)))
                    .collect()
            });

            for (task, attempt) in outcomes {
                for message in attempt.retried {
                    report.book.retry(task, message)?;
                }
                match attempt.result {
                    Ok(layers) => {
                        report.book.complete(task)?;
                        report.artifacts.insert(task, layers);
                    }
                    Err(e) => {
                        error!("run {}: {} failed: {}", run_id, task, e);
                        report.book.fail(task, e.to_string())?;
                    }
                }
            }
        }

        if report.book.has_failure() {
            warn!("run {} stopped after a failed stage", run_id);
        } else if report.succeeded() {
            info!("run {} completed in {} rounds", run_id, report.rounds);
        }
        Ok(report)
    }
}

/// Run a task, retrying transient failures per `policy`
fn execute(ctx: &StageContext<'_>, run_id: RunId, task: StageKind, policy: &RetryPolicy) -> Attempt {
    let mut retried = Vec::new();
    loop {
        match run_stage(ctx, run_id, task) {
            Err(e) if e.is_transient() && (retried.len() as u32) < policy.max_retries => {
                warn!(
                    "run {}: {} attempt {} failed: {}, retrying in {:?}",
                    run_id,
                    task,
                    retried.len() + 1,
                    e,
                    policy.backoff()
                );
                retried.push(e.to_string());
                std::thread::sleep(policy.backoff());
            }
            result => return Attempt { retried, result },
        }
    }
}
