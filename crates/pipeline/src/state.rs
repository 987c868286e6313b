//! Stage status tracking and readiness
//!
//! The orchestrator keeps one [`StageBook`] per run and asks
//! [`ready_tasks`] what may start next. Readiness is a pure function of the
//! run plan and the book.

use crate::error::{PipelineError, Result};
use crate::model::{LayerId, PillarId, RunRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One unit of work, keyed by stage and entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "stage", content = "id", rename_all = "snake_case")]
pub enum StageKind {
    Statistics(LayerId),
    Normalize(LayerId),
    Pillar(PillarId),
    Landscape,
    Promote,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Statistics(id) => write!(f, "statistics[layer {}]", id),
            StageKind::Normalize(id) => write!(f, "normalize[layer {}]", id),
            StageKind::Pillar(id) => write!(f, "pillar[{}]", id),
            StageKind::Landscape => write!(f, "landscape"),
            StageKind::Promote => write!(f, "promote"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl StageStatus {
    /// `Pending -> Running -> Completed | Failed`. Both end states are
    /// final; retries happen while the stage stays `Running`.
    pub fn transition(self, to: StageStatus) -> Result<StageStatus> {
        use StageStatus::*;
        match (self, to) {
            (Pending, Running) | (Running, Completed) | (Running, Failed) => Ok(to),
            _ => Err(PipelineError::InvalidTransition {
                from: format!("{:?}", self),
                to: format!("{:?}", to),
            }),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Failed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub status: StageStatus,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Status of every task of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageBook {
    records: BTreeMap<StageKind, StageRecord>,
}

impl StageBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, task: StageKind) -> StageStatus {
        self.records.get(&task).map(|r| r.status).unwrap_or_default()
    }

    pub fn record(&self, task: StageKind) -> Option<&StageRecord> {
        self.records.get(&task)
    }

    pub fn is_completed(&self, task: StageKind) -> bool {
        self.status(task) == StageStatus::Completed
    }

    pub fn has_failure(&self) -> bool {
        self.records.values().any(|r| r.status == StageStatus::Failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&StageKind, &StageRecord)> {
        self.records
            .iter()
            .filter(|(_, r)| r.status == StageStatus::Failed)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StageKind, &StageRecord)> {
        self.records.iter()
    }

    fn set(&mut self, task: StageKind, to: StageStatus, message: Option<String>) -> Result<()> {
        let record = self.records.entry(task).or_default();
        record.status = record.status.transition(to)?;
        if to == StageStatus::Running {
            record.attempts += 1;
        }
        record.message = message;
        Ok(())
    }

    pub fn start(&mut self, task: StageKind) -> Result<()> {
        self.set(task, StageStatus::Running, None)
    }

    pub fn complete(&mut self, task: StageKind) -> Result<()> {
        self.set(task, StageStatus::Completed, None)
    }

    pub fn fail(&mut self, task: StageKind, message: impl Into<String>) -> Result<()> {
        self.set(task, StageStatus::Failed, Some(message.into()))
    }

    /// Record a transient failure of a running task that is tried again.
    ///
    /// The task stays `Running`; the failure is kept as its message.
    pub fn retry(&mut self, task: StageKind, message: impl Into<String>) -> Result<()> {
        match self.records.get_mut(&task) {
            Some(record) if record.status == StageStatus::Running => {
                record.attempts += 1;
                record.message = Some(message.into());
                Ok(())
            }
            other => Err(PipelineError::InvalidTransition {
                from: format!("{:?}", other.map(|r| r.status).unwrap_or_default()),
                to: "retry".into(),
            }),
        }
    }
}

/// The task graph of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunPlan {
    /// Every input layer with its pillar assignment
    pub layers: Vec<(LayerId, Option<PillarId>)>,
    /// Pillars with at least one assigned input
    pub pillars: Vec<PillarId>,
}

impl RunPlan {
    pub fn from_run(run: &RunRecord) -> Self {
        Self {
            layers: run.inputs.iter().map(|l| (l.id, l.pillar_id)).collect(),
            pillars: run.active_pillars().map(|p| p.id).collect(),
        }
    }

    /// Every task of the run, upstream first
    pub fn tasks(&self) -> Vec<StageKind> {
        let mut tasks: Vec<StageKind> = self
            .layers
            .iter()
            .map(|&(id, _)| StageKind::Statistics(id))
            .collect();
        tasks.extend(self.layers.iter().map(|&(id, _)| StageKind::Normalize(id)));
        tasks.extend(self.pillars.iter().map(|&id| StageKind::Pillar(id)));
        tasks.push(StageKind::Landscape);
        tasks.push(StageKind::Promote);
        tasks
    }

    fn dependencies(&self, task: StageKind) -> Vec<StageKind> {
        match task {
            StageKind::Statistics(_) => Vec::new(),
            StageKind::Normalize(id) => vec![StageKind::Statistics(id)],
            StageKind::Pillar(pillar) => self
                .layers
                .iter()
                .filter(|&&(_, p)| p == Some(pillar))
                .map(|&(id, _)| StageKind::Normalize(id))
                .collect(),
            StageKind::Landscape => {
                let mut deps: Vec<StageKind> =
                    self.pillars.iter().map(|&id| StageKind::Pillar(id)).collect();
                deps.extend(
                    self.layers
                        .iter()
                        .filter(|&&(_, p)| p.is_none())
                        .map(|&(id, _)| StageKind::Normalize(id)),
                );
                deps
            }
            StageKind::Promote => vec![StageKind::Landscape],
        }
    }
}

/// Tasks that may start now: pending, with every dependency completed.
///
/// Returns nothing once any task of the run has failed.
pub fn ready_tasks(plan: &RunPlan, book: &StageBook) -> Vec<StageKind> {
    if book.has_failure() {
        return Vec::new();
    }
    plan.tasks()
        .into_iter()
        .filter(|&task| book.status(task) == StageStatus::Pending)
        .filter(|&task| plan.dependencies(task).iter().all(|&d| book.is_completed(d)))
        .collect()
}
