// quell/src/core/plan.rs

//! Plan-execution records: the root record of one pipeline run.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanExecutionId(pub String);

impl PlanExecutionId {
  pub fn generate() -> Self {
    PlanExecutionId(Uuid::new_v4().to_string())
  }
}

impl fmt::Display for PlanExecutionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for PlanExecutionId {
  fn from(s: &str) -> Self {
    PlanExecutionId(s.to_string())
  }
}

/// Aggregate status of a plan execution.
///
/// Interrupt handling forces this in a few places: PAUSE_ALL forces
/// `Pausing`, RESUME_ALL / RETRY / the manual MARK_* interrupts force
/// `Running` so the engine picks the plan back up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
  Running,
  Pausing,
  Paused,
  InterventionWaiting,
  Success,
  Failed,
  Aborted,
  Expired,
  Errored,
}

impl PlanStatus {
  pub fn is_final(&self) -> bool {
    matches!(
      self,
      PlanStatus::Success | PlanStatus::Failed | PlanStatus::Aborted | PlanStatus::Expired | PlanStatus::Errored
    )
  }
}

/// Root record of one pipeline run, as persisted by the external plan
/// execution tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanExecution {
  pub id: PlanExecutionId,
  pub name: String,
  pub status: PlanStatus,
}

impl PlanExecution {
  pub fn new(name: impl Into<String>, status: PlanStatus) -> Self {
    Self {
      id: PlanExecutionId::generate(),
      name: name.into(),
      status,
    }
  }
}
