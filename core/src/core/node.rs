// quell/src/core/node.rs

//! Node-execution records: one node in a plan's execution tree.
//!
//! Leaves do real work and are the only nodes an interrupt discontinues
//! directly; parents fan out to children and conclude through their
//! children's outcomes.

use crate::core::interrupt::InterruptEffect;
use crate::core::plan::PlanExecutionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a single node execution within a plan's tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeExecutionId(pub String);

impl NodeExecutionId {
  pub fn generate() -> Self {
    NodeExecutionId(Uuid::new_v4().to_string())
  }
}

impl fmt::Display for NodeExecutionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for NodeExecutionId {
  fn from(s: &str) -> Self {
    NodeExecutionId(s.to_string())
  }
}

/// Lifecycle status of a node execution.
///
/// `Discontinuing` is the transient status a leaf holds between being
/// targeted by an abort/expire interrupt and the executor confirming the
/// actual stop; it is entered exclusively through a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
  Queued,
  Running,
  AsyncWaiting,
  TaskWaiting,
  InterventionWaiting,
  ApprovalWaiting,
  Pausing,
  Paused,
  Discontinuing,
  Succeeded,
  Failed,
  Errored,
  Expired,
  Aborted,
  IgnoreFailed,
}

/// Whether a node is a working leaf or a structural parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeMode {
  Leaf,
  Parent,
}

impl NodeMode {
  pub fn is_leaf(&self) -> bool {
    matches!(self, NodeMode::Leaf)
  }
}

/// One node of a plan's execution tree, as persisted by the external
/// node-execution tree service.
///
/// `interrupt_histories` is append-only: every interrupt-caused status
/// transition carries a matching [`InterruptEffect`] entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecution {
  pub id: NodeExecutionId,
  pub plan_execution_id: PlanExecutionId,
  pub parent_id: Option<NodeExecutionId>,
  pub name: String,
  pub status: NodeStatus,
  pub mode: NodeMode,
  pub interrupt_histories: Vec<InterruptEffect>,
}

impl NodeExecution {
  pub fn new(
    plan_execution_id: PlanExecutionId,
    parent_id: Option<NodeExecutionId>,
    name: impl Into<String>,
    status: NodeStatus,
    mode: NodeMode,
  ) -> Self {
    Self {
      id: NodeExecutionId::generate(),
      plan_execution_id,
      parent_id,
      name: name.into(),
      status,
      mode,
      interrupt_histories: Vec::new(),
    }
  }
}
