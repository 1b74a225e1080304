// quell/src/core/interrupt.rs

//! Interrupt records: persisted control-plane signals against a running
//! plan or a subtree of its execution tree.
//!
//! An interrupt is created on acceptance, mutated only through the registry
//! and its owning handler, and never deleted — the record doubles as the
//! audit trail of every control action taken against a run.

use crate::core::node::NodeExecutionId;
use crate::core::plan::PlanExecutionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Identifier of a persisted interrupt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterruptId(pub String);

impl InterruptId {
  pub fn generate() -> Self {
    InterruptId(Uuid::new_v4().to_string())
  }
}

impl fmt::Display for InterruptId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for InterruptId {
  fn from(s: &str) -> Self {
    InterruptId(s.to_string())
  }
}

/// The closed set of control-plane signal types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterruptType {
  Abort,
  AbortAll,
  ExpireAll,
  PauseAll,
  ResumeAll,
  Retry,
  MarkExpired,
  MarkFailed,
  MarkSuccess,
  IgnoreFailed,
  CustomFailure,
}

impl InterruptType {
  /// Exclusive types admit at most one active interrupt per scope
  /// (plan, or plan + subtree root). The registry store enforces this
  /// at insert time.
  pub fn is_exclusive(&self) -> bool {
    matches!(
      self,
      InterruptType::AbortAll | InterruptType::ExpireAll | InterruptType::PauseAll | InterruptType::ResumeAll
    )
  }

  /// Types that only ever target a single node, never a whole plan.
  pub fn node_scoped_only(&self) -> bool {
    matches!(
      self,
      InterruptType::Abort
        | InterruptType::Retry
        | InterruptType::MarkExpired
        | InterruptType::MarkFailed
        | InterruptType::MarkSuccess
        | InterruptType::IgnoreFailed
        | InterruptType::CustomFailure
    )
  }
}

impl fmt::Display for InterruptType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}", self)
  }
}

/// Lifecycle of an interrupt record.
///
/// `Registered → Processing → {ProcessedSuccessfully | ProcessedUnsuccessfully | Discarded}`.
/// `Discarded` is also reachable straight from `Registered` when a newer
/// interrupt supersedes this one. Terminal states never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterruptState {
  Registered,
  Processing,
  ProcessedSuccessfully,
  ProcessedUnsuccessfully,
  Discarded,
}

impl InterruptState {
  pub fn is_active(&self) -> bool {
    matches!(self, InterruptState::Registered | InterruptState::Processing)
  }

  pub fn is_terminal(&self) -> bool {
    !self.is_active()
  }
}

/// Type-specific payload carried by an interrupt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterruptConfig {
  /// Operator- or policy-supplied reason, surfaced in the audit trail.
  pub reason: Option<String>,
  /// Who issued the signal.
  pub issued_by: Option<String>,
  /// RETRY only: parameter overrides applied to the re-executed node.
  pub override_parameters: Option<serde_json::Value>,
  /// Free-form extras, e.g. the custom-failure strategy selector.
  pub metadata: HashMap<String, serde_json::Value>,
}

impl InterruptConfig {
  pub fn with_reason(reason: impl Into<String>) -> Self {
    Self {
      reason: Some(reason.into()),
      ..Default::default()
    }
  }
}

/// A persisted control-plane signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interrupt {
  pub id: InterruptId,
  pub interrupt_type: InterruptType,
  pub plan_execution_id: PlanExecutionId,
  /// Set for node/subtree scope; `None` means whole-plan scope.
  pub node_execution_id: Option<NodeExecutionId>,
  pub state: InterruptState,
  pub config: InterruptConfig,
  pub created_at: DateTime<Utc>,
  /// When the interrupt reached a terminal state.
  pub settled_at: Option<DateTime<Utc>>,
}

impl Interrupt {
  pub fn new(
    interrupt_type: InterruptType,
    plan_execution_id: PlanExecutionId,
    node_execution_id: Option<NodeExecutionId>,
    config: InterruptConfig,
  ) -> Self {
    Self {
      id: InterruptId::generate(),
      interrupt_type,
      plan_execution_id,
      node_execution_id,
      state: InterruptState::Registered,
      config,
      created_at: Utc::now(),
      settled_at: None,
    }
  }

  /// Whether `other` targets the same scope as this interrupt: same plan,
  /// and same optional subtree root.
  pub fn same_scope(&self, other: &Interrupt) -> bool {
    self.plan_execution_id == other.plan_execution_id && self.node_execution_id == other.node_execution_id
  }

  /// Whether the two scopes can reach the same nodes: same plan, and
  /// either one is plan-wide or both name the same subtree root. Tree-wide
  /// exclusives conflict on overlap, not only on scope equality.
  pub fn overlapping_scope(&self, other: &Interrupt) -> bool {
    self.plan_execution_id == other.plan_execution_id
      && (self.node_execution_id.is_none()
        || other.node_execution_id.is_none()
        || self.node_execution_id == other.node_execution_id)
  }
}

/// Audit entry appended to a node's `interrupt_histories` whenever an
/// interrupt causes a status transition on that node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptEffect {
  pub interrupt_id: InterruptId,
  pub interrupt_type: InterruptType,
  pub effective_at: DateTime<Utc>,
  pub config: InterruptConfig,
}

impl InterruptEffect {
  /// Snapshot the issuing interrupt at the moment the effect is applied.
  pub fn of(interrupt: &Interrupt) -> Self {
    Self {
      interrupt_id: interrupt.id.clone(),
      interrupt_type: interrupt.interrupt_type,
      effective_at: Utc::now(),
      config: interrupt.config.clone(),
    }
  }
}
