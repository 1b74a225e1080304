// quell/src/services/correlator.rs

//! Completion correlation: the wait/notify seam that decouples "signal
//! applied" from "signal settled".
//!
//! Async interrupt variants never block on downstream completion. They
//! register one correlation key per affected node together with a callback;
//! the callback fires exactly once when every key has resolved, possibly
//! from another process. Implementations are expected to back this with a
//! durable queue or subscription so registration survives restarts.

use crate::core::interrupt::InterruptId;
use crate::core::node::{NodeExecutionId, NodeStatus};
use crate::error::QuellResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Composite key correlating one affected node with the interrupt that
/// targeted it. Rendered as `"{node}|{interrupt}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationKey {
  pub node_execution_id: NodeExecutionId,
  pub interrupt_id: InterruptId,
}

impl CorrelationKey {
  pub fn new(node_execution_id: NodeExecutionId, interrupt_id: InterruptId) -> Self {
    Self {
      node_execution_id,
      interrupt_id,
    }
  }
}

impl fmt::Display for CorrelationKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}|{}", self.node_execution_id, self.interrupt_id)
  }
}

/// How one correlated node settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionOutcome {
  /// The node reached the given terminal status.
  Settled(NodeStatus),
  /// The executor reported it could not complete the requested effect.
  Failed(String),
}

impl CompletionOutcome {
  pub fn is_settled(&self) -> bool {
    matches!(self, CompletionOutcome::Settled(_))
  }
}

/// Callback invoked exactly once when every registered key has resolved.
#[async_trait]
pub trait CompletionCallback: Send + Sync {
  async fn on_all_resolved(&self, outcomes: HashMap<CorrelationKey, CompletionOutcome>);
}

#[async_trait]
pub trait CompletionCorrelator: Send + Sync {
  /// Register `keys` against `callback`. The callback runs after the last
  /// key resolves; an empty key set is a registration error.
  async fn wait_for_all(&self, callback: Arc<dyn CompletionCallback>, keys: Vec<CorrelationKey>) -> QuellResult<()>;

  /// Resolve one key. Invoked externally when a node's work actually
  /// stops, resumes, or a failure-strategy decision lands. Resolving a key
  /// nobody waits on is permitted and ignored.
  async fn resolve(&self, key: &CorrelationKey, outcome: CompletionOutcome) -> QuellResult<()>;
}
