// quell/src/services/failure.rs

//! Seam to the external custom-failure-strategy evaluator.

use crate::core::interrupt::{InterruptId, InterruptType};
use crate::core::node::NodeExecution;
use crate::error::QuellResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Event published when a CUSTOM_FAILURE interrupt asks an external
/// evaluator to decide the node's fate. The response arrives as a
/// correlated resolution on the interrupt's correlation key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureStrategyEvent {
  pub interrupt_id: InterruptId,
  pub interrupt_type: InterruptType,
  /// Snapshot of the node at publish time.
  pub node: NodeExecution,
  pub metadata: HashMap<String, serde_json::Value>,
}

#[async_trait]
pub trait FailureStrategyChannel: Send + Sync {
  async fn publish(&self, event: FailureStrategyEvent) -> QuellResult<()>;
}
