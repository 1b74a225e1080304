// quell/src/services/executor.rs

//! Seam to the runtime that actually stops, expires, or re-runs node work.
//!
//! Leaf work may run on an independently-scheduled remote agent; these calls
//! request the side effect and return. Confirmation that the work actually
//! stopped arrives later through the completion correlator.

use crate::core::interrupt::{Interrupt, InterruptConfig, InterruptId};
use crate::core::node::{NodeExecution, NodeExecutionId};
use crate::error::QuellResult;
use async_trait::async_trait;

#[async_trait]
pub trait InterruptExecutor: Send + Sync {
  /// Tell the runtime to stop a discontinuing leaf, aborted outcome.
  async fn stop(&self, node: &NodeExecution, interrupt: &Interrupt) -> QuellResult<()>;

  /// Tell the runtime to stop a discontinuing leaf, expired outcome.
  async fn expire(&self, node: &NodeExecution, interrupt: &Interrupt) -> QuellResult<()>;

  /// Re-execute a concluded leaf, optionally with overridden parameters.
  async fn retry(
    &self,
    node_id: &NodeExecutionId,
    override_parameters: Option<serde_json::Value>,
    interrupt_id: &InterruptId,
    config: &InterruptConfig,
  ) -> QuellResult<()>;
}
