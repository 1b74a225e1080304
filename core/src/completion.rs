// quell/src/completion.rs

//! Correlator glue: the callback that settles an interrupt once every node
//! it discontinued has reported back.

use crate::core::interrupt::{InterruptId, InterruptState};
use crate::registry::InterruptRegistry;
use crate::services::correlator::{CompletionCallback, CompletionOutcome, CorrelationKey};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, Level};

/// Marks the owning interrupt processed when all correlation keys resolve:
/// successfully when every outcome is `Settled`, unsuccessfully otherwise.
///
/// The registry's terminal-state guard makes a duplicate invocation (or one
/// racing a direct failure path in a handler) harmless.
pub struct InterruptCompletionCallback {
  registry: Arc<InterruptRegistry>,
  interrupt_id: InterruptId,
}

impl InterruptCompletionCallback {
  pub fn new(registry: Arc<InterruptRegistry>, interrupt_id: InterruptId) -> Self {
    Self { registry, interrupt_id }
  }
}

#[async_trait]
impl CompletionCallback for InterruptCompletionCallback {
  async fn on_all_resolved(&self, outcomes: HashMap<CorrelationKey, CompletionOutcome>) {
    let all_settled = outcomes.values().all(CompletionOutcome::is_settled);
    let terminal = if all_settled {
      InterruptState::ProcessedSuccessfully
    } else {
      InterruptState::ProcessedUnsuccessfully
    };
    event!(
      Level::DEBUG,
      interrupt_id = %self.interrupt_id,
      resolved = outcomes.len(),
      state = ?terminal,
      "All correlation keys resolved."
    );
    if let Err(e) = self.registry.mark_processed(&self.interrupt_id, terminal).await {
      // The interrupt record stays an audit trail; a failed final write is
      // logged and left for the liveness owner to reconcile.
      event!(Level::ERROR, interrupt_id = %self.interrupt_id, error = %e, "Failed to settle interrupt.");
    }
  }
}
