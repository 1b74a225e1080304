// quell/src/propagation.rs

//! The tree propagator: the shared recursive algorithm behind every
//! interrupt whose effect must reach all live leaves in a scope.
//!
//! Plan-wide and subtree-scoped abort, and both abort and expire semantics,
//! all run through [`TreePropagator::handle_scope`] — only the eligible
//! status set and the per-node side effect differ, supplied by a
//! [`DiscontinueAction`].

use crate::completion::InterruptCompletionCallback;
use crate::core::interrupt::{Interrupt, InterruptEffect, InterruptState};
use crate::core::node::{NodeExecution, NodeExecutionId, NodeStatus};
use crate::error::{QuellError, QuellResult};
use crate::registry::InterruptRegistry;
use crate::services::correlator::{CompletionCorrelator, CorrelationKey};
use crate::services::node_tree::NodeExecutionService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// The type-specific half of a propagation: which statuses are eligible,
/// and what to do to each discontinuing node.
#[async_trait]
pub trait DiscontinueAction: Send + Sync {
  fn eligible_statuses(&self) -> &[NodeStatus];

  /// Request the runtime side effect for one discontinuing node.
  async fn discontinue(&self, node: &NodeExecution, interrupt: &Interrupt) -> QuellResult<()>;
}

pub struct TreePropagator {
  registry: Arc<InterruptRegistry>,
  nodes: Arc<dyn NodeExecutionService>,
  correlator: Arc<dyn CompletionCorrelator>,
}

impl TreePropagator {
  pub fn new(
    registry: Arc<InterruptRegistry>,
    nodes: Arc<dyn NodeExecutionService>,
    correlator: Arc<dyn CompletionCorrelator>,
  ) -> Self {
    Self {
      registry,
      nodes,
      correlator,
    }
  }

  /// Apply `interrupt` to every eligible leaf under `scope_root` (the whole
  /// plan when `None`).
  ///
  /// Marks the interrupt `Processing`, transitions the eligible leaves to
  /// `Discontinuing` through the storage layer's conditional updates,
  /// invokes the action's side effect per node, and registers one
  /// correlation key per node so the interrupt settles once every node
  /// reports. Zero eligible leaves is a normal completion. Any failure
  /// after `Processing` marks the interrupt `ProcessedUnsuccessfully`
  /// before propagating.
  #[instrument(
    name = "TreePropagator::handle_scope",
    skip_all,
    fields(
      interrupt_id = %interrupt.id,
      interrupt_type = %interrupt.interrupt_type,
      plan = %interrupt.plan_execution_id,
      subtree = scope_root.map(|r| r.to_string()),
    ),
    err(Display)
  )]
  pub async fn handle_scope(
    &self,
    interrupt: &Interrupt,
    scope_root: Option<&NodeExecutionId>,
    action: &Arc<dyn DiscontinueAction>,
  ) -> QuellResult<()> {
    self.registry.mark_processing(&interrupt.id).await?;

    let plan_id = &interrupt.plan_execution_id;
    let effect = InterruptEffect::of(interrupt);
    let statuses = action.eligible_statuses();

    let bulk_result = match scope_root {
      None => self.nodes.mark_all_leaves_discontinuing(plan_id, statuses, effect).await,
      Some(root) => {
        match self.nodes.find_descendants_with_status_in(plan_id, root, statuses, true).await {
          Err(e) => Err(e),
          Ok(descendants) if descendants.is_empty() => Ok(0),
          Ok(descendants) => {
            let ids: Vec<NodeExecutionId> = descendants.into_iter().map(|n| n.id).collect();
            self.nodes.mark_leaves_discontinuing(plan_id, &ids, effect).await
          }
        }
      }
    };
    let transitioned = self.registry.settle_on_err(&interrupt.id, bulk_result).await?;

    if transitioned < 0 {
      event!(Level::ERROR, count = transitioned, "Bulk discontinue reported failure.");
      self
        .registry
        .mark_processed(&interrupt.id, InterruptState::ProcessedUnsuccessfully)
        .await?;
      return Err(QuellError::TransitionFailed {
        entity: "plan",
        id: plan_id.to_string(),
        detail: format!("bulk discontinue returned {}", transitioned),
      });
    }
    if transitioned == 0 {
      event!(Level::INFO, "No eligible leaves in scope.");
    } else {
      event!(Level::INFO, count = transitioned, "Leaves marked discontinuing.");
    }

    // Raced to completion already, or nothing was eligible to begin with.
    let discontinuing = self
      .registry
      .settle_on_err(
        &interrupt.id,
        self.nodes.fetch_nodes_by_status(plan_id, NodeStatus::Discontinuing).await,
      )
      .await?;
    if discontinuing.is_empty() {
      self
        .registry
        .mark_processed(&interrupt.id, InterruptState::ProcessedSuccessfully)
        .await?;
      return Ok(());
    }

    for node in &discontinuing {
      if let Err(e) = action.discontinue(node, interrupt).await {
        event!(Level::ERROR, node = %node.id, error = %e, "Discontinue side effect failed.");
        return self.registry.settle_on_err(&interrupt.id, Err(e)).await;
      }
    }

    let keys: Vec<CorrelationKey> = discontinuing
      .iter()
      .map(|n| CorrelationKey::new(n.id.clone(), interrupt.id.clone()))
      .collect();
    let callback = Arc::new(InterruptCompletionCallback::new(
      Arc::clone(&self.registry),
      interrupt.id.clone(),
    ));
    self
      .registry
      .settle_on_err(&interrupt.id, self.correlator.wait_for_all(callback, keys).await)
      .await
  }
}
