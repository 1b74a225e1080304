// quell/src/handlers/abort.rs

//! ABORT (single node, synchronous) and ABORT_ALL (plan or subtree, async).

use crate::core::classify;
use crate::core::interrupt::{Interrupt, InterruptEffect, InterruptState, InterruptType};
use crate::core::node::{NodeExecution, NodeStatus};
use crate::error::{QuellError, QuellResult};
use crate::handlers::{require_node_scope, InterruptHandler};
use crate::propagation::{DiscontinueAction, TreePropagator};
use crate::registry::InterruptRegistry;
use crate::services::executor::InterruptExecutor;
use crate::services::node_tree::NodeExecutionService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Propagation profile for abort semantics: abort-eligible statuses, stop
/// side effect.
pub(crate) struct AbortAction {
  executor: Arc<dyn InterruptExecutor>,
}

impl AbortAction {
  pub(crate) fn new(executor: Arc<dyn InterruptExecutor>) -> Self {
    Self { executor }
  }
}

#[async_trait]
impl DiscontinueAction for AbortAction {
  fn eligible_statuses(&self) -> &[NodeStatus] {
    classify::ABORT_ELIGIBLE
  }

  async fn discontinue(&self, node: &NodeExecution, interrupt: &Interrupt) -> QuellResult<()> {
    self.executor.stop(node, interrupt).await
  }
}

/// Immediate, single-node abort. Validates the node up front, then runs the
/// whole transition synchronously: conditional update to `Discontinuing`,
/// stop call, settle.
pub struct AbortHandler {
  registry: Arc<InterruptRegistry>,
  nodes: Arc<dyn NodeExecutionService>,
  executor: Arc<dyn InterruptExecutor>,
}

impl AbortHandler {
  pub fn new(
    registry: Arc<InterruptRegistry>,
    nodes: Arc<dyn NodeExecutionService>,
    executor: Arc<dyn InterruptExecutor>,
  ) -> Self {
    Self {
      registry,
      nodes,
      executor,
    }
  }

}

#[async_trait]
impl InterruptHandler for AbortHandler {
  #[instrument(name = "AbortHandler::register", skip_all, fields(interrupt_id = %interrupt.id), err(Display))]
  async fn register(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    let node_id = require_node_scope(&interrupt)?;
    let node = self.nodes.get(&node_id).await?;
    if !classify::ABORT_ELIGIBLE.contains(&node.status) {
      return Err(QuellError::invalid_state(format!(
        "node '{}' is {:?}; abort acts only on live nodes",
        node_id, node.status
      )));
    }
    let saved = self.registry.save_exclusive(interrupt).await?;
    self.apply_to_node(saved).await
  }

  async fn apply_to_node(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    let node_id = require_node_scope(&interrupt)?;
    self.registry.mark_processing(&interrupt.id).await?;

    let effect = InterruptEffect::of(&interrupt);
    let node = self
      .registry
      .settle_on_err(
        &interrupt.id,
        self
          .nodes
          .update_status_with_effect(&node_id, NodeStatus::Discontinuing, Some(effect), classify::ABORT_ELIGIBLE)
          .await,
      )
      .await?;
    event!(Level::INFO, node = %node.id, "Node discontinuing, requesting stop.");

    self
      .registry
      .settle_on_err(&interrupt.id, self.executor.stop(&node, &interrupt).await)
      .await?;
    self
      .registry
      .mark_processed(&interrupt.id, InterruptState::ProcessedSuccessfully)
      .await
  }
}

/// Plan-wide or subtree abort through the tree propagator. Rejects a
/// duplicate while another ABORT_ALL is active in any overlapping scope:
/// a plan-level abort blocks subtree aborts and vice versa, since both
/// would claim the same `Discontinuing` nodes.
pub struct AbortAllHandler {
  registry: Arc<InterruptRegistry>,
  propagator: Arc<TreePropagator>,
  action: Arc<dyn DiscontinueAction>,
}

impl AbortAllHandler {
  pub fn new(
    registry: Arc<InterruptRegistry>,
    propagator: Arc<TreePropagator>,
    executor: Arc<dyn InterruptExecutor>,
  ) -> Self {
    Self {
      registry,
      propagator,
      action: Arc::new(AbortAction::new(executor)),
    }
  }
}

#[async_trait]
impl InterruptHandler for AbortAllHandler {
  #[instrument(name = "AbortAllHandler::register", skip_all, fields(interrupt_id = %interrupt.id), err(Display))]
  async fn register(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    let active = self.registry.active_for_plan(&interrupt.plan_execution_id).await?;
    if active
      .iter()
      .any(|i| i.interrupt_type == InterruptType::AbortAll && i.overlapping_scope(&interrupt))
    {
      return Err(QuellError::conflict(format!(
        "an ABORT_ALL is already active for plan '{}'",
        interrupt.plan_execution_id
      )));
    }
    let saved = self.registry.save_exclusive(interrupt).await?;
    match saved.node_execution_id {
      Some(_) => self.apply_to_node(saved).await,
      None => self.apply_to_plan(saved).await,
    }
  }

  async fn apply_to_plan(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    self.propagator.handle_scope(&interrupt, None, &self.action).await?;
    self.registry.get(&interrupt.id).await
  }

  async fn apply_to_node(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    let root = require_node_scope(&interrupt)?;
    self.propagator.handle_scope(&interrupt, Some(&root), &self.action).await?;
    self.registry.get(&interrupt.id).await
  }
}
