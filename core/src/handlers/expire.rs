// quell/src/handlers/expire.rs

//! EXPIRE_ALL (plan or subtree, async, off the registering task) and
//! MARK_EXPIRED (single node, synchronous).

use crate::core::classify;
use crate::core::interrupt::{Interrupt, InterruptEffect, InterruptState, InterruptType};
use crate::core::node::{NodeExecution, NodeStatus};
use crate::error::{QuellError, QuellResult};
use crate::handlers::{require_node_scope, InterruptHandler};
use crate::propagation::{DiscontinueAction, TreePropagator};
use crate::registry::InterruptRegistry;
use crate::services::executor::InterruptExecutor;
use crate::services::node_tree::NodeExecutionService;
use crate::services::plan::PlanExecutionService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Propagation profile for expiry: same eligibility as abort, expired
/// outcome.
pub(crate) struct ExpireAction {
  executor: Arc<dyn InterruptExecutor>,
}

impl ExpireAction {
  pub(crate) fn new(executor: Arc<dyn InterruptExecutor>) -> Self {
    Self { executor }
  }
}

#[async_trait]
impl DiscontinueAction for ExpireAction {
  fn eligible_statuses(&self) -> &[NodeStatus] {
    classify::EXPIRE_ELIGIBLE
  }

  async fn discontinue(&self, node: &NodeExecution, interrupt: &Interrupt) -> QuellResult<()> {
    self.executor.expire(node, interrupt).await
  }
}

/// Plan-wide or subtree expiry. Registration validates and persists
/// synchronously; the propagation itself runs on a spawned task so a large
/// tree never blocks the registering caller.
pub struct ExpireAllHandler {
  registry: Arc<InterruptRegistry>,
  plans: Arc<dyn PlanExecutionService>,
  propagator: Arc<TreePropagator>,
  action: Arc<dyn DiscontinueAction>,
}

impl Clone for ExpireAllHandler {
  fn clone(&self) -> Self {
    Self {
      registry: Arc::clone(&self.registry),
      plans: Arc::clone(&self.plans),
      propagator: Arc::clone(&self.propagator),
      action: Arc::clone(&self.action),
    }
  }
}

impl ExpireAllHandler {
  pub fn new(
    registry: Arc<InterruptRegistry>,
    plans: Arc<dyn PlanExecutionService>,
    propagator: Arc<TreePropagator>,
    executor: Arc<dyn InterruptExecutor>,
  ) -> Self {
    Self {
      registry,
      plans,
      propagator,
      action: Arc::new(ExpireAction::new(executor)),
    }
  }
}

#[async_trait]
impl InterruptHandler for ExpireAllHandler {
  #[instrument(name = "ExpireAllHandler::register", skip_all, fields(interrupt_id = %interrupt.id), err(Display))]
  async fn register(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    let plan = self.plans.get(&interrupt.plan_execution_id).await?;
    if plan.status.is_final() {
      return Err(QuellError::invalid_state(format!(
        "plan '{}' already finished as {:?}",
        plan.id, plan.status
      )));
    }

    let active = self.registry.active_for_plan(&interrupt.plan_execution_id).await?;
    if active.iter().any(|i| i.interrupt_type == InterruptType::AbortAll) {
      return Err(QuellError::conflict(format!(
        "an ABORT_ALL is active for plan '{}'; expiry is moot",
        interrupt.plan_execution_id
      )));
    }
    if active
      .iter()
      .any(|i| i.interrupt_type == InterruptType::ExpireAll && i.overlapping_scope(&interrupt))
    {
      return Err(QuellError::conflict(format!(
        "an EXPIRE_ALL is already active for plan '{}'",
        interrupt.plan_execution_id
      )));
    }

    let saved = self.registry.save_exclusive(interrupt).await?;
    // Registration hands back a Processing record; the propagation itself
    // runs on a spawned task so a large tree never blocks the caller.
    let processing = self.registry.mark_processing(&saved.id).await?;

    let handler = self.clone();
    let spawned = processing.clone();
    tokio::spawn(async move {
      let result = match spawned.node_execution_id {
        Some(_) => handler.apply_to_node(spawned).await,
        None => handler.apply_to_plan(spawned).await,
      };
      if let Err(e) = result {
        // The propagator has already settled the record unsuccessfully.
        event!(Level::ERROR, error = %e, "Expire propagation failed.");
      }
    });
    Ok(processing)
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

/// Operator-forced expiry of a single node: like a single-node abort with an
/// expired outcome, gated on the finalizable statuses.
pub struct MarkExpiredHandler {
  registry: Arc<InterruptRegistry>,
  nodes: Arc<dyn NodeExecutionService>,
  executor: Arc<dyn InterruptExecutor>,
}

impl MarkExpiredHandler {
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
impl InterruptHandler for MarkExpiredHandler {
  #[instrument(name = "MarkExpiredHandler::register", skip_all, fields(interrupt_id = %interrupt.id), err(Display))]
  async fn register(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    let node_id = require_node_scope(&interrupt)?;
    let node = self.nodes.get(&node_id).await?;
    if !node.status.is_finalizable() {
      return Err(QuellError::invalid_state(format!(
        "node '{}' is {:?} and cannot be expired",
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
          .update_status_with_effect(&node_id, NodeStatus::Discontinuing, Some(effect), classify::FINALIZABLE)
          .await,
      )
      .await?;

    self
      .registry
      .settle_on_err(&interrupt.id, self.executor.expire(&node, &interrupt).await)
      .await?;
    self
      .registry
      .mark_processed(&interrupt.id, InterruptState::ProcessedSuccessfully)
      .await
  }
}
