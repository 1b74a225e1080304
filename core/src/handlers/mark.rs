// quell/src/handlers/mark.rs

//! Manual-intervention conclusions: MARK_SUCCESS, MARK_FAILED and
//! IGNORE_FAILED share one handler parameterized by the concluding status.
//!
//! All three act on a node parked in `InterventionWaiting`, force the
//! chosen conclusion through a conditional update, and kick the plan back
//! to running so the engine re-evaluates the tree.

use crate::core::interrupt::{Interrupt, InterruptEffect, InterruptState};
use crate::core::node::NodeStatus;
use crate::core::plan::PlanStatus;
use crate::error::{QuellError, QuellResult};
use crate::handlers::{require_node_scope, InterruptHandler};
use crate::registry::InterruptRegistry;
use crate::services::node_tree::NodeExecutionService;
use crate::services::plan::PlanExecutionService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{event, instrument, Level};

pub struct MarkStatusHandler {
  registry: Arc<InterruptRegistry>,
  nodes: Arc<dyn NodeExecutionService>,
  plans: Arc<dyn PlanExecutionService>,
  concluding_status: NodeStatus,
}

impl MarkStatusHandler {
  /// One instance per manual-conclusion type. The dispatcher maps
  /// MARK_SUCCESS → `Succeeded`, MARK_FAILED → `Failed`,
  /// IGNORE_FAILED → `IgnoreFailed`.
  pub fn new(
    registry: Arc<InterruptRegistry>,
    nodes: Arc<dyn NodeExecutionService>,
    plans: Arc<dyn PlanExecutionService>,
    concluding_status: NodeStatus,
  ) -> Self {
    Self {
      registry,
      nodes,
      plans,
      concluding_status,
    }
  }
}

#[async_trait]
impl InterruptHandler for MarkStatusHandler {
  #[instrument(
    name = "MarkStatusHandler::register",
    skip_all,
    fields(interrupt_id = %interrupt.id, conclude = ?self.concluding_status),
    err(Display)
  )]
  async fn register(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    let node_id = require_node_scope(&interrupt)?;
    let node = self.nodes.get(&node_id).await?;
    if node.status != NodeStatus::InterventionWaiting {
      return Err(QuellError::invalid_state(format!(
        "node '{}' is {:?}; manual conclusion requires InterventionWaiting",
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
    self
      .registry
      .settle_on_err(
        &interrupt.id,
        self
          .nodes
          .update_status_with_effect(
            &node_id,
            self.concluding_status,
            Some(effect),
            &[NodeStatus::InterventionWaiting],
          )
          .await,
      )
      .await?;
    event!(Level::INFO, node = %node_id, status = ?self.concluding_status, "Node concluded by intervention.");

    self
      .registry
      .settle_on_err(
        &interrupt.id,
        self.plans.update_status(&interrupt.plan_execution_id, PlanStatus::Running).await,
      )
      .await?;
    self
      .registry
      .mark_processed(&interrupt.id, InterruptState::ProcessedSuccessfully)
      .await
  }
}
