// quell/src/handlers/retry.rs

//! RETRY: re-execute a single concluded leaf, optionally with overridden
//! parameters, and force the plan back to running.

use crate::core::interrupt::{Interrupt, InterruptState};
use crate::core::plan::PlanStatus;
use crate::error::{QuellError, QuellResult};
use crate::handlers::{require_node_scope, InterruptHandler};
use crate::registry::InterruptRegistry;
use crate::services::executor::InterruptExecutor;
use crate::services::node_tree::NodeExecutionService;
use crate::services::plan::PlanExecutionService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{event, instrument, Level};

pub struct RetryHandler {
  registry: Arc<InterruptRegistry>,
  nodes: Arc<dyn NodeExecutionService>,
  plans: Arc<dyn PlanExecutionService>,
  executor: Arc<dyn InterruptExecutor>,
}

impl RetryHandler {
  pub fn new(
    registry: Arc<InterruptRegistry>,
    nodes: Arc<dyn NodeExecutionService>,
    plans: Arc<dyn PlanExecutionService>,
    executor: Arc<dyn InterruptExecutor>,
  ) -> Self {
    Self {
      registry,
      nodes,
      plans,
      executor,
    }
  }
}

#[async_trait]
impl InterruptHandler for RetryHandler {
  #[instrument(name = "RetryHandler::register", skip_all, fields(interrupt_id = %interrupt.id), err(Display))]
  async fn register(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    let node_id = require_node_scope(&interrupt)?;
    let node = self.nodes.get(&node_id).await?;
    if !node.mode.is_leaf() {
      return Err(QuellError::invalid_state("retry is supported only for leaf nodes"));
    }
    if !node.status.is_retryable() {
      return Err(QuellError::invalid_state(format!(
        "node '{}' is {:?}, not a retryable status",
        node_id, node.status
      )));
    }
    let saved = self.registry.save_exclusive(interrupt).await?;
    self.apply_to_node(saved).await
  }

  async fn apply_to_node(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    let node_id = require_node_scope(&interrupt)?;
    self.registry.mark_processing(&interrupt.id).await?;

    self
      .registry
      .settle_on_err(
        &interrupt.id,
        self
          .executor
          .retry(
            &node_id,
            interrupt.config.override_parameters.clone(),
            &interrupt.id,
            &interrupt.config,
          )
          .await,
      )
      .await?;
    event!(Level::INFO, node = %node_id, "Node re-dispatched for retry.");

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
