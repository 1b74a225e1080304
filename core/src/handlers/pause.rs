// quell/src/handlers/pause.rs

//! PAUSE_ALL and RESUME_ALL.
//!
//! A PAUSE_ALL never settles on its own: it stays `Processing` until the
//! matching RESUME_ALL finalizes it. Node-scoped pauses additionally hold a
//! correlation key that the resume resolves, releasing anything waiting on
//! the paused node.

use crate::completion::InterruptCompletionCallback;
use crate::core::classify;
use crate::core::interrupt::{Interrupt, InterruptEffect, InterruptState, InterruptType};
use crate::core::node::NodeStatus;
use crate::core::plan::PlanStatus;
use crate::error::{QuellError, QuellResult};
use crate::handlers::{require_node_scope, InterruptHandler};
use crate::registry::InterruptRegistry;
use crate::services::correlator::{CompletionCorrelator, CompletionOutcome, CorrelationKey};
use crate::services::node_tree::NodeExecutionService;
use crate::services::plan::PlanExecutionService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{event, instrument, Level};

pub struct PauseAllHandler {
  registry: Arc<InterruptRegistry>,
  nodes: Arc<dyn NodeExecutionService>,
  plans: Arc<dyn PlanExecutionService>,
  correlator: Arc<dyn CompletionCorrelator>,
}

impl PauseAllHandler {
  pub fn new(
    registry: Arc<InterruptRegistry>,
    nodes: Arc<dyn NodeExecutionService>,
    plans: Arc<dyn PlanExecutionService>,
    correlator: Arc<dyn CompletionCorrelator>,
  ) -> Self {
    Self {
      registry,
      nodes,
      plans,
      correlator,
    }
  }
}

#[async_trait]
impl InterruptHandler for PauseAllHandler {
  #[instrument(name = "PauseAllHandler::register", skip_all, fields(interrupt_id = %interrupt.id), err(Display))]
  async fn register(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    let active = self.registry.active_for_plan(&interrupt.plan_execution_id).await?;
    if active
      .iter()
      .any(|i| i.interrupt_type == InterruptType::PauseAll && i.same_scope(&interrupt))
    {
      return Err(QuellError::conflict(format!(
        "a PAUSE_ALL is already active for plan '{}'",
        interrupt.plan_execution_id
      )));
    }
    // A fresh pause subsumes any resume still in flight.
    for stale in active
      .iter()
      .filter(|i| i.interrupt_type == InterruptType::ResumeAll && i.same_scope(&interrupt))
    {
      event!(Level::INFO, superseded = %stale.id, "PAUSE_ALL supersedes active RESUME_ALL.");
      self.registry.discard(&stale.id).await?;
    }

    let saved = self.registry.save_exclusive(interrupt).await?;
    match saved.node_execution_id {
      Some(_) => self.apply_to_node(saved).await,
      None => self.apply_to_plan(saved).await,
    }
  }

  async fn apply_to_plan(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    let processing = self.registry.mark_processing(&interrupt.id).await?;
    self
      .registry
      .settle_on_err(
        &interrupt.id,
        self.plans.update_status(&interrupt.plan_execution_id, PlanStatus::Pausing).await,
      )
      .await?;
    event!(Level::INFO, plan = %interrupt.plan_execution_id, "Plan pausing; awaiting RESUME_ALL.");
    // Stays Processing until a RESUME_ALL finalizes it.
    Ok(processing)
  }

  async fn apply_to_node(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    let node_id = require_node_scope(&interrupt)?;
    let processing = self.registry.mark_processing(&interrupt.id).await?;

    let effect = InterruptEffect::of(&interrupt);
    self
      .registry
      .settle_on_err(
        &interrupt.id,
        self
          .nodes
          .update_status_with_effect(&node_id, NodeStatus::Paused, Some(effect), classify::PAUSE_ELIGIBLE)
          .await,
      )
      .await?;

    // The key resolves when the eventual RESUME_ALL releases the node.
    let key = CorrelationKey::new(node_id, interrupt.id.clone());
    let callback = Arc::new(InterruptCompletionCallback::new(
      Arc::clone(&self.registry),
      interrupt.id.clone(),
    ));
    self
      .registry
      .settle_on_err(&interrupt.id, self.correlator.wait_for_all(callback, vec![key]).await)
      .await?;
    Ok(processing)
  }
}

pub struct ResumeAllHandler {
  registry: Arc<InterruptRegistry>,
  nodes: Arc<dyn NodeExecutionService>,
  plans: Arc<dyn PlanExecutionService>,
  correlator: Arc<dyn CompletionCorrelator>,
}

impl ResumeAllHandler {
  pub fn new(
    registry: Arc<InterruptRegistry>,
    nodes: Arc<dyn NodeExecutionService>,
    plans: Arc<dyn PlanExecutionService>,
    correlator: Arc<dyn CompletionCorrelator>,
  ) -> Self {
    Self {
      registry,
      nodes,
      plans,
      correlator,
    }
  }
}

#[async_trait]
impl InterruptHandler for ResumeAllHandler {
  #[instrument(name = "ResumeAllHandler::register", skip_all, fields(interrupt_id = %interrupt.id), err(Display))]
  async fn register(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    let active = self.registry.active_for_plan(&interrupt.plan_execution_id).await?;
    if !active.iter().any(|i| i.interrupt_type == InterruptType::PauseAll) {
      return Err(QuellError::invalid_state(format!(
        "no active PAUSE_ALL for plan '{}'; nothing to resume",
        interrupt.plan_execution_id
      )));
    }
    let saved = self.registry.save_exclusive(interrupt).await?;
    self.apply_to_plan(saved).await
  }

  async fn apply_to_plan(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    self.registry.mark_processing(&interrupt.id).await?;

    let pauses: Vec<Interrupt> = self
      .registry
      .settle_on_err(&interrupt.id, self.registry.active_for_plan(&interrupt.plan_execution_id).await)
      .await?
      .into_iter()
      .filter(|i| i.interrupt_type == InterruptType::PauseAll)
      .collect();

    let paused = self
      .registry
      .settle_on_err(
        &interrupt.id,
        self.nodes.fetch_nodes_by_status(&interrupt.plan_execution_id, NodeStatus::Paused).await,
      )
      .await?;
    for node in &paused {
      let effect = InterruptEffect::of(&interrupt);
      self
        .registry
        .settle_on_err(
          &interrupt.id,
          self
            .nodes
            .update_status_with_effect(&node.id, NodeStatus::Queued, Some(effect), &[NodeStatus::Paused])
            .await,
        )
        .await?;
      // Release any node-scoped pause waiting on this node.
      for pause in &pauses {
        let key = CorrelationKey::new(node.id.clone(), pause.id.clone());
        self
          .registry
          .settle_on_err(
            &interrupt.id,
            self.correlator.resolve(&key, CompletionOutcome::Settled(NodeStatus::Queued)).await,
          )
          .await?;
      }
    }
    event!(Level::INFO, resumed = paused.len(), "Paused nodes requeued.");

    self
      .registry
      .settle_on_err(
        &interrupt.id,
        self.plans.update_status(&interrupt.plan_execution_id, PlanStatus::Running).await,
      )
      .await?;

    // Finalize the pause interrupts this resume releases, only once the
    // plan is back running: a resume that failed earlier leaves its pauses
    // active, so a later resume still has something to act on. Node-scoped
    // pauses may already have settled through their correlation key; the
    // registry guard makes the second write a no-op.
    for pause in &pauses {
      self
        .registry
        .settle_on_err(
          &interrupt.id,
          self.registry.mark_processed(&pause.id, InterruptState::ProcessedSuccessfully).await,
        )
        .await?;
    }

    self
      .registry
      .mark_processed(&interrupt.id, InterruptState::ProcessedSuccessfully)
      .await
  }
}
