// quell/src/registry.rs

//! The interrupt registry: domain wrapper over the persistence store.
//!
//! All interrupt state transitions funnel through here so they are logged
//! in one place and the terminal-state guard applies uniformly: marking an
//! already-terminal interrupt processed again is a no-op, which keeps
//! completion callbacks idempotent.

use crate::core::interrupt::{Interrupt, InterruptId, InterruptState};
use crate::core::node::NodeExecutionId;
use crate::core::plan::PlanExecutionId;
use crate::error::{QuellError, QuellResult};
use crate::services::store::InterruptStore;
use std::sync::Arc;
use tracing::{event, Level};

pub struct InterruptRegistry {
  store: Arc<dyn InterruptStore>,
}

impl InterruptRegistry {
  pub fn new(store: Arc<dyn InterruptStore>) -> Self {
    Self { store }
  }

  /// Persist a freshly-accepted interrupt. For exclusive types the store
  /// enforces at-most-one-active-per-scope atomically; a losing concurrent
  /// registration surfaces as `QuellError::Conflict`.
  pub async fn save_exclusive(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    event!(
      Level::DEBUG,
      interrupt_id = %interrupt.id,
      interrupt_type = %interrupt.interrupt_type,
      plan = %interrupt.plan_execution_id,
      "Persisting interrupt."
    );
    self.store.insert_exclusive(interrupt).await
  }

  pub async fn get(&self, id: &InterruptId) -> QuellResult<Interrupt> {
    self.store.get(id).await
  }

  pub async fn mark_processing(&self, id: &InterruptId) -> QuellResult<Interrupt> {
    event!(Level::DEBUG, interrupt_id = %id, "Interrupt processing.");
    self.store.mark_processing(id).await
  }

  /// Conclude an interrupt. No-op when the record is already terminal.
  pub async fn mark_processed(&self, id: &InterruptId, terminal: InterruptState) -> QuellResult<Interrupt> {
    if !terminal.is_terminal() {
      return Err(QuellError::Internal(format!(
        "mark_processed called with non-terminal state {:?}",
        terminal
      )));
    }
    event!(Level::INFO, interrupt_id = %id, state = ?terminal, "Interrupt settled.");
    self.store.mark_processed(id, terminal).await
  }

  /// Guard for every fallible step taken after an interrupt went
  /// `Processing`: on error, settle the interrupt `ProcessedUnsuccessfully`
  /// before the error propagates, so no failure path leaves the record
  /// active. A failure of the settling write itself is logged, and the
  /// original error still propagates.
  pub async fn settle_on_err<T>(&self, id: &InterruptId, result: QuellResult<T>) -> QuellResult<T> {
    match result {
      Ok(value) => Ok(value),
      Err(e) => {
        if let Err(settle_err) = self
          .mark_processed(id, InterruptState::ProcessedUnsuccessfully)
          .await
        {
          event!(Level::ERROR, interrupt_id = %id, error = %settle_err, "Failed to settle interrupt after error.");
        }
        Err(e)
      }
    }
  }

  /// Discard a superseded interrupt (e.g. a stale RESUME_ALL when a new
  /// PAUSE_ALL arrives).
  pub async fn discard(&self, id: &InterruptId) -> QuellResult<Interrupt> {
    event!(Level::INFO, interrupt_id = %id, "Interrupt discarded.");
    self.store.mark_processed(id, InterruptState::Discarded).await
  }

  pub async fn active_for_plan(&self, plan_id: &PlanExecutionId) -> QuellResult<Vec<Interrupt>> {
    self.store.active_for_plan(plan_id).await
  }

  pub async fn active_for_node(
    &self,
    plan_id: &PlanExecutionId,
    node_id: &NodeExecutionId,
  ) -> QuellResult<Vec<Interrupt>> {
    self.store.active_for_node(plan_id, node_id).await
  }

  pub async fn active_plan_level(&self, plan_id: &PlanExecutionId) -> QuellResult<Vec<Interrupt>> {
    self.store.active_plan_level(plan_id).await
  }
}
