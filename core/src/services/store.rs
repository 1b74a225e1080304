// quell/src/services/store.rs

//! Persistence seam for interrupt records.
//!
//! Exclusivity lives here, not in the handlers: `insert_exclusive` is an
//! atomic check-and-insert, so two concurrent registrations of the same
//! exclusive type cannot both pass on the strength of an earlier read.
//! Handler-side conflict queries remain for the cross-type rules (e.g.
//! EXPIRE_ALL refusing to start under an active ABORT_ALL).

use crate::core::interrupt::{Interrupt, InterruptId, InterruptState};
use crate::core::node::NodeExecutionId;
use crate::core::plan::PlanExecutionId;
use crate::error::QuellResult;
use async_trait::async_trait;

#[async_trait]
pub trait InterruptStore: Send + Sync {
  /// Persist a new interrupt.
  ///
  /// For an exclusive type this must fail `QuellError::Conflict` when an
  /// active interrupt of the same type and same scope already exists, as a
  /// single atomic operation (a uniqueness constraint, not a read followed
  /// by a write).
  async fn insert_exclusive(&self, interrupt: Interrupt) -> QuellResult<Interrupt>;

  async fn get(&self, id: &InterruptId) -> QuellResult<Interrupt>;

  /// `Registered → Processing`.
  async fn mark_processing(&self, id: &InterruptId) -> QuellResult<Interrupt>;

  /// Transition to a terminal state. Must be a no-op returning the stored
  /// record when the interrupt is already terminal.
  async fn mark_processed(&self, id: &InterruptId, terminal: InterruptState) -> QuellResult<Interrupt>;

  /// Active (registered or processing) interrupts for a plan, any scope.
  async fn active_for_plan(&self, plan_id: &PlanExecutionId) -> QuellResult<Vec<Interrupt>>;

  /// Active interrupts targeting one node of a plan.
  async fn active_for_node(&self, plan_id: &PlanExecutionId, node_id: &NodeExecutionId)
    -> QuellResult<Vec<Interrupt>>;

  /// Active interrupts with whole-plan scope only.
  async fn active_plan_level(&self, plan_id: &PlanExecutionId) -> QuellResult<Vec<Interrupt>>;
}
