// quell/src/services/plan.rs

//! Seam to the external plan-execution tracker.

use crate::core::plan::{PlanExecution, PlanExecutionId, PlanStatus};
use crate::error::QuellResult;
use async_trait::async_trait;

#[async_trait]
pub trait PlanExecutionService: Send + Sync {
  /// Fetch the root record of one run. `QuellError::NotFound` on miss.
  async fn get(&self, plan_id: &PlanExecutionId) -> QuellResult<PlanExecution>;

  /// Force the plan's aggregate status.
  async fn update_status(&self, plan_id: &PlanExecutionId, new_status: PlanStatus) -> QuellResult<PlanExecution>;
}
