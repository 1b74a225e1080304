// quell/src/services/node_tree.rs

//! Seam to the external node-execution tree service.
//!
//! The tree is persisted records with parent pointers; it is never
//! materialized in memory here. All interrupt-relevant mutation goes through
//! the conditional-update operations below — the storage layer is required
//! to apply them as a compare-and-swap on the node's current status, which
//! is the only concurrency primitive this core relies on.

use crate::core::interrupt::InterruptEffect;
use crate::core::node::{NodeExecution, NodeExecutionId, NodeStatus};
use crate::core::plan::PlanExecutionId;
use crate::error::QuellResult;
use async_trait::async_trait;

#[async_trait]
pub trait NodeExecutionService: Send + Sync {
  /// Fetch one node. `QuellError::NotFound` when the id is unknown.
  async fn get(&self, node_id: &NodeExecutionId) -> QuellResult<NodeExecution>;

  /// Conditionally transition one node to `new_status`, appending `effect`
  /// to its interrupt history in the same atomic step.
  ///
  /// Fails `QuellError::TransitionFailed` unless the node's current status
  /// is in `allowed`. Two interrupts racing for the same node never both
  /// succeed here; exactly one observes the transition.
  async fn update_status_with_effect(
    &self,
    node_id: &NodeExecutionId,
    new_status: NodeStatus,
    effect: Option<InterruptEffect>,
    allowed: &[NodeStatus],
  ) -> QuellResult<NodeExecution>;

  /// All descendants of `root_id` (root excluded) whose status is in
  /// `statuses`; `leaf_only` restricts the result to leaf-mode nodes.
  async fn find_descendants_with_status_in(
    &self,
    plan_id: &PlanExecutionId,
    root_id: &NodeExecutionId,
    statuses: &[NodeStatus],
    leaf_only: bool,
  ) -> QuellResult<Vec<NodeExecution>>;

  /// Atomically move exactly the given leaves to `Discontinuing`, appending
  /// `effect` to each.
  ///
  /// Signed count contract: `-1` storage failure, `0` none eligible,
  /// `> 0` number transitioned.
  async fn mark_leaves_discontinuing(
    &self,
    plan_id: &PlanExecutionId,
    node_ids: &[NodeExecutionId],
    effect: InterruptEffect,
  ) -> QuellResult<i64>;

  /// Atomically move every leaf of the plan whose status is in `statuses`
  /// to `Discontinuing`, appending `effect` to each. Same signed count
  /// contract as [`mark_leaves_discontinuing`](Self::mark_leaves_discontinuing).
  async fn mark_all_leaves_discontinuing(
    &self,
    plan_id: &PlanExecutionId,
    statuses: &[NodeStatus],
    effect: InterruptEffect,
  ) -> QuellResult<i64>;

  /// Every node of the plan currently in `status`.
  async fn fetch_nodes_by_status(&self, plan_id: &PlanExecutionId, status: NodeStatus)
    -> QuellResult<Vec<NodeExecution>>;
}
