// quell/src/core/classify.rs

//! Pure classifiers over node statuses and modes.
//!
//! These functions are the sole authority on which statuses a given
//! interrupt type may act from. Handlers and the tree propagator never
//! hard-code status sets; they ask here.

use crate::core::node::NodeStatus;

/// Statuses from which an abort-class interrupt may pull a leaf into
/// `Discontinuing`. Everything live except `Discontinuing` itself: a node
/// already discontinuing belongs to a prior interrupt.
pub const ABORT_ELIGIBLE: &[NodeStatus] = &[
  NodeStatus::Queued,
  NodeStatus::Running,
  NodeStatus::AsyncWaiting,
  NodeStatus::TaskWaiting,
  NodeStatus::InterventionWaiting,
  NodeStatus::ApprovalWaiting,
  NodeStatus::Pausing,
  NodeStatus::Paused,
];

/// Statuses from which an expire-class interrupt may act. Matches the
/// abort set: expiry is an abort with a different terminal outcome.
pub const EXPIRE_ELIGIBLE: &[NodeStatus] = ABORT_ELIGIBLE;

/// Statuses MARK_EXPIRED may finalize from: every live status not already
/// claimed by a discontinuation in flight, which is the abort set.
pub const FINALIZABLE: &[NodeStatus] = ABORT_ELIGIBLE;

/// Statuses a PAUSE_ALL may move to `Paused`.
pub const PAUSE_ELIGIBLE: &[NodeStatus] = &[NodeStatus::Queued, NodeStatus::Running];

impl NodeStatus {
  /// Terminal outcomes; no interrupt acts on a final node.
  pub fn is_final(&self) -> bool {
    matches!(
      self,
      NodeStatus::Succeeded
        | NodeStatus::Failed
        | NodeStatus::Errored
        | NodeStatus::Expired
        | NodeStatus::Aborted
        | NodeStatus::IgnoreFailed
    )
  }

  /// Statuses RETRY accepts: the node concluded, unfavourably.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      NodeStatus::Failed | NodeStatus::Errored | NodeStatus::Expired | NodeStatus::Aborted | NodeStatus::IgnoreFailed
    )
  }

  /// Statuses MARK_EXPIRED may finalize from: any live status not already
  /// claimed by a discontinuation in flight.
  pub fn is_finalizable(&self) -> bool {
    !self.is_final() && !matches!(self, NodeStatus::Discontinuing)
  }
}
