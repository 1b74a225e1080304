// quell/src/handlers/mod.rs

//! Per-type interrupt handlers.
//!
//! Every variant implements the same three-operation contract; the trait's
//! default bodies fail fast with `UnsupportedOperation`, so a handler only
//! overrides the scopes its interrupt type supports.

pub mod abort;
pub mod custom_failure;
pub mod expire;
pub mod mark;
pub mod pause;
pub mod retry;

use crate::core::interrupt::Interrupt;
use crate::error::{QuellError, QuellResult};
use async_trait::async_trait;

pub use abort::{AbortAllHandler, AbortHandler};
pub use custom_failure::CustomFailureHandler;
pub use expire::{ExpireAllHandler, MarkExpiredHandler};
pub use mark::MarkStatusHandler;
pub use pause::{PauseAllHandler, ResumeAllHandler};
pub use retry::RetryHandler;

/// The shared contract of every interrupt type.
///
/// `register` validates the signal against active interrupts and the target
/// state, persists it, and drives the supported `apply_*` operation.
/// Validation failures surface before anything is persisted; failures after
/// the interrupt is `Processing` settle it `ProcessedUnsuccessfully` before
/// re-raising.
#[async_trait]
pub trait InterruptHandler: Send + Sync {
  async fn register(&self, interrupt: Interrupt) -> QuellResult<Interrupt>;

  async fn apply_to_plan(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    Err(QuellError::UnsupportedOperation {
      interrupt_type: interrupt.interrupt_type,
      operation: "plan scope",
    })
  }

  async fn apply_to_node(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    Err(QuellError::UnsupportedOperation {
      interrupt_type: interrupt.interrupt_type,
      operation: "node scope",
    })
  }
}

/// Node id required by every node-scoped handler; missing scope is a
/// caller programming error surfaced as `UnsupportedOperation`.
pub(crate) fn require_node_scope(interrupt: &Interrupt) -> QuellResult<crate::core::node::NodeExecutionId> {
  interrupt
    .node_execution_id
    .clone()
    .ok_or(QuellError::UnsupportedOperation {
      interrupt_type: interrupt.interrupt_type,
      operation: "plan scope",
    })
}
