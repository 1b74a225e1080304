pub mod classify;
pub mod interrupt;
pub mod node;
pub mod plan;

// Re-export key types for easier access from other quell modules (and lib.rs)
pub use interrupt::{Interrupt, InterruptConfig, InterruptEffect, InterruptId, InterruptState, InterruptType};
pub use node::{NodeExecution, NodeExecutionId, NodeMode, NodeStatus};
pub use plan::{PlanExecution, PlanExecutionId, PlanStatus};
