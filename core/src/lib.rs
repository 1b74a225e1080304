// src/lib.rs

//! Quell: the interrupt-propagation core of a hierarchical pipeline
//! orchestration engine.
//!
//! A running pipeline is a persisted tree of execution nodes. Operators and
//! policies issue control-plane signals (abort, expire, pause, resume,
//! retry, manual conclusions, custom failure strategies) against a run;
//! quell validates each signal against the active interrupts, persists it,
//! atomically pulls the affected leaves into a discontinuing state, asks
//! the external executor for the actual side effect, and settles the
//! interrupt once every affected node reports back — possibly from another
//! process, through the completion correlator.
//!
//! The crate is an embedded library: persistence of the tree, the runtime
//! that executes step logic, and the durable wait/notify channel are all
//! behind the traits in [`services`].

pub mod completion;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod propagation;
pub mod registry;
pub mod services;

// --- Re-exports for the Public API ---

// Domain records callers construct and inspect.
pub use crate::core::interrupt::{Interrupt, InterruptConfig, InterruptEffect, InterruptId, InterruptState, InterruptType};
pub use crate::core::node::{NodeExecution, NodeExecutionId, NodeMode, NodeStatus};
pub use crate::core::plan::{PlanExecution, PlanExecutionId, PlanStatus};

// The dispatcher facade and the pieces it wires.
pub use crate::dispatch::Quell;
pub use crate::handlers::InterruptHandler;
pub use crate::propagation::{DiscontinueAction, TreePropagator};
pub use crate::registry::InterruptRegistry;

// Service seams implemented by the surrounding system.
pub use crate::services::correlator::{CompletionCallback, CompletionCorrelator, CompletionOutcome, CorrelationKey};
pub use crate::services::executor::InterruptExecutor;
pub use crate::services::failure::{FailureStrategyChannel, FailureStrategyEvent};
pub use crate::services::node_tree::NodeExecutionService;
pub use crate::services::plan::PlanExecutionService;
pub use crate::services::store::InterruptStore;

pub use crate::error::{QuellError, QuellResult};
