pub mod correlator;
pub mod executor;
pub mod failure;
pub mod node_tree;
pub mod plan;
pub mod store;

pub use correlator::{CompletionCallback, CompletionCorrelator, CompletionOutcome, CorrelationKey};
pub use executor::InterruptExecutor;
pub use failure::{FailureStrategyChannel, FailureStrategyEvent};
pub use node_tree::NodeExecutionService;
pub use plan::PlanExecutionService;
pub use store::InterruptStore;
