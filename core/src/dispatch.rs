// quell/src/dispatch.rs

//! The `Quell` facade: one handler per interrupt type, selected through a
//! lookup table, with `register` as the single control-plane entry point.

use crate::core::interrupt::{Interrupt, InterruptType};
use crate::core::node::NodeStatus;
use crate::error::{QuellError, QuellResult};
use crate::handlers::{
  AbortAllHandler, AbortHandler, CustomFailureHandler, ExpireAllHandler, InterruptHandler, MarkExpiredHandler,
  MarkStatusHandler, PauseAllHandler, ResumeAllHandler, RetryHandler,
};
use crate::propagation::TreePropagator;
use crate::registry::InterruptRegistry;
use crate::services::correlator::CompletionCorrelator;
use crate::services::executor::InterruptExecutor;
use crate::services::failure::FailureStrategyChannel;
use crate::services::node_tree::NodeExecutionService;
use crate::services::plan::PlanExecutionService;
use crate::services::store::InterruptStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Wires the registry, tree propagator, and the per-type handler variants
/// over the external service seams.
pub struct Quell {
  registry: Arc<InterruptRegistry>,
  handlers: HashMap<InterruptType, Arc<dyn InterruptHandler>>,
}

impl Quell {
  pub fn new(
    store: Arc<dyn InterruptStore>,
    nodes: Arc<dyn NodeExecutionService>,
    plans: Arc<dyn PlanExecutionService>,
    executor: Arc<dyn InterruptExecutor>,
    correlator: Arc<dyn CompletionCorrelator>,
    failure_channel: Arc<dyn FailureStrategyChannel>,
  ) -> Self {
    let registry = Arc::new(InterruptRegistry::new(store));
    let propagator = Arc::new(TreePropagator::new(
      Arc::clone(&registry),
      Arc::clone(&nodes),
      Arc::clone(&correlator),
    ));

    let mut handlers: HashMap<InterruptType, Arc<dyn InterruptHandler>> = HashMap::new();
    handlers.insert(
      InterruptType::Abort,
      Arc::new(AbortHandler::new(
        Arc::clone(&registry),
        Arc::clone(&nodes),
        Arc::clone(&executor),
      )),
    );
    handlers.insert(
      InterruptType::AbortAll,
      Arc::new(AbortAllHandler::new(
        Arc::clone(&registry),
        Arc::clone(&propagator),
        Arc::clone(&executor),
      )),
    );
    handlers.insert(
      InterruptType::ExpireAll,
      Arc::new(ExpireAllHandler::new(
        Arc::clone(&registry),
        Arc::clone(&plans),
        Arc::clone(&propagator),
        Arc::clone(&executor),
      )),
    );
    handlers.insert(
      InterruptType::PauseAll,
      Arc::new(PauseAllHandler::new(
        Arc::clone(&registry),
        Arc::clone(&nodes),
        Arc::clone(&plans),
        Arc::clone(&correlator),
      )),
    );
    handlers.insert(
      InterruptType::ResumeAll,
      Arc::new(ResumeAllHandler::new(
        Arc::clone(&registry),
        Arc::clone(&nodes),
        Arc::clone(&plans),
        Arc::clone(&correlator),
      )),
    );
    handlers.insert(
      InterruptType::Retry,
      Arc::new(RetryHandler::new(
        Arc::clone(&registry),
        Arc::clone(&nodes),
        Arc::clone(&plans),
        Arc::clone(&executor),
      )),
    );
    handlers.insert(
      InterruptType::MarkExpired,
      Arc::new(MarkExpiredHandler::new(
        Arc::clone(&registry),
        Arc::clone(&nodes),
        Arc::clone(&executor),
      )),
    );
    for (interrupt_type, concluding) in [
      (InterruptType::MarkSuccess, NodeStatus::Succeeded),
      (InterruptType::MarkFailed, NodeStatus::Failed),
      (InterruptType::IgnoreFailed, NodeStatus::IgnoreFailed),
    ] {
      handlers.insert(
        interrupt_type,
        Arc::new(MarkStatusHandler::new(
          Arc::clone(&registry),
          Arc::clone(&nodes),
          Arc::clone(&plans),
          concluding,
        )),
      );
    }
    handlers.insert(
      InterruptType::CustomFailure,
      Arc::new(CustomFailureHandler::new(
        Arc::clone(&registry),
        Arc::clone(&nodes),
        Arc::clone(&correlator),
        failure_channel,
      )),
    );

    Self { registry, handlers }
  }

  /// Accept one control-plane signal. Returns the persisted interrupt
  /// (usually `Processing` or already terminal) or a typed validation
  /// error; nothing is persisted when validation fails.
  #[instrument(
    name = "Quell::register",
    skip_all,
    fields(
      interrupt_type = %interrupt.interrupt_type,
      plan = %interrupt.plan_execution_id,
      node = interrupt.node_execution_id.as_ref().map(|n| n.to_string()),
    ),
    err(Display)
  )]
  pub async fn register(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    if interrupt.interrupt_type.node_scoped_only() && interrupt.node_execution_id.is_none() {
      return Err(QuellError::UnsupportedOperation {
        interrupt_type: interrupt.interrupt_type,
        operation: "plan scope",
      });
    }
    event!(Level::DEBUG, "Dispatching interrupt to its handler.");
    self.handler_for(interrupt.interrupt_type)?.register(interrupt).await
  }

  /// The registry backing this dispatcher, for callers that need the
  /// active-interrupt queries.
  pub fn registry(&self) -> &Arc<InterruptRegistry> {
    &self.registry
  }

  pub(crate) fn handler_for(&self, interrupt_type: InterruptType) -> QuellResult<&Arc<dyn InterruptHandler>> {
    self
      .handlers
      .get(&interrupt_type)
      .ok_or_else(|| QuellError::Internal(format!("no handler wired for {:?}", interrupt_type)))
  }
}
