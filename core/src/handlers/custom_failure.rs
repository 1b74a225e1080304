// quell/src/handlers/custom_failure.rs

//! CUSTOM_FAILURE: hand a failed node to an external failure-strategy
//! evaluator and settle on its decision.
//!
//! The correlation key is registered before the event goes out so a fast
//! decision can never race past an unregistered waiter.

use crate::completion::InterruptCompletionCallback;
use crate::core::interrupt::Interrupt;
use crate::error::QuellResult;
use crate::handlers::{require_node_scope, InterruptHandler};
use crate::registry::InterruptRegistry;
use crate::services::correlator::{CompletionCorrelator, CorrelationKey};
use crate::services::failure::{FailureStrategyChannel, FailureStrategyEvent};
use crate::services::node_tree::NodeExecutionService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{event, instrument, Level};

pub struct CustomFailureHandler {
  registry: Arc<InterruptRegistry>,
  nodes: Arc<dyn NodeExecutionService>,
  correlator: Arc<dyn CompletionCorrelator>,
  channel: Arc<dyn FailureStrategyChannel>,
}

impl CustomFailureHandler {
  pub fn new(
    registry: Arc<InterruptRegistry>,
    nodes: Arc<dyn NodeExecutionService>,
    correlator: Arc<dyn CompletionCorrelator>,
    channel: Arc<dyn FailureStrategyChannel>,
  ) -> Self {
    Self {
      registry,
      nodes,
      correlator,
      channel,
    }
  }
}

#[async_trait]
impl InterruptHandler for CustomFailureHandler {
  #[instrument(name = "CustomFailureHandler::register", skip_all, fields(interrupt_id = %interrupt.id), err(Display))]
  async fn register(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    require_node_scope(&interrupt)?;
    let saved = self.registry.save_exclusive(interrupt).await?;
    self.apply_to_node(saved).await
  }

  async fn apply_to_node(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    let node_id = require_node_scope(&interrupt)?;
    let processing = self.registry.mark_processing(&interrupt.id).await?;
    let node = self
      .registry
      .settle_on_err(&interrupt.id, self.nodes.get(&node_id).await)
      .await?;

    let key = CorrelationKey::new(node_id, interrupt.id.clone());
    let callback = Arc::new(InterruptCompletionCallback::new(
      Arc::clone(&self.registry),
      interrupt.id.clone(),
    ));
    self
      .registry
      .settle_on_err(&interrupt.id, self.correlator.wait_for_all(callback, vec![key]).await)
      .await?;

    let publish_result = self
      .channel
      .publish(FailureStrategyEvent {
        interrupt_id: interrupt.id.clone(),
        interrupt_type: interrupt.interrupt_type,
        node,
        metadata: interrupt.config.metadata.clone(),
      })
      .await;
    self.registry.settle_on_err(&interrupt.id, publish_result).await?;
    event!(Level::INFO, "Failure-strategy event published; awaiting decision.");
    // Stays Processing until the evaluator's decision resolves the key.
    Ok(processing)
  }
}
