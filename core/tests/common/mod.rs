// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use parking_lot::Mutex;
use quell::{
  CompletionCallback, CompletionCorrelator, CompletionOutcome, CorrelationKey, FailureStrategyChannel,
  FailureStrategyEvent, Interrupt, InterruptConfig, InterruptEffect, InterruptExecutor, InterruptId, InterruptState,
  InterruptStore, NodeExecution, NodeExecutionId, NodeExecutionService, NodeMode, NodeStatus, PlanExecution,
  PlanExecutionId, PlanExecutionService, PlanStatus, QuellError, QuellResult, Quell,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Level;

// --- Tracing setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- In-memory interrupt store ---
//
// One mutex around the whole map makes insert_exclusive the atomic
// check-and-insert the trait requires.

#[derive(Default)]
pub struct MemoryInterruptStore {
  inner: Mutex<HashMap<InterruptId, Interrupt>>,
}

impl MemoryInterruptStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn all(&self) -> Vec<Interrupt> {
    self.inner.lock().values().cloned().collect()
  }
}

#[async_trait]
impl InterruptStore for MemoryInterruptStore {
  async fn insert_exclusive(&self, interrupt: Interrupt) -> QuellResult<Interrupt> {
    let mut inner = self.inner.lock();
    if interrupt.interrupt_type.is_exclusive() {
      let clash = inner.values().any(|existing| {
        existing.state.is_active()
          && existing.interrupt_type == interrupt.interrupt_type
          && existing.same_scope(&interrupt)
      });
      if clash {
        return Err(QuellError::Conflict {
          message: format!(
            "{} already active for plan '{}'",
            interrupt.interrupt_type, interrupt.plan_execution_id
          ),
        });
      }
    }
    inner.insert(interrupt.id.clone(), interrupt.clone());
    Ok(interrupt)
  }

  async fn get(&self, id: &InterruptId) -> QuellResult<Interrupt> {
    self.inner.lock().get(id).cloned().ok_or(QuellError::NotFound {
      entity: "interrupt",
      id: id.to_string(),
    })
  }

  async fn mark_processing(&self, id: &InterruptId) -> QuellResult<Interrupt> {
    let mut inner = self.inner.lock();
    let interrupt = inner.get_mut(id).ok_or(QuellError::NotFound {
      entity: "interrupt",
      id: id.to_string(),
    })?;
    if interrupt.state.is_terminal() {
      return Err(QuellError::TransitionFailed {
        entity: "interrupt",
        id: id.to_string(),
        detail: format!("already terminal in {:?}", interrupt.state),
      });
    }
    interrupt.state = InterruptState::Processing;
    Ok(interrupt.clone())
  }

  async fn mark_processed(&self, id: &InterruptId, terminal: InterruptState) -> QuellResult<Interrupt> {
    let mut inner = self.inner.lock();
    let interrupt = inner.get_mut(id).ok_or(QuellError::NotFound {
      entity: "interrupt",
      id: id.to_string(),
    })?;
    if interrupt.state.is_terminal() {
      // Idempotent finalization.
      return Ok(interrupt.clone());
    }
    interrupt.state = terminal;
    interrupt.settled_at = Some(chrono::Utc::now());
    Ok(interrupt.clone())
  }

  async fn active_for_plan(&self, plan_id: &PlanExecutionId) -> QuellResult<Vec<Interrupt>> {
    Ok(
      self
        .inner
        .lock()
        .values()
        .filter(|i| i.state.is_active() && &i.plan_execution_id == plan_id)
        .cloned()
        .collect(),
    )
  }

  async fn active_for_node(
    &self,
    plan_id: &PlanExecutionId,
    node_id: &NodeExecutionId,
  ) -> QuellResult<Vec<Interrupt>> {
    Ok(
      self
        .inner
        .lock()
        .values()
        .filter(|i| {
          i.state.is_active() && &i.plan_execution_id == plan_id && i.node_execution_id.as_ref() == Some(node_id)
        })
        .cloned()
        .collect(),
    )
  }

  async fn active_plan_level(&self, plan_id: &PlanExecutionId) -> QuellResult<Vec<Interrupt>> {
    Ok(
      self
        .inner
        .lock()
        .values()
        .filter(|i| i.state.is_active() && &i.plan_execution_id == plan_id && i.node_execution_id.is_none())
        .cloned()
        .collect(),
    )
  }
}

// --- In-memory node-execution tree ---

#[derive(Default)]
pub struct MemoryNodeService {
  inner: Mutex<HashMap<NodeExecutionId, NodeExecution>>,
  fail_bulk: AtomicBool,
}

impl MemoryNodeService {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&self, node: NodeExecution) -> NodeExecutionId {
    let id = node.id.clone();
    self.inner.lock().insert(id.clone(), node);
    id
  }

  /// Make the next bulk discontinue report a storage failure (`-1`).
  pub fn fail_next_bulk(&self) {
    self.fail_bulk.store(true, Ordering::SeqCst);
  }

  pub fn snapshot(&self, id: &NodeExecutionId) -> NodeExecution {
    self.inner.lock().get(id).cloned().expect("node exists")
  }

  fn is_descendant(nodes: &HashMap<NodeExecutionId, NodeExecution>, node: &NodeExecution, root: &NodeExecutionId) -> bool {
    let mut cursor = node.parent_id.clone();
    while let Some(parent) = cursor {
      if &parent == root {
        return true;
      }
      cursor = nodes.get(&parent).and_then(|n| n.parent_id.clone());
    }
    false
  }
}

#[async_trait]
impl NodeExecutionService for MemoryNodeService {
  async fn get(&self, node_id: &NodeExecutionId) -> QuellResult<NodeExecution> {
    self.inner.lock().get(node_id).cloned().ok_or(QuellError::NotFound {
      entity: "node execution",
      id: node_id.to_string(),
    })
  }

  async fn update_status_with_effect(
    &self,
    node_id: &NodeExecutionId,
    new_status: NodeStatus,
    effect: Option<InterruptEffect>,
    allowed: &[NodeStatus],
  ) -> QuellResult<NodeExecution> {
    let mut inner = self.inner.lock();
    let node = inner.get_mut(node_id).ok_or(QuellError::NotFound {
      entity: "node execution",
      id: node_id.to_string(),
    })?;
    if !allowed.contains(&node.status) {
      return Err(QuellError::TransitionFailed {
        entity: "node execution",
        id: node_id.to_string(),
        detail: format!("current status {:?} not in allowed set", node.status),
      });
    }
    node.status = new_status;
    if let Some(effect) = effect {
      node.interrupt_histories.push(effect);
    }
    Ok(node.clone())
  }

  async fn find_descendants_with_status_in(
    &self,
    plan_id: &PlanExecutionId,
    root_id: &NodeExecutionId,
    statuses: &[NodeStatus],
    leaf_only: bool,
  ) -> QuellResult<Vec<NodeExecution>> {
    let inner = self.inner.lock();
    Ok(
      inner
        .values()
        .filter(|n| {
          &n.plan_execution_id == plan_id
            && statuses.contains(&n.status)
            && (!leaf_only || n.mode.is_leaf())
            && Self::is_descendant(&inner, n, root_id)
        })
        .cloned()
        .collect(),
    )
  }

  async fn mark_leaves_discontinuing(
    &self,
    plan_id: &PlanExecutionId,
    node_ids: &[NodeExecutionId],
    effect: InterruptEffect,
  ) -> QuellResult<i64> {
    if self.fail_bulk.swap(false, Ordering::SeqCst) {
      return Ok(-1);
    }
    let mut inner = self.inner.lock();
    let mut count = 0i64;
    for id in node_ids {
      if let Some(node) = inner.get_mut(id) {
        let eligible = &node.plan_execution_id == plan_id
          && node.mode.is_leaf()
          && !node.status.is_final()
          && node.status != NodeStatus::Discontinuing;
        if eligible {
          node.status = NodeStatus::Discontinuing;
          node.interrupt_histories.push(effect.clone());
          count += 1;
        }
      }
    }
    Ok(count)
  }

  async fn mark_all_leaves_discontinuing(
    &self,
    plan_id: &PlanExecutionId,
    statuses: &[NodeStatus],
    effect: InterruptEffect,
  ) -> QuellResult<i64> {
    if self.fail_bulk.swap(false, Ordering::SeqCst) {
      return Ok(-1);
    }
    let mut inner = self.inner.lock();
    let mut count = 0i64;
    for node in inner.values_mut() {
      if &node.plan_execution_id == plan_id && node.mode.is_leaf() && statuses.contains(&node.status) {
        node.status = NodeStatus::Discontinuing;
        node.interrupt_histories.push(effect.clone());
        count += 1;
      }
    }
    Ok(count)
  }

  async fn fetch_nodes_by_status(
    &self,
    plan_id: &PlanExecutionId,
    status: NodeStatus,
  ) -> QuellResult<Vec<NodeExecution>> {
    Ok(
      self
        .inner
        .lock()
        .values()
        .filter(|n| &n.plan_execution_id == plan_id && n.status == status)
        .cloned()
        .collect(),
    )
  }
}

// --- In-memory plan tracker ---

#[derive(Default)]
pub struct MemoryPlanService {
  inner: Mutex<HashMap<PlanExecutionId, PlanExecution>>,
  fail_update: AtomicBool,
}

impl MemoryPlanService {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fail_next_update(&self) {
    self.fail_update.store(true, Ordering::SeqCst);
  }

  pub fn insert(&self, plan: PlanExecution) -> PlanExecutionId {
    let id = plan.id.clone();
    self.inner.lock().insert(id.clone(), plan);
    id
  }

  pub fn status_of(&self, plan_id: &PlanExecutionId) -> PlanStatus {
    self.inner.lock().get(plan_id).expect("plan exists").status
  }

  pub fn set_status(&self, plan_id: &PlanExecutionId, status: PlanStatus) {
    if let Some(plan) = self.inner.lock().get_mut(plan_id) {
      plan.status = status;
    }
  }
}

#[async_trait]
impl PlanExecutionService for MemoryPlanService {
  async fn get(&self, plan_id: &PlanExecutionId) -> QuellResult<PlanExecution> {
    self.inner.lock().get(plan_id).cloned().ok_or(QuellError::NotFound {
      entity: "plan execution",
      id: plan_id.to_string(),
    })
  }

  async fn update_status(&self, plan_id: &PlanExecutionId, new_status: PlanStatus) -> QuellResult<PlanExecution> {
    if self.fail_update.swap(false, Ordering::SeqCst) {
      return Err(QuellError::Storage {
        source: anyhow::anyhow!("plan tracker unavailable"),
      });
    }
    let mut inner = self.inner.lock();
    let plan = inner.get_mut(plan_id).ok_or(QuellError::NotFound {
      entity: "plan execution",
      id: plan_id.to_string(),
    })?;
    plan.status = new_status;
    Ok(plan.clone())
  }
}

// --- Recording executor ---

#[derive(Default)]
pub struct RecordingExecutor {
  pub stop_calls: Mutex<Vec<NodeExecutionId>>,
  pub expire_calls: Mutex<Vec<NodeExecutionId>>,
  pub retry_calls: Mutex<Vec<NodeExecutionId>>,
  fail_stop: AtomicBool,
}

impl RecordingExecutor {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fail_next_stop(&self) {
    self.fail_stop.store(true, Ordering::SeqCst);
  }

  pub fn stopped(&self) -> Vec<NodeExecutionId> {
    self.stop_calls.lock().clone()
  }

  pub fn expired(&self) -> Vec<NodeExecutionId> {
    self.expire_calls.lock().clone()
  }

  pub fn retried(&self) -> Vec<NodeExecutionId> {
    self.retry_calls.lock().clone()
  }
}

#[async_trait]
impl InterruptExecutor for RecordingExecutor {
  async fn stop(&self, node: &NodeExecution, _interrupt: &Interrupt) -> QuellResult<()> {
    if self.fail_stop.swap(false, Ordering::SeqCst) {
      return Err(QuellError::Executor {
        source: anyhow::anyhow!("stop refused for node {}", node.id),
      });
    }
    self.stop_calls.lock().push(node.id.clone());
    Ok(())
  }

  async fn expire(&self, node: &NodeExecution, _interrupt: &Interrupt) -> QuellResult<()> {
    self.expire_calls.lock().push(node.id.clone());
    Ok(())
  }

  async fn retry(
    &self,
    node_id: &NodeExecutionId,
    _override_parameters: Option<serde_json::Value>,
    _interrupt_id: &InterruptId,
    _config: &InterruptConfig,
  ) -> QuellResult<()> {
    self.retry_calls.lock().push(node_id.clone());
    Ok(())
  }
}

// --- In-memory completion correlator ---

struct Waiter {
  remaining: HashSet<CorrelationKey>,
  outcomes: HashMap<CorrelationKey, CompletionOutcome>,
  callback: Arc<dyn CompletionCallback>,
}

#[derive(Default)]
pub struct MemoryCorrelator {
  waiters: Mutex<Vec<Waiter>>,
  fail_wait: AtomicBool,
}

impl MemoryCorrelator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fail_next_wait(&self) {
    self.fail_wait.store(true, Ordering::SeqCst);
  }

  pub fn pending_keys(&self) -> usize {
    self.waiters.lock().iter().map(|w| w.remaining.len()).sum()
  }
}

#[async_trait]
impl CompletionCorrelator for MemoryCorrelator {
  async fn wait_for_all(&self, callback: Arc<dyn CompletionCallback>, keys: Vec<CorrelationKey>) -> QuellResult<()> {
    if self.fail_wait.swap(false, Ordering::SeqCst) {
      return Err(QuellError::Storage {
        source: anyhow::anyhow!("correlation queue unavailable"),
      });
    }
    if keys.is_empty() {
      return Err(QuellError::Internal("wait_for_all requires at least one key".to_string()));
    }
    self.waiters.lock().push(Waiter {
      remaining: keys.into_iter().collect(),
      outcomes: HashMap::new(),
      callback,
    });
    Ok(())
  }

  async fn resolve(&self, key: &CorrelationKey, outcome: CompletionOutcome) -> QuellResult<()> {
    // Collect completed waiters under the lock, fire their callbacks after.
    let completed: Vec<Waiter> = {
      let mut waiters = self.waiters.lock();
      for waiter in waiters.iter_mut() {
        if waiter.remaining.remove(key) {
          waiter.outcomes.insert(key.clone(), outcome.clone());
        }
      }
      let (done, pending): (Vec<Waiter>, Vec<Waiter>) =
        waiters.drain(..).partition(|w| w.remaining.is_empty());
      *waiters = pending;
      done
    };
    for waiter in completed {
      waiter.callback.on_all_resolved(waiter.outcomes).await;
    }
    Ok(())
  }
}

// --- Recording failure-strategy channel ---

#[derive(Default)]
pub struct RecordingFailureChannel {
  pub events: Mutex<Vec<FailureStrategyEvent>>,
  fail_publish: AtomicBool,
}

impl RecordingFailureChannel {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fail_next_publish(&self) {
    self.fail_publish.store(true, Ordering::SeqCst);
  }

  pub fn published(&self) -> Vec<FailureStrategyEvent> {
    self.events.lock().clone()
  }
}

#[async_trait]
impl FailureStrategyChannel for RecordingFailureChannel {
  async fn publish(&self, event: FailureStrategyEvent) -> QuellResult<()> {
    if self.fail_publish.swap(false, Ordering::SeqCst) {
      return Err(QuellError::Storage {
        source: anyhow::anyhow!("strategy channel unavailable"),
      });
    }
    self.events.lock().push(event);
    Ok(())
  }
}

// --- Harness bundling the doubles behind a wired dispatcher ---

pub struct Harness {
  pub store: Arc<MemoryInterruptStore>,
  pub nodes: Arc<MemoryNodeService>,
  pub plans: Arc<MemoryPlanService>,
  pub executor: Arc<RecordingExecutor>,
  pub correlator: Arc<MemoryCorrelator>,
  pub channel: Arc<RecordingFailureChannel>,
  pub quell: Quell,
}

impl Harness {
  pub fn new() -> Self {
    setup_tracing();
    let store = Arc::new(MemoryInterruptStore::new());
    let nodes = Arc::new(MemoryNodeService::new());
    let plans = Arc::new(MemoryPlanService::new());
    let executor = Arc::new(RecordingExecutor::new());
    let correlator = Arc::new(MemoryCorrelator::new());
    let channel = Arc::new(RecordingFailureChannel::new());
    let quell = Quell::new(
      store.clone(),
      nodes.clone(),
      plans.clone(),
      executor.clone(),
      correlator.clone(),
      channel.clone(),
    );
    Self {
      store,
      nodes,
      plans,
      executor,
      correlator,
      channel,
      quell,
    }
  }

  /// A running plan with a root parent and leaves in the given statuses.
  /// Returns the plan id, root id, and leaf ids in input order.
  pub fn plan_with_leaves(&self, statuses: &[NodeStatus]) -> (PlanExecutionId, NodeExecutionId, Vec<NodeExecutionId>) {
    let plan_id = self.plans.insert(PlanExecution::new("test-plan", PlanStatus::Running));
    let root = self.nodes.insert(NodeExecution::new(
      plan_id.clone(),
      None,
      "root",
      NodeStatus::Running,
      NodeMode::Parent,
    ));
    let leaves = statuses
      .iter()
      .enumerate()
      .map(|(idx, status)| {
        self.nodes.insert(NodeExecution::new(
          plan_id.clone(),
          Some(root.clone()),
          format!("leaf-{}", idx),
          *status,
          NodeMode::Leaf,
        ))
      })
      .collect();
    (plan_id, root, leaves)
  }

  pub fn interrupt_state(&self, id: &InterruptId) -> InterruptState {
    self
      .store
      .all()
      .into_iter()
      .find(|i| &i.id == id)
      .expect("interrupt persisted")
      .state
  }

  /// Resolve the correlation key for one node of an async interrupt, as the
  /// remote executor would once the node's work actually stops.
  pub async fn report_settled(&self, node_id: &NodeExecutionId, interrupt_id: &InterruptId, status: NodeStatus) {
    let key = CorrelationKey::new(node_id.clone(), interrupt_id.clone());
    self
      .correlator
      .resolve(&key, CompletionOutcome::Settled(status))
      .await
      .expect("resolve");
  }
}

pub fn abort_all(plan_id: &PlanExecutionId) -> Interrupt {
  Interrupt::new(InterruptType::AbortAll, plan_id.clone(), None, InterruptConfig::default())
}

pub fn plan_interrupt(interrupt_type: InterruptType, plan_id: &PlanExecutionId) -> Interrupt {
  Interrupt::new(interrupt_type, plan_id.clone(), None, InterruptConfig::default())
}

pub fn node_interrupt(
  interrupt_type: InterruptType,
  plan_id: &PlanExecutionId,
  node_id: &NodeExecutionId,
) -> Interrupt {
  Interrupt::new(
    interrupt_type,
    plan_id.clone(),
    Some(node_id.clone()),
    InterruptConfig::default(),
  )
}

pub use quell::InterruptType;
