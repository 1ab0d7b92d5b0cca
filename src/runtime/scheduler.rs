/// Trigger controller
///
/// Decides how and when a full-graph run happens: immediately for a manual
/// trigger, on tokio timers for a schedule trigger. Owns the timer task of its
/// workflow session, so several controllers can coexist without sharing state.
///
/// Scheduled ticks follow a fire-and-skip policy: a tick that finds the previous
/// run still executing is dropped, never queued.

use crate::error::{EngineError, EngineResult};
use crate::runtime::engine::ExecutionEngine;
use crate::runtime::notify::{Notice, Notifier};
use crate::runtime::recorder::{Execution, ExecutionRecorder};
use crate::workflow::action::ScheduleConfig;
use crate::workflow::store::GraphStore;
use crate::workflow::types::{ActionKind, Graph};
use chrono::Local;
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// First fires closer than this are treated as immediate
const IMMEDIATE_FIRE_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerState {
    Idle,
    Scheduled,
    Running,
}

/// What `run_workflow` did
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Manual trigger: the run finished and was recorded
    Completed(Arc<Execution>),
    /// Schedule trigger: the timer is armed
    Scheduled { first_delay_ms: u64, interval_ms: u64 },
}

/// Which kind of run holds the re-entrancy flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum RunKind {
    Manual = 1,
    Scheduled = 2,
}

const NO_RUN: u8 = 0;

/// Resolved timing of an armed schedule
#[derive(Debug, Clone)]
struct SchedulePlan {
    first_delay: Duration,
    interval: Duration,
    description: String,
}

impl SchedulePlan {
    fn new(config: &ScheduleConfig) -> Self {
        let mut first_delay_ms = config.first_delay_ms(&Local::now());
        if first_delay_ms <= IMMEDIATE_FIRE_MS {
            first_delay_ms = 0;
        }
        Self {
            first_delay: Duration::from_millis(first_delay_ms),
            interval: config.interval(),
            description: config.describe(),
        }
    }
}

/// State shared between the controller and its timer task
#[derive(Debug)]
struct Shared {
    store: Arc<GraphStore>,
    engine: Arc<ExecutionEngine>,
    recorder: Arc<ExecutionRecorder>,
    notifier: Arc<dyn Notifier>,
    /// Re-entrancy flag: the `RunKind` of the full run executing, or `NO_RUN`
    running: AtomicU8,
}

impl Shared {
    async fn run_full(&self, graph: &Graph, description: String) -> Arc<Execution> {
        let execution = self.engine.run_graph(graph, description).await;
        self.record(execution)
    }

    fn active_run(&self) -> Option<RunKind> {
        match self.running.load(Ordering::Acquire) {
            kind if kind == RunKind::Manual as u8 => Some(RunKind::Manual),
            kind if kind == RunKind::Scheduled as u8 => Some(RunKind::Scheduled),
            _ => None,
        }
    }

    fn record(&self, execution: Execution) -> Arc<Execution> {
        let execution = self.recorder.set_execution(execution);
        self.notifier.notify(Notice::for_execution(&execution));
        execution
    }

    /// Start one scheduled run unless the previous one is still executing
    fn fire_tick(self: &Arc<Self>, description: &str) -> bool {
        let Some(guard) = RunGuard::try_acquire(self, RunKind::Scheduled) else {
            tracing::warn!("⏭️ Previous run still in progress, dropping scheduled tick");
            return false;
        };

        tracing::info!("⏰ Scheduled tick: {}", description);
        let shared = Arc::clone(self);
        let description = description.to_string();
        tokio::spawn(async move {
            let _guard = guard;
            // The graph may have been edited since the timer was armed
            let graph = shared.store.snapshot();
            if graph.trigger_node().is_none() {
                shared.notifier.notify(Notice::error(EngineError::NoTriggerNode.to_string()));
                return;
            }
            shared.run_full(&graph, description).await;
        });
        true
    }
}

/// Holds the re-entrancy flag for the lifetime of one run
#[derive(Debug)]
struct RunGuard {
    shared: Arc<Shared>,
}

impl RunGuard {
    fn try_acquire(shared: &Arc<Shared>, kind: RunKind) -> Option<Self> {
        shared
            .running
            .compare_exchange(NO_RUN, kind as u8, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { shared: Arc::clone(shared) })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.shared.running.store(NO_RUN, Ordering::Release);
    }
}

/// Manual and scheduled invocation of the current graph
#[derive(Debug)]
pub struct TriggerController {
    shared: Arc<Shared>,
    /// At most one armed schedule; re-arming replaces it
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl TriggerController {
    pub fn new(
        store: Arc<GraphStore>,
        engine: Arc<ExecutionEngine>,
        recorder: Arc<ExecutionRecorder>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                engine,
                recorder,
                notifier,
                running: AtomicU8::new(NO_RUN),
            }),
            timer: Mutex::new(None),
        }
    }

    /// Run the current graph according to its trigger node
    ///
    /// Validation failures are also reported as one error notice and leave no
    /// execution behind.
    pub async fn run_workflow(&self) -> EngineResult<RunOutcome> {
        let graph = self.shared.store.snapshot();
        let Some(trigger) = graph.trigger_node() else {
            return Err(self.reject(EngineError::NoTriggerNode));
        };

        if trigger.action_kind == ActionKind::ScheduleTrigger {
            let config = ScheduleConfig::from_node(trigger).map_err(|e| self.reject(e))?;
            let plan = SchedulePlan::new(&config);
            let outcome = RunOutcome::Scheduled {
                first_delay_ms: u64::try_from(plan.first_delay.as_millis()).unwrap_or(u64::MAX),
                interval_ms: config.interval_ms(),
            };
            self.arm(plan);
            return Ok(outcome);
        }

        let Some(_guard) = RunGuard::try_acquire(&self.shared, RunKind::Manual) else {
            tracing::warn!("🚫 Manual run rejected, another run is in progress");
            return Err(EngineError::RunInProgress);
        };
        Ok(RunOutcome::Completed(
            self.shared.run_full(&graph, "Manual trigger".to_string()).await,
        ))
    }

    /// Run one node on its own and record it as the current execution
    pub async fn execute_single_node(&self, node_id: &str) -> EngineResult<Arc<Execution>> {
        let graph = self.shared.store.snapshot();
        let execution = self
            .shared
            .engine
            .run_single(&graph, node_id)
            .await
            .map_err(|e| self.reject(e))?;
        Ok(self.shared.record(execution))
    }

    /// Cancel any armed timer; a run already executing is left to finish
    pub fn abort(&self) {
        if let Some(handle) = self.timer_slot().take() {
            handle.abort();
            tracing::info!("⏹️ Schedule aborted");
        }
    }

    /// Trigger state as seen by callers
    ///
    /// A scheduled run still finishing after `abort` no longer counts: the
    /// schedule is gone, so the state is Idle even though `is_running` holds.
    pub fn state(&self) -> TriggerState {
        let armed = self.is_armed();
        match self.shared.active_run() {
            Some(RunKind::Manual) => TriggerState::Running,
            Some(RunKind::Scheduled) if armed => TriggerState::Running,
            _ if armed => TriggerState::Scheduled,
            _ => TriggerState::Idle,
        }
    }

    /// Whether a schedule timer is armed
    pub fn is_armed(&self) -> bool {
        self.timer_slot().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Whether any full run holds the re-entrancy flag
    pub fn is_running(&self) -> bool {
        self.shared.active_run().is_some()
    }

    pub fn recorder(&self) -> &Arc<ExecutionRecorder> {
        &self.shared.recorder
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.shared.store
    }

    fn arm(&self, plan: SchedulePlan) {
        tracing::info!(
            "⏰ Arming {} (first fire in {:?}, then every {:?})",
            plan.description,
            plan.first_delay,
            plan.interval
        );
        let handle = tokio::spawn(schedule_loop(Arc::clone(&self.shared), plan));
        if let Some(previous) = self.timer_slot().replace(handle) {
            previous.abort();
            tracing::debug!("🔄 Replaced previously armed schedule");
        }
    }

    fn reject(&self, error: EngineError) -> EngineError {
        tracing::warn!("⚠️ Workflow run rejected: {}", error);
        self.shared.notifier.notify(Notice::error(error.to_string()));
        error
    }

    fn timer_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for TriggerController {
    fn drop(&mut self) {
        self.abort();
    }
}

async fn schedule_loop(shared: Arc<Shared>, plan: SchedulePlan) {
    if !plan.first_delay.is_zero() {
        tokio::time::sleep(plan.first_delay).await;
    }
    shared.fire_tick(&plan.description);

    let Some(start) = Instant::now().checked_add(plan.interval) else {
        tracing::warn!("⚠️ Interval {:?} is out of range, schedule stops after first run", plan.interval);
        return;
    };
    let mut ticker = tokio::time::interval_at(start, plan.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        shared.fire_tick(&plan.description);
    }
}
