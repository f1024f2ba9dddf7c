//! Team facade: builder plus workflow lifecycle.
//!
//! A team bundles agents, tasks, and the shared store, wires the chosen
//! execution strategy to the store's subscription stream, and owns the
//! bounded execution queue. All strategy dispatch runs on a single driver
//! task fed by status-change events, so strategies never race each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::agent::executor::AgentExecutor;
use crate::agent::Agent;
use crate::config::ExecutionConfig;
use crate::enums::{TaskStatus, WorkflowStatus};
use crate::error::TroupeError;
use crate::queue::{ExecutionQueue, Runner, WorkItem};
use crate::store::{SubscriptionId, TeamStore};
use crate::strategy::{
    DeterministicStrategy, ExecutionStrategy, ManagerStrategy, StrategyContext,
};
use crate::task::{Task, TaskId};

/// Events consumed by the single strategy driver task.
enum DriverEvent {
    Start,
    Changed(Vec<TaskId>),
    Resume,
}

struct TeamRuntime {
    queue: Arc<ExecutionQueue>,
    driver_tx: mpsc::UnboundedSender<DriverEvent>,
    subscription: SubscriptionId,
}

/// A bundle of agents and tasks driven to completion by a strategy.
pub struct Team {
    store: Arc<TeamStore>,
    strategy: Arc<dyn ExecutionStrategy>,
    runtime: Mutex<Option<TeamRuntime>>,
}

impl Team {
    pub fn builder(name: impl Into<String>) -> TeamBuilder {
        TeamBuilder::new(name)
    }

    pub fn store(&self) -> Arc<TeamStore> {
        Arc::clone(&self.store)
    }

    /// Start the workflow: validate, mark RUNNING, build the queue, and let
    /// the strategy choose the initial task set.
    pub fn start(&self, inputs: HashMap<String, serde_json::Value>) -> Result<(), TroupeError> {
        self.store.start(inputs)?;

        // A re-run tears down the previous wiring first.
        if let Some(previous) = self.runtime.lock().expect("team runtime lock poisoned").take() {
            self.store.unsubscribe(previous.subscription);
        }

        let concurrency = self.strategy.concurrency(&self.store);
        let queue = Arc::new(ExecutionQueue::new(concurrency, self.build_runner()));
        let (driver_tx, mut driver_rx) = mpsc::unbounded_channel::<DriverEvent>();

        // Forward committed task-status transitions into the driver channel.
        let tx = driver_tx.clone();
        let subscription = self.store.subscribe(
            |state| state.task_statuses(),
            move |old, new, _state| {
                let changed: Vec<TaskId> = match old {
                    None => new.iter().map(|(id, _)| id.clone()).collect(),
                    Some(old) => {
                        let previous: HashMap<TaskId, TaskStatus> = old.iter().cloned().collect();
                        new.iter()
                            .filter(|(id, status)| previous.get(id) != Some(status))
                            .map(|(id, _)| id.clone())
                            .collect()
                    }
                };
                if !changed.is_empty() {
                    let _ = tx.send(DriverEvent::Changed(changed));
                }
            },
        );

        let ctx = StrategyContext {
            store: Arc::clone(&self.store),
            queue: Arc::clone(&queue),
        };
        let strategy = Arc::clone(&self.strategy);
        tokio::spawn(async move {
            while let Some(event) = driver_rx.recv().await {
                match event {
                    DriverEvent::Start => strategy.start_execution(&ctx).await,
                    DriverEvent::Changed(ids) => {
                        if ctx.store.workflow_status() == WorkflowStatus::Running {
                            strategy.execute_from_changed_tasks(&ctx, &ids).await;
                        }
                    }
                    DriverEvent::Resume => strategy.resume_execution(&ctx).await,
                }
            }
        });

        let _ = driver_tx.send(DriverEvent::Start);
        *self.runtime.lock().expect("team runtime lock poisoned") = Some(TeamRuntime {
            queue,
            driver_tx,
            subscription,
        });
        Ok(())
    }

    fn build_runner(&self) -> Runner {
        let store = Arc::clone(&self.store);
        let timeout = self.store.config().task_timeout;
        Arc::new(move |item: WorkItem| {
            let store = Arc::clone(&store);
            Box::pin(async move {
                let executor = AgentExecutor::new(Arc::clone(&store));
                let task_id = item.task_id.clone();
                let work = async {
                    if item.resume {
                        executor
                            .work_on_task_resume(item.agent, &task_id, &item.context)
                            .await
                    } else {
                        executor.work_on_task(item.agent, &task_id, &item.context).await
                    }
                };
                match timeout {
                    Some(limit) => {
                        if tokio::time::timeout(limit, work).await.is_err() {
                            tracing::warn!(task_id = %task_id, "work item timed out");
                            let _ = store.block_task(&task_id, "work item timed out");
                        }
                    }
                    None => {
                        let _ = work.await;
                    }
                }
            })
        })
    }

    /// Cooperative pause: close the intake gate and let in-flight loops yield
    /// at their next iteration boundary.
    pub fn pause(&self) -> Result<(), TroupeError> {
        self.store.pause()?;
        if let Some(runtime) = self.runtime.lock().expect("team runtime lock poisoned").as_ref() {
            runtime.queue.close_intake();
        }
        Ok(())
    }

    /// Resume from PAUSED: paused tasks re-enter their loops from checkpoints.
    pub fn resume(&self) -> Result<(), TroupeError> {
        self.store.resume()?;
        if let Some(runtime) = self.runtime.lock().expect("team runtime lock poisoned").as_ref() {
            let _ = runtime.driver_tx.send(DriverEvent::Resume);
        }
        Ok(())
    }

    /// Cooperative stop: cease dispatch, drain in-flight work, abort the rest.
    pub async fn stop(&self) -> Result<(), TroupeError> {
        self.store.request_stop()?;
        let queue = self
            .runtime
            .lock()
            .expect("team runtime lock poisoned")
            .as_ref()
            .map(|r| Arc::clone(&r.queue));
        if let Some(queue) = queue {
            let ctx = StrategyContext {
                store: Arc::clone(&self.store),
                queue: Arc::clone(&queue),
            };
            self.strategy.stop_execution(&ctx).await;
            queue.drain().await;
        }
        self.store.finalize_stop();
        Ok(())
    }

    /// Wait for a terminal workflow status, then return the workflow result.
    pub async fn join(&self) -> Option<serde_json::Value> {
        let mut watch = self.store.status_watch();
        let _ = watch.wait_for(|status| status.is_terminal()).await;
        self.store.workflow_result()
    }

    /// Wait until nothing is in flight and nothing will be dispatched without
    /// an external call: terminal, or BLOCKED on validation/exhaustion.
    pub async fn wait_until_quiescent(&self) -> WorkflowStatus {
        let mut watch = self.store.status_watch();
        let result = match watch.wait_for(|status| status.is_quiescent()).await {
            Ok(status) => *status,
            Err(_) => self.store.workflow_status(),
        };
        result
    }

    pub fn provide_feedback(
        &self,
        task_id: &TaskId,
        content: impl Into<String>,
    ) -> Result<(), TroupeError> {
        self.store.provide_feedback(task_id, content)
    }

    pub fn validate_task(&self, task_id: &TaskId) -> Result<(), TroupeError> {
        self.store.validate_task(task_id)
    }

    pub fn workflow_status(&self) -> WorkflowStatus {
        self.store.workflow_status()
    }

    pub fn workflow_result(&self) -> Option<serde_json::Value> {
        self.store.workflow_result()
    }

    pub fn cleaned_state(&self) -> serde_json::Value {
        self.store.cleaned_state()
    }

    pub fn workflow_stats(&self) -> crate::store::stats::WorkflowStats {
        self.store.workflow_stats()
    }
}

/// Builder for [`Team`].
pub struct TeamBuilder {
    name: String,
    config: ExecutionConfig,
    agents: Vec<Agent>,
    tasks: Vec<Task>,
    env: HashMap<String, String>,
    manager: Option<Agent>,
}

impl TeamBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: ExecutionConfig::default(),
            agents: Vec::new(),
            tasks: Vec::new(),
            env: HashMap::new(),
            manager: None,
        }
    }

    pub fn config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn agents(mut self, agents: Vec<Agent>) -> Self {
        self.agents.extend(agents);
        self
    }

    pub fn tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Designate a supervisor agent; selection switches to the manager-LLM
    /// strategy.
    pub fn manager(mut self, manager: Agent) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn build(self) -> Result<Team, TroupeError> {
        let store = Arc::new(TeamStore::new(self.name, self.config));
        store.add_agents(self.agents)?;
        store.add_tasks(self.tasks)?;
        store.set_env(self.env);

        let strategy: Arc<dyn ExecutionStrategy> = match self.manager {
            Some(manager) => Arc::new(ManagerStrategy::new(manager)),
            None => Arc::new(DeterministicStrategy::new()),
        };

        Ok(Team {
            store,
            strategy,
            runtime: Mutex::new(None),
        })
    }
}
