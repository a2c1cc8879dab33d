use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::SchedulerError;
use crate::task::{ScheduledTask, TaskReport};

struct Registration {
    task: Arc<dyn ScheduledTask>,
    interval: Duration,
}

/// Runs [`ScheduledTask`]s on independent timers, or on demand.
pub struct Scheduler {
    tasks: Vec<Registration>,
    run_on_startup: bool,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            tasks: Vec::new(),
            run_on_startup: false,
            running: AtomicBool::new(false),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Fire every task once as soon as the timers start.
    pub fn with_run_on_startup(mut self, run_on_startup: bool) -> Self {
        self.run_on_startup = run_on_startup;
        self
    }

    /// Add a task that runs every `interval` once spawned.
    pub fn register(&mut self, task: Arc<dyn ScheduledTask>, interval: Duration) {
        tracing::info!(task = task.name(), interval_secs = interval.as_secs(), "registering scheduled task");
        self.tasks.push(Registration {
            task,
            interval: interval.max(Duration::from_millis(1)),
        });
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|r| r.task.name()).collect()
    }

    /// Run the named task once, now.
    pub async fn trigger(&self, name: &str, now: DateTime<Utc>) -> Result<TaskReport, SchedulerError> {
        let registration = self
            .tasks
            .iter()
            .find(|r| r.task.name() == name)
            .ok_or_else(|| SchedulerError::UnknownTask(name.to_string()))?;
        registration
            .task
            .run(now)
            .await
            .map_err(|source| SchedulerError::Task {
                task: registration.task.name(),
                source,
            })
    }

    /// Run every task once, in registration order. A failing task is logged
    /// and does not stop the others.
    pub async fn trigger_all(&self, now: DateTime<Utc>) -> Vec<TaskReport> {
        let mut reports = Vec::with_capacity(self.tasks.len());
        for registration in &self.tasks {
            match registration.task.run(now).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!(task = registration.task.name(), error = %e, "scheduled task failed")
                }
            }
        }
        reports
    }

    /// Start one timer loop per task. Calling it again while running is a no-op.
    pub async fn spawn(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("scheduler already running");
            return;
        }
        self.shutdown_tx.send_replace(false);

        let mut handles = self.handles.lock().await;
        for registration in &self.tasks {
            let task = registration.task.clone();
            let period = registration.interval;
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            let start = if self.run_on_startup {
                Instant::now()
            } else {
                Instant::now() + period
            };

            handles.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval_at(start, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Err(e) = task.run(Utc::now()).await {
                                tracing::error!(task = task.name(), error = %e, "scheduled task failed");
                            }
                        }
                        _ = shutdown_rx.changed() => {
                            tracing::info!(task = task.name(), "scheduled task stopped");
                            break;
                        }
                    }
                }
            }));
        }
        tracing::info!(tasks = self.tasks.len(), "scheduler started");
    }

    /// Stop every timer loop and wait for in-progress runs to finish.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shutdown_tx.send_replace(true);
        let handles = std::mem::take(&mut *self.handles.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "scheduled task ended abnormally");
            }
        }
        tracing::info!("scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
