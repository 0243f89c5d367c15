//! Task runners.
//!
//! Delivery methods never do network I/O themselves. They hand a [`Task`] to
//! a [`TaskRunner`], which either runs it to completion right away
//! ([`InlineRunner`]) or spawns it onto a Tokio runtime ([`BackgroundRunner`]).
//! Either way the runner passes its own settings snapshot to the task.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::{Builder, Handle};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::{NotificationError, NotificationResult};
use crate::settings::{Settings, WorkerBackend};
use crate::tasks::Task;

/// Accepts delivery tasks for execution.
#[cfg_attr(test, mockall::automock)]
pub trait TaskRunner: Send + Sync {
    /// Submit a task. Depending on the runner the task has either completed
    /// or merely been scheduled when this returns.
    fn run(&self, task: Task) -> NotificationResult<()>;
}

/// Runs each task to completion before returning, reporting its result.
pub struct InlineRunner {
    settings: Arc<Settings>,
}

impl InlineRunner {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    fn block_on(&self, task: &Task) -> NotificationResult<()> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NotificationError::Runtime(e.to_string()))?;

        runtime.block_on(task.execute(&self.settings))
    }
}

impl TaskRunner for InlineRunner {
    fn run(&self, task: Task) -> NotificationResult<()> {
        info!(task = task.name(), "Running task inline");

        // A runtime cannot be blocked on from inside another one, so when
        // called from async code the task gets a thread of its own.
        if Handle::try_current().is_ok() {
            std::thread::scope(|scope| {
                scope
                    .spawn(|| self.block_on(&task))
                    .join()
                    .unwrap_or_else(|_| {
                        Err(NotificationError::Runtime(format!(
                            "task {} panicked",
                            task.name()
                        )))
                    })
            })
        } else {
            self.block_on(&task)
        }
    }
}

/// Spawns each task onto a Tokio runtime and returns immediately.
///
/// Failures are logged; they never reach the code that submitted the task.
pub struct BackgroundRunner {
    settings: Arc<Settings>,
    handle: Handle,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundRunner {
    pub fn new(settings: Arc<Settings>, handle: Handle) -> Self {
        Self {
            settings,
            handle,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Use the runtime the caller is running on.
    pub fn current(settings: Arc<Settings>) -> NotificationResult<Self> {
        let handle = Handle::try_current().map_err(|e| NotificationError::Runtime(e.to_string()))?;
        Ok(Self::new(settings, handle))
    }

    /// Wait for every task scheduled so far to finish.
    pub async fn drain(&self) {
        let pending = std::mem::take(
            &mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner),
        );

        for task in pending {
            if let Err(e) = task.await {
                error!(error = %e, "Background task did not complete");
            }
        }
    }
}

impl TaskRunner for BackgroundRunner {
    fn run(&self, task: Task) -> NotificationResult<()> {
        let settings = Arc::clone(&self.settings);

        info!(task = task.name(), "Scheduling background task");
        let join = self.handle.spawn(async move {
            match task.execute(&settings).await {
                Ok(()) => info!(task = task.name(), "Background task finished"),
                Err(e) => error!(task = task.name(), error = %e, "Background task failed"),
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|task| !task.is_finished());
        pending.push(join);

        Ok(())
    }
}

/// Pick the runner named by `settings.worker_backend`.
///
/// The background runner needs to be created from within a Tokio runtime.
pub fn runner_from_settings(settings: Arc<Settings>) -> NotificationResult<Arc<dyn TaskRunner>> {
    match settings.worker_backend {
        WorkerBackend::Sync => Ok(Arc::new(InlineRunner::new(settings))),
        WorkerBackend::Background => Ok(Arc::new(BackgroundRunner::current(settings)?)),
    }
}
