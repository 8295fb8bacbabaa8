//! Lifecycle interface for the exporter's long-running services.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Error returned by [`Bootable`] lifecycle methods.
pub type BootableError = Box<dyn std::error::Error + Send + Sync>;

/// Trait for bootable services.
#[async_trait]
pub trait Bootable
where
    Self: Send + Sync + 'static,
{
    /// Get the name of the bootable service.
    fn bootable_name(&self) -> &str;

    /// Start the bootable service.
    async fn start(&self) -> Result<(), BootableError>;

    /// Shutdown the bootable service.
    async fn shutdown(&self) -> Result<(), BootableError>;

    /// Wait for the bootable service to exit.
    async fn wait(&self);
}

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Named background tasks owned by a bootable service.
///
/// The loops these tasks run never finish on their own, so [`BackgroundTasks::shutdown`]
/// aborts them and [`BackgroundTasks::wait`] only returns once one of them has died.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    tasks: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl BackgroundTasks {
    /// Creates an empty task set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` under `name`.
    pub async fn spawn<F>(&self, name: impl Into<String>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        debug!("spawning background task {name}");
        self.tasks.lock().await.push((name, tokio::spawn(task)));
    }

    /// Number of spawned tasks that have not been shut down.
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Whether no tasks are running.
    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// Aborts every task and waits for it to wind down.
    pub async fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().await);

        for (name, task) in tasks {
            task.abort();
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
                Ok(Err(e)) if e.is_cancelled() => debug!("{name} task stopped"),
                Ok(Err(e)) => error!("{name} task panicked: {e}"),
                Ok(Ok(())) => debug!("{name} task had already finished"),
                Err(_) => warn!("{name} task did not stop within {SHUTDOWN_TIMEOUT:?}"),
            }
        }
    }

    /// Returns once any task has finished, or immediately if there are none.
    pub async fn wait(&self) {
        let handles: Vec<_> = self
            .tasks
            .lock()
            .await
            .iter()
            .map(|(name, task)| (name.clone(), task.abort_handle()))
            .collect();

        if handles.is_empty() {
            return;
        }

        loop {
            if let Some((name, _)) = handles.iter().find(|(_, handle)| handle.is_finished()) {
                info!("{name} task exited");
                break;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing_test::traced_test;

    #[tokio::test]
    async fn test_shutdown_aborts_endless_tasks() {
        let tasks = BackgroundTasks::new();
        let ticks = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ticks);
        tasks
            .spawn("ticker", async move {
                loop {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await;
        assert_eq!(tasks.len().await, 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        tasks.shutdown().await;
        assert!(tasks.is_empty().await);

        let stopped_at = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), stopped_at);
        assert!(stopped_at > 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_wait_returns_when_a_task_exits() {
        let tasks = BackgroundTasks::new();
        tasks
            .spawn("endless", async {
                loop {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
            })
            .await;
        tasks
            .spawn("short", async {
                tokio::time::sleep(Duration::from_millis(10)).await;
            })
            .await;

        tokio::time::timeout(Duration::from_secs(2), tasks.wait())
            .await
            .unwrap();

        assert!(logs_contain("short task exited"));
        tasks.shutdown().await;
    }

    #[tokio::test]
    async fn test_wait_without_tasks_returns_immediately() {
        BackgroundTasks::new().wait().await;
    }
}
