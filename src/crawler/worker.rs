//! Dispatch worker pool lifecycle

use crate::crawler::Dispatcher;
use crate::GaugeError;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Handle to running dispatch workers
pub struct WorkerHandle {
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Number of workers that were spawned
    pub fn worker_count(&self) -> usize {
        self.tasks.len()
    }

    /// A token that stops every worker when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Signals shutdown and waits up to `grace` for the workers to exit
    ///
    /// Workers still running after the grace period are aborted.
    ///
    /// # Returns
    ///
    /// `true` if every worker exited on its own
    pub async fn shutdown(self, grace: Duration) -> bool {
        self.shutdown.cancel();

        let deadline = Instant::now() + grace;
        let mut clean = true;

        for (index, mut task) in self.tasks.into_iter().enumerate() {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!("Dispatch worker {} panicked: {}", index, e);
                    clean = false;
                }
                Err(_) => {
                    tracing::warn!(
                        "Dispatch worker {} did not stop within {:?}, aborting",
                        index,
                        grace
                    );
                    task.abort();
                    clean = false;
                }
            }
        }

        clean
    }
}

/// Recovers interrupted pages and spawns `count` dispatch workers
///
/// # Arguments
///
/// * `dispatcher` - The dispatcher every worker clones
/// * `count` - Number of workers (at least one is always spawned)
pub async fn spawn_workers(
    dispatcher: Dispatcher,
    count: usize,
) -> Result<WorkerHandle, GaugeError> {
    dispatcher.recover_interrupted().await?;

    let shutdown = CancellationToken::new();
    let tasks = (0..count.max(1))
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { dispatcher.run(shutdown).await })
        })
        .collect();

    tracing::info!("Started {} dispatch worker(s)", count.max(1));
    Ok(WorkerHandle { shutdown, tasks })
}
