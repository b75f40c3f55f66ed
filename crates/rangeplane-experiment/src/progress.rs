//! Detached starts with polled launch progress.
//!
//! The start itself is blocking work, so it runs on tokio's blocking pool.
//! Meanwhile a task polls the backend every
//! [`ControllerConfig::progress_interval`](crate::ControllerConfig) and
//! publishes the fraction of launched VMs on a `watch` channel. Polling
//! continues after the start returns until every VM has left the backend's
//! queue.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::controller::{Applied, Controller, StartRequest};
use crate::error::{ExperimentError, ExperimentResult, Failure};

/// A start running in the background.
pub struct StartHandle {
    progress: watch::Receiver<f64>,
    task: JoinHandle<Result<Applied, Failure>>,
}

impl StartHandle {
    /// A receiver for progress updates in `0.0..=1.0`.
    pub fn progress(&self) -> watch::Receiver<f64> {
        self.progress.clone()
    }

    /// The most recently published progress.
    pub fn current(&self) -> f64 {
        *self.progress.borrow()
    }

    /// Wait for the start and the launch it triggered to finish.
    pub async fn wait(self) -> Result<Applied, Failure> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(Failure::new(ExperimentError::Aborted(err.to_string()))),
        }
    }
}

/// One poll, on the blocking pool. `None` while the backend has nothing to
/// report yet (for example before the namespace exists).
async fn poll(controller: &Arc<Controller>, name: &str, expected: usize) -> Option<f64> {
    let controller = Arc::clone(controller);
    let name = name.to_string();
    let polled = tokio::task::spawn_blocking(move || controller.backend().launch_progress(&name, expected)).await;
    match polled {
        Ok(Ok(progress)) => Some(progress),
        Ok(Err(err)) => {
            debug!(error = %err, "progress poll failed");
            None
        }
        Err(_) => None,
    }
}

async fn expected_vms(controller: &Arc<Controller>, name: &str) -> ExperimentResult<usize> {
    let controller = Arc::clone(controller);
    let name = name.to_string();
    tokio::task::spawn_blocking(move || controller.load(&name).map(|exp| exp.spec.topology.nodes.len()))
        .await
        .map_err(|e| ExperimentError::Aborted(e.to_string()))?
}

/// Run [`Controller::start`] in the background and follow its launch.
///
/// Must be called from within a tokio runtime.
pub fn start_detached(controller: Arc<Controller>, request: StartRequest) -> StartHandle {
    let (tx, rx) = watch::channel(0.0_f64);
    let interval = controller.config().progress_interval;
    let name = request.name.clone();
    let dry_run = request.dry_run;

    let worker = Arc::clone(&controller);
    let mut start = tokio::task::spawn_blocking(move || worker.start(request));

    let task = tokio::spawn(async move {
        let expected = expected_vms(&controller, &name).await.unwrap_or(0);
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let started = loop {
            tokio::select! {
                joined = &mut start => break joined,
                _ = ticker.tick(), if !dry_run => {
                    if let Some(progress) = poll(&controller, &name, expected).await {
                        tx.send_replace(progress);
                    }
                }
            }
        };

        let applied = match started {
            Ok(result) => result?,
            Err(err) => return Err(Failure::new(ExperimentError::Aborted(err.to_string()))),
        };

        if !dry_run {
            loop {
                ticker.tick().await;
                match poll(&controller, &name, expected).await {
                    Some(progress) => {
                        tx.send_replace(progress);
                        if progress >= 1.0 {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
        tx.send_replace(1.0);
        Ok(applied)
    });

    StartHandle { progress: rx, task }
}
