use crate::api::{Dataset, DatasetsApi};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Background refresh of a project's dataset history.
///
/// Fetches once on start and again on every interval tick or `refresh` call.
/// A failed fetch is logged and the last good list stays visible. The task
/// stops when the poller is dropped.
#[derive(Debug)]
pub struct DatasetHistoryPoller {
    rx: watch::Receiver<Vec<Dataset>>,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

/// Used when a zero interval is requested
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

impl DatasetHistoryPoller {
    pub fn spawn(api: DatasetsApi, project_id: impl Into<String>, interval: Duration) -> Self {
        let project_id = project_id.into();
        let interval = if interval.is_zero() {
            warn!(
                default_secs = DEFAULT_INTERVAL.as_secs(),
                "Zero poll interval requested, using default"
            );
            DEFAULT_INTERVAL
        } else {
            interval
        };
        let (tx, rx) = watch::channel(Vec::new());
        let wake = Arc::new(Notify::new());

        info!(
            project = %project_id,
            interval_secs = interval.as_secs(),
            "Dataset history poller started"
        );

        let task_wake = Arc::clone(&wake);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                // First tick completes immediately
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = task_wake.notified() => {
                        debug!("Dataset history refresh requested");
                    }
                }

                match api.list(&project_id).await {
                    Ok(datasets) => {
                        debug!(count = datasets.len(), "Dataset history refreshed");
                        if tx.send(datasets).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(project = %project_id, error = %e, "Failed to refresh dataset history");
                    }
                }
            }
        });

        Self { rx, wake, task }
    }

    /// Last successfully fetched history; empty until the first fetch lands
    pub fn latest(&self) -> Vec<Dataset> {
        self.rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Dataset>> {
        self.rx.clone()
    }

    /// Fetch now instead of waiting for the next tick
    pub fn refresh(&self) {
        self.wake.notify_one();
    }
}

impl Drop for DatasetHistoryPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}
