//! Main controller implementation.
//!
//! The `Controller` binds informer notifications to the work queue, waits
//! for the informer cache to sync, and then runs a single worker loop that
//! hands queued keys to the [`Reconciler`] until shutdown.

use crate::backoff::FibonacciBackoff;
use crate::error::ControllerError;
use crate::keys::meta_namespace_key;
use crate::reconciler::Reconciler;
use crate::watcher::{wait_for_cache_sync, ResourceEventHandler, SharedInformer};
use crate::work_queue::WorkQueue;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Worker loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Pause between two worker passes
    pub interval: Duration,
    /// Requeues allowed for a transiently failing key; 0 disables retry
    pub max_retries: u32,
    /// Backoff between requeues
    pub backoff: FibonacciBackoff,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_retries: 0,
            backoff: FibonacciBackoff::default(),
        }
    }
}

/// Enqueues the key of every added or deleted Pod.
struct EnqueueHandler {
    queue: Arc<WorkQueue<String>>,
}

impl ResourceEventHandler<Pod> for EnqueueHandler {
    fn on_add(&self, pod: &Pod) {
        info!("Pod creation event: {}", pod.name_any());
        self.queue.add(meta_namespace_key(pod));
    }

    fn on_delete(&self, pod: &Pod) {
        info!("Pod deletion event: {}", pod.name_any());
        self.queue.add(meta_namespace_key(pod));
    }
}

/// Main controller for sibling Pod management.
pub struct Controller {
    queue: Arc<WorkQueue<String>>,
    reconciler: Reconciler,
    informer: Arc<dyn SharedInformer<Pod>>,
    settings: WorkerSettings,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("queue", &self.queue)
            .field("reconciler", &self.reconciler)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Creates a new controller and registers its handler on `informer`.
    ///
    /// Fails if the handler cannot be registered.
    pub fn new(
        reconciler: Reconciler,
        informer: Arc<dyn SharedInformer<Pod>>,
        settings: WorkerSettings,
    ) -> Result<Self, ControllerError> {
        info!("Initializing Sibling Controller");

        let queue = Arc::new(WorkQueue::new(settings.backoff));
        informer
            .add_event_handler(Arc::new(EnqueueHandler { queue: queue.clone() }))
            .map_err(|e| {
                error!("Error adding event handler to informer: {}", e);
                e
            })?;

        Ok(Self {
            queue,
            reconciler,
            informer,
            settings,
        })
    }

    /// Runs the controller until `shutdown` is cancelled.
    ///
    /// Returns without processing anything if `shutdown` fires before the
    /// informer cache has synced.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Starting Sibling Controller");

        if !wait_for_cache_sync(&shutdown, || self.informer.has_synced()).await {
            warn!("Shutdown requested before caches synced, not starting worker");
            self.queue.shut_down();
            return;
        }
        info!("Cache sync was successful");

        // Release a worker blocked in `get` as soon as shutdown is requested
        let queue = self.queue.clone();
        let stopper = shutdown.clone();
        let releaser = tokio::spawn(async move {
            stopper.cancelled().await;
            queue.shut_down();
        });

        loop {
            if !self.process_next_work_item().await {
                break;
            }
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        self.queue.shut_down();
        releaser.abort();
        info!("Stopping Sibling Controller");
    }

    /// One worker pass. Returns false once the queue is shut down.
    async fn process_next_work_item(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            info!("Work queue shut down");
            return false;
        };

        match self.reconciler.sync(&key).await {
            Ok(outcome) => {
                debug!("Processed {}: {:?}", key, outcome);
                self.queue.forget(&key);
            }
            Err(e) if e.is_retryable() && self.queue.num_requeues(&key) < self.settings.max_retries => {
                warn!(
                    "Error syncing {} (retry {}/{}): {}",
                    key,
                    self.queue.num_requeues(&key) + 1,
                    self.settings.max_retries,
                    e
                );
                self.queue.add_rate_limited(key.clone());
            }
            Err(e) => {
                error!("Error syncing {}, dropping: {}", key, e);
                self.queue.forget(&key);
            }
        }

        self.queue.done(&key);
        true
    }
}
