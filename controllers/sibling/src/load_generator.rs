//! Demo load generator.
//!
//! Creates managed pods named `1`, `2`, ... at a fixed interval. Once the
//! counter reaches the threshold, every pod from `1` to the counter is
//! deleted again, one per delete interval, before creation resumes. This
//! drives the controller through both the create and delete paths.

use pod_client::{PodClientError, PodClientTrait, PodTemplate, MANAGED_LABEL_KEY};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Load generator tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadGeneratorSettings {
    /// Namespace the pods are created in
    pub namespace: String,
    /// Pause before each create
    pub create_interval: Duration,
    /// Pause before each delete
    pub delete_interval: Duration,
    /// Counter value at which delete sweeps start
    pub threshold: u32,
    /// Delete every managed pod when stopping
    pub cleanup_on_exit: bool,
}

/// Periodically creates and deletes managed pods.
pub struct LoadGenerator {
    client: Arc<dyn PodClientTrait>,
    settings: LoadGeneratorSettings,
    template: PodTemplate,
}

/// Sleeps for `duration`; returns false if `shutdown` fired first.
async fn pause(shutdown: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        () = shutdown.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

impl LoadGenerator {
    pub fn new(client: Arc<dyn PodClientTrait>, settings: LoadGeneratorSettings, template: PodTemplate) -> Self {
        Self {
            client,
            settings,
            template,
        }
    }

    /// Runs until `shutdown` is cancelled, then cleans up if configured.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            "Starting load generator in namespace {} (threshold {})",
            self.settings.namespace, self.settings.threshold
        );

        self.generate(&shutdown).await;

        if self.settings.cleanup_on_exit {
            info!("Cleaning up pods labelled {}", MANAGED_LABEL_KEY);
            if let Err(e) = self
                .client
                .delete_collection(&self.settings.namespace, MANAGED_LABEL_KEY)
                .await
            {
                warn!("Failed to clean up load generator pods: {}", e);
            }
        }
        info!("Stopping load generator");
    }

    async fn generate(&self, shutdown: &CancellationToken) {
        let mut count: u32 = 1;
        loop {
            if !pause(shutdown, self.settings.create_interval).await {
                return;
            }
            self.create(&count.to_string()).await;
            count = count.saturating_add(1);

            if count >= self.settings.threshold {
                for i in 1..=count {
                    if !pause(shutdown, self.settings.delete_interval).await {
                        return;
                    }
                    self.delete(&i.to_string()).await;
                }
            }
        }
    }

    async fn create(&self, name: &str) {
        let namespace = &self.settings.namespace;
        let pod = self.template.build(name, namespace);
        match self.client.create_pod(namespace, &pod).await {
            Ok(_) => debug!("Load generator created pod {}/{}", namespace, name),
            Err(PodClientError::AlreadyExists(_)) => debug!("Pod {}/{} already exists", namespace, name),
            Err(e) => warn!("Load generator failed to create pod {}/{}: {}", namespace, name, e),
        }
    }

    async fn delete(&self, name: &str) {
        let namespace = &self.settings.namespace;
        match self.client.delete_pod(namespace, name).await {
            Ok(()) => debug!("Load generator deleted pod {}/{}", namespace, name),
            Err(PodClientError::NotFound(_)) => debug!("Pod {}/{} already gone", namespace, name),
            Err(e) => warn!("Load generator failed to delete pod {}/{}: {}", namespace, name, e),
        }
    }
}
