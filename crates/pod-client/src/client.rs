//! Pod API client backed by `kube`

use crate::error::PodClientError;
use crate::pod_trait::PodClientTrait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use tracing::{debug, error, info};

/// Pod client for a live cluster.
///
/// Each call builds a namespaced `Api<Pod>` from the shared `kube::Client`,
/// which is cheap to clone.
#[derive(Clone)]
pub struct PodClient {
    client: Client,
}

impl std::fmt::Debug for PodClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PodClient").finish_non_exhaustive()
    }
}

impl PodClient {
    /// Create a new Pod client
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl PodClientTrait for PodClient {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, PodClientError> {
        debug!("Getting pod {}/{}", namespace, name);
        self.pods(namespace)
            .get(name)
            .await
            .map_err(PodClientError::from)
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, PodClientError> {
        let name = pod.metadata.name.as_deref().ok_or_else(|| {
            PodClientError::InvalidRequest("pod has no metadata.name".to_string())
        })?;

        match self.pods(namespace).create(&PostParams::default(), pod).await {
            Ok(created) => {
                info!("Pod created successfully {}/{}", namespace, name);
                Ok(created)
            }
            Err(e) => {
                error!("Error creating pod {}/{}: {}", namespace, name, e);
                Err(PodClientError::from(e))
            }
        }
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), PodClientError> {
        match self.pods(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!("Pod deleted successfully {}/{}", namespace, name);
                Ok(())
            }
            Err(e) => Err(PodClientError::from(e)),
        }
    }

    async fn delete_collection(&self, namespace: &str, label_selector: &str) -> Result<(), PodClientError> {
        let lp = ListParams::default().labels(label_selector);
        match self
            .pods(namespace)
            .delete_collection(&DeleteParams::default(), &lp)
            .await
        {
            Ok(_) => {
                info!("Deleted pods in {} matching '{}'", namespace, label_selector);
                Ok(())
            }
            Err(e) => {
                error!("Error deleting pods in {} matching '{}': {}", namespace, label_selector, e);
                Err(PodClientError::from(e))
            }
        }
    }
}
