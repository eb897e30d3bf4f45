//! PodClient trait for mocking
//!
//! This trait abstracts the Pod API so the reconciler can be unit tested.
//! The concrete [`PodClient`](crate::PodClient) implements it against a live
//! cluster, tests use [`MockPodClient`](crate::MockPodClient).

use crate::error::PodClientError;
use k8s_openapi::api::core::v1::Pod;

/// Trait for Pod API operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait PodClientTrait: Send + Sync {
    /// Fetch a single pod by name.
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, PodClientError>;

    /// Create a pod. Fails with `AlreadyExists` if the name is taken.
    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, PodClientError>;

    /// Delete a pod by name. Fails with `NotFound` if it does not exist.
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), PodClientError>;

    /// Delete every pod matching a label selector.
    async fn delete_collection(&self, namespace: &str, label_selector: &str) -> Result<(), PodClientError>;
}
