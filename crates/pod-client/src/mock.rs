//! Mock PodClient for unit testing
//!
//! Stores pods in memory, records every call, and can be told to fail the
//! next calls touching a given pod name with a transient error.

use crate::error::PodClientError;
use crate::pod_trait::PodClientTrait;
use k8s_openapi::api::core::v1::Pod;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// A call received by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodCall {
    /// `get_pod`
    Get { namespace: String, name: String },
    /// `create_pod`
    Create { namespace: String, name: String },
    /// `delete_pod`
    Delete { namespace: String, name: String },
    /// `delete_collection`
    DeleteCollection { namespace: String, label_selector: String },
}

/// Mock PodClient for testing
#[derive(Clone, Default)]
pub struct MockPodClient {
    pub(crate) pods: Arc<Mutex<BTreeMap<(String, String), Pod>>>,
    pub(crate) calls: Arc<Mutex<Vec<PodCall>>>,
    // pod name -> number of upcoming calls that fail
    pub(crate) failures: Arc<Mutex<HashMap<String, u32>>>,
}

impl std::fmt::Debug for MockPodClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPodClient")
            .field("pods", &self.pod_names_all())
            .finish_non_exhaustive()
    }
}

impl MockPodClient {
    /// Create an empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pod to the mock store (for test setup)
    pub fn add_pod(&self, pod: Pod) {
        let namespace = pod.metadata.namespace.clone().unwrap_or_default();
        let name = pod.metadata.name.clone().unwrap_or_default();
        self.pods.lock().unwrap().insert((namespace, name), pod);
    }

    /// Remove a pod from the mock store without recording a call
    pub fn remove_pod(&self, namespace: &str, name: &str) {
        self.pods
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
    }

    /// Whether a pod exists in the store
    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.pods
            .lock()
            .unwrap()
            .contains_key(&(namespace.to_string(), name.to_string()))
    }

    /// Sorted pod names in a namespace
    pub fn pod_names(&self, namespace: &str) -> Vec<String> {
        self.pods
            .lock()
            .unwrap()
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    fn pod_names_all(&self) -> Vec<(String, String)> {
        self.pods.lock().unwrap().keys().cloned().collect()
    }

    /// All calls received so far
    pub fn calls(&self) -> Vec<PodCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Make the next `times` calls touching `name` fail with a transient error
    pub fn fail_next(&self, name: &str, times: u32) {
        self.failures.lock().unwrap().insert(name.to_string(), times);
    }

    fn record(&self, call: PodCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn injected_failure(&self, name: &str) -> Option<PodClientError> {
        let mut failures = self.failures.lock().unwrap();
        let remaining = failures.get_mut(name)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        let io = std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            format!("injected failure for {name}"),
        );
        Some(PodClientError::Kube(kube::Error::Service(Box::new(io))))
    }
}

fn matches_selector(pod: &Pod, selector: &str) -> bool {
    let labels = pod.metadata.labels.clone().unwrap_or_default();
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.get(key).map(String::as_str) == Some(value),
            None => labels.contains_key(term),
        })
}

#[async_trait::async_trait]
impl PodClientTrait for MockPodClient {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, PodClientError> {
        self.record(PodCall::Get {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        if let Some(err) = self.injected_failure(name) {
            return Err(err);
        }
        self.pods
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| PodClientError::NotFound(format!("pods \"{name}\" not found")))
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, PodClientError> {
        let name = pod
            .metadata
            .name
            .clone()
            .ok_or_else(|| PodClientError::InvalidRequest("pod has no metadata.name".to_string()))?;
        self.record(PodCall::Create {
            namespace: namespace.to_string(),
            name: name.clone(),
        });
        if let Some(err) = self.injected_failure(&name) {
            return Err(err);
        }
        let mut pods = self.pods.lock().unwrap();
        let key = (namespace.to_string(), name.clone());
        if pods.contains_key(&key) {
            return Err(PodClientError::AlreadyExists(format!("pods \"{name}\" already exists")));
        }
        let mut stored = pod.clone();
        stored.metadata.namespace = Some(namespace.to_string());
        pods.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), PodClientError> {
        self.record(PodCall::Delete {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        if let Some(err) = self.injected_failure(name) {
            return Err(err);
        }
        self.pods
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| PodClientError::NotFound(format!("pods \"{name}\" not found")))
    }

    async fn delete_collection(&self, namespace: &str, label_selector: &str) -> Result<(), PodClientError> {
        self.record(PodCall::DeleteCollection {
            namespace: namespace.to_string(),
            label_selector: label_selector.to_string(),
        });
        self.pods
            .lock()
            .unwrap()
            .retain(|(ns, _), pod| ns != namespace || !matches_selector(pod, label_selector));
        Ok(())
    }
}
