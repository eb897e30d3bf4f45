//! Test utilities for unit testing the controller
//!
//! This module provides Pod fixtures, a recording event handler and an
//! in-memory informer.

#[cfg(test)]
use crate::error::ControllerError;
#[cfg(test)]
use crate::keys::meta_namespace_key;
#[cfg(test)]
use crate::reconciler::Reconciler;
#[cfg(test)]
use crate::watcher::{dispatch, HandlerRegistry, Notification, ResourceEventHandler, SharedInformer};
#[cfg(test)]
use k8s_openapi::api::core::v1::Pod;
#[cfg(test)]
use pod_client::{MockPodClient, PodTemplate};
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// Helper to create a managed test Pod
#[cfg(test)]
pub fn create_test_pod(name: &str, namespace: &str) -> Pod {
    PodTemplate::default().build(name, namespace)
}

/// Helper to create a reconciler over a mock client in namespace "default"
#[cfg(test)]
pub fn create_test_reconciler(client: &MockPodClient) -> Reconciler {
    Reconciler::new(Arc::new(client.clone()), "default", PodTemplate::default())
}

/// Handler that records `add:<key>` / `delete:<key>` strings
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingHandler {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ResourceEventHandler<Pod> for RecordingHandler {
    fn on_add(&self, obj: &Pod) {
        self.events.lock().unwrap().push(format!("add:{}", meta_namespace_key(obj)));
    }

    fn on_delete(&self, obj: &Pod) {
        self.events.lock().unwrap().push(format!("delete:{}", meta_namespace_key(obj)));
    }
}

/// In-memory informer driven directly by tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FakeInformer {
    registry: HandlerRegistry<Pod>,
    synced: AtomicBool,
}

#[cfg(test)]
impl FakeInformer {
    /// Deliver an add notification
    pub fn add(&self, pod: &Pod) {
        dispatch(&self.registry.handlers(), &Notification::Added(pod.clone()));
    }

    /// Deliver a delete notification
    pub fn delete(&self, pod: &Pod) {
        dispatch(&self.registry.handlers(), &Notification::Deleted(pod.clone()));
    }

    pub fn set_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::SeqCst);
    }

    /// Make further handler registration fail
    pub fn close_registration(&self) {
        self.registry.seal();
    }

    pub fn handler_count(&self) -> usize {
        self.registry.handlers().len()
    }
}

#[cfg(test)]
impl SharedInformer<Pod> for FakeInformer {
    fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler<Pod>>) -> Result<(), ControllerError> {
        self.registry.register(handler)
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }
}
