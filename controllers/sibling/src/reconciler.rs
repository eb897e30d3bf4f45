//! Reconciliation logic for sibling Pods.
//!
//! The sync function is level-triggered: it never looks at the event that
//! queued a key. It reads the live Pod for the key and decides:
//!
//! - Pod present, not a sibling: create `<name>-sibling`.
//! - Pod absent, not a sibling: delete `<name>-sibling`.
//! - Name carries the sibling suffix: nothing, in either case.
//!
//! Already-exists on create and not-found on delete mean the desired state
//! already holds and end the pass without error.

use crate::error::ControllerError;
use crate::keys::split_meta_namespace_key;
use pod_client::{PodClientError, PodClientTrait, PodTemplate};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Suffix appended to a primary Pod's name to form its sibling's name.
pub const SIBLING_SUFFIX: &str = "-sibling";

/// Whether `name` belongs to a sibling Pod.
pub fn is_sibling(name: &str) -> bool {
    name.contains(SIBLING_SUFFIX)
}

/// Name of the sibling of primary Pod `name`.
pub fn sibling_name(name: &str) -> String {
    format!("{name}{SIBLING_SUFFIX}")
}

/// What a successful sync pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Sibling was created
    SiblingCreated(String),
    /// Sibling was deleted
    SiblingDeleted(String),
    /// Sibling already existed; nothing created
    SiblingAlreadyExists(String),
    /// Sibling was already gone; nothing deleted
    SiblingAlreadyAbsent(String),
    /// Key names a sibling; siblings never get siblings
    IgnoredSibling(String),
}

/// Reconciles primary Pods against their siblings.
pub struct Reconciler {
    client: Arc<dyn PodClientTrait>,
    namespace: String,
    template: PodTemplate,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("namespace", &self.namespace)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler.
    ///
    /// `namespace` is used for keys that carry none.
    pub fn new(client: Arc<dyn PodClientTrait>, namespace: impl Into<String>, template: PodTemplate) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            template,
        }
    }

    /// Runs one sync pass for `key`.
    ///
    /// Errors are for the caller to log; none of them are fatal.
    pub async fn sync(&self, key: &str) -> Result<SyncOutcome, ControllerError> {
        let (namespace, name) = split_meta_namespace_key(key)?;
        let namespace = if namespace.is_empty() {
            self.namespace.as_str()
        } else {
            namespace.as_str()
        };

        debug!("Reconciling Pod {}/{}", namespace, name);

        match self.client.get_pod(namespace, &name).await {
            Err(PodClientError::NotFound(_)) => self.ensure_sibling_absent(namespace, &name).await,
            Err(e) => {
                error!("Error while checking presence of pod {}/{}: {}", namespace, name, e);
                Err(e.into())
            }
            Ok(_) => self.ensure_sibling_present(namespace, &name).await,
        }
    }

    async fn ensure_sibling_absent(&self, namespace: &str, name: &str) -> Result<SyncOutcome, ControllerError> {
        if is_sibling(name) {
            debug!("Pod {}/{} is a sibling, nothing to delete", namespace, name);
            return Ok(SyncOutcome::IgnoredSibling(name.to_string()));
        }

        let sibling = sibling_name(name);
        match self.client.delete_pod(namespace, &sibling).await {
            Ok(()) => {
                info!("Deleted sibling pod {}/{} of removed pod {}", namespace, sibling, name);
                Ok(SyncOutcome::SiblingDeleted(sibling))
            }
            Err(PodClientError::NotFound(_)) => {
                debug!("Sibling pod {}/{} already gone", namespace, sibling);
                Ok(SyncOutcome::SiblingAlreadyAbsent(sibling))
            }
            Err(e) => {
                error!("Error deleting sibling pod {}/{}: {}", namespace, sibling, e);
                Err(e.into())
            }
        }
    }

    async fn ensure_sibling_present(&self, namespace: &str, name: &str) -> Result<SyncOutcome, ControllerError> {
        if is_sibling(name) {
            debug!("Pod {}/{} is a sibling, nothing to create", namespace, name);
            return Ok(SyncOutcome::IgnoredSibling(name.to_string()));
        }

        let sibling = sibling_name(name);
        let pod = self.template.build(&sibling, namespace);
        match self.client.create_pod(namespace, &pod).await {
            Ok(_) => {
                info!("Created sibling pod {}/{} for pod {}", namespace, sibling, name);
                Ok(SyncOutcome::SiblingCreated(sibling))
            }
            Err(PodClientError::AlreadyExists(_)) => {
                info!("Sibling pod {}/{} already exists", namespace, sibling);
                Ok(SyncOutcome::SiblingAlreadyExists(sibling))
            }
            Err(e) => {
                error!("Error creating sibling pod {}/{}: {}", namespace, sibling, e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_pod, create_test_reconciler};
    use pod_client::{MockPodClient, PodCall};

    fn get(name: &str) -> PodCall {
        PodCall::Get { namespace: "default".to_string(), name: name.to_string() }
    }

    #[test]
    fn test_sibling_naming() {
        assert_eq!(sibling_name("7"), "7-sibling");
        assert!(is_sibling("7-sibling"));
        assert!(is_sibling("7-sibling-sibling"));
        assert!(!is_sibling("7"));
        assert!(!is_sibling("sibling"));
    }

    #[tokio::test]
    async fn test_present_primary_creates_sibling() {
        let client = MockPodClient::new();
        client.add_pod(create_test_pod("7", "default"));
        let reconciler = create_test_reconciler(&client);

        let outcome = reconciler.sync("default/7").await.unwrap();

        assert_eq!(outcome, SyncOutcome::SiblingCreated("7-sibling".to_string()));
        assert!(client.contains("default", "7-sibling"));
    }

    #[tokio::test]
    async fn test_created_sibling_uses_template() {
        let client = MockPodClient::new();
        client.add_pod(create_test_pod("7", "default"));
        let reconciler = create_test_reconciler(&client);
        reconciler.sync("default/7").await.unwrap();

        let sibling = client.get_pod("default", "7-sibling").await.unwrap();
        assert_eq!(sibling, PodTemplate::default().build("7-sibling", "default"));
    }

    #[tokio::test]
    async fn test_existing_sibling_is_not_recreated() {
        let client = MockPodClient::new();
        client.add_pod(create_test_pod("7", "default"));
        client.add_pod(create_test_pod("7-sibling", "default"));
        let reconciler = create_test_reconciler(&client);

        let outcome = reconciler.sync("default/7").await.unwrap();

        assert_eq!(outcome, SyncOutcome::SiblingAlreadyExists("7-sibling".to_string()));
        assert_eq!(client.pod_names("default"), vec!["7", "7-sibling"]);
    }

    #[tokio::test]
    async fn test_absent_primary_deletes_sibling() {
        let client = MockPodClient::new();
        client.add_pod(create_test_pod("7-sibling", "default"));
        let reconciler = create_test_reconciler(&client);

        let outcome = reconciler.sync("default/7").await.unwrap();

        assert_eq!(outcome, SyncOutcome::SiblingDeleted("7-sibling".to_string()));
        assert!(client.pod_names("default").is_empty());
    }

    #[tokio::test]
    async fn test_absent_primary_without_sibling_is_noop() {
        let client = MockPodClient::new();
        let reconciler = create_test_reconciler(&client);

        let outcome = reconciler.sync("default/7").await.unwrap();

        assert_eq!(outcome, SyncOutcome::SiblingAlreadyAbsent("7-sibling".to_string()));
    }

    #[tokio::test]
    async fn test_present_sibling_takes_no_action() {
        let client = MockPodClient::new();
        client.add_pod(create_test_pod("7-sibling", "default"));
        let reconciler = create_test_reconciler(&client);

        let outcome = reconciler.sync("default/7-sibling").await.unwrap();

        assert_eq!(outcome, SyncOutcome::IgnoredSibling("7-sibling".to_string()));
        assert_eq!(client.calls(), vec![get("7-sibling")]);
    }

    #[tokio::test]
    async fn test_absent_sibling_takes_no_action() {
        let client = MockPodClient::new();
        let reconciler = create_test_reconciler(&client);

        let outcome = reconciler.sync("default/7-sibling").await.unwrap();

        assert_eq!(outcome, SyncOutcome::IgnoredSibling("7-sibling".to_string()));
        assert_eq!(client.calls(), vec![get("7-sibling")]);
    }

    #[tokio::test]
    async fn test_malformed_key_makes_no_client_calls() {
        let client = MockPodClient::new();
        let reconciler = create_test_reconciler(&client);

        let err = reconciler.sync("").await.unwrap_err();

        assert!(matches!(err, ControllerError::InvalidKey(_)));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_key_without_namespace_uses_default_namespace() {
        let client = MockPodClient::new();
        client.add_pod(create_test_pod("7", "default"));
        let reconciler = create_test_reconciler(&client);

        reconciler.sync("7").await.unwrap();

        assert!(client.contains("default", "7-sibling"));
    }

    #[tokio::test]
    async fn test_lookup_error_stops_pass() {
        let client = MockPodClient::new();
        client.add_pod(create_test_pod("7", "default"));
        client.fail_next("7", 1);
        let reconciler = create_test_reconciler(&client);

        let err = reconciler.sync("default/7").await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(client.calls(), vec![get("7")]);
        assert!(!client.contains("default", "7-sibling"));
    }

    #[tokio::test]
    async fn test_create_error_is_reported() {
        let client = MockPodClient::new();
        client.add_pod(create_test_pod("7", "default"));
        client.fail_next("7-sibling", 1);
        let reconciler = create_test_reconciler(&client);

        let err = reconciler.sync("default/7").await.unwrap_err();

        assert!(err.is_retryable());
        assert!(!client.contains("default", "7-sibling"));
    }

    #[tokio::test]
    async fn test_delete_error_is_reported() {
        let client = MockPodClient::new();
        client.add_pod(create_test_pod("7-sibling", "default"));
        client.fail_next("7-sibling", 1);
        let reconciler = create_test_reconciler(&client);

        let err = reconciler.sync("default/7").await.unwrap_err();

        assert!(err.is_retryable());
        assert!(client.contains("default", "7-sibling"));
    }
}
