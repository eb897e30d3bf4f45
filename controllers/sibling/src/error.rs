//! Controller-specific error types.
//!
//! This module defines error types specific to the Sibling Controller
//! that are not covered by upstream library errors.

use kube::config::KubeconfigError;
use kube::Error as KubeError;
use pod_client::PodClientError;
use thiserror::Error;

/// Errors that can occur in the Sibling Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Kubeconfig could not be loaded
    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] KubeconfigError),

    /// Pod API error
    #[error("Pod client error: {0}")]
    PodClient(#[from] PodClientError),

    /// Queue key could not be split into namespace and name
    #[error("Invalid resource key: {0}")]
    InvalidKey(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Watch stream failure
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Event handler could not be registered on the informer
    #[error("Event handler registration failed: {0}")]
    HandlerRegistration(String),
}

impl ControllerError {
    /// Whether repeating the pass could succeed.
    ///
    /// Only transient Pod API failures qualify.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PodClient(e) => e.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_key_is_not_retryable() {
        assert!(!ControllerError::InvalidKey("a/b/c".to_string()).is_retryable());
    }

    #[test]
    fn test_not_found_is_not_retryable() {
        let err = ControllerError::from(PodClientError::NotFound("7".to_string()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transient_client_error_is_retryable() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout");
        let err = ControllerError::from(PodClientError::Kube(KubeError::Service(Box::new(io))));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_forbidden_api_error_is_not_retryable() {
        let response = kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "pods is forbidden".to_string(),
            reason: "Forbidden".to_string(),
            code: 403,
        };
        let err = ControllerError::from(PodClientError::from(KubeError::Api(response.into())));
        assert!(!err.is_retryable());
    }
}
