//! Pod client errors

use thiserror::Error;

/// Errors that can occur when talking to the Pod API
#[derive(Debug, Error)]
pub enum PodClientError {
    /// The pod does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A pod with the same name already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Any other Kubernetes API or transport error
    #[error("Kubernetes error: {0}")]
    Kube(kube::Error),

    /// Invalid request (e.g., pod without a name)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl PodClientError {
    /// Returns true for errors that may succeed if the call is repeated.
    ///
    /// API responses qualify only for throttling (429) and server errors
    /// (5xx); transport and service errors always qualify.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Kube(kube::Error::Api(response)) => response.code == 429 || response.code >= 500,
            Self::Kube(_) => true,
            _ => false,
        }
    }
}

impl From<kube::Error> for PodClientError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref response) if response.code == 404 => {
                Self::NotFound(response.message.clone())
            }
            kube::Error::Api(ref response) if response.code == 409 => {
                Self::AlreadyExists(response.message.clone())
            }
            other => Self::Kube(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    #[test]
    fn test_is_transient() {
        assert!(!PodClientError::NotFound("pods \"7\" not found".to_string()).is_transient());
        assert!(!PodClientError::AlreadyExists("pods \"7-sibling\" already exists".to_string()).is_transient());
        assert!(!PodClientError::InvalidRequest("pod has no name".to_string()).is_transient());
    }

    fn api_error(code: u16, reason: &str) -> PodClientError {
        PodClientError::from(kube::Error::Api(
            ErrorResponse {
                status: "Failure".to_string(),
                message: format!("request failed with {code}"),
                reason: reason.to_string(),
                code,
            }
            .into(),
        ))
    }

    #[test]
    fn test_api_status_codes_map_to_variants() {
        assert!(matches!(api_error(404, "NotFound"), PodClientError::NotFound(_)));
        assert!(matches!(api_error(409, "AlreadyExists"), PodClientError::AlreadyExists(_)));
    }

    #[test]
    fn test_client_side_api_errors_are_not_transient() {
        assert!(!api_error(400, "BadRequest").is_transient());
        assert!(!api_error(403, "Forbidden").is_transient());
        assert!(!api_error(422, "Invalid").is_transient());
    }

    #[test]
    fn test_throttling_and_server_errors_are_transient() {
        assert!(api_error(429, "TooManyRequests").is_transient());
        assert!(api_error(503, "ServiceUnavailable").is_transient());
        assert!(api_error(500, "InternalError").is_transient());
    }

    #[test]
    fn test_service_error_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(PodClientError::Kube(kube::Error::Service(Box::new(io))).is_transient());
    }
}
