//! Fixed template for pods created by the sibling controller and the
//! load generator.

use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Label key marking a pod as managed.
pub const MANAGED_LABEL_KEY: &str = "app";

/// Label value marking a pod as managed.
pub const MANAGED_LABEL_VALUE: &str = "test";

/// Single-container, long-running pod template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodTemplate {
    /// Container name
    pub container_name: String,
    /// Container image
    pub image: String,
    /// Container command
    pub command: Vec<String>,
}

impl Default for PodTemplate {
    fn default() -> Self {
        Self {
            container_name: "test-container".to_string(),
            image: "ubuntu".to_string(),
            command: vec!["sleep".to_string(), "1d".to_string()],
        }
    }
}

impl PodTemplate {
    /// Build a pod named `name` in `namespace` carrying the managed label.
    #[must_use]
    pub fn build(&self, name: &str, namespace: &str) -> Pod {
        let labels = BTreeMap::from([(
            MANAGED_LABEL_KEY.to_string(),
            MANAGED_LABEL_VALUE.to_string(),
        )]);

        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: self.container_name.clone(),
                    image: Some(self.image.clone()),
                    command: Some(self.command.clone()),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            status: None,
        }
    }
}
