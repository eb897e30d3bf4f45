//! Kubernetes Pod Client
//!
//! A thin client over the Kubernetes Pod API used by the sibling controller.
//! The controller only ever talks to the cluster through [`PodClientTrait`],
//! so reconciliation can be unit tested against `MockPodClient`, available
//! with the `test-util` feature.
//!
//! # Example
//!
//! ```no_run
//! use pod_client::{PodClient, PodClientTrait, PodTemplate};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PodClient::new(kube::Client::try_default().await?);
//!
//! // Create a managed pod from the fixed template
//! let pod = PodTemplate::default().build("7", "default");
//! client.create_pod("default", &pod).await?;
//!
//! // Look it up again
//! let live = client.get_pod("default", "7").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod template;
#[path = "trait.rs"]
pub mod pod_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::PodClient;
pub use error::PodClientError;
pub use pod_trait::PodClientTrait;
pub use template::{PodTemplate, MANAGED_LABEL_KEY, MANAGED_LABEL_VALUE};
#[cfg(feature = "test-util")]
pub use mock::{MockPodClient, PodCall};
