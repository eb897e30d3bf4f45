//! Sibling Controller
//!
//! Keeps exactly one `<name>-sibling` Pod for every Pod in the watched
//! namespace:
//! - Pod added: its sibling is created
//! - Pod deleted: its sibling is deleted
//! - Siblings never get siblings of their own
//!
//! Optionally runs a load generator that creates and deletes Pods to exercise
//! the controller.

mod backoff;
mod config;
mod controller;
mod error;
mod keys;
mod load_generator;
mod reconciler;
mod watcher;
mod work_queue;

#[cfg(test)]
mod test_utils;

use crate::config::Config;
use crate::controller::Controller;
use crate::error::ControllerError;
use crate::load_generator::LoadGenerator;
use crate::reconciler::Reconciler;
use crate::watcher::Informer;
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use pod_client::{PodClient, PodClientTrait, PodTemplate};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Cancels `shutdown` on SIGINT or SIGTERM.
async fn shutdown_on_signal(shutdown: CancellationToken) {
    let sigterm = async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        }
        #[cfg(not(unix))]
        std::future::pending::<()>().await;
    };

    tokio::select! {
        () = shutdown.cancelled() => return,
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for SIGINT: {}", e);
            }
            info!("Received SIGINT, initiating graceful shutdown");
        }
        () = sigterm => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube's rustls stack needs a process-wide crypto provider
    rustls::crypto::ring::default_provider().install_default().ok();

    info!("Starting Sibling Controller");

    let config = Config::from_env()?;
    config.log();

    let client = config.kube_client().await?;
    let pod_client: Arc<dyn PodClientTrait> = Arc::new(PodClient::new(client.clone()));

    let pods = Api::<Pod>::namespaced(client, &config.namespace);
    let watcher_config = config.watcher_config();
    let informer = Arc::new(Informer::<Pod>::default());
    let reconciler = Reconciler::new(pod_client.clone(), config.namespace.clone(), PodTemplate::default());
    let controller = Controller::new(reconciler, informer.clone(), config.worker)?;

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let informer_token = shutdown.clone();
    let informer_task = tokio::spawn(async move {
        let result = informer.run(pods, watcher_config, informer_token.clone()).await;
        if let Err(e) = &result {
            error!("Pod informer stopped: {}", e);
            informer_token.cancel();
        }
        result
    });

    let generator_task = config.load_generator.clone().map(|settings| {
        let generator = LoadGenerator::new(pod_client.clone(), settings, PodTemplate::default());
        let token = shutdown.clone();
        tokio::spawn(async move { generator.run(token).await })
    });

    controller.run(shutdown.clone()).await;
    shutdown.cancel();

    if let Some(task) = generator_task {
        if let Err(e) = task.await {
            error!("Load generator task failed: {}", e);
        }
    }
    let informer_result = match informer_task.await {
        Ok(result) => result,
        Err(e) => Err(ControllerError::Watch(format!("informer task failed: {e}"))),
    };
    signals.abort();

    info!("Sibling Controller stopped");
    informer_result
}
