//! Controller configuration.
//!
//! All settings come from environment variables; see [`Config::from_env`].

use crate::backoff::FibonacciBackoff;
use crate::controller::WorkerSettings;
use crate::error::ControllerError;
use crate::load_generator::LoadGeneratorSettings;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use kube_runtime::watcher;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Runtime configuration for the controller process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Explicit kubeconfig file; inferred when unset
    pub kubeconfig: Option<PathBuf>,
    /// Namespace watched and written
    pub namespace: String,
    /// Optional label selector for the Pod informer
    pub label_selector: Option<String>,
    /// Worker loop settings
    pub worker: WorkerSettings,
    /// Demo load generator settings; `None` when disabled
    pub load_generator: Option<LoadGeneratorSettings>,
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ControllerError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            ControllerError::InvalidConfig(format!("{key} has invalid value {raw:?}"))
        }),
    }
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration, ControllerError> {
    parse(lookup, key, default).map(Duration::from_secs)
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns the raw value of
    /// a variable if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let namespace = lookup("WATCH_NAMESPACE")
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| "default".to_string());

        let backoff = FibonacciBackoff::new(
            parse_secs(&lookup, "RETRY_BACKOFF_MIN_SECS", 1)?,
            parse_secs(&lookup, "RETRY_BACKOFF_MAX_SECS", 30)?,
        );
        let worker = WorkerSettings {
            interval: parse_secs(&lookup, "WORKER_INTERVAL_SECS", 2)?,
            max_retries: parse(&lookup, "MAX_RETRIES", 0)?,
            backoff,
        };

        let load_generator = if parse(&lookup, "LOAD_GENERATOR_ENABLED", false)? {
            let threshold: u32 = parse(&lookup, "LOAD_GENERATOR_THRESHOLD", 10)?;
            if threshold == 0 {
                return Err(ControllerError::InvalidConfig(
                    "LOAD_GENERATOR_THRESHOLD must be at least 1".to_string(),
                ));
            }
            Some(LoadGeneratorSettings {
                namespace: namespace.clone(),
                create_interval: parse_secs(&lookup, "LOAD_GENERATOR_CREATE_INTERVAL_SECS", 1)?,
                delete_interval: parse_secs(&lookup, "LOAD_GENERATOR_DELETE_INTERVAL_SECS", 10)?,
                threshold,
                cleanup_on_exit: parse(&lookup, "CLEANUP_ON_EXIT", false)?,
            })
        } else {
            None
        };

        Ok(Self {
            kubeconfig: lookup("KUBECONFIG_PATH").filter(|p| !p.is_empty()).map(PathBuf::from),
            namespace,
            label_selector: lookup("WATCH_LABEL_SELECTOR").filter(|s| !s.is_empty()),
            worker,
            load_generator,
        })
    }

    /// Watch configuration for the Pod informer.
    pub fn watcher_config(&self) -> watcher::Config {
        match &self.label_selector {
            Some(selector) => watcher::Config::default().labels(selector),
            None => watcher::Config::default(),
        }
    }

    /// Builds a Kubernetes client from the explicit kubeconfig, or infers
    /// one (in-cluster or default kubeconfig) when none is set.
    pub async fn kube_client(&self) -> Result<Client, ControllerError> {
        match &self.kubeconfig {
            Some(path) => {
                info!("Loading kubeconfig from {}", path.display());
                let kubeconfig = Kubeconfig::read_from(path)?;
                let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
                Ok(Client::try_from(config)?)
            }
            None => Ok(Client::try_default().await?),
        }
    }

    /// Logs the effective configuration.
    pub fn log(&self) {
        info!("Configuration:");
        info!(
            "  Kubeconfig: {}",
            self.kubeconfig
                .as_ref()
                .map_or_else(|| "inferred".to_string(), |p| p.display().to_string())
        );
        info!("  Namespace: {}", self.namespace);
        info!("  Label selector: {}", self.label_selector.as_deref().unwrap_or("none"));
        info!("  Worker interval: {:?}", self.worker.interval);
        info!("  Max retries: {}", self.worker.max_retries);
        info!("  Load generator: {}", if self.load_generator.is_some() { "enabled" } else { "disabled" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.kubeconfig, None);
        assert_eq!(config.namespace, "default");
        assert_eq!(config.label_selector, None);
        assert_eq!(config.worker, WorkerSettings::default());
        assert_eq!(config.load_generator, None);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("KUBECONFIG_PATH", "/tmp/kubeconfig"),
            ("WATCH_NAMESPACE", "demo"),
            ("WATCH_LABEL_SELECTOR", "app=test"),
            ("WORKER_INTERVAL_SECS", "0"),
            ("MAX_RETRIES", "3"),
        ])
        .unwrap();

        assert_eq!(config.kubeconfig, Some(PathBuf::from("/tmp/kubeconfig")));
        assert_eq!(config.namespace, "demo");
        assert_eq!(config.label_selector.as_deref(), Some("app=test"));
        assert_eq!(config.worker.interval, Duration::ZERO);
        assert_eq!(config.worker.max_retries, 3);
    }

    #[test]
    fn test_load_generator_settings() {
        let config = config_from(&[
            ("WATCH_NAMESPACE", "demo"),
            ("LOAD_GENERATOR_ENABLED", "true"),
            ("LOAD_GENERATOR_THRESHOLD", "3"),
            ("CLEANUP_ON_EXIT", "true"),
        ])
        .unwrap();

        let settings = config.load_generator.unwrap();
        assert_eq!(settings.namespace, "demo");
        assert_eq!(settings.threshold, 3);
        assert_eq!(settings.create_interval, Duration::from_secs(1));
        assert_eq!(settings.delete_interval, Duration::from_secs(10));
        assert!(settings.cleanup_on_exit);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = config_from(&[("MAX_RETRIES", "lots")]).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }

    #[test]
    fn test_zero_threshold_is_rejected() {
        let err = config_from(&[
            ("LOAD_GENERATOR_ENABLED", "true"),
            ("LOAD_GENERATOR_THRESHOLD", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }

    #[test]
    fn test_namespace_is_trimmed() {
        assert_eq!(config_from(&[("WATCH_NAMESPACE", " demo ")]).unwrap().namespace, "demo");
        assert_eq!(config_from(&[("WATCH_NAMESPACE", "   ")]).unwrap().namespace, "default");
    }
}
