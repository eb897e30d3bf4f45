//! Kubernetes resource watchers.
//!
//! An [`Informer`] drives a `kube_runtime` watch stream, keeps a local
//! mirror of the watched objects and turns raw watch events into typed
//! add/delete notifications for registered [`ResourceEventHandler`]s.
//! Updates to objects already in the mirror are not forwarded.
//!
//! The mirror counts as synced once the initial listing has been consumed;
//! [`wait_for_cache_sync`] gates consumers on that.

use crate::error::ControllerError;
use crate::keys::meta_namespace_key;
use futures::{Stream, TryStreamExt};
use kube::{Api, Resource};
use kube_runtime::{watcher, WatchStreamExt};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often [`wait_for_cache_sync`] re-checks the sync predicate.
pub const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Receives notifications for one resource type.
pub trait ResourceEventHandler<K>: Send + Sync {
    /// An object appeared.
    fn on_add(&self, obj: &K);
    /// An object disappeared.
    fn on_delete(&self, obj: &K);
}

/// The part of an informer the controller depends on.
pub trait SharedInformer<K>: Send + Sync {
    /// Registers a handler for add/delete notifications.
    fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler<K>>) -> Result<(), ControllerError>;

    /// Whether the initial listing has been delivered.
    fn has_synced(&self) -> bool;
}

/// A typed add/delete notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification<K> {
    /// Object was not in the mirror before.
    Added(K),
    /// Object was removed, or vanished across a re-list.
    Deleted(K),
}

/// Local mirror of the watched objects, keyed by reconcile key.
#[derive(Debug)]
pub struct Mirror<K> {
    objects: HashMap<String, K>,
    // Keys seen since the last `Init`, while a (re-)list is in progress
    relist: Option<HashSet<String>>,
    synced: bool,
}

impl<K> Default for Mirror<K> {
    fn default() -> Self {
        Self {
            objects: HashMap::new(),
            relist: None,
            synced: false,
        }
    }
}

impl<K: Resource + Clone> Mirror<K> {
    /// Applies one watch event and returns the notifications it produces.
    pub fn apply(&mut self, event: watcher::Event<K>) -> Vec<Notification<K>> {
        match event {
            watcher::Event::Init => {
                debug!("Watch (re-)list started");
                self.relist = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                let key = meta_namespace_key(&obj);
                if let Some(seen) = self.relist.as_mut() {
                    seen.insert(key.clone());
                }
                self.upsert(key, obj).into_iter().collect()
            }
            watcher::Event::InitDone => {
                let seen = self.relist.take().unwrap_or_default();
                let gone: Vec<String> = self
                    .objects
                    .keys()
                    .filter(|key| !seen.contains(*key))
                    .cloned()
                    .collect();
                self.synced = true;
                gone.iter()
                    .filter_map(|key| self.objects.remove(key))
                    .map(Notification::Deleted)
                    .collect()
            }
            watcher::Event::Apply(obj) => {
                let key = meta_namespace_key(&obj);
                self.upsert(key, obj).into_iter().collect()
            }
            watcher::Event::Delete(obj) => {
                self.objects.remove(&meta_namespace_key(&obj));
                vec![Notification::Deleted(obj)]
            }
        }
    }

    fn upsert(&mut self, key: String, obj: K) -> Option<Notification<K>> {
        match self.objects.insert(key, obj.clone()) {
            None => Some(Notification::Added(obj)),
            Some(_) => {
                debug!("Ignoring update for {}", meta_namespace_key(&obj));
                None
            }
        }
    }

    /// Whether the initial listing has completed.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Number of mirrored objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the mirror is empty.
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Handlers registered on an informer. Registration closes once the
/// informer starts.
pub struct HandlerRegistry<K> {
    handlers: Mutex<Vec<Arc<dyn ResourceEventHandler<K>>>>,
    sealed: AtomicBool,
}

impl<K> Default for HandlerRegistry<K> {
    fn default() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            sealed: AtomicBool::new(false),
        }
    }
}

impl<K> Debug for HandlerRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers().len())
            .field("sealed", &self.sealed.load(Ordering::SeqCst))
            .finish()
    }
}

impl<K> HandlerRegistry<K> {
    /// Adds a handler unless registration is closed.
    pub fn register(&self, handler: Arc<dyn ResourceEventHandler<K>>) -> Result<(), ControllerError> {
        if self.sealed.load(Ordering::SeqCst) {
            return Err(ControllerError::HandlerRegistration(
                "informer has already started".to_string(),
            ));
        }
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
        Ok(())
    }

    /// Closes registration and returns the registered handlers.
    pub fn seal(&self) -> Vec<Arc<dyn ResourceEventHandler<K>>> {
        self.sealed.store(true, Ordering::SeqCst);
        self.handlers()
    }

    /// Snapshot of the registered handlers.
    pub fn handlers(&self) -> Vec<Arc<dyn ResourceEventHandler<K>>> {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Delivers a notification to every handler.
pub fn dispatch<K>(handlers: &[Arc<dyn ResourceEventHandler<K>>], notification: &Notification<K>) {
    for handler in handlers {
        match notification {
            Notification::Added(obj) => handler.on_add(obj),
            Notification::Deleted(obj) => handler.on_delete(obj),
        }
    }
}

/// Watches one resource type and notifies registered handlers.
pub struct Informer<K> {
    registry: HandlerRegistry<K>,
    synced: AtomicBool,
}

impl<K> Default for Informer<K> {
    fn default() -> Self {
        Self {
            registry: HandlerRegistry::default(),
            synced: AtomicBool::new(false),
        }
    }
}

impl<K> Debug for Informer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Informer")
            .field("registry", &self.registry)
            .field("synced", &self.synced.load(Ordering::SeqCst))
            .finish()
    }
}

impl<K> Informer<K>
where
    K: Resource + Clone + Debug,
    K::DynamicType: Default,
{
    fn kind() -> String {
        K::kind(&K::DynamicType::default()).to_string()
    }

    /// Watches `api` until `shutdown` is cancelled.
    ///
    /// Watch errors are logged and retried with the default backoff; the
    /// call only fails if the stream ends on its own.
    pub async fn run(&self, api: Api<K>, config: watcher::Config, shutdown: CancellationToken) -> Result<(), ControllerError>
    where
        K: Send + Sync + 'static + DeserializeOwned,
        K::DynamicType: Eq + Hash + Clone + Debug + Unpin,
    {
        self.run_stream(watcher(api, config).default_backoff(), shutdown).await
    }

    /// Consumes watch events from `events` until `shutdown` is cancelled.
    ///
    /// Closes handler registration first. `has_synced` turns true only
    /// after the notifications of the initial listing were dispatched.
    pub async fn run_stream<S>(&self, events: S, shutdown: CancellationToken) -> Result<(), ControllerError>
    where
        S: Stream<Item = Result<watcher::Event<K>, watcher::Error>>,
    {
        let kind = Self::kind();
        let handlers = self.registry.seal();
        info!("Starting {} informer with {} handler(s)", kind, handlers.len());

        let mut mirror = Mirror::<K>::default();
        let mut events = pin!(events);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("Stopping {} informer", kind);
                    return Ok(());
                }
                event = events.try_next() => match event {
                    Ok(Some(event)) => {
                        for notification in mirror.apply(event) {
                            dispatch(&handlers, &notification);
                        }
                        if mirror.is_synced() && !self.synced.swap(true, Ordering::SeqCst) {
                            info!("{} informer cache synced ({} objects)", kind, mirror.len());
                        }
                    }
                    Ok(None) => {
                        return Err(ControllerError::Watch(format!("{kind} watch stream ended")));
                    }
                    Err(e) => {
                        warn!("{} watch stream error, retrying: {}", kind, e);
                    }
                },
            }
        }
    }
}

impl<K> SharedInformer<K> for Informer<K>
where
    K: Resource + Send + Sync,
{
    fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler<K>>) -> Result<(), ControllerError> {
        self.registry.register(handler)
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }
}

/// Waits until `synced` returns true, polling every [`SYNC_POLL_INTERVAL`].
///
/// Returns false if `shutdown` is cancelled first.
pub async fn wait_for_cache_sync<F>(shutdown: &CancellationToken, synced: F) -> bool
where
    F: Fn() -> bool,
{
    let mut ticker = tokio::time::interval(SYNC_POLL_INTERVAL);
    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => return false,
            _ = ticker.tick() => {
                if synced() {
                    return true;
                }
            }
        }
    }
}
