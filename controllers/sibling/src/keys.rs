//! Reconcile keys.
//!
//! A key is `<namespace>/<name>`, or just `<name>` for objects without a
//! namespace. It is derived from object metadata only.

use crate::error::ControllerError;
use kube::Resource;

/// Derive the queue key of an object.
///
/// Never fails; an object without a name yields a key that
/// [`split_meta_namespace_key`] rejects.
pub fn meta_namespace_key<K: Resource>(obj: &K) -> String {
    let meta = obj.meta();
    let name = meta.name.as_deref().unwrap_or_default();
    match meta.namespace.as_deref() {
        Some(ns) if !ns.is_empty() => format!("{ns}/{name}"),
        _ => name.to_string(),
    }
}

/// Split a key into `(namespace, name)`. The namespace is empty for
/// namespace-less keys.
pub fn split_meta_namespace_key(key: &str) -> Result<(String, String), ControllerError> {
    let parts: Vec<&str> = key.split('/').collect();
    let (namespace, name) = match parts.as_slice() {
        [name] => ("", *name),
        [namespace, name] => (*namespace, *name),
        _ => {
            return Err(ControllerError::InvalidKey(format!(
                "unexpected key format: {key:?}"
            )))
        }
    };
    if name.is_empty() {
        return Err(ControllerError::InvalidKey(format!("key has no name: {key:?}")));
    }
    Ok((namespace.to_string(), name.to_string()))
}
