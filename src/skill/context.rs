//! Process-wide execution context shared across skill invocations.
//!
//! The context is a plain key/value store created empty at process start
//! and never reset. Skills persist cross-invocation state (such as the
//! last execution result) under namespaced keys built with
//! [`namespaced`]. The dispatcher executes strictly sequentially, so no
//! locking discipline is required.

use std::collections::HashMap;

use serde_json::Value;

/// Builds the conventional namespaced context key for a skill field:
/// `skill:<name>:<field>`.
#[must_use]
pub fn namespaced(skill: &str, field: &str) -> String {
    format!("skill:{skill}:{field}")
}

/// Key/value store passed by mutable reference into every invocation.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    data: HashMap<String, Value>,
}

impl ExecutionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, replacing any previous value for `key`.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        tracing::trace!(key = %key, "context set");
        self.data.insert(key, value);
    }

    /// Retrieves a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns whether `key` is present.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Removes and returns the value for `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Returns all keys in arbitrary order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.data.keys().map(String::as_str).collect()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether the context is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
