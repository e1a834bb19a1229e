//! Connection state: the key/value store owned by one router.

use std::collections::HashMap;

use serde_json::Value;

/// Mutable state scoped to a single connection.
///
/// Created empty when the connection opens and dropped with it. Only
/// operations running on that connection's router can reach it, so there is
/// no locking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionState {
    values: HashMap<String, Value>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set `key` to `value`, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
