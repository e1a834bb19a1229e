//! OperationRegistry: static mapping from tag to operation.

use std::collections::HashMap;

use tracing::{info, warn};
use unistate_protocol::is_private_tag;

use crate::builtins::{Assign, Axpy, Broken};
use crate::operation::{Operation, OperationDyn};

/// Outcome of looking up a tag.
///
/// Unknown and private tags are first-class results, not lookup misses, so
/// the router decides what each of them means.
pub enum Resolution<'r> {
    Found(&'r dyn OperationDyn),
    Forbidden,
    NotFound,
}

/// Every operation a router can dispatch to, keyed by tag.
///
/// Built once at startup and shared read-only (behind an `Arc`) by all
/// connections. Holds no per-connection data.
#[derive(Default)]
pub struct OperationRegistry {
    operations: HashMap<&'static str, Box<dyn OperationDyn>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `assign`, `axpy` and `broken` registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Assign);
        registry.register(Axpy);
        registry.register(Broken);
        registry
    }

    /// Register an operation under its tag, replacing any previous one.
    ///
    /// Operations with a private tag are refused: they could never be
    /// dispatched.
    pub fn register<O: Operation>(&mut self, operation: O) -> &mut Self {
        let tag = operation.tag();
        if is_private_tag(tag) {
            warn!("Refusing to register private operation: {tag}");
            return self;
        }
        if self.operations.insert(tag, Box::new(operation)).is_some() {
            warn!("Operation replaced: {tag}");
        } else {
            info!("Registering operation: {tag}");
        }
        self
    }

    /// Resolve a tag. Private tags are forbidden even if something with that
    /// name exists.
    pub fn resolve(&self, tag: &str) -> Resolution<'_> {
        if is_private_tag(tag) {
            return Resolution::Forbidden;
        }
        match self.operations.get(tag) {
            Some(operation) => Resolution::Found(operation.as_ref()),
            None => Resolution::NotFound,
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.operations.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.operations.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
