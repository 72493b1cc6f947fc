//! # Namespace Service
//!
//! This crate is the adapter seam to the external name directory.
//!
//! ## Philosophy
//!
//! The directory itself is an external collaborator; the core only needs
//! two contracts from it: resolve a name to a sealed handle, and insert a
//! sealed handle under a name. [`NamespaceDirectory`] captures exactly
//! that, and [`InMemoryNamespace`] implements it for tests and co-located
//! deployments. Entry deletion policy belongs to the directory layer, not
//! to coport close.

use coport_types::CoportHandle;
use std::collections::HashMap;
use thiserror::Error;

/// Maximum endpoint name length in bytes
pub const MAX_NAME_LEN: usize = 255;

/// Error types for namespace operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NamespaceError {
    /// The name is already bound; callers racing on `open` treat this as
    /// success and re-resolve
    #[error("Name already bound: {0}")]
    AlreadyExists(String),
    /// The name is not bound
    #[error("Name not bound: {0}")]
    NotFound(String),
}

/// Name → sealed-handle directory contract
pub trait NamespaceDirectory: Send {
    /// Resolves a name to its sealed handle
    fn resolve(&self, name: &str) -> Option<CoportHandle>;

    /// Binds a name to a sealed handle
    ///
    /// Fails with [`NamespaceError::AlreadyExists`] if the name is bound,
    /// which is the race-safe signal concurrent creators rely on.
    fn insert(&mut self, name: &str, handle: CoportHandle) -> Result<(), NamespaceError>;

    /// Removes a binding, returning the handle it held
    fn remove(&mut self, name: &str) -> Result<CoportHandle, NamespaceError>;

    /// Returns the number of bindings
    fn count(&self) -> usize;
}

/// In-memory directory implementation
#[derive(Debug, Default)]
pub struct InMemoryNamespace {
    entries: HashMap<String, CoportHandle>,
}

impl InMemoryNamespace {
    /// Creates an empty namespace
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl NamespaceDirectory for InMemoryNamespace {
    fn resolve(&self, name: &str) -> Option<CoportHandle> {
        self.entries.get(name).copied()
    }

    fn insert(&mut self, name: &str, handle: CoportHandle) -> Result<(), NamespaceError> {
        if self.entries.contains_key(name) {
            return Err(NamespaceError::AlreadyExists(name.to_string()));
        }
        self.entries.insert(name.to_string(), handle);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<CoportHandle, NamespaceError> {
        self.entries
            .remove(name)
            .ok_or_else(|| NamespaceError::NotFound(name.to_string()))
    }

    fn count(&self) -> usize {
        self.entries.len()
    }
}
