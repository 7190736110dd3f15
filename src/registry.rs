//! Method registry: string names to index constructors.
//!
//! Indices are built through a registry so that callers can pick a method by
//! name at run time (from a CLI flag or a config file) without linking
//! against concrete index types. [`standard_registry`] carries every built-in
//! method; [`MethodRegistry::register`] adds custom ones.

use crate::dataset::Dataset;
use crate::error::{ProximaError, Result};
use crate::index::{perm_index, seq_search, small_world, traits::Index, vptree};
use crate::params::AnyParams;
use crate::space::Space;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Constructor signature every registered method provides.
pub type IndexConstructor =
    fn(bool, Arc<dyn Space>, Arc<Dataset>, &AnyParams) -> Result<Box<dyn Index>>;

/// Name-to-constructor table for index methods.
#[derive(Default)]
pub struct MethodRegistry {
    constructors: HashMap<String, IndexConstructor>,
}

impl MethodRegistry {
    /// An empty registry with no methods.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `name`. Fails with `DuplicateMethod` if
    /// the name is already taken.
    pub fn register(&mut self, name: &str, constructor: IndexConstructor) -> Result<()> {
        if self.constructors.contains_key(name) {
            return Err(ProximaError::DuplicateMethod(name.to_string()));
        }
        self.constructors.insert(name.to_string(), constructor);
        Ok(())
    }

    /// Whether a method is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered method names, unordered.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Build an index by method name.
    ///
    /// Fails with `UnknownMethod` for an unregistered name; construction
    /// errors from the method itself pass through.
    pub fn create_method(
        &self,
        verbose: bool,
        name: &str,
        space: Arc<dyn Space>,
        dataset: Arc<Dataset>,
        params: &AnyParams,
    ) -> Result<Box<dyn Index>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| ProximaError::UnknownMethod(name.to_string()))?;
        debug!(method = name, space = space.name(), "creating index");
        constructor(verbose, space, dataset, params)
    }
}

/// A registry pre-loaded with every built-in method: `seq_search`,
/// `vptree`, `small_world_rand`, and `perm_incsort`.
pub fn standard_registry() -> MethodRegistry {
    let mut registry = MethodRegistry::new();
    let builtins: [(&str, IndexConstructor); 4] = [
        (seq_search::METHOD_NAME, seq_search::create),
        (vptree::METHOD_NAME, vptree::create),
        (small_world::METHOD_NAME, small_world::create),
        (perm_index::METHOD_NAME, perm_index::create),
    ];
    for (name, constructor) in builtins {
        // Built-in names are distinct constants, so this cannot fail.
        let _ = registry.register(name, constructor);
    }
    registry
}
