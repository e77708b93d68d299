//! Selector factory registry.

use super::builtin::BUILTIN_FACTORIES;
use super::Selector;
use crate::errors::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds selectors of one name from their arguments
pub trait SelectorFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Whether built selectors point at history entries
    fn history_capable(&self) -> bool;

    fn max_args(&self) -> usize;

    /// `args` never holds more than [`max_args`](Self::max_args) items; an
    /// empty argument means it was not given.
    ///
    /// # Errors
    ///
    /// `InvalidSelectorArgument` or `InvalidTimeSpec` for unusable arguments.
    fn build(&self, args: &[String]) -> Result<Box<dyn Selector>>;
}

/// Entry of the built-in factory table
#[derive(Clone, Copy)]
pub(crate) struct Builtin {
    pub name: &'static str,
    pub history: bool,
    pub max_args: usize,
    pub build: fn(&[String]) -> Result<Box<dyn Selector>>,
}

impl SelectorFactory for Builtin {
    fn name(&self) -> &str {
        self.name
    }

    fn history_capable(&self) -> bool {
        self.history
    }

    fn max_args(&self) -> usize {
        self.max_args
    }

    fn build(&self, args: &[String]) -> Result<Box<dyn Selector>> {
        (self.build)(args)
    }
}

/// Selector factories by name.
#[derive(Default, Clone)]
pub struct SelectorRegistry {
    factories: BTreeMap<String, Arc<dyn SelectorFactory>>,
}

impl SelectorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in selector.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for builtin in BUILTIN_FACTORIES {
            registry.register(Arc::new(*builtin));
        }
        registry
    }

    /// Registers a factory under its own name. A factory already registered
    /// under that name is replaced and returned.
    pub fn register(&mut self, factory: Arc<dyn SelectorFactory>) -> Option<Arc<dyn SelectorFactory>> {
        let name = factory.name().to_string();
        let replaced = self.factories.insert(name.clone(), factory);
        if replaced.is_some() {
            tracing::debug!(selector = %name, "selector factory replaced");
        }
        replaced
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SelectorFactory>> {
        self.factories.get(name).cloned()
    }

    /// Sorted factory names
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
