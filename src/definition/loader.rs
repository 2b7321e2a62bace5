//! Loading definitions from a directory of modules.
//!
//! A [`DefinitionSource`] exposes named modules; each module either yields a
//! state, a transition, something unrelated, or fails to load. Only states and
//! transitions are kept. Results are cached per source in an explicit
//! [`DefinitionCache`] owned by the application.

use crate::definition::{StateDef, TransitionDef};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace};

/// Error raised while loading one module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Module '{module}' failed to load: {reason}")]
    Failed { module: String, reason: String },
}

/// What a module turned out to contain.
#[derive(Clone, Debug)]
pub enum LoadedModule {
    State(StateDef),
    Transition(TransitionDef),
    /// The module carries no recognizable definition tag.
    Unrecognized,
}

/// Loader for one module.
pub type ModuleLoader = Rc<dyn Fn() -> Result<LoadedModule, LoadError>>;

/// A directory-like collection of definition modules.
pub trait DefinitionSource {
    /// Stable identity used as the cache key.
    fn source_id(&self) -> &str;

    /// Load every module, in directory order.
    fn load_modules(&self) -> Vec<(String, Result<LoadedModule, LoadError>)>;
}

/// In-memory directory of module loaders.
///
/// # Example
///
/// ```rust
/// use statecraft::definition::{DefinitionCache, DefinitionDirectory, LoadedModule};
/// use statecraft::StateDef;
///
/// let directory = DefinitionDirectory::new("npc/states")
///     .module("Idle", || Ok(LoadedModule::State(StateDef::builder("Idle").build())))
///     .module("README", || Ok(LoadedModule::Unrecognized));
///
/// let mut cache = DefinitionCache::new();
/// let loaded = cache.load(&directory, None);
/// assert_eq!(loaded.states.len(), 1);
/// ```
#[derive(Clone)]
pub struct DefinitionDirectory {
    id: String,
    modules: Vec<(String, ModuleLoader)>,
}

impl DefinitionDirectory {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            modules: Vec::new(),
        }
    }

    /// Add a module with its loader.
    pub fn module<F>(mut self, name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Result<LoadedModule, LoadError> + 'static,
    {
        self.modules.push((name.into(), Rc::new(loader)));
        self
    }

    /// Add every module of `other` after the existing ones.
    pub fn nest(mut self, other: DefinitionDirectory) -> Self {
        self.modules.extend(other.modules);
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl DefinitionSource for DefinitionDirectory {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn load_modules(&self) -> Vec<(String, Result<LoadedModule, LoadError>)> {
        self.modules
            .iter()
            .map(|(name, loader)| (name.clone(), loader()))
            .collect()
    }
}

/// Valid definitions found in one source.
#[derive(Clone, Debug, Default)]
pub struct LoadedDefinitions {
    pub states: Vec<StateDef>,
    pub transitions: Vec<TransitionDef>,
}

impl LoadedDefinitions {
    /// Keep only definitions whose name appears in `names`.
    fn filtered(&self, names: &[&str]) -> Self {
        Self {
            states: self
                .states
                .iter()
                .filter(|s| names.contains(&s.name()))
                .cloned()
                .collect(),
            transitions: self
                .transitions
                .iter()
                .filter(|t| names.contains(&t.name()))
                .cloned()
                .collect(),
        }
    }

    pub fn state(&self, name: &str) -> Option<&StateDef> {
        self.states.iter().find(|s| s.name() == name)
    }

    pub fn transition(&self, name: &str) -> Option<&TransitionDef> {
        self.transitions.iter().find(|t| t.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty() && self.transitions.is_empty()
    }
}

/// Cache of loaded definitions keyed by source id.
///
/// A source is scanned once; later loads reuse the cached result until the
/// entry is invalidated.
#[derive(Default)]
pub struct DefinitionCache {
    entries: HashMap<String, LoadedDefinitions>,
}

impl DefinitionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the definitions of `source`, optionally keeping only the named ones.
    ///
    /// Modules that fail to load or carry no definition are skipped.
    pub fn load(
        &mut self,
        source: &dyn DefinitionSource,
        filter: Option<&[&str]>,
    ) -> LoadedDefinitions {
        let loaded = self
            .entries
            .entry(source.source_id().to_string())
            .or_insert_with(|| scan(source));

        match filter {
            Some(names) => loaded.filtered(names),
            None => loaded.clone(),
        }
    }

    pub fn is_cached(&self, source_id: &str) -> bool {
        self.entries.contains_key(source_id)
    }

    /// Drop the cached result for one source. Returns whether it was cached.
    pub fn invalidate(&mut self, source_id: &str) -> bool {
        self.entries.remove(source_id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn scan(source: &dyn DefinitionSource) -> LoadedDefinitions {
    let mut loaded = LoadedDefinitions::default();
    for (module, result) in source.load_modules() {
        match result {
            Ok(LoadedModule::State(state)) => loaded.states.push(state),
            Ok(LoadedModule::Transition(transition)) => loaded.transitions.push(transition),
            Ok(LoadedModule::Unrecognized) => {
                trace!(source = source.source_id(), %module, "skipping module without definition");
            }
            Err(err) => {
                trace!(source = source.source_id(), %module, %err, "skipping module that failed to load");
            }
        }
    }
    debug!(
        source = source.source_id(),
        states = loaded.states.len(),
        transitions = loaded.transitions.len(),
        "loaded definitions"
    );
    loaded
}
