//! State and transition definitions, and the loader that discovers them.
//!
//! Definitions are plain values built with fluent builders. `extend` derives
//! a new definition from an existing one, layering overrides on top.

pub mod loader;
pub mod state;
pub mod transition;

pub use loader::{
    DefinitionCache, DefinitionDirectory, DefinitionSource, LoadError, LoadedDefinitions,
    LoadedModule, ModuleLoader,
};
pub use state::{StateDef, StateDefBuilder, StateHooks};
pub use transition::{TransitionDef, TransitionDefBuilder, TransitionHooks};
