// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The want type registry: type name → definition + factory.
//!
//! Mostly read-only after initialisation; dynamic registration takes the
//! registry lock. Definitions loaded from YAML may arrive without a factory
//! (agent-backed types); wants of such a type fail at instantiation with a
//! descriptive error while in-flight wants are unaffected.

use crate::error::EngineError;
use crate::exec::{WantRole, WantRun};
use mw_config::WantTypeDefinition;
use mw_core::Want;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Creates a runner for a validated want.
pub type Factory = Arc<dyn Fn(&Want) -> Box<dyn WantRun> + Send + Sync>;

/// A registered type: declarative contract plus (optionally) code.
pub struct RegisteredType {
    pub definition: WantTypeDefinition,
    pub role: WantRole,
    factory: Option<Factory>,
}

impl RegisteredType {
    pub fn has_factory(&self) -> bool {
        self.factory.is_some()
    }

    pub(crate) fn instantiate(&self, want: &Want) -> Result<Box<dyn WantRun>, EngineError> {
        match &self.factory {
            Some(f) => Ok(f(want)),
            None => Err(EngineError::NoFactory {
                type_name: self.definition.name().to_string(),
            }),
        }
    }
}

/// Type name → factory and connectivity contract.
#[derive(Default)]
pub struct WantTypeRegistry {
    types: Mutex<HashMap<String, Arc<RegisteredType>>>,
}

impl WantTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in reference types.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::builtin::register_all(&registry);
        registry
    }

    /// Register (or replace) a type with code attached.
    pub fn register(&self, definition: WantTypeDefinition, role: WantRole, factory: Factory) {
        let name = definition.name().to_string();
        let registered = Arc::new(RegisteredType { definition, role, factory: Some(factory) });
        self.types.lock().insert(name.clone(), registered);
        debug!(type_name = %name, %role, "registered want type");
    }

    /// Register a declarative definition.
    ///
    /// If the type already has a factory (built-in or registered earlier)
    /// the definition replaces its schema and keeps the code; otherwise the
    /// type is registered factory-less.
    pub fn register_definition(&self, definition: WantTypeDefinition) {
        let name = definition.name().to_string();
        let mut types = self.types.lock();
        let registered = match types.get(&name) {
            Some(existing) => Arc::new(RegisteredType {
                definition,
                role: existing.role,
                factory: existing.factory.clone(),
            }),
            None => Arc::new(RegisteredType {
                definition,
                role: WantRole::Independent,
                factory: None,
            }),
        };
        types.insert(name.clone(), registered);
        debug!(type_name = %name, "registered want type definition");
    }

    /// Remove a type. In-flight wants of the type keep running; newly
    /// declared wants of it fail.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.types.lock().remove(name).is_some();
        if removed {
            debug!(type_name = name, "unregistered want type");
        }
        removed
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<RegisteredType>> {
        self.types.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.lock().contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
