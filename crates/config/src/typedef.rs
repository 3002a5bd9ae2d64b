// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Want type definitions: the declarative contract per registered type.

use mw_core::Connectivity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level type definition document: `{ wantType: { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeFile {
    #[serde(rename = "wantType")]
    pub want_type: WantTypeDefinition,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Value kinds accepted by parameter and state schemas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    #[default]
    Any,
    String,
    Int,
    Float,
    Bool,
    List,
    Object,
}

mw_core::simple_display! {
    ParamKind {
        Any => "any",
        String => "string",
        Int => "int",
        Float => "float",
        Bool => "bool",
        List => "list",
        Object => "object",
    }
}

impl ParamKind {
    /// Whether `value` is of this kind. `Any` accepts everything; `Float`
    /// accepts any number.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::Any => true,
            ParamKind::String => value.is_string(),
            ParamKind::Int => value.is_i64() || value.is_u64(),
            ParamKind::Float => value.is_number(),
            ParamKind::Bool => value.is_boolean(),
            ParamKind::List => value.is_array(),
            ParamKind::Object => value.is_object(),
        }
    }
}

/// Schema for one declared parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSchema {
    pub name: String,
    #[serde(default)]
    pub kind: ParamKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ParamSchema {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self { name: name.into(), kind, ..Self::default() }
    }

    pub fn with_default(mut self, v: Value) -> Self {
        self.default = Some(v);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }
}

/// Schema for one state key a type publishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateKeySchema {
    pub name: String,
    #[serde(default)]
    pub kind: ParamKind,
    /// Persistent keys survive restarts via snapshots.
    #[serde(default)]
    pub persistent: bool,
}

/// Declarative contract for a registered want type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WantTypeDefinition {
    pub metadata: TypeMeta,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParamSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub state: Vec<StateKeySchema>,
    #[serde(default)]
    pub connectivity: Connectivity,
    /// Capability names this type requires from the agent registry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,
}

impl WantTypeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: TypeMeta { name: name.into(), description: String::new() },
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    pub fn parameter(mut self, schema: ParamSchema) -> Self {
        self.parameters.push(schema);
        self
    }

    pub fn state_key(mut self, name: impl Into<String>, kind: ParamKind, persistent: bool) -> Self {
        self.state.push(StateKeySchema { name: name.into(), kind, persistent });
        self
    }

    pub fn connectivity(mut self, c: Connectivity) -> Self {
        self.connectivity = c;
        self
    }
}

#[cfg(test)]
#[path = "typedef_tests.rs"]
mod tests;
