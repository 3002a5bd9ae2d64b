// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recipes: parameterised want sets expanded by owners.
//!
//! Substitution is literal by key match: a want param whose value is a
//! string equal to a declared parameter name is replaced wholesale by that
//! parameter's value. There is no string interpolation.

use crate::error::ConfigError;
use mw_core::{OwnerReference, Params, WantManifest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Top-level recipe document: `{ recipe: { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeFile {
    pub recipe: Recipe,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Which want/state key carries the recipe's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeResult {
    pub want: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub metadata: RecipeMeta,
    /// Declared parameters with their default values.
    #[serde(default)]
    pub parameters: Params,
    #[serde(default)]
    pub wants: Vec<WantManifest>,
    /// Optional coordinator appended after the want list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<WantManifest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RecipeResult>,
}

impl Recipe {
    /// Expand the recipe into concrete manifests.
    ///
    /// `overrides` shadow declared parameter defaults. When `owner` is given,
    /// every child name is prefixed `{owner}-` and a controller reference
    /// back to the owner is attached.
    pub fn expand(
        &self,
        overrides: &Params,
        owner: Option<&str>,
    ) -> Result<Vec<WantManifest>, ConfigError> {
        let mut effective = self.parameters.clone();
        for (k, v) in overrides {
            effective.insert(k.clone(), v.clone());
        }

        let mut out = Vec::new();
        let children = self.wants.iter().chain(self.coordinator.iter());
        for template in children {
            let mut manifest = template.clone();
            substitute(&mut manifest.spec.params, &effective);
            if let Some(owner) = owner {
                manifest.metadata.name = format!("{}-{}", owner, manifest.metadata.name);
                // Rewrite subscriptions to the prefixed child names.
                manifest.spec.state_subscriptions = manifest
                    .spec
                    .state_subscriptions
                    .iter()
                    .map(|s| format!("{}-{}", owner, s))
                    .collect();
                manifest.metadata.owner_references.push(OwnerReference::controller(owner));
            }
            manifest.validate()?;
            out.push(manifest);
        }

        if out.is_empty() {
            return Err(ConfigError::EmptyRecipe { recipe: self.metadata.name.clone() });
        }
        Ok(out)
    }
}

/// Replace string param values that exactly name a declared parameter.
fn substitute(params: &mut Params, effective: &Params) {
    for (_, value) in params.iter_mut() {
        if let Value::String(s) = value {
            if let Some(replacement) = effective.get(s.as_str()) {
                *value = replacement.clone();
            }
        }
    }
}

/// Read and parse a recipe document from disk.
pub fn load_recipe(path: &Path) -> Result<Recipe, ConfigError> {
    let doc = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let file: RecipeFile = serde_yaml::from_str(&doc)
        .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
    Ok(file.recipe)
}

#[cfg(test)]
#[path = "recipe_tests.rs"]
mod tests;
