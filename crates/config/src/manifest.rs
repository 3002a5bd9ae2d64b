// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The want config document: a list of wants, or one recipe reference.

use crate::error::ConfigError;
use crate::recipe::load_recipe;
use mw_core::{Params, WantManifest};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Reference to a recipe file with override parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRef {
    pub path: PathBuf,
    #[serde(default)]
    pub parameters: Params,
}

/// A parsed want config document.
///
/// Exactly one of `wants` / `recipe` is present; [`ConfigFile::parse`]
/// rejects documents declaring both or neither.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wants: Vec<WantManifest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<RecipeRef>,
}

impl ConfigFile {
    /// Parse and structurally validate a config document.
    pub fn parse(doc: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_yaml::from_str(doc)?;
        file.validate()?;
        Ok(file)
    }

    /// Read and parse a config file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let doc = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let file: ConfigFile = serde_yaml::from_str(&doc)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        file.validate()?;
        Ok(file)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.wants.is_empty() && self.recipe.is_some() {
            return Err(ConfigError::WantsAndRecipe);
        }
        if self.wants.is_empty() && self.recipe.is_none() {
            return Err(ConfigError::EmptyConfig);
        }
        let mut seen = HashSet::new();
        for want in &self.wants {
            want.validate()?;
            if !seen.insert(want.name().to_string()) {
                return Err(ConfigError::DuplicateWant(want.name().to_string()));
            }
        }
        Ok(())
    }

    /// Resolve to a flat want list. A recipe reference is loaded relative to
    /// `base_dir` and expanded with its override parameters, ownerless.
    pub fn resolve(self, base_dir: &Path) -> Result<Vec<WantManifest>, ConfigError> {
        match self.recipe {
            None => Ok(self.wants),
            Some(r) => {
                let path =
                    if r.path.is_absolute() { r.path.clone() } else { base_dir.join(&r.path) };
                let recipe = load_recipe(&path)?;
                recipe.expand(&r.parameters, None)
            }
        }
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
