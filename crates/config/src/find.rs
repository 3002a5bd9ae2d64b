// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory loader for want type definitions.
//!
//! Walks a conventional directory tree (e.g. `types/`), parsing every
//! `*.yaml` / `*.yml` file as a type definition document.

use crate::error::ConfigError;
use crate::typedef::{TypeFile, WantTypeDefinition};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load every type definition under `dir`, recursively.
///
/// Files are visited in sorted path order so duplicate detection and
/// registration order are deterministic. A missing directory yields an
/// empty list.
pub fn load_type_dir(dir: &Path) -> Result<Vec<WantTypeDefinition>, ConfigError> {
    let mut files = Vec::new();
    collect_yaml_files(dir, &mut files)?;
    files.sort();

    let mut seen = HashSet::new();
    let mut defs = Vec::new();
    for path in files {
        let def = load_type_file(&path)?;
        if def.name().is_empty() {
            return Err(ConfigError::UnnamedType { path });
        }
        if !seen.insert(def.name().to_string()) {
            return Err(ConfigError::DuplicateType(def.name().to_string()));
        }
        debug!(type_name = def.name(), path = %path.display(), "loaded want type definition");
        defs.push(def);
    }
    Ok(defs)
}

/// Load a single type definition file.
pub fn load_type_file(path: &Path) -> Result<WantTypeDefinition, ConfigError> {
    let doc = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let file: TypeFile = serde_yaml::from_str(&doc)
        .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
    Ok(file.want_type)
}

/// Find the definition for `type_name` under `dir`, if any.
pub fn find_type_definition(
    dir: &Path,
    type_name: &str,
) -> Result<Option<WantTypeDefinition>, ConfigError> {
    let defs = load_type_dir(dir)?;
    Ok(defs.into_iter().find(|d| d.name() == type_name))
}

fn collect_yaml_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ConfigError> {
    if !dir.exists() {
        return Ok(());
    }
    let entries = std::fs::read_dir(dir)
        .map_err(|source| ConfigError::Io { path: dir.to_path_buf(), source })?;
    for entry in entries {
        let entry =
            entry.map_err(|source| ConfigError::Io { path: dir.to_path_buf(), source })?;
        let path = entry.path();
        if path.is_dir() {
            collect_yaml_files(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "find_tests.rs"]
mod tests;
