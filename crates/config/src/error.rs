// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors surfaced while loading declarative documents.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to parse document: {0}")]
    ParseDocument(#[from] serde_yaml::Error),

    #[error("config declares both a wants list and a recipe reference")]
    WantsAndRecipe,

    #[error("config declares neither a wants list nor a recipe reference")]
    EmptyConfig,

    #[error(transparent)]
    Manifest(#[from] mw_core::ManifestError),

    #[error("duplicate want name '{0}'")]
    DuplicateWant(String),

    #[error("duplicate want type '{0}'")]
    DuplicateType(String),

    #[error("want type definition in {path} is missing a name")]
    UnnamedType { path: PathBuf },

    #[error("recipe '{recipe}' produced no wants")]
    EmptyRecipe { recipe: String },
}
