// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.
//!
//! Per-want config errors (unknown type, bad params, connectivity) are
//! handled inside the reconciler by failing the affected want; this enum
//! covers the operations that surface errors to callers.

use thiserror::Error;

/// Errors surfaced by runtime control-plane operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown want type '{type_name}' for want '{want}'")]
    UnknownType { want: String, type_name: String },

    #[error("no factory registered for want type '{type_name}'")]
    NoFactory { type_name: String },

    #[error("invalid parameters for want '{want}': {source}")]
    InvalidParams {
        want: String,
        #[source]
        source: mw_config::ParamError,
    },

    #[error("connectivity violation for want '{want}': {source}")]
    Connectivity {
        want: String,
        #[source]
        source: mw_core::ConnectivityIssue,
    },

    #[error(transparent)]
    OwnerCycle(#[from] mw_core::OwnerCycle),

    #[error(transparent)]
    Manifest(#[from] mw_core::ManifestError),

    #[error(transparent)]
    Want(#[from] mw_core::WantError),

    #[error("want '{0}' not found")]
    WantNotFound(String),

    #[error("duplicate want name '{0}'")]
    DuplicateWant(String),

    #[error("cannot delete '{owner}': child '{child}' blocks owner deletion")]
    DeletionBlocked { owner: String, child: String },

    #[error(transparent)]
    Snapshot(#[from] mw_storage::SnapshotError),

    #[error(transparent)]
    Config(#[from] mw_config::ConfigError),
}
