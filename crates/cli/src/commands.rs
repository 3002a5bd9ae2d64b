// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations for the `mywant` binary.

use anyhow::{bail, Context, Result};
use mw_config::{load_type_dir, validate_params, ConfigFile};
use mw_core::{validate_owner_dag, WantManifest, WantStatus};
use mw_engine::{dependency_levels, resolve_edges, Runtime, RuntimeConfig, WantView};
use mw_storage::SnapshotStore;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

fn base_dir(config: &Path) -> PathBuf {
    config.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
}

fn load_wants(config: &Path) -> Result<Vec<WantManifest>> {
    let file = ConfigFile::load(config)
        .with_context(|| format!("loading config {}", config.display()))?;
    let wants = file.resolve(&base_dir(config))?;
    Ok(wants)
}

/// Run a config until a shutdown signal (or until it settles).
pub async fn run(
    config: &Path,
    types: Option<&Path>,
    snapshot: Option<PathBuf>,
    until_settled: bool,
    tick_ms: u64,
) -> Result<()> {
    let wants = load_wants(config)?;

    let mut runtime_config = RuntimeConfig::default().tick(Duration::from_millis(tick_ms.max(1)));
    if let Some(path) = &snapshot {
        runtime_config = runtime_config.snapshot_path(path.clone());
    }
    let runtime = Runtime::new(runtime_config);

    if let Some(dir) = types {
        for def in load_type_dir(dir)? {
            runtime.registry().register_definition(def);
        }
    }

    if let Some(path) = &snapshot {
        if let Some(loaded) = SnapshotStore::new(path).load()? {
            info!(wants = loaded.wants.len(), "recovering from snapshot");
            runtime.recover(&loaded)?;
        }
    }

    runtime.apply(wants)?;
    runtime.start();
    info!(config = %config.display(), "running");

    if until_settled {
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);
        loop {
            let statuses = runtime.statuses();
            let settled = !statuses.is_empty()
                && statuses
                    .values()
                    .all(|s| matches!(s, WantStatus::Completed | WantStatus::Failed));
            if settled {
                break;
            }
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            }
        }
    } else {
        shutdown_signal().await;
    }

    runtime.shutdown().await;

    let mut failed = 0usize;
    for (name, status) in runtime.statuses() {
        if status == WantStatus::Failed {
            failed += 1;
            let reason = runtime
                .state_value(&name, "error")
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            warn!(want = %name, reason = %reason, "failed");
        }
        println!("{}\t{}", name, status);
    }
    if failed > 0 {
        bail!("{failed} want(s) failed");
    }
    Ok(())
}

/// Validate config, recipes, and type definitions without running.
pub fn validate(config: &Path, types: Option<&Path>) -> Result<()> {
    let runtime = Runtime::new(RuntimeConfig::default());
    if let Some(dir) = types {
        for def in load_type_dir(dir)? {
            runtime.registry().register_definition(def);
        }
    }

    let wants = load_wants(config)?;
    let refs: Vec<(&str, Vec<&str>)> = wants
        .iter()
        .map(|m| {
            (
                m.name(),
                m.metadata.owner_references.iter().map(|r| r.name.as_str()).collect(),
            )
        })
        .collect();
    validate_owner_dag(refs)?;

    for manifest in &wants {
        let Some(registered) = runtime.registry().resolve(&manifest.metadata.type_name) else {
            bail!(
                "want '{}': unknown want type '{}'",
                manifest.name(),
                manifest.metadata.type_name
            );
        };
        validate_params(&registered.definition, &manifest.spec.params).with_context(|| {
            format!("want '{}': invalid parameters", manifest.name())
        })?;
    }

    println!("{} want(s) valid", wants.len());
    Ok(())
}

/// Print the resolved edges and dependency levels for a config.
pub fn graph(config: &Path) -> Result<()> {
    let wants = load_wants(config)?;
    let views: Vec<WantView> = wants
        .iter()
        .map(|m| WantView {
            name: m.name(),
            labels: &m.metadata.labels,
            owner: m.metadata.controller_owner(),
            using: &m.spec.using,
            using_global: &m.spec.using_global,
        })
        .collect();
    let edges = resolve_edges(&views);
    let levels = dependency_levels(wants.iter().map(|m| m.name().to_string()), &edges);

    let mut names: Vec<&str> = wants.iter().map(|m| m.name()).collect();
    names.sort();
    for name in names {
        println!("want {} (level {})", name, levels.get(name).copied().unwrap_or(0));
    }
    for edge in &edges {
        let scope = if edge.global { " [global]" } else { "" };
        println!("{} -> {}{}", edge.producer, edge.consumer, scope);
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown signal received");
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
