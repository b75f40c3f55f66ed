//! `rangectl experiment` — lifecycle commands.

use std::sync::Arc;

use anyhow::{Context, bail};
use rangeplane_experiment::{Applied, CreateRequest, StartRequest, start_detached};
use rangeplane_types::{Experiment, TOPOLOGY_ANNOTATION};
use tracing::{info, warn};

use super::{controller, print};
use crate::config::RangeConfig;

/// Parse repeated `ALIAS=ID` arguments.
pub fn parse_vlans(specs: &[String]) -> anyhow::Result<Vec<(String, u32)>> {
    specs
        .iter()
        .map(|spec| {
            let Some((alias, id)) = spec.split_once('=') else {
                bail!("expected ALIAS=ID, got {spec:?}");
            };
            if alias.is_empty() {
                bail!("missing VLAN alias in {spec:?}");
            }
            let id = id.parse().with_context(|| format!("invalid VLAN ID in {spec:?}"))?;
            Ok((alias.to_string(), id))
        })
        .collect()
}

/// One line per experiment for `experiment list`.
pub fn summary(exp: &Experiment) -> String {
    let state = if !exp.running() {
        "stopped"
    } else if exp.dry_run() {
        "dry-run"
    } else {
        "running"
    };
    let topology = exp.metadata.annotation(TOPOLOGY_ANNOTATION).unwrap_or("-");
    format!(
        "{:<24} {:<8} {:>4} {:<24} {}",
        exp.name(),
        state,
        exp.spec.topology.nodes.len(),
        topology,
        exp.status.started_at().map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into()),
    )
}

/// Warn about scenario apps that were skipped for lack of an implementation.
fn warn_missing(applied: &Applied) {
    for app in applied.missing_apps() {
        warn!(experiment = %applied.experiment.name(), %app, "scenario app not found, skipped");
    }
}

pub fn create(config: &RangeConfig, request: CreateRequest) -> anyhow::Result<()> {
    let applied = controller(config)?.create(request)?;
    warn_missing(&applied);
    let exp = &applied.experiment;
    println!("✓ Created experiment {} in {}", exp.name(), exp.spec.base_dir.display());
    Ok(())
}

pub fn schedule(config: &RangeConfig, name: &str, algorithm: &str) -> anyhow::Result<()> {
    let exp = controller(config)?.schedule(name, algorithm)?;
    for (node, host) in &exp.spec.schedules {
        println!("{node} → {host}");
    }
    Ok(())
}

/// Start in the background and log launch progress until it completes.
pub async fn start(config: &RangeConfig, request: StartRequest) -> anyhow::Result<()> {
    let controller = Arc::new(controller(config)?);
    let handle = start_detached(controller, request);

    let mut progress = handle.progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let fraction = *progress.borrow_and_update();
            info!(progress = %format!("{:.0}%", fraction * 100.0), "launching VMs");
        }
    });

    let applied = handle.wait().await?;
    let _ = reporter.await;
    warn_missing(&applied);
    let exp = &applied.experiment;

    let mode = if exp.dry_run() { " (dry run)" } else { "" };
    println!("✓ Started experiment {}{mode}", exp.name());
    for (alias, id) in &exp.status.vlans {
        println!("  VLAN {alias} = {id}");
    }
    Ok(())
}

pub fn stop(config: &RangeConfig, name: &str) -> anyhow::Result<()> {
    let applied = controller(config)?.stop(name)?;
    warn_missing(&applied);
    println!("✓ Stopped experiment {}", applied.experiment.name());
    Ok(())
}

pub fn delete(config: &RangeConfig, name: &str) -> anyhow::Result<()> {
    controller(config)?.delete(name)?;
    println!("✓ Deleted experiment {name}");
    Ok(())
}

pub fn list(config: &RangeConfig) -> anyhow::Result<()> {
    println!("{:<24} {:<8} {:>4} {:<24} STARTED", "NAME", "STATE", "VMS", "TOPOLOGY");
    for exp in controller(config)?.list()? {
        println!("{}", summary(&exp));
    }
    Ok(())
}

pub fn get(config: &RangeConfig, name: &str, output: &str) -> anyhow::Result<()> {
    let exp = controller(config)?.get(name)?;
    print(&exp.to_document()?, output)
}
