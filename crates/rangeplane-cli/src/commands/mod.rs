use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use rangeplane_apps::AppRegistry;
use rangeplane_cluster::{Host, SimCluster};
use rangeplane_experiment::Controller;
use rangeplane_scheduler::SchedulerRegistry;
use rangeplane_store::RedbStore;
use rangeplane_types::Kind;
use serde::Serialize;
use tracing::debug;

use crate::config::RangeConfig;

pub mod config;
pub mod experiment;
pub mod vlan;

pub fn init(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    std::fs::write(path, RangeConfig::default().to_toml_string()?)?;
    println!("✓ Generated {}", path.display());
    Ok(())
}

pub fn open_store(config: &RangeConfig) -> anyhow::Result<RedbStore> {
    let path = &config.store.path;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let store = RedbStore::open(path).with_context(|| format!("opening store {}", path.display()))?;
    debug!(path = %path.display(), "store opened");
    Ok(store)
}

pub fn controller(config: &RangeConfig) -> anyhow::Result<Controller> {
    let store = open_store(config)?;
    let backend = SimCluster::new(config.cluster.hosts.clone());
    let apps = AppRegistry::with_defaults(config.apps.clone())?;
    Ok(Controller::new(
        Arc::new(store),
        Arc::new(backend),
        Arc::new(apps),
        config.controller_config(),
    ))
}

/// Split `kind/name`.
pub fn parse_target(target: &str) -> anyhow::Result<(Kind, &str)> {
    let Some((kind, name)) = target.split_once('/') else {
        bail!("expected <kind>/<name>, got {target:?}");
    };
    if name.is_empty() {
        bail!("missing name in {target:?}");
    }
    Ok((kind.parse()?, name))
}

/// Print `value` as JSON or YAML.
pub fn print<T: Serialize>(value: &T, output: &str) -> anyhow::Result<()> {
    match output {
        "json" => println!("{}", serde_json::to_string_pretty(value)?),
        "yaml" => print!("{}", serde_yaml::to_string(value)?),
        other => bail!("unknown output format {other:?} (expected json or yaml)"),
    }
    Ok(())
}

pub fn list_schedulers(config: &RangeConfig) -> anyhow::Result<()> {
    for name in SchedulerRegistry::with_defaults().names() {
        println!("{name}");
    }
    println!();
    println!("cluster hosts:");
    for line in describe_hosts(&config.cluster.hosts) {
        println!("  {line}");
    }
    Ok(())
}

pub fn list_apps(config: &RangeConfig) -> anyhow::Result<()> {
    let apps = AppRegistry::with_defaults(config.apps.clone())?;
    for name in apps.default_names() {
        println!("{name} (default)");
    }
    for name in apps.list() {
        println!("{name}");
    }
    Ok(())
}

/// One summary line per host.
fn describe_hosts(hosts: &[Host]) -> Vec<String> {
    hosts
        .iter()
        .map(|h| {
            let mut line = format!("{} cpus={} mem={}MB", h.name, h.cpus, h.mem_total);
            if !h.schedulable {
                line.push_str(" (unschedulable)");
            }
            line
        })
        .collect()
}
