//! `rangectl vlan` — VLAN aliases and ranges of experiments.

use std::collections::BTreeMap;

use rangeplane_experiment::VlanRange;

use super::controller;
use crate::config::RangeConfig;

/// One `EXPERIMENT ALIAS ID` row per alias; `-` for unallocated IDs.
pub fn alias_rows(aliases: &BTreeMap<String, BTreeMap<String, u32>>) -> Vec<String> {
    let mut rows = Vec::new();
    for (experiment, vlans) in aliases {
        for (alias, id) in vlans {
            let id = if *id == 0 { "-".to_string() } else { id.to_string() };
            rows.push(format!("{experiment:<24} {alias:<16} {id}"));
        }
    }
    rows
}

pub fn range_row(experiment: &str, range: VlanRange) -> String {
    let bound = |id: u32| if id == 0 { "-".to_string() } else { id.to_string() };
    format!("{experiment:<24} {:<6} {}", bound(range.min), bound(range.max))
}

pub fn aliases(config: &RangeConfig, experiment: Option<&str>) -> anyhow::Result<()> {
    let aliases = controller(config)?.vlan_aliases(experiment)?;
    println!("{:<24} {:<16} ID", "EXPERIMENT", "ALIAS");
    for row in alias_rows(&aliases) {
        println!("{row}");
    }
    Ok(())
}

pub fn set_alias(config: &RangeConfig, experiment: &str, alias: &str, id: u32, force: bool) -> anyhow::Result<()> {
    controller(config)?.set_vlan_alias(experiment, alias, id, force)?;
    println!("✓ VLAN {alias} = {id} for experiment {experiment}");
    Ok(())
}

pub fn ranges(config: &RangeConfig, experiment: Option<&str>) -> anyhow::Result<()> {
    let ranges = controller(config)?.vlan_ranges(experiment)?;
    println!("{:<24} {:<6} MAX", "EXPERIMENT", "MIN");
    for (name, range) in ranges {
        println!("{}", range_row(&name, range));
    }
    Ok(())
}

pub fn set_range(config: &RangeConfig, experiment: &str, min: u32, max: u32, force: bool) -> anyhow::Result<()> {
    controller(config)?.set_vlan_range(experiment, min, max, force)?;
    println!("✓ VLAN range {min}-{max} for experiment {experiment}");
    Ok(())
}
