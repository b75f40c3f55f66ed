//! Rendering experiments into backend command scripts.
//!
//! The script is line oriented, one command per line, `#` comments:
//!
//! ```text
//! namespace <experiment>
//! ns queueing true
//! vlans range <min> <max>
//! vlans add <alias> <id>
//! clear vm config
//! vm config schedule <host>
//! vm config vcpus <n>
//! vm config memory <mb>
//! vm config snapshot <bool>
//! vm config disk <image>...
//! vm config net <bridge>,<alias>...
//! vm config do-not-boot true
//! vm launch <type> <hostname>
//! ```
//!
//! Launching queued VMs is a separate backend call, not part of the script.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use rangeplane_types::{ExperimentSpec, Node};
use tracing::debug;

use crate::error::ClusterResult;

pub fn render_script(spec: &ExperimentSpec) -> String {
    let mut out = String::new();
    let name = &spec.experiment_name;

    let _ = writeln!(out, "# rangeplane script for experiment {name}");
    let _ = writeln!(out, "namespace {name}");
    let _ = writeln!(out, "ns queueing true");

    if spec.vlans.min != 0 && spec.vlans.max != 0 {
        let _ = writeln!(out, "vlans range {} {}", spec.vlans.min, spec.vlans.max);
    }
    for (alias, id) in &spec.vlans.aliases {
        if *id != 0 {
            let _ = writeln!(out, "vlans add {alias} {id}");
        }
    }

    for node in &spec.topology.nodes {
        out.push('\n');
        render_node(&mut out, node, spec.scheduled_host(node.hostname()));
    }

    out
}

fn render_node(out: &mut String, node: &Node, host: Option<&str>) {
    let hw = &node.hardware;

    let _ = writeln!(out, "## {}", node.hostname());
    let _ = writeln!(out, "clear vm config");
    if let Some(host) = host {
        let _ = writeln!(out, "vm config schedule {host}");
    }
    let _ = writeln!(out, "vm config vcpus {}", hw.vcpus);
    let _ = writeln!(out, "vm config memory {}", hw.memory);
    if let Some(snapshot) = node.general.snapshot {
        let _ = writeln!(out, "vm config snapshot {snapshot}");
    }
    if !hw.drives.is_empty() {
        let disks: Vec<&str> = hw.drives.iter().map(|d| d.image.as_str()).collect();
        let _ = writeln!(out, "vm config disk {}", disks.join(" "));
    }
    if !node.network.interfaces.is_empty() {
        let nets: Vec<String> = node
            .network
            .interfaces
            .iter()
            .map(|i| format!("{},{}", i.bridge, i.vlan))
            .collect();
        let _ = writeln!(out, "vm config net {}", nets.join(" "));
    }
    if node.do_not_boot() {
        let _ = writeln!(out, "vm config do-not-boot true");
    }
    let _ = writeln!(out, "vm launch {} {}", node.general.vm_type, node.hostname());
}

/// Where an experiment's script lives: `<baseDir>/scripts/<name>.mm`.
pub fn script_path(spec: &ExperimentSpec) -> PathBuf {
    spec.base_dir
        .join("scripts")
        .join(format!("{}.mm", spec.experiment_name))
}

/// Render the script and write it to [`script_path`].
pub fn write_script(spec: &ExperimentSpec) -> ClusterResult<PathBuf> {
    let path = script_path(spec);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&path, render_script(spec))?;
    debug!(experiment = %spec.experiment_name, path = %path.display(), "script written");
    Ok(path)
}
