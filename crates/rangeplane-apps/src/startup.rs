//! Per-node hostname and interface configuration, by OS type.

use std::fmt::Write as _;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use rangeplane_types::{Experiment, Interface, Node};
use tracing::debug;

use crate::app::App;
use crate::error::{AppError, AppResult};

const TIMEZONE: &str = "Etc/UTC";

/// Generates startup files under `<baseDir>/startup` and injects them.
///
/// | OS | Files |
/// |---|---|
/// | linux | hostname and timezone scripts, `/etc/network/interfaces` |
/// | rhel, centos | one `ifcfg-ethN` per interface |
/// | windows | `startup.ps1` plus a scheduler hook |
///
/// Routers are configured elsewhere and skipped.
pub struct Startup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Os {
    Linux,
    RedHat,
    Windows,
}

impl Os {
    fn of(node: &Node) -> Option<Self> {
        if node.is_router() {
            return None;
        }
        match node.hardware.os_type.to_ascii_lowercase().as_str() {
            "linux" => Some(Os::Linux),
            "rhel" | "centos" => Some(Os::RedHat),
            "windows" => Some(Os::Windows),
            _ => None,
        }
    }
}

fn startup_dir(base: &Path) -> PathBuf {
    base.join("startup")
}

/// `(file name under the startup dir, destination in the image)`.
fn files(node: &Node, os: Os) -> Vec<(String, String)> {
    let host = node.hostname();
    match os {
        Os::Linux => vec![
            (format!("{host}-hostname.sh"), "/etc/rangeplane/startup/1_hostname-start.sh".into()),
            (format!("{host}-timezone.sh"), "/etc/rangeplane/startup/2_timezone-start.sh".into()),
            (format!("{host}-interfaces"), "/etc/network/interfaces".into()),
        ],
        Os::RedHat => (0..node.network.interfaces.len())
            .map(|idx| {
                (
                    format!("interfaces-{host}-eth{idx}"),
                    format!("/etc/sysconfig/network-scripts/ifcfg-eth{idx}"),
                )
            })
            .collect(),
        Os::Windows => vec![
            (format!("{host}-startup.ps1"), "startup.ps1".into()),
            (
                format!("{host}-startup-scheduler.cmd"),
                "ProgramData/Microsoft/Windows/Start Menu/Programs/StartUp/startup_scheduler.cmd".into(),
            ),
        ],
    }
}

fn netmask(prefix: u32) -> Ipv4Addr {
    let bits = match prefix {
        0 => 0,
        p => u32::MAX << (32 - p.min(32)),
    };
    Ipv4Addr::from(bits)
}

fn is_dhcp(iface: &Interface) -> bool {
    iface.proto.eq_ignore_ascii_case("dhcp") || iface.address.is_empty()
}

fn render_debian_interfaces(node: &Node) -> String {
    let mut out = String::from("auto lo\niface lo inet loopback\n");
    for (idx, iface) in node.network.interfaces.iter().enumerate() {
        let _ = write!(out, "\nauto eth{idx}\n");
        if is_dhcp(iface) {
            let _ = writeln!(out, "iface eth{idx} inet dhcp");
            continue;
        }
        let _ = writeln!(out, "iface eth{idx} inet static");
        let _ = writeln!(out, "    address {}", iface.address);
        let _ = writeln!(out, "    netmask {}", netmask(iface.mask));
        if !iface.gateway.is_empty() {
            let _ = writeln!(out, "    gateway {}", iface.gateway);
        }
    }
    out
}

fn render_ifcfg(idx: usize, iface: &Interface) -> String {
    let mut out = format!("DEVICE=eth{idx}\nONBOOT=yes\n");
    if is_dhcp(iface) {
        out.push_str("BOOTPROTO=dhcp\n");
        return out;
    }
    let _ = write!(out, "BOOTPROTO=static\nIPADDR={}\nPREFIX={}\n", iface.address, iface.mask);
    if !iface.gateway.is_empty() {
        let _ = writeln!(out, "GATEWAY={}", iface.gateway);
    }
    out
}

fn render_windows_startup(node: &Node) -> String {
    let mut out = format!("Rename-Computer -NewName \"{}\" -Force\r\n", node.hostname());
    for (idx, iface) in node.network.interfaces.iter().enumerate() {
        if is_dhcp(iface) {
            continue;
        }
        let _ = write!(
            out,
            "New-NetIPAddress -InterfaceIndex (Get-NetAdapter)[{idx}].ifIndex -IPAddress {} -PrefixLength {}",
            iface.address, iface.mask
        );
        if !iface.gateway.is_empty() {
            let _ = write!(out, " -DefaultGateway {}", iface.gateway);
        }
        out.push_str("\r\n");
    }
    out
}

/// Rendered file contents, in the same order as [`files`].
fn render(node: &Node, os: Os) -> Vec<String> {
    match os {
        Os::Linux => vec![
            format!("#!/bin/sh\necho {0} > /etc/hostname\nhostname {0}\n", node.hostname()),
            format!("#!/bin/sh\nln -sf /usr/share/zoneinfo/{TIMEZONE} /etc/localtime\n"),
            render_debian_interfaces(node),
        ],
        Os::RedHat => node
            .network
            .interfaces
            .iter()
            .enumerate()
            .map(|(idx, iface)| render_ifcfg(idx, iface))
            .collect(),
        Os::Windows => vec![
            render_windows_startup(node),
            "powershell.exe -ExecutionPolicy Bypass -File C:\\startup.ps1\r\n".to_string(),
        ],
    }
}

impl App for Startup {
    fn name(&self) -> &str {
        "startup"
    }

    fn configure(&self, exp: &mut Experiment) -> AppResult<()> {
        let dir = startup_dir(&exp.spec.base_dir);
        let prefix = dir.to_string_lossy().into_owned();

        for node in &mut exp.spec.topology.nodes {
            let Some(os) = Os::of(node) else {
                continue;
            };
            node.injections.retain(|i| !Path::new(&i.src).starts_with(&prefix));
            for (file, dst) in files(node, os) {
                let src = dir.join(file);
                node.add_inject(src.to_string_lossy(), dst, "0755", "startup configuration");
            }
            debug!(node = %node.hostname(), ?os, "injected startup files");
        }
        Ok(())
    }

    fn pre_start(&self, exp: &mut Experiment) -> AppResult<()> {
        let dir = startup_dir(&exp.spec.base_dir);
        fs::create_dir_all(&dir).map_err(|e| AppError::io(&dir, e))?;

        for node in &exp.spec.topology.nodes {
            let Some(os) = Os::of(node) else {
                continue;
            };
            for ((file, _), contents) in files(node, os).into_iter().zip(render(node, os)) {
                let path = dir.join(file);
                fs::write(&path, contents).map_err(|e| AppError::io(&path, e))?;
            }
        }
        Ok(())
    }
}
