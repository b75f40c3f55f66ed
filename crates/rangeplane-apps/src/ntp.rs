//! NTP server configuration for the node labelled `ntp-server`.

use std::fs;
use std::path::PathBuf;

use rangeplane_types::{Experiment, ExperimentSpec, Node};
use serde_json::json;
use tracing::debug;

use crate::app::App;
use crate::error::{AppError, AppResult};

pub const NTP_SERVER_LABEL: &str = "ntp-server";

/// Injects an NTP configuration into the first node labelled
/// [`NTP_SERVER_LABEL`], serving on its `mgmt` interface address.
pub struct Ntp;

fn server(spec: &ExperimentSpec) -> Option<&Node> {
    spec.topology.find_nodes_with_labels(&[NTP_SERVER_LABEL]).into_iter().next()
}

fn config_path(spec: &ExperimentSpec, node: &Node) -> PathBuf {
    spec.base_dir.join("ntp").join(format!("{}_ntp", node.hostname()))
}

fn is_windows(node: &Node) -> bool {
    !node.is_router() && node.hardware.os_type.eq_ignore_ascii_case("windows")
}

/// Where the configuration lands inside the node's image.
fn destination(node: &Node) -> &'static str {
    if node.is_router() {
        "/opt/vyatta/etc/ntp.conf"
    } else if is_windows(node) {
        "ntp.ps1"
    } else {
        "/etc/ntp.conf"
    }
}

pub fn render(node: &Node, address: &str) -> String {
    if is_windows(node) {
        format!(
            "w32tm /config /manualpeerlist:\"{address}\" /syncfromflags:manual /reliable:yes /update\r\n\
             Restart-Service w32time\r\n"
        )
    } else {
        format!("driftfile /var/lib/ntp/ntp.drift\nserver {address} iburst\n")
    }
}

impl App for Ntp {
    fn name(&self) -> &str {
        "ntp"
    }

    fn configure(&self, exp: &mut Experiment) -> AppResult<()> {
        let Some(node) = server(&exp.spec) else {
            return Ok(());
        };
        let hostname = node.hostname().to_string();
        let src = config_path(&exp.spec, node);

        if let Some(node) = exp.spec.topology.find_node_mut(&hostname) {
            let dst = destination(node);
            node.add_inject(src.to_string_lossy(), dst, "", "NTP configuration");
            debug!(node = %hostname, dst, "injecting ntp configuration");
        }
        Ok(())
    }

    fn pre_start(&self, exp: &mut Experiment) -> AppResult<()> {
        let Some(node) = server(&exp.spec) else {
            return Ok(());
        };

        let address = node
            .network
            .interfaces
            .iter()
            .find(|i| i.vlan.eq_ignore_ascii_case("mgmt"))
            .map(|i| i.address.clone())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                AppError::failed(
                    self.name(),
                    format!("ntp server {} has no mgmt interface address", node.hostname()),
                )
            })?;

        let path = config_path(&exp.spec, node);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| AppError::io(dir, e))?;
        }
        fs::write(&path, render(node, &address)).map_err(|e| AppError::io(&path, e))?;

        let hostname = node.hostname().to_string();
        exp.status
            .set_app_status(self.name(), json!({ "server": hostname, "address": address }));
        Ok(())
    }
}
