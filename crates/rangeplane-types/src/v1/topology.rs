use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::de::lenient_u32;

/// Bridge interfaces attach to when the topology does not name one.
pub const DEFAULT_BRIDGE: &str = "rangeplane";

/// A set of nodes and the networks connecting them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologySpec {
    #[serde(default)]
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type", default)]
    pub node_type: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    pub general: General,

    #[serde(default)]
    pub hardware: Hardware,

    #[serde(default)]
    pub network: Network,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub injections: Vec<Injection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct General {
    pub hostname: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default)]
    pub vm_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub do_not_boot: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hardware {
    #[serde(default)]
    pub cpu: String,

    #[serde(default)]
    pub vcpus: u32,

    #[serde(default)]
    pub memory: u32,

    #[serde(default)]
    pub os_type: String,

    #[serde(default)]
    pub drives: Vec<Drive>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Drive {
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inject_partition: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub interfaces: Vec<Interface>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,

    #[serde(rename = "type", default)]
    pub iface_type: String,

    #[serde(default)]
    pub proto: String,

    #[serde(default)]
    pub vlan: String,

    #[serde(default)]
    pub address: String,

    #[serde(default, deserialize_with = "lenient_u32")]
    pub mask: u32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gateway: String,

    #[serde(default)]
    pub bridge: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub destination: String,
    pub next: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<u32>,
}

/// A file copied into a node's disk image before boot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Injection {
    pub src: String,
    pub dst: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub permissions: String,
}

impl Node {
    pub fn hostname(&self) -> &str {
        &self.general.hostname
    }

    pub fn is_router(&self) -> bool {
        self.node_type.eq_ignore_ascii_case("router")
    }

    pub fn do_not_boot(&self) -> bool {
        self.general.do_not_boot.unwrap_or(false)
    }

    /// Add an injection, replacing any existing one with the same destination.
    pub fn add_inject(&mut self, src: impl Into<String>, dst: impl Into<String>, perms: &str, desc: &str) {
        let dst = dst.into();
        self.injections.retain(|i| i.dst != dst);
        self.injections.push(Injection {
            src: src.into(),
            dst,
            description: desc.to_string(),
            permissions: perms.to_string(),
        });
    }

    fn set_defaults(&mut self) {
        if self.general.vm_type.is_empty() {
            self.general.vm_type = "kvm".into();
        }
        let hw = &mut self.hardware;
        if hw.cpu.is_empty() {
            hw.cpu = "Broadwell".into();
        }
        if hw.vcpus == 0 {
            hw.vcpus = 1;
        }
        if hw.memory == 0 {
            hw.memory = 512;
        }
        if hw.os_type.is_empty() {
            hw.os_type = "linux".into();
        }
        for iface in &mut self.network.interfaces {
            if iface.bridge.is_empty() {
                iface.bridge = DEFAULT_BRIDGE.into();
            }
        }
    }
}

impl TopologySpec {
    pub fn set_defaults(&mut self) {
        for node in &mut self.nodes {
            node.set_defaults();
        }
    }

    pub fn find_node(&self, hostname: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.hostname() == hostname)
    }

    pub fn find_node_mut(&mut self, hostname: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.hostname() == hostname)
    }

    /// Nodes carrying at least one of the given label keys.
    pub fn find_nodes_with_labels(&self, labels: &[&str]) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| labels.iter().any(|l| n.labels.contains_key(*l)))
            .collect()
    }

    pub fn hostnames(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(Node::hostname)
    }

    /// Distinct VLAN aliases referenced by any interface, sorted.
    pub fn vlan_aliases(&self) -> BTreeSet<&str> {
        self.nodes
            .iter()
            .flat_map(|n| n.network.interfaces.iter())
            .map(|i| i.vlan.as_str())
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// Structural problems in the topology, empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut seen = BTreeSet::new();

        for (idx, node) in self.nodes.iter().enumerate() {
            let hostname = node.hostname();
            if hostname.is_empty() {
                problems.push(format!("node {idx} has no hostname"));
                continue;
            }
            if !seen.insert(hostname) {
                problems.push(format!("duplicate hostname {hostname}"));
            }
            for drive in &node.hardware.drives {
                if drive.image.is_empty() {
                    problems.push(format!("node {hostname} has a drive without an image"));
                }
            }
            let mut names = BTreeSet::new();
            for iface in &node.network.interfaces {
                if !names.insert(iface.name.as_str()) {
                    problems.push(format!("node {hostname} has duplicate interface {}", iface.name));
                }
                if iface.mask > 32 {
                    problems.push(format!(
                        "node {hostname} interface {} has invalid mask {}",
                        iface.name, iface.mask
                    ));
                }
            }
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(hostname: &str) -> Node {
        Node {
            node_type: "VirtualMachine".into(),
            general: General {
                hostname: hostname.into(),
                ..Default::default()
            },
            network: Network {
                interfaces: vec![Interface {
                    name: "eth0".into(),
                    vlan: "EXP".into(),
                    address: "10.0.0.1".into(),
                    mask: 24,
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn defaults_fill_hardware_and_bridge() {
        let mut topo = TopologySpec {
            nodes: vec![node("a")],
        };
        topo.set_defaults();
        let n = &topo.nodes[0];
        assert_eq!(n.general.vm_type, "kvm");
        assert_eq!(n.hardware.vcpus, 1);
        assert_eq!(n.hardware.memory, 512);
        assert_eq!(n.hardware.os_type, "linux");
        assert_eq!(n.network.interfaces[0].bridge, DEFAULT_BRIDGE);
    }

    #[test]
    fn validate_reports_duplicates_and_bad_masks() {
        let mut b = node("a");
        b.network.interfaces[0].mask = 40;
        let topo = TopologySpec {
            nodes: vec![node("a"), b, node("")],
        };
        let problems = topo.validate();
        assert_eq!(problems.len(), 3, "{problems:?}");
        assert!(problems.iter().any(|p| p.contains("duplicate hostname a")));
        assert!(problems.iter().any(|p| p.contains("invalid mask 40")));
        assert!(problems.iter().any(|p| p.contains("no hostname")));
    }

    #[test]
    fn add_inject_replaces_same_destination() {
        let mut n = node("a");
        n.add_inject("/tmp/one", "/etc/ntp.conf", "0644", "");
        n.add_inject("/tmp/two", "/etc/ntp.conf", "0644", "ntp");
        assert_eq!(n.injections.len(), 1);
        assert_eq!(n.injections[0].src, "/tmp/two");
    }

    #[test]
    fn label_lookup_matches_any_label() {
        let mut a = node("a");
        a.labels.insert("ntp-server".into(), "true".into());
        a.labels.insert("site".into(), "x".into());
        let topo = TopologySpec {
            nodes: vec![a, node("b")],
        };
        assert_eq!(topo.find_nodes_with_labels(&["ntp-server"]).len(), 1);
        assert_eq!(topo.find_nodes_with_labels(&["other", "site"]).len(), 1);
        assert!(topo.find_nodes_with_labels(&["other"]).is_empty());
        assert_eq!(topo.vlan_aliases().into_iter().collect::<Vec<_>>(), vec!["EXP"]);
    }
}
