//! Legacy topology shape, read only as upgrade input.
//!
//! Differs from v1 in two ways: hardware integers were often written as
//! strings, and nodes could carry a free-form `metadata` map that now lives
//! in a companion scenario.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::de::lenient_u32;
use crate::v1;

/// Where legacy deployments kept topology files; relative injection sources
/// were resolved against `<root>/<topology name>`.
pub const LEGACY_TOPOLOGY_ROOT: &str = "/rangeplane/topologies";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopologySpec {
    #[serde(default)]
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Node {
    #[serde(rename = "type", default)]
    pub node_type: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    pub general: v1::General,

    #[serde(default)]
    pub hardware: Hardware,

    #[serde(default)]
    pub network: v1::Network,

    #[serde(default)]
    pub injections: Vec<v1::Injection>,

    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hardware {
    #[serde(default)]
    pub cpu: String,

    #[serde(default, deserialize_with = "lenient_u32")]
    pub vcpus: u32,

    #[serde(default, deserialize_with = "lenient_u32")]
    pub memory: u32,

    #[serde(default)]
    pub os_type: String,

    #[serde(default)]
    pub drives: Vec<v1::Drive>,
}

impl Node {
    /// Convert to the v1 shape, rebasing relative injection sources under
    /// the legacy topology directory. Returns node metadata separately.
    pub fn into_current(self, topology: &str) -> (v1::Node, Option<Map<String, Value>>) {
        let injections = self
            .injections
            .into_iter()
            .map(|mut inject| {
                if !Path::new(&inject.src).is_absolute() {
                    inject.src = format!("{LEGACY_TOPOLOGY_ROOT}/{topology}/{}", inject.src);
                }
                inject
            })
            .collect();

        let node = v1::Node {
            node_type: self.node_type,
            labels: self.labels,
            general: self.general,
            hardware: v1::Hardware {
                cpu: self.hardware.cpu,
                vcpus: self.hardware.vcpus,
                memory: self.hardware.memory,
                os_type: self.hardware.os_type,
                drives: self.hardware.drives,
            },
            network: self.network,
            injections,
        };

        (node, self.metadata.filter(|m| !m.is_empty()))
    }
}
