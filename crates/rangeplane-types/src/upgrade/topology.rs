use serde_json::Value;

use super::{Upgrader, upgrade_failed, upgrader_key};
use crate::document::{Document, Kind, Metadata};
use crate::error::TypesResult;
use crate::experiment::TOPOLOGY_ANNOTATION;
use crate::v0;
use crate::v1;
use crate::v2::{AppHost, ScenarioApp, ScenarioSpec};

/// Host app that carries per-node metadata lifted out of legacy topologies.
pub const NODE_METADATA_APP: &str = "node-metadata";

/// `topology/v0` to Topology v1, plus a companion Scenario v2 when any node
/// carried metadata.
pub struct TopologyV0;

impl Upgrader for TopologyV0 {
    fn upgrade(&self, spec: &Value, metadata: &Metadata) -> TypesResult<Vec<Document>> {
        let key = upgrader_key(Kind::Topology, "v0");
        let legacy: v0::TopologySpec = serde_json::from_value(spec.clone()).map_err(|e| upgrade_failed(&key, e))?;

        let mut hosts = Vec::new();
        let mut nodes = Vec::with_capacity(legacy.nodes.len());
        for node in legacy.nodes {
            let (node, node_metadata) = node.into_current(&metadata.name);
            if let Some(node_metadata) = node_metadata {
                hosts.push(AppHost {
                    hostname: node.hostname().to_string(),
                    metadata: node_metadata,
                });
            }
            nodes.push(node);
        }

        let topology = v1::TopologySpec { nodes };
        let mut documents = vec![Document::from_spec(Kind::Topology, metadata.clone(), &topology)?];

        if !hosts.is_empty() {
            let scenario = ScenarioSpec {
                apps: vec![ScenarioApp {
                    name: NODE_METADATA_APP.to_string(),
                    hosts,
                    ..Default::default()
                }],
            };
            let scenario_md = Metadata::named(&metadata.name).with_annotation(TOPOLOGY_ANNOTATION, &metadata.name);
            documents.push(Document::from_spec(Kind::Scenario, scenario_md, &scenario)?);
        }

        Ok(documents)
    }
}
