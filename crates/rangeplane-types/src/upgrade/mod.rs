//! Upgrader registry: moves documents from older schema versions to the
//! stored one.
//!
//! Upgraders are keyed by `<kind>/<from version>` (lowercased) and may fan a
//! single input out into several current-version documents. The registry is
//! an explicit value built at startup; [`UpgraderRegistry::with_defaults`]
//! registers the upgraders shipped with this crate.

mod scenario;
mod topology;

use std::collections::HashMap;
use std::fmt::Display;

use serde_json::Value;
use tracing::{debug, warn};

use crate::decode::{decode_experiment, decode_scenario, decode_topology};
use crate::document::{Document, Kind, Metadata};
use crate::error::{TypesError, TypesResult};
use crate::experiment::Experiment;
use crate::v1::TopologySpec;
use crate::v2::ScenarioSpec;

pub use scenario::ScenarioV1;
pub use topology::{NODE_METADATA_APP, TopologyV0};

/// Pointer handed back when an experiment cannot be repaired automatically.
pub const DECODE_REMEDIATION: &str = "see KB EX-SC-UPG-01: recreate the experiment from the topology and \
                                      scenario named in its annotations";

/// Upgrades chained beyond this depth indicate an upgrader cycle.
const MAX_UPGRADE_DEPTH: usize = 8;

/// Transforms a spec at an older version into current-version documents.
pub trait Upgrader: Send + Sync {
    fn upgrade(&self, spec: &Value, metadata: &Metadata) -> TypesResult<Vec<Document>>;
}

impl<F> Upgrader for F
where
    F: Fn(&Value, &Metadata) -> TypesResult<Vec<Document>> + Send + Sync,
{
    fn upgrade(&self, spec: &Value, metadata: &Metadata) -> TypesResult<Vec<Document>> {
        self(spec, metadata)
    }
}

/// Registry key for an upgrader: `<kind>/<from>`, lowercased.
pub fn upgrader_key(kind: Kind, from: &str) -> String {
    format!("{}/{}", kind.as_str(), from).to_lowercase()
}

pub(crate) fn upgrade_failed(key: &str, err: impl Display) -> TypesError {
    TypesError::UpgradeFailed {
        key: key.to_string(),
        message: err.to_string(),
    }
}

#[derive(Default)]
pub struct UpgraderRegistry {
    upgraders: HashMap<String, Box<dyn Upgrader>>,
}

impl UpgraderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `topology/v0` and `scenario/v1`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .upgraders
            .insert(upgrader_key(Kind::Topology, "v0"), Box::new(TopologyV0));
        registry
            .upgraders
            .insert(upgrader_key(Kind::Scenario, "v1"), Box::new(ScenarioV1));
        registry
    }

    /// Register an upgrader. At most one upgrader may exist per key.
    pub fn register(&mut self, kind: Kind, from: &str, upgrader: impl Upgrader + 'static) -> TypesResult<()> {
        let key = upgrader_key(kind, from);
        if self.upgraders.contains_key(&key) {
            return Err(TypesError::DuplicateUpgrader(key));
        }
        debug!(%key, "registered upgrader");
        self.upgraders.insert(key, Box::new(upgrader));
        Ok(())
    }

    pub fn contains(&self, kind: Kind, from: &str) -> bool {
        self.upgraders.contains_key(&upgrader_key(kind, from))
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.upgraders.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Run the single upgrader registered for `kind/from`.
    pub fn upgrade(&self, kind: Kind, from: &str, spec: &Value, metadata: &Metadata) -> TypesResult<Vec<Document>> {
        let key = upgrader_key(kind, from);
        let upgrader = self
            .upgraders
            .get(&key)
            .ok_or_else(|| TypesError::NoUpgraderFound(key.clone()))?;
        debug!(%key, name = %metadata.name, "upgrading document");
        upgrader.upgrade(spec, metadata)
    }

    /// Upgrade a document, repeatedly if needed, until every produced
    /// document is at its stored version. Current documents pass through.
    pub fn upgrade_document(&self, doc: &Document) -> TypesResult<Vec<Document>> {
        self.upgrade_at_depth(doc, 0)
    }

    fn upgrade_at_depth(&self, doc: &Document, depth: usize) -> TypesResult<Vec<Document>> {
        if doc.is_current() {
            return Ok(vec![doc.clone()]);
        }
        let key = upgrader_key(doc.kind, doc.version());
        if depth >= MAX_UPGRADE_DEPTH {
            return Err(upgrade_failed(&key, "upgrade chain did not converge"));
        }

        let mut upgraded = Vec::new();
        for produced in self.upgrade(doc.kind, doc.version(), &doc.spec, &doc.metadata)? {
            if produced.kind == doc.kind && produced.version() == doc.version() {
                return Err(upgrade_failed(&key, "upgrader returned its input version"));
            }
            upgraded.extend(self.upgrade_at_depth(&produced, depth + 1)?);
        }
        Ok(upgraded)
    }

    /// Bring a document to its stored version and pick out the result of the
    /// same kind and name.
    fn current(&self, doc: &Document, kind: Kind) -> TypesResult<Document> {
        if doc.kind != kind {
            return Err(TypesError::KindMismatch {
                expected: kind,
                found: doc.kind,
            });
        }
        if doc.is_current() {
            return Ok(doc.clone());
        }
        let key = upgrader_key(doc.kind, doc.version());
        self.upgrade_document(doc)?
            .into_iter()
            .find(|d| d.kind == kind && d.name() == doc.name())
            .ok_or_else(|| upgrade_failed(&key, format!("no {kind} document named {} produced", doc.name())))
    }

    /// Decode a topology at any known version.
    pub fn topology(&self, doc: &Document) -> TypesResult<TopologySpec> {
        decode_topology(&self.current(doc, Kind::Topology)?)
    }

    /// Decode a scenario at any known version.
    pub fn scenario(&self, doc: &Document) -> TypesResult<ScenarioSpec> {
        decode_scenario(&self.current(doc, Kind::Scenario)?)
    }

    /// Decode an experiment, repairing embedded topology or scenario specs
    /// written in an older shape.
    ///
    /// When a decode fails and nothing embedded looks repairable, or the
    /// repaired spec still fails, the error is [`TypesError::Irrecoverable`]
    /// with a remediation pointer.
    pub fn experiment(&self, doc: &Document) -> TypesResult<Experiment> {
        let doc = self.current(doc, Kind::Experiment)?;
        let message = match decode_experiment(&doc) {
            Ok(exp) => return Ok(exp),
            Err(TypesError::Decode { message, .. }) => message,
            Err(err) => return Err(err),
        };

        let irrecoverable = |message: String| TypesError::Irrecoverable {
            name: doc.name().to_string(),
            message,
            remediation: DECODE_REMEDIATION,
        };

        let mut repaired = doc.clone();
        match self.repair_embedded(&mut repaired.spec) {
            Ok(true) => {}
            Ok(false) => return Err(irrecoverable(message)),
            Err(err) => return Err(irrecoverable(err.to_string())),
        }

        match decode_experiment(&repaired) {
            Ok(exp) => {
                debug!(experiment = %doc.name(), "recovered experiment with legacy embedded specs");
                Ok(exp)
            }
            Err(err) => {
                warn!(experiment = %doc.name(), error = %err, "experiment decode failed after repair");
                Err(irrecoverable(err.to_string()))
            }
        }
    }

    /// Upgrade embedded topology/scenario specs in place. Returns whether
    /// anything changed.
    fn repair_embedded(&self, spec: &mut Value) -> TypesResult<bool> {
        let mut changed = false;

        if let Some(scenario) = spec.get_mut("scenario") {
            if scenario.get("apps").is_some_and(Value::is_object) {
                let legacy = Document::raw(Kind::Scenario, "v1", Metadata::named("embedded"), scenario.take());
                *scenario = self.current(&legacy, Kind::Scenario)?.spec;
                changed = true;
            }
        }

        if let Some(topology) = spec.get_mut("topology") {
            if serde_json::from_value::<TopologySpec>(topology.clone()).is_err() {
                let legacy = Document::raw(Kind::Topology, "v0", Metadata::named("embedded"), topology.take());
                *topology = self.current(&legacy, Kind::Topology)?.spec;
                changed = true;
            }
        }

        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::decode::ensure_current;

    fn legacy_inputs() -> Vec<Document> {
        vec![
            Document::raw(
                Kind::Topology,
                "v0",
                Metadata::named("legacy-topo"),
                json!({"nodes": [
                    {"general": {"hostname": "a"}, "hardware": {"vcpus": "2", "memory": "2048"},
                     "metadata": {"role": "server"}}
                ]}),
            ),
            Document::raw(
                Kind::Scenario,
                "v1",
                Metadata::named("legacy-scenario"),
                json!({"apps": {"experiment": [{"name": "ntp"}], "host": []}}),
            ),
        ]
    }

    #[test]
    fn every_registered_upgrader_produces_decodable_current_documents() {
        let registry = UpgraderRegistry::with_defaults();
        let inputs = legacy_inputs();
        assert_eq!(registry.keys(), vec!["scenario/v1", "topology/v0"]);

        for input in &inputs {
            let produced = registry
                .upgrade(input.kind, input.version(), &input.spec, &input.metadata)
                .unwrap();
            assert!(produced.iter().any(|d| d.kind == input.kind));
            for doc in produced.iter().filter(|d| d.kind == input.kind) {
                ensure_current(doc, input.kind).unwrap();
                match doc.kind {
                    Kind::Topology => assert!(!decode_topology(doc).unwrap().nodes.is_empty()),
                    Kind::Scenario => assert!(!decode_scenario(doc).unwrap().apps.is_empty()),
                    other => panic!("unexpected kind {other}"),
                }
            }
        }
    }

    #[test]
    fn keys_are_case_insensitive() {
        assert_eq!(upgrader_key(Kind::Topology, "V0"), "topology/v0");
        let registry = UpgraderRegistry::with_defaults();
        assert!(registry.contains(Kind::Topology, "V0"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = UpgraderRegistry::with_defaults();
        let err = registry
            .register(Kind::Scenario, "V1", |_: &Value, _: &Metadata| -> TypesResult<Vec<Document>> { Ok(Vec::new()) })
            .unwrap_err();
        assert!(matches!(err, TypesError::DuplicateUpgrader(key) if key == "scenario/v1"));
    }

    #[test]
    fn missing_upgrader_is_a_hard_error() {
        let registry = UpgraderRegistry::new();
        let doc = &legacy_inputs()[0];
        assert!(matches!(registry.topology(doc), Err(TypesError::NoUpgraderFound(k)) if k == "topology/v0"));
    }

    #[test]
    fn upgrades_chain_until_current() {
        let mut registry = UpgraderRegistry::new();
        registry
            .register(Kind::Image, "v-1", |spec: &Value, md: &Metadata| -> TypesResult<Vec<Document>> {
                Ok(vec![Document::raw(Kind::Image, "v0", md.clone(), spec.clone())])
            })
            .unwrap();
        registry
            .register(Kind::Image, "v0", |spec: &Value, md: &Metadata| -> TypesResult<Vec<Document>> {
                Ok(vec![Document::raw(Kind::Image, "v1", md.clone(), spec.clone())])
            })
            .unwrap();

        let doc = Document::raw(Kind::Image, "v-1", Metadata::named("i"), json!({"variant": "minbase", "release": "jammy"}));
        let out = registry.upgrade_document(&doc).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].is_current());
    }

    #[test]
    fn non_advancing_upgrader_fails() {
        let mut registry = UpgraderRegistry::new();
        registry
            .register(Kind::Image, "v0", |spec: &Value, md: &Metadata| -> TypesResult<Vec<Document>> {
                Ok(vec![Document::raw(Kind::Image, "v0", md.clone(), spec.clone())])
            })
            .unwrap();
        let doc = Document::raw(Kind::Image, "v0", Metadata::named("i"), json!({}));
        assert!(matches!(registry.upgrade_document(&doc), Err(TypesError::UpgradeFailed { .. })));
    }

    #[test]
    fn legacy_topology_decodes_through_registry() {
        let registry = UpgraderRegistry::with_defaults();
        let topo = registry.topology(&legacy_inputs()[0]).unwrap();
        assert_eq!(topo.nodes[0].hardware.vcpus, 2);
    }

    fn experiment_doc(scenario: Value, topology: Value) -> Document {
        Document::raw(
            Kind::Experiment,
            "v1",
            Metadata::named("net1"),
            json!({"experimentName": "net1", "topology": topology, "scenario": scenario}),
        )
    }

    #[test]
    fn experiment_with_legacy_embedded_scenario_is_recovered() {
        let registry = UpgraderRegistry::with_defaults();
        let doc = experiment_doc(
            json!({"apps": {"experiment": [{"name": "ntp"}], "host": [
                {"name": "protonuke", "hosts": [{"hostname": "a"}]}
            ]}}),
            json!({"nodes": [{"general": {"hostname": "a"}, "hardware": {"vcpus": "1"}}]}),
        );

        let exp = registry.experiment(&doc).unwrap();
        let scenario = exp.spec.scenario.unwrap();
        assert_eq!(scenario.apps.len(), 2);
        assert_eq!(exp.spec.topology.nodes[0].hardware.vcpus, 1);
    }

    #[test]
    fn unrepairable_experiment_carries_remediation() {
        let registry = UpgraderRegistry::with_defaults();
        let doc = experiment_doc(json!({"apps": "garbage"}), json!({"nodes": []}));
        let err = registry.experiment(&doc).unwrap_err();
        assert!(matches!(err, TypesError::Irrecoverable { remediation, .. } if remediation == DECODE_REMEDIATION));
        assert!(err.to_string().contains("EX-SC-UPG-01"));
    }
}
