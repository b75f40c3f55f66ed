use serde_json::Value;

use super::{Upgrader, upgrade_failed, upgrader_key};
use crate::document::{Document, Kind, Metadata};
use crate::error::TypesResult;
use crate::v1::scenario as legacy;
use crate::v2::{AppHost, ScenarioApp, ScenarioSpec};

/// `scenario/v1` to Scenario v2: experiment apps first, then host apps, each
/// list keeping its order.
pub struct ScenarioV1;

impl Upgrader for ScenarioV1 {
    fn upgrade(&self, spec: &Value, metadata: &Metadata) -> TypesResult<Vec<Document>> {
        let key = upgrader_key(Kind::Scenario, "v1");
        let old: legacy::ScenarioSpec = serde_json::from_value(spec.clone()).map_err(|e| upgrade_failed(&key, e))?;

        let experiment = old.apps.experiment.into_iter().map(|app| ScenarioApp {
            name: app.name,
            asset_dir: app.asset_dir,
            metadata: app.metadata,
            hosts: Vec::new(),
        });
        let host = old.apps.host.into_iter().map(|app| ScenarioApp {
            name: app.name,
            asset_dir: app.asset_dir,
            metadata: Default::default(),
            hosts: app
                .hosts
                .into_iter()
                .map(|h| AppHost {
                    hostname: h.hostname,
                    metadata: h.metadata,
                })
                .collect(),
        });

        let scenario = ScenarioSpec {
            apps: experiment.chain(host).collect(),
        };
        Ok(vec![Document::from_spec(Kind::Scenario, metadata.clone(), &scenario)?])
    }
}
