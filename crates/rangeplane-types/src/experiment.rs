use serde_json::Value;

use crate::decode::decode_experiment;
use crate::document::{Document, Kind, Metadata};
use crate::error::{TypesError, TypesResult};
use crate::v1::{ExperimentSpec, ExperimentStatus};
use crate::v2::ScenarioApp;

/// Annotation naming the topology an experiment was built from.
pub const TOPOLOGY_ANNOTATION: &str = "topology";
/// Annotation naming the scenario an experiment was built from.
pub const SCENARIO_ANNOTATION: &str = "scenario";

/// A typed experiment: metadata plus decoded spec and status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Experiment {
    pub metadata: Metadata,
    pub spec: ExperimentSpec,
    pub status: ExperimentStatus,
}

impl Experiment {
    pub fn new(metadata: Metadata, spec: ExperimentSpec) -> Self {
        Self {
            metadata,
            spec,
            status: ExperimentStatus::default(),
        }
    }

    pub fn from_document(doc: &Document) -> TypesResult<Self> {
        decode_experiment(doc)
    }

    pub fn to_document(&self) -> TypesResult<Document> {
        let mut doc = Document::from_spec(Kind::Experiment, self.metadata.clone(), &self.spec)?;
        let status = serde_json::to_value(&self.status).map_err(|e| TypesError::Encode {
            kind: Kind::Experiment,
            message: e.to_string(),
        })?;
        doc.status = Some(status);
        Ok(doc)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn running(&self) -> bool {
        self.status.running()
    }

    pub fn dry_run(&self) -> bool {
        self.status.dry_run()
    }

    pub fn experiment_apps(&self) -> impl Iterator<Item = &ScenarioApp> {
        self.spec.scenario.iter().flat_map(|s| s.experiment_apps())
    }

    pub fn host_apps(&self) -> impl Iterator<Item = &ScenarioApp> {
        self.spec.scenario.iter().flat_map(|s| s.host_apps())
    }

    /// Status recorded by a given app, if any.
    pub fn app_status(&self, app: &str) -> Option<&Value> {
        self.status.apps.get(app)
    }
}
