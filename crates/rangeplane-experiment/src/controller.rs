//! The experiment lifecycle controller.
//!
//! ```text
//! create ──► configured ──schedule──► configured
//!                │                        │
//!                └────────start───────────┘
//!                          ▼
//!              started ──stop──► stopped ──start──► started
//!                                   │
//!                              delete (also from configured)
//! ```
//!
//! Every operation takes the `experiment|<name>` lock for its duration, and
//! persists the experiment only once every step has succeeded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rangeplane_apps::{Action, AppRegistry, PipelineReport};
use rangeplane_cluster::{ClusterBackend, ClusterResult, write_script};
use rangeplane_lock::{LockCache, LockGuard, LockStatus, experiment_key};
use rangeplane_scheduler::SchedulerRegistry;
use rangeplane_store::DocumentStore;
use rangeplane_types::{
    Experiment, ExperimentSpec, Kind, Metadata, SCENARIO_ANNOTATION, ScenarioSpec, TOPOLOGY_ANNOTATION,
    TopologySpec, TypesError, UpgraderRegistry,
};
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::{ExperimentError, ExperimentResult, Failure};

/// Parameters for [`Controller::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub name: String,
    pub topology: String,
    pub scenario: Option<String>,
    /// Defaults to `<root>/experiments/<name>`.
    pub base_dir: Option<PathBuf>,
    pub vlan_min: u32,
    pub vlan_max: u32,
}

impl CreateRequest {
    pub fn new(name: impl Into<String>, topology: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topology: topology.into(),
            ..Default::default()
        }
    }

    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_vlan_range(mut self, min: u32, max: u32) -> Self {
        self.vlan_min = min;
        self.vlan_max = max;
        self
    }
}

/// Parameters for [`Controller::start`].
#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    pub name: String,
    pub dry_run: bool,
    /// Each non-zero bound replaces the matching bound of the experiment's
    /// VLAN range.
    pub vlan_min: u32,
    pub vlan_max: u32,
    /// Pinned VLAN IDs, replacing any existing allocation.
    pub vlan_aliases: BTreeMap<String, u32>,
}

impl StartRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_vlan_range(mut self, min: u32, max: u32) -> Self {
        self.vlan_min = min;
        self.vlan_max = max;
        self
    }

    pub fn with_vlan_alias(mut self, alias: impl Into<String>, id: u32) -> Self {
        self.vlan_aliases.insert(alias.into(), id);
        self
    }
}

/// An experiment after a lifecycle step, with what each app pipeline phase
/// run by that step did.
#[derive(Debug, Clone)]
pub struct Applied {
    pub experiment: Experiment,
    /// In run order.
    pub reports: Vec<PipelineReport>,
}

impl Applied {
    fn new(experiment: Experiment, reports: Vec<PipelineReport>) -> Self {
        Self { experiment, reports }
    }

    /// Scenario apps that were skipped because nothing implements them,
    /// each named once.
    pub fn missing_apps(&self) -> Vec<&str> {
        let mut missing: Vec<&str> = Vec::new();
        for app in self.reports.iter().flat_map(PipelineReport::missing) {
            if !missing.contains(&app) {
                missing.push(app);
            }
        }
        missing
    }
}

/// Orchestrates experiment lifecycles over a document store and a cluster
/// backend.
pub struct Controller {
    /// Source of truth for every document.
    store: Arc<dyn DocumentStore>,
    /// Executes VM and namespace operations.
    backend: Arc<dyn ClusterBackend>,
    upgraders: Arc<UpgraderRegistry>,
    schedulers: Arc<SchedulerRegistry>,
    apps: Arc<AppRegistry>,
    locks: Arc<LockCache>,
    config: ControllerConfig,
}

impl Controller {
    /// A controller with the default upgraders and schedulers and a private
    /// lock cache.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        backend: Arc<dyn ClusterBackend>,
        apps: Arc<AppRegistry>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            backend,
            upgraders: Arc::new(UpgraderRegistry::with_defaults()),
            schedulers: Arc::new(SchedulerRegistry::with_defaults()),
            apps,
            locks: Arc::new(LockCache::new()),
            config,
        }
    }

    pub fn with_upgraders(mut self, upgraders: Arc<UpgraderRegistry>) -> Self {
        self.upgraders = upgraders;
        self
    }

    pub fn with_schedulers(mut self, schedulers: Arc<SchedulerRegistry>) -> Self {
        self.schedulers = schedulers;
        self
    }

    /// Share a lock cache with other controllers in this process.
    pub fn with_locks(mut self, locks: Arc<LockCache>) -> Self {
        self.locks = locks;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn backend(&self) -> &Arc<dyn ClusterBackend> {
        &self.backend
    }

    pub fn apps(&self) -> &AppRegistry {
        &self.apps
    }

    pub fn schedulers(&self) -> &SchedulerRegistry {
        &self.schedulers
    }

    pub fn locks(&self) -> &LockCache {
        &self.locks
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    // ── Entry points ─────────────────────────────────────────────

    /// Build, configure and persist a new experiment.
    pub fn create(&self, request: CreateRequest) -> Result<Applied, Failure> {
        self.create_experiment(request).map_err(Failure::new)
    }

    /// Assign every node to a cluster host with the named algorithm.
    pub fn schedule(&self, name: &str, algorithm: &str) -> Result<Experiment, Failure> {
        self.schedule_experiment(name, algorithm).map_err(Failure::new)
    }

    pub fn start(&self, request: StartRequest) -> Result<Applied, Failure> {
        self.start_experiment(&request).map_err(Failure::new)
    }

    pub fn stop(&self, name: &str) -> Result<Applied, Failure> {
        self.stop_experiment(name).map_err(Failure::new)
    }

    pub fn delete(&self, name: &str) -> Result<(), Failure> {
        self.delete_experiment(name).map_err(Failure::new)
    }

    pub fn get(&self, name: &str) -> Result<Experiment, Failure> {
        self.load(name).map_err(Failure::new)
    }

    /// Every stored experiment that decodes. Undecodable documents are
    /// logged and skipped.
    pub fn list(&self) -> Result<Vec<Experiment>, Failure> {
        self.decodable_experiments().map_err(Failure::new)
    }

    /// Fraction of `expected` VMs the backend no longer has queued.
    pub fn progress(&self, name: &str, expected: usize) -> Result<f64, Failure> {
        self.backend
            .launch_progress(name, expected)
            .map_err(|e| Failure::new(e.into()))
    }

    // ── Operations ───────────────────────────────────────────────

    pub(crate) fn lock_experiment(&self, name: &str, status: LockStatus) -> ExperimentResult<LockGuard<'_>> {
        let ttl = self.config.ttls.experiment(status);
        Ok(self.locks.acquire(&experiment_key(name), status, ttl)?)
    }

    pub(crate) fn decodable_experiments(&self) -> ExperimentResult<Vec<Experiment>> {
        let docs = self.store.list(&[Kind::Experiment])?;
        Ok(docs
            .iter()
            .filter_map(|doc| match self.upgraders.experiment(doc) {
                Ok(exp) => Some(exp),
                Err(err) => {
                    warn!(experiment = %doc.name(), error = %err, "skipping undecodable experiment");
                    None
                }
            })
            .collect())
    }

    pub(crate) fn load(&self, name: &str) -> ExperimentResult<Experiment> {
        let doc = self.store.get(Kind::Experiment, name)?;
        Ok(self.upgraders.experiment(&doc)?)
    }

    pub(crate) fn persist(&self, exp: &mut Experiment) -> ExperimentResult<()> {
        let mut doc = exp.to_document()?;
        self.store.update(&mut doc)?;
        exp.metadata = doc.metadata;
        Ok(())
    }

    fn load_topology(&self, name: &str) -> ExperimentResult<TopologySpec> {
        let doc = self.store.get(Kind::Topology, name)?;
        Ok(self.upgraders.topology(&doc)?)
    }

    fn load_scenario(&self, name: &str, topology: &str) -> ExperimentResult<ScenarioSpec> {
        let doc = self.store.get(Kind::Scenario, name)?;
        let expected = doc.metadata.annotation(TOPOLOGY_ANNOTATION).unwrap_or_default();
        if expected != topology {
            return Err(ExperimentError::Mismatch {
                scenario: name.to_string(),
                expected: expected.to_string(),
                topology: topology.to_string(),
            });
        }
        Ok(self.upgraders.scenario(&doc)?)
    }

    fn create_experiment(&self, req: CreateRequest) -> ExperimentResult<Applied> {
        if req.name.is_empty() || req.name.contains(&['/', '|'][..]) {
            return Err(ExperimentError::InvalidRequest(format!(
                "invalid experiment name {:?}",
                req.name
            )));
        }
        if req.topology.is_empty() {
            return Err(ExperimentError::InvalidRequest("topology is required".into()));
        }

        let _guard = self.lock_experiment(&req.name, LockStatus::Creating)?;

        if self.store.exists(Kind::Experiment, &req.name)? {
            return Err(ExperimentError::AlreadyExists {
                kind: Kind::Experiment,
                name: req.name,
            });
        }

        let topology = self.load_topology(&req.topology)?;
        let scenario = match &req.scenario {
            Some(name) => Some(self.load_scenario(name, &req.topology)?),
            None => None,
        };

        let mut spec = ExperimentSpec::new(&req.name, topology, scenario);
        if let Some(dir) = req.base_dir {
            spec.base_dir = dir;
        }
        if req.vlan_min != 0 || req.vlan_max != 0 {
            spec.set_vlan_range(req.vlan_min, req.vlan_max, false)?;
        }
        spec.set_defaults(&self.config.root);

        if let Err(err) = spec.verify_scenario() {
            return Err(match err {
                TypesError::Validation(problems) => ExperimentError::Verification(problems),
                other => other.into(),
            });
        }

        let mut metadata = Metadata::named(&req.name).with_annotation(TOPOLOGY_ANNOTATION, &req.topology);
        if let Some(scenario) = &req.scenario {
            metadata = metadata.with_annotation(SCENARIO_ANNOTATION, scenario);
        }
        let mut exp = Experiment::new(metadata, spec);

        let report = self.apps.apply(Action::Configure, &mut exp)?;
        exp.spec.validate()?;

        let mut doc = exp.to_document()?;
        self.store.create(&mut doc)?;
        exp.metadata = doc.metadata;

        info!(
            experiment = %exp.name(),
            topology = %req.topology,
            scenario = req.scenario.as_deref().unwrap_or("-"),
            apps = report.applied().len(),
            missing = report.missing().len(),
            "experiment created"
        );
        Ok(Applied::new(exp, vec![report]))
    }

    fn schedule_experiment(&self, name: &str, algorithm: &str) -> ExperimentResult<Experiment> {
        let _guard = self.lock_experiment(name, LockStatus::Scheduling)?;
        let mut exp = self.load(name)?;
        if exp.running() {
            return Err(ExperimentError::AlreadyRunning {
                name: name.to_string(),
                started: exp.status.start_time.clone(),
            });
        }

        let hosts = self.backend.cluster_hosts()?;
        self.schedulers.schedule(algorithm, &mut exp.spec, &hosts)?;
        self.persist(&mut exp)?;
        Ok(exp)
    }

    fn start_experiment(&self, req: &StartRequest) -> ExperimentResult<Applied> {
        let name = req.name.as_str();
        let _guard = self.lock_experiment(name, LockStatus::Starting)?;
        let mut exp = self.load(name)?;

        if exp.running() && !exp.dry_run() {
            return Err(ExperimentError::AlreadyRunning {
                name: name.to_string(),
                started: exp.status.start_time.clone(),
            });
        }
        exp.status.clear();

        if req.vlan_min != 0 || req.vlan_max != 0 {
            let min = if req.vlan_min != 0 { req.vlan_min } else { exp.spec.vlans.min };
            let max = if req.vlan_max != 0 { req.vlan_max } else { exp.spec.vlans.max };
            exp.spec.set_vlan_range(min, max, true)?;
        }
        for (alias, id) in &req.vlan_aliases {
            exp.spec.set_vlan_alias(alias, *id, true)?;
        }

        let pre_start = self.apps.apply(Action::PreStart, &mut exp)?;
        let script = write_script(&exp.spec)?;

        if req.dry_run {
            exp.status.schedules = exp.spec.schedules.clone();
            exp.status.vlans = exp.spec.vlans.aliases.clone();
        } else {
            match self.launch(name, &script) {
                Ok((schedules, vlans)) => {
                    exp.status.schedules = schedules;
                    exp.status.vlans = vlans;
                }
                Err(err) => {
                    self.clear_namespace_best_effort(name);
                    return Err(err.into());
                }
            }
        }

        exp.status.mark_started(Utc::now(), req.dry_run);

        let post_start = self
            .apps
            .apply(Action::PostStart, &mut exp)
            .map_err(ExperimentError::from)
            .and_then(|report| self.persist(&mut exp).map(|()| report));
        let post_start = match post_start {
            Ok(report) => report,
            Err(err) => {
                if !req.dry_run {
                    self.clear_namespace_best_effort(name);
                }
                return Err(err);
            }
        };

        info!(
            experiment = %name,
            dry_run = req.dry_run,
            vms = exp.spec.topology.nodes.len(),
            "experiment started"
        );
        Ok(Applied::new(exp, vec![pre_start, post_start]))
    }

    /// Submit the script and read back what the backend realised.
    fn launch(&self, namespace: &str, script: &Path) -> ClusterResult<(BTreeMap<String, String>, BTreeMap<String, u32>)> {
        self.backend.load_script(script)?;
        self.backend.launch(namespace)?;
        let schedules = self
            .backend
            .vm_info(namespace)?
            .into_iter()
            .map(|vm| (vm.name, vm.host))
            .collect();
        let vlans = self.backend.vlans(namespace)?;
        debug!(%namespace, "read back realised placement");
        Ok((schedules, vlans))
    }

    fn clear_namespace_best_effort(&self, namespace: &str) {
        match self.backend.clear_namespace(namespace) {
            Ok(()) => debug!(%namespace, "cleared namespace after failed start"),
            Err(err) => warn!(%namespace, error = %err, "cleanup after failed start also failed"),
        }
    }

    fn stop_experiment(&self, name: &str) -> ExperimentResult<Applied> {
        let _guard = self.lock_experiment(name, LockStatus::Stopping)?;
        let mut exp = self.load(name)?;
        if !exp.running() {
            return Err(ExperimentError::NotRunning(name.to_string()));
        }
        let dry_run = exp.dry_run();

        let report = self.apps.apply(Action::Cleanup, &mut exp)?;
        if !dry_run {
            self.backend.clear_namespace(name)?;
        }
        exp.status.clear();
        self.persist(&mut exp)?;

        info!(experiment = %name, dry_run, "experiment stopped");
        Ok(Applied::new(exp, vec![report]))
    }

    fn delete_experiment(&self, name: &str) -> ExperimentResult<()> {
        let _guard = self.lock_experiment(name, LockStatus::Deleting)?;
        let doc = self.store.get(Kind::Experiment, name)?;
        // An undecodable experiment can still be removed; its start marker
        // is read straight from the stored status.
        let started = match self.upgraders.experiment(&doc) {
            Ok(exp) => exp.status.start_time,
            Err(err) => {
                warn!(experiment = %name, error = %err, "experiment does not decode, reading the stored start marker");
                doc.status
                    .as_ref()
                    .and_then(|status| status.get("startTime"))
                    .and_then(|marker| marker.as_str())
                    .unwrap_or_default()
                    .to_string()
            }
        };
        if !started.is_empty() {
            return Err(ExperimentError::AlreadyRunning {
                name: name.to_string(),
                started,
            });
        }
        self.store.delete(Kind::Experiment, name)?;
        info!(experiment = %name, "experiment deleted");
        Ok(())
    }
}
