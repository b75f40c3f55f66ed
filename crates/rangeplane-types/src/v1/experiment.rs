use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::topology::TopologySpec;
use crate::error::{TypesError, TypesResult};
use crate::v2::ScenarioSpec;

/// Suffix appended to the start-time marker of a dry-run start.
pub const DRY_RUN_SUFFIX: &str = "-DRYRUN";

/// VLAN aliases and the permitted VLAN ID range.
///
/// An alias mapped to `0` has not been allocated yet. A bound of `0` means
/// unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VlanSpec {
    #[serde(default)]
    pub aliases: BTreeMap<String, u32>,
    #[serde(default)]
    pub min: u32,
    #[serde(default)]
    pub max: u32,
}

impl VlanSpec {
    fn check_id(id: u32, min: u32, max: u32) -> Result<(), String> {
        if id == 0 {
            return Ok(());
        }
        if min != 0 && id < min {
            return Err(format!("VLAN ID {id} is less than experiment min VLAN ID of {min}"));
        }
        if max != 0 && id > max {
            return Err(format!("VLAN ID {id} is greater than experiment max VLAN ID of {max}"));
        }
        Ok(())
    }

    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.min != 0 && self.max != 0 && self.min > self.max {
            problems.push(format!("VLAN range {}-{} is inverted", self.min, self.max));
        }
        for (alias, id) in &self.aliases {
            if let Err(e) = Self::check_id(*id, self.min, self.max) {
                problems.push(format!("VLAN {alias}: {e}"));
            }
        }
        problems
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentSpec {
    pub experiment_name: String,

    #[serde(default)]
    pub base_dir: PathBuf,

    pub topology: TopologySpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<ScenarioSpec>,

    #[serde(default)]
    pub vlans: VlanSpec,

    /// Node hostname to cluster host name.
    #[serde(default)]
    pub schedules: BTreeMap<String, String>,

    #[serde(default)]
    pub run_local: bool,
}

impl ExperimentSpec {
    pub fn new(name: impl Into<String>, topology: TopologySpec, scenario: Option<ScenarioSpec>) -> Self {
        Self {
            experiment_name: name.into(),
            topology,
            scenario,
            ..Default::default()
        }
    }

    /// Fill in the base directory, topology defaults and VLAN aliases.
    ///
    /// An empty base directory becomes `<root>/experiments/<name>`; a relative
    /// one is made absolute against the working directory.
    pub fn set_defaults(&mut self, root: &Path) {
        if self.base_dir.as_os_str().is_empty() {
            self.base_dir = root.join("experiments").join(&self.experiment_name);
        }
        if self.base_dir.is_relative() {
            if let Ok(abs) = std::path::absolute(&self.base_dir) {
                self.base_dir = abs;
            }
        }

        self.topology.set_defaults();

        let aliases: Vec<String> = self.topology.vlan_aliases().into_iter().map(str::to_string).collect();
        for alias in aliases {
            self.vlans.aliases.entry(alias).or_insert(0);
        }
    }

    /// Set the permitted VLAN range. An existing range is only replaced when
    /// `force` is set, and every allocated alias must fit the new range.
    pub fn set_vlan_range(&mut self, min: u32, max: u32, force: bool) -> TypesResult<()> {
        if self.vlans.min != 0 && self.vlans.max != 0 && !force {
            return Err(TypesError::Vlan(format!(
                "VLAN range {}-{} already exists for experiment {}",
                self.vlans.min, self.vlans.max, self.experiment_name
            )));
        }
        if min != 0 && max != 0 && min > max {
            return Err(TypesError::Vlan(format!("VLAN range {min}-{max} is inverted")));
        }
        for (alias, id) in &self.vlans.aliases {
            VlanSpec::check_id(*id, min, max)
                .map_err(|e| TypesError::Vlan(format!("topology VLAN {alias}: {e}")))?;
        }
        self.vlans.min = min;
        self.vlans.max = max;
        Ok(())
    }

    pub fn set_vlan_alias(&mut self, alias: &str, id: u32, force: bool) -> TypesResult<()> {
        let allocated = self.vlans.aliases.get(alias).is_some_and(|v| *v != 0);
        if allocated && !force {
            return Err(TypesError::Vlan(format!(
                "VLAN alias {alias} already exists for experiment {}",
                self.experiment_name
            )));
        }
        VlanSpec::check_id(id, self.vlans.min, self.vlans.max).map_err(TypesError::Vlan)?;
        self.vlans.aliases.insert(alias.to_string(), id);
        Ok(())
    }

    /// Every host referenced by a scenario app must exist in the topology.
    pub fn verify_scenario(&self) -> TypesResult<()> {
        let Some(scenario) = &self.scenario else {
            return Ok(());
        };

        let mut problems = Vec::new();
        for app in &scenario.apps {
            for host in &app.hosts {
                if self.topology.find_node(&host.hostname).is_none() {
                    problems.push(format!("host {} in app {} not in topology", host.hostname, app.name));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(TypesError::Validation(problems))
        }
    }

    /// Structural validation of the whole spec.
    pub fn validate(&self) -> TypesResult<()> {
        let mut problems = Vec::new();

        if self.experiment_name.is_empty() {
            problems.push("experiment name is required".to_string());
        }
        if self.topology.nodes.is_empty() {
            problems.push("topology has no nodes".to_string());
        }
        problems.extend(self.topology.validate());
        problems.extend(self.vlans.validate());
        for node in self.schedules.keys() {
            if self.topology.find_node(node).is_none() {
                problems.push(format!("schedule references unknown node {node}"));
            }
        }
        if let Some(scenario) = &self.scenario {
            problems.extend(scenario.validate());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(TypesError::Validation(problems))
        }
    }

    pub fn schedule_node(&mut self, node: &str, host: &str) -> TypesResult<()> {
        if self.topology.find_node(node).is_none() {
            return Err(TypesError::NodeNotFound(node.to_string()));
        }
        self.schedules.insert(node.to_string(), host.to_string());
        Ok(())
    }

    pub fn scheduled_host(&self, node: &str) -> Option<&str> {
        self.schedules.get(node).map(String::as_str)
    }
}

/// Observed state of an experiment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentStatus {
    /// RFC 3339 start time, suffixed with [`DRY_RUN_SUFFIX`] for dry runs.
    /// Empty when the experiment is stopped.
    #[serde(default)]
    pub start_time: String,

    #[serde(default)]
    pub schedules: BTreeMap<String, String>,

    #[serde(default)]
    pub apps: BTreeMap<String, Value>,

    #[serde(default)]
    pub vlans: BTreeMap<String, u32>,
}

impl ExperimentStatus {
    pub fn running(&self) -> bool {
        !self.start_time.is_empty()
    }

    pub fn dry_run(&self) -> bool {
        self.start_time.ends_with(DRY_RUN_SUFFIX)
    }

    pub fn mark_started(&mut self, at: DateTime<Utc>, dry_run: bool) {
        let mut marker = at.to_rfc3339_opts(SecondsFormat::Secs, true);
        if dry_run {
            marker.push_str(DRY_RUN_SUFFIX);
        }
        self.start_time = marker;
    }

    /// Parsed start time, ignoring the dry-run suffix.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.start_time.trim_end_matches(DRY_RUN_SUFFIX);
        DateTime::parse_from_rfc3339(raw).ok().map(|t| t.with_timezone(&Utc))
    }

    pub fn set_app_status(&mut self, app: &str, status: Value) {
        self.apps.insert(app.to_string(), status);
    }

    /// Drop the start marker and everything realised by the backend.
    pub fn clear(&mut self) {
        self.start_time.clear();
        self.schedules.clear();
        self.vlans.clear();
    }
}
