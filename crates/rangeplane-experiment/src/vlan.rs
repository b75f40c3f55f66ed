//! VLAN aliases and ranges of stored experiments.
//!
//! Reads report what a running experiment was allocated and what a stopped
//! one has configured. Writes go to the spec of a stopped experiment under
//! its `experiment|<name>` lock and take effect at the next start.

use std::collections::BTreeMap;

use rangeplane_lock::LockStatus;
use rangeplane_types::Experiment;
use tracing::info;

use crate::controller::Controller;
use crate::error::{ExperimentError, ExperimentResult, Failure};

/// An inclusive VLAN ID range; `0` leaves a bound open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VlanRange {
    pub min: u32,
    pub max: u32,
}

impl VlanRange {
    fn of(exp: &Experiment) -> Self {
        if !exp.running() {
            return Self {
                min: exp.spec.vlans.min,
                max: exp.spec.vlans.max,
            };
        }
        let allocated = exp.status.vlans.values().copied().filter(|id| *id != 0);
        let (min, max) = allocated.fold((0, 0), |(min, max), id| {
            (if min == 0 { id } else { min.min(id) }, max.max(id))
        });
        Self { min, max }
    }
}

impl Controller {
    /// One named experiment, or every decodable one.
    fn vlan_targets(&self, name: Option<&str>) -> ExperimentResult<Vec<Experiment>> {
        match name {
            Some(name) => Ok(vec![self.load(name)?]),
            None => self.decodable_experiments(),
        }
    }

    fn stopped_experiment(&self, name: &str) -> ExperimentResult<Experiment> {
        let exp = self.load(name)?;
        if exp.running() {
            return Err(ExperimentError::AlreadyRunning {
                name: name.to_string(),
                started: exp.status.start_time.clone(),
            });
        }
        Ok(exp)
    }

    /// VLAN aliases per experiment: allocated IDs while running, configured
    /// ones (`0` when unallocated) otherwise.
    pub fn vlan_aliases(&self, name: Option<&str>) -> Result<BTreeMap<String, BTreeMap<String, u32>>, Failure> {
        let run = || -> ExperimentResult<BTreeMap<String, BTreeMap<String, u32>>> {
            Ok(self
                .vlan_targets(name)?
                .into_iter()
                .map(|exp| {
                    let aliases = if exp.running() {
                        exp.status.vlans.clone()
                    } else {
                        exp.spec.vlans.aliases.clone()
                    };
                    (exp.metadata.name, aliases)
                })
                .collect())
        };
        run().map_err(Failure::new)
    }

    /// VLAN ranges per experiment. A running experiment reports the span of
    /// its allocated IDs.
    pub fn vlan_ranges(&self, name: Option<&str>) -> Result<BTreeMap<String, VlanRange>, Failure> {
        let run = || -> ExperimentResult<BTreeMap<String, VlanRange>> {
            Ok(self
                .vlan_targets(name)?
                .into_iter()
                .map(|exp| (exp.metadata.name.clone(), VlanRange::of(&exp)))
                .collect())
        };
        run().map_err(Failure::new)
    }

    /// Pin `alias` to `id`. An alias that already has an ID is only
    /// replaced with `force`.
    pub fn set_vlan_alias(&self, name: &str, alias: &str, id: u32, force: bool) -> Result<Experiment, Failure> {
        let run = || -> ExperimentResult<Experiment> {
            if alias.is_empty() {
                return Err(ExperimentError::InvalidRequest("VLAN alias is required".into()));
            }
            if id == 0 {
                return Err(ExperimentError::InvalidRequest("VLAN ID is required".into()));
            }
            let _guard = self.lock_experiment(name, LockStatus::Updating)?;
            let mut exp = self.stopped_experiment(name)?;
            exp.spec.set_vlan_alias(alias, id, force)?;
            self.persist(&mut exp)?;
            info!(experiment = %name, %alias, id, "VLAN alias set");
            Ok(exp)
        };
        run().map_err(Failure::new)
    }

    /// Set the VLAN range. An existing range is only replaced with `force`.
    pub fn set_vlan_range(&self, name: &str, min: u32, max: u32, force: bool) -> Result<Experiment, Failure> {
        let run = || -> ExperimentResult<Experiment> {
            if min == 0 || max == 0 {
                return Err(ExperimentError::InvalidRequest(
                    "both VLAN range bounds are required".into(),
                ));
            }
            if min > max {
                return Err(ExperimentError::InvalidRequest(format!(
                    "VLAN range {min}-{max} is inverted"
                )));
            }
            let _guard = self.lock_experiment(name, LockStatus::Updating)?;
            let mut exp = self.stopped_experiment(name)?;
            exp.spec.set_vlan_range(min, max, force)?;
            self.persist(&mut exp)?;
            info!(experiment = %name, min, max, "VLAN range set");
            Ok(exp)
        };
        run().map_err(Failure::new)
    }
}
