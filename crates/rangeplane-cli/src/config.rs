//! rangeplane.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use rangeplane_apps::AppsConfig;
use rangeplane_cluster::Host;
use rangeplane_experiment::ControllerConfig;
use rangeplane_lock::LockTtls;
use serde::{Deserialize, Serialize};

/// File looked for in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "rangeplane.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    pub store: StoreConfig,
    pub experiments: ExperimentsConfig,
    pub apps: AppsConfig,
    pub locks: LocksConfig,
    pub progress: ProgressConfig,
    pub cluster: ClusterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// redb database file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/rangeplane/rangeplane.redb"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentsConfig {
    /// Experiments without an explicit base directory live under
    /// `<base_dir>/experiments/<name>`.
    pub base_dir: PathBuf,
}

impl Default for ExperimentsConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/var/lib/rangeplane"),
        }
    }
}

/// Lock TTLs in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocksConfig {
    pub create: u64,
    pub delete: u64,
    pub start: u64,
    pub stop: u64,
    pub schedule: u64,
    pub update: u64,
    pub vm: u64,
}

impl Default for LocksConfig {
    fn default() -> Self {
        let ttls = LockTtls::default();
        Self {
            create: ttls.create.as_secs(),
            delete: ttls.delete.as_secs(),
            start: ttls.start.as_secs(),
            stop: ttls.stop.as_secs(),
            schedule: ttls.schedule.as_secs(),
            update: ttls.update.as_secs(),
            vm: ttls.vm.as_secs(),
        }
    }
}

impl LocksConfig {
    pub fn ttls(&self) -> LockTtls {
        LockTtls {
            create: Duration::from_secs(self.create),
            delete: Duration::from_secs(self.delete),
            start: Duration::from_secs(self.start),
            stop: Duration::from_secs(self.stop),
            schedule: Duration::from_secs(self.schedule),
            update: Duration::from_secs(self.update),
            vm: Duration::from_secs(self.vm),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

/// Hosts of the simulated cluster the CLI drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub hosts: Vec<Host>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            hosts: (0..4)
                .map(|i| Host::new(format!("compute{i}"), 16, 65_536))
                .collect(),
        }
    }
}

impl RangeConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: RangeConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Load `path` if given, else `rangeplane.toml` from the working
    /// directory if present, else the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.is_file() {
                    Self::from_file(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            root: self.experiments.base_dir.clone(),
            ttls: self.locks.ttls(),
            progress_interval: Duration::from_millis(self.progress.interval_ms),
        }
    }
}
