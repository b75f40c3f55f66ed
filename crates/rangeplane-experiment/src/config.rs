use std::path::PathBuf;
use std::time::Duration;

use rangeplane_lock::LockTtls;

/// Settings the controller needs from the process configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Root for default experiment base directories
    /// (`<root>/experiments/<name>`).
    pub root: PathBuf,
    pub ttls: LockTtls,
    /// How often a detached start polls launch progress.
    pub progress_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/lib/rangeplane"),
            ttls: LockTtls::default(),
            progress_interval: Duration::from_millis(1000),
        }
    }
}

impl ControllerConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }
}
