use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable listing directories searched for external apps.
/// Takes precedence over [`AppsConfig::search_path`].
pub const APP_PATH_ENV: &str = "RANGEPLANE_APP_PATH";

/// The `[apps]` configuration table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppsConfig {
    /// Executable name prefix for external apps.
    pub prefix: String,
    /// Directories searched for external apps. Empty means `$PATH`.
    pub search_path: Vec<PathBuf>,
}

impl Default for AppsConfig {
    fn default() -> Self {
        Self {
            prefix: "rangeplane-app-".into(),
            search_path: Vec::new(),
        }
    }
}

impl AppsConfig {
    /// Directories to search, in order.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        if let Some(paths) = env::var_os(APP_PATH_ENV).filter(|p| !p.is_empty()) {
            return env::split_paths(&paths).collect();
        }
        if !self.search_path.is_empty() {
            return self.search_path.clone();
        }
        env::var_os("PATH")
            .map(|p| env::split_paths(&p).collect())
            .unwrap_or_default()
    }

    pub fn executable_name(&self, app: &str) -> String {
        format!("{}{}", self.prefix, app)
    }
}
