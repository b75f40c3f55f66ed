//! Legacy scenario shape, read only as upgrade input.
//!
//! Apps were split into two lists by scope:
//! `apps: {experiment: [...], host: [{name, hosts: [...]}]}`.

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioSpec {
    #[serde(default)]
    pub apps: Apps,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Apps {
    #[serde(default)]
    pub experiment: Vec<ExperimentApp>,
    #[serde(default)]
    pub host: Vec<HostApp>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentApp {
    pub name: String,
    #[serde(default)]
    pub asset_dir: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostApp {
    pub name: String,
    #[serde(default)]
    pub asset_dir: String,
    #[serde(default)]
    pub hosts: Vec<Host>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Host {
    pub hostname: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}
