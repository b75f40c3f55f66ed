//! Version 2 shapes: the stored scenario.
//!
//! A scenario is a flat, ordered list of apps. An app with no `hosts` is
//! experiment-scoped; an app listing hosts is host-scoped.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    #[serde(default)]
    pub apps: Vec<ScenarioApp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioApp {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub asset_dir: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<AppHost>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppHost {
    pub hostname: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ScenarioApp {
    pub fn is_host_app(&self) -> bool {
        !self.hosts.is_empty()
    }
}

impl ScenarioSpec {
    pub fn experiment_apps(&self) -> impl Iterator<Item = &ScenarioApp> {
        self.apps.iter().filter(|a| !a.is_host_app())
    }

    pub fn host_apps(&self) -> impl Iterator<Item = &ScenarioApp> {
        self.apps.iter().filter(|a| a.is_host_app())
    }

    pub fn app(&self, name: &str) -> Option<&ScenarioApp> {
        self.apps.iter().find(|a| a.name == name)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut seen = BTreeSet::new();
        for app in &self.apps {
            if app.name.is_empty() {
                problems.push("scenario app has no name".to_string());
            } else if !seen.insert(app.name.as_str()) {
                problems.push(format!("duplicate scenario app {}", app.name));
            }
            for host in &app.hosts {
                if host.hostname.is_empty() {
                    problems.push(format!("app {} lists a host without a hostname", app.name));
                }
            }
        }
        problems
    }
}
