//! What a pipeline run did, app by app.

use std::fmt;

use serde::Serialize;

use crate::action::Action;

/// Where an app in the pipeline came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Default,
    Experiment,
    Host,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Default => "default",
            Scope::Experiment => "experiment",
            Scope::Host => "host",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Ok,
    NotFound,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Ok => "ok",
            Outcome::NotFound => "not-found",
            Outcome::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppOutcome {
    pub app: String,
    pub scope: Scope,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub action: Action,
    pub apps: Vec<AppOutcome>,
}

impl PipelineReport {
    pub fn new(action: Action) -> Self {
        Self { action, apps: Vec::new() }
    }

    pub(crate) fn record(&mut self, app: &str, scope: Scope, outcome: Outcome) {
        self.apps.push(AppOutcome {
            app: app.to_string(),
            scope,
            outcome,
        });
    }

    /// Apps that completed, in run order.
    pub fn applied(&self) -> Vec<&str> {
        self.with_outcome(Outcome::Ok)
    }

    /// Scenario apps skipped because nothing implements them.
    pub fn missing(&self) -> Vec<&str> {
        self.with_outcome(Outcome::NotFound)
    }

    fn with_outcome(&self, outcome: Outcome) -> Vec<&str> {
        self.apps
            .iter()
            .filter(|a| a.outcome == outcome)
            .map(|a| a.app.as_str())
            .collect()
    }
}
