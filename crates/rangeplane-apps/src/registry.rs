//! The app registry and the ordered pipeline.

use std::collections::{BTreeMap, BTreeSet};

use rangeplane_types::Experiment;
use tracing::{debug, info, warn};

use crate::action::Action;
use crate::app::App;
use crate::config::AppsConfig;
use crate::error::{AppError, AppResult};
use crate::external::ExternalApp;
use crate::ntp::Ntp;
use crate::report::{Outcome, PipelineReport, Scope};
use crate::startup::Startup;

/// Default apps run for every experiment; named apps run when a scenario
/// lists them. Names not registered here fall through to [`ExternalApp`].
pub struct AppRegistry {
    config: AppsConfig,
    defaults: Vec<Box<dyn App>>,
    named: BTreeMap<String, Box<dyn App>>,
}

enum Resolved<'a> {
    Registered(&'a dyn App),
    External(ExternalApp),
}

impl Resolved<'_> {
    fn app(&self) -> &dyn App {
        match self {
            Resolved::Registered(app) => *app,
            Resolved::External(app) => app,
        }
    }
}

impl AppRegistry {
    pub fn new(config: AppsConfig) -> Self {
        Self {
            config,
            defaults: Vec::new(),
            named: BTreeMap::new(),
        }
    }

    /// A registry with the `ntp` and `startup` default apps.
    pub fn with_defaults(config: AppsConfig) -> AppResult<Self> {
        let mut registry = Self::new(config);
        registry.register_default(Ntp)?;
        registry.register_default(Startup)?;
        Ok(registry)
    }

    pub fn config(&self) -> &AppsConfig {
        &self.config
    }

    fn ensure_unique(&self, name: &str) -> AppResult<()> {
        if self.named.contains_key(name) || self.defaults.iter().any(|a| a.name() == name) {
            return Err(AppError::Duplicate(name.to_string()));
        }
        Ok(())
    }

    /// Add an app applied to every experiment, after those already added.
    pub fn register_default(&mut self, mut app: impl App + 'static) -> AppResult<()> {
        self.ensure_unique(app.name())?;
        app.init(&self.config)?;
        debug!(app = %app.name(), "registered default app");
        self.defaults.push(Box::new(app));
        Ok(())
    }

    /// Add an in-process app that scenarios can refer to by name.
    pub fn register(&mut self, mut app: impl App + 'static) -> AppResult<()> {
        self.ensure_unique(app.name())?;
        app.init(&self.config)?;
        debug!(app = %app.name(), "registered app");
        self.named.insert(app.name().to_string(), Box::new(app));
        Ok(())
    }

    pub fn default_names(&self) -> Vec<&str> {
        self.defaults.iter().map(|a| a.name()).collect()
    }

    /// Apps a scenario can use: registered apps plus external apps on the
    /// search path. Default apps always run and are not listed.
    pub fn list(&self) -> Vec<String> {
        let defaults: BTreeSet<&str> = self.default_names().into_iter().collect();
        let mut names: BTreeSet<String> = self.named.keys().cloned().collect();
        names.extend(
            ExternalApp::discover(&self.config)
                .into_iter()
                .filter(|n| !defaults.contains(n.as_str())),
        );
        names.into_iter().collect()
    }

    fn resolve(&self, name: &str) -> Resolved<'_> {
        match self.named.get(name) {
            Some(app) => Resolved::Registered(app.as_ref()),
            None => Resolved::External(ExternalApp::resolve(name, &self.config)),
        }
    }

    /// Run one lifecycle phase over `exp`.
    ///
    /// On error the experiment may be partially mutated and must not be
    /// persisted.
    pub fn apply(&self, action: Action, exp: &mut Experiment) -> AppResult<PipelineReport> {
        let mut report = PipelineReport::new(action);

        for app in &self.defaults {
            run(app.as_ref(), Scope::Default, action, exp, &mut report)?;
        }

        // Listed up front: an app may rewrite the scenario mid-phase.
        let scenario: Vec<(String, Scope)> = exp
            .experiment_apps()
            .map(|a| (a.name.clone(), Scope::Experiment))
            .chain(exp.host_apps().map(|a| (a.name.clone(), Scope::Host)))
            .collect();

        for (name, scope) in scenario {
            let resolved = self.resolve(&name);
            run(resolved.app(), scope, action, exp, &mut report)?;
        }

        Ok(report)
    }
}

fn run(app: &dyn App, scope: Scope, action: Action, exp: &mut Experiment, report: &mut PipelineReport) -> AppResult<()> {
    let name = app.name();
    match app.apply(action, exp) {
        Ok(()) => {
            info!(app = %name, %scope, %action, outcome = %Outcome::Ok, "app applied");
            report.record(name, scope, Outcome::Ok);
            Ok(())
        }
        Err(AppError::NotFound(_)) if scope != Scope::Default => {
            warn!(app = %name, %scope, %action, outcome = %Outcome::NotFound, "app not found, skipping");
            report.record(name, scope, Outcome::NotFound);
            Ok(())
        }
        Err(e) => {
            warn!(app = %name, %scope, %action, outcome = %Outcome::Failed, error = %e, "app failed");
            report.record(name, scope, Outcome::Failed);
            Err(AppError::Aborted {
                app: name.to_string(),
                scope,
                action,
                source: Box::new(e),
            })
        }
    }
}
