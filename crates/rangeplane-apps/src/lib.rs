//! rangeplane-apps — lifecycle hooks applied to experiments.
//!
//! An [`App`] may act at four points of an experiment's life
//! ([`Action`]): `configure` when the experiment is created, `pre-start`
//! before VMs are launched, `post-start` once they are, and `cleanup` when
//! the experiment stops. Apps mutate the experiment in place; the caller
//! persists it only after a whole phase succeeds.
//!
//! # Pipeline
//!
//! [`AppRegistry::apply`] runs one phase strictly in order:
//!
//! 1. default apps, in registration order; any failure aborts,
//! 2. the scenario's experiment-scoped apps, in document order,
//! 3. the scenario's host-scoped apps, in document order.
//!
//! A scenario app with no in-process implementation is delegated to an
//! external executable named `<prefix><app>` ([`ExternalApp`]). When no such
//! executable exists the app is reported as missing and the phase carries
//! on; any other scenario app error aborts the phase.

pub mod action;
pub mod app;
pub mod config;
pub mod error;
pub mod external;
pub mod ntp;
pub mod registry;
pub mod report;
pub mod startup;

pub use action::Action;
pub use app::App;
pub use config::{APP_PATH_ENV, AppsConfig};
pub use error::{AppError, AppResult};
pub use external::ExternalApp;
pub use ntp::Ntp;
pub use registry::AppRegistry;
pub use report::{AppOutcome, Outcome, PipelineReport, Scope};
pub use startup::Startup;
