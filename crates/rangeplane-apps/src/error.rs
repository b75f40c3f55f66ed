use std::path::PathBuf;

use rangeplane_types::TypesError;
use thiserror::Error;

use crate::action::Action;
use crate::report::Scope;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// No in-process app and no external executable by this name.
    #[error("app {0} not found")]
    NotFound(String),

    #[error("app {0} is already registered")]
    Duplicate(String),

    #[error("unknown app action {0}")]
    UnknownAction(String),

    #[error("app {app} failed: {message}")]
    Failed { app: String, message: String },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Spec(#[from] TypesError),

    /// A phase aborted on the named app.
    #[error("applying {scope} app {app} for action {action}: {source}")]
    Aborted {
        app: String,
        scope: Scope,
        action: Action,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    pub fn failed(app: &str, message: impl Into<String>) -> Self {
        AppError::Failed {
            app: app.to_string(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }
}
