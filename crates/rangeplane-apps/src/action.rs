use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// An experiment lifecycle hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Configure,
    PreStart,
    PostStart,
    Cleanup,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Configure, Action::PreStart, Action::PostStart, Action::Cleanup];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Configure => "configure",
            Action::PreStart => "pre-start",
            Action::PostStart => "post-start",
            Action::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| AppError::UnknownAction(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for action in Action::ALL {
            assert_eq!(action.to_string().parse::<Action>().unwrap(), action);
        }
        assert_eq!(Action::PreStart.as_str(), "pre-start");
        assert!("start".parse::<Action>().is_err());
    }
}
