use rangeplane_types::Experiment;

use crate::action::Action;
use crate::config::AppsConfig;
use crate::error::AppResult;

/// A lifecycle hook. Every phase defaults to a no-op.
pub trait App: Send + Sync {
    fn name(&self) -> &str;

    /// Called once when the app is registered.
    fn init(&mut self, _config: &AppsConfig) -> AppResult<()> {
        Ok(())
    }

    fn configure(&self, _exp: &mut Experiment) -> AppResult<()> {
        Ok(())
    }

    fn pre_start(&self, _exp: &mut Experiment) -> AppResult<()> {
        Ok(())
    }

    fn post_start(&self, _exp: &mut Experiment) -> AppResult<()> {
        Ok(())
    }

    fn cleanup(&self, _exp: &mut Experiment) -> AppResult<()> {
        Ok(())
    }

    /// Dispatch to the hook for `action`.
    fn apply(&self, action: Action, exp: &mut Experiment) -> AppResult<()> {
        match action {
            Action::Configure => self.configure(exp),
            Action::PreStart => self.pre_start(exp),
            Action::PostStart => self.post_start(exp),
            Action::Cleanup => self.cleanup(exp),
        }
    }
}
