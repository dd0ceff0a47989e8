//! One idempotent registrar step against the service supervisor.
use anyhow::Result;

use super::{Applicable, Resource, ResourceState};
use crate::supervisor::{InstallationState, Step, Supervisor};

/// A registrar step for one service, checked against the last observed
/// installation state.
pub struct RegistrationStep<'a> {
    /// Which transition this resource performs.
    pub step: Step,
    /// Service name.
    pub service: &'a str,
    /// Installation state observed before this step.
    pub observed: InstallationState,
    supervisor: &'a dyn Supervisor,
}

impl std::fmt::Debug for RegistrationStep<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationStep")
            .field("step", &self.step)
            .field("service", &self.service)
            .field("observed", &self.observed)
            .finish_non_exhaustive()
    }
}

impl<'a> RegistrationStep<'a> {
    /// Create a new registrar step resource.
    #[must_use]
    pub const fn new(
        step: Step,
        service: &'a str,
        observed: InstallationState,
        supervisor: &'a dyn Supervisor,
    ) -> Self {
        Self {
            step,
            service,
            observed,
            supervisor,
        }
    }

    /// State expected after this step succeeds.
    #[must_use]
    pub fn reached(&self) -> InstallationState {
        self.step.advance(self.observed)
    }
}

impl Applicable for RegistrationStep<'_> {
    fn description(&self) -> String {
        format!("{} ({})", self.service, self.step)
    }

    fn apply(&self) -> Result<()> {
        self.supervisor.perform(self.step, self.service)?;
        Ok(())
    }
}

impl Resource for RegistrationStep<'_> {
    fn current_state(&self) -> Result<ResourceState> {
        Ok(if self.step.is_satisfied(self.observed) {
            ResourceState::Correct
        } else if self.observed == InstallationState::Unknown {
            ResourceState::Missing
        } else {
            ResourceState::Incorrect {
                current: self.observed.to_string(),
            }
        })
    }
}
