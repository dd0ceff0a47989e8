//! Runtime dependency resource.
use super::ResourceState;
use crate::config::manifest::Requirement;
use crate::environment::{DependencyEnvironment, InstalledDistributions};
use crate::error::DependencyInstallError;

/// A manifest requirement checked against one bulk query of the environment.
///
/// There is no per-item apply: everything found unsatisfied is handed to
/// [`batch_install`] together.
pub struct DependencyResource<'a> {
    /// The requirement from the manifest.
    pub requirement: Requirement,
    environment: &'a dyn DependencyEnvironment,
}

impl std::fmt::Debug for DependencyResource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyResource")
            .field("requirement", &self.requirement)
            .finish_non_exhaustive()
    }
}

impl<'a> DependencyResource<'a> {
    /// Create a new dependency resource.
    #[must_use]
    pub const fn new(requirement: Requirement, environment: &'a dyn DependencyEnvironment) -> Self {
        Self {
            requirement,
            environment,
        }
    }

    /// Determine the resource state from a pre-fetched installed set.
    ///
    /// `Correct` only when the installed version satisfies the requirement's
    /// constraint; an installed but out-of-date (or undecidable) distribution
    /// is `Incorrect` and goes to the installer with the rest.
    #[must_use]
    pub fn state_from_installed(&self, installed: &InstalledDistributions) -> ResourceState {
        match installed.get(&self.requirement.name) {
            None => ResourceState::Missing,
            Some(version) if self.requirement.constraint.admits(version) => ResourceState::Correct,
            Some(version) => ResourceState::Incorrect {
                current: version.clone(),
            },
        }
    }
}

/// Install a batch of dependencies with a single installer invocation.
///
/// Resolution happens as one transaction so a failure leaves no
/// half-resolved subset behind from this call.
///
/// # Errors
///
/// Returns [`DependencyInstallError::InstallFailed`] if the installer
/// rejects the batch.
pub fn batch_install(resources: &[&DependencyResource<'_>]) -> Result<(), DependencyInstallError> {
    let Some(first) = resources.first() else {
        return Ok(());
    };
    let specs: Vec<&str> = resources
        .iter()
        .map(|r| r.requirement.spec.as_str())
        .collect();
    first.environment.install(&specs)
}
