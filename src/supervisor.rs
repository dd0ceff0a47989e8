//! Service supervisor handle: installation state queries and the three
//! registration operations, backed by `deb-systemd-helper`.
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{RegistrationError, StepFailure};
use crate::exec::Executor;

/// How far the supervisor has taken a service.
///
/// Totally ordered; the registrar only ever moves a service forward.
///
/// # Examples
///
/// ```
/// use aggregator_postinst::supervisor::InstallationState;
///
/// assert!(InstallationState::Unknown < InstallationState::Installed);
/// assert!(InstallationState::Enabled < InstallationState::ActiveOnBoot);
/// assert_eq!(
///     InstallationState::Enabled.max(InstallationState::Installed),
///     InstallationState::Enabled
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallationState {
    /// The supervisor has no record of the service.
    Unknown,
    /// The package's installation of the unit is recorded.
    Installed,
    /// The service is marked to start on boot.
    Enabled,
    /// Enabled, and the supervisor state cache reflects it.
    ActiveOnBoot,
}

impl fmt::Display for InstallationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Installed => "installed",
            Self::Enabled => "enabled",
            Self::ActiveOnBoot => "active-on-boot",
        })
    }
}

/// A registrar step, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    /// Record that the package installed the service definition.
    MarkInstalled,
    /// Mark the service to start on boot.
    Enable,
    /// Reconcile the supervisor's state cache.
    UpdateState,
}

impl Step {
    /// All steps in the order the registrar runs them.
    pub const ALL: [Self; 3] = [Self::MarkInstalled, Self::Enable, Self::UpdateState];

    /// Verb used in progress and dry-run messages.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::MarkInstalled => "mark installed",
            Self::Enable => "enable",
            Self::UpdateState => "reconcile",
        }
    }

    /// State reached once this step has succeeded from `current`.
    ///
    /// Never lower than `current`. `update-state` only promotes an enabled
    /// service; on an un-enabled one it reconciles without advancing.
    #[must_use]
    pub fn advance(self, current: InstallationState) -> InstallationState {
        let reached = match self {
            Self::MarkInstalled => InstallationState::Installed,
            Self::Enable => InstallationState::Enabled,
            Self::UpdateState if current >= InstallationState::Enabled => {
                InstallationState::ActiveOnBoot
            }
            Self::UpdateState => current,
        };
        current.max(reached)
    }

    /// Whether running the step from `current` would change nothing.
    ///
    /// `update-state` is never satisfied in advance: reconciling is always
    /// performed so the cache cannot drift from an earlier run.
    #[must_use]
    pub fn is_satisfied(self, current: InstallationState) -> bool {
        match self {
            Self::MarkInstalled => current >= InstallationState::Installed,
            Self::Enable => current >= InstallationState::Enabled,
            Self::UpdateState => false,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MarkInstalled => "mark-installed",
            Self::Enable => "enable",
            Self::UpdateState => "update-state",
        })
    }
}

/// Narrow contract over the host supervisor's registration tables.
pub trait Supervisor: Send + Sync {
    /// Current installation state of `service`.
    ///
    /// # Errors
    ///
    /// Returns an error if the supervisor cannot be queried at all.
    fn installation_state(&self, service: &str) -> anyhow::Result<InstallationState>;

    /// Perform `step` for `service`.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistrationError`] classified by `step` if the
    /// supervisor rejects the operation.
    fn perform(&self, step: Step, service: &str) -> Result<(), RegistrationError>;
}

/// [`Supervisor`] backed by Debian's `deb-systemd-helper`.
///
/// The helper keeps its own state under `/var/lib/systemd/deb-systemd-helper-*`
/// and works without a running init, which is what lets the bookkeeping
/// steps succeed inside image builds.
pub struct DebSystemdHelper {
    helper: String,
    executor: Arc<dyn Executor>,
}

impl fmt::Debug for DebSystemdHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebSystemdHelper")
            .field("helper", &self.helper)
            .field("executor", &"<dyn Executor>")
            .finish()
    }
}

impl DebSystemdHelper {
    /// Create a supervisor handle running `helper` through `executor`.
    #[must_use]
    pub fn new(helper: impl Into<String>, executor: Arc<dyn Executor>) -> Self {
        Self {
            helper: helper.into(),
            executor,
        }
    }

    fn succeeds(&self, args: &[&str]) -> anyhow::Result<bool> {
        Ok(self.executor.run_unchecked(&self.helper, args)?.success)
    }
}

impl Supervisor for DebSystemdHelper {
    fn installation_state(&self, service: &str) -> anyhow::Result<InstallationState> {
        if !self.succeeds(&["debian-installed", service])? {
            return Ok(InstallationState::Unknown);
        }
        if !self.succeeds(&["--quiet", "was-enabled", service])? {
            return Ok(InstallationState::Installed);
        }
        if !self.succeeds(&["is-enabled", service])? {
            return Ok(InstallationState::Enabled);
        }
        Ok(InstallationState::ActiveOnBoot)
    }

    fn perform(&self, step: Step, service: &str) -> Result<(), RegistrationError> {
        let command = match step {
            Step::MarkInstalled => "unmask",
            Step::Enable => "enable",
            Step::UpdateState => "update-state",
        };
        let failure = |exit_code, detail| {
            RegistrationError::from_failure(StepFailure {
                step,
                service: service.to_string(),
                exit_code,
                detail,
            })
        };
        let result = self
            .executor
            .run_unchecked(&self.helper, &[command, service])
            .map_err(|e| failure(None, format!("{e:#}")))?;
        if result.success {
            Ok(())
        } else {
            Err(failure(result.code, result.detail()))
        }
    }
}
