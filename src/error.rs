//! Domain-specific error types for the provisioning pipeline.
//!
//! Internal modules return typed errors built with [`thiserror`]; task and
//! command code converts them to [`anyhow::Error`] with `?`. At the process
//! boundary [`exit_code`] walks the error chain to pick the exit status
//! handed back to the package manager.
//!
//! # Error types
//!
//! ```text
//! ConfigError                           # config file, unit file      -> 1
//! DependencyInstallError                # manifest, pip query/install -> pip's code
//! RegistrationError
//! ├── Bookkeeping(StepFailure)          # mark-installed, enable      -> helper's code
//! └── StateReconciliation(StepFailure)  # update-state                -> helper's code
//! ```
use std::path::PathBuf;

use thiserror::Error;

use crate::supervisor::Step;

/// Errors that arise from loading and validating the hook configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file {}: {source}", .path.display())]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or has unknown keys.
    #[error("invalid config file {}: {message}", .path.display())]
    Parse {
        /// Path of the configuration file.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },

    /// A configuration value is out of range.
    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        /// Name of the offending key.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The package did not install the unit-description file for the service.
    #[error("unit file for '{service}' not found at {}", .path.display())]
    MissingUnitFile {
        /// Service name being registered.
        service: String,
        /// Expected location of the unit file.
        path: PathBuf,
    },
}

/// Errors from the Dependency Provisioner. Always fatal.
#[derive(Error, Debug)]
pub enum DependencyInstallError {
    /// The dependency manifest is missing or unreadable.
    #[error("cannot read dependency manifest {}: {source}", .path.display())]
    ManifestUnreadable {
        /// Path of the manifest.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A manifest line is not a valid dependency specifier.
    #[error("invalid dependency specifier on line {line}: '{spec}' ({reason})")]
    InvalidSpecifier {
        /// One-based line number.
        line: usize,
        /// The offending line, trimmed.
        spec: String,
        /// Why the line was rejected.
        reason: &'static str,
    },

    /// The same project is listed twice.
    #[error("dependency '{name}' listed more than once (line {line})")]
    DuplicateRequirement {
        /// Normalised project name.
        name: String,
        /// One-based line number of the repeated entry.
        line: usize,
    },

    /// The installed-package query failed (interpreter or pip unavailable).
    #[error("cannot query installed dependencies with {program}: {detail}")]
    QueryFailed {
        /// Program that was invoked.
        program: String,
        /// Exit code of the query, when it ran.
        exit_code: Option<i32>,
        /// Diagnostic output.
        detail: String,
    },

    /// The installer could not resolve or install one or more dependencies.
    #[error("failed to install {} (exit {}): {detail}", .packages.join(", "), .exit_code.unwrap_or(-1))]
    InstallFailed {
        /// Specifiers passed to the installer.
        packages: Vec<String>,
        /// Installer exit code, when known.
        exit_code: Option<i32>,
        /// Diagnostic output.
        detail: String,
    },
}

impl DependencyInstallError {
    /// Exit status reported to the package manager for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::QueryFailed { exit_code, .. } | Self::InstallFailed { exit_code, .. } => {
                propagated(*exit_code)
            }
            _ => 1,
        }
    }
}

/// Details of a failed registration step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// Step that failed.
    pub step: Step,
    /// Service name the step ran for.
    pub service: String,
    /// Exit code of the supervisor helper, when it ran.
    pub exit_code: Option<i32>,
    /// Diagnostic output.
    pub detail: String,
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} failed", self.step, self.service)?;
        if let Some(code) = self.exit_code {
            write!(f, " (exit {code})")?;
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

/// Errors from the Service Registrar, classified by step.
///
/// Whether an error aborts the pipeline is decided by the step's
/// [`StepPolicy`](crate::config::StepPolicy), not by the variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Best-effort bookkeeping (mark-installed, enable) failed.
    #[error("registration bookkeeping error: {0}")]
    Bookkeeping(StepFailure),

    /// Reconciling the supervisor state cache (update-state) failed.
    #[error("state reconciliation error: {0}")]
    StateReconciliation(StepFailure),
}

impl RegistrationError {
    /// Build the error variant matching `failure.step`.
    #[must_use]
    pub fn from_failure(failure: StepFailure) -> Self {
        let step = failure.step;
        match step {
            Step::MarkInstalled | Step::Enable => Self::Bookkeeping(failure),
            Step::UpdateState => Self::StateReconciliation(failure),
        }
    }

    /// The failure details.
    #[must_use]
    pub const fn failure(&self) -> &StepFailure {
        match self {
            Self::Bookkeeping(f) | Self::StateReconciliation(f) => f,
        }
    }

    /// Exit status reported to the package manager for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        propagated(self.failure().exit_code)
    }
}

/// Map a subprocess exit code to a non-zero process exit status.
fn propagated(code: Option<i32>) -> u8 {
    code.and_then(|c| u8::try_from(c).ok())
        .filter(|&c| c != 0)
        .unwrap_or(1)
}

/// Pick the process exit status for an error returned by a command.
///
/// Walks the error chain for the first typed pipeline error; anything else
/// exits with 1.
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| {
            if let Some(e) = cause.downcast_ref::<DependencyInstallError>() {
                Some(e.exit_code())
            } else {
                cause
                    .downcast_ref::<RegistrationError>()
                    .map(RegistrationError::exit_code)
            }
        })
        .unwrap_or(1)
}
