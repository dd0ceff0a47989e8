//! Dependency environment handle: installed-set query and batch install,
//! backed by the interpreter's `pip` module.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::manifest::normalize_name;
use crate::error::DependencyInstallError;
use crate::exec::Executor;

/// Installed distributions: normalised project name to version text.
///
/// The version is empty when the installer reports none (direct references).
pub type InstalledDistributions = HashMap<String, String>;

/// Narrow contract over the host's dependency environment.
pub trait DependencyEnvironment: Send + Sync {
    /// Every installed distribution with its version.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyInstallError::QueryFailed`] if the environment
    /// cannot be queried.
    fn installed(&self) -> Result<InstalledDistributions, DependencyInstallError>;

    /// Resolve and install `specs` in a single transaction.
    ///
    /// Specifiers that are already satisfied must not cause a failure.
    ///
    /// # Errors
    ///
    /// Returns [`DependencyInstallError::InstallFailed`] if any specifier
    /// cannot be resolved or installed.
    fn install(&self, specs: &[&str]) -> Result<(), DependencyInstallError>;
}

/// [`DependencyEnvironment`] driving `<python> -m pip`.
pub struct PipEnvironment {
    python: String,
    extra_args: Vec<String>,
    executor: Arc<dyn Executor>,
}

impl fmt::Debug for PipEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipEnvironment")
            .field("python", &self.python)
            .field("extra_args", &self.extra_args)
            .field("executor", &"<dyn Executor>")
            .finish()
    }
}

impl PipEnvironment {
    /// Create a handle for `python`'s pip, appending `extra_args` to installs.
    #[must_use]
    pub fn new(
        python: impl Into<String>,
        extra_args: Vec<String>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            python: python.into(),
            extra_args,
            executor,
        }
    }
}

/// Parse `pip list --format=freeze` output (`name==version` per line).
fn parse_freeze(stdout: &str) -> InstalledDistributions {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (name, version) = line
                .split_once("==")
                .unwrap_or_else(|| (line.split([' ', '@']).next().unwrap_or(line), ""));
            let name = name.trim();
            (!name.is_empty()).then(|| (normalize_name(name), version.trim().to_string()))
        })
        .collect()
}

impl DependencyEnvironment for PipEnvironment {
    fn installed(&self) -> Result<InstalledDistributions, DependencyInstallError> {
        let failed = |exit_code, detail| DependencyInstallError::QueryFailed {
            program: self.python.clone(),
            exit_code,
            detail,
        };
        let result = self
            .executor
            .run_unchecked(
                &self.python,
                &[
                    "-m",
                    "pip",
                    "list",
                    "--format=freeze",
                    "--disable-pip-version-check",
                ],
            )
            .map_err(|e| failed(None, format!("{e:#}")))?;
        if !result.success {
            return Err(failed(result.code, result.detail()));
        }
        Ok(parse_freeze(&result.stdout))
    }

    fn install(&self, specs: &[&str]) -> Result<(), DependencyInstallError> {
        if specs.is_empty() {
            return Ok(());
        }
        let failed = |exit_code, detail| DependencyInstallError::InstallFailed {
            packages: specs.iter().map(ToString::to_string).collect(),
            exit_code,
            detail,
        };

        let mut args = vec![
            "-m",
            "pip",
            "install",
            "--no-input",
            "--disable-pip-version-check",
        ];
        args.extend(self.extra_args.iter().map(String::as_str));
        args.extend_from_slice(specs);

        let result = self
            .executor
            .run_unchecked(&self.python, &args)
            .map_err(|e| failed(None, format!("{e:#}")))?;
        if result.success {
            Ok(())
        } else {
            Err(failed(result.code, result.detail()))
        }
    }
}
