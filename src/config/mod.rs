//! Hook configuration: service identity, manifest location, host programs,
//! and the per-step failure policy of the service registrar.
pub mod manifest;
pub mod toml_loader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::supervisor::Step;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/aggregator/postinst.toml";

/// Environment variable overriding [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_ENV: &str = "AGGREGATOR_POSTINST_CONFIG";

/// Whether a failure of a registrar step aborts the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepPolicy {
    /// Abort the pipeline (non-zero exit) when the step fails.
    pub fatal: bool,
}

impl StepPolicy {
    /// Failures are logged and the pipeline continues.
    pub const BEST_EFFORT: Self = Self { fatal: false };
    /// Failures abort the pipeline.
    pub const FATAL: Self = Self { fatal: true };
}

/// Failure policy for each registrar step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct StepPolicies {
    /// Policy for `mark-installed`.
    pub mark_installed: StepPolicy,
    /// Policy for `enable`.
    pub enable: StepPolicy,
    /// Policy for `update-state`.
    pub update_state: StepPolicy,
}

impl Default for StepPolicies {
    fn default() -> Self {
        Self {
            mark_installed: StepPolicy::BEST_EFFORT,
            enable: StepPolicy::BEST_EFFORT,
            update_state: StepPolicy::FATAL,
        }
    }
}

impl StepPolicies {
    /// Policy configured for `step`.
    #[must_use]
    pub const fn for_step(&self, step: Step) -> StepPolicy {
        match step {
            Step::MarkInstalled => self.mark_installed,
            Step::Enable => self.enable,
            Step::UpdateState => self.update_state,
        }
    }
}

/// Settings for the dependency environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct DependencySettings {
    /// Python interpreter whose `pip` module installs the dependencies.
    pub python: String,
    /// Extra arguments appended to `pip install` (e.g. `--break-system-packages`).
    pub extra_args: Vec<String>,
}

impl Default for DependencySettings {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Settings for the service supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RegistrarSettings {
    /// Supervisor bookkeeping helper program.
    pub helper: String,
    /// Failure policy per step.
    pub steps: StepPolicies,
}

impl Default for RegistrarSettings {
    fn default() -> Self {
        Self {
            helper: "deb-systemd-helper".to_string(),
            steps: StepPolicies::default(),
        }
    }
}

/// Complete hook configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Unit name registered with the supervisor.
    pub service: String,
    /// Package-owned dependency manifest.
    pub manifest: PathBuf,
    /// Directory holding the package's unit-description files.
    pub unit_dir: PathBuf,
    /// Dependency environment settings.
    pub dependencies: DependencySettings,
    /// Supervisor settings.
    pub registrar: RegistrarSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: "aggregator.service".to_string(),
            manifest: PathBuf::from("/usr/share/aggregator/requirements.txt"),
            unit_dir: PathBuf::from("/lib/systemd/system"),
            dependencies: DependencySettings::default(),
            registrar: RegistrarSettings::default(),
        }
    }
}

impl Config {
    /// Load the configuration file at `path` and validate it.
    ///
    /// A missing file yields defaults unless `required` is set.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed, or a
    /// value fails validation.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let config: Self = toml_loader::load_config(path, required)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve which file to load: the explicit `--config` path, then the
    /// [`CONFIG_ENV`] variable, then [`DEFAULT_CONFIG_PATH`].
    ///
    /// The returned flag is `true` when the file was named explicitly and
    /// must therefore exist.
    #[must_use]
    pub fn resolve_path(explicit: Option<&Path>) -> (PathBuf, bool) {
        if let Some(path) = explicit {
            return (path.to_path_buf(), true);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV)
            && !path.is_empty()
        {
            return (PathBuf::from(path), true);
        }
        (PathBuf::from(DEFAULT_CONFIG_PATH), false)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.is_empty() {
            return Err(invalid("service", "must not be empty"));
        }
        if self.service.contains('/') || self.service.chars().any(char::is_whitespace) {
            return Err(invalid(
                "service",
                format!("'{}' must be a bare unit name", self.service),
            ));
        }
        if self.dependencies.python.trim().is_empty() {
            return Err(invalid("dependencies.python", "must not be empty"));
        }
        if self.registrar.helper.trim().is_empty() {
            return Err(invalid("registrar.helper", "must not be empty"));
        }
        Ok(())
    }

    /// Expected path of the service's unit-description file.
    #[must_use]
    pub fn unit_file(&self) -> PathBuf {
        self.unit_dir.join(&self.service)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}


#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::test_helpers::write_temp_file;
    use super::*;

    #[test]
    fn defaults_match_packaging_layout() {
        let config = Config::default();
        assert_eq!(config.service, "aggregator.service");
        assert_eq!(
            config.unit_file(),
            PathBuf::from("/lib/systemd/system/aggregator.service")
        );
        assert_eq!(config.dependencies.python, "python3");
        assert_eq!(config.registrar.helper, "deb-systemd-helper");
    }

    #[test]
    fn default_policies_tolerate_bookkeeping_only() {
        let steps = StepPolicies::default();
        assert!(!steps.for_step(Step::MarkInstalled).fatal);
        assert!(!steps.for_step(Step::Enable).fatal);
        assert!(steps.for_step(Step::UpdateState).fatal);
    }

    #[test]
    fn missing_optional_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("postinst.toml"), false).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let (_dir, path) = write_temp_file(
            "postinst.toml",
            "service = \"svc1.service\"\n\n[registrar.steps]\nenable = { fatal = true }\n",
        );
        let config = Config::load(&path, true).unwrap();
        assert_eq!(config.service, "svc1.service");
        assert!(config.registrar.steps.enable.fatal);
        assert!(!config.registrar.steps.mark_installed.fatal);
        assert!(config.registrar.steps.update_state.fatal);
        assert_eq!(config.registrar.helper, "deb-systemd-helper");
    }

    #[test]
    fn full_file_round_trips_all_sections() {
        let (_dir, path) = write_temp_file(
            "postinst.toml",
            r#"service = "aggregator.service"
manifest = "/opt/aggregator/requirements.txt"
unit-dir = "/usr/lib/systemd/system"

[dependencies]
python = "/usr/bin/python3.11"
extra-args = ["--break-system-packages"]

[registrar]
helper = "/usr/bin/deb-systemd-helper"
"#,
        );
        let config = Config::load(&path, true).unwrap();
        assert_eq!(
            config.manifest,
            PathBuf::from("/opt/aggregator/requirements.txt")
        );
        assert_eq!(config.dependencies.extra_args, ["--break-system-packages"]);
        assert_eq!(config.registrar.helper, "/usr/bin/deb-systemd-helper");
        assert_eq!(
            config.unit_file(),
            PathBuf::from("/usr/lib/systemd/system/aggregator.service")
        );
    }

    #[test]
    fn unknown_key_rejected() {
        let (_dir, path) = write_temp_file("postinst.toml", "servcie = \"typo\"\n");
        let err = Config::load(&path, true).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn empty_service_rejected() {
        let (_dir, path) = write_temp_file("postinst.toml", "service = \"\"\n");
        let err = Config::load(&path, true).unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { field: "service", .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn service_with_path_rejected() {
        let config = Config {
            service: "../etc/passwd".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_helper_rejected() {
        let mut config = Config::default();
        config.registrar.helper = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("registrar.helper"), "got {err}");
    }

    #[test]
    fn resolve_path_prefers_explicit() {
        let (path, required) = Config::resolve_path(Some(Path::new("/tmp/custom.toml")));
        assert_eq!(path, PathBuf::from("/tmp/custom.toml"));
        assert!(required);
    }
}
