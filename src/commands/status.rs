//! Command: report registration and dependency status without changing
//! anything.
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use super::load_config;
use crate::cli::{GlobalOpts, StatusOpts};
use crate::config::manifest::{self, Requirement};
use crate::environment::InstalledDistributions;
use crate::exec::{Executor, SystemExecutor};
use crate::logging::{Log, Logger};
use crate::supervisor::InstallationState;
use crate::tasks::Context;

/// Whether one manifest requirement is met by the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyStatus {
    /// Specifier as written in the manifest.
    pub spec: String,
    /// Installed version of the project, if any.
    pub installed_version: Option<String>,
    /// Whether the installed version satisfies the specifier.
    pub satisfied: bool,
}

impl DependencyStatus {
    fn new(requirement: Requirement, installed: &InstalledDistributions) -> Self {
        let installed_version = installed.get(&requirement.name).cloned();
        let satisfied = installed_version
            .as_deref()
            .is_some_and(|v| requirement.constraint.admits(v));
        Self {
            spec: requirement.spec,
            installed_version,
            satisfied,
        }
    }
}

/// Read-only snapshot of the provisioning state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Service name.
    pub service: String,
    /// Installation state, if the supervisor could be queried.
    pub state: Option<InstallationState>,
    /// Unit-description file location.
    pub unit_file: PathBuf,
    /// Whether the unit-description file exists.
    pub unit_file_present: bool,
    /// Manifest requirements and whether each is satisfied.
    pub dependencies: Vec<DependencyStatus>,
    /// Problems encountered while collecting the report.
    pub errors: Vec<String>,
}

impl StatusReport {
    /// Query the handles in `ctx`. Never mutates host state.
    #[must_use]
    pub fn collect(ctx: &Context) -> Self {
        let config = &ctx.config;
        let mut errors = Vec::new();

        let state = ctx
            .supervisor
            .installation_state(&config.service)
            .map_err(|e| errors.push(format!("supervisor: {e:#}")))
            .ok();

        let unit_file = config.unit_file();
        let dependencies = match manifest::load(&config.manifest) {
            Ok(requirements) if requirements.is_empty() => Vec::new(),
            Ok(requirements) => match ctx.environment.installed() {
                Ok(installed) => requirements
                    .into_iter()
                    .map(|r| DependencyStatus::new(r, &installed))
                    .collect(),
                Err(e) => {
                    errors.push(format!("dependencies: {e}"));
                    Vec::new()
                }
            },
            Err(e) => {
                errors.push(format!("manifest: {e}"));
                Vec::new()
            }
        };

        Self {
            service: config.service.clone(),
            state,
            unit_file_present: unit_file.is_file(),
            unit_file,
            dependencies,
            errors,
        }
    }

    /// Whether the service is fully provisioned.
    #[must_use]
    pub fn is_provisioned(&self) -> bool {
        self.errors.is_empty()
            && self.unit_file_present
            && self.state == Some(InstallationState::ActiveOnBoot)
            && self.dependencies.iter().all(|d| d.satisfied)
    }

    /// Human-readable rendering.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let state = self
            .state
            .map_or_else(|| "unavailable".to_string(), |s| s.to_string());
        let _ = writeln!(out, "service: {} ({state})", self.service);
        let unit = if self.unit_file_present {
            "present"
        } else {
            "missing"
        };
        let _ = writeln!(out, "unit file: {} ({unit})", self.unit_file.display());
        let _ = writeln!(out, "dependencies:");
        for dep in &self.dependencies {
            let mark = if dep.satisfied { "✓" } else { "✗" };
            let _ = write!(out, "  {mark} {}", dep.spec);
            if let (Some(version), false) = (&dep.installed_version, dep.satisfied) {
                let _ = write!(out, " (installed {version})");
            }
            out.push('\n');
        }
        for error in &self.errors {
            let _ = writeln!(out, "error: {error}");
        }
        out
    }
}

/// Run the status command against the host.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the report
/// cannot be serialized.
pub fn run(global: &GlobalOpts, opts: &StatusOpts, log: &Arc<Logger>) -> Result<()> {
    let config = load_config(global, log)?;
    let executor: Arc<dyn Executor> = Arc::new(SystemExecutor);
    let ctx = Context::for_host(
        Arc::new(config),
        Arc::clone(log) as Arc<dyn Log>,
        true,
        &executor,
    );
    let report = StatusReport::collect(&ctx);
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }
    Ok(())
}
