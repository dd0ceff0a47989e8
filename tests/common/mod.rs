// Shared helpers for integration tests.
//
// Provides in-memory host handles implementing the public
// `DependencyEnvironment` and `Supervisor` traits, plus a temp-dir package
// layout, so each test binary can drive the provisioning pipeline without
// touching pip or the real supervisor.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code, clippy::expect_used)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use aggregator_postinst::config::Config;
use aggregator_postinst::config::manifest::{self, Comparison, Constraint, normalize_name};
use aggregator_postinst::environment::{DependencyEnvironment, InstalledDistributions};
use aggregator_postinst::error::{DependencyInstallError, RegistrationError, StepFailure};
use aggregator_postinst::logging::{Log, Logger};
use aggregator_postinst::supervisor::{InstallationState, Step, Supervisor};
use aggregator_postinst::tasks::Context;

/// Dependency environment backed by a map of installed versions.
///
/// Entries are `name` or `name==version` (`1.0` when omitted). Installing
/// picks the lowest version a specifier's bounds name, keeping the current
/// one when it already fits. Projects listed in `unavailable` cannot be
/// resolved; a batch naming any of them fails as a whole and installs
/// nothing.
#[derive(Debug, Default)]
pub struct MemoryEnvironment {
    installed: Mutex<InstalledDistributions>,
    unavailable: HashSet<String>,
    batches: Mutex<Vec<Vec<String>>>,
}

impl MemoryEnvironment {
    pub fn new(installed: &[&str]) -> Self {
        let installed = installed
            .iter()
            .map(|entry| {
                let (name, version) = entry.split_once("==").unwrap_or((*entry, "1.0"));
                (normalize_name(name), version.to_string())
            })
            .collect();
        Self {
            installed: Mutex::new(installed),
            ..Self::default()
        }
    }

    pub fn unavailable(mut self, name: &str) -> Self {
        self.unavailable.insert(normalize_name(name));
        self
    }

    pub fn installed_names(&self) -> HashSet<String> {
        self.installed
            .lock()
            .expect("installed lock")
            .keys()
            .cloned()
            .collect()
    }

    pub fn version_of(&self, name: &str) -> Option<String> {
        self.installed
            .lock()
            .expect("installed lock")
            .get(&normalize_name(name))
            .cloned()
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().expect("batches lock").clone()
    }
}

/// Version an install of `constraint` settles on.
fn resolve(constraint: &Constraint, current: Option<&String>) -> String {
    if let Some(current) = current.filter(|v| constraint.admits(v)) {
        return current.clone();
    }
    let Constraint::Versions(clauses) = constraint else {
        return "1.0".to_string();
    };
    clauses
        .iter()
        .find(|c| {
            matches!(
                c.op,
                Comparison::Equal | Comparison::GreaterEqual | Comparison::Compatible
            )
        })
        .map_or_else(|| "1.0".to_string(), |c| c.version.clone())
}

impl DependencyEnvironment for MemoryEnvironment {
    fn installed(&self) -> Result<InstalledDistributions, DependencyInstallError> {
        Ok(self.installed.lock().expect("installed lock").clone())
    }

    fn install(&self, specs: &[&str]) -> Result<(), DependencyInstallError> {
        self.batches
            .lock()
            .expect("batches lock")
            .push(specs.iter().map(ToString::to_string).collect());
        let requirements = manifest::parse(&specs.join("\n"))?;
        if let Some(missing) = requirements
            .iter()
            .find(|r| self.unavailable.contains(&r.name))
        {
            return Err(DependencyInstallError::InstallFailed {
                packages: specs.iter().map(ToString::to_string).collect(),
                exit_code: Some(1),
                detail: format!("No matching distribution found for {}", missing.name),
            });
        }
        let mut installed = self.installed.lock().expect("installed lock");
        for requirement in requirements {
            let version = resolve(&requirement.constraint, installed.get(&requirement.name));
            installed.insert(requirement.name, version);
        }
        Ok(())
    }
}

/// Supervisor tracking one service's state in memory.
#[derive(Debug)]
pub struct MemorySupervisor {
    state: Mutex<InstallationState>,
    failing: HashSet<Step>,
    exit_code: i32,
    performed: Mutex<Vec<Step>>,
}

impl MemorySupervisor {
    pub fn new(state: InstallationState) -> Self {
        Self {
            state: Mutex::new(state),
            failing: HashSet::new(),
            exit_code: 1,
            performed: Mutex::new(Vec::new()),
        }
    }

    /// Make `step` fail with `exit_code`.
    pub fn failing(mut self, step: Step, exit_code: i32) -> Self {
        self.failing.insert(step);
        self.exit_code = exit_code;
        self
    }

    pub fn state(&self) -> InstallationState {
        *self.state.lock().expect("state lock")
    }

    pub fn performed(&self) -> Vec<Step> {
        self.performed.lock().expect("performed lock").clone()
    }
}

impl Supervisor for MemorySupervisor {
    fn installation_state(&self, _service: &str) -> anyhow::Result<InstallationState> {
        Ok(self.state())
    }

    fn perform(&self, step: Step, service: &str) -> Result<(), RegistrationError> {
        self.performed.lock().expect("performed lock").push(step);
        if self.failing.contains(&step) {
            return Err(RegistrationError::from_failure(StepFailure {
                step,
                service: service.to_string(),
                exit_code: Some(self.exit_code),
                detail: "supervisor refused".to_string(),
            }));
        }
        let mut state = self.state.lock().expect("state lock");
        *state = step.advance(*state);
        Ok(())
    }
}

/// Package files laid out in a temp dir: a unit file and a manifest.
#[derive(Debug)]
pub struct PackageLayout {
    pub dir: tempfile::TempDir,
    pub config: Config,
}

impl PackageLayout {
    /// Lay out `svc1.service` and a manifest with `manifest` as its content.
    pub fn new(manifest: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let unit_dir = dir.path().join("system");
        std::fs::create_dir_all(&unit_dir).expect("create unit dir");
        std::fs::write(
            unit_dir.join("svc1.service"),
            "[Unit]\nDescription=svc1\n\n[Service]\nExecStart=/usr/bin/svc1\n\n[Install]\nWantedBy=multi-user.target\n",
        )
        .expect("write unit file");
        let manifest_path = dir.path().join("requirements.txt");
        std::fs::write(&manifest_path, manifest).expect("write manifest");
        let config = Config {
            service: "svc1.service".to_string(),
            manifest: manifest_path,
            unit_dir,
            ..Config::default()
        };
        Self { dir, config }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn unit_file(&self) -> PathBuf {
        self.config.unit_file()
    }
}

/// Build a context over in-memory handles, returning the handles for
/// inspection alongside the logger the pipeline records into.
pub fn context(
    config: &Config,
    environment: &Arc<MemoryEnvironment>,
    supervisor: &Arc<MemorySupervisor>,
    dry_run: bool,
) -> (Context, Arc<Logger>) {
    let logger = Arc::new(Logger::new("test"));
    let ctx = Context::new(
        Arc::new(config.clone()),
        Arc::clone(&logger) as Arc<dyn Log>,
        dry_run,
        Arc::clone(environment) as Arc<dyn DependencyEnvironment>,
        Arc::clone(supervisor) as Arc<dyn Supervisor>,
    );
    (ctx, logger)
}
