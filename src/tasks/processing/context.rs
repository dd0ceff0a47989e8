use std::sync::Arc;

use crate::config::Config;
use crate::environment::{DependencyEnvironment, PipEnvironment};
use crate::exec::Executor;
use crate::logging::Log;
use crate::supervisor::{DebSystemdHelper, Supervisor};

/// Shared context for task execution.
///
/// Host state is reached only through the handles held here.
pub struct Context {
    /// Effective configuration.
    pub config: Arc<Config>,
    /// Logger for output and task recording.
    pub log: Arc<dyn Log>,
    /// Whether to perform a dry run (preview changes without applying).
    pub dry_run: bool,
    /// Dependency environment the provisioner installs into.
    pub environment: Arc<dyn DependencyEnvironment>,
    /// Supervisor the registrar registers the service with.
    pub supervisor: Arc<dyn Supervisor>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("log", &"<dyn Log>")
            .field("dry_run", &self.dry_run)
            .field("environment", &"<dyn DependencyEnvironment>")
            .field("supervisor", &"<dyn Supervisor>")
            .finish()
    }
}

impl Context {
    /// Creates a new context from explicit host handles.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        log: Arc<dyn Log>,
        dry_run: bool,
        environment: Arc<dyn DependencyEnvironment>,
        supervisor: Arc<dyn Supervisor>,
    ) -> Self {
        Self {
            config,
            log,
            dry_run,
            environment,
            supervisor,
        }
    }

    /// Creates a context whose handles drive the host's pip and
    /// `deb-systemd-helper` through `executor`.
    #[must_use]
    pub fn for_host(
        config: Arc<Config>,
        log: Arc<dyn Log>,
        dry_run: bool,
        executor: &Arc<dyn Executor>,
    ) -> Self {
        let environment = PipEnvironment::new(
            config.dependencies.python.clone(),
            config.dependencies.extra_args.clone(),
            Arc::clone(executor),
        );
        let supervisor = DebSystemdHelper::new(config.registrar.helper.clone(), Arc::clone(executor));
        Self::new(
            config,
            log,
            dry_run,
            Arc::new(environment),
            Arc::new(supervisor),
        )
    }
}
