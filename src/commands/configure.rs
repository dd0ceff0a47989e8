//! Command: provision the service (`postinst configure`).
use std::sync::Arc;

use anyhow::Result;

use super::{load_config, run_tasks_to_completion};
use crate::cli::{ConfigureOpts, GlobalOpts};
use crate::config::Config;
use crate::exec::{Executor, SystemExecutor};
use crate::logging::{Log, Logger};
use crate::tasks::{self, Context};

/// Run the configure command against the host.
///
/// # Errors
///
/// Returns an error if configuration loading or any fatal step fails.
pub fn run(global: &GlobalOpts, opts: &ConfigureOpts, log: &Arc<Logger>) -> Result<()> {
    log.info(&format!("aggregator postinst {}", super::version::version()));
    match &opts.previous_version {
        Some(previous) => log.info(&format!("configuring after upgrade from {previous}")),
        None => log.info("configuring fresh install"),
    }

    let config = load_config(global, log)?;
    log.info(&format!(
        "service {}, manifest {}",
        config.service,
        config.manifest.display()
    ));

    let executor: Arc<dyn Executor> = Arc::new(SystemExecutor);
    preflight(&config, &*executor, &**log);
    let ctx = Context::for_host(
        Arc::new(config),
        Arc::clone(log) as Arc<dyn Log>,
        global.dry_run,
        &executor,
    );
    provision(&ctx, log)
}

/// Warn about host programs that are not on `PATH`.
///
/// Missing programs are not fatal here; the step that needs one fails on
/// its own and is handled by that step's policy.
fn preflight(config: &Config, executor: &dyn Executor, log: &dyn Log) {
    for program in [&config.dependencies.python, &config.registrar.helper] {
        if !executor.which(program) {
            log.warn(&format!("{program} not found on PATH"));
        }
    }
}

/// Run the provisioning pipeline with the handles in `ctx`.
///
/// # Errors
///
/// Returns the error of the first task that failed.
pub fn provision(ctx: &Context, log: &Logger) -> Result<()> {
    run_tasks_to_completion(&tasks::all_configure_tasks(), ctx, log)
}
