//! Top-level subcommand orchestration.
pub mod configure;
pub mod status;
pub mod version;

use std::collections::HashSet;

use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::config::Config;
use crate::logging::{Logger, TaskStatus};
use crate::tasks::{self, Context, Task};

/// Reason recorded for tasks not run because an earlier one failed.
pub const ABORTED: &str = "aborted: earlier task failed";

/// Resolve and load the configuration named by the global options.
///
/// Logs only at debug level so that machine-readable command output stays
/// clean.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or validated.
pub fn load_config(global: &GlobalOpts, log: &Logger) -> Result<Config> {
    let (path, required) = Config::resolve_path(global.config.as_deref());
    let config = Config::load(&path, required)?;
    if path.is_file() {
        log.debug(&format!("loaded config from {}", path.display()));
    } else {
        log.debug(&format!(
            "no config at {}; using built-in defaults",
            path.display()
        ));
    }
    match toml::to_string(&config) {
        Ok(text) => {
            for line in text.lines().filter(|l| !l.is_empty()) {
                log.debug(&format!("  {line}"));
            }
        }
        Err(e) => log.debug(&format!("cannot render effective config: {e}")),
    }
    Ok(config)
}

/// Execute tasks in order, halting at the first failure, then print the
/// summary.
///
/// Tasks after a failure, and tasks whose dependencies did not complete,
/// are recorded as skipped and never run.
///
/// # Errors
///
/// Returns the first task error.
pub fn run_tasks_to_completion(
    tasks: &[Box<dyn Task>],
    ctx: &Context,
    log: &Logger,
) -> Result<()> {
    let mut completed = HashSet::new();
    let mut failure = None;
    for task in tasks.iter().map(AsRef::as_ref) {
        if failure.is_some() {
            ctx.log
                .record_task(task.name(), TaskStatus::Skipped, Some(ABORTED));
            continue;
        }
        if !task.dependencies().iter().all(|dep| completed.contains(dep)) {
            ctx.log.warn(&format!(
                "{}: dependencies have not completed",
                task.name()
            ));
            ctx.log.record_task(
                task.name(),
                TaskStatus::Skipped,
                Some("dependencies have not completed"),
            );
            continue;
        }
        match tasks::execute(task, ctx) {
            Ok(()) => {
                completed.insert(task.task_id());
            }
            Err(e) => failure = Some(e),
        }
    }

    log.print_summary();

    failure.map_or(Ok(()), Err)
}

/// Acknowledge a maintainer-script action that needs no work.
pub fn acknowledge(action: &str, log: &Logger) {
    log.debug(&format!("{action}: nothing to do"));
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::supervisor::InstallationState;
    use crate::tasks::TaskResult;
    use crate::tasks::test_helpers::make_context;

    struct Fails;
    struct NeedsFails;

    impl Task for Fails {
        fn name(&self) -> &'static str {
            "fails"
        }
        fn should_run(&self, _ctx: &Context) -> bool {
            true
        }
        fn run(&self, _ctx: &Context) -> Result<TaskResult> {
            anyhow::bail!("boom")
        }
    }

    impl Task for NeedsFails {
        fn name(&self) -> &'static str {
            "needs-fails"
        }
        crate::tasks::task_deps![Fails];
        fn should_run(&self, _ctx: &Context) -> bool {
            true
        }
        fn run(&self, _ctx: &Context) -> Result<TaskResult> {
            Ok(TaskResult::Ok)
        }
    }

    #[test]
    fn halts_at_first_failure() {
        let (ctx, h) = make_context(Config::default(), &[], InstallationState::Unknown);
        let logger = Logger::new("test");
        let tasks: Vec<Box<dyn Task>> = vec![Box::new(Fails), Box::new(NeedsFails)];

        let err = run_tasks_to_completion(&tasks, &ctx, &logger).unwrap_err();

        assert_eq!(err.to_string(), "boom");
        let entries = h.log.tasks();
        assert_eq!(entries[0].status, TaskStatus::Failed);
        assert_eq!(entries[1].status, TaskStatus::Skipped);
        assert_eq!(entries[1].message.as_deref(), Some(ABORTED));
    }

    #[test]
    fn unmet_dependency_is_not_run() {
        let (ctx, h) = make_context(Config::default(), &[], InstallationState::Unknown);
        let logger = Logger::new("test");
        let tasks: Vec<Box<dyn Task>> = vec![Box::new(NeedsFails)];

        run_tasks_to_completion(&tasks, &ctx, &logger).unwrap();

        assert_eq!(h.log.tasks()[0].status, TaskStatus::Skipped);
    }

    #[test]
    fn load_config_explicit_missing_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let global = GlobalOpts {
            config: Some(tmp.path().join("absent.toml")),
            ..GlobalOpts::default()
        };
        let logger = Logger::new("test");
        let err = load_config(&global, &logger).unwrap_err();
        assert!(err.to_string().contains("absent.toml"), "{err}");
    }

    #[test]
    fn load_config_reads_explicit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("postinst.toml");
        std::fs::write(&path, "service = \"svc1.service\"\n").unwrap();
        let global = GlobalOpts {
            config: Some(path),
            ..GlobalOpts::default()
        };
        let logger = Logger::new("test");
        assert_eq!(load_config(&global, &logger).unwrap().service, "svc1.service");
    }
}
