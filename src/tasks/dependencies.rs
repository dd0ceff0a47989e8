//! Task: install the service's runtime dependencies.
use anyhow::Result;

use super::{Context, Task, TaskResult, TaskStats};
use crate::config::manifest;
use crate::resources::ResourceState;
use crate::resources::dependency::{DependencyResource, batch_install};

/// Install every manifest requirement that is not yet satisfied.
///
/// Queries the environment **once**, then installs all missing or
/// out-of-date requirements in a single batch. Any failure is fatal for the
/// pipeline.
#[derive(Debug)]
pub struct InstallDependencies;

impl Task for InstallDependencies {
    fn name(&self) -> &'static str {
        "Install dependencies"
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let path = &ctx.config.manifest;
        let requirements = manifest::load(path)?;
        if requirements.is_empty() {
            return Ok(TaskResult::Skipped(
                "manifest lists no dependencies".to_string(),
            ));
        }
        ctx.log.debug(&format!(
            "{} requirements in {}; batch-checking with a single query",
            requirements.len(),
            path.display()
        ));

        let installed = ctx.environment.installed()?;
        let environment = &*ctx.environment;
        let mut stats = TaskStats::new();
        let mut pending = Vec::new();
        for requirement in requirements {
            let resource = DependencyResource::new(requirement, environment);
            match resource.state_from_installed(&installed) {
                ResourceState::Correct => {
                    ctx.log
                        .debug(&format!("ok: {}", resource.requirement.spec));
                    stats.already_ok += 1;
                }
                state => pending.push((resource, state)),
            }
        }

        if pending.is_empty() {
            return Ok(stats.finish(ctx));
        }

        if ctx.dry_run {
            for (resource, state) in &pending {
                let spec = &resource.requirement.spec;
                match state {
                    ResourceState::Incorrect { current } => ctx
                        .log
                        .dry_run(&format!("would install {spec} (currently {current})")),
                    _ => ctx.log.dry_run(&format!("would install: {spec}")),
                }
            }
        } else {
            let specs: Vec<&str> = pending
                .iter()
                .map(|(r, _)| r.requirement.spec.as_str())
                .collect();
            ctx.log.info(&format!("installing {}", specs.join(", ")));
            let batch: Vec<&DependencyResource<'_>> = pending.iter().map(|(r, _)| r).collect();
            batch_install(&batch)?;
        }
        stats.changed += u32::try_from(pending.len()).unwrap_or(u32::MAX);
        Ok(stats.finish(ctx))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::environment::PipEnvironment;
    use crate::error::DependencyInstallError;
    use crate::exec::Executor;
    use crate::resources::test_helpers::{FakeEnvironment, FakeSupervisor, MockExecutor};
    use crate::supervisor::InstallationState;
    use crate::tasks::test_helpers::{context_with, make_context, package_layout};

    #[test]
    fn installs_missing_in_one_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let config = package_layout(tmp.path(), "alpha\nbeta>=2.0\n");
        let (ctx, h) = make_context(config, &[], InstallationState::Unknown);

        let result = InstallDependencies.run(&ctx).unwrap();

        assert_eq!(result, TaskResult::Ok);
        assert_eq!(
            h.environment.install_calls(),
            [vec!["alpha".to_string(), "beta>=2.0".to_string()]]
        );
        assert!(h.environment.installed_names().contains("beta"));
        assert!(h.log.infos().contains(&"2 changed, 0 already ok".to_string()));
    }

    #[test]
    fn installs_only_what_is_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let config = package_layout(tmp.path(), "Alpha\nbeta\n");
        let (ctx, h) = make_context(config, &["alpha"], InstallationState::Unknown);

        InstallDependencies.run(&ctx).unwrap();

        assert_eq!(h.environment.install_calls(), [vec!["beta".to_string()]]);
    }

    #[test]
    fn outdated_dependency_is_upgraded_once() {
        let tmp = tempfile::tempdir().unwrap();
        let config = package_layout(tmp.path(), "alpha>=2.0\n");
        let (ctx, h) = make_context(config, &["alpha==1.0"], InstallationState::Unknown);

        assert_eq!(InstallDependencies.run(&ctx).unwrap(), TaskResult::Ok);
        assert_eq!(h.environment.install_calls(), [vec!["alpha>=2.0".to_string()]]);
        assert_eq!(h.environment.version_of("alpha").as_deref(), Some("2.0"));

        assert_eq!(InstallDependencies.run(&ctx).unwrap(), TaskResult::Ok);
        assert_eq!(h.environment.install_calls().len(), 1, "rerun must not reinstall");
        assert_eq!(
            h.log.infos().last().map(String::as_str),
            Some("0 changed, 1 already ok")
        );
    }

    #[test]
    fn satisfied_constraint_is_left_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let config = package_layout(tmp.path(), "alpha>=2.0,<3\nbeta==1.0\n");
        let (ctx, h) = make_context(
            config,
            &["alpha==2.4.1", "beta==1.0.0"],
            InstallationState::Unknown,
        );

        InstallDependencies.run(&ctx).unwrap();
        assert!(h.environment.install_calls().is_empty());
    }

    #[test]
    fn pip_upgrade_reaches_installer() {
        let tmp = tempfile::tempdir().unwrap();
        let config = package_layout(tmp.path(), "alpha>=2.0\n");
        let executor = Arc::new(MockExecutor::with_responses(vec![
            (true, "alpha==1.0\n".to_string()),
            (true, String::new()),
        ]));
        let environment =
            PipEnvironment::new("python3", Vec::new(), Arc::clone(&executor) as Arc<dyn Executor>);
        let (ctx, _) = context_with(
            config,
            FakeEnvironment::new(&[]),
            FakeSupervisor::new(InstallationState::Unknown),
        );
        let ctx = Context {
            environment: Arc::new(environment),
            ..ctx
        };

        InstallDependencies.run(&ctx).unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 2, "{calls:?}");
        assert!(calls[1].contains("install"), "{calls:?}");
        assert!(calls[1].contains("alpha>=2.0"), "{calls:?}");
    }

    #[test]
    fn all_present_runs_no_install() {
        let tmp = tempfile::tempdir().unwrap();
        let config = package_layout(tmp.path(), "alpha\nbeta\n");
        let (ctx, h) = make_context(config, &["alpha", "beta"], InstallationState::Unknown);

        assert_eq!(InstallDependencies.run(&ctx).unwrap(), TaskResult::Ok);
        assert!(h.environment.install_calls().is_empty());
        assert!(h.log.infos().contains(&"0 changed, 2 already ok".to_string()));
    }

    #[test]
    fn empty_manifest_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let config = package_layout(tmp.path(), "# nothing yet\n\n");
        let (ctx, h) = make_context(config, &[], InstallationState::Unknown);

        assert!(matches!(
            InstallDependencies.run(&ctx).unwrap(),
            TaskResult::Skipped(_)
        ));
        assert!(h.environment.install_calls().is_empty());
    }

    #[test]
    fn unresolvable_dependency_fails_with_exit_code() {
        let tmp = tempfile::tempdir().unwrap();
        let config = package_layout(tmp.path(), "gamma\n");
        let (ctx, h) = context_with(
            config,
            FakeEnvironment::new(&[]).with_unresolvable("gamma"),
            FakeSupervisor::new(InstallationState::Unknown),
        );

        let err = InstallDependencies.run(&ctx).unwrap_err();
        let install = err
            .downcast_ref::<DependencyInstallError>()
            .expect("typed error");
        assert_eq!(install.exit_code(), 1);
        assert!(h.environment.installed_names().is_empty());
    }

    #[test]
    fn failing_query_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let config = package_layout(tmp.path(), "alpha\n");
        let (ctx, h) = context_with(
            config,
            FakeEnvironment::new(&[]).with_failing_query(),
            FakeSupervisor::new(InstallationState::Unknown),
        );

        let err = InstallDependencies.run(&ctx).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DependencyInstallError>(),
            Some(DependencyInstallError::QueryFailed { .. })
        ));
        assert!(h.environment.install_calls().is_empty());
    }

    #[test]
    fn invalid_manifest_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let config = package_layout(tmp.path(), "-r other.txt\n");
        let (ctx, h) = make_context(config, &[], InstallationState::Unknown);

        let err = InstallDependencies.run(&ctx).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DependencyInstallError>(),
            Some(DependencyInstallError::InvalidSpecifier { line: 1, .. })
        ));
        assert!(h.environment.install_calls().is_empty());
    }

    #[test]
    fn dry_run_reports_without_installing() {
        let tmp = tempfile::tempdir().unwrap();
        let config = package_layout(tmp.path(), "alpha\nbeta\n");
        let (mut ctx, h) = make_context(config, &["alpha"], InstallationState::Unknown);
        ctx.dry_run = true;

        assert_eq!(InstallDependencies.run(&ctx).unwrap(), TaskResult::DryRun);
        assert!(h.environment.install_calls().is_empty());
        assert_eq!(h.log.dry_runs(), ["would install: beta"]);
    }

    #[test]
    fn dry_run_reports_installed_version_of_outdated() {
        let tmp = tempfile::tempdir().unwrap();
        let config = package_layout(tmp.path(), "alpha>=2.0\n");
        let (mut ctx, h) = make_context(config, &["alpha==1.0"], InstallationState::Unknown);
        ctx.dry_run = true;

        InstallDependencies.run(&ctx).unwrap();
        assert_eq!(h.log.dry_runs(), ["would install alpha>=2.0 (currently 1.0)"]);
        assert_eq!(h.environment.version_of("alpha").as_deref(), Some("1.0"));
    }
}
