//! Task: register the service with the supervisor so it starts on boot.
use anyhow::Result;

use super::processing::apply::process_single;
use super::{Context, ProcessOpts, Task, TaskResult, TaskStats, task_deps};
use crate::error::ConfigError;
use crate::resources::service_step::RegistrationStep;
use crate::supervisor::{InstallationState, Step};

/// Run mark-installed, enable and update-state for the configured service.
///
/// Each step follows its configured policy: a best-effort step that fails is
/// logged and the remaining steps still run; a fatal one aborts the task.
#[derive(Debug)]
pub struct RegisterService;

impl Task for RegisterService {
    fn name(&self) -> &'static str {
        "Register service"
    }

    task_deps![super::dependencies::InstallDependencies];

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let config = &ctx.config;
        let service = config.service.as_str();

        let unit_file = config.unit_file();
        if !unit_file.is_file() {
            return Err(ConfigError::MissingUnitFile {
                service: service.to_string(),
                path: unit_file,
            }
            .into());
        }

        let mut observed = match ctx.supervisor.installation_state(service) {
            Ok(state) => state,
            Err(e) => {
                ctx.log.warn(&format!(
                    "cannot query supervisor state for {service}, assuming unknown: {e:#}"
                ));
                InstallationState::Unknown
            }
        };
        ctx.log.debug(&format!("{service} is {observed}"));

        let mut stats = TaskStats::new();
        let mut failed = Vec::new();
        for step in Step::ALL {
            let opts = ProcessOpts::new(step.verb(), config.registrar.steps.for_step(step));
            let resource = RegistrationStep::new(step, service, observed, &*ctx.supervisor);
            let delta = process_single(ctx, &resource, &opts)?;
            if delta.changed > 0 {
                observed = resource.reached();
            }
            if delta.failed > 0 {
                failed.push(step);
            }
            stats += delta;
        }
        ctx.log.debug(&format!("{service} is now {observed}"));

        if failed.is_empty() {
            return Ok(stats.finish(ctx));
        }
        ctx.log.info(&stats.summary(ctx.dry_run));
        let steps: Vec<String> = failed.iter().map(ToString::to_string).collect();
        Ok(TaskResult::Partial(format!(
            "{} failed; {service} may need manual enabling",
            steps.join(", ")
        )))
    }
}
