//! Check-then-apply for one resource under its step's failure policy.

use anyhow::Result;

use super::context::Context;
use super::{ProcessOpts, TaskStats};
use crate::resources::{Resource, ResourceState};

/// Bring one resource to its desired state, returning a stats delta.
///
/// Resources already in the desired state are left alone. In dry-run mode
/// the pending change is reported and counted as changed without applying.
/// A failed apply is returned when the policy is fatal; under a best-effort
/// policy it is logged as a warning and counted as failed.
pub(in crate::tasks) fn process_single<R: Resource>(
    ctx: &Context,
    resource: &R,
    opts: &ProcessOpts,
) -> Result<TaskStats> {
    let desc = resource.description();
    let mut delta = TaskStats::new();

    let current = match resource.current_state()? {
        ResourceState::Correct => {
            ctx.log.debug(&format!("already done: {desc}"));
            delta.already_ok += 1;
            return Ok(delta);
        }
        ResourceState::Missing => None,
        ResourceState::Incorrect { current } => Some(current),
    };

    if ctx.dry_run {
        ctx.log.dry_run(&pending_change(opts.verb, &desc, current.as_deref()));
        delta.changed += 1;
        return Ok(delta);
    }

    match resource.apply() {
        Ok(()) => {
            ctx.log.debug(&format!("{}: {desc}", opts.verb));
            delta.changed += 1;
        }
        Err(e) if opts.policy.fatal => {
            ctx.log
                .debug(&format!("{desc} failed and its step is fatal; aborting"));
            return Err(e);
        }
        Err(e) => {
            ctx.log.warn(&format!(
                "could not {} {desc} (best-effort step, continuing): {e}",
                opts.verb
            ));
            delta.failed += 1;
        }
    }
    Ok(delta)
}

/// Dry-run line for a change that would be made.
fn pending_change(verb: &str, desc: &str, current: Option<&str>) -> String {
    match current {
        Some(current) => format!("would {verb} {desc} (currently {current})"),
        None => format!("would {verb}: {desc}"),
    }
}
