//! Resource processing for tasks: check state, apply under a policy, count.
//!
//! - [`apply`]: single-resource processing (`process_single`)
//! - [`context`]: shared execution context for tasks

pub(super) mod apply;
pub mod context;

pub use context::Context;

use crate::config::StepPolicy;

/// Result of a single task execution.
///
/// # Examples
///
/// ```
/// use aggregator_postinst::tasks::TaskResult;
///
/// let ok = TaskResult::Ok;
/// let partial = TaskResult::Partial("enable failed".into());
/// let skipped = TaskResult::Skipped("manifest lists no dependencies".into());
///
/// assert!(matches!(ok, TaskResult::Ok));
/// assert!(matches!(partial, TaskResult::Partial(_)));
/// assert!(matches!(skipped, TaskResult::Skipped(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    /// Task completed successfully.
    Ok,
    /// Task completed, but a best-effort step failed.
    Partial(String),
    /// Task had nothing to do.
    Skipped(String),
    /// Task ran in dry-run mode.
    DryRun,
}

/// Counters for tasks that process several resources.
///
/// # Examples
///
/// ```
/// use aggregator_postinst::tasks::TaskStats;
///
/// let mut stats = TaskStats::new();
/// stats.changed = 2;
/// stats.already_ok = 1;
///
/// assert_eq!(stats.summary(false), "2 changed, 1 already ok");
/// assert_eq!(stats.summary(true), "2 would change, 1 already ok");
/// ```
///
/// When best-effort items failed, the summary includes the count:
///
/// ```
/// use aggregator_postinst::tasks::TaskStats;
///
/// let stats = TaskStats { changed: 1, already_ok: 1, failed: 1 };
/// assert_eq!(stats.summary(false), "1 changed, 1 already ok, 1 failed");
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskStats {
    /// Number of items changed or applied.
    pub changed: u32,
    /// Number of items already in the correct state.
    pub already_ok: u32,
    /// Number of best-effort items whose apply failed.
    pub failed: u32,
}

impl TaskStats {
    /// Create a new empty stats counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Format the summary string (e.g. "2 changed, 1 already ok, 1 failed").
    #[must_use]
    pub fn summary(&self, dry_run: bool) -> String {
        let verb = if dry_run { "would change" } else { "changed" };
        if self.failed > 0 {
            format!(
                "{} {verb}, {} already ok, {} failed",
                self.changed, self.already_ok, self.failed
            )
        } else {
            format!("{} {verb}, {} already ok", self.changed, self.already_ok)
        }
    }

    /// Log the summary and return the appropriate `TaskResult`.
    #[must_use]
    pub fn finish(self, ctx: &Context) -> TaskResult {
        ctx.log.info(&self.summary(ctx.dry_run));
        if ctx.dry_run {
            TaskResult::DryRun
        } else {
            TaskResult::Ok
        }
    }
}

impl std::ops::AddAssign for TaskStats {
    fn add_assign(&mut self, other: Self) {
        self.changed += other.changed;
        self.already_ok += other.already_ok;
        self.failed += other.failed;
    }
}

/// How one registrar step is processed: its log verb and failure policy.
///
/// # Examples
///
/// ```
/// use aggregator_postinst::config::StepPolicy;
/// use aggregator_postinst::tasks::ProcessOpts;
///
/// let reconcile = ProcessOpts::new("reconcile", StepPolicy::FATAL);
/// assert!(reconcile.policy.fatal);
///
/// let enable = ProcessOpts::new("enable", StepPolicy::BEST_EFFORT);
/// assert!(!enable.policy.fatal);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ProcessOpts<'a> {
    /// Verb for log messages (e.g., "enable", "reconcile").
    pub verb: &'a str,
    /// Whether a failed apply aborts the task.
    pub policy: StepPolicy,
}

impl<'a> ProcessOpts<'a> {
    /// Options for applying with `verb` under `policy`.
    #[must_use]
    pub const fn new(verb: &'a str, policy: StepPolicy) -> Self {
        Self { verb, policy }
    }
}
