//! Command-line interface of the `postinst` hook.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI entry point.
///
/// The package manager invokes the hook as `postinst configure <version>`;
/// running it with no subcommand provisions as well.
#[derive(Parser, Debug)]
#[command(
    name = "postinst",
    about = "Provision the aggregator service after package installation",
    version
)]
pub struct Cli {
    /// Maintainer-script action; defaults to `configure`.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Options shared across all subcommands.
    #[command(flatten)]
    pub global: GlobalOpts,
}

impl Cli {
    /// The subcommand to run, defaulting to `configure`.
    #[must_use]
    pub fn command_or_default(self) -> Command {
        self.command
            .unwrap_or_else(|| Command::Configure(ConfigureOpts::default()))
    }
}

/// Options shared across all subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Configuration file (default: /etc/aggregator/postinst.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Install dependencies and register the service
    Configure(ConfigureOpts),
    /// Package upgrade was aborted (nothing to undo)
    AbortUpgrade(MaintainerArgs),
    /// Package removal was aborted (nothing to undo)
    AbortRemove(MaintainerArgs),
    /// Package deconfiguration was aborted (nothing to undo)
    AbortDeconfigure(MaintainerArgs),
    /// A package trigger fired (nothing to do)
    Triggered(MaintainerArgs),
    /// Show service registration and dependency status
    Status(StatusOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the command's log file.
    #[must_use]
    pub const fn log_name(&self) -> &'static str {
        match self {
            Self::Configure(_) => "configure",
            Self::AbortUpgrade(_) => "abort-upgrade",
            Self::AbortRemove(_) => "abort-remove",
            Self::AbortDeconfigure(_) => "abort-deconfigure",
            Self::Triggered(_) => "triggered",
            Self::Status(_) => "status",
            Self::Version => "version",
        }
    }
}

/// Options for the `configure` subcommand.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigureOpts {
    /// Most recently configured version of the package, on upgrade
    pub previous_version: Option<String>,
}

/// Arguments passed through by the package manager for acknowledged actions.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintainerArgs {
    /// Ignored maintainer-script arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Options for the `status` subcommand.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusOpts {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}
