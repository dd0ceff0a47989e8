//! Post-installation provisioning for the aggregator service.
//!
//! Installs the service's runtime dependencies from the package's manifest,
//! then registers the service with the host supervisor so it starts on boot.
//! Every step is idempotent, so the hook is safe to re-run on upgrade.
//!
//! The public API is organised into layers:
//!
//! - **[`config`]**: hook configuration and the dependency manifest
//! - **[`environment`]**, **[`supervisor`]**: narrow handles over host state
//! - **[`resources`]**: idempotent `check + apply` primitives
//! - **[`tasks`]**: the provisioner and registrar as named, ordered tasks
//! - **[`commands`]**: subcommand orchestration (`configure`, `status`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod environment;
pub mod error;
pub mod exec;
pub mod logging;
pub mod resources;
pub mod supervisor;
pub mod tasks;
