//! Command: print version information.

/// Version string baked in at build time, or the crate version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("AGGREGATOR_POSTINST_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the hook version to stdout.
pub fn run() {
    println!("aggregator-postinst {}", version());
}
