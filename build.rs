//! Build script: embeds the package version as `AGGREGATOR_POSTINST_VERSION`.

use std::process::Command;

fn main() {
    // Release packaging sets AGGREGATOR_POSTINST_VERSION to the Debian version;
    // local builds fall back to git describe.
    if let Ok(version) = std::env::var("AGGREGATOR_POSTINST_VERSION") {
        println!("cargo:rustc-env=AGGREGATOR_POSTINST_VERSION={version}");
    } else if let Ok(output) = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        && output.status.success()
    {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=AGGREGATOR_POSTINST_VERSION={version}");
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-env-changed=AGGREGATOR_POSTINST_VERSION");
}
