// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=BARCODE_SCANNER_VERSION");

    // Packagers may pin the version
    let version = std::env::var("BARCODE_SCANNER_VERSION").unwrap_or_else(|_| git_version());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Crate version, suffixed with the commit when built from a git checkout
fn git_version() -> String {
    let base = env!("CARGO_PKG_VERSION");

    let describe = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty", "--match", "v*"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string());

    match describe {
        // Exactly on a release tag
        Some(d) if d.strip_prefix('v') == Some(base) => base.to_string(),
        Some(d) => format!("{}+{}", base, d.trim_start_matches('v')),
        None => base.to_string(),
    }
}
