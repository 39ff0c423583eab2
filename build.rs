//! Stamp the build with its commit and time.
//!
//! - `TILT_GIT_COMMIT`: short commit hash of HEAD, or "unknown" outside git
//! - `TILT_BUILD_TIMESTAMP`: UTC build time, ISO 8601
//!
//! Both show up in `tilt --version` and the `/api/health` response.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let commit = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let built = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");

    println!("cargo:rustc-env=TILT_GIT_COMMIT={}", commit);
    println!("cargo:rustc-env=TILT_BUILD_TIMESTAMP={}", built);
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
