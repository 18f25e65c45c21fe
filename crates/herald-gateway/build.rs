//! Stamps the binary with a build identifier for `/health`.
//!
//! `HERALD_BUILD_ID` in the environment wins (release pipelines and
//! container builds without a checkout). Otherwise the identifier is the
//! crate version plus `git describe`, or the bare version outside a repo.

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8(out.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}

fn main() {
    println!("cargo:rerun-if-env-changed=HERALD_BUILD_ID");

    let version = env!("CARGO_PKG_VERSION");
    let build = match std::env::var("HERALD_BUILD_ID") {
        Ok(id) if !id.trim().is_empty() => id.trim().to_owned(),
        _ => match git(&["describe", "--always", "--dirty"]) {
            Some(rev) => format!("{version}+{rev}"),
            None => version.to_owned(),
        },
    };
    println!("cargo:rustc-env=HERALD_BUILD={build}");

    if let Some(git_dir) = git(&["rev-parse", "--absolute-git-dir"]) {
        println!("cargo:rerun-if-changed={git_dir}/HEAD");
        println!("cargo:rerun-if-changed={git_dir}/index");
    }
}
