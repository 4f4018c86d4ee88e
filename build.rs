use cargo_lock::Lockfile;
use chrono::{DateTime, Utc};
use git2::Repository;
use std::env;
use std::fs;
use std::path::Path;

const UNKNOWN: &str = "unknown";
const SCYLLA_PKG_NAME: &str = "scylla";

fn get_git_info() -> Option<(String, String)> {
    let repo = Repository::open(".").ok()?;
    let head = repo.head().ok()?;
    let commit = head.peel_to_commit().ok()?;
    let dt = DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0)?;
    Some((
        dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        commit.id().to_string(),
    ))
}

// Looks up the driver version pinned in Cargo.lock. A path or git source
// is reported with a `-dev` suffix.
fn get_scylla_version() -> Option<String> {
    let lockfile = Lockfile::load("Cargo.lock").ok()?;
    let scylla_pkg = lockfile
        .packages
        .iter()
        .find(|p| p.name.as_str() == SCYLLA_PKG_NAME)?;
    let is_registry = scylla_pkg
        .source
        .as_ref()
        .map(|s| !s.to_string().contains("git+"))
        .unwrap_or(false);
    let version = scylla_pkg.version.to_string();
    Some(if is_registry {
        version
    } else {
        format!("{version}-dev")
    })
}

fn main() {
    let out_dir = env::var_os("OUT_DIR").unwrap();
    let (commit_date, sha) = get_git_info().unwrap_or_else(|| (UNKNOWN.into(), UNKNOWN.into()));
    let scylla_version = get_scylla_version().unwrap_or_else(|| UNKNOWN.into());

    fs::write(
        Path::new(&out_dir).join("version_info.rs"),
        format!(
            "pub const PKG_VERSION: &str = \"{}\";\n\
             pub const COMMIT_DATE: &str = \"{}\";\n\
             pub const GIT_SHA: &str = \"{}\";\n\
             pub const SCYLLA_VERSION: &str = \"{}\";\n",
            env!("CARGO_PKG_VERSION"),
            commit_date,
            sha,
            scylla_version,
        ),
    )
    .unwrap();

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=Cargo.lock");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
