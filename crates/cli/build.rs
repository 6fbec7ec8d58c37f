use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=APFLEET_GIT_HASH");

    // Packagers building from a tarball can pin the hash themselves.
    let git_hash = std::env::var("APFLEET_GIT_HASH")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(short_commit)
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=APFLEET_GIT_HASH={}", git_hash);

    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=APFLEET_TARGET={}", target);
}

fn short_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string())
}
