mod build_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Returns the main version identifier, e.g. `v0.4.0`.
pub(crate) fn identifier() -> String {
    format!("v{}", build_info::PKG_VERSION)
}

/// Returns an RFC 2822 formatted date of the build time in UTC.
pub(crate) fn build_time_utc() -> &'static str {
    build_info::BUILT_TIME_UTC
}

/// Returns the commit hash this was build from, if it was built from a git
/// checkout.
pub(crate) fn git_commit_hash() -> Option<&'static str> {
    build_info::GIT_COMMIT_HASH
}

/// Returns whether the git working directory was dirty when this was built.
pub(crate) fn git_was_dirty() -> bool {
    // `None` occurs in CI runners.
    build_info::GIT_DIRTY == Some(true)
}

/// Returns a string containing all version-related information.
pub(crate) fn full() -> String {
    format!(
        "{} ({}{}), built {}",
        identifier(),
        git_commit_hash().unwrap_or("unknown commit"),
        if git_was_dirty() { ", dirty" } else { "" },
        build_time_utc(),
    )
}
