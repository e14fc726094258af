//! Version information for pve-lxc

/// Get the current version string
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Version plus build metadata, for `--version` output
///
/// `PVE_LXC_GIT_HASH` and `PVE_LXC_BUILD_DATE` are read at compile time
/// when CI sets them.
pub fn get_version_long() -> String {
    let git_hash = option_env!("PVE_LXC_GIT_HASH").unwrap_or("unknown");
    let build_date = option_env!("PVE_LXC_BUILD_DATE").unwrap_or("unknown");
    format!("{} (git: {git_hash}, built: {build_date})", get_version())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_semver_like() {
        let version = get_version();
        assert!(version.split('.').count() >= 2);
    }

    #[test]
    fn test_long_version_contains_short() {
        assert!(get_version_long().starts_with(&get_version()));
    }
}
