//! Build metadata surfaced by `sotto version`.

/// Returns build metadata in the user-facing version output format.
///
/// Commit and date come from `SOTTO_COMMIT`/`SOTTO_BUILD_DATE` at build time
/// when release tooling sets them.
pub fn string() -> String {
    format!(
        "sotto {} (commit={}, date={})",
        env!("CARGO_PKG_VERSION"),
        option_env!("SOTTO_COMMIT").unwrap_or("none"),
        option_env!("SOTTO_BUILD_DATE").unwrap_or("unknown"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_includes_package_version() {
        let version = string();
        assert!(version.starts_with("sotto "));
        assert!(version.contains(env!("CARGO_PKG_VERSION")));
        assert!(version.contains("commit="));
    }
}
