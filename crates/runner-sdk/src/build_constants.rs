/// Build metadata for the runner package, taken from compile-time
/// environment variables with sensible defaults.

/// Runner package metadata.
#[derive(Debug, Clone)]
pub struct RunnerPackage;

impl RunnerPackage {
    /// The semantic version of the runner, from `Cargo.toml`.
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    /// The commit hash from which this binary was built.
    /// Set via the `RUNNER_COMMIT_HASH` env var at compile time, or "N/A".
    pub const COMMIT_HASH: &'static str = match option_env!("RUNNER_COMMIT_HASH") {
        Some(h) => h,
        None => "N/A",
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!RunnerPackage::VERSION.is_empty());
    }

    #[test]
    fn commit_hash_has_default() {
        assert!(!RunnerPackage::COMMIT_HASH.is_empty());
    }
}
