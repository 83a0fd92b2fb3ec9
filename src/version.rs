//! Build metadata embedded by `build.rs`

use std::fmt;

use serde::Serialize;

use crate::algorithm::AlgorithmKind;

/// Compile-time build information
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub git_hash: &'static str,
    pub git_branch: &'static str,
    pub git_dirty: bool,
    pub build_timestamp: &'static str,
    pub target: &'static str,
    pub host: &'static str,
    pub profile: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            git_hash: env!("UKG_GIT_HASH"),
            git_branch: env!("UKG_GIT_BRANCH"),
            git_dirty: env!("UKG_GIT_DIRTY") == "true",
            build_timestamp: env!("UKG_BUILD_TIMESTAMP"),
            target: env!("UKG_TARGET"),
            host: env!("UKG_HOST"),
            profile: env!("UKG_PROFILE"),
            rustc_version: env!("UKG_RUSTC_VERSION"),
        }
    }

    /// `0.1.0-abc12345`, with `-dirty` appended for unclean trees
    pub fn full_version(&self) -> String {
        let dirty = if self.git_dirty { "-dirty" } else { "" };
        format!("{}-{}{}", self.version, self.git_hash, dirty)
    }

    pub fn is_release(&self) -> bool {
        self.profile == "release"
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.full_version())?;
        writeln!(f)?;
        writeln!(f, "  Branch:     {}", self.git_branch)?;
        writeln!(f, "  Built:      {} ({})", self.build_timestamp, self.profile)?;
        writeln!(f, "  Target:     {}", self.target)?;
        writeln!(f, "  Host:       {}", self.host)?;
        writeln!(f, "  Compiler:   {}", self.rustc_version)?;
        writeln!(f)?;

        let algorithms: Vec<&str> = AlgorithmKind::all().iter().map(|k| k.id()).collect();
        writeln!(f, "  Algorithms: {}", algorithms.join(", "))?;
        Ok(())
    }
}

pub fn print_version() {
    print!("{}", BuildInfo::current());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_version_format() {
        let info = BuildInfo::current();
        let full = info.full_version();
        assert!(full.starts_with(info.version));
        assert!(full.contains(info.git_hash));
        assert_eq!(full.ends_with("-dirty"), info.git_dirty);
    }

    #[test]
    fn test_display_lists_algorithms() {
        let display = BuildInfo::current().to_string();
        assert!(display.starts_with("ukg-reasoner "));
        assert!(display.contains("ai_knowledge_discovery"));
        assert!(display.contains("Compiler:"));
    }
}
