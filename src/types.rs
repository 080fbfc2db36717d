// src/types.rs

use std::fmt;

use serde::Deserialize;

/// Package managers a fixture can be installed with.
///
/// `Yarn` is yarn classic (1.x); `YarnBerry` is yarn 2+. Both are activated
/// through corepack under the name `yarn`. `Bun` is the one kind corepack
/// cannot provide, so it is downloaded separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageManager {
    Npm,
    Pnpm,
    Yarn,
    YarnBerry,
    Bun,
}

impl PackageManager {
    /// Name used in `packageManager` strings and by corepack.
    pub fn binary_name(self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn | PackageManager::YarnBerry => "yarn",
            PackageManager::Bun => "bun",
        }
    }

    /// Whether corepack can fetch and activate this package manager.
    pub fn corepack_managed(self) -> bool {
        !matches!(self, PackageManager::Bun)
    }

    /// Install that must succeed from the committed lockfile alone.
    pub fn default_frozen_install(self) -> Vec<String> {
        let cmd: &[&str] = match self {
            PackageManager::Npm => &["npm", "ci"],
            PackageManager::Pnpm => &["pnpm", "install", "--frozen-lockfile"],
            PackageManager::Yarn => &["yarn", "install", "--frozen-lockfile"],
            PackageManager::YarnBerry => &["yarn", "install", "--immutable"],
            PackageManager::Bun => &["bun", "install", "--frozen-lockfile"],
        };
        cmd.iter().map(|s| s.to_string()).collect()
    }

    /// Lockfile check that skips the full install and any fixture scripts.
    ///
    /// Bun has no lockfile-only mode, so its frozen install is used as-is.
    pub fn lightweight_validation_command(self, frozen_install: &[String]) -> String {
        match self {
            PackageManager::Pnpm => "pnpm install --frozen-lockfile --lockfile-only".to_string(),
            PackageManager::Npm => "npm install --package-lock-only --ignore-scripts".to_string(),
            PackageManager::Yarn => "yarn install --frozen-lockfile --ignore-scripts".to_string(),
            PackageManager::YarnBerry => "yarn install --immutable --mode=skip-build".to_string(),
            PackageManager::Bun => frozen_install.join(" "),
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::YarnBerry => "yarn-berry",
            PackageManager::Bun => "bun",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yarn_berry_activates_as_yarn() {
        assert_eq!(PackageManager::YarnBerry.binary_name(), "yarn");
        assert_eq!(PackageManager::YarnBerry.to_string(), "yarn-berry");
    }

    #[test]
    fn bun_validates_with_its_frozen_install() {
        let frozen = PackageManager::Bun.default_frozen_install();
        assert_eq!(
            PackageManager::Bun.lightweight_validation_command(&frozen),
            "bun install --frozen-lockfile"
        );
        assert!(!PackageManager::Bun.corepack_managed());
    }
}
