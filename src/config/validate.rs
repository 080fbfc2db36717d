// src/config/validate.rs

use std::collections::HashSet;
use std::path::{Component, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::config::model::{FixtureConfig, Manifest, RawManifest, Settings, SettingsSection};
use crate::errors::{PrunecheckError, Result};

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\.\d+\.\d+([-+][0-9A-Za-z.+-]+)?$").expect("version pattern is valid")
});

/// Package names, optionally scoped. Workspace names are spliced into a
/// shell command line, so nothing else is accepted.
static WORKSPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(@[A-Za-z0-9._~-]+/)?[A-Za-z0-9._~-]+$").expect("workspace pattern is valid")
});

impl TryFrom<RawManifest> for Manifest {
    type Error = PrunecheckError;

    fn try_from(raw: RawManifest) -> std::result::Result<Self, Self::Error> {
        let settings = validate_settings(&raw.settings)?;
        ensure_has_fixtures(&raw)?;
        validate_unique_names(&raw)?;
        for fixture in &raw.fixtures {
            validate_fixture(fixture)?;
        }
        Ok(Manifest::new_unchecked(settings, raw.fixtures))
    }
}

fn config_error(msg: impl Into<String>) -> PrunecheckError {
    PrunecheckError::ConfigError(msg.into())
}

fn validate_settings(raw: &SettingsSection) -> Result<Settings> {
    let command_timeout = parse_duration(&raw.command_timeout)
        .map_err(|e| config_error(format!("[settings].command_timeout: {e}")))?;
    if command_timeout.is_zero() {
        return Err(config_error("[settings].command_timeout must be > 0"));
    }

    if raw.max_output_bytes == 0 {
        return Err(config_error("[settings].max_output_bytes must be >= 1 (got 0)"));
    }

    let prune_output_dir = PathBuf::from(&raw.prune_output_dir);
    let is_plain_relative = !raw.prune_output_dir.is_empty()
        && prune_output_dir
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if !is_plain_relative {
        return Err(config_error(format!(
            "[settings].prune_output_dir must be a relative path inside the repo (got '{}')",
            raw.prune_output_dir
        )));
    }

    if raw.sut_name.is_empty() || raw.sut_name.contains(['/', '\\']) {
        return Err(config_error(format!(
            "[settings].sut_name must be a bare file name (got '{}')",
            raw.sut_name
        )));
    }

    Ok(Settings {
        command_timeout,
        max_output_bytes: raw.max_output_bytes,
        prune_output_dir,
        sut_name: raw.sut_name.clone(),
    })
}

fn ensure_has_fixtures(raw: &RawManifest) -> Result<()> {
    if raw.fixtures.is_empty() {
        return Err(config_error(
            "manifest must contain at least one [[fixture]] entry",
        ));
    }
    Ok(())
}

fn validate_unique_names(raw: &RawManifest) -> Result<()> {
    let mut seen = HashSet::new();
    for fixture in &raw.fixtures {
        if !seen.insert(fixture.name.as_str()) {
            return Err(config_error(format!(
                "duplicate fixture name '{}'",
                fixture.name
            )));
        }
    }
    Ok(())
}

fn validate_fixture(fixture: &FixtureConfig) -> Result<()> {
    let name = &fixture.name;

    if name.trim().is_empty() {
        return Err(config_error("fixture name must not be empty"));
    }

    if !VERSION_RE.is_match(&fixture.version) {
        return Err(config_error(format!(
            "fixture '{name}' has invalid version '{}' (expected e.g. \"9.15.0\")",
            fixture.version
        )));
    }

    if let Some(cmd) = &fixture.frozen_install {
        if cmd.is_empty() || cmd.iter().all(|t| t.trim().is_empty()) {
            return Err(config_error(format!(
                "fixture '{name}' has an empty frozen_install command"
            )));
        }
    }

    if fixture.workspaces.is_empty() {
        return Err(config_error(format!(
            "fixture '{name}' must list at least one workspace"
        )));
    }

    let mut seen = HashSet::new();
    for ws in &fixture.workspaces {
        if !WORKSPACE_RE.is_match(ws) {
            return Err(config_error(format!(
                "fixture '{name}' has invalid workspace name '{ws}'"
            )));
        }
        if !seen.insert(ws.as_str()) {
            return Err(config_error(format!(
                "fixture '{name}' lists workspace '{ws}' more than once"
            )));
        }
    }

    for ws in &fixture.expected_failures {
        if !seen.contains(ws.as_str()) {
            return Err(config_error(format!(
                "fixture '{name}' expects failure for unknown workspace '{ws}'"
            )));
        }
    }

    Ok(())
}

/// Parse `"<n><unit>"` with unit `ms`, `s`, `m` or `h`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;

    match unit_part.trim().to_lowercase().as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => scaled_secs(value, 60),
        "h" => scaled_secs(value, 60 * 60),
        unit => Err(format!(
            "unsupported duration unit '{unit}'; expected ms, s, m, or h"
        )),
    }
}

fn scaled_secs(value: u64, factor: u64) -> std::result::Result<Duration, String> {
    value
        .checked_mul(factor)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration too large: {value} * {factor}s"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("10m"), Ok(Duration::from_secs(600)));
        assert_eq!(parse_duration(" 250ms "), Ok(Duration::from_millis(250)));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("5d").is_err());

        let err = parse_duration("99999999999999999h").unwrap_err();
        assert!(err.contains("too large"), "{err}");
        assert!(parse_duration("999999999999999999m").is_err());
    }

    #[test]
    fn version_pattern() {
        assert!(VERSION_RE.is_match("10.2.0"));
        assert!(VERSION_RE.is_match("4.0.0-rc.1"));
        assert!(!VERSION_RE.is_match("npm@10.2.0"));
        assert!(!VERSION_RE.is_match("10.2"));
        assert!(!VERSION_RE.is_match("1.0.0-x;reboot"));
    }

    #[test]
    fn workspace_pattern() {
        assert!(WORKSPACE_RE.is_match("web"));
        assert!(WORKSPACE_RE.is_match("@repo/ui"));
        assert!(WORKSPACE_RE.is_match("docs_v2.site"));
        assert!(!WORKSPACE_RE.is_match("web docs"));
        assert!(!WORKSPACE_RE.is_match("$(id)"));
        assert!(!WORKSPACE_RE.is_match("a/b/c"));
    }
}
