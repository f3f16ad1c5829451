//! Configuration file support for the nightmare runner.
//!
//! This module provides TOML-based configuration file loading with the following features:
//! - Forward-compatible: unknown fields are ignored
//! - Graceful degradation: parse errors are logged but don't prevent a run
//! - Layered configuration: defaults < config file < testbench < command-line arguments

use etcetera::BaseStrategy;
use nightmare_bench::SettingsDef;
use nightmare_core::SuiteMode;
use std::path::{Path, PathBuf};

use crate::args::CommandLineArgs;

/// Root configuration structure for the runner.
///
/// All fields are optional to support forward compatibility and partial configuration.
/// Unknown fields in the TOML file are silently ignored.
#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaults for running suites.
    pub run: RunConfig,
    /// Defaults for reporting results.
    pub output: OutputConfig,
}

/// Defaults for running suites.
#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Run mode used when neither the command line nor the testbench picks one.
    pub mode: Option<SuiteMode>,

    /// Timeout in seconds for tests that do not set one.
    pub timeout: Option<f64>,

    /// Maximum number of captured bytes per stream.
    #[serde(rename = "pipe-limit")]
    pub pipe_limit: Option<usize>,

    /// Drop blank lines before comparing output.
    #[serde(rename = "ignore-empty-lines")]
    pub ignore_empty_lines: Option<bool>,
}

/// Defaults for reporting results.
#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Use colors in the report.
    pub color: Option<bool>,

    /// Render diffs for mismatching output.
    pub diff: Option<bool>,

    /// Echo the output of tests that do not pass.
    #[serde(rename = "output-on-fail")]
    pub output_on_fail: Option<bool>,
}

impl Config {
    /// Returns the test settings the configuration contributes.
    ///
    /// These sit beneath the testbench's own `options`: anything the
    /// testbench or an individual test sets wins.
    pub fn to_bench_options(&self) -> SettingsDef {
        SettingsDef {
            timeout: self.run.timeout,
            pipe_limit: self.run.pipe_limit,
            ignore_empty_lines: self.run.ignore_empty_lines,
            diff: self.output.diff,
            output_on_fail: self.output.output_on_fail,
            ..SettingsDef::default()
        }
    }

    /// Returns whether the report should be colored, merging with CLI arguments.
    ///
    /// # Arguments
    ///
    /// * `args` - The parsed command-line arguments
    pub fn use_color(&self, args: &CommandLineArgs) -> bool {
        merge_bool_setting(!args.no_color, true, self.output.color)
    }
}

/// Merges a boolean setting from CLI args, config file, and defaults.
///
/// Priority: CLI (if explicitly set) > config file > default.
///
/// Since boolean CLI flags can't distinguish between "explicitly set to false" and
/// "not provided" (both result in `false`), we use a heuristic:
/// - If the CLI value differs from the default, the user explicitly provided it
/// - Otherwise, use the config value if present, or fall back to the default
const fn merge_bool_setting(
    cli_value: bool,
    cli_default: bool,
    config_value: Option<bool>,
) -> bool {
    if cli_value != cli_default {
        cli_value
    } else if let Some(config) = config_value {
        config
    } else {
        cli_default
    }
}

/// Result of attempting to load a configuration file.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration, or default if loading failed.
    pub config: Config,
    /// The path that was used (or attempted) for loading.
    pub path: Option<PathBuf>,
    /// Any error that occurred during loading.
    pub error: Option<ConfigLoadError>,
    /// Whether the path was explicitly provided by the user (via `--config`
    /// or `NIGHTMARE_CONFIG`). If true and there's an error, the run should fail.
    pub explicit_path: bool,
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigLoadError {
    /// Failed to read the configuration file.
    Io(std::io::Error),
    /// Failed to parse the TOML content.
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {e}"),
            Self::Parse(e) => write!(f, "failed to parse config file: {e}"),
        }
    }
}

impl std::error::Error for ConfigLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
        }
    }
}

/// Returns the default configuration file path for the current platform.
///
/// Returns `None` if the platform's config directory cannot be determined.
pub fn default_config_path() -> Option<PathBuf> {
    let strategy = etcetera::choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("nightmare").join("config.toml"))
}

/// Loads configuration from the specified path.
///
/// This function sets `explicit_path` to `false`; [`load_config`] handles
/// explicit paths.
pub fn load_from_path(path: &Path) -> ConfigLoadResult {
    let (config, error) = match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(ConfigLoadError::Parse(e))),
        },
        Err(e) => (Config::default(), Some(ConfigLoadError::Io(e))),
    };

    ConfigLoadResult {
        config,
        path: Some(path.to_path_buf()),
        error,
        explicit_path: false,
    }
}

/// Loads configuration based on the provided options.
///
/// # Arguments
///
/// * `disabled` - If true, skip loading and return defaults
/// * `explicit_path` - If provided, use this path instead of the default
pub fn load_config(disabled: bool, explicit_path: Option<&Path>) -> ConfigLoadResult {
    let defaults = |path| ConfigLoadResult {
        config: Config::default(),
        path,
        error: None,
        explicit_path: false,
    };

    if disabled {
        return defaults(None);
    }

    let Some(path) = explicit_path
        .map(Path::to_path_buf)
        .or_else(default_config_path)
    else {
        return defaults(None);
    };

    // A missing file at the default location is not an error.
    if explicit_path.is_none() && !path.exists() {
        return defaults(Some(path));
    }

    let mut result = load_from_path(&path);
    result.explicit_path = explicit_path.is_some();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use assert_fs::prelude::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_config() -> Result<()> {
        let config: Config = toml::from_str("")?;
        assert_eq!(config, Config::default());
        Ok(())
    }

    #[test]
    fn full_config() -> Result<()> {
        let toml = r#"
            [run]
            mode = "break-on-error"
            timeout = 1.5
            pipe-limit = 4096
            ignore-empty-lines = true

            [output]
            color = false
            diff = true
            output-on-fail = true
        "#;

        let config: Config = toml::from_str(toml)?;
        assert_eq!(config.run.mode, Some(SuiteMode::BreakOnError));
        assert_eq!(config.run.timeout, Some(1.5));
        assert_eq!(config.run.pipe_limit, Some(4096));
        assert_eq!(config.run.ignore_empty_lines, Some(true));
        assert_eq!(config.output.color, Some(false));
        assert_eq!(config.output.diff, Some(true));
        assert_eq!(config.output.output_on_fail, Some(true));
        Ok(())
    }

    #[test]
    fn unknown_fields_ignored() -> Result<()> {
        let toml = r#"
            [run]
            mode = "continuous"
            future-feature = true

            [unknown-section]
            foo = "bar"
        "#;

        let config: Config = toml::from_str(toml)?;
        assert_eq!(config.run.mode, Some(SuiteMode::Continuous));
        Ok(())
    }

    #[test]
    fn config_settings_sit_under_the_bench() {
        let config = Config {
            run: RunConfig {
                timeout: Some(3.0),
                ignore_empty_lines: Some(true),
                ..RunConfig::default()
            },
            output: OutputConfig {
                diff: Some(true),
                ..OutputConfig::default()
            },
        };
        let bench_options = SettingsDef {
            timeout: Some(1.0),
            ..SettingsDef::default()
        };

        let merged = bench_options.or(&config.to_bench_options());

        assert_eq!(merged.timeout, Some(1.0));
        assert_eq!(merged.ignore_empty_lines, Some(true));
        assert_eq!(merged.diff, Some(true));
    }

    #[test]
    fn color_merging() {
        let plain_args = CommandLineArgs::parse_from(["nightmare"]);
        let no_color_args = CommandLineArgs::parse_from(["nightmare", "--no-color"]);
        let colorless = Config {
            output: OutputConfig {
                color: Some(false),
                ..OutputConfig::default()
            },
            ..Config::default()
        };

        assert!(Config::default().use_color(&plain_args));
        assert!(!colorless.use_color(&plain_args));
        assert!(!Config::default().use_color(&no_color_args));
    }

    #[test]
    fn merge_bool_setting_priorities() {
        assert!(merge_bool_setting(true, false, Some(false)));
        assert!(merge_bool_setting(false, false, Some(true)));
        assert!(!merge_bool_setting(false, false, None));
        assert!(merge_bool_setting(true, true, None));
    }

    #[test]
    fn default_config_path_layout() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("nightmare/config.toml"));
        }
    }

    #[test]
    fn load_config_disabled() {
        let result = load_config(true, None);
        assert!(result.path.is_none());
        assert!(result.error.is_none());
        assert!(!result.explicit_path);
    }

    #[test]
    fn load_config_explicit_path() -> Result<()> {
        let temp_dir = assert_fs::TempDir::new()?;
        let file = temp_dir.child("config.toml");
        file.write_str("[output]\ncolor = false\n")?;

        let result = load_config(false, Some(file.path()));

        assert!(result.error.is_none());
        assert!(result.explicit_path);
        assert_eq!(result.config.output.color, Some(false));
        Ok(())
    }

    #[test]
    fn load_config_explicit_missing_path() {
        let result = load_config(false, Some(Path::new("/nonexistent/nightmare/config.toml")));

        assert!(matches!(result.error, Some(ConfigLoadError::Io(_))));
        assert!(result.explicit_path);
    }

    #[test]
    fn invalid_toml_falls_back_to_defaults() -> Result<()> {
        let temp_dir = assert_fs::TempDir::new()?;
        let file = temp_dir.child("config.toml");
        file.write_str("[run\nmode = ")?;

        let result = load_from_path(file.path());

        assert!(matches!(result.error, Some(ConfigLoadError::Parse(_))));
        assert_eq!(result.config, Config::default());
        Ok(())
    }
}
