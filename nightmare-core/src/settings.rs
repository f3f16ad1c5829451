//! Runtime settings of a test.

use crate::capture::{LineSeparator, Normalization};
use std::{path::PathBuf, time::Duration};

/// Runtime settings a test is executed with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestSettings {
    /// Upper bound on the DUT's run time; unbounded when `None`.
    pub timeout: Option<Duration>,
    /// Whether the DUT's output is forwarded live to the harness's streams.
    pub pipe: bool,
    /// Whether the DUT's captured output is forwarded when the test does not pass.
    pub output_on_fail: bool,
    /// Whether a unified diff is rendered for mismatching streams.
    pub diff: bool,
    /// Separator used to split captured output into lines.
    pub linesep: LineSeparator,
    /// Whether blank lines are dropped before comparison.
    pub ignore_empty_lines: bool,
    /// Maximum number of bytes captured per stream; unbounded when `None`.
    pub pipe_limit: Option<usize>,
    /// Base directory for relative DUT and reference file paths, also used
    /// as the DUT's working directory.
    pub working_dir: Option<PathBuf>,
}

impl TestSettings {
    /// Returns the normalization rules derived from these settings.
    pub const fn normalization(&self) -> Normalization {
        Normalization {
            linesep: self.linesep,
            ignore_empty_lines: self.ignore_empty_lines,
        }
    }
}

/// A partial set of settings pushed into every test of a suite.
///
/// Fields left as `None` keep each test's current value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingsOverride {
    /// Overrides [`TestSettings::timeout`].
    pub timeout: Option<Duration>,
    /// Overrides [`TestSettings::pipe`].
    pub pipe: Option<bool>,
    /// Overrides [`TestSettings::output_on_fail`].
    pub output_on_fail: Option<bool>,
    /// Overrides [`TestSettings::diff`].
    pub diff: Option<bool>,
    /// Overrides [`TestSettings::linesep`].
    pub linesep: Option<LineSeparator>,
    /// Overrides [`TestSettings::ignore_empty_lines`].
    pub ignore_empty_lines: Option<bool>,
    /// Overrides [`TestSettings::pipe_limit`].
    pub pipe_limit: Option<usize>,
    /// Overrides [`TestSettings::working_dir`].
    pub working_dir: Option<PathBuf>,
    /// Marks every test as info-only, so the suite is listed without running.
    pub info_only: bool,
}

impl SettingsOverride {
    /// Returns a copy of `settings` with every specified field replaced.
    pub fn apply_to(&self, settings: &TestSettings) -> TestSettings {
        TestSettings {
            timeout: self.timeout.or(settings.timeout),
            pipe: self.pipe.unwrap_or(settings.pipe),
            output_on_fail: self.output_on_fail.unwrap_or(settings.output_on_fail),
            diff: self.diff.unwrap_or(settings.diff),
            linesep: self.linesep.unwrap_or(settings.linesep),
            ignore_empty_lines: self.ignore_empty_lines.unwrap_or(settings.ignore_empty_lines),
            pipe_limit: self.pipe_limit.or(settings.pipe_limit),
            working_dir: self
                .working_dir
                .clone()
                .or_else(|| settings.working_dir.clone()),
        }
    }
}
