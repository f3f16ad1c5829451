//! Persisted form of tests.

use crate::error::Error;
use nightmare_core::{
    ExitCodeExpectation, ExitCodePredicate, Expectation, LineSeparator, SettingsOverride, Test,
    TestSettings, TextPredicate,
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Runtime settings as written in a testbench.
///
/// Used both for the suite-wide `options` block and for the settings given
/// directly on a test; absent fields keep their defaults.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct SettingsDef {
    /// Timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,

    /// Whether output is forwarded live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipe: Option<bool>,

    /// Whether output is forwarded when the test does not pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_on_fail: Option<bool>,

    /// Whether diffs are rendered for mismatching streams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<bool>,

    /// Whether blank lines are dropped before comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_empty_lines: Option<bool>,

    /// Maximum number of captured bytes per stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipe_limit: Option<usize>,

    /// Line separator of the DUT's output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linesep: Option<LineSeparator>,
}

impl SettingsDef {
    /// Returns these settings with unset fields taken from `base`.
    #[must_use]
    pub fn or(&self, base: &Self) -> Self {
        Self {
            timeout: self.timeout.or(base.timeout),
            pipe: self.pipe.or(base.pipe),
            output_on_fail: self.output_on_fail.or(base.output_on_fail),
            diff: self.diff.or(base.diff),
            ignore_empty_lines: self.ignore_empty_lines.or(base.ignore_empty_lines),
            pipe_limit: self.pipe_limit.or(base.pipe_limit),
            linesep: self.linesep.or(base.linesep),
        }
    }

    /// Converts these settings into an override of a test's settings.
    pub fn to_override(&self) -> Result<SettingsOverride, Error> {
        let timeout = self.timeout.map(parse_timeout).transpose()?;

        Ok(SettingsOverride {
            timeout,
            pipe: self.pipe,
            output_on_fail: self.output_on_fail,
            diff: self.diff,
            linesep: self.linesep,
            ignore_empty_lines: self.ignore_empty_lines,
            pipe_limit: self.pipe_limit,
            ..SettingsOverride::default()
        })
    }

    /// Captures the fields of `settings` that differ from the defaults.
    pub fn from_settings(settings: &TestSettings) -> Self {
        let defaults = TestSettings::default();
        let changed = |flag: bool, default: bool| (flag != default).then_some(flag);

        Self {
            timeout: settings.timeout.map(|timeout| timeout.as_secs_f64()),
            pipe: changed(settings.pipe, defaults.pipe),
            output_on_fail: changed(settings.output_on_fail, defaults.output_on_fail),
            diff: changed(settings.diff, defaults.diff),
            ignore_empty_lines: changed(settings.ignore_empty_lines, defaults.ignore_empty_lines),
            pipe_limit: settings.pipe_limit,
            linesep: (settings.linesep != defaults.linesep).then_some(settings.linesep),
        }
    }
}

/// Parses a timeout given in seconds.
pub fn parse_timeout(seconds: f64) -> Result<Duration, Error> {
    Duration::try_from_secs_f64(seconds).map_err(|_| Error::InvalidTimeout(seconds))
}

/// A stream expectation as written in a testbench.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ExpectationDef {
    /// Literal text.
    Text(String),
    /// Literal integer, compared as text.
    Integer(i64),
    /// Literal floating-point number, compared as text.
    Float(f64),
    /// Literal boolean, compared as text.
    Boolean(bool),
    /// Content of a reference file.
    File {
        /// Path of the reference file.
        file: PathBuf,
    },
    /// A built-in predicate.
    Predicate(TextPredicate),
}

impl ExpectationDef {
    /// Converts into the expectation checked at run time.
    pub fn to_expectation(&self) -> Expectation {
        match self {
            Self::Text(text) => Expectation::Literal(text.clone()),
            Self::Integer(number) => Expectation::Literal(number.to_string()),
            Self::Float(number) => Expectation::Literal(number.to_string()),
            Self::Boolean(flag) => Expectation::Literal(flag.to_string()),
            Self::File { file } => Expectation::File(file.clone()),
            Self::Predicate(predicate) => Expectation::Predicate(predicate.clone()),
        }
    }

    /// Converts an expectation back into its persisted form.
    pub fn from_expectation(test_name: &str, expectation: &Expectation) -> Result<Self, Error> {
        match expectation {
            Expectation::Literal(text) => Ok(Self::Text(text.clone())),
            Expectation::File(file) => Ok(Self::File { file: file.clone() }),
            Expectation::Predicate(TextPredicate::Custom(predicate)) => Err(
                Error::UnsavablePredicate(test_name.to_owned(), predicate.name().to_owned()),
            ),
            Expectation::Predicate(predicate) => Ok(Self::Predicate(predicate.clone())),
        }
    }
}

/// A return code expectation as written in a testbench.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ExitCodeDef {
    /// Exact return code.
    Code(i32),
    /// A built-in predicate.
    Predicate(ExitCodePredicate),
}

impl ExitCodeDef {
    /// Converts into the expectation checked at run time.
    pub fn to_expectation(&self) -> ExitCodeExpectation {
        match self {
            Self::Code(code) => ExitCodeExpectation::Literal(*code),
            Self::Predicate(predicate) => ExitCodeExpectation::Predicate(predicate.clone()),
        }
    }

    /// Converts an expectation back into its persisted form.
    pub fn from_expectation(
        test_name: &str,
        expectation: &ExitCodeExpectation,
    ) -> Result<Self, Error> {
        match expectation {
            ExitCodeExpectation::Literal(code) => Ok(Self::Code(*code)),
            ExitCodeExpectation::Predicate(ExitCodePredicate::Custom(predicate)) => Err(
                Error::UnsavablePredicate(test_name.to_owned(), predicate.name().to_owned()),
            ),
            ExitCodeExpectation::Predicate(predicate) => Ok(Self::Predicate(predicate.clone())),
        }
    }
}

/// A single test as written in a testbench.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct TestDefinition {
    /// Name of the test.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descr: Option<String>,

    /// Command template.
    pub cmd: String,

    /// DUT overriding the suite's.
    #[serde(
        rename = "DUT",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub dut: Option<PathBuf>,

    /// Expected stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<ExpectationDef>,

    /// Expected stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<ExpectationDef>,

    /// Expected return code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retcode: Option<ExitCodeDef>,

    /// Whether the test is skipped.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,

    /// Settings given directly on the test.
    #[serde(flatten)]
    pub settings: SettingsDef,
}

impl TestDefinition {
    /// Builds a test from this definition; settings not given on the test
    /// are taken from `options`.
    pub fn to_test(&self, options: &SettingsDef) -> Result<Test, Error> {
        let overrides = self.settings.or(options).to_override()?;

        let mut test = Test::new(self.name.clone(), self.cmd.clone())
            .with_disabled(self.disabled)
            .with_settings(overrides.apply_to(&TestSettings::default()));
        test.descr.clone_from(&self.descr);
        test.dut.clone_from(&self.dut);
        test.expect_stdout = self.stdout.as_ref().map(ExpectationDef::to_expectation);
        test.expect_stderr = self.stderr.as_ref().map(ExpectationDef::to_expectation);
        test.expect_ret_code = self.retcode.as_ref().map(ExitCodeDef::to_expectation);

        Ok(test)
    }

    /// Captures the definition of `test`.
    pub fn from_test(test: &Test) -> Result<Self, Error> {
        let stdout = test
            .expect_stdout
            .as_ref()
            .map(|e| ExpectationDef::from_expectation(&test.name, e))
            .transpose()?;
        let stderr = test
            .expect_stderr
            .as_ref()
            .map(|e| ExpectationDef::from_expectation(&test.name, e))
            .transpose()?;
        let retcode = test
            .expect_ret_code
            .as_ref()
            .map(|e| ExitCodeDef::from_expectation(&test.name, e))
            .transpose()?;

        Ok(Self {
            name: test.name.clone(),
            descr: test.descr.clone(),
            cmd: test.cmd.clone(),
            dut: test.dut.clone(),
            stdout,
            stderr,
            retcode,
            disabled: test.disabled,
            settings: SettingsDef::from_settings(&test.settings),
        })
    }

    /// Renders the definition as a single-line flow mapping.
    pub fn to_line(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::SerializeFailed(self.name.clone(), e))
    }
}
