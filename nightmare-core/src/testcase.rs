//! A single test case and its run contract.

use crate::error::Error;
use crate::execution::{self, Termination};
use crate::expectation::{
    ExitCodeExpectation, Expectation, ExpectationComparison, resolve_path,
};
use crate::settings::TestSettings;
use crate::state::TestState;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Placeholder in a command template that is replaced with the DUT path.
pub const DUT_PLACEHOLDER: &str = "{DUT}";

/// A single test case: a command run against the DUT, the expectations its
/// outcome is checked against, and the results of its last run.
#[derive(Clone, Debug, Default)]
pub struct Test {
    /// Name of the test.
    pub name: String,
    /// Optional description.
    pub descr: Option<String>,
    /// Command template; [`DUT_PLACEHOLDER`] is replaced with the DUT path.
    pub cmd: String,
    /// DUT used by this test, overriding the one inherited from its suite.
    pub dut: Option<PathBuf>,
    /// Expected stdout; not checked when absent.
    pub expect_stdout: Option<Expectation>,
    /// Expected stderr; not checked when absent.
    pub expect_stderr: Option<Expectation>,
    /// Expected return code; not checked when absent.
    pub expect_ret_code: Option<ExitCodeExpectation>,
    /// Whether the test is skipped.
    pub disabled: bool,
    /// Whether the test is only listed instead of executed.
    pub info_only: bool,
    /// Runtime settings.
    pub settings: TestSettings,

    inherited_dut: Option<PathBuf>,

    state: TestState,
    output: String,
    error: String,
    ret_code: Option<i32>,
    termination: Option<Termination>,
    duration: Option<Duration>,
    comparison: ExpectationComparison,
    diff: Option<String>,
    error_detail: Option<String>,
    truncated: bool,
}

impl Test {
    /// Creates a test running `cmd`, with no expectations.
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_descr(mut self, descr: impl Into<String>) -> Self {
        self.descr = Some(descr.into());
        self
    }

    /// Sets the DUT used by this test.
    #[must_use]
    pub fn with_dut(mut self, dut: impl Into<PathBuf>) -> Self {
        self.dut = Some(dut.into());
        self
    }

    /// Sets the stdout expectation.
    #[must_use]
    pub fn with_stdout(mut self, expectation: impl Into<Expectation>) -> Self {
        self.expect_stdout = Some(expectation.into());
        self
    }

    /// Sets the stderr expectation.
    #[must_use]
    pub fn with_stderr(mut self, expectation: impl Into<Expectation>) -> Self {
        self.expect_stderr = Some(expectation.into());
        self
    }

    /// Sets the return code expectation.
    #[must_use]
    pub fn with_ret_code(mut self, expectation: impl Into<ExitCodeExpectation>) -> Self {
        self.expect_ret_code = Some(expectation.into());
        self
    }

    /// Marks the test as disabled.
    #[must_use]
    pub const fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Replaces the runtime settings.
    #[must_use]
    pub fn with_settings(mut self, settings: TestSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the DUT inherited from the enclosing suite.
    pub fn set_inherited_dut(&mut self, dut: Option<PathBuf>) {
        self.inherited_dut = dut;
    }

    /// Returns the DUT this test runs against: its own, or else the inherited one.
    pub fn effective_dut(&self) -> Option<&Path> {
        self.dut.as_deref().or(self.inherited_dut.as_deref())
    }

    /// Returns the command with the DUT placeholder substituted.
    ///
    /// DUT paths made of more than one component are resolved against the
    /// working directory and must exist; bare program names are left to the
    /// shell's lookup.
    pub fn resolved_command(&self) -> Result<String, Error> {
        if !self.cmd.contains(DUT_PLACEHOLDER) {
            return Ok(self.cmd.clone());
        }

        let dut = self.effective_dut().ok_or(Error::NoDutConfigured)?;
        let dut = if dut.components().count() > 1 {
            let resolved = resolve_path(self.settings.working_dir.as_deref(), dut);
            if !resolved.exists() {
                return Err(Error::DutNotFound(resolved));
            }
            resolved
        } else {
            dut.to_path_buf()
        };

        Ok(self.cmd.replace(DUT_PLACEHOLDER, &dut.to_string_lossy()))
    }

    /// Returns the state of the last run.
    pub const fn state(&self) -> TestState {
        self.state
    }

    /// Returns the normalized stdout of the last run.
    pub const fn output(&self) -> &str {
        self.output.as_str()
    }

    /// Returns the normalized stderr of the last run.
    pub const fn error(&self) -> &str {
        self.error.as_str()
    }

    /// Returns the return code observed in the last run; signal terminations
    /// are reported as the negated signal number.
    pub const fn ret_code(&self) -> Option<i32> {
        self.ret_code
    }

    /// Returns how the DUT invocation of the last run ended.
    pub const fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Returns how long the DUT invocation of the last run took.
    pub const fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Returns the per-stream comparison outcomes of the last run.
    pub const fn comparison(&self) -> &ExpectationComparison {
        &self.comparison
    }

    /// Returns the rendered diff of the last run, if one was requested and
    /// the test failed.
    pub fn diff(&self) -> Option<&str> {
        self.diff.as_deref()
    }

    /// Returns the reason the last run ended in [`TestState::Error`].
    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    /// Returns whether any stream was cut off by the pipe limit.
    pub const fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Clears the results of the previous run.
    pub fn reset(&mut self) {
        self.state = TestState::Waiting;
        self.output.clear();
        self.error.clear();
        self.ret_code = None;
        self.termination = None;
        self.duration = None;
        self.comparison = ExpectationComparison::default();
        self.diff = None;
        self.error_detail = None;
        self.truncated = false;
    }

    /// Runs the test and returns its new state.
    ///
    /// Disabled tests are left untouched, info-only tests are not executed.
    /// Every condition keeping the harness from finishing the comparison is
    /// reported as [`TestState::Error`] rather than returned.
    pub async fn run(&mut self) -> TestState {
        if self.disabled {
            self.state = TestState::Disabled;
            return self.state;
        }

        self.reset();

        if self.info_only {
            self.state = TestState::InfoOnly;
            return self.state;
        }

        self.state = match self.execute().await {
            Ok(state) => state,
            Err(e) => {
                tracing::debug!("test '{}' could not be completed: {e}", self.name);
                self.error_detail = Some(e.to_string());
                TestState::Error
            }
        };

        if self.settings.output_on_fail && !self.settings.pipe && !self.state.is_passing() {
            execution::echo_output(
                with_newline(&self.output).as_bytes(),
                with_newline(&self.error).as_bytes(),
            )
            .await;
        }

        self.state
    }

    async fn execute(&mut self) -> Result<TestState, Error> {
        let command = self.resolved_command()?;
        let result = execution::run_command(&command, &self.settings).await?;

        let rules = self.settings.normalization();
        self.output = rules.apply(&result.stdout.to_string_lossy());
        self.error = rules.apply(&result.stderr.to_string_lossy());
        self.ret_code = result.termination.ret_code();
        self.termination = Some(result.termination);
        self.duration = Some(result.duration);
        self.truncated = result.stdout.is_truncated() || result.stderr.is_truncated();

        let fatal_signal = match result.termination {
            Termination::TimedOut => return Ok(TestState::Timeout),
            Termination::Signaled(signal) => Some(signal),
            Termination::Exited(code) => signal_reported_by_shell(code),
        };
        if let Some(state) = fatal_signal.and_then(classify_signal) {
            return Ok(state);
        }

        if result.termination != Termination::Exited(0)
            && (has_assertion_signature(&self.error) || has_assertion_signature(&self.output))
        {
            return Ok(TestState::Assertion);
        }

        let base_dir = self.settings.working_dir.as_deref();
        let mut comparison = ExpectationComparison::default();

        if let (Some(expected), Some(actual)) = (&self.expect_ret_code, self.ret_code) {
            comparison.ret_code = expected.check(actual)?;
        }
        if let Some(expected) = &self.expect_stdout {
            comparison.stdout = expected.check(&self.output, &rules, base_dir)?;
        }
        if let Some(expected) = &self.expect_stderr {
            comparison.stderr = expected.check(&self.error, &rules, base_dir)?;
        }

        let state = if !comparison.has_any_checks() {
            TestState::Clean
        } else if comparison.is_failure() {
            TestState::Fail
        } else {
            TestState::Success
        };

        if state == TestState::Fail && self.settings.diff {
            self.diff = comparison.render_diffs();
        }
        self.comparison = comparison;

        Ok(state)
    }
}

#[cfg(unix)]
fn classify_signal(signal: i32) -> Option<TestState> {
    use nix::sys::signal::Signal;

    match Signal::try_from(signal) {
        Ok(Signal::SIGSEGV | Signal::SIGBUS) => Some(TestState::SegFault),
        Ok(Signal::SIGABRT) => Some(TestState::Assertion),
        _ => None,
    }
}

#[cfg(not(unix))]
const fn classify_signal(_signal: i32) -> Option<TestState> {
    None
}

/// Decodes the `128 + signo` exit status a shell reports for a pipeline
/// member or non-exec'd command that was killed by a signal.
fn signal_reported_by_shell(code: i32) -> Option<i32> {
    code.checked_sub(128).filter(|signal| (1..128).contains(signal))
}

/// Recognizes the messages printed by C's `assert` and by Rust's assertion panics.
fn has_assertion_signature(text: &str) -> bool {
    text.lines().any(|line| {
        (line.contains("Assertion") && line.contains("failed"))
            || line.contains("assertion failed")
            || (line.contains("assertion `") && line.contains("failed"))
    })
}

fn with_newline(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("{text}\n")
    }
}
