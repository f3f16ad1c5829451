//! Ordered collections of tests and their execution.

use crate::settings::SettingsOverride;
use crate::state::TestState;
use crate::testcase::Test;
use serde::{Deserialize, Serialize};
use std::{fmt, ops::Index, path::PathBuf};

/// Policy deciding whether a suite run stops after a test.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuiteMode {
    /// Stop after the first test that does not end in [`TestState::Success`].
    #[default]
    BreakOnFail,
    /// Stop after the first test that ends in [`TestState::Error`].
    BreakOnError,
    /// Run every selected test.
    Continuous,
}

impl SuiteMode {
    /// Returns whether a run in this mode stops after a test ending in `state`.
    ///
    /// Tests that were not executed never stop a run.
    pub const fn halts_after(self, state: TestState) -> bool {
        if matches!(state, TestState::Disabled | TestState::InfoOnly) {
            return false;
        }

        match self {
            Self::BreakOnFail => !matches!(state, TestState::Success),
            Self::BreakOnError => matches!(state, TestState::Error),
            Self::Continuous => false,
        }
    }
}

impl fmt::Display for SuiteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BreakOnFail => write!(f, "Break On Fail"),
            Self::BreakOnError => write!(f, "Break on Error"),
            Self::Continuous => write!(f, "Continuous"),
        }
    }
}

/// Running counts of a suite run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tallies {
    /// Tests ending in [`TestState::Success`] or [`TestState::Clean`].
    pub success: usize,
    /// Tests ending in [`TestState::Fail`].
    pub failed: usize,
    /// Tests ending in [`TestState::Error`].
    pub error: usize,
    /// Tests ending in [`TestState::Timeout`].
    pub timedout: usize,
    /// Tests ending in [`TestState::SegFault`].
    pub segfaults: usize,
    /// Tests ending in [`TestState::Assertion`].
    pub assertions: usize,
    /// Tests executed.
    pub count: usize,
    /// State of the most recently run test.
    pub last_result: TestState,
}

impl Tallies {
    /// Accounts for a test that ended in `state`.
    pub const fn record(&mut self, state: TestState) {
        self.last_result = state;

        match state {
            TestState::Success | TestState::Clean => self.success += 1,
            TestState::Fail => self.failed += 1,
            TestState::Error => self.error += 1,
            TestState::Timeout => self.timedout += 1,
            TestState::SegFault => self.segfaults += 1,
            TestState::Assertion => self.assertions += 1,
            TestState::Waiting | TestState::InfoOnly | TestState::Disabled => return,
        }

        self.count += 1;
    }

    /// Returns the share of executed tests that passed, as a percentage.
    #[expect(clippy::cast_precision_loss, reason = "counts stay far below 2^52")]
    pub fn rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.success as f64 / self.count as f64 * 100.0
        }
    }

    /// Returns the number of executed tests that did not pass.
    pub const fn unsuccessful(&self) -> usize {
        self.count - self.success
    }
}

/// Snapshot of a suite's statistics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SuiteStats {
    /// Counts of the last run.
    pub tallies: Tallies,
    /// Number of tests in the suite.
    pub total: usize,
    /// Share of executed tests that passed, as a percentage.
    pub rate: f64,
}

/// An ordered collection of tests sharing a DUT, settings, and a run mode.
#[derive(Clone, Debug, Default)]
pub struct TestSuite {
    tests: Vec<Test>,
    mode: SuiteMode,
    dut: Option<PathBuf>,
    tallies: Tallies,
}

impl TestSuite {
    /// Creates a suite holding the given tests.
    pub fn new(tests: impl IntoIterator<Item = Test>) -> Self {
        Self {
            tests: tests.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Sets the run mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: SuiteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the suite-wide DUT.
    #[must_use]
    pub fn with_dut(mut self, dut: Option<PathBuf>) -> Self {
        self.set_dut(dut);
        self
    }

    /// Appends a test, which inherits the suite's DUT.
    pub fn add_test(&mut self, mut test: Test) {
        test.set_inherited_dut(self.dut.clone());
        self.tests.push(test);
    }

    /// Removes and returns the test at `index`, if there is one.
    pub fn remove_test(&mut self, index: usize) -> Option<Test> {
        (index < self.tests.len()).then(|| self.tests.remove(index))
    }

    /// Returns the test at `index`.
    pub fn get(&self, index: usize) -> Option<&Test> {
        self.tests.get(index)
    }

    /// Returns the tests in declaration order.
    pub fn tests(&self) -> &[Test] {
        &self.tests
    }

    /// Returns the tests in declaration order, mutably.
    pub fn tests_mut(&mut self) -> &mut [Test] {
        &mut self.tests
    }

    /// Returns the number of tests.
    pub const fn len(&self) -> usize {
        self.tests.len()
    }

    /// Returns whether the suite holds no tests.
    pub const fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Iterates over the tests in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Test> {
        self.tests.iter()
    }

    /// Returns the run mode.
    pub const fn mode(&self) -> SuiteMode {
        self.mode
    }

    /// Sets the run mode.
    pub const fn set_mode(&mut self, mode: SuiteMode) {
        self.mode = mode;
    }

    /// Returns the suite-wide DUT.
    pub fn dut(&self) -> Option<&std::path::Path> {
        self.dut.as_deref()
    }

    /// Sets the suite-wide DUT and pushes it to every test.
    pub fn set_dut(&mut self, dut: Option<PathBuf>) {
        for test in &mut self.tests {
            test.set_inherited_dut(dut.clone());
        }
        self.dut = dut;
    }

    /// Pushes the given settings into every test.
    ///
    /// Each test receives its own copy; later changes to one test's settings
    /// do not affect the others.
    pub fn set_all(&mut self, overrides: &SettingsOverride) {
        for test in &mut self.tests {
            test.settings = overrides.apply_to(&test.settings);
            test.info_only = overrides.info_only;
        }
    }

    /// Starts a run over the selected tests.
    ///
    /// An empty `selection` runs every test in declaration order; otherwise
    /// the given indices are run in the given order, skipping those out of
    /// range. Tallies are reset immediately; tests are executed one at a
    /// time as the returned [`SuiteRun`] is advanced. With `quiet`, per-test
    /// result lines are logged at debug level instead of info.
    pub fn run(&mut self, quiet: bool, selection: &[usize]) -> SuiteRun<'_> {
        self.tallies = Tallies::default();

        let order: Vec<usize> = if selection.is_empty() {
            (0..self.tests.len()).collect()
        } else {
            selection
                .iter()
                .copied()
                .filter(|index| *index < self.tests.len())
                .collect()
        };

        tracing::debug!(
            "running {} of {} tests in mode '{}'",
            order.len(),
            self.tests.len(),
            self.mode
        );

        SuiteRun {
            suite: self,
            order: order.into_iter(),
            quiet,
            halted: false,
            handed_out: 0,
        }
    }

    /// Returns the tallies of the current or most recent run.
    pub const fn tallies(&self) -> &Tallies {
        &self.tallies
    }

    /// Returns the success rate of the current or most recent run.
    pub fn rate(&self) -> f64 {
        self.tallies.rate()
    }

    /// Returns a snapshot of the suite's statistics.
    pub fn stats(&self) -> SuiteStats {
        SuiteStats {
            tallies: self.tallies,
            total: self.tests.len(),
            rate: self.tallies.rate(),
        }
    }
}

impl Index<usize> for TestSuite {
    type Output = Test;

    fn index(&self, index: usize) -> &Self::Output {
        &self.tests[index]
    }
}

impl<'a> IntoIterator for &'a TestSuite {
    type Item = &'a Test;
    type IntoIter = std::slice::Iter<'a, Test>;

    fn into_iter(self) -> Self::IntoIter {
        self.tests.iter()
    }
}

/// A lazily advancing run over a suite's selected tests.
///
/// Each call to [`next_test`](Self::next_test) executes one test. Dropping
/// the run early leaves the tests completed so far with their results.
#[derive(Debug)]
pub struct SuiteRun<'a> {
    suite: &'a mut TestSuite,
    order: std::vec::IntoIter<usize>,
    quiet: bool,
    halted: bool,
    handed_out: usize,
}

impl SuiteRun<'_> {
    /// Runs the next selected test and returns it with its position in the
    /// run, or `None` once the selection is exhausted or the suite mode
    /// stopped the run.
    ///
    /// Positions count every test handed back, including disabled ones.
    pub async fn next_test(&mut self) -> Option<(usize, &Test)> {
        if self.halted {
            return None;
        }

        let index = self.order.next()?;
        let suite = &mut *self.suite;
        let test = suite.tests.get_mut(index)?;

        let state = test.run().await;
        let position = self.handed_out;
        self.handed_out += 1;
        suite.tallies.record(state);

        let line = match &test.descr {
            Some(descr) => format!("Test[{position:>3}] {} - {descr}: {state}", test.name),
            None => format!("Test[{position:>3}] {}: {state}", test.name),
        };
        if self.quiet {
            tracing::debug!(target: "results", "{line}");
        } else {
            tracing::info!(target: "results", "{line}");
        }

        if suite.mode.halts_after(state) {
            tracing::debug!("halting run after '{}' in mode '{}'", test.name, suite.mode);
            self.halted = true;
        }

        Some((position, test))
    }

    /// Drives the run to its end, handing every completed test and its
    /// position to `on_test`.
    pub async fn run_to_end<F>(mut self, mut on_test: F) -> Tallies
    where
        F: FnMut(usize, &Test),
    {
        while let Some((position, test)) = self.next_test().await {
            on_test(position, test);
        }

        self.suite.tallies
    }

    /// Returns the tallies accumulated so far.
    pub const fn tallies(&self) -> &Tallies {
        &self.suite.tallies
    }
}
