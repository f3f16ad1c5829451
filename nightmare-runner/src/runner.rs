//! Loading, configuring, and running a suite as requested on the command line.

use anyhow::{Context, Result};
use nightmare_bench::{
    DslFrontEnd, SettingsDef, Testbench, load_dsl, parse_timeout, save_suite,
};
use nightmare_core::{SettingsOverride, SuiteMode, Tallies, TestSuite};
use std::path::{Path, PathBuf};

use crate::{
    args::CommandLineArgs,
    config::Config,
    reporting::{ReportOptions, Reporter},
};

/// Exit code of a run in which every executed test passed.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code of a run in which some executed test did not pass.
pub const EXIT_TEST_FAILURE: u8 = 1;
/// Exit code when the suite could not be loaded or configured.
pub const EXIT_LOAD_FAILURE: u8 = 2;

/// Drives one invocation of the runner.
pub struct TestRunner {
    args: CommandLineArgs,
    config: Config,
    front_end: Option<Box<dyn DslFrontEnd>>,
}

impl TestRunner {
    /// Creates a runner for the given arguments and configuration.
    pub fn new(args: CommandLineArgs, config: Config) -> Self {
        Self {
            args,
            config,
            front_end: None,
        }
    }

    /// Registers the front-end used with `--arnold`.
    #[must_use]
    pub fn with_front_end(mut self, front_end: Box<dyn DslFrontEnd>) -> Self {
        self.front_end = Some(front_end);
        self
    }

    /// Runs the requested action and returns the exit code.
    ///
    /// Errors are load or configuration failures; test outcomes are only
    /// reflected in the exit code.
    pub async fn run(&self) -> Result<u8> {
        let mut reporter = Reporter::stdout(ReportOptions {
            quiet: self.args.quiet,
            commands: self.args.commands,
        });

        if self.args.length {
            reporter.write_count(self.load_suite()?.len())?;
            return Ok(EXIT_SUCCESS);
        }

        if let Some(path) = &self.args.save {
            let suite = self.load_suite_as_written()?;
            save_suite(&suite, &self.args.suite, path)
                .with_context(|| format!("failed to save suite to {}", path.display()))?;
            return Ok(EXIT_SUCCESS);
        }

        let mut suite = self.load_suite()?;
        reporter.write_banner()?;
        self.log_setup(&suite);

        let mut run = suite.run(self.args.quiet, &self.args.tests);
        while let Some((position, test)) = run.next_test().await {
            reporter.write_test(position, test)?;
        }

        let stats = suite.stats();
        if !self.args.info_only {
            reporter.write_stats(&stats)?;
        }

        Ok(exit_code(&stats.tallies))
    }

    /// Loads the requested suite and applies every command-line and
    /// configuration setting to it.
    pub fn load_suite(&self) -> Result<TestSuite> {
        let bench_path = self.bench_path()?;
        let (mut suite, bench_mode) =
            self.read_suite(bench_path, &self.config.to_bench_options())?;

        if let Some(dut) = &self.args.dut {
            suite.set_dut(Some(dut.clone()));
        }

        suite.set_mode(
            self.args
                .requested_mode()
                .or(bench_mode)
                .or(self.config.run.mode)
                .unwrap_or_default(),
        );
        suite.set_all(&self.settings_override(bench_path)?);

        tracing::info!(
            "I have loaded {} Testcase{}",
            suite.len(),
            if suite.len() == 1 { "" } else { "s" }
        );

        Ok(suite)
    }

    /// Loads the requested suite as its source defines it, without
    /// configuration file or command-line settings applied.
    pub fn load_suite_as_written(&self) -> Result<TestSuite> {
        let (mut suite, bench_mode) =
            self.read_suite(self.bench_path()?, &SettingsDef::default())?;
        suite.set_mode(bench_mode.unwrap_or_default());

        Ok(suite)
    }

    fn bench_path(&self) -> Result<&Path> {
        self.args
            .bench
            .as_deref()
            .context("no testbench given; pass one with --bench FILE")
    }

    fn read_suite(
        &self,
        bench_path: &Path,
        base_options: &SettingsDef,
    ) -> Result<(TestSuite, Option<SuiteMode>)> {
        match self.dsl_front_end(bench_path) {
            Some(front_end) => {
                let suite = load_dsl(front_end, bench_path, base_options).with_context(|| {
                    format!("failed to load the requested suite from {}", bench_path.display())
                })?;
                Ok((suite, None))
            }
            None => {
                let mut bench = Testbench::load(bench_path).with_context(|| {
                    format!("failed to load testbench {}", bench_path.display())
                })?;
                bench.options = bench.options.or(base_options);

                let suite = bench.build_suite(&self.args.suite).with_context(|| {
                    format!("failed to load the requested suite '{}'", self.args.suite)
                })?;
                Ok((suite, bench.mode))
            }
        }
    }

    fn dsl_front_end(&self, bench_path: &Path) -> Option<&dyn DslFrontEnd> {
        if !self.args.arnold {
            return None;
        }

        match &self.front_end {
            Some(front_end) => {
                tracing::debug!(
                    "reading {} with the {} front-end",
                    bench_path.display(),
                    front_end.name()
                );
                Some(front_end.as_ref())
            }
            None => {
                tracing::warn!(
                    "DSL mode unavailable: no front-end is built in; reading {} as a testbench",
                    bench_path.display()
                );
                None
            }
        }
    }

    fn settings_override(&self, bench_path: &Path) -> Result<SettingsOverride> {
        let timeout = self
            .args
            .timeout
            .map(parse_timeout)
            .transpose()
            .context("invalid --timeout")?;

        let working_dir = if self.args.relative {
            Some(bench_dir(bench_path)?)
        } else {
            None
        };

        Ok(SettingsOverride {
            timeout,
            pipe: self.args.pipe_streams.then_some(true),
            output_on_fail: self.args.output_fails.then_some(true),
            diff: self.args.unify_fails.then_some(true),
            linesep: self.args.line_separator(),
            ignore_empty_lines: self.args.ignore_empty_lines.then_some(true),
            pipe_limit: self.args.pipe_limit(),
            working_dir,
            info_only: self.args.info_only,
        })
    }

    fn log_setup(&self, suite: &TestSuite) {
        match suite.mode() {
            SuiteMode::BreakOnFail => tracing::info!("I will halt on first fail."),
            SuiteMode::BreakOnError => tracing::info!(
                "I'm running in continuous mode now, but will halt if an error occurs"
            ),
            SuiteMode::Continuous => tracing::info!("I'm running in continuous mode now"),
        }

        tracing::info!("I'm using the testsuite '{}'", self.args.suite);
        if let Some(dut) = suite.dut() {
            tracing::info!("Device under Test is: {}", dut.display());
        }
        if let Some(timeout) = self.args.timeout {
            tracing::info!("Setting global timeout to {timeout}s");
        }
        if !self.args.tests.is_empty() {
            tracing::info!("I'm only running tests {:?}", self.args.tests);
        }
        if self.args.commands {
            tracing::info!("I will print every command I'll execute.");
        }
    }
}

fn bench_dir(bench_path: &Path) -> Result<PathBuf> {
    let absolute = std::fs::canonicalize(bench_path)
        .with_context(|| format!("failed to resolve {}", bench_path.display()))?;

    Ok(absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or(absolute))
}

const fn exit_code(tallies: &Tallies) -> u8 {
    if tallies.unsuccessful() == 0 {
        EXIT_SUCCESS
    } else {
        EXIT_TEST_FAILURE
    }
}
