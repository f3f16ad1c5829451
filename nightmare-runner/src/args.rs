//! Command-line arguments of the runner.

use clap::{Parser, builder::styling};
use nightmare_bench::DEFAULT_SUITE_NAME;
use nightmare_core::{LineSeparator, SuiteMode};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

use crate::events;

const SHORT_DESCRIPTION: &str = "Black-box test harness for command-line programs";

const LONG_DESCRIPTION: &str = r"
nightmare runs a suite of shell commands against a device under test (DUT),
checks their exit codes and output against declared expectations, and reports
how each test ended.

Suites are read from YAML testbench files.
";

/// Default soft limit, in bytes, for piped output.
pub const DEFAULT_PIPE_LIMIT: usize = 2000;

/// Parsed command-line arguments for the nightmare runner.
#[derive(Debug, Parser)]
#[clap(name = "nightmare",
       version,
       about = SHORT_DESCRIPTION,
       long_about = LONG_DESCRIPTION,
       styles = nightmare_help_styles())]
pub struct CommandLineArgs {
    /// Testbench file to load the suite from.
    #[clap(long = "bench", value_name = "FILE", help_heading = "Test selection")]
    pub bench: Option<PathBuf>,

    /// Name of the suite to run.
    #[clap(
        long = "suite",
        value_name = "NAME",
        default_value = DEFAULT_SUITE_NAME,
        help_heading = "Test selection",
    )]
    pub suite: String,

    /// Device under test; replaces the testbench's DUT.
    #[clap(long = "dut", alias = "DUT", value_name = "PATH", help_heading = "Test selection")]
    pub dut: Option<PathBuf>,

    /// Only run the tests at the given positions.
    #[clap(long = "test", value_name = "N", num_args = 1.., help_heading = "Test selection")]
    pub tests: Vec<usize>,

    /// Timeout in seconds for every test.
    #[clap(long = "timeout", value_name = "SECS", help_heading = "Test selection")]
    pub timeout: Option<f64>,

    /// Read the testbench through the DSL front-end.
    #[clap(short = 'a', long = "arnold", help_heading = "Test selection")]
    pub arnold: bool,

    /// Save the loaded suite to the given file instead of running it.
    #[clap(long = "save", value_name = "FILE", help_heading = "Test selection")]
    pub save: Option<PathBuf>,

    /// Soft limit in bytes after which piped output is no longer captured.
    #[clap(
        long = "limit",
        value_name = "BYTES",
        default_value_t = DEFAULT_PIPE_LIMIT,
        help_heading = "Output",
    )]
    pub limit: usize,

    /// Only report the final statistics.
    #[clap(short = 'q', long = "quiet", overrides_with = "verbose", help_heading = "Output")]
    pub quiet: bool,

    /// Report every test (default).
    #[clap(short = 'v', long = "verbose", overrides_with = "quiet", help_heading = "Output")]
    pub verbose: bool,

    /// Print the command of every test.
    #[clap(short = 'C', long = "commands", help_heading = "Output")]
    pub commands: bool,

    /// Print the number of tests in the suite and exit.
    #[clap(short = 'l', long = "length", help_heading = "Output")]
    pub length: bool,

    /// List the tests without running them.
    #[clap(short = 'i', long = "info-only", help_heading = "Output")]
    pub info_only: bool,

    /// Forward the output of every test as it is produced.
    #[clap(short = 'p', long = "pipe-streams", help_heading = "Output")]
    pub pipe_streams: bool,

    /// Echo the output of tests that do not pass.
    #[clap(short = 'o', long = "output-fails", help_heading = "Output")]
    pub output_fails: bool,

    /// Show a unified diff for mismatching output.
    #[clap(short = 'u', long = "unify-fails", help_heading = "Output")]
    pub unify_fails: bool,

    /// Disable colors in the report.
    #[clap(long = "no-color", help_heading = "Output")]
    pub no_color: bool,

    /// Keep running after a test fails.
    #[clap(short = 'c', long = "continue", help_heading = "Test flow")]
    pub continuous: bool,

    /// Stop only once a test ends in an error.
    #[clap(short = 'e', long = "error", help_heading = "Test flow")]
    pub break_on_error: bool,

    /// Drop blank lines before comparing output.
    #[clap(
        short = 'L',
        long = "ignore-empty-lines",
        alias = "ignoreEmptyLines",
        help_heading = "Test flow",
    )]
    pub ignore_empty_lines: bool,

    /// Run tests from the directory containing the testbench.
    #[clap(short = 'r', long = "relative", help_heading = "Test flow")]
    pub relative: bool,

    /// The DUT separates lines with a carriage return.
    #[clap(long = "cr", conflicts_with_all = ["ln", "crln"], help_heading = "Test flow")]
    pub cr: bool,

    /// The DUT separates lines with a line feed.
    #[clap(long = "ln", conflicts_with_all = ["cr", "crln"], help_heading = "Test flow")]
    pub ln: bool,

    /// The DUT separates lines with a carriage return and a line feed.
    #[clap(long = "crln", conflicts_with_all = ["cr", "ln"], help_heading = "Test flow")]
    pub crln: bool,

    /// Path to a configuration file.
    #[clap(
        long = "config",
        env = "NIGHTMARE_CONFIG",
        value_name = "FILE",
        help_heading = "Configuration",
    )]
    pub config_file: Option<PathBuf>,

    /// Skip loading any configuration file.
    #[clap(long = "no-config", help_heading = "Configuration")]
    pub no_config: bool,

    /// Level of diagnostic messages written to stderr.
    #[clap(long = "log-level", value_name = "LEVEL", help_heading = "Configuration")]
    pub log_level: Option<LevelFilter>,

    /// Enable diagnostic events.
    #[clap(long = "log-enable", value_name = "EVENT", help_heading = "Configuration")]
    pub enabled_log_events: Vec<events::TraceEvent>,
}

impl CommandLineArgs {
    /// Returns the run mode selected on the command line, if any.
    pub const fn requested_mode(&self) -> Option<SuiteMode> {
        if self.break_on_error {
            Some(SuiteMode::BreakOnError)
        } else if self.continuous {
            Some(SuiteMode::Continuous)
        } else {
            None
        }
    }

    /// Returns the line separator selected on the command line, if any.
    pub const fn line_separator(&self) -> Option<LineSeparator> {
        if self.cr {
            Some(LineSeparator::Cr)
        } else if self.ln {
            Some(LineSeparator::Lf)
        } else if self.crln {
            Some(LineSeparator::CrLf)
        } else {
            None
        }
    }

    /// Returns the capture limit selected on the command line, if any.
    ///
    /// The limit only applies while output is piped.
    pub const fn pipe_limit(&self) -> Option<usize> {
        if self.pipe_streams {
            Some(self.limit)
        } else {
            None
        }
    }
}

fn nightmare_help_styles() -> clap::builder::Styles {
    styling::Styles::styled()
        .header(
            styling::AnsiColor::Yellow.on_default()
                | styling::Effects::BOLD
                | styling::Effects::UNDERLINE,
        )
        .usage(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .literal(styling::AnsiColor::Magenta.on_default() | styling::Effects::BOLD)
        .placeholder(styling::AnsiColor::Cyan.on_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_definition_is_consistent() {
        CommandLineArgs::command().debug_assert();
    }

    #[test]
    fn defaults() -> Result<()> {
        let args = CommandLineArgs::try_parse_from(["nightmare", "--no-config"])?;

        assert_eq!(args.suite, DEFAULT_SUITE_NAME);
        assert_eq!(args.limit, DEFAULT_PIPE_LIMIT);
        assert_eq!(args.requested_mode(), None);
        assert_eq!(args.line_separator(), None);
        assert_eq!(args.pipe_limit(), None);
        assert!(args.tests.is_empty());
        Ok(())
    }

    #[test]
    fn selection_and_flow_flags() -> Result<()> {
        let args = CommandLineArgs::try_parse_from([
            "nightmare", "--bench", "bench.yaml", "--test", "0", "2", "--timeout", "1.5", "-c",
            "-p", "--limit", "64", "--crln",
        ])?;

        assert_eq!(args.bench, Some(PathBuf::from("bench.yaml")));
        assert_eq!(args.tests, [0, 2]);
        assert_eq!(args.timeout, Some(1.5));
        assert_eq!(args.requested_mode(), Some(SuiteMode::Continuous));
        assert_eq!(args.pipe_limit(), Some(64));
        assert_eq!(args.line_separator(), Some(LineSeparator::CrLf));
        Ok(())
    }

    #[test]
    fn error_mode_wins_over_continuous() -> Result<()> {
        let args = CommandLineArgs::try_parse_from(["nightmare", "-c", "-e"])?;
        assert_eq!(args.requested_mode(), Some(SuiteMode::BreakOnError));
        Ok(())
    }

    #[test]
    fn line_separators_conflict() {
        assert!(CommandLineArgs::try_parse_from(["nightmare", "--cr", "--ln"]).is_err());
    }

    #[test]
    fn last_of_quiet_and_verbose_wins() -> Result<()> {
        let args = CommandLineArgs::try_parse_from(["nightmare", "-q", "-v"])?;
        assert!(!args.quiet);
        assert!(args.verbose);

        let args = CommandLineArgs::try_parse_from(["nightmare", "-v", "-q"])?;
        assert!(args.quiet);
        Ok(())
    }

    #[test]
    fn log_options() -> Result<()> {
        let args = CommandLineArgs::try_parse_from([
            "nightmare", "--log-level", "debug", "--log-enable", "commands",
        ])?;

        assert_eq!(args.log_level, Some(LevelFilter::DEBUG));
        assert_eq!(args.enabled_log_events, [events::TraceEvent::Commands]);
        Ok(())
    }
}
