//! Reporting of suite runs.

use anyhow::Result;
use colored::{Color, ColoredString, Colorize};
use nightmare_core::{StreamComparison, SuiteStats, Termination, Test, TestState};
use std::io::Write;

const BANNER: &str =
    "NIGHTMARE Is of Generous Help when Testing; May Arnold be Remembered Eternally";

/// Runs with fewer executed tests than this get no closing remarks.
const REMARK_THRESHOLD: usize = 3;

/// Options controlling what the reporter writes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReportOptions {
    /// Only write the final statistics.
    pub quiet: bool,
    /// Write the command of every test.
    pub commands: bool,
}

/// Writes the human-readable report of a run.
#[derive(Debug)]
pub struct Reporter<W> {
    writer: W,
    options: ReportOptions,
}

impl Reporter<std::io::Stdout> {
    /// Creates a reporter writing to stdout.
    pub fn stdout(options: ReportOptions) -> Self {
        Self::new(std::io::stdout(), options)
    }
}

impl<W: Write> Reporter<W> {
    /// Creates a reporter writing to `writer`.
    pub const fn new(writer: W, options: ReportOptions) -> Self {
        Self { writer, options }
    }

    /// Consumes the reporter, returning its writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Writes the welcome banner.
    pub fn write_banner(&mut self) -> Result<()> {
        if self.options.quiet {
            return Ok(());
        }

        let mut line = String::new();
        for (index, word) in BANNER.split(' ').enumerate() {
            if index > 0 {
                line.push(' ');
            }

            let mut chars = word.chars();
            match chars.next() {
                Some(initial) if initial.is_uppercase() => {
                    line.push_str(&initial.to_string().red().bold().to_string());
                    line.push_str(chars.as_str());
                }
                _ => line.push_str(word),
            }
        }

        writeln!(self.writer, "{line}")?;
        writeln!(
            self.writer,
            "Welcome to {} Version {}",
            "nightmare".bold(),
            env!("CARGO_PKG_VERSION")
        )?;
        writeln!(self.writer)?;

        Ok(())
    }

    /// Writes the result of a completed test at `position` in the run.
    pub fn write_test(&mut self, position: usize, test: &Test) -> Result<()> {
        if self.options.quiet {
            return Ok(());
        }

        write!(self.writer, "{}[{position:>3}] {}", "Test".purple(), test.name.bold())?;
        if let Some(descr) = &test.descr {
            write!(self.writer, " - {}", descr.italic())?;
        }
        writeln!(self.writer, ": {}", colored_state(test.state()))?;

        if self.options.commands {
            let command = test.resolved_command().unwrap_or_else(|_| test.cmd.clone());
            writeln!(self.writer, "\t--> {}", command.cyan())?;
        }

        self.write_details(test)
    }

    fn write_details(&mut self, test: &Test) -> Result<()> {
        match test.state() {
            TestState::Fail => {
                let comparison = test.comparison();
                self.write_comparison("exit code", &comparison.ret_code)?;
                self.write_comparison("stdout", &comparison.stdout)?;
                self.write_comparison("stderr", &comparison.stderr)?;

                if let Some(diff) = test.diff() {
                    self.write_diff(diff)?;
                }
            }
            TestState::Error => {
                if let Some(detail) = test.error_detail() {
                    writeln!(self.writer, "    {}: {detail}", "error".yellow())?;
                }
            }
            TestState::Timeout => {
                if let Some(timeout) = test.settings.timeout {
                    writeln!(
                        self.writer,
                        "    {} after {:.2}s",
                        "timed out".purple(),
                        timeout.as_secs_f64()
                    )?;
                }
            }
            TestState::SegFault | TestState::Assertion => match test.termination() {
                Some(Termination::Signaled(signal)) => {
                    let signal = signal.to_string();
                    writeln!(self.writer, "    terminated by signal {}", signal.yellow())?;
                }
                Some(Termination::Exited(code)) => {
                    writeln!(self.writer, "    exited with {}", code.to_string().yellow())?;
                }
                Some(Termination::TimedOut) | None => (),
            },
            TestState::Waiting
            | TestState::InfoOnly
            | TestState::Success
            | TestState::Clean
            | TestState::Disabled => (),
        }

        if test.is_truncated() && test.state().was_executed() {
            writeln!(self.writer, "    {}", "(output truncated)".bright_black())?;
        }

        Ok(())
    }

    fn write_comparison(&mut self, label: &str, comparison: &StreamComparison) -> Result<()> {
        let StreamComparison::Differs {
            expected,
            actual,
            diffable,
        } = comparison
        else {
            return Ok(());
        };

        writeln!(self.writer, "    {label} {}", "DIFFERS".bright_red())?;
        if *diffable {
            writeln!(self.writer, "      expected: {}", format!("{expected:?}").cyan())?;
        } else {
            writeln!(self.writer, "      expected: {}", expected.cyan())?;
        }
        writeln!(self.writer, "      actual:   {}", format!("{actual:?}").bright_red())?;

        Ok(())
    }

    fn write_diff(&mut self, diff: &str) -> Result<()> {
        for line in diff.lines() {
            let colored = if line.starts_with("---") || line.starts_with("+++") {
                line.bold()
            } else if line.starts_with("@@") {
                line.cyan()
            } else if line.starts_with('-') {
                line.red()
            } else if line.starts_with('+') {
                line.green()
            } else {
                line.bright_black()
            };

            writeln!(self.writer, "      {colored}")?;
        }

        Ok(())
    }

    /// Writes the number of tests in a suite.
    pub fn write_count(&mut self, count: usize) -> Result<()> {
        writeln!(self.writer, "{count}")?;
        Ok(())
    }

    /// Writes the statistics of a completed run.
    pub fn write_stats(&mut self, stats: &SuiteStats) -> Result<()> {
        let tallies = &stats.tallies;

        writeln!(self.writer)?;
        writeln!(
            self.writer,
            "I ran {} out of {} tests in total",
            tallies.count, stats.total
        )?;
        writeln!(self.writer, "{}", format!("\tSuccess: {}", tallies.success).green())?;

        let categories = [
            ("Failed", tallies.failed, Color::Red),
            ("Errors", tallies.error, Color::Yellow),
            ("Assertions", tallies.assertions, Color::Yellow),
            ("SegFaults", tallies.segfaults, Color::Yellow),
            ("Timeouts", tallies.timedout, Color::Magenta),
        ];
        for (label, count, color) in categories {
            if count > 0 {
                writeln!(self.writer, "{}", format!("\t{label}: {count}").color(color))?;
            }
        }

        if tallies.count > 0 {
            writeln!(self.writer, "\tSuccess rate: {:.2}%", stats.rate)?;
        }

        self.write_remarks(stats)
    }

    fn write_remarks(&mut self, stats: &SuiteStats) -> Result<()> {
        let tallies = &stats.tallies;
        if tallies.count <= REMARK_THRESHOLD {
            return Ok(());
        }

        let unsuccessful = tallies.unsuccessful();

        if tallies.success == stats.total {
            writeln!(self.writer, "\tCongratulations, you passed all tests!")?;
            writeln!(
                self.writer,
                "\t`grep` yourself a refreshing {}",
                "Beer".yellow().bold()
            )?;
            self.write_beer()?;
        } else if tallies.success == 0 && tallies.failed > 0 {
            writeln!(self.writer, "\tWhat is wrong with you, not even a single test?")?;
        } else if unsuccessful > 0 {
            // Shares compared in integers: 5x > 3y is x/y > 0.6, 10x > 3y is x/y > 0.3.
            if 5 * tallies.assertions > 3 * unsuccessful {
                writeln!(
                    self.writer,
                    "\tYou do realise that assertions do not replace error handling?"
                )?;
            } else if 10 * tallies.assertions > 3 * unsuccessful {
                writeln!(self.writer, "\tWe're a bit lazy with calling environments, aren't we?")?;
            }

            if 5 * tallies.segfaults > 3 * unsuccessful {
                writeln!(
                    self.writer,
                    "\tMay the CPU-Gods have mercy with that poor memory management units soul!"
                )?;
            } else if 10 * tallies.segfaults > 3 * unsuccessful {
                writeln!(self.writer, "\tYou know, memory garbage doesn't collect itself?!")?;
            }
        }

        Ok(())
    }

    fn write_beer(&mut self) -> Result<()> {
        const INDENT: &str = "              ";

        writeln!(self.writer)?;
        writeln!(self.writer, "{INDENT}{}", ",%%%%.".white().bold())?;
        writeln!(
            self.writer,
            "{INDENT}{}{}{}{}",
            "i".white().bold(),
            "====".cyan(),
            "i".white().bold(),
            "_".cyan().bold()
        )?;
        writeln!(
            self.writer,
            "{INDENT}{}{}{}",
            "|".cyan().bold(),
            "####".yellow().bold(),
            "| |".cyan()
        )?;
        writeln!(
            self.writer,
            "{INDENT}{}{}{}",
            "|".cyan().bold(),
            "####".yellow().bold(),
            "|-'".cyan()
        )?;
        writeln!(self.writer, "{INDENT}{}", "`-==-'".cyan().bold())?;
        writeln!(self.writer)?;

        Ok(())
    }
}

fn colored_state(state: TestState) -> ColoredString {
    let label = state.label();
    match state {
        TestState::Success | TestState::Clean => label.green(),
        TestState::Fail => label.red(),
        TestState::Error | TestState::SegFault | TestState::Assertion => label.yellow(),
        TestState::Timeout => label.purple(),
        TestState::Waiting | TestState::InfoOnly | TestState::Disabled => label.bright_black(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightmare_core::Tallies;
    use pretty_assertions::assert_eq;

    fn report(
        options: ReportOptions,
        write: impl FnOnce(&mut Reporter<Vec<u8>>) -> Result<()>,
    ) -> Result<String> {
        colored::control::set_override(false);

        let mut reporter = Reporter::new(Vec::new(), options);
        write(&mut reporter)?;
        Ok(String::from_utf8(reporter.into_inner())?)
    }

    fn stats(tallies: Tallies, total: usize) -> SuiteStats {
        SuiteStats {
            tallies,
            total,
            rate: tallies.rate(),
        }
    }

    #[test]
    fn banner_names_the_version() -> Result<()> {
        let output = report(ReportOptions::default(), |r| r.write_banner())?;

        assert!(output.starts_with(BANNER));
        assert!(output.contains(&format!("Version {}", env!("CARGO_PKG_VERSION"))));
        Ok(())
    }

    #[test]
    fn quiet_reports_skip_banner_and_tests() -> Result<()> {
        let options = ReportOptions {
            quiet: true,
            ..ReportOptions::default()
        };
        let output = report(options, |r| {
            r.write_banner()?;
            r.write_test(0, &Test::new("hidden", "true"))
        })?;

        assert_eq!(output, "");
        Ok(())
    }

    #[test]
    fn test_lines_are_numbered() -> Result<()> {
        let options = ReportOptions {
            commands: true,
            ..ReportOptions::default()
        };
        let output = report(options, |r| {
            r.write_test(0, &Test::new("first", "true").with_descr("does nothing"))?;
            r.write_test(1, &Test::new("second", "{DUT} -x").with_dut("prog"))
        })?;

        assert_eq!(
            output,
            concat!(
                "Test[  0] first - does nothing: Waiting\n",
                "\t--> true\n",
                "Test[  1] second: Waiting\n",
                "\t--> prog -x\n",
            )
        );
        Ok(())
    }

    #[test]
    fn stats_list_nonzero_categories() -> Result<()> {
        let tallies = Tallies {
            success: 1,
            failed: 1,
            timedout: 1,
            count: 3,
            ..Tallies::default()
        };
        let output = report(ReportOptions::default(), |r| r.write_stats(&stats(tallies, 4)))?;

        assert!(output.contains("I ran 3 out of 4 tests in total\n"));
        assert!(output.contains("\tSuccess: 1\n"));
        assert!(output.contains("\tFailed: 1\n"));
        assert!(output.contains("\tTimeouts: 1\n"));
        assert!(!output.contains("Errors"));
        assert!(output.contains("\tSuccess rate: 33.33%\n"));
        Ok(())
    }

    #[test]
    fn full_pass_earns_a_beer() -> Result<()> {
        let tallies = Tallies {
            success: 4,
            count: 4,
            ..Tallies::default()
        };
        let output = report(ReportOptions::default(), |r| r.write_stats(&stats(tallies, 4)))?;

        assert!(output.contains("Congratulations, you passed all tests!"));
        assert!(output.contains("`-==-'"));
        Ok(())
    }

    #[test]
    fn small_runs_get_no_remarks() -> Result<()> {
        let tallies = Tallies {
            success: 3,
            count: 3,
            ..Tallies::default()
        };
        let output = report(ReportOptions::default(), |r| r.write_stats(&stats(tallies, 3)))?;

        assert!(!output.contains("Congratulations"));
        Ok(())
    }

    #[test]
    fn remarks_follow_failure_shares() -> Result<()> {
        let all_failed = Tallies {
            failed: 4,
            count: 4,
            ..Tallies::default()
        };
        let output = report(ReportOptions::default(), |r| r.write_stats(&stats(all_failed, 4)))?;
        assert!(output.contains("not even a single test?"));

        let crashing = Tallies {
            success: 1,
            segfaults: 4,
            assertions: 2,
            count: 7,
            ..Tallies::default()
        };
        let output = report(ReportOptions::default(), |r| r.write_stats(&stats(crashing, 7)))?;
        assert!(output.contains("lazy with calling environments"));
        assert!(output.contains("CPU-Gods"));
        Ok(())
    }
}
