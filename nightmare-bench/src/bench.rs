//! Testbench files: loading suites and saving them back.

use crate::definition::{SettingsDef, TestDefinition};
use crate::error::Error;
use nightmare_core::{SuiteMode, TestSuite};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::Write,
    path::{Path, PathBuf},
};

/// Name of the suite used when none is requested.
pub const DEFAULT_SUITE_NAME: &str = "suite";

/// A testbench file: shared suite configuration plus one or more named suites.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Testbench {
    /// DUT shared by every suite.
    #[serde(rename = "DUT", default, skip_serializing_if = "Option::is_none")]
    pub dut: Option<PathBuf>,

    /// Run mode of every suite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SuiteMode>,

    /// Settings applied to every test that does not set them itself.
    #[serde(default)]
    pub options: SettingsDef,

    /// Named suites, keyed by every other top-level key.
    #[serde(flatten)]
    pub suites: BTreeMap<String, Vec<TestDefinition>>,

    /// Directory containing the file (computed at runtime).
    #[serde(skip)]
    pub source_dir: PathBuf,

    /// Path to the file (computed at runtime).
    #[serde(skip)]
    pub source_file: PathBuf,
}

impl Testbench {
    /// Loads the testbench file at `path`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Err(Error::BenchNotFound(path.to_path_buf()));
        }

        let text =
            std::fs::read_to_string(path).map_err(|e| Error::ReadFailed(path.to_path_buf(), e))?;

        let mut bench: Self =
            serde_yaml::from_str(&text).map_err(|e| Error::ParseFailed(path.to_path_buf(), e))?;

        bench.source_file = path.to_path_buf();
        bench.source_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        tracing::debug!(
            "loaded testbench {} with suites: {:?}",
            path.display(),
            bench.suites.keys().collect::<Vec<_>>()
        );

        Ok(bench)
    }

    /// Returns the names of the defined suites.
    pub fn suite_names(&self) -> impl Iterator<Item = &str> {
        self.suites.keys().map(String::as_str)
    }

    /// Builds the suite named `name`.
    pub fn build_suite(&self, name: &str) -> Result<TestSuite, Error> {
        let definitions = self
            .suites
            .get(name)
            .ok_or_else(|| Error::SuiteNotFound(name.to_owned()))?;

        let tests = definitions
            .iter()
            .map(|definition| definition.to_test(&self.options))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TestSuite::new(tests)
            .with_mode(self.mode.unwrap_or_default())
            .with_dut(self.dut.clone()))
    }
}

/// Renders `suite` as a testbench holding a single suite named `suite_name`.
///
/// Every test is written on its own line in its canonical single-line form.
pub fn render_suite(suite: &TestSuite, suite_name: &str) -> Result<String, Error> {
    let mut output = String::new();

    writeln!(output, "# nightmare - Testbench").ok();
    writeln!(output, "# Saved by nightmare {}", env!("CARGO_PKG_VERSION")).ok();
    writeln!(output).ok();

    if let Some(dut) = suite.dut() {
        writeln!(output, "DUT: {}", quoted(&dut.to_string_lossy())?).ok();
    }
    let mode = serde_json::to_string(&suite.mode())
        .map_err(|e| Error::SerializeFailed(suite.mode().to_string(), e))?;
    writeln!(output, "mode: {mode}").ok();

    let definitions = suite
        .iter()
        .map(TestDefinition::from_test)
        .collect::<Result<Vec<_>, _>>()?;

    if definitions.is_empty() {
        writeln!(output, "{}: []", quoted(suite_name)?).ok();
    } else {
        writeln!(output, "{}:", quoted(suite_name)?).ok();
        for definition in &definitions {
            writeln!(output, "  - {}", definition.to_line()?).ok();
        }
    }

    Ok(output)
}

/// Writes `suite` to `path` as a testbench holding a single suite named
/// `suite_name`.
pub fn save_suite(suite: &TestSuite, suite_name: &str, path: &Path) -> Result<(), Error> {
    let rendered = render_suite(suite, suite_name)?;

    std::fs::write(path, rendered).map_err(|e| Error::WriteFailed(path.to_path_buf(), e))?;
    tracing::info!("saved {} tests to {}", suite.len(), path.display());

    Ok(())
}

fn quoted(value: &str) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|e| Error::SerializeFailed(value.to_owned(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use assert_fs::prelude::*;
    use nightmare_core::{Expectation, Test, TestState};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const BENCH: &str = r#"
DUT: echo
mode: continuous
options:
  timeout: 2.5
  diff: true
suite:
  - name: greet
    descr: prints hi
    cmd: "{DUT} hi"
    stdout: hi
    retcode: 0
  - name: errs
    cmd: "{DUT} oops >&2"
    stderr: { contains: oops }
    timeout: 1
  - name: skipped
    cmd: "false"
    disabled: true
smoke:
  - name: only
    cmd: "true"
"#;

    #[test]
    fn load_bench_and_build_suites() -> Result<()> {
        let temp_dir = assert_fs::TempDir::new()?;
        let file = temp_dir.child("bench.yaml");
        file.write_str(BENCH)?;

        let bench = Testbench::load(file.path())?;
        assert_eq!(bench.suite_names().collect::<Vec<_>>(), ["smoke", "suite"]);
        assert_eq!(bench.source_dir, temp_dir.path());

        let suite = bench.build_suite(DEFAULT_SUITE_NAME)?;
        assert_eq!(suite.len(), 3);
        assert_eq!(suite.mode(), SuiteMode::Continuous);
        assert_eq!(suite.dut(), Some(Path::new("echo")));
        assert_eq!(suite[0].settings.timeout, Some(Duration::from_millis(2500)));
        assert_eq!(suite[1].settings.timeout, Some(Duration::from_secs(1)));
        assert!(suite[1].settings.diff);
        assert!(suite[2].disabled);

        assert_eq!(bench.build_suite("smoke")?.len(), 1);
        Ok(())
    }

    #[test]
    fn missing_suite_is_reported() -> Result<()> {
        let bench: Testbench = serde_yaml::from_str(BENCH)?;
        assert!(matches!(
            bench.build_suite("nope"),
            Err(Error::SuiteNotFound(name)) if name == "nope"
        ));
        Ok(())
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(matches!(
            Testbench::load(Path::new("/no/such/bench.yaml")),
            Err(Error::BenchNotFound(_))
        ));
    }

    #[test]
    fn invalid_yaml_is_reported() -> Result<()> {
        let temp_dir = assert_fs::TempDir::new()?;
        let file = temp_dir.child("bench.yaml");
        file.write_str("suite:\n  - name: [unterminated\n")?;

        assert!(matches!(
            Testbench::load(file.path()),
            Err(Error::ParseFailed(..))
        ));
        Ok(())
    }

    #[test]
    fn saved_suite_reloads_equivalently() -> Result<()> {
        let bench: Testbench = serde_yaml::from_str(BENCH)?;
        let suite = bench.build_suite(DEFAULT_SUITE_NAME)?;

        let temp_dir = assert_fs::TempDir::new()?;
        let file = temp_dir.child("saved.yaml");
        save_suite(&suite, "regression", file.path())?;

        let saved = std::fs::read_to_string(file.path())?;
        assert!(saved.starts_with("# nightmare - Testbench\n"));
        assert!(saved.contains("DUT: \"echo\"\n"));
        assert!(saved.contains("mode: \"continuous\"\n"));
        assert_eq!(saved.lines().filter(|line| line.starts_with("  - {")).count(), 3);

        let reloaded = Testbench::load(file.path())?.build_suite("regression")?;
        assert_eq!(reloaded.len(), suite.len());
        assert_eq!(reloaded.mode(), suite.mode());
        assert_eq!(reloaded.dut(), suite.dut());
        for (original, copy) in suite.iter().zip(reloaded.iter()) {
            assert_eq!(copy.name, original.name);
            assert_eq!(copy.descr, original.descr);
            assert_eq!(copy.cmd, original.cmd);
            assert_eq!(copy.expect_stdout, original.expect_stdout);
            assert_eq!(copy.expect_stderr, original.expect_stderr);
            assert_eq!(copy.expect_ret_code, original.expect_ret_code);
            assert_eq!(copy.disabled, original.disabled);
            assert_eq!(copy.settings, original.settings);
        }
        Ok(())
    }

    #[test]
    fn empty_suite_renders_empty_list() -> Result<()> {
        let rendered = render_suite(&TestSuite::default(), "suite")?;

        assert!(rendered.ends_with("\"suite\": []\n"));
        let bench: Testbench = serde_yaml::from_str(&rendered)?;
        assert_eq!(bench.build_suite("suite")?.len(), 0);
        Ok(())
    }

    #[test]
    fn unsavable_suite_fails_to_render() {
        let suite = TestSuite::new([
            Test::new("custom", "true").with_stdout(Expectation::custom("len", |s| Ok(s.len() > 2)))
        ]);

        assert!(matches!(
            render_suite(&suite, "suite"),
            Err(Error::UnsavablePredicate(..))
        ));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn loaded_suite_runs() -> Result<()> {
        let bench: Testbench = serde_yaml::from_str(BENCH)?;
        let mut suite = bench.build_suite(DEFAULT_SUITE_NAME)?;

        let tallies = suite.run(true, &[]).run_to_end(|_, _| ()).await;

        assert_eq!(tallies.success, 2);
        assert_eq!(tallies.count, 2);
        assert_eq!(suite[2].state(), TestState::Disabled);
        Ok(())
    }
}
