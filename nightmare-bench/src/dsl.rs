//! Interface for alternative textual test-definition grammars.
//!
//! No grammar ships with this crate; a front-end implementing [`DslFrontEnd`]
//! turns source text into a flat list of [`TestDefinition`]s, which are then
//! built into a suite like any testbench suite.

use crate::definition::{SettingsDef, TestDefinition};
use crate::error::Error;
use nightmare_core::TestSuite;
use std::{fmt, path::Path};

/// A node of a front-end's syntax tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DslNode {
    /// Grammar rule that produced the node.
    pub kind: String,
    /// Source text covered by the node.
    pub text: String,
    /// Child nodes, in source order.
    pub children: Vec<DslNode>,
}

impl DslNode {
    /// Creates a leaf node.
    pub fn leaf(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: text.into(),
            children: vec![],
        }
    }
}

/// Tests described by a DSL source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DslSuite {
    /// DUT declared by the source.
    pub dut: Option<std::path::PathBuf>,
    /// Tests in declaration order.
    pub tests: Vec<TestDefinition>,
}

/// A front-end's rejection of its source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DslError {
    /// Line of the preprocessed source the problem was found on, if known.
    pub line: Option<usize>,
    /// What went wrong.
    pub message: String,
}

impl DslError {
    /// Creates an error pointing at `line`.
    pub fn at_line(line: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }
}

impl fmt::Display for DslError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DslError {}

/// A grammar turning source text into tests.
pub trait DslFrontEnd: Send + Sync {
    /// Returns the name of the grammar.
    fn name(&self) -> &str;

    /// Parses preprocessed source text into a syntax tree.
    fn parse(&self, source: &str) -> Result<DslNode, DslError>;

    /// Flattens a syntax tree into tests.
    fn to_test_list(&self, ast: &DslNode) -> Result<DslSuite, DslError>;
}

/// Prepares DSL source for parsing.
///
/// Comment lines (starting with `#`) and blank lines are dropped, and German
/// umlauts and sharp s are transliterated to ASCII.
pub fn prepare_source(source: &str) -> String {
    let mut prepared = String::with_capacity(source.len());

    for line in source.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        for c in line.chars() {
            match c {
                'ä' => prepared.push_str("ae"),
                'Ä' => prepared.push_str("Ae"),
                'ö' => prepared.push_str("oe"),
                'Ö' => prepared.push_str("Oe"),
                'ü' => prepared.push_str("ue"),
                'Ü' => prepared.push_str("Ue"),
                'ß' => prepared.push_str("ss"),
                _ => prepared.push(c),
            }
        }
        prepared.push('\n');
    }

    prepared
}

/// Loads the DSL source at `path` through `front_end` and builds its suite,
/// filling unset test settings from `options`.
pub fn load_dsl(
    front_end: &dyn DslFrontEnd,
    path: &Path,
    options: &SettingsDef,
) -> Result<TestSuite, Error> {
    if !path.exists() {
        return Err(Error::BenchNotFound(path.to_path_buf()));
    }

    let source =
        std::fs::read_to_string(path).map_err(|e| Error::ReadFailed(path.to_path_buf(), e))?;
    let dsl_error = |e| Error::Dsl(front_end.name().to_owned(), path.to_path_buf(), e);

    let ast = front_end.parse(&prepare_source(&source)).map_err(dsl_error)?;
    let listed = front_end.to_test_list(&ast).map_err(dsl_error)?;

    tracing::debug!(
        "{} front-end produced {} tests from {}",
        front_end.name(),
        listed.tests.len(),
        path.display()
    );

    let tests = listed
        .tests
        .iter()
        .map(|definition| definition.to_test(options))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TestSuite::new(tests).with_dut(listed.dut))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ExpectationDef;
    use anyhow::Result;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    /// Toy grammar: `dut <path>` or `<name>: <cmd> => <stdout>`, one per line.
    struct LineGrammar;

    impl DslFrontEnd for LineGrammar {
        fn name(&self) -> &str {
            "line"
        }

        fn parse(&self, source: &str) -> Result<DslNode, DslError> {
            let mut root = DslNode {
                kind: String::from("script"),
                text: source.to_owned(),
                children: vec![],
            };

            for (index, line) in source.lines().enumerate() {
                if let Some(dut) = line.strip_prefix("dut ") {
                    root.children.push(DslNode::leaf("dut", dut.trim()));
                } else if line.contains(':') && line.contains("=>") {
                    root.children.push(DslNode::leaf("test", line));
                } else {
                    return Err(DslError::at_line(index + 1, "expected a test"));
                }
            }

            Ok(root)
        }

        fn to_test_list(&self, ast: &DslNode) -> Result<DslSuite, DslError> {
            let mut suite = DslSuite::default();

            for node in &ast.children {
                if node.kind == "dut" {
                    suite.dut = Some(PathBuf::from(&node.text));
                    continue;
                }

                let (name, rest) = node.text.split_once(':').unwrap_or_default();
                let (cmd, stdout) = rest.split_once("=>").unwrap_or_default();
                suite.tests.push(TestDefinition {
                    name: name.trim().to_owned(),
                    cmd: cmd.trim().to_owned(),
                    stdout: Some(ExpectationDef::Text(stdout.trim().to_owned())),
                    ..TestDefinition::default()
                });
            }

            Ok(suite)
        }
    }

    #[test]
    fn comments_and_blank_lines_are_dropped() {
        let source = "# header\n\nfirst\n   # indented comment\n  second\n\n";
        assert_eq!(prepare_source(source), "first\n  second\n");
    }

    #[test]
    fn umlauts_are_transliterated() {
        assert_eq!(
            prepare_source("Grüße aus Köln, Äpfel, Öl, Übermaß"),
            "Gruesse aus Koeln, Aepfel, Oel, Uebermass\n"
        );
    }

    #[test]
    fn front_end_builds_suite() -> Result<()> {
        let temp_dir = assert_fs::TempDir::new()?;
        let file = temp_dir.child("tests.arnold");
        file.write_str("# greetings\ndut echo\n\ngrüß: {DUT} hi => hi\nbye: {DUT} bye => bye\n")?;

        let suite = load_dsl(&LineGrammar, file.path(), &SettingsDef::default())?;

        assert_eq!(suite.len(), 2);
        assert_eq!(suite.dut(), Some(Path::new("echo")));
        assert_eq!(suite[0].name, "gruess");
        assert_eq!(suite[1].cmd, "{DUT} bye");
        Ok(())
    }

    #[test]
    fn front_end_errors_are_reported() -> Result<()> {
        let temp_dir = assert_fs::TempDir::new()?;
        let file = temp_dir.child("broken.arnold");
        file.write_str("dut echo\nnonsense\n")?;

        let err = load_dsl(&LineGrammar, file.path(), &SettingsDef::default());

        assert!(matches!(
            err,
            Err(Error::Dsl(ref name, _, DslError { line: Some(2), .. })) if name == "line"
        ));
        Ok(())
    }
}
