//! Expectations over captured streams and exit codes.

use crate::capture::Normalization;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Signature of a programmatic predicate: `Ok(true)` is a match, `Ok(false)`
/// a mismatch, and `Err` a failure of the predicate itself.
pub type PredicateFn<T> = dyn Fn(&T) -> Result<bool, String> + Send + Sync;

/// A named, programmatic predicate.
///
/// Two custom predicates compare equal when their names are equal.
pub struct CustomPredicate<T: ?Sized> {
    name: String,
    func: Arc<PredicateFn<T>>,
}

impl<T: ?Sized> CustomPredicate<T> {
    /// Wraps the given evaluator.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&T) -> Result<bool, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Returns the predicate's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluates the predicate against `value`.
    pub fn evaluate(&self, value: &T) -> Result<bool, String> {
        (self.func)(value)
    }
}

impl<T: ?Sized> Clone for CustomPredicate<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<T: ?Sized> fmt::Debug for CustomPredicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomPredicate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T: ?Sized> PartialEq for CustomPredicate<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// A predicate over normalized text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPredicate {
    /// The text matches the regular expression.
    Regex(String),
    /// The text contains the substring.
    Contains(String),
    /// The text does not contain the substring.
    NotContains(String),
    /// The text starts with the prefix.
    StartsWith(String),
    /// The text ends with the suffix.
    EndsWith(String),
    /// The text consists of exactly this many lines.
    LineCount(usize),
    /// A programmatic predicate; cannot be persisted.
    #[serde(skip)]
    Custom(CustomPredicate<str>),
}

impl TextPredicate {
    /// Wraps a programmatic predicate.
    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> Result<bool, String> + Send + Sync + 'static,
    {
        Self::Custom(CustomPredicate::new(name, func))
    }

    /// Evaluates the predicate against normalized text.
    pub fn evaluate(&self, actual: &str) -> Result<bool, Error> {
        match self {
            Self::Regex(pattern) => {
                let re = regex::Regex::new(pattern)
                    .map_err(|e| Error::InvalidRegex(pattern.clone(), e))?;
                Ok(re.is_match(actual))
            }
            Self::Contains(needle) => Ok(actual.contains(needle.as_str())),
            Self::NotContains(needle) => Ok(!actual.contains(needle.as_str())),
            Self::StartsWith(prefix) => Ok(actual.starts_with(prefix.as_str())),
            Self::EndsWith(suffix) => Ok(actual.ends_with(suffix.as_str())),
            Self::LineCount(count) => Ok(actual.lines().count() == *count),
            Self::Custom(predicate) => predicate
                .evaluate(actual)
                .map_err(|message| Error::PredicateFailed(predicate.name().to_owned(), message)),
        }
    }
}

impl fmt::Display for TextPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regex(pattern) => write!(f, "matches /{pattern}/"),
            Self::Contains(needle) => write!(f, "contains {needle:?}"),
            Self::NotContains(needle) => write!(f, "does not contain {needle:?}"),
            Self::StartsWith(prefix) => write!(f, "starts with {prefix:?}"),
            Self::EndsWith(suffix) => write!(f, "ends with {suffix:?}"),
            Self::LineCount(count) => write!(f, "has {count} line(s)"),
            Self::Custom(predicate) => write!(f, "satisfies '{}'", predicate.name()),
        }
    }
}

/// A predicate over a process exit code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCodePredicate {
    /// The code differs from the given one.
    NotEqual(i32),
    /// The code is one of the given ones.
    OneOf(Vec<i32>),
    /// The code lies within the inclusive range.
    Range {
        /// Lowest accepted code.
        min: i32,
        /// Highest accepted code.
        max: i32,
    },
    /// A programmatic predicate; cannot be persisted.
    #[serde(skip)]
    Custom(CustomPredicate<i32>),
}

impl ExitCodePredicate {
    /// Wraps a programmatic predicate.
    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&i32) -> Result<bool, String> + Send + Sync + 'static,
    {
        Self::Custom(CustomPredicate::new(name, func))
    }

    /// Evaluates the predicate against an exit code.
    pub fn evaluate(&self, actual: i32) -> Result<bool, Error> {
        match self {
            Self::NotEqual(code) => Ok(actual != *code),
            Self::OneOf(codes) => Ok(codes.contains(&actual)),
            Self::Range { min, max } => Ok((*min..=*max).contains(&actual)),
            Self::Custom(predicate) => predicate
                .evaluate(&actual)
                .map_err(|message| Error::PredicateFailed(predicate.name().to_owned(), message)),
        }
    }
}

impl fmt::Display for ExitCodePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEqual(code) => write!(f, "not {code}"),
            Self::OneOf(codes) => write!(f, "one of {codes:?}"),
            Self::Range { min, max } => write!(f, "within {min}..={max}"),
            Self::Custom(predicate) => write!(f, "satisfies '{}'", predicate.name()),
        }
    }
}

/// What a captured stream must satisfy.
#[derive(Clone, Debug, PartialEq)]
pub enum Expectation {
    /// Exact equality with the literal, after normalization.
    Literal(String),
    /// The predicate holds for the normalized stream.
    Predicate(TextPredicate),
    /// Exact equality with the reference file's content, after normalization.
    /// The file is read when the comparison happens.
    File(PathBuf),
}

impl Expectation {
    /// Creates a literal expectation.
    pub fn literal(expected: impl Into<String>) -> Self {
        Self::Literal(expected.into())
    }

    /// Creates a file-backed expectation.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Creates an expectation from a programmatic predicate.
    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> Result<bool, String> + Send + Sync + 'static,
    {
        Self::Predicate(TextPredicate::custom(name, func))
    }

    /// Checks the already-normalized `actual` text against this expectation.
    ///
    /// Relative reference file paths are resolved against `base_dir`.
    pub fn check(
        &self,
        actual: &str,
        normalization: &Normalization,
        base_dir: Option<&Path>,
    ) -> Result<StreamComparison, Error> {
        match self {
            Self::Literal(expected) => Ok(StreamComparison::compare_text(
                normalization.apply(expected),
                actual,
            )),
            Self::File(path) => {
                let resolved = resolve_path(base_dir, path);
                let content = std::fs::read(&resolved)
                    .map_err(|e| Error::ReferenceFileUnreadable(resolved.clone(), e))?;

                Ok(StreamComparison::compare_text(
                    normalization.apply(&String::from_utf8_lossy(&content)),
                    actual,
                ))
            }
            Self::Predicate(predicate) => {
                if predicate.evaluate(actual)? {
                    Ok(StreamComparison::Matches)
                } else {
                    Ok(StreamComparison::Differs {
                        expected: predicate.to_string(),
                        actual: actual.to_owned(),
                        diffable: false,
                    })
                }
            }
        }
    }
}

impl From<&str> for Expectation {
    fn from(expected: &str) -> Self {
        Self::literal(expected)
    }
}

impl From<TextPredicate> for Expectation {
    fn from(predicate: TextPredicate) -> Self {
        Self::Predicate(predicate)
    }
}

/// What a process exit code must satisfy.
#[derive(Clone, Debug, PartialEq)]
pub enum ExitCodeExpectation {
    /// The exit code equals the given one.
    Literal(i32),
    /// The predicate holds for the exit code.
    Predicate(ExitCodePredicate),
}

impl ExitCodeExpectation {
    /// Checks the observed exit code against this expectation.
    pub fn check(&self, actual: i32) -> Result<StreamComparison, Error> {
        let (matches, expected) = match self {
            Self::Literal(code) => (actual == *code, code.to_string()),
            Self::Predicate(predicate) => (predicate.evaluate(actual)?, predicate.to_string()),
        };

        if matches {
            Ok(StreamComparison::Matches)
        } else {
            Ok(StreamComparison::Differs {
                expected,
                actual: actual.to_string(),
                diffable: false,
            })
        }
    }
}

impl From<i32> for ExitCodeExpectation {
    fn from(code: i32) -> Self {
        Self::Literal(code)
    }
}

/// Outcome of checking a single stream or exit code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum StreamComparison {
    /// No expectation was declared.
    #[default]
    NotSpecified,
    /// Actual satisfies the expectation.
    Matches,
    /// Actual does not satisfy the expectation.
    Differs {
        /// The expected value, or a description of the predicate.
        expected: String,
        /// The actual value.
        actual: String,
        /// Whether a line diff between `expected` and `actual` is meaningful.
        diffable: bool,
    },
}

impl StreamComparison {
    fn compare_text(expected: String, actual: &str) -> Self {
        if expected == actual {
            Self::Matches
        } else {
            Self::Differs {
                expected,
                actual: actual.to_owned(),
                diffable: true,
            }
        }
    }

    /// Returns whether this comparison indicates a failure.
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Differs { .. })
    }

    /// Returns whether an expectation was checked.
    pub const fn is_checked(&self) -> bool {
        !matches!(self, Self::NotSpecified)
    }

    /// Renders a unified diff for a diff-capable mismatch.
    pub fn render_diff(&self, stream: &str) -> Option<String> {
        match self {
            Self::Differs {
                expected,
                actual,
                diffable: true,
            } => Some(crate::textdiff::unified_diff(
                expected,
                actual,
                &format!("expected {stream}"),
                &format!("actual {stream}"),
            )),
            _ => None,
        }
    }
}

/// Outcomes of checking all of a test's expectations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpectationComparison {
    /// Comparison of the exit code.
    pub ret_code: StreamComparison,
    /// Comparison of stdout.
    pub stdout: StreamComparison,
    /// Comparison of stderr.
    pub stderr: StreamComparison,
}

impl ExpectationComparison {
    /// Returns whether any expectation failed.
    pub const fn is_failure(&self) -> bool {
        self.ret_code.is_failure() || self.stdout.is_failure() || self.stderr.is_failure()
    }

    /// Returns whether any expectation was checked.
    pub const fn has_any_checks(&self) -> bool {
        self.ret_code.is_checked() || self.stdout.is_checked() || self.stderr.is_checked()
    }

    /// Renders unified diffs for every diff-capable mismatching stream.
    pub fn render_diffs(&self) -> Option<String> {
        let diffs: Vec<String> = [
            self.stdout.render_diff("stdout"),
            self.stderr.render_diff("stderr"),
        ]
        .into_iter()
        .flatten()
        .collect();

        if diffs.is_empty() {
            None
        } else {
            Some(diffs.concat())
        }
    }
}

/// Resolves `path` against `base_dir` when it is relative.
pub(crate) fn resolve_path(base_dir: Option<&Path>, path: &Path) -> PathBuf {
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::LineSeparator;
    use anyhow::Result;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;

    const RULES: Normalization = Normalization {
        linesep: LineSeparator::Lf,
        ignore_empty_lines: false,
    };

    #[test]
    fn literal_matches_after_normalization() -> Result<()> {
        let expectation = Expectation::literal("hi\n");
        assert_eq!(
            expectation.check("hi", &RULES, None)?,
            StreamComparison::Matches
        );
        Ok(())
    }

    #[test]
    fn literal_mismatch_is_diffable() -> Result<()> {
        let comparison = Expectation::literal("hello").check("goodbye", &RULES, None)?;

        assert!(comparison.is_failure());
        let diff = comparison.render_diff("stdout");
        assert!(diff.is_some_and(|d| d.contains("-hello") && d.contains("+goodbye")));
        Ok(())
    }

    #[test]
    fn empty_lines_ignored_on_both_sides() -> Result<()> {
        let rules = Normalization {
            ignore_empty_lines: true,
            ..RULES
        };
        let actual = rules.apply("a\n\nb\n");

        let comparison = Expectation::literal("a\nb\n\n").check(&actual, &rules, None)?;
        assert_eq!(comparison, StreamComparison::Matches);
        Ok(())
    }

    #[test]
    fn regex_predicate() -> Result<()> {
        let expectation = Expectation::Predicate(TextPredicate::Regex(String::from(
            r"^started at \d+$",
        )));

        assert_eq!(
            expectation.check("started at 1234", &RULES, None)?,
            StreamComparison::Matches
        );

        let comparison = expectation.check("started late", &RULES, None)?;
        assert!(comparison.is_failure());
        assert_eq!(comparison.render_diff("stdout"), None);
        Ok(())
    }

    #[test]
    fn invalid_regex_is_an_error() {
        let expectation = Expectation::Predicate(TextPredicate::Regex(String::from("(unclosed")));
        assert!(matches!(
            expectation.check("anything", &RULES, None),
            Err(Error::InvalidRegex(..))
        ));
    }

    #[test]
    fn failing_custom_predicate_is_an_error() {
        let expectation = Expectation::custom("parses as number", |text: &str| {
            text.parse::<u64>()
                .map(|n| n > 10)
                .map_err(|e| e.to_string())
        });

        assert!(matches!(
            expectation.check("12", &RULES, None),
            Ok(StreamComparison::Matches)
        ));
        assert!(matches!(
            expectation.check("5", &RULES, None),
            Ok(StreamComparison::Differs { .. })
        ));
        assert!(matches!(
            expectation.check("five", &RULES, None),
            Err(Error::PredicateFailed(..))
        ));
    }

    #[test]
    fn simple_text_predicates() -> Result<()> {
        let text = "alpha\nbeta\ngamma";
        assert!(TextPredicate::Contains(String::from("beta")).evaluate(text)?);
        assert!(TextPredicate::NotContains(String::from("delta")).evaluate(text)?);
        assert!(TextPredicate::StartsWith(String::from("alp")).evaluate(text)?);
        assert!(TextPredicate::EndsWith(String::from("mma")).evaluate(text)?);
        assert!(TextPredicate::LineCount(3).evaluate(text)?);
        assert!(!TextPredicate::LineCount(2).evaluate(text)?);
        Ok(())
    }

    #[test]
    fn missing_reference_file_is_an_error() {
        let expectation = Expectation::file("/definitely/not/here.txt");
        assert!(matches!(
            expectation.check("x", &RULES, None),
            Err(Error::ReferenceFileUnreadable(..))
        ));
    }

    #[test]
    fn reference_file_is_resolved_and_normalized() -> Result<()> {
        let temp_dir = assert_fs::TempDir::new()?;
        temp_dir.child("expected.txt").write_str("line 1\r\nline 2\r\n")?;

        let rules = Normalization {
            linesep: LineSeparator::CrLf,
            ignore_empty_lines: false,
        };
        let expectation = Expectation::file("expected.txt");

        assert_eq!(
            expectation.check("line 1\nline 2", &rules, Some(temp_dir.path()))?,
            StreamComparison::Matches
        );
        Ok(())
    }

    #[test]
    fn exit_code_expectations() -> Result<()> {
        assert_eq!(
            ExitCodeExpectation::Literal(0).check(0)?,
            StreamComparison::Matches
        );
        assert_eq!(
            ExitCodeExpectation::Literal(0).check(2)?,
            StreamComparison::Differs {
                expected: String::from("0"),
                actual: String::from("2"),
                diffable: false,
            }
        );
        assert!(
            !ExitCodeExpectation::Predicate(ExitCodePredicate::OneOf(vec![1, 2]))
                .check(2)?
                .is_failure()
        );
        assert!(
            ExitCodeExpectation::Predicate(ExitCodePredicate::Range { min: 1, max: 3 })
                .check(4)?
                .is_failure()
        );
        assert!(
            !ExitCodeExpectation::Predicate(ExitCodePredicate::NotEqual(0))
                .check(1)?
                .is_failure()
        );
        Ok(())
    }

    #[test]
    fn comparison_summary() {
        let mut comparison = ExpectationComparison::default();
        assert!(!comparison.has_any_checks());

        comparison.ret_code = StreamComparison::Matches;
        assert!(comparison.has_any_checks());
        assert!(!comparison.is_failure());
        assert_eq!(comparison.render_diffs(), None);

        comparison.stderr = StreamComparison::Differs {
            expected: String::from("a"),
            actual: String::from("b"),
            diffable: true,
        };
        assert!(comparison.is_failure());
        assert!(
            comparison
                .render_diffs()
                .is_some_and(|d| d.contains("--- expected stderr"))
        );
    }
}
