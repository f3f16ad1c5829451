use std::path::PathBuf;

use crate::dsl::DslError;

/// Errors loading or saving testbenches.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The testbench file does not exist.
    #[error("testbench not found: {}", .0.display())]
    BenchNotFound(PathBuf),

    /// The testbench file could not be read.
    #[error("failed to read {}: {}", .0.display(), .1)]
    ReadFailed(PathBuf, std::io::Error),

    /// The testbench file is not a valid definition.
    #[error("failed to parse {}: {}", .0.display(), .1)]
    ParseFailed(PathBuf, serde_yaml::Error),

    /// The requested suite is not defined by the testbench.
    #[error("suite '{0}' not found in testbench")]
    SuiteNotFound(String),

    /// A timeout is not a non-negative number of seconds.
    #[error("invalid timeout: {0}")]
    InvalidTimeout(f64),

    /// A test uses a programmatic predicate, which has no persisted form.
    #[error("test '{0}' uses predicate '{1}', which cannot be saved")]
    UnsavablePredicate(String, String),

    /// A test definition could not be rendered.
    #[error("failed to render test '{0}': {1}")]
    SerializeFailed(String, serde_json::Error),

    /// The save target could not be written.
    #[error("failed to write {}: {}", .0.display(), .1)]
    WriteFailed(PathBuf, std::io::Error),

    /// A DSL front-end rejected its source.
    #[error("{} front-end failed on {}: {}", .0, .1.display(), .2)]
    Dsl(String, PathBuf, DslError),
}
