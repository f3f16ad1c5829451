use std::path::PathBuf;

/// Conditions that keep the harness from completing a test's comparison.
///
/// None of these describe a defect in the device under test; a test that hits
/// one of them ends up in the [`TestState::Error`](crate::TestState::Error) state.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The command references the DUT but no DUT was configured.
    #[error("command references {{DUT}} but no device under test is configured")]
    NoDutConfigured,

    /// The configured DUT path does not exist.
    #[error("device under test not found: {}", .0.display())]
    DutNotFound(PathBuf),

    /// The command could not be spawned.
    #[error("failed to spawn '{0}': {1}")]
    SpawnFailed(String, std::io::Error),

    /// One of the child's output streams was not available for capture.
    #[error("child {0} stream is not available")]
    StreamUnavailable(&'static str),

    /// A file expectation's reference file could not be read.
    #[error("failed to read reference file {}: {}", .0.display(), .1)]
    ReferenceFileUnreadable(PathBuf, std::io::Error),

    /// A predicate expectation raised a failure while being evaluated.
    #[error("predicate '{0}' failed: {1}")]
    PredicateFailed(String, String),

    /// A regex predicate holds a pattern that does not compile.
    #[error("invalid regex '{0}': {1}")]
    InvalidRegex(String, regex::Error),

    /// An I/O error occurred while driving the child process.
    #[error("i/o error: {0}")]
    IoError(#[from] std::io::Error),
}
