use std::fmt;

/// Result state of a test.
///
/// A test starts out [`Waiting`](Self::Waiting); every other state is
/// terminal for a single run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TestState {
    /// Not run yet.
    #[default]
    Waiting,
    /// Listed without being executed.
    InfoOnly,
    /// Every declared expectation was met.
    Success,
    /// The DUT ran to completion and no expectation was declared.
    Clean,
    /// A declared expectation was not met.
    Fail,
    /// The harness could not complete the comparison.
    Error,
    /// The DUT exceeded its allotted time.
    Timeout,
    /// The DUT was terminated by a memory fault signal.
    SegFault,
    /// The DUT's own assertion mechanism fired.
    Assertion,
    /// Explicitly skipped.
    Disabled,
}

impl TestState {
    /// Returns whether this state counts as a pass.
    pub const fn is_passing(self) -> bool {
        matches!(self, Self::Success | Self::Clean)
    }

    /// Returns whether a DUT invocation took place to reach this state.
    pub const fn was_executed(self) -> bool {
        !matches!(self, Self::Waiting | Self::InfoOnly | Self::Disabled)
    }

    /// Returns the human-readable label of this state.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Waiting => "Waiting",
            Self::InfoOnly => "Info",
            Self::Success => "Success",
            Self::Clean => "Clean",
            Self::Fail => "Fail",
            Self::Error => "Error",
            Self::Timeout => "Timeout",
            Self::SegFault => "Segmentation Fault",
            Self::Assertion => "Assertion",
            Self::Disabled => "Disabled",
        }
    }
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
