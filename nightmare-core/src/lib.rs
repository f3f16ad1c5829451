//! Execution engine of the nightmare black-box test harness.
//!
//! A [`Test`] runs one command against a device under test (DUT), captures
//! its output streams and return code, checks them against its declared
//! [`Expectation`]s, and classifies the outcome into a [`TestState`]. A
//! [`TestSuite`] runs an ordered selection of tests one at a time, keeps
//! [`Tallies`] of the outcomes, and stops early according to its
//! [`SuiteMode`].

mod capture;
mod error;
mod execution;
mod expectation;
mod settings;
mod state;
mod suite;
mod testcase;
mod textdiff;

pub use capture::{LineSeparator, Normalization, StreamCapture};
pub use error::Error;
pub use execution::Termination;
pub use expectation::{
    CustomPredicate, ExitCodeExpectation, ExitCodePredicate, Expectation, ExpectationComparison,
    PredicateFn, StreamComparison, TextPredicate,
};
pub use settings::{SettingsOverride, TestSettings};
pub use state::TestState;
pub use suite::{SuiteMode, SuiteRun, SuiteStats, Tallies, TestSuite};
pub use testcase::{DUT_PLACEHOLDER, Test};
pub use textdiff::unified_diff;
