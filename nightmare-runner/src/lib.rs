//! Command-line runner for nightmare testbenches.
//!
//! The runner loads a suite from a testbench file, applies configuration
//! and command-line settings to it, runs it, and reports the results.

pub mod args;
pub mod config;
pub mod events;
pub mod reporting;
pub mod runner;

pub use runner::{EXIT_LOAD_FAILURE, EXIT_SUCCESS, EXIT_TEST_FAILURE, TestRunner};
