//! Testbench definitions for the nightmare test harness.
//!
//! A testbench is a YAML file holding a suite-wide DUT, a run mode, shared
//! settings, and one or more named suites of test definitions. This crate
//! loads testbenches into [`nightmare_core::TestSuite`]s, saves suites back
//! in their canonical form, and defines the interface through which
//! alternative textual grammars ([`DslFrontEnd`]) can supply tests.

mod bench;
mod definition;
mod dsl;
mod error;

pub use bench::{DEFAULT_SUITE_NAME, Testbench, render_suite, save_suite};
pub use definition::{ExitCodeDef, ExpectationDef, SettingsDef, TestDefinition, parse_timeout};
pub use dsl::{DslError, DslFrontEnd, DslNode, DslSuite, load_dsl, prepare_source};
pub use error::Error;
