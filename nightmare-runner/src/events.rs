//! Diagnostic event filtering for the runner.

use std::{collections::HashSet, fmt::Display};

use tracing_subscriber::{
    Layer, filter::LevelFilter, filter::Targets, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Type of event to trace.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, clap::ValueEnum)]
pub enum TraceEvent {
    /// Traces spawning, output capture, and termination of DUT processes.
    #[clap(name = "commands")]
    Commands,
    /// Traces the result line of every completed test.
    #[clap(name = "results")]
    Results,
}

impl Display for TraceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commands => write!(f, "commands"),
            Self::Results => write!(f, "results"),
        }
    }
}

/// Configuration of the diagnostic output written to stderr.
#[derive(Debug, Default)]
pub struct TraceEventConfig {
    enabled_trace_events: HashSet<TraceEvent>,
    level: Option<LevelFilter>,
    quiet: bool,
}

impl TraceEventConfig {
    /// Creates a configuration enabling the given events.
    ///
    /// # Arguments
    ///
    /// * `enabled_log_events` - Events to trace at debug level.
    /// * `level` - Explicit level for all other diagnostics.
    /// * `quiet` - Whether only warnings should be shown by default.
    pub fn new(enabled_log_events: &[TraceEvent], level: Option<LevelFilter>, quiet: bool) -> Self {
        Self {
            enabled_trace_events: enabled_log_events.iter().copied().collect(),
            level,
            quiet,
        }
    }

    /// Installs the configuration as the global subscriber.
    pub fn init(&self) {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .without_time()
            .with_target(false)
            .with_filter(self.compose_filter());

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            // Something went wrong; proceed on anyway but complain audibly.
            eprintln!("warning: failed to initialize tracing.");
        }
    }

    /// Returns the level applied to targets without an enabled event.
    pub fn default_level(&self) -> LevelFilter {
        match self.level {
            Some(level) => level,
            None if self.quiet => LevelFilter::WARN,
            None => LevelFilter::INFO,
        }
    }

    /// Builds the target filter for the configuration.
    pub fn compose_filter(&self) -> Targets {
        let default_level = self.default_level();

        // Result lines duplicate the runner's own report unless asked for.
        let results_level = if self.enabled_trace_events.contains(&TraceEvent::Results) {
            LevelFilter::DEBUG
        } else {
            LevelFilter::OFF
        };
        let commands_level = if self.enabled_trace_events.contains(&TraceEvent::Commands) {
            LevelFilter::TRACE
        } else {
            default_level
        };

        Targets::new()
            .with_default(default_level)
            .with_target("results", results_level)
            .with_target("commands", commands_level)
    }
}
