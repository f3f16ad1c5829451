//! Entry point for the `nightmare` test runner.

use anyhow::Context;
use clap::Parser;
use nightmare_runner::{
    EXIT_LOAD_FAILURE, TestRunner, args::CommandLineArgs, config, events::TraceEventConfig,
};

/// Main entry point for the `nightmare` test runner.
fn main() {
    //
    // Set up panic handler. On release builds, it will capture panic details to a
    // temporary .toml file and report a human-readable message to the screen.
    //
    human_panic::setup_panic!(
        human_panic::Metadata::new(env!("CARGO_BIN_NAME"), env!("CARGO_PKG_VERSION"))
            .homepage(env!("CARGO_PKG_REPOSITORY"))
            .support("please post an issue at the project repository")
    );

    let args = CommandLineArgs::parse();

    TraceEventConfig::new(&args.enabled_log_events, args.log_level, args.quiet).init();

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")
        .and_then(|runtime| runtime.block_on(run(args)));

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("error: {e:#}");
            EXIT_LOAD_FAILURE
        }
    };

    std::process::exit(i32::from(exit_code));
}

/// Loads configuration and runs the requested action. Returns the exit code.
async fn run(args: CommandLineArgs) -> anyhow::Result<u8> {
    let loaded = config::load_config(args.no_config, args.config_file.as_deref());
    if let Some(error) = loaded.error {
        let path = loaded
            .path
            .as_deref()
            .map_or_else(String::new, |path| path.display().to_string());

        if loaded.explicit_path {
            return Err(error).with_context(|| format!("failed to load configuration {path}"));
        }
        tracing::warn!("ignoring configuration {path}: {error}");
    }

    if !loaded.config.use_color(&args) {
        colored::control::set_override(false);
    }

    TestRunner::new(args, loaded.config).run().await
}
