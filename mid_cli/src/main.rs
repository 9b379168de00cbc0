#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! CLI entrypoint for the MID trial engine.
//!
//! Responsibilities:
//! - Parse config/flags and assemble the renderer, input source, and scanner backend
//! - Initialize tracing and manage log sinks
//! - Offer `--json` mode emitting a stable JSON error object on failure
//! - Map the engine's error taxonomy to stable exit codes

mod cli;
mod error_fmt;
mod run;
mod terminal;
mod tracing_setup;

use clap::Parser;

use cli::{Cli, Commands, JSON_MODE};
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use run::RunArgs;
use tracing_setup::init_tracing;

fn main() -> eyre::Result<()> {
    let _ = color_eyre::install();

    let shutdown = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let shutdown_clone = std::sync::Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nReceived shutdown signal, stopping gracefully...");
        shutdown_clone.store(true, std::sync::atomic::Ordering::SeqCst);
    }) {
        eprintln!("Warning: Failed to set signal handler: {e}");
    }

    if let Err(e) = real_main(shutdown) {
        let json = *JSON_MODE.get().unwrap_or(&false);
        let code = exit_code_for_error(&e);
        if json {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(code);
    }
    Ok(())
}

fn real_main(shutdown: std::sync::Arc<std::sync::atomic::AtomicBool>) -> eyre::Result<()> {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let cfg = run::load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, cfg.logging.file.as_deref(), cfg.logging.rotation.as_deref());

    match cli.cmd {
        Commands::Run {
            subject,
            run_n,
            fmri,
            show_instructions,
            sequence,
            data_dir,
            frame_rate_hz,
        } => {
            let summary = run::run(
                &cfg,
                RunArgs {
                    subject,
                    run_n,
                    fmri,
                    show_instructions,
                    sequence,
                    data_dir,
                    frame_rate_hz,
                },
                shutdown,
            )?;
            if cli.json {
                let obj = serde_json::json!({
                    "data_dir": summary.data_dir,
                    "n_trials": summary.n_trials,
                    "total_earned": summary.total_earned,
                });
                println!("{obj}");
            } else {
                println!(
                    "run complete: {} trials, ${:.2} earned, data in {}",
                    summary.n_trials,
                    summary.total_earned,
                    summary.data_dir.display()
                );
            }
            Ok(())
        }
        Commands::SelfCheck => run::self_check(&cfg),
    }
}
