//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "mid", version, about = "Monetary Incentive Delay trial engine")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/mid_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a full MID session
    Run {
        /// Subject identifier; also seeds the RNG and jitter sequence
        #[arg(long)]
        subject: String,
        /// Run number, used in output file names
        #[arg(long = "run-n", default_value_t = 1)]
        run_n: u32,
        /// Wait for scanner pulses instead of a manual start keypress
        #[arg(long, action = ArgAction::SetTrue)]
        fmri: bool,
        /// Show the instructions screen before the first trial
        #[arg(long = "show-instructions", action = ArgAction::SetTrue)]
        show_instructions: bool,
        /// Sequence CSV path, or "auto" to pick `sequences/run_{run-n}.csv`
        #[arg(long, default_value = "auto")]
        sequence: String,
        /// Output directory for the run's data directory
        #[arg(long = "data-dir", default_value = "data")]
        data_dir: PathBuf,
        /// Presentation frame rate, used to convert durations to frame counts
        #[arg(long = "frame-rate-hz", default_value_t = 60.0)]
        frame_rate_hz: f64,
    },
    /// Exercise the Scanner Backend and Renderer/Input doubles without running a session
    SelfCheck,
}
