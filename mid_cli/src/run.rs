//! Wires config, sequence, and capabilities into a built `Engine` and drives
//! one full session. Also backs `self-check`, which exercises the same
//! capability doubles without running trials.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use eyre::WrapErr;
use mid_config::{load_sequence_csv, load_toml, Backend, Config};
use mid_core::config::{StaircaseParams, StudyParams};
use mid_core::error::EngineError;
use mid_core::model::TrialPlanRow;
use mid_core::{EngineBuilder, RunSummary};
use mid_traits::ScannerBackend;

use crate::terminal::{TerminalInputSource, TerminalRenderer};

pub struct RunArgs {
    pub subject: String,
    pub run_n: u32,
    pub fmri: bool,
    pub show_instructions: bool,
    pub sequence: String,
    pub data_dir: PathBuf,
    pub frame_rate_hz: f64,
}

pub fn load_config(config_path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(config_path).wrap_err_with(|| format!("read config {config_path:?}"))?;
    let cfg = load_toml(&text).wrap_err_with(|| format!("parse config {config_path:?}"))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn resolve_sequence_path(sequence: &str, run_n: u32) -> PathBuf {
    if sequence == "auto" {
        PathBuf::from(format!("sequences/run_{run_n}.csv"))
    } else {
        PathBuf::from(sequence)
    }
}

fn load_sequence(sequence: &str, run_n: u32) -> eyre::Result<Vec<TrialPlanRow>> {
    let path = resolve_sequence_path(sequence, run_n);
    let rows = load_sequence_csv(&path).map_err(|e| eyre::Report::new(EngineError::MissingSequence(e.to_string())))?;
    Ok(rows.into_iter().map(TrialPlanRow::from).collect())
}

fn build_scanner(cfg: &Config, fmri: bool) -> eyre::Result<Box<dyn ScannerBackend>> {
    match cfg.runner.backend {
        Backend::Emulated => Ok(Box::new(mid_scanner::EmulatedScanner::new(
            cfg.study_params.tr_s,
            cfg.study_params.scanner_pulse_rate,
        ))),
        Backend::Hardware => {
            #[cfg(feature = "hardware")]
            {
                let scanner = mid_scanner::HardwareScanner::open(cfg.runner.gpio_line, cfg.study_params.scanner_pulse_rate)
                    .map_err(|e| eyre::Report::new(EngineError::BackendUnavailable(e.to_string())))?;
                Ok(Box::new(scanner))
            }
            #[cfg(not(feature = "hardware"))]
            {
                if fmri {
                    Err(eyre::Report::new(EngineError::BackendUnavailable(
                        "built without the hardware feature".to_string(),
                    )))
                } else {
                    tracing::warn!("runner.backend = hardware but the hardware feature is disabled; using emulated scanner");
                    Ok(Box::new(mid_scanner::EmulatedScanner::new(
                        cfg.study_params.tr_s,
                        cfg.study_params.scanner_pulse_rate,
                    )))
                }
            }
        }
    }
}

pub fn run(cfg: &Config, args: RunArgs, shutdown: Arc<AtomicBool>) -> eyre::Result<RunSummary> {
    let sequence = load_sequence(&args.sequence, args.run_n)?;

    let study: StudyParams = (&cfg.study_params).into();
    let staircase: StaircaseParams = (&cfg.staircase).into();
    let scanner = build_scanner(cfg, args.fmri)?;

    let renderer = TerminalRenderer::new(args.frame_rate_hz).map_err(|e| eyre::Report::new(EngineError::RenderFailure(e.to_string())))?;
    let input = TerminalInputSource::new();

    let mut engine = EngineBuilder::new()
        .with_renderer(renderer)
        .with_input(input)
        .with_scanner(scanner)
        .with_study(study)
        .with_staircase(staircase)
        .with_sequence(sequence)
        .with_subject_id(args.subject)
        .with_run_n(args.run_n)
        .with_fmri(args.fmri)
        .with_show_instructions(args.show_instructions)
        .with_frame_rate_hz(args.frame_rate_hz)
        .with_shutdown_flag(shutdown)
        .build()?;

    engine.run(&args.data_dir)
}

/// Exercise the scanner backend and a headless renderer/input pair without
/// running a session, mirroring the teacher's own quick hardware sanity check.
pub fn self_check(cfg: &Config) -> eyre::Result<()> {
    let mut scanner = build_scanner(cfg, false)?;
    scanner.start();
    let reading = scanner.read();
    tracing::info!(pulse_rate = scanner.pulse_rate(), reading, "scanner backend responsive");
    println!("scanner backend: OK (pulse_rate={}, reading={})", scanner.pulse_rate(), reading);

    let renderer = TerminalRenderer::new(60.0).map_err(|e| eyre::Report::new(EngineError::RenderFailure(e.to_string())))?;
    drop(renderer);
    println!("renderer: OK");

    let _input = TerminalInputSource::new();
    println!("input source: OK");

    println!("\nself-check: OK");
    Ok(())
}
