//! Human-readable error descriptions and structured JSON error formatting.

use mid_core::error::{BuildError, EngineError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingRenderer => {
                "What happened: No renderer was provided to the trial engine.\nLikely causes: The terminal renderer failed to initialize, or the builder was never wired up.\nHow to fix: Ensure a renderer is constructed successfully and passed via with_renderer(...).".to_string()
            }
            BuildError::MissingInputSource => {
                "What happened: No input source was provided to the trial engine.\nLikely causes: The terminal input source failed to initialize, or the builder was never wired up.\nHow to fix: Ensure an input source is constructed and passed via with_input(...).".to_string()
            }
            BuildError::MissingScanner => {
                "What happened: No scanner backend was provided to the trial engine.\nLikely causes: --fmri was set but the hardware backend could not be constructed.\nHow to fix: Check the scanner wiring, or drop --fmri to run against the emulated backend.".to_string()
            }
            BuildError::MissingSequence => {
                "What happened: No trial sequence was provided to the trial engine.\nLikely causes: The sequence CSV failed to load or --sequence resolved to nothing.\nHow to fix: Pass a valid --sequence path, or check sequences/run_{n}.csv exists.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(ee) = err.downcast_ref::<EngineError>() {
        return match ee {
            EngineError::SessionAborted(detail) => format!(
                "What happened: The session was aborted ({detail}).\nLikely causes: The operator pressed the end key or sent Ctrl-C.\nHow to fix: This is an orderly stop; re-run to start a fresh session."
            ),
            EngineError::MissingSequence(detail) => format!(
                "What happened: The sequence file is missing or invalid ({detail}).\nLikely causes: Wrong --sequence path, or a CSV with bad headers/values.\nHow to fix: Check the file exists and has headers 'cue_type,target_accuracy,n_iti'."
            ),
            EngineError::BackendUnavailable(detail) => format!(
                "What happened: The scanner backend is unavailable ({detail}).\nLikely causes: --fmri was set but the hardware scanner library could not be loaded.\nHow to fix: Verify the scanner wiring, or drop --fmri to use the emulated backend for testing."
            ),
            EngineError::RenderFailure(detail) => format!(
                "What happened: The renderer failed ({detail}).\nLikely causes: The terminal was resized or closed mid-run.\nHow to fix: Re-run in a stable terminal session."
            ),
            EngineError::InputFailure(detail) => format!(
                "What happened: The input source failed ({detail}).\nLikely causes: The controlling terminal lost raw-mode access.\nHow to fix: Re-run from an interactive terminal."
            ),
            EngineError::IoFailure(detail) => format!(
                "What happened: A file write failed ({detail}).\nLikely causes: The data directory is not writable, or disk is full.\nHow to fix: Check --data-dir permissions and available disk space."
            ),
            EngineError::StaircaseExhausted(detail) => format!(
                "What happened: A staircase ran past its trial budget ({detail}).\nLikely causes: The sequence has more trials at a level than expected.\nHow to fix: This is logged and handled automatically; no action required."
            ),
            EngineError::ClockAnomaly(detail) => format!(
                "What happened: The global clock read non-monotonically ({detail}).\nLikely causes: System clock adjustment or suspend/resume during the run.\nHow to fix: Re-run; avoid suspending the machine mid-session."
            ),
        };
    }

    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!("Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}")
}

/// Stable exit code: `EngineError` delegates to its own mapping (§7); any
/// other error (typically a `BuildError`/config-validation failure) is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(ee) = err.downcast_ref::<EngineError>() {
        return ee.exit_code();
    }
    1
}

fn engine_error_reason(ee: &EngineError) -> &'static str {
    match ee {
        EngineError::SessionAborted(_) => "SessionAborted",
        EngineError::MissingSequence(_) => "MissingSequence",
        EngineError::BackendUnavailable(_) => "BackendUnavailable",
        EngineError::RenderFailure(_) => "RenderFailure",
        EngineError::InputFailure(_) => "InputFailure",
        EngineError::IoFailure(_) => "IoFailure",
        EngineError::StaircaseExhausted(_) => "StaircaseExhausted",
        EngineError::ClockAnomaly(_) => "ClockAnomaly",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(ee) = err.downcast_ref::<EngineError>() {
        let obj = json!({
            "reason": engine_error_reason(ee),
            "message": humanize(err),
        });
        return obj.to_string();
    }

    json!({ "reason": "Error", "message": humanize(err) }).to_string()
}
