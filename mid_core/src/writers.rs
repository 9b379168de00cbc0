//! Durable output: the behavioral and scan-log CSVs, and the run manifest.
//!
//! Each row is written and flushed immediately, the way `FileLogger` appends
//! and flushes one line at a time, so a crash mid-run leaves every completed
//! trial's row on disk (`RenderFailure`/`InputFailure`/`IoFailure` propagate
//! without re-writing the current trial's row).

use std::fs::File;
use std::path::Path;

use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::model::{PhaseRecord, TrialRecord};

/// Appends `TrialRecord` rows to the behavioral CSV, flushing after each.
pub struct BehavioralWriter {
    writer: csv::Writer<File>,
}

impl BehavioralWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let writer = csv::Writer::from_path(path).map_err(|e| EngineError::IoFailure(e.to_string()))?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, record: &TrialRecord) -> Result<()> {
        self.writer.serialize(record).map_err(|e| EngineError::IoFailure(e.to_string()))?;
        self.writer.flush().map_err(|e| EngineError::IoFailure(e.to_string()))?;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.writer.flush().map_err(|e| EngineError::IoFailure(e.to_string()))?;
        Ok(())
    }
}

/// Appends `PhaseRecord` rows to the scan-log CSV, flushing after each.
pub struct ScanLogWriter {
    writer: csv::Writer<File>,
}

impl ScanLogWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let writer = csv::Writer::from_path(path).map_err(|e| EngineError::IoFailure(e.to_string()))?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, record: &PhaseRecord) -> Result<()> {
        self.writer.serialize(record).map_err(|e| EngineError::IoFailure(e.to_string()))?;
        self.writer.flush().map_err(|e| EngineError::IoFailure(e.to_string()))?;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.writer.flush().map_err(|e| EngineError::IoFailure(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestStudyParams {
    pub tr_s: f64,
    pub fixation_dur_s: f64,
    pub min_target_dur_s: f64,
    pub max_target_dur_s: f64,
    pub accuracy_set: [u8; 3],
    pub jitter_max_s: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub version: &'static str,
    pub subject_id: String,
    pub run_n: u32,
    pub fmri: bool,
    pub show_instructions: bool,
    pub session_time: String,
    pub frame_rate_hz: f64,
    pub n_trials: u32,
    pub study_params: ManifestStudyParams,
}

/// Write `manifest.json` atomically: a partial write under a concurrent crash
/// must never leave a truncated manifest at the final path.
pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(manifest).map_err(|e| EngineError::IoFailure(e.to_string()))?;
    crate::atomic::write_atomic(path, &bytes).map_err(|e| EngineError::IoFailure(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_trial_record() -> TrialRecord {
        TrialRecord {
            trial_n: 1,
            trial_type: 1,
            cue_kind: "gain",
            reward_dollars: 5.0,
            difficulty: "high",
            accuracy_target: 80,
            staircase_name: "high",
            staircase_trial_n: 1,
            staircase_step_sd: 0.02,
            intensity_s: 0.135,
            time_onset_s: 0.0,
            jitter_ms: 20,
            target_dur_ms: 265,
            early_press: 0,
            hit: 1,
            rt_ms: Some(320.0),
            reward_outcome: "+$5",
            total_earned: 5.0,
            time_trial_end_s: 10.0,
            trial_dur_ms: 10_000,
            time_sched_end_s: 10.0,
            timing_drift_ms: 0.0,
            total_trs: 5,
            subject_id: "s01".into(),
            run_n: 1,
            pulse_ct_at_onset: 0,
        }
    }

    #[test]
    fn behavioral_writer_appends_and_flushes_rows() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("behavioral.csv");
        let mut writer = BehavioralWriter::create(&path).expect("create");
        writer.append(&sample_trial_record()).expect("append");
        writer.close().expect("close");

        let contents = std::fs::read_to_string(&path).expect("read back");
        assert!(contents.contains("s01"));
        assert!(contents.lines().count() >= 2);
    }

    #[test]
    fn scan_log_writer_appends_phase_records() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("scan_log.csv");
        let mut writer = ScanLogWriter::create(&path).expect("create");
        writer
            .append(&PhaseRecord {
                trial_n: 1,
                phase: "cue",
                tr_n: 0,
                phase_global_time: 0.0,
                phase_trial_time: 0.0,
                pulse_ct: 46,
            })
            .expect("append");
        writer.close().expect("close");

        let contents = std::fs::read_to_string(&path).expect("read back");
        assert!(contents.contains("cue"));
    }

    #[test]
    fn manifest_write_is_atomic_and_round_trips() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("manifest.json");
        let manifest = Manifest {
            version: "1",
            subject_id: "s01".into(),
            run_n: 1,
            fmri: false,
            show_instructions: true,
            session_time: "2026-01-01T00:00:00".into(),
            frame_rate_hz: 60.0,
            n_trials: 12,
            study_params: ManifestStudyParams {
                tr_s: 2.0,
                fixation_dur_s: 2.0,
                min_target_dur_s: 0.130,
                max_target_dur_s: 0.500,
                accuracy_set: [80, 50, 20],
                jitter_max_s: 0.05,
            },
        };
        write_manifest(&path, &manifest).expect("write manifest");
        assert!(!path.with_extension("new").exists());
        let read_back: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("parse");
        assert_eq!(read_back["subject_id"], "s01");
    }
}
