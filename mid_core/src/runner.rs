//! The run driver: wires a built `Engine` through a full session from
//! scan-start detection to the closing fixation, writing every trial and
//! phase record as it goes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use mid_traits::{Clock, InputSource, Renderer, ScannerBackend, Stimulus};
use rand::rngs::SmallRng;

use crate::config::StudyParams;
use crate::error::{EngineError, Result};
use crate::model::TrialPlanRow;
use crate::pulse_counter::PulseCounter;
use crate::staircase::StaircasePool;
use crate::trial::{run_trial, TrialContext};
use crate::writers::{BehavioralWriter, Manifest, ManifestStudyParams, ScanLogWriter};

const SCAN_START_POLL: Duration = Duration::from_millis(1);
/// Navigation key that starts a behavioral (non-fMRI) run without a scanner.
const START_KEY: &str = "0";
/// Keys that request an orderly end-of-session quit between trials.
const END_KEYS: [&str; 2] = ["l", "escape"];

/// A fully wired engine, produced by `EngineBuilder::build`/`try_build`.
pub struct Engine {
    pub(crate) renderer: Box<dyn Renderer>,
    pub(crate) input: Box<dyn InputSource>,
    pub(crate) pulse_counter: PulseCounter<Box<dyn ScannerBackend>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) study: StudyParams,
    pub(crate) staircases: StaircasePool,
    pub(crate) sequence: Vec<TrialPlanRow>,
    pub(crate) rng: SmallRng,
    pub(crate) subject_id: String,
    pub(crate) run_n: u32,
    pub(crate) fmri: bool,
    pub(crate) show_instructions: bool,
    pub(crate) frame_rate_hz: f64,
    /// Set by the caller's SIGINT handler to request an orderly stop between
    /// trials. `None` if the caller never wired one in.
    pub(crate) shutdown: Option<Arc<AtomicBool>>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub data_dir: PathBuf,
    pub n_trials: u32,
    pub total_earned: f64,
}

impl Engine {
    /// Run a full session under `data_root`, returning the output directory
    /// and a summary once every trial and the closing fixation complete.
    pub fn run(&mut self, data_root: &Path) -> Result<RunSummary> {
        let timestamp = Local::now().format("%Y%m%dT%H%M%S").to_string();
        let data_dir = data_root.join(format!("{}_run{}_{}", self.subject_id, self.run_n, timestamp));
        std::fs::create_dir_all(&data_dir).map_err(|e| EngineError::IoFailure(e.to_string()))?;

        let manifest = Manifest {
            version: env!("CARGO_PKG_VERSION"),
            subject_id: self.subject_id.clone(),
            run_n: self.run_n,
            fmri: self.fmri,
            show_instructions: self.show_instructions,
            session_time: timestamp.clone(),
            frame_rate_hz: self.frame_rate_hz,
            n_trials: self.sequence.len() as u32,
            study_params: ManifestStudyParams {
                tr_s: self.study.tr_s,
                fixation_dur_s: self.study.fixation_dur_s,
                min_target_dur_s: self.study.min_target_dur_s,
                max_target_dur_s: self.study.max_target_dur_s,
                accuracy_set: [80, 50, 20],
                jitter_max_s: self.study.jitter_max_s,
            },
        };
        crate::writers::write_manifest(&data_dir.join("manifest.json"), &manifest)?;

        let mut behavioral = BehavioralWriter::create(&data_dir.join(format!("behavioral_{}_run{}.csv", self.subject_id, self.run_n)))?;
        let mut scan_log = ScanLogWriter::create(&data_dir.join(format!("scan_log_{}_run{}.csv", self.subject_id, self.run_n)))?;

        self.wait_for_scan_start();

        let run_epoch = self.clock.now();
        run_fixation_hold(self.clock.as_ref(), self.renderer.as_mut(), self.study.initial_fix_dur_s);
        let mut nominal_time_s = elapsed_s(self.clock.as_ref(), run_epoch);
        let mut total_earned = 0.0;
        let mut pulse_ct_total = 0u64;

        let sequence = std::mem::take(&mut self.sequence);
        for (i, plan) in sequence.iter().enumerate() {
            if self.quit_requested() {
                behavioral.close()?;
                scan_log.close()?;
                self.sequence = sequence;
                return Err(EngineError::SessionAborted("end key or interrupt received between trials".to_string()).into());
            }
            let trial_n = (i + 1) as u32;
            let mut ctx = TrialContext {
                study: &self.study,
                pulse_counter: &mut self.pulse_counter,
                clock: self.clock.as_ref(),
                renderer: self.renderer.as_mut(),
                input: self.input.as_mut(),
                staircases: &mut self.staircases,
                rng: &mut self.rng,
                run_epoch,
                pulse_ct_total: &mut pulse_ct_total,
                nominal_time_s: &mut nominal_time_s,
                total_earned: &mut total_earned,
                subject_id: &self.subject_id,
                run_n: self.run_n,
            };
            let (record, phases) = run_trial(&mut ctx, trial_n, *plan);
            for phase in &phases {
                scan_log.append(phase)?;
            }
            behavioral.append(&record)?;
        }
        self.sequence = sequence;

        run_fixation_hold(self.clock.as_ref(), self.renderer.as_mut(), self.study.closing_fix_dur_s);

        behavioral.close()?;
        scan_log.close()?;

        Ok(RunSummary {
            data_dir,
            n_trials: manifest.n_trials,
            total_earned,
        })
    }

    /// Block until either the scanner delivers its first pulse (fMRI runs)
    /// or the operator presses the start key (behavioral runs without a
    /// scanner attached), then drain the baseline so the first TR wait in
    /// the first trial doesn't double-count it.
    fn wait_for_scan_start(&mut self) {
        self.pulse_counter.start();
        let baseline = self.pulse_counter.read();
        loop {
            if self.pulse_counter.read() != baseline {
                break;
            }
            if self.input.poll().iter().any(|k| k.key == START_KEY) {
                break;
            }
            self.clock.sleep(SCAN_START_POLL);
        }
        self.pulse_counter.drain();
    }

    /// True if a SIGINT handler flagged shutdown, or the operator pressed an
    /// end key since the last check. Checked once per trial boundary.
    fn quit_requested(&mut self) -> bool {
        if self.shutdown.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return true;
        }
        self.input.poll().iter().any(|k| END_KEYS.contains(&k.key.as_str()))
    }
}

fn elapsed_s(clock: &dyn Clock, since: Instant) -> f64 {
    clock.now().saturating_duration_since(since).as_secs_f64()
}

fn run_fixation_hold(clock: &dyn Clock, renderer: &mut dyn Renderer, duration_s: f64) {
    let start = clock.now();
    while elapsed_s(clock, start) < duration_s {
        renderer.draw(Stimulus::Fixation);
        renderer.flip();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::EngineBuilder;
    use crate::mocks::{fake_scanner, FakeClock, FakeInputSource, FakeRenderer};
    use crate::model::AccuracyLevel;
    use mid_traits::CueKind;
    use tempfile::tempdir;

    fn fast_study() -> StudyParams {
        StudyParams {
            tr_s: 0.001,
            cue_dur_s: 0.002,
            fixation_dur_s: 0.002,
            response_dur_s: 0.002,
            outcome_dur_s: 0.002,
            iti_tr_dur_s: 0.001,
            min_target_dur_s: 0.001,
            max_target_dur_s: 0.002,
            initial_target_dur_s: 0.0015,
            initial_staircase_sd_s: 0.0003,
            initial_fix_dur_s: 0.002,
            closing_fix_dur_s: 0.002,
            jitter_max_s: 0.0,
            scanner_pulse_rate: 1,
        }
    }

    #[test]
    fn run_writes_manifest_and_csvs_for_every_trial() {
        let clock = FakeClock::new();
        let mut engine = EngineBuilder::new()
            .with_renderer(FakeRenderer::new(clock.clone(), 500.0))
            .with_input(FakeInputSource::new(clock.clone()))
            .with_scanner(fake_scanner(0.001, 1))
            .with_clock(clock)
            .with_study(fast_study())
            .with_sequence(vec![
                TrialPlanRow {
                    cue_kind: CueKind::Gain,
                    accuracy: AccuracyLevel::High,
                    n_iti: 1,
                },
                TrialPlanRow {
                    cue_kind: CueKind::Loss,
                    accuracy: AccuracyLevel::High,
                    n_iti: 1,
                },
            ])
            .with_subject_id("s01")
            .build()
            .expect("engine builds");

        let dir = tempdir().expect("tempdir");
        let summary = engine.run(dir.path()).expect("run completes");

        assert_eq!(summary.n_trials, 2);
        assert!(summary.data_dir.join("manifest.json").exists());
        let behavioral = std::fs::read_to_string(summary.data_dir.join("behavioral_s01_run1.csv")).expect("read behavioral");
        assert_eq!(behavioral.lines().count(), 3); // header + 2 trials
        let scan_log = std::fs::read_to_string(summary.data_dir.join("scan_log_s01_run1.csv")).expect("read scan log");
        assert_eq!(scan_log.lines().count(), 11); // header + 5 phase rows per trial
    }
}
