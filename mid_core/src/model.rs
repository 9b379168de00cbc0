//! Trial-level data model: the sequence plan, the per-trial and per-phase records
//! written to disk, and the small constant tables from the study design.

use mid_traits::CueKind;
use serde::Serialize;

/// Target accuracy level a trial's staircase is driving toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccuracyLevel {
    High,
    Medium,
    Low,
}

impl AccuracyLevel {
    pub fn from_percent(p: u8) -> Option<Self> {
        match p {
            80 => Some(Self::High),
            50 => Some(Self::Medium),
            20 => Some(Self::Low),
            _ => None,
        }
    }

    pub fn percent(self) -> u8 {
        match self {
            Self::High => 80,
            Self::Medium => 50,
            Self::Low => 20,
        }
    }

    pub fn target_p(self) -> f64 {
        f64::from(self.percent()) / 100.0
    }

    pub fn difficulty(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// One planned trial, read from the sequence CSV.
#[derive(Debug, Clone, Copy)]
pub struct TrialPlanRow {
    pub cue_kind: CueKind,
    pub accuracy: AccuracyLevel,
    pub n_iti: u32,
}

/// `trial_type` in `{1..9}`, per the (cue_kind, accuracy) lookup table.
pub fn trial_type(cue_kind: CueKind, accuracy: AccuracyLevel) -> u8 {
    use AccuracyLevel::{High, Low, Medium};
    use CueKind::{Gain, Loss, Neutral};
    match (cue_kind, accuracy) {
        (Gain, High) => 1,
        (Gain, Medium) => 2,
        (Gain, Low) => 3,
        (Loss, High) => 4,
        (Loss, Medium) => 5,
        (Loss, Low) => 6,
        (Neutral, High) => 7,
        (Neutral, Medium) => 8,
        (Neutral, Low) => 9,
    }
}

/// Signed dollar reward at stake for a cue, independent of hit/miss.
pub fn reward_dollars(cue_kind: CueKind) -> f64 {
    match cue_kind {
        CueKind::Gain => 5.0,
        CueKind::Loss => -5.0,
        CueKind::Neutral => 0.0,
    }
}

/// Outcome string recorded for a scored response, e.g. `"+$5"`, `"-$5"`, `"$0"`.
pub fn reward_outcome(cue_kind: CueKind, hit: bool) -> &'static str {
    match (cue_kind, hit) {
        (CueKind::Gain, true) => "+$5",
        (CueKind::Gain, false) => "$0",
        (CueKind::Loss, true) => "$0",
        (CueKind::Loss, false) => "-$5",
        (CueKind::Neutral, _) => "$0",
    }
}

/// Dollar delta applied to cumulative earnings for a scored response.
pub fn reward_delta(cue_kind: CueKind, hit: bool) -> f64 {
    match (cue_kind, hit) {
        (CueKind::Gain, true) => 5.0,
        (CueKind::Gain, false) => 0.0,
        (CueKind::Loss, true) => 0.0,
        (CueKind::Loss, false) => -5.0,
        (CueKind::Neutral, _) => 0.0,
    }
}

/// One row of the behavioral CSV: the full record of a completed trial.
#[derive(Debug, Clone, Serialize)]
pub struct TrialRecord {
    pub trial_n: u32,
    pub trial_type: u8,
    pub cue_kind: &'static str,
    pub reward_dollars: f64,
    pub difficulty: &'static str,
    pub accuracy_target: u8,
    pub staircase_name: &'static str,
    pub staircase_trial_n: u32,
    pub staircase_step_sd: f64,
    pub intensity_s: f64,
    pub time_onset_s: f64,
    pub jitter_ms: u32,
    pub target_dur_ms: u32,
    pub early_press: u8,
    pub hit: u8,
    pub rt_ms: Option<f64>,
    pub reward_outcome: &'static str,
    pub total_earned: f64,
    pub time_trial_end_s: f64,
    pub trial_dur_ms: u32,
    pub time_sched_end_s: f64,
    pub timing_drift_ms: f64,
    pub total_trs: u32,
    pub subject_id: String,
    pub run_n: u32,
    pub pulse_ct_at_onset: u64,
}

/// One row of the scan-log CSV: a pulse-count observation at a named phase boundary.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseRecord {
    pub trial_n: u32,
    pub phase: &'static str,
    /// Monotonic phase counter within the trial (1..K across all five phases,
    /// cue through the last post-outcome-fixation TR).
    pub tr_n: u32,
    pub phase_global_time: f64,
    pub phase_trial_time: f64,
    pub pulse_ct: u64,
}

pub fn cue_kind_str(cue_kind: CueKind) -> &'static str {
    match cue_kind {
        CueKind::Gain => "gain",
        CueKind::Loss => "loss",
        CueKind::Neutral => "neutral",
    }
}
