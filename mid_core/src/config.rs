//! Runtime-facing configuration structs. `mid_config` owns the TOML-facing
//! schema; `conversions` bridges from there into these plain domain structs,
//! mirroring the split between a serde-facing config crate and a
//! runtime-facing core crate.

#[derive(Debug, Clone, Copy)]
pub struct StudyParams {
    pub tr_s: f64,
    pub cue_dur_s: f64,
    pub fixation_dur_s: f64,
    pub response_dur_s: f64,
    pub outcome_dur_s: f64,
    pub iti_tr_dur_s: f64,
    pub min_target_dur_s: f64,
    pub max_target_dur_s: f64,
    pub initial_target_dur_s: f64,
    pub initial_staircase_sd_s: f64,
    pub initial_fix_dur_s: f64,
    pub closing_fix_dur_s: f64,
    pub jitter_max_s: f64,
    pub scanner_pulse_rate: u32,
}

impl StudyParams {
    /// Upper bound of the staircase intensity grid: seconds of target-display
    /// time available above the floor.
    pub fn intensity_span_s(&self) -> f64 {
        self.max_target_dur_s - self.min_target_dur_s
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StaircaseLevelParams {
    pub starting_intensity_s: f64,
    pub starting_sd_s: f64,
    pub target_p: f64,
    pub guess_rate: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct StaircaseParams {
    pub high: StaircaseLevelParams,
    pub medium: StaircaseLevelParams,
    pub low: StaircaseLevelParams,
}
