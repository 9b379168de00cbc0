//! `From` implementations bridging `mid_config` types to `mid_core` types.
//!
//! These eliminate manual field-by-field mapping at the CLI boundary.

use crate::config::{StaircaseLevelParams, StaircaseParams, StudyParams};
use crate::model::{AccuracyLevel, TrialPlanRow};
use crate::staircase::{Staircase, StaircasePool};

impl From<&mid_config::StudyParamsCfg> for StudyParams {
    fn from(c: &mid_config::StudyParamsCfg) -> Self {
        Self {
            tr_s: c.tr_s,
            cue_dur_s: c.cue_dur_s,
            fixation_dur_s: c.fixation_dur_s,
            response_dur_s: c.response_dur_s,
            outcome_dur_s: c.outcome_dur_s,
            iti_tr_dur_s: c.iti_tr_dur_s,
            min_target_dur_s: c.min_target_dur_s,
            max_target_dur_s: c.max_target_dur_s,
            initial_target_dur_s: c.initial_target_dur_s,
            initial_staircase_sd_s: c.initial_staircase_sd_s,
            initial_fix_dur_s: c.initial_fix_dur_s,
            closing_fix_dur_s: c.closing_fix_dur_s,
            jitter_max_s: c.jitter_max_s,
            scanner_pulse_rate: c.scanner_pulse_rate,
        }
    }
}

impl From<mid_config::StaircaseLevelCfg> for StaircaseLevelParams {
    fn from(c: mid_config::StaircaseLevelCfg) -> Self {
        Self {
            starting_intensity_s: c.starting_intensity_s,
            starting_sd_s: c.starting_sd_s,
            target_p: c.target_p,
            guess_rate: c.guess_rate,
        }
    }
}

impl From<&mid_config::StaircaseCfg> for StaircaseParams {
    fn from(c: &mid_config::StaircaseCfg) -> Self {
        Self {
            high: c.high.into(),
            medium: c.medium.into(),
            low: c.low.into(),
        }
    }
}

impl From<mid_config::SequenceRow> for TrialPlanRow {
    fn from(r: mid_config::SequenceRow) -> Self {
        Self {
            cue_kind: r.cue_type.into(),
            accuracy: AccuracyLevel::from_percent(r.target_accuracy)
                .expect("sequence loader already validated target_accuracy"),
            n_iti: r.n_iti,
        }
    }
}

/// Build a `StaircasePool` sized by each level's trial budget (the count of
/// sequence rows targeting that accuracy level) and seeded from `params`.
pub fn build_staircase_pool(params: &StaircaseParams, study: &StudyParams, sequence: &[TrialPlanRow]) -> StaircasePool {
    let span = study.intensity_span_s();
    let level_params = |level: AccuracyLevel| -> StaircaseLevelParams {
        match level {
            AccuracyLevel::High => params.high,
            AccuracyLevel::Medium => params.medium,
            AccuracyLevel::Low => params.low,
        }
    };
    let counts: Vec<(AccuracyLevel, u32)> = [AccuracyLevel::High, AccuracyLevel::Medium, AccuracyLevel::Low]
        .into_iter()
        .map(|level| (level, sequence.iter().filter(|row| row.accuracy == level).count() as u32))
        .filter(|(_, n)| *n > 0)
        .collect();
    let levels = counts.iter().map(|&(level, _)| {
        let p = level_params(level);
        (
            level,
            Staircase::new(p.starting_intensity_s, p.starting_sd_s, p.target_p, p.guess_rate, 0.0, span),
        )
    });
    let mut pool = StaircasePool::new(levels);
    for (level, n) in counts {
        pool.set_budget(level, n);
    }
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use mid_traits::CueKind;

    #[test]
    fn study_params_round_trip_from_config_default() {
        let cfg = mid_config::StudyParamsCfg::default();
        let params: StudyParams = (&cfg).into();
        assert!((params.tr_s - 2.0).abs() < f64::EPSILON);
        assert!((params.scanner_pulse_rate as f64 - 46.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sequence_row_converts_to_trial_plan_row() {
        let row = mid_config::SequenceRow {
            cue_type: mid_config::CueTypeToml::Gain,
            target_accuracy: 80,
            n_iti: 2,
        };
        let plan: TrialPlanRow = row.into();
        assert_eq!(plan.cue_kind, CueKind::Gain);
        assert_eq!(plan.accuracy, AccuracyLevel::High);
        assert_eq!(plan.n_iti, 2);
    }

    #[test]
    fn staircase_pool_only_contains_levels_present_in_sequence() {
        let params = StaircaseParams::from(&mid_config::StaircaseCfg::default());
        let study = StudyParams::from(&mid_config::StudyParamsCfg::default());
        let sequence = vec![TrialPlanRow {
            cue_kind: CueKind::Gain,
            accuracy: AccuracyLevel::High,
            n_iti: 1,
        }];
        let mut pool = build_staircase_pool(&params, &study, &sequence);
        assert_eq!(pool.trial_n(AccuracyLevel::High), 0);
        pool.next_intensity(AccuracyLevel::High);
        pool.add_response(AccuracyLevel::High, true);
        assert_eq!(pool.trial_n(AccuracyLevel::High), 1);
    }
}
