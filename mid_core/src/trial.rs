//! The trial state machine: one `run_trial` call drives a single trial plan
//! row through `cue -> fixation -> response -> outcome -> post-outcome-fixation* -> done`,
//! emitting one `PhaseRecord` per phase transition and one `TrialRecord` at
//! the end.
//!
//! Every wait in here (`PulseCounter::wait_for_tr`, the frame loops below)
//! blocks the calling thread. There is no background sampler: the engine is
//! cooperatively single-threaded, and a `Renderer::flip` is the only thing
//! that paces a phase's frame loop in a real run.

use std::time::Instant;

use mid_traits::{Clock, CueKind, InputSource, Renderer, ScannerBackend, Stimulus};
use rand::rngs::SmallRng;
use rand::Rng;

use crate::config::StudyParams;
use crate::model::{self, AccuracyLevel, PhaseRecord, TrialPlanRow, TrialRecord};
use crate::pulse_counter::PulseCounter;
use crate::staircase::StaircasePool;

/// Response keys, per the study's keyboard map. Navigation keys (forward,
/// back, start, end, escape) are a CLI/run-driver concern, not this layer's.
fn is_response_key(key: &str) -> bool {
    matches!(key, "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9" | "10")
}

fn elapsed_s(clock: &dyn Clock, since: Instant) -> f64 {
    clock.now().saturating_duration_since(since).as_secs_f64()
}

/// Everything one `run_trial` call needs, borrowed from the run driver.
pub struct TrialContext<'a, B: ScannerBackend, R: Renderer + ?Sized, I: InputSource + ?Sized> {
    pub study: &'a StudyParams,
    pub pulse_counter: &'a mut PulseCounter<B>,
    pub clock: &'a dyn Clock,
    pub renderer: &'a mut R,
    pub input: &'a mut I,
    pub staircases: &'a mut StaircasePool,
    pub rng: &'a mut SmallRng,
    /// Instant the run's global clock was reset, i.e. `time_onset_s`'s epoch.
    pub run_epoch: Instant,
    /// Running pulse count across the whole run; `PhaseRecord::pulse_ct` is
    /// monotone non-decreasing because this accumulator is never reset.
    pub pulse_ct_total: &'a mut u64,
    pub nominal_time_s: &'a mut f64,
    pub total_earned: &'a mut f64,
    pub subject_id: &'a str,
    pub run_n: u32,
}

/// Drive one trial through its five phases, returning its record and the
/// phase records emitted along the way (cue, fixation, response, outcome,
/// then one per ITI TR).
pub fn run_trial<B, R, I>(ctx: &mut TrialContext<'_, B, R, I>, trial_n: u32, plan: TrialPlanRow) -> (TrialRecord, Vec<PhaseRecord>)
where
    B: ScannerBackend,
    R: Renderer + ?Sized,
    I: InputSource + ?Sized,
{
    let mut phases = Vec::with_capacity(4 + plan.n_iti as usize);
    let trial_start = ctx.clock.now();
    let intensity = ctx.staircases.next_intensity(plan.accuracy);
    let mut tr_n = 0u32;

    let record_phase = |ctx: &mut TrialContext<'_, B, R, I>, phase: &'static str, tr_n: u32, delta: u64, phases: &mut Vec<PhaseRecord>| -> f64 {
        *ctx.pulse_ct_total = ctx.pulse_ct_total.saturating_add(delta);
        let phase_global_time = elapsed_s(ctx.clock, ctx.run_epoch);
        let phase_trial_time = elapsed_s(ctx.clock, trial_start);
        phases.push(PhaseRecord {
            trial_n,
            phase,
            tr_n,
            phase_global_time,
            phase_trial_time,
            pulse_ct: *ctx.pulse_ct_total,
        });
        phase_global_time
    };

    // CUE
    let delta = ctx.pulse_counter.drain();
    tr_n += 1;
    let time_onset_s = record_phase(ctx, "cue", tr_n, delta, &mut phases);
    let pulse_ct_at_onset = *ctx.pulse_ct_total;
    run_cue_phase(ctx.clock, ctx.renderer, plan.cue_kind, plan.accuracy.percent(), ctx.study.cue_dur_s);
    *ctx.nominal_time_s += ctx.study.cue_dur_s;

    // FIX
    let delta = ctx.pulse_counter.wait_for_tr(ctx.clock);
    tr_n += 1;
    record_phase(ctx, "fixation", tr_n, delta, &mut phases);
    let mut early_press = run_fix_phase(ctx.clock, ctx.renderer, ctx.input, ctx.study.fixation_dur_s);
    *ctx.nominal_time_s += ctx.study.fixation_dur_s;

    // RSP
    let delta = ctx.pulse_counter.wait_for_tr(ctx.clock);
    tr_n += 1;
    record_phase(ctx, "response", tr_n, delta, &mut phases);
    let jitter_s = if ctx.study.jitter_max_s > 0.0 {
        ctx.rng.gen_range(0.0..ctx.study.jitter_max_s)
    } else {
        0.0
    };
    let target_dur_s = ctx.study.min_target_dur_s + intensity;
    let rsp = run_rsp_phase(ctx.clock, ctx.renderer, ctx.input, jitter_s, target_dur_s, early_press, ctx.study.response_dur_s);
    early_press = rsp.early_press;
    let hit = rsp.hit;
    let rt_s = rsp.rt_s;
    *ctx.nominal_time_s += ctx.study.response_dur_s;

    ctx.staircases.add_response(plan.accuracy, hit);
    let staircase_trial_n = ctx.staircases.trial_n(plan.accuracy);
    let staircase_step_sd = ctx.staircases.posterior_sd(plan.accuracy);

    // OUT
    let delta = ctx.pulse_counter.wait_for_tr(ctx.clock);
    tr_n += 1;
    record_phase(ctx, "outcome", tr_n, delta, &mut phases);
    let reward_outcome = model::reward_outcome(plan.cue_kind, hit);
    let reward_delta = model::reward_delta(plan.cue_kind, hit);
    *ctx.total_earned += reward_delta;
    run_out_phase(ctx.clock, ctx.renderer, hit, reward_outcome, ctx.study.outcome_dur_s);
    *ctx.nominal_time_s += ctx.study.outcome_dur_s;

    // ITI (post-outcome fixation, one record per TR)
    for _ in 1..=plan.n_iti {
        let delta = ctx.pulse_counter.wait_for_tr(ctx.clock);
        tr_n += 1;
        record_phase(ctx, "post-outcome-fixation", tr_n, delta, &mut phases);
        let actual_time_s = elapsed_s(ctx.clock, ctx.run_epoch);
        let fix_dur_s = crate::scheduler::iti_fix_duration_s(ctx.study.iti_tr_dur_s, actual_time_s, *ctx.nominal_time_s);
        *ctx.nominal_time_s += ctx.study.iti_tr_dur_s;
        run_fixation_hold(ctx.clock, ctx.renderer, fix_dur_s);
    }

    let time_trial_end_s = elapsed_s(ctx.clock, ctx.run_epoch);
    let target_dur_ms = (target_dur_s * 1000.0).round() as u32;
    let record = TrialRecord {
        trial_n,
        trial_type: model::trial_type(plan.cue_kind, plan.accuracy),
        cue_kind: model::cue_kind_str(plan.cue_kind),
        reward_dollars: model::reward_dollars(plan.cue_kind),
        difficulty: plan.accuracy.difficulty(),
        accuracy_target: plan.accuracy.percent(),
        staircase_name: plan.accuracy.difficulty(),
        staircase_trial_n,
        staircase_step_sd,
        intensity_s: intensity,
        time_onset_s,
        jitter_ms: (jitter_s * 1000.0).round() as u32,
        target_dur_ms,
        early_press: u8::from(early_press),
        hit: u8::from(hit),
        rt_ms: rt_s.map(|s| s * 1000.0),
        reward_outcome,
        total_earned: *ctx.total_earned,
        time_trial_end_s,
        trial_dur_ms: ((time_trial_end_s - time_onset_s) * 1000.0).round() as u32,
        time_sched_end_s: *ctx.nominal_time_s,
        timing_drift_ms: (time_trial_end_s - *ctx.nominal_time_s) * 1000.0,
        total_trs: 4 + plan.n_iti,
        subject_id: ctx.subject_id.to_string(),
        run_n: ctx.run_n,
        pulse_ct_at_onset,
    };

    (record, phases)
}

fn run_cue_phase<R: Renderer + ?Sized>(clock: &dyn Clock, renderer: &mut R, cue_kind: CueKind, target_accuracy: u8, duration_s: f64) {
    let start = clock.now();
    while elapsed_s(clock, start) < duration_s {
        renderer.draw(Stimulus::Cue { cue_kind, target_accuracy });
        renderer.flip();
    }
}

/// Returns whether any response key arrived during the phase.
fn run_fix_phase<R: Renderer + ?Sized, I: InputSource + ?Sized>(clock: &dyn Clock, renderer: &mut R, input: &mut I, duration_s: f64) -> bool {
    let start = clock.now();
    let mut early_press = false;
    while elapsed_s(clock, start) < duration_s {
        renderer.draw(Stimulus::Fixation);
        renderer.flip();
        if input.poll().iter().any(|k| is_response_key(&k.key)) {
            early_press = true;
        }
    }
    early_press
}

fn run_out_phase<R: Renderer + ?Sized>(clock: &dyn Clock, renderer: &mut R, hit: bool, reward_outcome: &'static str, duration_s: f64) {
    let start = clock.now();
    while elapsed_s(clock, start) < duration_s {
        renderer.draw(Stimulus::Feedback { hit, reward_outcome });
        renderer.flip();
    }
}

/// Hold fixation for the drift-corrected duration of one ITI TR. `duration_s`
/// may be zero when drift has consumed the whole TR.
fn run_fixation_hold<R: Renderer + ?Sized>(clock: &dyn Clock, renderer: &mut R, duration_s: f64) {
    let start = clock.now();
    while elapsed_s(clock, start) < duration_s {
        renderer.draw(Stimulus::Fixation);
        renderer.flip();
    }
}

struct RspOutcome {
    early_press: bool,
    hit: bool,
    rt_s: Option<f64>,
}

/// The response phase: jitter, target onset with an atomic RT-clock-reset
/// and input-clear on the first vsync the target is visible, and the
/// scoring rules from the trial state machine's per-phase protocol.
fn run_rsp_phase<R: Renderer + ?Sized, I: InputSource + ?Sized>(
    clock: &dyn Clock,
    renderer: &mut R,
    input: &mut I,
    jitter_s: f64,
    target_dur_s: f64,
    mut early_press: bool,
    duration_s: f64,
) -> RspOutcome {
    let start = clock.now();
    let mut target_has_appeared = false;
    let mut target_visible = false;
    let mut scored = false;
    let mut hit = false;
    let mut rt_s = None;

    loop {
        let elapsed = elapsed_s(clock, start);
        if elapsed >= duration_s {
            break;
        }

        if !target_has_appeared {
            if elapsed < jitter_s {
                renderer.draw(Stimulus::Fixation);
                if input.poll().iter().any(|k| is_response_key(&k.key)) {
                    early_press = true;
                }
                renderer.flip();
                continue;
            }
            // First flip where elapsed >= jitter: reset the RT clock and
            // drop any input buffered before target onset on this same vsync.
            target_has_appeared = true;
            target_visible = true;
            renderer.draw(Stimulus::Target);
            renderer.flip_with_hook(&mut || {
                input.reset_clock();
                input.clear_pending();
            });
            continue;
        }

        if target_visible && elapsed >= jitter_s + target_dur_s {
            target_visible = false;
        }
        renderer.draw(if target_visible { Stimulus::Target } else { Stimulus::Fixation });

        if !scored && !early_press {
            if let Some(event) = input.poll().into_iter().find(|k| is_response_key(&k.key)) {
                rt_s = Some(event.timestamp_s);
                hit = target_visible;
                scored = true;
            }
        }

        renderer.flip();
    }

    if early_press {
        hit = false;
        rt_s = None;
    }

    RspOutcome { early_press, hit, rt_s }
}
