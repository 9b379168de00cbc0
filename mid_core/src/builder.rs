//! Type-state builder for `Engine`.
//!
//! The builder enforces at compile time that a renderer, input source, and
//! scanner backend are all provided before `build()` is available.
//! `try_build()` is always available for dynamic checks (the CLI uses it, so
//! a misconfigured run surfaces as a `BuildError` rather than a panic).

use std::marker::PhantomData;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use mid_traits::{Clock, InputSource, MonotonicClock, Renderer, ScannerBackend};
use rand::SeedableRng;

use crate::config::{StaircaseParams, StudyParams};
use crate::conversions::build_staircase_pool;
use crate::error::{BuildError, Result};
use crate::model::TrialPlanRow;
use crate::pulse_counter::PulseCounter;
use crate::runner::Engine;

pub struct Missing;
pub struct Set;

/// Builder for `Engine`. Chainable setters return `Self`; the three capability
/// setters advance the type-state so `build()` only compiles once all three
/// are provided.
pub struct EngineBuilder<R, I, Sc> {
    renderer: Option<Box<dyn Renderer>>,
    input: Option<Box<dyn InputSource>>,
    scanner: Option<Box<dyn ScannerBackend>>,
    clock: Option<Arc<dyn Clock>>,
    shutdown: Option<Arc<AtomicBool>>,
    study: Option<StudyParams>,
    staircase: Option<StaircaseParams>,
    sequence: Option<Vec<TrialPlanRow>>,
    subject_id: Option<String>,
    run_n: u32,
    fmri: bool,
    show_instructions: bool,
    frame_rate_hz: f64,
    _r: PhantomData<R>,
    _i: PhantomData<I>,
    _sc: PhantomData<Sc>,
}

impl Default for EngineBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            renderer: None,
            input: None,
            scanner: None,
            clock: None,
            shutdown: None,
            study: None,
            staircase: None,
            sequence: None,
            subject_id: None,
            run_n: 1,
            fmri: false,
            show_instructions: true,
            frame_rate_hz: 60.0,
            _r: PhantomData,
            _i: PhantomData,
            _sc: PhantomData,
        }
    }
}

impl EngineBuilder<Missing, Missing, Missing> {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Chainable setters that do not affect type-state.
impl<R, I, Sc> EngineBuilder<R, I, Sc> {
    pub fn with_study(mut self, study: StudyParams) -> Self {
        self.study = Some(study);
        self
    }
    pub fn with_staircase(mut self, staircase: StaircaseParams) -> Self {
        self.staircase = Some(staircase);
        self
    }
    pub fn with_sequence(mut self, sequence: Vec<TrialPlanRow>) -> Self {
        self.sequence = Some(sequence);
        self
    }
    pub fn with_subject_id(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }
    pub fn with_run_n(mut self, run_n: u32) -> Self {
        self.run_n = run_n;
        self
    }
    pub fn with_fmri(mut self, fmri: bool) -> Self {
        self.fmri = fmri;
        self
    }
    pub fn with_show_instructions(mut self, show: bool) -> Self {
        self.show_instructions = show;
        self
    }
    pub fn with_frame_rate_hz(mut self, hz: f64) -> Self {
        self.frame_rate_hz = hz;
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock`
    /// when not provided.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }
    /// Wire in a flag a SIGINT handler can set to request an orderly stop
    /// between trials. Defaults to a flag nobody ever sets.
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }
}

impl<I, Sc> EngineBuilder<Missing, I, Sc> {
    pub fn with_renderer(self, renderer: impl Renderer + 'static) -> EngineBuilder<Set, I, Sc> {
        EngineBuilder {
            renderer: Some(Box::new(renderer)),
            input: self.input,
            scanner: self.scanner,
            clock: self.clock,
            shutdown: self.shutdown,
            study: self.study,
            staircase: self.staircase,
            sequence: self.sequence,
            subject_id: self.subject_id,
            run_n: self.run_n,
            fmri: self.fmri,
            show_instructions: self.show_instructions,
            frame_rate_hz: self.frame_rate_hz,
            _r: PhantomData,
            _i: PhantomData,
            _sc: PhantomData,
        }
    }
}

impl<R, Sc> EngineBuilder<R, Missing, Sc> {
    pub fn with_input(self, input: impl InputSource + 'static) -> EngineBuilder<R, Set, Sc> {
        EngineBuilder {
            renderer: self.renderer,
            input: Some(Box::new(input)),
            scanner: self.scanner,
            clock: self.clock,
            shutdown: self.shutdown,
            study: self.study,
            staircase: self.staircase,
            sequence: self.sequence,
            subject_id: self.subject_id,
            run_n: self.run_n,
            fmri: self.fmri,
            show_instructions: self.show_instructions,
            frame_rate_hz: self.frame_rate_hz,
            _r: PhantomData,
            _i: PhantomData,
            _sc: PhantomData,
        }
    }
}

impl<R, I> EngineBuilder<R, I, Missing> {
    pub fn with_scanner(self, scanner: impl ScannerBackend + 'static) -> EngineBuilder<R, I, Set> {
        EngineBuilder {
            renderer: self.renderer,
            input: self.input,
            scanner: Some(Box::new(scanner)),
            clock: self.clock,
            shutdown: self.shutdown,
            study: self.study,
            staircase: self.staircase,
            sequence: self.sequence,
            subject_id: self.subject_id,
            run_n: self.run_n,
            fmri: self.fmri,
            show_instructions: self.show_instructions,
            frame_rate_hz: self.frame_rate_hz,
            _r: PhantomData,
            _i: PhantomData,
            _sc: PhantomData,
        }
    }
}

impl<R, I, Sc> EngineBuilder<R, I, Sc> {
    /// Fallible build available in any type-state; returns a descriptive
    /// error for whichever pieces are missing.
    pub fn try_build(self) -> Result<Engine> {
        let renderer = self.renderer.ok_or_else(|| eyre::Report::new(BuildError::MissingRenderer))?;
        let input = self.input.ok_or_else(|| eyre::Report::new(BuildError::MissingInputSource))?;
        let scanner = self.scanner.ok_or_else(|| eyre::Report::new(BuildError::MissingScanner))?;
        let sequence = self.sequence.ok_or_else(|| eyre::Report::new(BuildError::MissingSequence))?;
        if sequence.is_empty() {
            return Err(eyre::Report::new(BuildError::InvalidConfig("sequence must contain at least one trial")));
        }
        let subject_id = self
            .subject_id
            .ok_or_else(|| eyre::Report::new(BuildError::InvalidConfig("subject_id is required")))?;
        if self.frame_rate_hz <= 0.0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig("frame_rate_hz must be > 0")));
        }

        let study = self.study.unwrap_or(StudyParams::from(&mid_config::StudyParamsCfg::default()));
        let staircase = self.staircase.unwrap_or(StaircaseParams::from(&mid_config::StaircaseCfg::default()));
        let staircases = build_staircase_pool(&staircase, &study, &sequence);

        // Deterministic per `subject_id`: reruns with the same subject and
        // sequence reproduce the same jitters and first staircase samples.
        let seed = subject_id.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
        let rng = rand::rngs::SmallRng::seed_from_u64(seed);
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));

        Ok(Engine {
            renderer,
            input,
            pulse_counter: PulseCounter::new(scanner),
            clock,
            shutdown: self.shutdown,
            study,
            staircases,
            sequence,
            rng,
            subject_id,
            run_n: self.run_n,
            fmri: self.fmri,
            show_instructions: self.show_instructions,
            frame_rate_hz: self.frame_rate_hz,
        })
    }
}

impl EngineBuilder<Set, Set, Set> {
    /// Validate and build the `Engine`. Only available once a renderer,
    /// input source, and scanner backend are all set.
    pub fn build(self) -> Result<Engine> {
        self.try_build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{fake_scanner, FakeClock, FakeInputSource, FakeRenderer};
    use crate::model::AccuracyLevel;
    use mid_traits::CueKind;

    fn one_row_sequence() -> Vec<TrialPlanRow> {
        vec![TrialPlanRow {
            cue_kind: CueKind::Gain,
            accuracy: AccuracyLevel::High,
            n_iti: 1,
        }]
    }

    #[test]
    fn builder_requires_all_three_capabilities_and_a_sequence() {
        let clock = FakeClock::new();
        let engine = EngineBuilder::new()
            .with_renderer(FakeRenderer::new(clock.clone(), 60.0))
            .with_input(FakeInputSource::new(clock.clone()))
            .with_scanner(fake_scanner(2.0, 46))
            .with_clock(clock)
            .with_sequence(one_row_sequence())
            .with_subject_id("s01")
            .try_build();
        assert!(engine.is_ok());
    }

    #[test]
    fn try_build_without_sequence_is_a_build_error() {
        let clock = FakeClock::new();
        let result = EngineBuilder::new()
            .with_renderer(FakeRenderer::new(clock.clone(), 60.0))
            .with_input(FakeInputSource::new(clock.clone()))
            .with_scanner(fake_scanner(2.0, 46))
            .with_clock(clock)
            .with_subject_id("s01")
            .try_build();
        assert!(result.is_err());
    }
}
