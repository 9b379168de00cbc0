#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Capability traits that define the hardware, rendering, and time abstractions
//! used by the trial engine.
//!
//! - `ScannerBackend` is an abstract source of monotonically increasing scanner
//!   pulse counts, with hardware and emulated variants.
//! - `Renderer` draws named stimuli and performs a vsync flip.
//! - `InputSource` returns timestamped keypresses and owns a resettable RT clock.
//! - `clock` offers a `MonotonicClock` for deterministic timing and testability.
//!
//! `mid_core` depends only on these traits, keeping the trial state machine free
//! of any concrete display toolkit or DAQ library.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// One of the three cue categories a trial can present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CueKind {
    Gain,
    Loss,
    Neutral,
}

/// A named stimulus the renderer is asked to draw for one frame.
#[derive(Debug, Clone, Copy)]
pub enum Stimulus {
    Cue {
        cue_kind: CueKind,
        target_accuracy: u8,
    },
    Fixation,
    Target,
    Feedback { hit: bool, reward_outcome: &'static str },
    Instructions,
    Wait,
    End,
}

/// A capability that draws stimuli onto a presentation surface and flips the
/// display buffer. Implementations may be a real windowing/graphics backend
/// or a headless double used in tests.
pub trait Renderer {
    /// Draw one stimulus into the back buffer. Does not present it.
    fn draw(&mut self, stimulus: Stimulus);

    /// Present the back buffer, blocking until the next vsync.
    fn flip(&mut self);

    /// Flip, then synchronously invoke `hook` from the same vsync.
    ///
    /// Mirrors `win.callOnFlip(...)`: the default implementation runs `hook`
    /// immediately after `flip` returns so that timestamps taken inside `hook`
    /// are anchored to the frame that just became visible. Callers rely on
    /// this to reset the RT clock and drain pending input atomically with the
    /// first frame that shows the response target.
    fn flip_with_hook(&mut self, hook: &mut dyn FnMut()) {
        self.flip();
        hook();
    }
}

/// One keypress, timestamped against the input source's own RT clock.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    pub key: String,
    pub timestamp_s: f64,
}

/// A capability producing timestamped keypresses.
pub trait InputSource {
    /// Drain and return all keys that arrived since the last `poll` or `clear_pending`.
    /// Never blocks.
    fn poll(&mut self) -> Vec<KeyEvent>;

    /// Discard any buffered-but-unread events without returning them.
    fn clear_pending(&mut self);

    /// Reset the RT clock to zero. Subsequent `KeyEvent::timestamp_s` values
    /// are measured from this instant.
    fn reset_clock(&mut self);
}

/// Abstract source of monotonically increasing scanner pulse counts.
///
/// The hardware variant delegates `read` to an external DAQ counter channel;
/// the emulated variant derives pulse counts from wall-clock time so the
/// engine can run and be tested without a scanner attached.
pub trait ScannerBackend {
    /// Absolute, monotonically non-decreasing pulse count.
    fn read(&self) -> u64;

    /// Signal scan commencement. No-op for hardware; anchors the time origin
    /// for emulated backends.
    fn start(&mut self);

    /// Pulses per one TR.
    fn pulse_rate(&self) -> u32;
}

// Allow boxed trait objects to be used where a generic bound is expected.
impl<T: ?Sized + Renderer> Renderer for Box<T> {
    fn draw(&mut self, stimulus: Stimulus) {
        (**self).draw(stimulus);
    }
    fn flip(&mut self) {
        (**self).flip();
    }
    fn flip_with_hook(&mut self, hook: &mut dyn FnMut()) {
        (**self).flip_with_hook(hook);
    }
}

impl<T: ?Sized + InputSource> InputSource for Box<T> {
    fn poll(&mut self) -> Vec<KeyEvent> {
        (**self).poll()
    }
    fn clear_pending(&mut self) {
        (**self).clear_pending();
    }
    fn reset_clock(&mut self) {
        (**self).reset_clock();
    }
}

impl<T: ?Sized + ScannerBackend> ScannerBackend for Box<T> {
    fn read(&self) -> u64 {
        (**self).read()
    }
    fn start(&mut self) {
        (**self).start();
    }
    fn pulse_rate(&self) -> u32 {
        (**self).pulse_rate()
    }
}
