//! Test doubles for the three capability traits, used by `runner` and
//! `builder` tests and available to downstream crates' integration tests.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use mid_traits::{Clock, InputSource, KeyEvent, Renderer, ScannerBackend, Stimulus};

/// Deterministic clock whose time advances only when told to, shared by
/// `FakeRenderer::flip` (one frame per call) and `wait_for_*` poll loops.
#[derive(Clone)]
pub struct FakeClock {
    offset: Rc<Cell<Duration>>,
    origin: Instant,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            offset: Rc::new(Cell::new(Duration::ZERO)),
            origin: Instant::now(),
        }
    }

    pub fn advance(&self, d: Duration) {
        self.offset.set(self.offset.get() + d);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }
    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

/// Headless renderer that records every stimulus drawn and advances a
/// `FakeClock` by one frame interval on every `flip`, the way a real vsync
/// paces a phase's frame loop.
pub struct FakeRenderer {
    clock: FakeClock,
    frame: Duration,
    pub draws: Vec<String>,
    pub flips: u32,
}

impl FakeRenderer {
    pub fn new(clock: FakeClock, frame_rate_hz: f64) -> Self {
        Self {
            clock,
            frame: Duration::from_secs_f64(1.0 / frame_rate_hz),
            draws: Vec::new(),
            flips: 0,
        }
    }
}

impl Renderer for FakeRenderer {
    fn draw(&mut self, stimulus: Stimulus) {
        self.draws.push(format!("{stimulus:?}"));
    }

    fn flip(&mut self) {
        self.flips += 1;
        self.clock.advance(self.frame);
    }
}

/// Input source whose pending queue is only ever filled by test code calling
/// `inject`; never produces a spontaneous keypress.
pub struct FakeInputSource {
    clock: FakeClock,
    reset_at: Duration,
    pending: Vec<KeyEvent>,
}

impl FakeInputSource {
    pub fn new(clock: FakeClock) -> Self {
        Self {
            clock,
            reset_at: Duration::ZERO,
            pending: Vec::new(),
        }
    }

    /// Buffer a keypress timestamped against the RT clock's current epoch.
    pub fn inject(&mut self, key: &str) {
        let timestamp_s = self.clock.offset.get().saturating_sub(self.reset_at).as_secs_f64();
        self.pending.push(KeyEvent {
            key: key.to_string(),
            timestamp_s,
        });
    }
}

impl InputSource for FakeInputSource {
    fn poll(&mut self) -> Vec<KeyEvent> {
        std::mem::take(&mut self.pending)
    }
    fn clear_pending(&mut self) {
        self.pending.clear();
    }
    fn reset_clock(&mut self) {
        self.reset_at = self.clock.offset.get();
    }
}

/// Re-exports the emulated scanner backend as the test/self-check double for
/// `ScannerBackend`; no separate fake is needed since it requires no hardware.
pub fn fake_scanner(tr_s: f64, pulse_rate: u32) -> impl ScannerBackend {
    mid_scanner::EmulatedScanner::new(tr_s, pulse_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_renderer_advances_clock_on_flip() {
        let clock = FakeClock::new();
        let mut renderer = FakeRenderer::new(clock.clone(), 60.0);
        let before = clock.now();
        renderer.draw(Stimulus::Fixation);
        renderer.flip();
        assert!(clock.now() > before);
        assert_eq!(renderer.flips, 1);
        assert_eq!(renderer.draws.len(), 1);
    }

    #[test]
    fn fake_input_source_drains_injected_events() {
        let clock = FakeClock::new();
        let mut input = FakeInputSource::new(clock);
        input.inject("1");
        let events = input.poll();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, "1");
        assert!(input.poll().is_empty());
    }
}
