//! Terminal-based `Renderer`/`InputSource` pair.
//!
//! The engine is display-toolkit-agnostic (see `mid_traits`); nothing in
//! `SPEC_FULL.md` names a windowing library, so the CLI drives stimuli as
//! plain lines on the controlling terminal and reads single keypresses in
//! raw mode rather than pulling in a GUI stack the run never otherwise needs.

use std::io::{stdout, Write};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{cursor, execute, terminal};
use mid_traits::{InputSource, KeyEvent, Renderer, Stimulus};

/// Renders stimuli as a single redrawn line, paced to a fixed frame rate.
pub struct TerminalRenderer {
    frame_period: Duration,
    last_flip: Instant,
    pending: String,
}

impl TerminalRenderer {
    pub fn new(frame_rate_hz: f64) -> eyre::Result<Self> {
        enable_raw_mode()?;
        Ok(Self {
            frame_period: Duration::from_secs_f64(1.0 / frame_rate_hz.max(1.0)),
            last_flip: Instant::now(),
            pending: String::new(),
        })
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

fn stimulus_line(stimulus: Stimulus) -> String {
    match stimulus {
        Stimulus::Cue { cue_kind, target_accuracy } => {
            format!("CUE  {cue_kind:?} (target accuracy {target_accuracy}%)")
        }
        Stimulus::Fixation => "+".to_string(),
        Stimulus::Target => "RESPOND".to_string(),
        Stimulus::Feedback { hit, reward_outcome } => {
            format!("{} {reward_outcome}", if hit { "HIT " } else { "MISS" })
        }
        Stimulus::Instructions => "Press the response key for each target as quickly as you can.".to_string(),
        Stimulus::Wait => "Waiting for scanner...".to_string(),
        Stimulus::End => "Thank you!".to_string(),
    }
}

impl Renderer for TerminalRenderer {
    fn draw(&mut self, stimulus: Stimulus) {
        self.pending = stimulus_line(stimulus);
    }

    fn flip(&mut self) {
        let mut out = stdout();
        let _ = execute!(out, cursor::MoveToColumn(0), terminal::Clear(terminal::ClearType::CurrentLine));
        let _ = write!(out, "{}", self.pending);
        let _ = out.flush();

        let target = self.last_flip + self.frame_period;
        let now = Instant::now();
        if target > now {
            std::thread::sleep(target - now);
        }
        self.last_flip = Instant::now();
    }
}

/// Reads keypresses in raw mode, timestamped against a resettable clock.
pub struct TerminalInputSource {
    clock_origin: Instant,
}

impl TerminalInputSource {
    pub fn new() -> Self {
        Self { clock_origin: Instant::now() }
    }

    fn key_name(code: KeyCode) -> Option<String> {
        match code {
            KeyCode::Char(c) => Some(c.to_string()),
            KeyCode::Esc => Some("escape".to_string()),
            _ => None,
        }
    }
}

impl Default for TerminalInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for TerminalInputSource {
    fn poll(&mut self) -> Vec<KeyEvent> {
        let mut events = Vec::new();
        while event::poll(Duration::from_secs(0)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if let Some(key) = Self::key_name(k.code) {
                    let timestamp_s = self.clock_origin.elapsed().as_secs_f64();
                    events.push(KeyEvent { key, timestamp_s });
                }
            }
        }
        events
    }

    fn clear_pending(&mut self) {
        while event::poll(Duration::from_secs(0)).unwrap_or(false) {
            let _ = event::read();
        }
    }

    fn reset_clock(&mut self) {
        self.clock_origin = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mid_traits::CueKind;

    #[test]
    fn stimulus_line_labels_cue_with_accuracy() {
        let line = stimulus_line(Stimulus::Cue {
            cue_kind: CueKind::Gain,
            target_accuracy: 80,
        });
        assert!(line.contains("Gain"));
        assert!(line.contains("80"));
    }

    #[test]
    fn stimulus_line_marks_hit_and_miss_feedback() {
        let hit = stimulus_line(Stimulus::Feedback { hit: true, reward_outcome: "+$1.00" });
        let miss = stimulus_line(Stimulus::Feedback { hit: false, reward_outcome: "$0.00" });
        assert!(hit.starts_with("HIT"));
        assert!(miss.starts_with("MISS"));
    }

    #[test]
    fn key_name_maps_char_and_escape() {
        assert_eq!(TerminalInputSource::key_name(KeyCode::Char('7')), Some("7".to_string()));
        assert_eq!(TerminalInputSource::key_name(KeyCode::Esc), Some("escape".to_string()));
        assert_eq!(TerminalInputSource::key_name(KeyCode::Backspace), None);
    }
}
