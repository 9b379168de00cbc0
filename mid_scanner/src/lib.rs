#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Scanner backend implementations.
//!
//! `EmulatedScanner` derives pulse counts from wall-clock time and requires
//! no hardware; it is the default and the only backend exercised in tests.
//! `HardwareScanner` (behind the `hardware` feature, Linux only) counts
//! rising edges on a GPIO pin wired to the scanner's TTL sync line.

pub mod error;

#[cfg(feature = "hardware")]
mod gpio_counter;
#[cfg(feature = "hardware")]
pub use gpio_counter::HardwareScanner;

use mid_traits::ScannerBackend;
use std::time::Instant;

/// Scanner backend that derives pulse counts from elapsed wall-clock time.
///
/// `read()` returns 0 until `start()` is called, then
/// `floor((now - start_time) / tr_s * pulse_rate)`, matching the emulated
/// variant's contract: a free-running, monotone pulse stream with no
/// hardware dependency.
pub struct EmulatedScanner {
    tr_s: f64,
    pulse_rate: u32,
    start_time: Option<Instant>,
}

impl EmulatedScanner {
    pub fn new(tr_s: f64, pulse_rate: u32) -> Self {
        Self {
            tr_s,
            pulse_rate,
            start_time: None,
        }
    }
}

impl ScannerBackend for EmulatedScanner {
    fn read(&self) -> u64 {
        match self.start_time {
            None => 0,
            Some(t0) => {
                let elapsed_s = t0.elapsed().as_secs_f64();
                ((elapsed_s / self.tr_s) * f64::from(self.pulse_rate)).floor() as u64
            }
        }
    }

    fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    fn pulse_rate(&self) -> u32 {
        self.pulse_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn reads_zero_before_start() {
        let scanner = EmulatedScanner::new(2.0, 46);
        assert_eq!(scanner.read(), 0);
    }

    #[test]
    fn pulse_rate_is_reported_unchanged() {
        let scanner = EmulatedScanner::new(2.0, 46);
        assert_eq!(scanner.pulse_rate(), 46);
    }

    #[test]
    fn advances_monotonically_after_start() {
        let mut scanner = EmulatedScanner::new(0.05, 10);
        scanner.start();
        let a = scanner.read();
        sleep(Duration::from_millis(120));
        let b = scanner.read();
        assert!(b >= a);
        assert!(b > 0);
    }
}
