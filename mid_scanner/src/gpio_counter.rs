//! Hardware scanner backend: counts rising edges on a GPIO pin wired to the
//! scanner's TTL sync output.

use mid_traits::ScannerBackend;
use rppal::gpio::{Gpio, InputPin, Trigger};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Result, ScannerError};

/// Counts scanner TR pulses via a GPIO rising-edge interrupt.
///
/// `start()` is a no-op: the interrupt handler is armed at construction and
/// runs for the lifetime of the pin, matching real scanners which emit
/// pulses independent of any software-side "start" signal.
pub struct HardwareScanner {
    _pin: InputPin,
    count: Arc<AtomicU64>,
    pulse_rate: u32,
}

impl HardwareScanner {
    pub fn open(gpio_line: u8, pulse_rate: u32) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| ScannerError::Unavailable(e.to_string()))?;
        let mut pin = gpio
            .get(gpio_line)
            .map_err(|e| ScannerError::Unavailable(e.to_string()))?
            .into_input_pulldown();

        let count = Arc::new(AtomicU64::new(0));
        let count_for_isr = Arc::clone(&count);
        pin.set_async_interrupt(Trigger::RisingEdge, None, move |_event| {
            count_for_isr.fetch_add(1, Ordering::SeqCst);
        })
        .map_err(|e| ScannerError::Gpio(e.to_string()))?;

        Ok(Self {
            _pin: pin,
            count,
            pulse_rate,
        })
    }
}

impl ScannerBackend for HardwareScanner {
    fn read(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    fn start(&mut self) {}

    fn pulse_rate(&self) -> u32 {
        self.pulse_rate
    }
}
