use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::analog::{AnalogInput, PwmOutput};
use crate::config::SwitchConfig;
use crate::error::AppError;
use crate::gpio::{Bias, GpioBackend, InputLine};

/// In-memory GPIO with levels that can be changed from outside while a monitor
/// polls them.
#[derive(Default)]
pub struct MockGpioBackend {
    pins: Arc<RwLock<HashMap<u32, MockPinState>>>, // keyed by pin id
    requested: Mutex<Vec<u32>>,
}

#[derive(Clone, Copy)]
struct MockPinState {
    level: bool,
    fail: bool,
}

impl MockGpioBackend {
    pub fn set_level(&self, pin_id: u32, level: bool) {
        if let Ok(mut pins) = self.pins.write() {
            pins.entry(pin_id)
                .or_insert(MockPinState { level, fail: false })
                .level = level;
        }
    }

    /// Every later read of `pin_id` fails.
    pub fn fail_reads(&self, pin_id: u32) {
        if let Ok(mut pins) = self.pins.write() {
            pins.entry(pin_id)
                .or_insert(MockPinState {
                    level: true,
                    fail: false,
                })
                .fail = true;
        }
    }

    /// Pins handed out through [`GpioBackend::request_input`], in order.
    pub fn requested_pins(&self) -> Vec<u32> {
        self.requested
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl GpioBackend for MockGpioBackend {
    type Line = MockInputLine;

    fn request_input(
        &self,
        pin_id: u32,
        _pin: &SwitchConfig,
        bias: Bias,
    ) -> Result<Self::Line, AppError> {
        let mut pins = self
            .pins
            .write()
            .map_err(|e| AppError::Hardware(format!("lock poisoned: {e}")))?;

        // an unconnected pin settles to its bias
        pins.entry(pin_id).or_insert(MockPinState {
            level: bias == Bias::PullUp,
            fail: false,
        });
        self.requested
            .lock()
            .map_err(|e| AppError::Hardware(format!("lock poisoned: {e}")))?
            .push(pin_id);

        Ok(MockInputLine {
            pin_id,
            pins: Arc::clone(&self.pins),
        })
    }
}

pub struct MockInputLine {
    pin_id: u32,
    pins: Arc<RwLock<HashMap<u32, MockPinState>>>,
}

impl InputLine for MockInputLine {
    fn read_level(&mut self) -> Result<bool, AppError> {
        let pins = self
            .pins
            .read()
            .map_err(|e| AppError::Hardware(format!("lock poisoned: {e}")))?;
        let pin = pins
            .get(&self.pin_id)
            .ok_or_else(|| AppError::Hardware(format!("pin {} vanished", self.pin_id)))?;

        if pin.fail {
            return Err(AppError::Hardware(format!(
                "read pin {}: input/output error",
                self.pin_id
            )));
        }
        Ok(pin.level)
    }
}

/// Eight-channel ADC whose readings are set by the caller. Clones share state.
#[derive(Clone, Default)]
pub struct MockAdc {
    inner: Arc<Mutex<MockAdcState>>,
}

#[derive(Default)]
struct MockAdcState {
    raw: [u16; 8],
    fail: bool,
}

impl MockAdc {
    pub fn set_raw(&self, channel: u8, raw: u16) {
        if let Ok(mut adc) = self.inner.lock() {
            if let Some(slot) = adc.raw.get_mut(channel as usize) {
                *slot = raw;
            }
        }
    }

    pub fn fail_reads(&self) {
        if let Ok(mut adc) = self.inner.lock() {
            adc.fail = true;
        }
    }
}

impl AnalogInput for MockAdc {
    fn read_channel(&mut self, channel: u8) -> Result<u16, AppError> {
        let adc = self
            .inner
            .lock()
            .map_err(|e| AppError::Hardware(format!("lock poisoned: {e}")))?;
        if adc.fail {
            return Err(AppError::Hardware(format!(
                "read adc channel {channel}: spi transfer failed"
            )));
        }
        adc.raw
            .get(channel as usize)
            .copied()
            .ok_or_else(|| AppError::Hardware(format!("no adc channel {channel}")))
    }
}

/// Records every duty cycle written. Clones share state.
#[derive(Clone, Default)]
pub struct MockPwm {
    writes: Arc<Mutex<Vec<(u8, u16)>>>,
}

impl MockPwm {
    pub fn writes(&self) -> Vec<(u8, u16)> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Last duty cycle written to `channel`.
    pub fn duty(&self, channel: u8) -> Option<u16> {
        self.writes()
            .into_iter()
            .rev()
            .find(|(ch, _)| *ch == channel)
            .map(|(_, value)| value)
    }
}

impl PwmOutput for MockPwm {
    fn set_duty_cycle(&mut self, channel: u8, value: u16) -> Result<(), AppError> {
        self.writes
            .lock()
            .map_err(|e| AppError::Hardware(format!("lock poisoned: {e}")))?
            .push((channel, value));
        Ok(())
    }
}
