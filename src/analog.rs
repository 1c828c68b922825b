use log::debug;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::config::ChannelMap;
use crate::error::AppError;
use crate::state::{MAX_PERCENT, SharedState};
use crate::switch::StopSignal;

pub const ADC_MAX_RAW: u16 = 1023;
pub const PWM_MAX_DUTY: u16 = 4095;

const ADC_RESOLUTION: u32 = ADC_MAX_RAW as u32 + 1;

pub trait AnalogInput: Send {
    /// Raw 10-bit reading of `channel`.
    fn read_channel(&mut self, channel: u8) -> Result<u16, AppError>;
}

pub trait PwmOutput: Send {
    fn set_duty_cycle(&mut self, channel: u8, value: u16) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RgbLevels {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl RgbLevels {
    pub fn as_array(&self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }
}

/// `floor(raw / 1024 * 100)`, so full scale (1023) reads as 99.
pub fn percent_from_raw(raw: u16) -> Result<u8, AppError> {
    if raw > ADC_MAX_RAW {
        return Err(AppError::Hardware(format!(
            "adc reading {raw} exceeds {ADC_MAX_RAW}"
        )));
    }
    Ok((raw as u32 * 100 / ADC_RESOLUTION) as u8)
}

/// `round(4095 * percent / 100)`.
pub fn duty_from_percent(percent: u8) -> Result<u16, AppError> {
    if percent > MAX_PERCENT {
        return Err(AppError::InvalidArgument(format!(
            "percentage {percent} exceeds {MAX_PERCENT}"
        )));
    }
    Ok(((PWM_MAX_DUTY as u32 * percent as u32 + 50) / 100) as u16)
}

/// Writes all three duty cycles. Every percentage is checked before the first
/// write, so a bad value leaves the outputs as they were.
pub fn drive_leds<P: PwmOutput + ?Sized>(
    pwm: &mut P,
    channels: &ChannelMap,
    levels: RgbLevels,
) -> Result<(), AppError> {
    let duties = [
        duty_from_percent(levels.red)?,
        duty_from_percent(levels.green)?,
        duty_from_percent(levels.blue)?,
    ];

    for (channel, duty) in channels.as_array().into_iter().zip(duties) {
        pwm.set_duty_cycle(channel, duty)?;
    }
    Ok(())
}

/// Samples three potentiometers and mirrors them onto the LED channels.
pub struct AnalogLedBridge<A: AnalogInput, P: PwmOutput> {
    adc: A,
    pwm: P,
    state: Arc<SharedState>,
    adc_channels: ChannelMap,
    pwm_channels: ChannelMap,
    interval: Duration,
}

impl<A: AnalogInput, P: PwmOutput> AnalogLedBridge<A, P> {
    pub fn new(
        adc: A,
        pwm: P,
        state: Arc<SharedState>,
        adc_channels: ChannelMap,
        pwm_channels: ChannelMap,
        interval: Duration,
    ) -> Self {
        Self {
            adc,
            pwm,
            state,
            adc_channels,
            pwm_channels,
            interval,
        }
    }

    pub fn read_levels(&mut self) -> Result<RgbLevels, AppError> {
        Ok(RgbLevels {
            red: percent_from_raw(self.adc.read_channel(self.adc_channels.red)?)?,
            green: percent_from_raw(self.adc.read_channel(self.adc_channels.green)?)?,
            blue: percent_from_raw(self.adc.read_channel(self.adc_channels.blue)?)?,
        })
    }

    /// One sample: read, store, drive.
    pub fn step(&mut self) -> Result<RgbLevels, AppError> {
        let levels = self.read_levels()?;
        self.state
            .write_analog_levels(levels.red, levels.green, levels.blue)?;
        drive_leds(&mut self.pwm, &self.pwm_channels, levels)?;
        Ok(levels)
    }

    pub fn run(mut self, stop: &StopSignal) -> Result<(), AppError> {
        let mut last = None;

        while !stop.is_stopped() {
            let levels = self.step()?;
            if last != Some(levels) {
                debug!(
                    "rgb levels r={} g={} b={}",
                    levels.red, levels.green, levels.blue
                );
                last = Some(levels);
            }
            thread::sleep(self.interval);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockAdc, MockPwm};

    #[test]
    fn raw_readings_floor_to_percent() {
        let percents: Vec<u8> = [0u16, 512, 1023]
            .into_iter()
            .map(|raw| percent_from_raw(raw).unwrap())
            .collect();

        assert_eq!(percents, vec![0, 50, 99]);
    }

    #[test]
    fn raw_reading_above_ten_bits_is_hardware_error() {
        assert!(matches!(percent_from_raw(1024), Err(AppError::Hardware(_))));
    }

    #[test]
    fn duty_cycle_rounds() {
        assert_eq!(duty_from_percent(0).unwrap(), 0);
        assert_eq!(duty_from_percent(100).unwrap(), 4095);
        assert_eq!(duty_from_percent(50).unwrap(), 2048);
        assert_eq!(duty_from_percent(1).unwrap(), 41);
        assert_eq!(duty_from_percent(99).unwrap(), 4054);
        for p in 0..=100u8 {
            let expected = (4095.0 * p as f64 / 100.0).round() as u16;
            assert_eq!(duty_from_percent(p).unwrap(), expected, "p={p}");
        }
    }

    #[test]
    fn invalid_percentage_writes_nothing() {
        let mut pwm = MockPwm::default();
        let err = drive_leds(
            &mut pwm,
            &ChannelMap::default(),
            RgbLevels {
                red: 10,
                green: 20,
                blue: 101,
            },
        )
        .unwrap_err();

        assert!(matches!(err, AppError::InvalidArgument(_)));
        assert!(pwm.writes().is_empty());
    }

    #[test]
    fn step_updates_state_and_pwm() {
        let adc = MockAdc::default();
        adc.set_raw(0, 0);
        adc.set_raw(1, 512);
        adc.set_raw(2, 1023);
        let pwm = MockPwm::default();
        let state = Arc::new(SharedState::new());
        state.apply_transition(true);
        state.read_and_reset_change_flag();

        let mut bridge = AnalogLedBridge::new(
            adc,
            pwm.clone(),
            state.clone(),
            ChannelMap::default(),
            ChannelMap {
                red: 4,
                green: 5,
                blue: 6,
            },
            Duration::from_millis(1),
        );
        let levels = bridge.step().unwrap();

        assert_eq!(levels.as_array(), [0, 50, 99]);
        let snap = state.snapshot();
        assert_eq!((snap.red, snap.green, snap.blue), (0, 50, 99));
        assert!(!snap.change);
        assert_eq!(pwm.duty(4), Some(0));
        assert_eq!(pwm.duty(5), Some(2048));
        assert_eq!(pwm.duty(6), Some(4054));
    }

    #[test]
    fn adc_failure_stops_bridge() {
        let adc = MockAdc::default();
        adc.fail_reads();
        let bridge = AnalogLedBridge::new(
            adc,
            MockPwm::default(),
            Arc::new(SharedState::new()),
            ChannelMap::default(),
            ChannelMap::default(),
            Duration::from_millis(1),
        );

        let result = bridge.run(&StopSignal::default());
        assert!(matches!(result, Err(AppError::Hardware(_))));
    }
}
