use std::thread;
use std::time::Duration;

use rppal::i2c::I2c;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

use crate::analog::{AnalogInput, PWM_MAX_DUTY, PwmOutput};
use crate::config::{AdcConfig, PwmConfig};
use crate::error::AppError;

const MCP3008_CHANNELS: u8 = 8;

/// MCP3008 10-bit ADC on a SPI bus.
pub struct Mcp3008 {
    spi: Spi,
}

impl Mcp3008 {
    pub fn new(cfg: &AdcConfig) -> Result<Self, AppError> {
        let spi = Spi::new(
            spi_bus(cfg.bus)?,
            slave_select(cfg.slave_select)?,
            cfg.clock_hz,
            Mode::Mode0,
        )
        .map_err(|e| AppError::Hardware(format!("open spi{}: {e}", cfg.bus)))?;

        Ok(Self { spi })
    }
}

impl AnalogInput for Mcp3008 {
    fn read_channel(&mut self, channel: u8) -> Result<u16, AppError> {
        if channel >= MCP3008_CHANNELS {
            return Err(AppError::InvalidArgument(format!(
                "mcp3008 has no channel {channel}"
            )));
        }

        // start bit, single-ended mode + channel, clock out the result
        let write = [0x01, (0x08 | channel) << 4, 0x00];
        let mut read = [0u8; 3];
        self.spi
            .transfer(&mut read, &write)
            .map_err(|e| AppError::Hardware(format!("read adc channel {channel}: {e}")))?;

        Ok((((read[1] & 0x03) as u16) << 8) | read[2] as u16)
    }
}

fn spi_bus(bus: u8) -> Result<Bus, AppError> {
    Ok(match bus {
        0 => Bus::Spi0,
        1 => Bus::Spi1,
        2 => Bus::Spi2,
        3 => Bus::Spi3,
        4 => Bus::Spi4,
        5 => Bus::Spi5,
        6 => Bus::Spi6,
        _ => return Err(AppError::Config(format!("unknown spi bus {bus}"))),
    })
}

fn slave_select(ss: u8) -> Result<SlaveSelect, AppError> {
    Ok(match ss {
        0 => SlaveSelect::Ss0,
        1 => SlaveSelect::Ss1,
        2 => SlaveSelect::Ss2,
        _ => return Err(AppError::Config(format!("unsupported slave select {ss}"))),
    })
}

const PCA9685_MODE1: u8 = 0x00;
const PCA9685_MODE2: u8 = 0x01;
const PCA9685_PRESCALE: u8 = 0xFE;
const PCA9685_LED0_ON_L: u8 = 0x06;
const PCA9685_ALL_LED_ON_L: u8 = 0xFA;

const MODE1_RESTART: u8 = 0x80;
const MODE1_SLEEP: u8 = 0x10;
const MODE1_ALLCALL: u8 = 0x01;
const MODE2_OUTDRV: u8 = 0x04;

const PCA9685_OSCILLATOR_HZ: f32 = 25_000_000.0;
const PCA9685_OSCILLATOR_SETTLE: Duration = Duration::from_millis(5);
const PCA9685_CHANNELS: u8 = 16;

/// PCA9685 16-channel 12-bit PWM controller on an I2C bus.
pub struct Pca9685 {
    i2c: I2c,
}

impl Pca9685 {
    /// Opens the controller, turns every channel off and sets the PWM
    /// frequency.
    pub fn new(cfg: &PwmConfig) -> Result<Self, AppError> {
        let mut i2c = I2c::with_bus(cfg.bus)
            .map_err(|e| AppError::Hardware(format!("open i2c{}: {e}", cfg.bus)))?;
        i2c.set_slave_address(cfg.address)
            .map_err(|e| AppError::Hardware(format!("i2c address {:#x}: {e}", cfg.address)))?;

        let mut pca = Self { i2c };
        pca.write_channel_registers(PCA9685_ALL_LED_ON_L, 0, 0)?;
        pca.write_register(PCA9685_MODE2, MODE2_OUTDRV)?;
        pca.write_register(PCA9685_MODE1, MODE1_ALLCALL)?;
        thread::sleep(PCA9685_OSCILLATOR_SETTLE);

        let mode1 = pca.read_register(PCA9685_MODE1)? & !MODE1_SLEEP;
        pca.write_register(PCA9685_MODE1, mode1)?;
        thread::sleep(PCA9685_OSCILLATOR_SETTLE);

        pca.set_frequency(cfg.frequency_hz)?;
        Ok(pca)
    }

    pub fn set_frequency(&mut self, frequency_hz: f32) -> Result<(), AppError> {
        let prescale = (PCA9685_OSCILLATOR_HZ / 4096.0 / frequency_hz - 1.0 + 0.5)
            .floor()
            .clamp(3.0, 255.0) as u8;

        let old_mode = self.read_register(PCA9685_MODE1)?;
        // prescale can only be changed while the oscillator sleeps
        self.write_register(PCA9685_MODE1, (old_mode & 0x7F) | MODE1_SLEEP)?;
        self.write_register(PCA9685_PRESCALE, prescale)?;
        self.write_register(PCA9685_MODE1, old_mode)?;
        thread::sleep(PCA9685_OSCILLATOR_SETTLE);
        self.write_register(PCA9685_MODE1, old_mode | MODE1_RESTART)
    }

    fn write_channel_registers(&mut self, base: u8, on: u16, off: u16) -> Result<(), AppError> {
        let [on_l, on_h] = on.to_le_bytes();
        let [off_l, off_h] = off.to_le_bytes();
        self.i2c
            .write(&[base, on_l, on_h, off_l, off_h])
            .map_err(|e| AppError::Hardware(format!("write pwm register {base:#x}: {e}")))?;
        Ok(())
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), AppError> {
        self.i2c
            .smbus_write_byte(register, value)
            .map_err(|e| AppError::Hardware(format!("write pwm register {register:#x}: {e}")))
    }

    fn read_register(&mut self, register: u8) -> Result<u8, AppError> {
        self.i2c
            .smbus_read_byte(register)
            .map_err(|e| AppError::Hardware(format!("read pwm register {register:#x}: {e}")))
    }
}

impl PwmOutput for Pca9685 {
    fn set_duty_cycle(&mut self, channel: u8, value: u16) -> Result<(), AppError> {
        if channel >= PCA9685_CHANNELS {
            return Err(AppError::InvalidArgument(format!(
                "pca9685 has no channel {channel}"
            )));
        }
        if value > PWM_MAX_DUTY {
            return Err(AppError::InvalidArgument(format!(
                "duty cycle {value} exceeds {PWM_MAX_DUTY}"
            )));
        }

        self.write_channel_registers(PCA9685_LED0_ON_L + 4 * channel, 0, value)
    }
}
