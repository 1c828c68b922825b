use std::path::PathBuf;

use libgpiod::{chip::Chip, line, request};

use crate::config::SwitchConfig;
use crate::error::AppError;
use crate::gpio::{Bias, GpioBackend, InputLine};

/// Requests input lines through the GPIO character device.
#[derive(Default)]
pub struct LibgpiodBackend;

impl LibgpiodBackend {
    pub fn new() -> Self {
        Self
    }

    fn make_line_settings(bias: Bias) -> Result<line::Settings, AppError> {
        let mut ls = line::Settings::new()
            .map_err(|e| AppError::Hardware(format!("libgpiod settings: {e}")))?;

        ls.set_direction(line::Direction::Input)
            .map_err(|e| AppError::Hardware(format!("set direction: {e}")))?;
        let bias = match bias {
            Bias::Floating => None,
            Bias::PullUp => Some(line::Bias::PullUp),
            Bias::PullDown => Some(line::Bias::PullDown),
        };
        ls.set_bias(bias)
            .map_err(|e| AppError::Hardware(format!("set bias: {e}")))?;

        Ok(ls)
    }

    fn make_line_config(offset: u32, settings: line::Settings) -> Result<line::Config, AppError> {
        let mut cfg =
            line::Config::new().map_err(|e| AppError::Hardware(format!("line config: {e}")))?;
        cfg.add_line_settings(&[offset], settings)
            .map_err(|e| AppError::Hardware(format!("line config add settings: {e}")))?;
        Ok(cfg)
    }

    fn open_chip(path: &str) -> Result<Chip, AppError> {
        let p = PathBuf::from(path);
        Chip::open(&p).map_err(|e| AppError::Hardware(format!("open chip {path}: {e}")))
    }

    fn request_lines(chip: &Chip, line_cfg: &line::Config) -> Result<request::Request, AppError> {
        let mut req_cfg = request::Config::new()
            .map_err(|e| AppError::Hardware(format!("request config: {e}")))?;
        req_cfg
            .set_consumer(env!("CARGO_PKG_NAME"))
            .map_err(|e| AppError::Hardware(format!("request consumer: {e}")))?;
        chip.request_lines(Some(&req_cfg), line_cfg)
            .map_err(|e| AppError::Hardware(format!("request lines: {e}")))
    }
}

impl GpioBackend for LibgpiodBackend {
    type Line = GpiodInputLine;

    fn request_input(
        &self,
        pin_id: u32,
        pin: &SwitchConfig,
        bias: Bias,
    ) -> Result<Self::Line, AppError> {
        let line_settings = Self::make_line_settings(bias)?;
        let line_cfg = Self::make_line_config(pin.line, line_settings)?;
        let chip = Self::open_chip(&pin.chip)?;
        let request = Self::request_lines(&chip, &line_cfg)?;

        Ok(GpiodInputLine {
            pin_id,
            offset: pin.line,
            request,
        })
    }
}

pub struct GpiodInputLine {
    pin_id: u32,
    offset: u32,
    request: request::Request,
}

impl InputLine for GpiodInputLine {
    fn read_level(&mut self) -> Result<bool, AppError> {
        let value = self
            .request
            .value(self.offset)
            .map_err(|e| AppError::Hardware(format!("get value of pin {}: {e}", self.pin_id)))?;
        Ok(match value {
            line::Value::InActive => false,
            line::Value::Active => true,
        })
    }
}
