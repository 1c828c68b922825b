use std::{collections::HashSet, fs, path::Path, time::Duration};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0:8080";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_PWM_FREQUENCY_HZ: f32 = 1525.0;

const ADC_CHANNEL_COUNT: u8 = 8;
const PWM_CHANNEL_COUNT: u8 = 16;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StatusFormat {
    /// `{is_on, change, red, green, blue}`
    #[default]
    Full,
    /// `{state_change}`
    ChangeOnly,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub format: StatusFormat,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            format: StatusFormat::Full,
        }
    }
}

/// What a switch means to the rest of the system.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchRole {
    /// Closing turns the system on, opening turns it off.
    Power,
    /// Either edge only flags that something changed.
    Change,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SwitchConfig {
    pub name: String,
    pub chip: String,
    pub line: u32,
    pub role: SwitchRole,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMap {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self {
            red: 0,
            green: 1,
            blue: 2,
        }
    }
}

impl ChannelMap {
    pub fn as_array(&self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }

    fn validate(&self, what: &str, limit: u8) -> Result<(), AppError> {
        let channels = self.as_array();
        if let Some(ch) = channels.iter().find(|ch| **ch >= limit) {
            return Err(AppError::Config(format!(
                "{what} channel {ch} out of range, must be below {limit}"
            )));
        }
        if channels.iter().collect::<HashSet<_>>().len() != channels.len() {
            return Err(AppError::Config(format!(
                "{what} channels must be distinct"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AdcConfig {
    pub bus: u8,
    pub slave_select: u8,
    pub clock_hz: u32,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            bus: 0,
            slave_select: 0,
            clock_hz: 1_350_000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PwmConfig {
    pub bus: u8,
    pub address: u16,
    pub frequency_hz: f32,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            bus: 1,
            address: 0x40,
            frequency_hz: DEFAULT_PWM_FREQUENCY_HZ,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct RgbConfig {
    pub adc: AdcConfig,
    pub pwm: PwmConfig,
    pub adc_channels: ChannelMap,
    pub pwm_channels: ChannelMap,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    pub switches: FxHashMap<u32, SwitchConfig>,
    #[serde(default)]
    pub rgb: Option<RgbConfig>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut switches = FxHashMap::default();
        switches.insert(
            17,
            SwitchConfig {
                name: "rgb change".into(),
                chip: "/dev/gpiochip0".into(),
                line: 17,
                role: SwitchRole::Change,
            },
        );
        switches.insert(
            18,
            SwitchConfig {
                name: "on/off".into(),
                chip: "/dev/gpiochip0".into(),
                line: 18,
                role: SwitchRole::Power,
            },
        );

        Self {
            http: HttpConfig::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            switches,
            rgb: Some(RgbConfig::default()),
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, AppError> {
        let config: Self = serde_json::from_str(contents)
            .map_err(|e| AppError::Config(format!("Invalid config json: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        if let Some(rgb) = &self.rgb {
            rgb.adc_channels.validate("adc", ADC_CHANNEL_COUNT)?;
            rgb.pwm_channels.validate("pwm", PWM_CHANNEL_COUNT)?;
            if !(rgb.pwm.frequency_hz > 0.0) {
                return Err(AppError::Config(
                    "pwm frequency_hz must be positive".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
