mod analog;
mod backend;
mod config;
mod error;
mod gpio;
pub mod lifecycle;
mod routes;
mod state;
mod switch;

pub use analog::{
    ADC_MAX_RAW, AnalogInput, AnalogLedBridge, PWM_MAX_DUTY, PwmOutput, RgbLevels, drive_leds,
    duty_from_percent, percent_from_raw,
};
pub use config::{
    AdcConfig, AppConfig, ChannelMap, HttpConfig, PwmConfig, RgbConfig, StatusFormat,
    SwitchConfig, SwitchRole,
};
pub use error::AppError;
pub use gpio::{Bias, Edge, EdgeDetector, GpioBackend, InputLine};
pub use routes::{AppState, STATUS_PATH};
pub use state::{SharedState, SwitchSnapshot};
pub use switch::{LoopExit, LoopUnit, StopSignal, SwitchCallback, SwitchMonitor, SwitchRegistry};

#[cfg(feature = "hardware-gpio")]
pub use backend::LibgpiodBackend;
pub use backend::{MockAdc, MockGpioBackend, MockPwm};
#[cfg(feature = "hardware-rgb")]
pub use backend::{Mcp3008, Pca9685};
