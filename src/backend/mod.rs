#[cfg(feature = "hardware-gpio")]
pub mod libgpiod;
pub mod mock;
#[cfg(feature = "hardware-rgb")]
pub mod rgb_hat;

#[cfg(feature = "hardware-gpio")]
pub use libgpiod::LibgpiodBackend;
pub use mock::{MockAdc, MockGpioBackend, MockPwm};
#[cfg(feature = "hardware-rgb")]
pub use rgb_hat::{Mcp3008, Pca9685};
