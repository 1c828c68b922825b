use log::info;
use std::io;
use std::path::Path;
use std::sync::Arc;

use actix_web::middleware::{NormalizePath, TrailingSlash};
use actix_web::{App, HttpServer, web};

use switchctl::{AppConfig, AppError, AppState, SharedState, SwitchRegistry, lifecycle};

#[cfg(feature = "hardware-gpio")]
use switchctl::LibgpiodBackend;
#[cfg(not(feature = "hardware-gpio"))]
use switchctl::MockGpioBackend;
#[cfg(feature = "hardware-rgb")]
use switchctl::{AnalogLedBridge, GpioBackend, Mcp3008, Pca9685};

const DEFAULT_CONFIG_PATH: &str = "config.json";

fn load_config() -> Result<AppConfig, AppError> {
    let explicit = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SWITCHCTL_CONFIG").ok());

    match explicit {
        Some(path) => AppConfig::load_from_file(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            AppConfig::load_from_file(DEFAULT_CONFIG_PATH)
        }
        None => {
            info!("No {DEFAULT_CONFIG_PATH} found, using the built-in switch layout");
            Ok(AppConfig::default())
        }
    }
}

#[cfg(feature = "hardware-rgb")]
fn start_rgb<B: GpioBackend>(
    registry: &SwitchRegistry<B>,
    config: &AppConfig,
    state: &Arc<SharedState>,
) -> Result<(), AppError> {
    let Some(rgb) = &config.rgb else {
        return Ok(());
    };

    let bridge = AnalogLedBridge::new(
        Mcp3008::new(&rgb.adc)?,
        Pca9685::new(&rgb.pwm)?,
        Arc::clone(state),
        rgb.adc_channels,
        rgb.pwm_channels,
        config.poll_interval(),
    );
    registry.start_bridge(bridge)
}

#[cfg(not(feature = "hardware-rgb"))]
fn start_rgb<B: switchctl::GpioBackend>(
    _registry: &SwitchRegistry<B>,
    config: &AppConfig,
    _state: &Arc<SharedState>,
) -> Result<(), AppError> {
    if config.rgb.is_some() {
        log::warn!("rgb section ignored, built without the hardware-rgb feature");
    }
    Ok(())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let config = Arc::new(load_config().map_err(io::Error::other)?);

    let backend = {
        #[cfg(feature = "hardware-gpio")]
        {
            Arc::new(LibgpiodBackend::new())
        }
        #[cfg(not(feature = "hardware-gpio"))]
        {
            log::warn!("Built without hardware-gpio, switches read from the mock backend");
            Arc::new(MockGpioBackend::default())
        }
    };

    let state = Arc::new(SharedState::new());
    let registry = SwitchRegistry::new(config.clone(), backend);

    lifecycle::wire_switches(&registry, &config, &state).map_err(io::Error::other)?;
    start_rgb(&registry, &config, &state).map_err(io::Error::other)?;

    let app_state = AppState::new(state, config.http.format);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(NormalizePath::new(TrailingSlash::Always))
            .app_data(web::Data::new(app_state.clone()))
            .service(app_state.status_resource())
    })
    .disable_signals()
    .bind(&config.http.host)?
    .run();

    info!("Starting server on {}...", config.http.host);

    lifecycle::run_until_shutdown(Arc::new(registry), server).await
}
