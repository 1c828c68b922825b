use log::{debug, error, info};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::analog::{AnalogInput, AnalogLedBridge, PwmOutput};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::gpio::{Bias, Edge, EdgeDetector, GpioBackend, InputLine};

/// Zero-argument action invoked on a switch transition.
pub type SwitchCallback = Box<dyn Fn() + Send + 'static>;

/// Cooperative stop flag shared by every loop of a registry.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Raises the signal. Returns `false` if it was already raised.
    pub fn stop(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopUnit {
    Switch(u32),
    AnalogBridge,
}

impl fmt::Display for LoopUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopUnit::Switch(pin_id) => write!(f, "switch monitor on pin {pin_id}"),
            LoopUnit::AnalogBridge => write!(f, "analog led bridge"),
        }
    }
}

/// Reported once by every loop when it exits. `Ok` means it observed the stop
/// signal, `Err` carries the hardware error or callback panic that ended it.
#[derive(Debug)]
pub struct LoopExit {
    pub unit: LoopUnit,
    pub result: Result<(), AppError>,
}

pub struct SwitchMonitor<L: InputLine> {
    pin_id: u32,
    line: L,
    on_callback: SwitchCallback,
    off_callback: SwitchCallback,
    interval: Duration,
}

impl<L: InputLine> SwitchMonitor<L> {
    pub fn new(
        pin_id: u32,
        line: L,
        on_callback: SwitchCallback,
        off_callback: SwitchCallback,
        interval: Duration,
    ) -> Self {
        Self {
            pin_id,
            line,
            on_callback,
            off_callback,
            interval,
        }
    }

    /// Polls until `stop` is raised or the line fails. The pin is pulled up,
    /// so low means the switch is closed: high→low fires `on`, low→high
    /// fires `off`.
    pub fn run(mut self, stop: &StopSignal) -> Result<(), AppError> {
        let mut detector = EdgeDetector::new();

        while !stop.is_stopped() {
            let level = self.line.read_level()?;
            match detector.sample(level) {
                Some(Edge::Falling) => {
                    debug!("pin {} closed", self.pin_id);
                    (self.on_callback)();
                }
                Some(Edge::Rising) => {
                    debug!("pin {} opened", self.pin_id);
                    (self.off_callback)();
                }
                None => {}
            }
            thread::sleep(self.interval);
        }

        Ok(())
    }
}

/// Owns every background loop, starts them and stops them together.
pub struct SwitchRegistry<B: GpioBackend> {
    config: Arc<AppConfig>,
    backend: Arc<B>,
    stop: StopSignal,
    handles: Mutex<Vec<(LoopUnit, JoinHandle<()>)>>,
    exit_tx: mpsc::UnboundedSender<LoopExit>,
    exit_rx: Mutex<Option<mpsc::UnboundedReceiver<LoopExit>>>,
}

impl<B: GpioBackend> SwitchRegistry<B> {
    pub fn new(config: Arc<AppConfig>, backend: Arc<B>) -> Self {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();

        Self {
            config,
            backend,
            stop: StopSignal::default(),
            handles: Mutex::new(Vec::new()),
            exit_tx,
            exit_rx: Mutex::new(Some(exit_rx)),
        }
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Takes the receiver of loop exit events. Only the first call gets it.
    pub fn exit_events(&self) -> Option<mpsc::UnboundedReceiver<LoopExit>> {
        self.exit_rx.lock().take()
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validates `pin_id`, requests the line with a pull-up bias and starts
    /// its monitor thread. Nothing is started when an error is returned.
    pub fn register<F, G>(&self, pin_id: u32, on_callback: F, off_callback: G) -> Result<(), AppError>
    where
        F: Fn() + Send + 'static,
        G: Fn() + Send + 'static,
    {
        if self.stop.is_stopped() {
            return Err(AppError::InvalidState(format!(
                "cannot register pin {pin_id} after shutdown"
            )));
        }
        let pin = self
            .config
            .switches
            .get(&pin_id)
            .ok_or_else(|| AppError::NotFoundPin(pin_id.to_string()))?;

        let line = self.backend.request_input(pin_id, pin, Bias::PullUp)?;
        let monitor = SwitchMonitor::new(
            pin_id,
            line,
            Box::new(on_callback),
            Box::new(off_callback),
            self.config.poll_interval(),
        );

        self.spawn_unit(LoopUnit::Switch(pin_id), move |stop| monitor.run(stop))?;
        info!("Monitoring switch '{}' on pin {pin_id}", pin.name);

        Ok(())
    }

    pub fn start_bridge<A, P>(&self, bridge: AnalogLedBridge<A, P>) -> Result<(), AppError>
    where
        A: AnalogInput + 'static,
        P: PwmOutput + 'static,
    {
        if self.stop.is_stopped() {
            return Err(AppError::InvalidState(
                "cannot start analog bridge after shutdown".into(),
            ));
        }

        self.spawn_unit(LoopUnit::AnalogBridge, move |stop| bridge.run(stop))?;
        info!("Analog led bridge started");

        Ok(())
    }

    fn spawn_unit<F>(&self, unit: LoopUnit, body: F) -> Result<(), AppError>
    where
        F: FnOnce(&StopSignal) -> Result<(), AppError> + Send + 'static,
    {
        let stop = self.stop.clone();
        let exit_tx = self.exit_tx.clone();
        let name = match unit {
            LoopUnit::Switch(pin_id) => format!("switch-{pin_id}"),
            LoopUnit::AnalogBridge => "analog-bridge".to_string(),
        };

        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| body(&stop)))
                    .unwrap_or_else(|payload| {
                        Err(AppError::Runtime(format!(
                            "{unit} panicked: {}",
                            panic_message(payload.as_ref())
                        )))
                    });
                let _ = exit_tx.send(LoopExit { unit, result });
            })
            .map_err(|e| AppError::Runtime(format!("spawn {unit}: {e}")))?;

        self.handles.lock().push((unit, handle));
        Ok(())
    }

    /// Raises the stop signal for every loop. Each loop exits at its next
    /// poll. Returns `false` when shutdown had already been requested.
    pub fn shutdown_all(&self) -> bool {
        let first = self.stop.stop();
        if first {
            info!("Stopping {} background loops", self.len());
        }
        first
    }

    /// Waits for every loop thread to finish. Only returns once the loops
    /// have observed the stop signal or failed.
    pub fn join_all(&self) {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for (unit, handle) in handles {
            if handle.join().is_err() {
                error!("{unit} panicked");
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl<B: GpioBackend> Drop for SwitchRegistry<B> {
    fn drop(&mut self) {
        self.stop.stop();
        self.join_all();
    }
}
