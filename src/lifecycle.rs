use log::{error, info};
use std::io;
use std::sync::Arc;

use actix_web::{dev::Server, web};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::{AppConfig, SwitchRole};
use crate::error::AppError;
use crate::gpio::GpioBackend;
use crate::state::SharedState;
use crate::switch::{LoopExit, SwitchRegistry};

/// Registers one monitor per configured switch, in pin order. Power switches
/// drive `is_on`, change switches only flag a change on either edge.
pub fn wire_switches<B: GpioBackend>(
    registry: &SwitchRegistry<B>,
    config: &AppConfig,
    state: &Arc<SharedState>,
) -> Result<(), AppError> {
    let mut pins: Vec<_> = config.switches.iter().collect();
    pins.sort_by_key(|(pin_id, _)| **pin_id);

    for (pin_id, switch) in pins {
        let on_state = Arc::clone(state);
        let off_state = Arc::clone(state);

        match switch.role {
            SwitchRole::Power => registry.register(
                *pin_id,
                move || on_state.apply_transition(true),
                move || off_state.apply_transition(false),
            )?,
            SwitchRole::Change => registry.register(
                *pin_id,
                move || on_state.mark_changed(),
                move || off_state.mark_changed(),
            )?,
        }
    }

    Ok(())
}

pub fn log_exit(exit: &LoopExit) {
    match &exit.result {
        Ok(()) => info!("{} stopped", exit.unit),
        Err(e) => error!("{} terminated: {e}", exit.unit),
    }
}

async fn next_exit(exits: &mut Option<UnboundedReceiver<LoopExit>>) -> Option<LoopExit> {
    match exits {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Serves until an interrupt arrives or the server dies, logging every loop
/// that exits in the meantime. Then stops the loops and the server and waits
/// for both.
pub async fn run_until_shutdown<B: GpioBackend + 'static>(
    registry: Arc<SwitchRegistry<B>>,
    server: Server,
) -> io::Result<()> {
    let handle = server.handle();
    let mut server_task = actix_web::rt::spawn(server);
    let mut exits = registry.exit_events();

    let server_result = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Shutting down...");
                break None;
            }
            Some(exit) = next_exit(&mut exits) => log_exit(&exit),
            result = &mut server_task => {
                error!("HTTP server exited unexpectedly");
                break Some(result);
            }
        }
    };

    registry.shutdown_all();
    if server_result.is_none() {
        handle.stop(true).await;
    }

    let joiner = Arc::clone(&registry);
    web::block(move || joiner.join_all())
        .await
        .map_err(io::Error::other)?;

    if let Some(rx) = exits.as_mut() {
        while let Ok(exit) = rx.try_recv() {
            log_exit(&exit);
        }
    }

    match server_result {
        Some(result) => result.map_err(io::Error::other)?,
        None => server_task.await.map_err(io::Error::other)?,
    }
}
