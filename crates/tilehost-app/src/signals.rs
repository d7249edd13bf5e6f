//! Process signals translated into controller input.
//!
//! `SIGHUP` reloads; `SIGINT` and `SIGTERM` terminate without draining. On
//! platforms without Unix signals only Ctrl-C is observed.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::reload::ControlSignal;

/// Capacity of the control channel; signals beyond it wait for the controller.
pub const SIGNAL_BUFFER: usize = 8;

/// Install signal handlers and forward them to `tx` until a terminate signal is
/// sent or the controller goes away.
///
/// # Errors
///
/// Returns [`crate::AppError::Signals`] when a handler cannot be installed.
#[cfg(unix)]
pub fn spawn_signal_listener(tx: mpsc::Sender<ControlSignal>) -> AppResult<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    use crate::error::AppError;

    let mut hangup = signal(SignalKind::hangup())
        .map_err(|err| AppError::signals("signals.hangup", err))?;
    let mut interrupt = signal(SignalKind::interrupt())
        .map_err(|err| AppError::signals("signals.interrupt", err))?;
    let mut terminate = signal(SignalKind::terminate())
        .map_err(|err| AppError::signals("signals.terminate", err))?;

    Ok(tokio::spawn(async move {
        loop {
            let signal = tokio::select! {
                Some(()) = hangup.recv() => ControlSignal::Reload,
                Some(()) = interrupt.recv() => ControlSignal::Terminate,
                Some(()) = terminate.recv() => ControlSignal::Terminate,
                else => break,
            };
            if !forward(&tx, signal).await {
                break;
            }
        }
    }))
}

/// Install the Ctrl-C handler and forward it to `tx`.
///
/// # Errors
///
/// Never fails on this platform; the signature matches the Unix variant.
#[cfg(not(unix))]
pub fn spawn_signal_listener(tx: mpsc::Sender<ControlSignal>) -> AppResult<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            forward(&tx, ControlSignal::Terminate).await;
        }
    }))
}

/// Send one signal. Returns whether the listener should keep running.
async fn forward(tx: &mpsc::Sender<ControlSignal>, signal: ControlSignal) -> bool {
    info!(?signal, "control signal received");
    if tx.send(signal).await.is_err() {
        debug!("controller stopped; signal dropped");
        return false;
    }
    signal != ControlSignal::Terminate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwarding_stops_after_terminate() {
        let (tx, mut rx) = mpsc::channel(SIGNAL_BUFFER);
        assert!(forward(&tx, ControlSignal::Reload).await);
        assert!(!forward(&tx, ControlSignal::Terminate).await);
        assert_eq!(rx.recv().await, Some(ControlSignal::Reload));
        assert_eq!(rx.recv().await, Some(ControlSignal::Terminate));
    }

    #[tokio::test]
    async fn forwarding_stops_when_the_controller_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert!(!forward(&tx, ControlSignal::Reload).await);
    }
}
