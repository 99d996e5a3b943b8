//! Shutdown signalling between the watering loop and the outside world.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Run flags shared by a scheduler and every clone of its [`StopHandle`].
#[derive(Debug)]
struct RunState {
    running: AtomicBool,
    stop_sender: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct StopHandle {
    state: Arc<RunState>,
}

impl StopHandle {
    pub fn new() -> Self {
        let (stop_sender, _) = watch::channel(false);
        StopHandle {
            state: Arc::new(RunState {
                running: AtomicBool::new(false),
                stop_sender,
            }),
        }
    }

    /// Request the loop to stop after its current cycle. No-op when idle or
    /// when a stop is already pending.
    pub fn stop(&self) {
        if !self.is_running() {
            debug!("Stop requested while not running; ignoring");
            return;
        }
        let newly_requested = self.state.stop_sender.send_if_modified(|requested| {
            let changed = !*requested;
            *requested = true;
            changed
        });
        if newly_requested {
            info!("Stop requested; finishing current cycle");
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.state.stop_sender.borrow()
    }

    /// Marks the loop as running. Returns false if it already was.
    pub(crate) fn begin(&self) -> bool {
        if self
            .state
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.state.stop_sender.send_replace(false);
        true
    }

    pub(crate) fn finish(&self) {
        self.state.running.store(false, Ordering::SeqCst);
        self.state.stop_sender.send_replace(false);
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.stop_sender.subscribe()
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        StopHandle::new()
    }
}

/// SIGINT/SIGTERM listener that calls [`StopHandle::stop`]. Listening ends
/// when the guard is dropped.
pub struct SignalGuard {
    task: JoinHandle<()>,
}

impl SignalGuard {
    pub fn register(handle: StopHandle) -> SignalGuard {
        debug!("Installing signal handlers");
        SignalGuard {
            task: tokio::spawn(listen_for_signals(handle)),
        }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.task.abort();
        debug!("Signal handlers removed");
    }
}

async fn listen_for_signals(handle: StopHandle) {
    let mut terminate = terminate_signal();
    loop {
        let name = tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => "SIGINT",
                Err(e) => {
                    error!(error = %e, "Could not listen for SIGINT");
                    return;
                }
            },
            _ = recv_terminate(&mut terminate) => "SIGTERM",
        };
        info!(signal = name, "Signal received");
        handle.stop();
    }
}

#[cfg(unix)]
type TerminateSignal = Option<tokio::signal::unix::Signal>;
#[cfg(not(unix))]
type TerminateSignal = Option<()>;

#[cfg(unix)]
fn terminate_signal() -> TerminateSignal {
    use tokio::signal::unix::{signal, SignalKind};
    signal(SignalKind::terminate())
        .map_err(|e| warn!(error = %e, "Could not listen for SIGTERM"))
        .ok()
}

#[cfg(not(unix))]
fn terminate_signal() -> TerminateSignal {
    None
}

async fn recv_terminate(terminate: &mut TerminateSignal) {
    #[cfg(unix)]
    if let Some(signal) = terminate {
        // None means the stream is gone; wait for SIGINT only
        if signal.recv().await.is_some() {
            return;
        }
    }
    #[cfg(not(unix))]
    let _ = terminate;
    std::future::pending::<()>().await
}
