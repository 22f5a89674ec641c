use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Create a connected stop handle / signal pair.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(Arc::new(tx)), StopSignal(rx))
}

/// Requests the pipeline to stop taking new frames. Cloneable; stopping is
/// idempotent.
#[derive(Clone)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
}

/// Observed by the pipeline at tick boundaries.
#[derive(Clone)]
pub struct StopSignal(watch::Receiver<bool>);

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once a stop has been requested. Pends forever if every
    /// handle is dropped without stopping.
    pub async fn stopped(&mut self) {
        let observed = self.0.wait_for(|stopped| *stopped).await.map(|_| ());
        if observed.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Stop the pipeline on the first Ctrl-C.
pub fn stop_on_ctrl_c(handle: StopHandle) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, finishing in-flight submissions");
                handle.stop();
            }
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
        }
    });
}
