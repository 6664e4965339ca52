use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Run-wide cancellation flag.
///
/// Clones share the same state. Once cancelled a token stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender lives as long as any clone of the token, so this is unreachable.
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancels `token` on SIGINT or SIGTERM.
///
/// The listeners are registered before this returns, so a signal arriving
/// while the task is still unscheduled is not lost.
#[cfg(unix)]
pub fn install_signal_handlers(token: CancelToken) -> JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = listen(signal(SignalKind::interrupt()), "SIGINT");
    let mut terminate = listen(signal(SignalKind::terminate()), "SIGTERM");

    tokio::spawn(async move {
        tokio::select! {
            _ = recv(interrupt.as_mut()) => {},
            _ = recv(terminate.as_mut()) => {},
            _ = token.cancelled() => return,
        }
        info!("Shutdown signal received, cancelling run");
        token.cancel();
    })
}

/// Cancels `token` on Ctrl+C.
#[cfg(not(unix))]
pub fn install_signal_handlers(token: CancelToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = token.cancelled() => return,
        }
        info!("Shutdown signal received, cancelling run");
        token.cancel();
    })
}

#[cfg(unix)]
fn listen(
    registered: std::io::Result<tokio::signal::unix::Signal>,
    name: &str,
) -> Option<tokio::signal::unix::Signal> {
    match registered {
        Ok(stream) => Some(stream),
        Err(err) => {
            warn!(signal = name, error = %err, "Failed to listen for signal");
            None
        }
    }
}

/// Waits for the next delivery, or forever without a listener.
#[cfg(unix)]
async fn recv(stream: Option<&mut tokio::signal::unix::Signal>) {
    match stream {
        Some(stream) => {
            stream.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}
