//! Termination signal handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::ledger::QuotaLedger;

/// Owns the run's cancellation token and forces a ledger flush when the host
/// asks the process to stop.
pub struct LifecycleGuard {
    token: CancellationToken,
    ledger: Arc<QuotaLedger>,
    triggered: AtomicBool,
}

impl LifecycleGuard {
    pub fn new(ledger: Arc<QuotaLedger>) -> Arc<Self> {
        Arc::new(Self {
            token: CancellationToken::new(),
            ledger,
            triggered: AtomicBool::new(false),
        })
    }

    /// Token handed to the controller.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Stop new dequeues and persist the ledger. Only the first call acts;
    /// returns whether this call did.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }

        self.token.cancel();
        match self.ledger.flush() {
            Ok(()) => info!("Ledger flushed after termination signal"),
            Err(e) => error!(error = %e, "Failed to flush ledger on termination"),
        }
        true
    }

    /// Listen for Ctrl+C and SIGTERM. First signal triggers the guard, a second
    /// Ctrl+C exits immediately. The task ends on its own once the token is
    /// cancelled by anyone else.
    pub fn install(self: &Arc<Self>) -> JoinHandle<()> {
        let guard = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = guard.token.cancelled() => return,
                _ = termination_signal() => {}
            }

            warn!("Termination signal received, finishing in-flight pages");
            eprintln!("Press Ctrl+C again to force quit");
            guard.trigger();

            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nForce quit requested, exiting immediately...");
                std::process::exit(130);
            }
        })
    }
}

async fn termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
