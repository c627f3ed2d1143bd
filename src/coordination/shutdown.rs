//! Graceful shutdown
//!
//! The requested signal lives in a `watch` channel, so a token created after
//! the request still observes it. `execute` runs the post-signal phases with
//! per-phase deadlines; an urgent request halves them.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM or Ctrl+C
    Graceful,
    /// SIGQUIT
    Urgent,
}

impl ShutdownSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Graceful => "graceful",
            Self::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Deadline for the in-flight simulator tick
    pub simulator_grace: Duration,
    /// Deadline for dropping hub subscribers
    pub connection_grace: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            simulator_grace: Duration::from_secs(10),
            connection_grace: Duration::from_secs(5),
        }
    }
}

impl ShutdownConfig {
    /// Deadlines to use for a given signal
    pub fn for_signal(&self, signal: ShutdownSignal) -> Self {
        match signal {
            ShutdownSignal::Graceful => self.clone(),
            ShutdownSignal::Urgent => Self {
                simulator_grace: self.simulator_grace / 2,
                connection_grace: self.connection_grace / 2,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    StoppingSimulator,
    ClosingConnections,
    Complete,
}

impl ShutdownPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::StoppingSimulator => "stopping_simulator",
            Self::ClosingConnections => "closing_connections",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type ShutdownStep = Pin<Box<dyn Future<Output = ()> + Send>>;

pub struct GracefulShutdown {
    config: ShutdownConfig,
    requested: watch::Sender<Option<ShutdownSignal>>,
    phase: watch::Sender<ShutdownPhase>,
}

impl GracefulShutdown {
    pub fn new(config: ShutdownConfig) -> Self {
        Self {
            config,
            requested: watch::channel(None).0,
            phase: watch::channel(ShutdownPhase::Running).0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ShutdownConfig::default())
    }

    pub fn requested_signal(&self) -> Option<ShutdownSignal> {
        *self.requested.borrow()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.requested_signal().is_some()
    }

    pub fn current_phase(&self) -> ShutdownPhase {
        *self.phase.borrow()
    }

    /// First request wins; later ones are logged and dropped
    pub fn request_shutdown(&self, signal: ShutdownSignal) {
        let accepted = self.requested.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(signal);
            true
        });

        if accepted {
            info!(%signal, "shutdown requested");
        } else {
            warn!(%signal, "shutdown already requested, ignoring duplicate signal");
        }
    }

    fn enter(&self, phase: ShutdownPhase) {
        self.phase.send_replace(phase);
        info!(%phase, "shutdown phase");
    }

    /// Stop the simulator, then close subscriber connections. A step that
    /// overruns its deadline is abandoned and the sequence carries on.
    pub async fn execute(&self, stop_simulator: ShutdownStep, close_connections: ShutdownStep) {
        let started = Instant::now();
        let signal = self.requested_signal().unwrap_or(ShutdownSignal::Graceful);
        let deadlines = self.config.for_signal(signal);

        self.enter(ShutdownPhase::StoppingSimulator);
        match tokio::time::timeout(deadlines.simulator_grace, stop_simulator).await {
            Ok(()) => debug!("simulator stopped"),
            Err(_) => error!(
                grace = ?deadlines.simulator_grace,
                "simulator did not stop in time"
            ),
        }

        self.enter(ShutdownPhase::ClosingConnections);
        if tokio::time::timeout(deadlines.connection_grace, close_connections)
            .await
            .is_err()
        {
            warn!(grace = ?deadlines.connection_grace, "connection close timed out");
        }

        self.enter(ShutdownPhase::Complete);
        info!(%signal, elapsed = ?started.elapsed(), "graceful shutdown completed");
    }

    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            requested: self.requested.subscribe(),
            phase: self.phase.subscribe(),
        }
    }
}

/// Handed to long-running tasks that must stop on shutdown
pub struct ShutdownToken {
    requested: watch::Receiver<Option<ShutdownSignal>>,
    phase: watch::Receiver<ShutdownPhase>,
}

impl ShutdownToken {
    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.borrow().is_some()
    }

    /// Resolves once shutdown has been requested, immediately if it already
    /// was. Cancel safe.
    pub async fn wait_for_shutdown(&mut self) -> ShutdownSignal {
        loop {
            let current = *self.requested.borrow_and_update();
            if let Some(signal) = current {
                return signal;
            }
            if self.requested.changed().await.is_err() {
                // Owner dropped without a request
                return ShutdownSignal::Urgent;
            }
        }
    }

    pub fn current_phase(&self) -> ShutdownPhase {
        *self.phase.borrow()
    }
}

/// Spawn listeners that turn OS signals into shutdown requests
pub async fn install_signal_handlers(shutdown: Arc<GracefulShutdown>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        for (kind, name, mapped) in [
            (SignalKind::terminate(), "SIGTERM", ShutdownSignal::Graceful),
            (SignalKind::quit(), "SIGQUIT", ShutdownSignal::Urgent),
        ] {
            let shutdown = shutdown.clone();
            match signal(kind) {
                Ok(mut stream) => {
                    tokio::spawn(async move {
                        if stream.recv().await.is_some() {
                            info!(signal = name, "received OS signal");
                            shutdown.request_shutdown(mapped);
                        }
                    });
                }
                Err(e) => error!(signal = name, error = %e, "failed to install handler"),
            }
        }
    }

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!(signal = "SIGINT", "received OS signal");
                shutdown.request_shutdown(ShutdownSignal::Graceful);
            }
            Err(e) => error!(error = %e, "failed to install Ctrl+C handler"),
        }
    });
}
