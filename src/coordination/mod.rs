//! Process lifecycle coordination
//!
//! Graceful shutdown shared by the simulator loop and the HTTP server.

pub mod shutdown;

pub use shutdown::{
    install_signal_handlers, GracefulShutdown, ShutdownConfig, ShutdownPhase, ShutdownSignal,
    ShutdownStep, ShutdownToken,
};
