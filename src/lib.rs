pub mod api;
pub mod cli;
pub mod clock;
pub mod config;
pub mod coordination;
pub mod coordinator;
pub mod destination;
pub mod directory;
pub mod domain;
pub mod error;
pub mod geo;
pub mod hub;
pub mod proximity;
pub mod simulator;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use coordination::{GracefulShutdown, ShutdownSignal, ShutdownToken};
pub use coordinator::{CoordinatorState, LocationCoordinator};
pub use destination::DestinationCoordinator;
pub use directory::{GroupDirectory, InMemoryDirectory};
pub use error::{ConvoyError, Result};
pub use hub::{BroadcastHub, ConnectionId};
pub use proximity::{ProximityEngine, ProximityEvent, ProximityKind};
pub use simulator::{MovementSimulator, SimulatorHandle, TickReport};
pub use store::GeoStore;
