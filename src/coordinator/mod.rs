//! Coordination layer
//!
//! `LocationCoordinator` composes the geospatial store, proximity engine,
//! destination coordinator and broadcast hub under per-group locks. The
//! movement simulator shares the same `CoordinatorState`.

pub mod coordinator;
pub mod locks;
pub mod state;

pub use coordinator::LocationCoordinator;
pub use locks::{GroupLedger, GroupLocks};
pub use state::CoordinatorState;
