pub mod destination;
pub mod event;
pub mod ids;
pub mod position;

pub use destination::*;
pub use event::*;
pub use ids::*;
pub use position::*;
