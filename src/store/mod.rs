//! In-memory authoritative position state

pub mod geospatial;

pub use geospatial::GeoStore;
