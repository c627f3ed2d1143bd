pub mod group;
pub mod location;
pub mod system;

pub use group::*;
pub use location::*;
pub use system::*;

use crate::api::error::ApiError;

/// Unwrap a required request field or fail with 400
pub(crate) fn required<T>(value: Option<T>, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::missing(field))
}
