//! Data models for the Taskboard backend.
//!
//! Field names serialize as camelCase to match the JSON API.

mod membership;
mod note;
mod project;
mod task;
mod user;

pub use membership::*;
pub use note::*;
pub use project::*;
pub use task::*;
pub use user::*;

use serde::{Deserialize, Deserializer};

/// Deserialize a field where absent means "keep" and `null` means "clear".
///
/// Pair with `#[serde(default)]` so an absent field stays `None`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
