//! Lenient deserialization helpers for legacy document shapes.
//!
//! Older topologies frequently stored numeric values as strings
//! (`"vcpus": "2"`), so numeric fields accept either form.

use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

/// Deserialize a `u32` from either a JSON number or a numeric string.
///
/// Empty strings decode as `0`.
pub fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => u32::try_from(n).map_err(de::Error::custom),
        NumberOrString::Text(s) if s.trim().is_empty() => Ok(0),
        NumberOrString::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}
