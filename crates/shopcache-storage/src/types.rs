//! Entity types stored in the backing store and mirrored in the cache.

use serde::{Deserialize, Serialize};

/// A shop record.
///
/// The id is optional because callers may build a `Shop` before it has been
/// persisted; the update path rejects shops without one. Field names are
/// serialized in camelCase, which is the form stored in cache entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<i64>,
    /// Comma-separated image URLs.
    #[serde(default)]
    pub images: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub address: String,
    /// Longitude.
    #[serde(default)]
    pub x: f64,
    /// Latitude.
    #[serde(default)]
    pub y: f64,
    /// Average price in cents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<i64>,
    #[serde(default)]
    pub sold: i32,
    #[serde(default)]
    pub comments: i32,
    /// Rating times ten, e.g. 47 for 4.7.
    #[serde(default)]
    pub score: i32,
    /// Opening hours, e.g. "10:00-22:00".
    #[serde(default)]
    pub open_hours: String,
}

impl Shop {
    /// Creates a shop with an id and a name; other attributes are defaulted.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            ..Self::default()
        }
    }
}
