//! Cache entry encoding for shops.
//!
//! Positive entries hold the JSON form of a [`Shop`]. Confirmed absence is
//! recorded with [`EMPTY_MARKER`], the empty string, which no JSON object
//! encoding can ever equal.

use shopcache_storage::Shop;

/// Sentinel value meaning "the backing store has no such shop".
pub const EMPTY_MARKER: &str = "";

/// What a raw cache read turned out to hold.
#[derive(Debug)]
pub enum CachedShop {
    /// A decoded positive entry.
    Hit(Shop),
    /// The empty marker: confirmed absent.
    Empty,
    /// No entry at all.
    Miss,
    /// An entry that is neither the marker nor a decodable shop.
    Corrupt(serde_json::Error),
}

/// Encode a shop for storage in the cache.
pub fn encode(shop: &Shop) -> Result<String, serde_json::Error> {
    serde_json::to_string(shop)
}

/// Decode a positive cache entry.
pub fn decode(raw: &str) -> Result<Shop, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Classify the result of a `GET` on a shop key.
pub fn classify(raw: Option<String>) -> CachedShop {
    match raw {
        None => CachedShop::Miss,
        Some(raw) if raw == EMPTY_MARKER => CachedShop::Empty,
        Some(raw) => match decode(&raw) {
            Ok(shop) => CachedShop::Hit(shop),
            Err(e) => CachedShop::Corrupt(e),
        },
    }
}
