//! Payloads returned by the listing endpoints and problem documents.

use serde::Serialize;

/// RFC9457 problem document.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short, constant summary.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Request-specific explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Request identifier of the failing request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// One entry of `/styles.json`.
#[derive(Debug, Clone, Serialize)]
pub struct StyleListing {
    /// Style document schema version.
    pub version: u32,
    /// Style name.
    pub name: String,
    /// Style id.
    pub id: String,
    /// Absolute URL of the served style document.
    pub url: String,
}

/// `TileJSON` document for a rendered tile set or raw archive.
#[derive(Debug, Clone, Serialize)]
pub struct TileJson<'a, T: Serialize> {
    /// `TileJSON` spec version.
    pub tilejson: &'static str,
    /// Registry id.
    pub id: &'a str,
    /// Tile URL templates.
    pub tiles: Vec<String>,
    /// Descriptor fields (name, format, zoom range, ...).
    #[serde(flatten)]
    pub info: &'a T,
}
