//! Public URL construction shared by listings, TileJSON and style documents.

use axum::http::{HeaderMap, header};
use serde::Deserialize;
use tilehost_config::TileAlias;

/// Header reverse proxies use to report the client-facing scheme.
pub const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// `?key=` query parameter passed through to every generated URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyQuery {
    /// Access key supplied by the client.
    #[serde(default)]
    pub key: Option<String>,
}

impl KeyQuery {
    /// Suffix to append to generated URLs.
    #[must_use]
    pub fn suffix(&self) -> String {
        key_suffix(self.key.as_deref())
    }
}

/// Scheme, host and optional prefix that generated URLs start with.
///
/// `public_url` wins when configured; otherwise the request's `Host` header and
/// `X-Forwarded-Proto` (default `http`) are used.
#[must_use]
pub fn request_base_url(headers: &HeaderMap, public_url: Option<&str>) -> String {
    if let Some(url) = public_url {
        return url.trim_end_matches('/').to_string();
    }
    let proto = headers
        .get(FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("{proto}://{host}")
}

/// Query suffix carrying an access key through to generated URLs.
#[must_use]
pub fn key_suffix(key: Option<&str>) -> String {
    match key.filter(|key| !key.is_empty()) {
        Some(key) => format!("?key={}", urlencoding::encode(key)),
        None => String::new(),
    }
}

/// Extension used in tile URLs for a tile format, honoring `tileAlias`.
#[must_use]
pub fn tile_extension<'a>(format: &'a str, alias: &'a TileAlias) -> &'a str {
    match (format, alias.pbf.as_deref()) {
        ("pbf", Some(alias)) if !alias.is_empty() => alias,
        _ => format,
    }
}

/// `{base}{namespace}/{id}/{z}/{x}/{y}.{ext}{key}` template for one tile set.
#[must_use]
pub fn tile_url_template(base: &str, namespace: &str, id: &str, ext: &str, key: &str) -> String {
    format!("{base}{namespace}/{id}/{{z}}/{{x}}/{{y}}.{ext}{key}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn base_url_prefers_public_url() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("internal:8080"));
        assert_eq!(
            request_base_url(&headers, Some("https://tiles.example.com/")),
            "https://tiles.example.com"
        );
        assert_eq!(request_base_url(&headers, None), "http://internal:8080");

        headers.insert(FORWARDED_PROTO, HeaderValue::from_static("https, http"));
        assert_eq!(request_base_url(&headers, None), "https://internal:8080");
    }

    #[test]
    fn templates_carry_alias_and_key() {
        let alias = TileAlias {
            pbf: Some("mvt".into()),
        };
        let ext = tile_extension("pbf", &alias);
        assert_eq!(ext, "mvt");
        assert_eq!(tile_extension("png", &alias), "png");
        let template = tile_url_template(
            "http://localhost:8080",
            "/data",
            "world",
            ext,
            &key_suffix(Some("a b")),
        );
        assert_eq!(
            template,
            "http://localhost:8080/data/world/{z}/{x}/{y}.mvt?key=a%20b"
        );
        assert_eq!(key_suffix(Some("")), "");
        assert_eq!(key_suffix(Some("k=1&x/ü")), "?key=k%3D1%26x%2F%C3%BC");
        assert_eq!(key_suffix(Some("safe-_.~")), "?key=safe-_.~");
    }
}
