//! Templating seam for the HTML and WMTS pages.
//!
//! Handlers build one of the page contexts below from the registry and hand it to
//! a [`PageTemplates`] implementation. [`BasicPages`] is the built-in one.

use std::fmt::Write as _;

use tilehost_core::TileSetInfo;

/// A style row of the front page.
#[derive(Debug, Clone)]
pub struct IndexStyle {
    /// Style id.
    pub id: String,
    /// Style name.
    pub name: String,
    /// Absolute URL of the style document.
    pub style_url: String,
    /// Whether rendered tiles are served for the style.
    pub rendered: bool,
}

/// An archive row of the front page.
#[derive(Debug, Clone)]
pub struct IndexArchive {
    /// Archive id.
    pub id: String,
    /// Archive name.
    pub name: String,
    /// Tile format.
    pub format: String,
    /// Absolute URL of the archive's `TileJSON`.
    pub tilejson_url: String,
}

/// Context of the front page.
#[derive(Debug, Clone)]
pub struct IndexPage {
    /// Served styles in registry order.
    pub styles: Vec<IndexStyle>,
    /// Served archives in registry order.
    pub archives: Vec<IndexArchive>,
    /// `?key=` suffix to append to links.
    pub key: String,
}

/// Context of `/styles/{id}/`.
#[derive(Debug, Clone)]
pub struct StylePage {
    /// Style id.
    pub id: String,
    /// Style name.
    pub name: String,
    /// Absolute URL of the style document.
    pub style_url: String,
}

/// Context of `/mbtiles/{id}/`.
#[derive(Debug, Clone)]
pub struct ArchivePage {
    /// Archive id.
    pub id: String,
    /// Archive metadata.
    pub info: TileSetInfo,
    /// Absolute URL of the archive's `TileJSON`.
    pub tilejson_url: String,
}

/// Context of `/styles/{id}/wmts.xml`.
#[derive(Debug, Clone)]
pub struct WmtsPage {
    /// Style id.
    pub id: String,
    /// Tile set metadata.
    pub info: TileSetInfo,
    /// Edge length of one rendered tile in pixels.
    pub tile_size: u16,
    /// Resource URL template using WMTS placeholders.
    pub tile_url: String,
    /// Absolute URL of the capabilities document itself.
    pub capabilities_url: String,
}

/// Page templating collaborator.
pub trait PageTemplates: Send + Sync {
    /// Front page listing styles and archives.
    fn index(&self, page: &IndexPage) -> String;
    /// Viewer page for one style.
    fn style(&self, page: &StylePage) -> String;
    /// Inspector page for one raw archive.
    fn archive(&self, page: &ArchivePage) -> String;
    /// WMTS capabilities document for one rendered style.
    fn wmts(&self, page: &WmtsPage) -> String;
}

/// Minimal built-in templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicPages;

const WEB_MERCATOR_SCALE_ZERO: f64 = 559_082_264.028_717_8;
const WORLD_EXTENT: [f64; 4] = [-180.0, -85.051_128_78, 180.0, 85.051_128_78];

impl PageTemplates for BasicPages {
    fn index(&self, page: &IndexPage) -> String {
        let mut body = String::from("<h1>Tile host</h1>\n<h2>Styles</h2>\n<ul>\n");
        for style in &page.styles {
            let _ = writeln!(
                body,
                r#"<li><a href="/styles/{id}/{key}">{name}</a> (<a href="{url}">style.json</a>{wmts})</li>"#,
                id = escape(&style.id),
                key = escape(&page.key),
                name = escape(&style.name),
                url = escape(&style.style_url),
                wmts = if style.rendered {
                    format!(
                        r#", <a href="/styles/{}/wmts.xml{}">WMTS</a>"#,
                        escape(&style.id),
                        escape(&page.key)
                    )
                } else {
                    String::new()
                },
            );
        }
        body.push_str("</ul>\n<h2>Data</h2>\n<ul>\n");
        for archive in &page.archives {
            let _ = writeln!(
                body,
                r#"<li><a href="/mbtiles/{id}/{key}">{name}</a> [{format}] (<a href="{url}">TileJSON</a>)</li>"#,
                id = escape(&archive.id),
                key = escape(&page.key),
                name = escape(&archive.name),
                format = escape(&archive.format),
                url = escape(&archive.tilejson_url),
            );
        }
        body.push_str("</ul>\n");
        document("Tile host", &body)
    }

    fn style(&self, page: &StylePage) -> String {
        let body = format!(
            "<h1>{name}</h1>\n<p>Style document: <a href=\"{url}\">{url}</a></p>\n",
            name = escape(&page.name),
            url = escape(&page.style_url),
        );
        document(&page.name, &body)
    }

    fn archive(&self, page: &ArchivePage) -> String {
        let info = &page.info;
        let mut body = format!(
            "<h1>{name}</h1>\n<dl>\n<dt>Id</dt><dd>{id}</dd>\n<dt>Format</dt><dd>{format}</dd>\n<dt>Zoom</dt><dd>{min}&ndash;{max}</dd>\n",
            name = escape(&info.name),
            id = escape(&page.id),
            format = escape(&info.format),
            min = info.minzoom,
            max = info.maxzoom,
        );
        if let Some(attribution) = &info.attribution {
            let _ = writeln!(body, "<dt>Attribution</dt><dd>{attribution}</dd>");
        }
        let _ = writeln!(
            body,
            "</dl>\n<p><a href=\"{url}\">TileJSON</a></p>",
            url = escape(&page.tilejson_url)
        );
        document(&info.name, &body)
    }

    fn wmts(&self, page: &WmtsPage) -> String {
        let info = &page.info;
        let [west, south, east, north] = info.bounds.unwrap_or(WORLD_EXTENT);
        let tile_size = page.tile_size.max(1);
        // Larger tiles cover the same extent with fewer pixels per metre.
        let scale_zero = WEB_MERCATOR_SCALE_ZERO * 256.0 / f64::from(tile_size);
        let mut matrices = String::new();
        for zoom in 0..=info.maxzoom {
            let size = 1_u64 << zoom.min(30);
            let _ = write!(
                matrices,
                "<TileMatrix><ows:Identifier>{zoom}</ows:Identifier><ScaleDenominator>{scale}</ScaleDenominator><TopLeftCorner>-20037508.34 20037508.34</TopLeftCorner><TileWidth>{tile_size}</TileWidth><TileHeight>{tile_size}</TileHeight><MatrixWidth>{size}</MatrixWidth><MatrixHeight>{size}</MatrixHeight></TileMatrix>",
                scale = scale_zero / f64::from(1_u32 << zoom.min(30)),
            );
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Capabilities xmlns="http://www.opengis.net/wmts/1.0" xmlns:ows="http://www.opengis.net/ows/1.1" xmlns:xlink="http://www.w3.org/1999/xlink" version="1.0.0">
<ows:ServiceIdentification><ows:Title>{title}</ows:Title><ows:ServiceType>OGC WMTS</ows:ServiceType><ows:ServiceTypeVersion>1.0.0</ows:ServiceTypeVersion></ows:ServiceIdentification>
<ows:OperationsMetadata><ows:Operation name="GetCapabilities"><ows:DCP><ows:HTTP><ows:Get xlink:href="{capabilities}"/></ows:HTTP></ows:DCP></ows:Operation></ows:OperationsMetadata>
<Contents>
<Layer><ows:Title>{title}</ows:Title><ows:Identifier>{id}</ows:Identifier><ows:WGS84BoundingBox><ows:LowerCorner>{west} {south}</ows:LowerCorner><ows:UpperCorner>{east} {north}</ows:UpperCorner></ows:WGS84BoundingBox><Style isDefault="true"><ows:Identifier>default</ows:Identifier></Style><Format>image/{format}</Format><TileMatrixSetLink><TileMatrixSet>GoogleMapsCompatible</TileMatrixSet></TileMatrixSetLink><ResourceURL format="image/{format}" resourceType="tile" template="{template}"/></Layer>
<TileMatrixSet><ows:Identifier>GoogleMapsCompatible</ows:Identifier><ows:SupportedCRS>urn:ogc:def:crs:EPSG::3857</ows:SupportedCRS>{matrices}</TileMatrixSet>
</Contents>
</Capabilities>
"#,
            title = escape(&info.name),
            id = escape(&page.id),
            capabilities = escape(&page.capabilities_url),
            format = escape(&info.format),
            template = escape(&page.tile_url),
        )
    }
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{body}</body>\n</html>\n",
        escape(title)
    )
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_escapes_names_and_links_rendered_styles() {
        let page = IndexPage {
            styles: vec![IndexStyle {
                id: "basic".into(),
                name: "Basic <v2>".into(),
                style_url: "http://h/styles/basic/style.json".into(),
                rendered: true,
            }],
            archives: vec![IndexArchive {
                id: "world".into(),
                name: "World".into(),
                format: "pbf".into(),
                tilejson_url: "http://h/data/world.json".into(),
            }],
            key: String::new(),
        };
        let html = BasicPages.index(&page);
        assert!(html.contains("Basic &lt;v2&gt;"));
        assert!(html.contains("/styles/basic/wmts.xml"));
        assert!(html.contains("/mbtiles/world/"));
    }

    #[test]
    fn wmts_lists_one_matrix_per_zoom() {
        let mut info = TileSetInfo::named("Basic", "png");
        info.maxzoom = 2;
        let xml = BasicPages.wmts(&WmtsPage {
            id: "basic".into(),
            info,
            tile_size: 256,
            tile_url: "http://h/styles/basic/{TileMatrix}/{TileCol}/{TileRow}.png".into(),
            capabilities_url: "http://h/styles/basic/wmts.xml".into(),
        });
        assert_eq!(xml.matches("<TileMatrix>").count(), 3);
        assert!(xml.contains("<ows:Identifier>basic</ows:Identifier>"));
        assert!(xml.contains("{TileMatrix}/{TileCol}/{TileRow}.png"));
        assert_eq!(xml.matches("<TileWidth>256</TileWidth>").count(), 3);
    }

    #[test]
    fn wmts_matrices_follow_the_rendered_tile_size() {
        let xml = BasicPages.wmts(&WmtsPage {
            id: "retina".into(),
            info: TileSetInfo::named("Retina", "png"),
            tile_size: 512,
            tile_url: "http://h/styles/retina/{TileMatrix}/{TileCol}/{TileRow}.png".into(),
            capabilities_url: "http://h/styles/retina/wmts.xml".into(),
        });
        assert!(xml.contains("<TileWidth>512</TileWidth><TileHeight>512</TileHeight>"));
        assert!(!xml.contains("<TileWidth>256</TileWidth>"));
    }
}
