//! Resource kinds and the URL namespace each one is mounted under.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// Kind of resource a startup task produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Vector style documents.
    Style,
    /// Rendered raster/vector tiles derived from a style.
    Rendered,
    /// Raw tile archives.
    Archive,
    /// The font catalog.
    Font,
}

impl ResourceKind {
    /// Every kind, in registry order.
    pub const ALL: [Self; 4] = [Self::Style, Self::Rendered, Self::Archive, Self::Font];

    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Style => "style",
            Self::Rendered => "rendered",
            Self::Archive => "archive",
            Self::Font => "font",
        }
    }

    /// URL prefix this kind's handlers are mounted under.
    ///
    /// Rendered tiles share the style namespace; every font shares one namespace.
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::Style | Self::Rendered => "/styles",
            Self::Archive => "/data",
            Self::Font => "/fonts",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_tiles_share_the_style_namespace() {
        assert_eq!(ResourceKind::Rendered.namespace(), ResourceKind::Style.namespace());
        assert_eq!(ResourceKind::Archive.namespace(), "/data");
        assert_eq!(ResourceKind::Font.to_string(), "font");
    }
}
