/// Zoom applied when the container carries no parsable zoom attribute.
pub const DEFAULT_ZOOM: f64 = 4.3;

pub const DEFAULT_LOGO_POSITION: &str = "top-right";

/// Map container configuration, read once from the container's data
/// attributes.
#[derive(Debug, Clone)]
pub struct MapConfig {
    pub token: Option<String>,
    pub zoom: f64,
    pub logo_position: String,
    pub points_src: Option<String>,
    pub locations_src: Option<String>,
}

impl MapConfig {
    pub fn from_attrs(
        token: Option<String>,
        zoom: Option<String>,
        logo_position: Option<String>,
        points_src: Option<String>,
        locations_src: Option<String>,
    ) -> Self {
        Self {
            token,
            zoom: parse_zoom(zoom.as_deref()),
            logo_position: logo_position
                .unwrap_or_else(|| DEFAULT_LOGO_POSITION.to_string()),
            points_src,
            locations_src,
        }
    }
}

/// Parse the zoom attribute, falling back to [`DEFAULT_ZOOM`] when the
/// attribute is absent or not a number.
pub fn parse_zoom(raw: Option<&str>) -> f64 {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .unwrap_or(DEFAULT_ZOOM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_zoom_valid() {
        assert_eq!(parse_zoom(Some("7.5")), 7.5);
        assert_eq!(parse_zoom(Some(" 3 ")), 3.0);
    }

    #[test]
    fn test_parse_zoom_fallback() {
        assert_eq!(parse_zoom(None), DEFAULT_ZOOM);
        assert_eq!(parse_zoom(Some("")), DEFAULT_ZOOM);
        assert_eq!(parse_zoom(Some("wide")), DEFAULT_ZOOM);
    }

    #[test]
    fn test_from_attrs_defaults() {
        let config = MapConfig::from_attrs(None, None, None, None, None);
        assert_eq!(config.zoom, DEFAULT_ZOOM);
        assert_eq!(config.logo_position, DEFAULT_LOGO_POSITION);
        assert!(config.token.is_none());
        assert!(config.points_src.is_none());
        assert!(config.locations_src.is_none());
    }
}
