use serde::{Deserialize, Serialize};

/// A hoverable/clickable point on the map, extracted from one GeoJSON
/// feature of the points source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointFeature {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub color: Option<String>,
    pub lng: f64,
    pub lat: f64,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    geometry: RawGeometry,
    properties: RawProperties,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct RawProperties {
    title: String,
    url: String,
    #[serde(default)]
    color: Option<String>,
}

impl PointFeature {
    /// Parse a single GeoJSON point feature. Returns `None` for
    /// malformed payloads; a broken feature degrades to no popup.
    pub fn from_geojson(raw: &str) -> Option<Self> {
        let feature: RawFeature = serde_json::from_str(raw).ok()?;
        let [lng, lat] = feature.geometry.coordinates[..] else {
            return None;
        };
        Some(Self {
            title: feature.properties.title,
            url: feature.properties.url,
            color: feature.properties.color,
            lng,
            lat,
        })
    }
}

/// Popup body: an anchor opening the feature's page in a new context.
pub fn popup_html(feature: &PointFeature) -> String {
    format!(
        "<a href=\"{}\" target=\"_blank\" rel=\"noopener\">{}</a>",
        escape(&feature.url),
        escape(&feature.title)
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
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_geojson() {
        let raw = r##"{
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [20.45, 44.81]},
            "properties": {"title": "Belgrade", "url": "/journal/belgrade", "color": "#fa0"}
        }"##;
        let feature = PointFeature::from_geojson(raw).unwrap();
        assert_eq!(feature.title, "Belgrade");
        assert_eq!(feature.url, "/journal/belgrade");
        assert_eq!(feature.color.as_deref(), Some("#fa0"));
        assert_eq!((feature.lng, feature.lat), (20.45, 44.81));
    }

    #[test]
    fn test_from_geojson_malformed() {
        assert!(PointFeature::from_geojson("{}").is_none());
        assert!(PointFeature::from_geojson("not json").is_none());
        // Wrong coordinate arity.
        let raw = r#"{"geometry": {"coordinates": [1.0]}, "properties": {"title": "t", "url": "u"}}"#;
        assert!(PointFeature::from_geojson(raw).is_none());
    }

    #[test]
    fn test_popup_html_escapes() {
        let feature = PointFeature {
            title: "Fish & \"Chips\"".to_string(),
            url: "/a?b=1&c=2".to_string(),
            color: None,
            lng: 0.0,
            lat: 0.0,
        };
        assert_eq!(
            popup_html(&feature),
            "<a href=\"/a?b=1&amp;c=2\" target=\"_blank\" rel=\"noopener\">Fish &amp; &quot;Chips&quot;</a>"
        );
    }
}
