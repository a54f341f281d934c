pub mod config;
pub mod feature;
pub mod widget;

use serde_json::{json, Value};

/// Selector of the single optional map container; doubles as the URL
/// fragment that deep-links the expanded state.
pub const MAP_SELECTOR: &str = "#map";

/// Fixed, versioned URL of the map-rendering library.
pub const MAP_SCRIPT_URL: &str =
    "https://api.mapbox.com/mapbox-gl-js/v2.14.1/mapbox-gl.js";

pub const MAP_STYLE: &str = "mapbox://styles/mapbox/dark-v11";

/// Belgrade.
pub const MAP_CENTER: [f64; 2] = [20.456_897_4, 44.817_813_1];

pub const POINTS_LAYER: &str = "points";
pub const LOCATIONS_LAYER: &str = "locations";

/// Circle paint for the points layer; per-feature color.
pub fn point_paint() -> Value {
    json!({
        "circle-color": ["get", "color"],
        "circle-stroke-width": 2,
        "circle-stroke-color": "white",
        "circle-opacity": 0.9,
        "circle-radius": 8,
    })
}

/// Circle paint for the locations layer.
pub fn location_paint() -> Value {
    json!({
        "circle-color": "white",
        "circle-stroke-width": 1,
        "circle-stroke-color": "white",
        "circle-opacity": 0.55,
        "circle-radius": 4,
    })
}
