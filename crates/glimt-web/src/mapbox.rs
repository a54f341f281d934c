use std::cell::RefCell;

use glimt_core::map::POINTS_LAYER;
use glimt_core::{popup_html, MapApi, MapError, MapHandle, MapParams, PointFeature};
use js_sys::{Array, Function, Object, Reflect};
use serde_json::json;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, Window};

use crate::store::js_error_message;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = mapboxgl, js_name = Map)]
    type MapboxMap;

    #[wasm_bindgen(constructor, js_namespace = mapboxgl, js_class = "Map", catch)]
    fn new(options: &Object) -> Result<MapboxMap, JsValue>;

    #[wasm_bindgen(method, js_name = on)]
    fn on_event(this: &MapboxMap, event: &str, handler: &Function);

    #[wasm_bindgen(method, js_name = on)]
    fn on_layer_event(this: &MapboxMap, event: &str, layer: &str, handler: &Function);

    #[wasm_bindgen(method, js_name = addSource)]
    fn add_source(this: &MapboxMap, id: &str, source: &JsValue);

    #[wasm_bindgen(method, js_name = addLayer)]
    fn add_layer(this: &MapboxMap, layer: &JsValue);

    #[wasm_bindgen(method, js_name = getCanvas)]
    fn get_canvas(this: &MapboxMap) -> web_sys::HtmlElement;

    #[wasm_bindgen(js_namespace = mapboxgl, js_name = Popup)]
    type MapboxPopup;

    #[wasm_bindgen(constructor, js_namespace = mapboxgl, js_class = "Popup")]
    fn new_popup(options: &Object) -> MapboxPopup;

    #[wasm_bindgen(method, js_name = setLngLat)]
    fn set_lng_lat(this: &MapboxPopup, lng_lat: &Array) -> MapboxPopup;

    #[wasm_bindgen(method, js_name = setHTML)]
    fn set_html(this: &MapboxPopup, html: &str) -> MapboxPopup;

    #[wasm_bindgen(method, js_name = addTo)]
    fn add_to(this: &MapboxPopup, map: &MapboxMap) -> MapboxPopup;

    #[wasm_bindgen(method, js_name = getElement)]
    fn get_element(this: &MapboxPopup) -> web_sys::HtmlElement;
}

fn set(target: &Object, key: &str, value: &JsValue) {
    let _ = Reflect::set(target, &JsValue::from_str(key), value);
}

fn json_to_js(value: &serde_json::Value) -> JsValue {
    js_sys::JSON::parse(&value.to_string()).unwrap_or(JsValue::NULL)
}

/// Extract the hovered/clicked feature from a layer mouse event.
fn first_feature(event: &JsValue) -> Option<PointFeature> {
    let features = Reflect::get(event, &JsValue::from_str("features")).ok()?;
    let features: Array = features.dyn_into().ok()?;
    let raw = js_sys::JSON::stringify(&features.get(0)).ok()?;
    PointFeature::from_geojson(&String::from(raw))
}

/// The Mapbox GL JS capability, present once its script has executed.
pub struct MapboxApi {
    window: Window,
    container: Element,
}

impl MapboxApi {
    pub fn new(window: Window, container: Element) -> Self {
        Self { window, container }
    }
}

impl MapApi for MapboxApi {
    fn available(&self) -> bool {
        Reflect::has(self.window.as_ref(), &JsValue::from_str("mapboxgl")).unwrap_or(false)
    }

    fn create(
        &self,
        params: &MapParams,
        on_ready: Box<dyn Fn()>,
    ) -> Result<Box<dyn MapHandle>, MapError> {
        let options = Object::new();
        set(&options, "accessToken", &JsValue::from_str(&params.token));
        set(&options, "container", self.container.as_ref());
        set(&options, "style", &JsValue::from_str(&params.style));
        let center = Array::of2(&params.center[0].into(), &params.center[1].into());
        set(&options, "center", &center);
        set(&options, "zoom", &params.zoom.into());
        set(
            &options,
            "logoPosition",
            &JsValue::from_str(&params.logo_position),
        );
        set(&options, "attributionControl", &JsValue::FALSE);
        set(&options, "useWebGL2", &JsValue::TRUE);

        let map = MapboxMap::new(&options)
            .map_err(|err| MapError::Create(js_error_message(&err)))?;

        let ready = Closure::wrap(Box::new(move || on_ready()) as Box<dyn Fn()>);
        map.on_event("load", ready.as_ref().unchecked_ref());
        ready.forget();

        let popup_options = Object::new();
        set(&popup_options, "closeButton", &JsValue::FALSE);
        set(&popup_options, "closeOnMove", &JsValue::TRUE);
        set(&popup_options, "closeOnClick", &JsValue::FALSE);
        set(&popup_options, "focusAfterOpen", &JsValue::FALSE);
        let popup = MapboxPopup::new_popup(&popup_options);

        Ok(Box::new(MapboxHandle {
            map,
            popup,
            popup_click: RefCell::new(None),
        }))
    }
}

/// A constructed Mapbox map. One popup object is reused for every
/// hover; re-anchoring it replaces the previous popup instead of
/// stacking a new one.
pub struct MapboxHandle {
    map: MapboxMap,
    popup: MapboxPopup,
    popup_click: RefCell<Option<Closure<dyn Fn()>>>,
}

impl MapHandle for MapboxHandle {
    fn add_circle_layer(&self, id: &str, data_src: &str, paint: &serde_json::Value) {
        let source = json!({ "type": "geojson", "data": data_src });
        self.map.add_source(id, &json_to_js(&source));
        let layer = json!({
            "id": id,
            "source": id,
            "type": "circle",
            "paint": paint,
        });
        self.map.add_layer(&json_to_js(&layer));
    }

    fn set_cursor(&self, cursor: &str) {
        let _ = self.map.get_canvas().style().set_property("cursor", cursor);
    }

    fn show_popup(&self, feature: &PointFeature, on_click: Box<dyn Fn()>) {
        let lng_lat = Array::of2(&feature.lng.into(), &feature.lat.into());
        self.popup.set_lng_lat(&lng_lat);
        self.popup.set_html(&popup_html(feature));
        self.popup.add_to(&self.map);

        let element = self.popup.get_element();
        if let Some(color) = &feature.color {
            let _ = element.style().set_property("--popup-color", color);
        }
        let click = Closure::wrap(Box::new(move || on_click()) as Box<dyn Fn()>);
        let _ = element.add_event_listener_with_callback("click", click.as_ref().unchecked_ref());
        // Dropping the previous closure invalidates the listener left on
        // the superseded popup element.
        *self.popup_click.borrow_mut() = Some(click);
    }

    fn on_point_enter(&self, callback: Box<dyn Fn(PointFeature)>) {
        let handler = Closure::wrap(Box::new(move |event: JsValue| {
            if let Some(feature) = first_feature(&event) {
                callback(feature);
            }
        }) as Box<dyn Fn(JsValue)>);
        self.map
            .on_layer_event("mouseenter", POINTS_LAYER, handler.as_ref().unchecked_ref());
        handler.forget();
    }

    fn on_point_leave(&self, callback: Box<dyn Fn()>) {
        let handler = Closure::wrap(Box::new(move || callback()) as Box<dyn Fn()>);
        self.map
            .on_layer_event("mouseleave", POINTS_LAYER, handler.as_ref().unchecked_ref());
        handler.forget();
    }

    fn on_point_click(&self, callback: Box<dyn Fn(PointFeature)>) {
        let handler = Closure::wrap(Box::new(move |event: JsValue| {
            if let Some(feature) = first_feature(&event) {
                callback(feature);
            }
        }) as Box<dyn Fn(JsValue)>);
        self.map
            .on_layer_event("click", POINTS_LAYER, handler.as_ref().unchecked_ref());
        handler.forget();
    }
}
