use std::rc::Rc;

use glimt_core::map::MAP_SELECTOR;
use glimt_core::{EventSink, MapConfig, MapWidget};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Event, HtmlElement, Window};

use crate::host::DomMapHost;
use crate::loader::{DomScriptLoader, WasmSpawn};
use crate::mapbox::MapboxApi;

/// Wire the map widget: read the container's configuration, hook up the
/// toggle control and run the deep-link check. Pages without a map
/// container get nothing.
pub fn init(
    window: &Window,
    document: &Document,
    sink: Option<Rc<dyn EventSink>>,
) -> Result<(), JsValue> {
    let Some(container) = document.query_selector(MAP_SELECTOR)? else {
        return Ok(());
    };
    let container: HtmlElement = container.dyn_into()?;

    let config = MapConfig::from_attrs(
        container.get_attribute("data-map-token"),
        container.get_attribute("data-map-zoom"),
        container.get_attribute("data-map-logo-position"),
        container.get_attribute("data-map-points-src"),
        container.get_attribute("data-map-loc-src"),
    );

    let host = Rc::new(DomMapHost::new(window.clone(), container.clone()));
    let loader = Rc::new(DomScriptLoader::new(document.clone()));
    let api = Rc::new(MapboxApi::new(window.clone(), container.into()));
    let widget = MapWidget::new(config, host, loader, api, Rc::new(WasmSpawn), sink);

    let selector = format!("a[data-map-toggle][href='{MAP_SELECTOR}']");
    if let Some(toggle) = document.query_selector(&selector)? {
        let inner = Rc::clone(&widget);
        let on_click = Closure::wrap(Box::new(move |event: Event| {
            event.prevent_default();
            inner.toggle();
        }) as Box<dyn Fn(Event)>);
        toggle.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;
        on_click.forget();
    }

    let hash = window.location().hash().unwrap_or_default();
    widget.check_deep_link(&hash);
    Ok(())
}
