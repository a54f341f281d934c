mod figures;
mod host;
mod loader;
mod mapbox;
mod observe;
mod sink;
mod store;
mod widget;

use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();
    if let Err(err) = boot() {
        tracing::error!("initialization failed: {err:?}");
    }
}

/// Wire up the page: the map widget immediately, the figure behaviors
/// once the window has finished loading. Every feature degrades
/// individually; nothing here is fatal to the hosting page.
fn boot() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let sink = sink::UmamiSink::resolve(&window);
    widget::init(&window, &document, sink.clone())?;
    figures::init(&window, &document, sink)?;
    Ok(())
}
