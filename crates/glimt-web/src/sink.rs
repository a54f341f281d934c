use std::rc::Rc;

use glimt_core::EventSink;
use js_sys::{Function, Object, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::Window;

/// Analytics sink backed by the page's `window.umami` global.
///
/// Resolved once at startup; pages without the tracker simply get no
/// sink. Tracking failures are swallowed.
pub struct UmamiSink {
    umami: JsValue,
}

impl UmamiSink {
    pub fn resolve(window: &Window) -> Option<Rc<dyn EventSink>> {
        let umami = Reflect::get(window.as_ref(), &JsValue::from_str("umami")).ok()?;
        if umami.is_undefined() || umami.is_null() {
            return None;
        }
        Some(Rc::new(UmamiSink { umami }))
    }
}

impl EventSink for UmamiSink {
    fn track(&self, event: &str, attrs: &[(&str, &str)]) {
        let Ok(track) = Reflect::get(&self.umami, &JsValue::from_str("track")) else {
            return;
        };
        let Ok(track) = track.dyn_into::<Function>() else {
            return;
        };
        let name = JsValue::from_str(event);
        let result = if attrs.is_empty() {
            track.call1(&self.umami, &name)
        } else {
            let data = Object::new();
            for (key, value) in attrs {
                let _ = Reflect::set(
                    &data,
                    &JsValue::from_str(key),
                    &JsValue::from_str(value),
                );
            }
            track.call2(&self.umami, &name, &data)
        };
        if result.is_err() {
            tracing::debug!("umami track call failed for {event}");
        }
    }
}
