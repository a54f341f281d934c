use std::cell::RefCell;
use std::rc::Rc;

use glimt_core::{Watch, VISIBILITY_THRESHOLD};
use js_sys::Array;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    Element, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit,
};

/// An active intersection watch over one element.
pub struct Watcher {
    observer: IntersectionObserver,
}

impl Watcher {
    /// Stop delivery permanently.
    pub fn cancel(&self) {
        self.observer.disconnect();
    }
}

/// Register a visibility-crossing watch at the fixed reveal threshold.
///
/// `on_cross` receives whether the element is intersecting; returning
/// `Watch::Unwatch` cancels the subscription from within its own
/// callback, making the reveal transition one-shot.
pub fn watch(
    target: &Element,
    on_cross: impl Fn(bool) -> Watch + 'static,
) -> Result<(), JsValue> {
    let options = IntersectionObserverInit::new();
    let thresholds = Array::of1(&JsValue::from_f64(VISIBILITY_THRESHOLD));
    options.set_threshold(&thresholds);

    let watcher: Rc<RefCell<Option<Watcher>>> = Rc::new(RefCell::new(None));
    let inner = Rc::clone(&watcher);
    let callback = Closure::wrap(Box::new(move |entries: Array| {
        let Ok(entry) = entries.get(0).dyn_into::<IntersectionObserverEntry>() else {
            return;
        };
        if on_cross(entry.is_intersecting()) == Watch::Unwatch {
            if let Some(watcher) = inner.borrow().as_ref() {
                watcher.cancel();
            }
        }
    }) as Box<dyn Fn(Array)>);

    let observer =
        IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &options)?;
    observer.observe(target);
    *watcher.borrow_mut() = Some(Watcher { observer });
    callback.forget();
    Ok(())
}
