use glimt_core::MapHost;
use wasm_bindgen::JsValue;
use web_sys::{Element, HtmlElement, ScrollBehavior, ScrollIntoViewOptions, Window};

/// Container-side effects of the map widget: the `hidden` attribute,
/// smooth scrolling, the URL fragment and outbound navigation.
pub struct DomMapHost {
    window: Window,
    container: HtmlElement,
}

impl DomMapHost {
    pub fn new(window: Window, container: HtmlElement) -> Self {
        Self { window, container }
    }
}

impl MapHost for DomMapHost {
    fn set_hidden(&self, hidden: bool) {
        self.container.set_hidden(hidden);
    }

    fn scroll_into_view(&self) {
        let target: Element = self
            .container
            .parent_element()
            .unwrap_or_else(|| self.container.clone().into());
        let options = ScrollIntoViewOptions::new();
        options.set_behavior(ScrollBehavior::Smooth);
        target.scroll_into_view_with_scroll_into_view_options(&options);
    }

    fn set_fragment(&self, fragment: Option<&str>) {
        let Ok(history) = self.window.history() else {
            return;
        };
        // Replace rather than push: the fragment mirrors current state
        // and must not become a separate back-navigation stop.
        let url = fragment.unwrap_or("#");
        let _ = history.replace_state_with_url(&JsValue::NULL, "", Some(url));
    }

    fn mark_loaded(&self) {
        let _ = self.container.set_attribute("data-map-loaded", "true");
    }

    fn open_external(&self, url: &str) {
        let _ = self
            .window
            .open_with_url_and_target_and_features(url, "_blank", "noopener");
    }
}
