use std::cell::RefCell;
use std::rc::Rc;

use glimt_core::{EventSink, FigureHost, Figures, LikeLedger};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlImageElement, Window};

use crate::observe;
use crate::store::LocalStore;

/// The DOM side of one figure: the `<figure>` element and its image.
struct FigureDom {
    figure: Element,
    image: Option<HtmlImageElement>,
}

/// Mirrors derived figure state into data attributes for CSS hooks.
struct DomFigureHost {
    figures: Vec<FigureDom>,
}

impl FigureHost for DomFigureHost {
    fn set_loaded(&self, index: usize, loaded: bool) {
        let Some(dom) = self.figures.get(index) else {
            return;
        };
        let value = loaded.to_string();
        if let Some(parent) = dom.image.as_ref().and_then(|img| img.parent_element()) {
            let _ = parent.set_attribute("data-loaded", &value);
        }
        let _ = dom.figure.set_attribute("data-loaded", &value);
    }

    fn set_visible(&self, index: usize) {
        if let Some(dom) = self.figures.get(index) {
            let _ = dom.figure.set_attribute("data-visible", "true");
        }
    }

    fn set_liked(&self, index: usize, liked: bool) {
        if let Some(dom) = self.figures.get(index) {
            let _ = dom.figure.set_attribute("data-liked", &liked.to_string());
        }
    }
}

/// Register the figure behaviors once the window has finished loading,
/// so image completion state is meaningful.
pub fn init(
    window: &Window,
    document: &Document,
    sink: Option<Rc<dyn EventSink>>,
) -> Result<(), JsValue> {
    if document.ready_state() == "complete" {
        return setup(window, document, sink);
    }
    let window_inner = window.clone();
    let document_inner = document.clone();
    let on_load = Closure::once_into_js(move || {
        if let Err(err) = setup(&window_inner, &document_inner, sink) {
            tracing::error!("figure setup failed: {err:?}");
        }
    });
    window.add_event_listener_with_callback("load", on_load.unchecked_ref())?;
    Ok(())
}

fn setup(
    window: &Window,
    document: &Document,
    sink: Option<Rc<dyn EventSink>>,
) -> Result<(), JsValue> {
    let nodes = document.query_selector_all("article figure")?;
    let mut doms = Vec::new();
    for index in 0..nodes.length() {
        let Some(node) = nodes.get(index) else {
            continue;
        };
        let Ok(figure) = node.dyn_into::<Element>() else {
            continue;
        };
        let image = figure
            .query_selector("picture img")
            .ok()
            .flatten()
            .and_then(|el| el.dyn_into::<HtmlImageElement>().ok());
        doms.push(FigureDom { figure, image });
    }
    if doms.is_empty() {
        return Ok(());
    }

    let sources: Vec<String> = doms
        .iter()
        .map(|dom| dom.figure.get_attribute("data-src").unwrap_or_default())
        .collect();
    let complete: Vec<bool> = doms
        .iter()
        .map(|dom| dom.image.as_ref().is_some_and(|img| img.complete()))
        .collect();
    let elements: Vec<(Element, Option<HtmlImageElement>)> = doms
        .iter()
        .map(|dom| (dom.figure.clone(), dom.image.clone()))
        .collect();

    let host = Rc::new(DomFigureHost { figures: doms });
    let ledger = LikeLedger::new(Rc::new(LocalStore::new(window)));
    let path = window.location().pathname().unwrap_or_default();
    let figures = Rc::new(RefCell::new(Figures::new(
        sources, &complete, ledger, host, sink, path,
    )));

    for (index, (figure, image)) in elements.into_iter().enumerate() {
        let tracker = Rc::clone(&figures);
        observe::watch(&figure, move |intersecting| {
            tracker.borrow_mut().on_visibility(index, intersecting)
        })?;

        if let Some(image) = image {
            let tracker = Rc::clone(&figures);
            let on_load = Closure::wrap(Box::new(move || {
                tracker.borrow_mut().on_image_loaded(index);
            }) as Box<dyn Fn()>);
            image.set_onload(Some(on_load.as_ref().unchecked_ref()));
            on_load.forget();

            let tracker = Rc::clone(&figures);
            let on_error = Closure::wrap(Box::new(move || {
                tracker.borrow_mut().on_image_error(index);
            }) as Box<dyn Fn()>);
            image.set_onerror(Some(on_error.as_ref().unchecked_ref()));
            on_error.forget();
        }

        let tracker = Rc::clone(&figures);
        let on_click = Closure::wrap(Box::new(move || {
            tracker.borrow_mut().toggle_like(index);
        }) as Box<dyn Fn()>);
        figure.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;
        on_click.forget();
    }
    Ok(())
}
