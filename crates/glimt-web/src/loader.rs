use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use glimt_core::{ScriptError, ScriptLoader, Spawn};
use js_sys::Promise;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, HtmlScriptElement};

/// Loads a script by injecting a deferred `<script>` element into the
/// document head, resolving on its load event.
pub struct DomScriptLoader {
    document: Document,
}

impl DomScriptLoader {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    fn inject(&self, url: &str) -> Result<Promise, JsValue> {
        let script: HtmlScriptElement =
            self.document.create_element("script")?.dyn_into()?;
        script.set_src(url);
        script.set_defer(true);
        let promise = Promise::new(&mut |resolve, reject| {
            let onload = Closure::once_into_js(move || {
                let _ = resolve.call0(&JsValue::NULL);
            });
            script.set_onload(Some(onload.unchecked_ref()));
            let onerror = Closure::once_into_js(move || {
                let _ = reject.call0(&JsValue::NULL);
            });
            script.set_onerror(Some(onerror.unchecked_ref()));
        });
        let head = self
            .document
            .head()
            .ok_or_else(|| JsValue::from_str("no document head"))?;
        head.append_child(&script)?;
        Ok(promise)
    }
}

#[async_trait(?Send)]
impl ScriptLoader for DomScriptLoader {
    async fn load(&self, url: &str) -> Result<(), ScriptError> {
        let promise = self
            .inject(url)
            .map_err(|_| ScriptError::Load(url.to_string()))?;
        JsFuture::from(promise)
            .await
            .map(|_| ())
            .map_err(|_| ScriptError::Load(url.to_string()))
    }
}

/// Spawner over the browser microtask queue.
pub struct WasmSpawn;

impl Spawn for WasmSpawn {
    fn spawn(&self, fut: Pin<Box<dyn Future<Output = ()> + 'static>>) {
        wasm_bindgen_futures::spawn_local(fut);
    }
}
