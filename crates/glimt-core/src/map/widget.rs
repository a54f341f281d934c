use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::MapError;
use crate::event::{EventSink, MAP_LOADED, MAP_POINT_CLICKED};
use crate::map::config::MapConfig;
use crate::map::feature::PointFeature;
use crate::map::{
    location_paint, point_paint, LOCATIONS_LAYER, MAP_CENTER, MAP_SCRIPT_URL,
    MAP_SELECTOR, MAP_STYLE, POINTS_LAYER,
};
use crate::script::{ScriptLoader, Spawn};

/// Container-side effects of the widget: visibility, scrolling, the URL
/// fragment and outbound navigation.
pub trait MapHost {
    fn set_hidden(&self, hidden: bool);
    fn scroll_into_view(&self);
    /// Rewrite the fragment to reflect the current state, without adding
    /// a traversable history entry. `None` clears it.
    fn set_fragment(&self, fragment: Option<&str>);
    fn mark_loaded(&self);
    /// Open a URL in a new browsing context with no-opener semantics.
    fn open_external(&self, url: &str);
}

/// Parameters for constructing the underlying map instance.
#[derive(Debug, Clone, PartialEq)]
pub struct MapParams {
    pub token: String,
    pub style: String,
    pub center: [f64; 2],
    pub zoom: f64,
    pub logo_position: String,
}

/// The external map-rendering capability, present only once its script
/// has executed.
pub trait MapApi {
    fn available(&self) -> bool;
    fn create(
        &self,
        params: &MapParams,
        on_ready: Box<dyn Fn()>,
    ) -> Result<Box<dyn MapHandle>, MapError>;
}

/// A constructed map instance: layers, cursor, popup and point-event
/// subscription. `show_popup` replaces any previous popup; at most one
/// is live at a time.
pub trait MapHandle {
    fn add_circle_layer(&self, id: &str, data_src: &str, paint: &serde_json::Value);
    fn set_cursor(&self, cursor: &str);
    fn show_popup(&self, feature: &PointFeature, on_click: Box<dyn Fn()>);
    fn on_point_enter(&self, callback: Box<dyn Fn(PointFeature)>);
    fn on_point_leave(&self, callback: Box<dyn Fn()>);
    fn on_point_click(&self, callback: Box<dyn Fn(PointFeature)>);
}

#[derive(Debug)]
struct Flags {
    hidden: bool,
    loading: bool,
    loaded: bool,
}

/// The map widget lifecycle: deferred script loading, idempotent map
/// construction, fragment-driven open/close state and point popups.
pub struct MapWidget {
    config: MapConfig,
    flags: RefCell<Flags>,
    map: RefCell<Option<Box<dyn MapHandle>>>,
    host: Rc<dyn MapHost>,
    loader: Rc<dyn ScriptLoader>,
    api: Rc<dyn MapApi>,
    spawner: Rc<dyn Spawn>,
    sink: Option<Rc<dyn EventSink>>,
    me: Weak<MapWidget>,
}

impl MapWidget {
    pub fn new(
        config: MapConfig,
        host: Rc<dyn MapHost>,
        loader: Rc<dyn ScriptLoader>,
        api: Rc<dyn MapApi>,
        spawner: Rc<dyn Spawn>,
        sink: Option<Rc<dyn EventSink>>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            config,
            flags: RefCell::new(Flags {
                hidden: true,
                loading: false,
                loaded: false,
            }),
            map: RefCell::new(None),
            host,
            loader,
            api,
            spawner,
            sink,
            me: me.clone(),
        })
    }

    pub fn is_hidden(&self) -> bool {
        self.flags.borrow().hidden
    }

    pub fn is_loading(&self) -> bool {
        self.flags.borrow().loading
    }

    pub fn is_loaded(&self) -> bool {
        self.flags.borrow().loaded
    }

    /// Deep-link entry path: a page loaded with the widget's selector as
    /// fragment force-unhides the container, starts loading and scrolls
    /// it into view. The fragment already reflects the state, so it is
    /// left untouched.
    pub fn check_deep_link(&self, fragment: &str) {
        if fragment != MAP_SELECTOR {
            return;
        }
        self.flags.borrow_mut().hidden = false;
        self.host.set_hidden(false);
        self.request_load();
        self.host.scroll_into_view();
    }

    /// Invert the hidden flag.
    pub fn toggle(&self) {
        let expanded = self.flags.borrow().hidden;
        self.set_expanded(expanded);
    }

    /// Single transition keeping widget state and the URL fragment in
    /// sync. Loading is triggered in either direction while the map is
    /// not yet constructed, guarded against duplicate in-flight loads.
    pub fn set_expanded(&self, expanded: bool) {
        self.flags.borrow_mut().hidden = !expanded;
        self.host.set_hidden(!expanded);
        self.request_load();
        if expanded {
            self.host.scroll_into_view();
        }
        self.host
            .set_fragment(if expanded { Some(MAP_SELECTOR) } else { None });
    }

    fn request_load(&self) {
        {
            let mut flags = self.flags.borrow_mut();
            if flags.loaded || flags.loading {
                return;
            }
            // Guard set before any suspension point, so a second toggle
            // during the script fetch cannot start a second load.
            flags.loading = true;
        }
        let Some(widget) = self.me.upgrade() else {
            return;
        };
        self.spawner.spawn(Box::pin(async move {
            widget.run_load().await;
        }));
    }

    async fn run_load(self: Rc<Self>) {
        if let Err(err) = self.loader.load(MAP_SCRIPT_URL).await {
            tracing::warn!("map script load failed: {err}");
            // No automatic retry; the next toggle attempts loading again.
            self.flags.borrow_mut().loading = false;
            return;
        }
        self.construct_map();
    }

    /// Construct the map instance. A missing token or an absent map
    /// capability silently aborts; nothing is surfaced to the user.
    fn construct_map(&self) {
        let token = match &self.config.token {
            Some(token) => token.clone(),
            None => {
                self.abort_load();
                return;
            }
        };
        if !self.api.available() {
            self.abort_load();
            return;
        }
        let params = MapParams {
            token,
            style: MAP_STYLE.to_string(),
            center: MAP_CENTER,
            zoom: self.config.zoom,
            logo_position: self.config.logo_position.clone(),
        };
        let Some(widget) = self.me.upgrade() else {
            return;
        };
        let on_ready = Box::new(move || widget.on_map_ready());
        match self.api.create(&params, on_ready) {
            Ok(handle) => {
                *self.map.borrow_mut() = Some(handle);
            }
            Err(err) => {
                tracing::warn!("map construction failed: {err}");
                self.abort_load();
            }
        }
    }

    fn abort_load(&self) {
        self.flags.borrow_mut().loading = false;
    }

    /// Fired once by the underlying library when the map finishes its
    /// initial render: add the configured layers, mark the container
    /// loaded and emit "map-loaded".
    pub fn on_map_ready(&self) {
        if self.flags.borrow().loaded {
            return;
        }
        {
            let map = self.map.borrow();
            let Some(handle) = map.as_ref() else {
                return;
            };
            if let Some(src) = &self.config.points_src {
                handle.add_circle_layer(POINTS_LAYER, src, &point_paint());
                if let Some(widget) = self.me.upgrade() {
                    let enter = Rc::clone(&widget);
                    handle.on_point_enter(Box::new(move |feature| {
                        enter.point_entered(feature);
                    }));
                    let leave = Rc::clone(&widget);
                    handle.on_point_leave(Box::new(move || leave.point_left()));
                    handle.on_point_click(Box::new(move |feature| {
                        widget.point_clicked(feature);
                    }));
                }
            }
            if let Some(src) = &self.config.locations_src {
                handle.add_circle_layer(LOCATIONS_LAYER, src, &location_paint());
            }
        }
        {
            let mut flags = self.flags.borrow_mut();
            flags.loaded = true;
            flags.loading = false;
        }
        self.host.mark_loaded();
        if let Some(sink) = &self.sink {
            sink.track(MAP_LOADED, &[]);
        }
    }

    /// Hover over a point: pointer cursor plus a popup anchored at the
    /// feature, replacing any popup from a previous hover.
    pub fn point_entered(&self, feature: PointFeature) {
        let map = self.map.borrow();
        let Some(handle) = map.as_ref() else {
            return;
        };
        handle.set_cursor("pointer");
        let sink = self.sink.clone();
        let url = feature.url.clone();
        handle.show_popup(
            &feature,
            Box::new(move || {
                if let Some(sink) = &sink {
                    sink.track(MAP_POINT_CLICKED, &[("url", &url)]);
                }
            }),
        );
    }

    pub fn point_left(&self) {
        if let Some(handle) = self.map.borrow().as_ref() {
            handle.set_cursor("");
        }
    }

    /// Direct click on a point: track it and open the feature's URL in a
    /// new browsing context.
    pub fn point_clicked(&self, feature: PointFeature) {
        if let Some(sink) = &self.sink {
            sink.track(MAP_POINT_CLICKED, &[("url", &feature.url)]);
        }
        self.host.open_external(&feature.url);
    }
}

// Fakes for the widget's seams, used by the lifecycle tests
#[cfg(any(test, feature = "test-utils"))]
pub mod fakes {
    use super::*;
    use std::cell::Cell;

    /// Host that records every side effect.
    #[derive(Default)]
    pub struct RecordingHost {
        pub hidden: RefCell<Vec<bool>>,
        pub scrolls: Cell<usize>,
        pub fragments: RefCell<Vec<Option<String>>>,
        pub loaded_marks: Cell<usize>,
        pub opened: RefCell<Vec<String>>,
    }

    impl RecordingHost {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl MapHost for RecordingHost {
        fn set_hidden(&self, hidden: bool) {
            self.hidden.borrow_mut().push(hidden);
        }

        fn scroll_into_view(&self) {
            self.scrolls.set(self.scrolls.get() + 1);
        }

        fn set_fragment(&self, fragment: Option<&str>) {
            self.fragments
                .borrow_mut()
                .push(fragment.map(|f| f.to_string()));
        }

        fn mark_loaded(&self) {
            self.loaded_marks.set(self.loaded_marks.get() + 1);
        }

        fn open_external(&self, url: &str) {
            self.opened.borrow_mut().push(url.to_string());
        }
    }

    /// Shared observable state behind [`FakeMapApi`] and its handles.
    #[derive(Default)]
    pub struct FakeMapState {
        pub available: Cell<bool>,
        pub created: Cell<usize>,
        pub params: RefCell<Option<MapParams>>,
        pub ready: RefCell<Option<Box<dyn Fn()>>>,
        pub layers: RefCell<Vec<(String, String)>>,
        pub cursor: RefCell<String>,
        pub live_popup: RefCell<Option<(PointFeature, Box<dyn Fn()>)>>,
        pub popups_shown: Cell<usize>,
        pub enter: RefCell<Option<Box<dyn Fn(PointFeature)>>>,
        pub leave: RefCell<Option<Box<dyn Fn()>>>,
        pub click: RefCell<Option<Box<dyn Fn(PointFeature)>>>,
    }

    impl FakeMapState {
        pub fn new() -> Rc<Self> {
            let state = Self::default();
            state.available.set(true);
            Rc::new(state)
        }

        /// Simulate the library's one-shot initial-render event.
        pub fn fire_ready(&self) {
            if let Some(ready) = self.ready.borrow().as_ref() {
                ready();
            }
        }

        pub fn fire_enter(&self, feature: PointFeature) {
            if let Some(enter) = self.enter.borrow().as_ref() {
                enter(feature);
            }
        }

        pub fn fire_leave(&self) {
            if let Some(leave) = self.leave.borrow().as_ref() {
                leave();
            }
        }

        pub fn fire_click(&self, feature: PointFeature) {
            if let Some(click) = self.click.borrow().as_ref() {
                click(feature);
            }
        }

        /// Click the body of the currently live popup.
        pub fn click_popup(&self) {
            if let Some((_, on_click)) = self.live_popup.borrow().as_ref() {
                on_click();
            }
        }
    }

    pub struct FakeMapApi {
        pub state: Rc<FakeMapState>,
    }

    impl MapApi for FakeMapApi {
        fn available(&self) -> bool {
            self.state.available.get()
        }

        fn create(
            &self,
            params: &MapParams,
            on_ready: Box<dyn Fn()>,
        ) -> Result<Box<dyn MapHandle>, MapError> {
            self.state.created.set(self.state.created.get() + 1);
            *self.state.params.borrow_mut() = Some(params.clone());
            *self.state.ready.borrow_mut() = Some(on_ready);
            Ok(Box::new(FakeMapHandle {
                state: Rc::clone(&self.state),
            }))
        }
    }

    pub struct FakeMapHandle {
        state: Rc<FakeMapState>,
    }

    impl MapHandle for FakeMapHandle {
        fn add_circle_layer(&self, id: &str, data_src: &str, _paint: &serde_json::Value) {
            self.state
                .layers
                .borrow_mut()
                .push((id.to_string(), data_src.to_string()));
        }

        fn set_cursor(&self, cursor: &str) {
            *self.state.cursor.borrow_mut() = cursor.to_string();
        }

        fn show_popup(&self, feature: &PointFeature, on_click: Box<dyn Fn()>) {
            self.state.popups_shown.set(self.state.popups_shown.get() + 1);
            *self.state.live_popup.borrow_mut() = Some((feature.clone(), on_click));
        }

        fn on_point_enter(&self, callback: Box<dyn Fn(PointFeature)>) {
            *self.state.enter.borrow_mut() = Some(callback);
        }

        fn on_point_leave(&self, callback: Box<dyn Fn()>) {
            *self.state.leave.borrow_mut() = Some(callback);
        }

        fn on_point_click(&self, callback: Box<dyn Fn(PointFeature)>) {
            *self.state.click.borrow_mut() = Some(callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::{FakeMapApi, FakeMapState, RecordingHost};
    use super::*;
    use crate::error::ScriptError;
    use crate::event::recording::RecordingSink;
    use crate::map::config::DEFAULT_ZOOM;
    use crate::script::fakes::{CountingLoader, PendingLoader, PoolSpawn};
    use futures::executor::LocalPool;

    fn config(
        token: Option<&str>,
        points: Option<&str>,
        locations: Option<&str>,
    ) -> MapConfig {
        MapConfig::from_attrs(
            token.map(String::from),
            None,
            None,
            points.map(String::from),
            locations.map(String::from),
        )
    }

    fn build(
        loader: Rc<dyn ScriptLoader>,
        config: MapConfig,
    ) -> (
        LocalPool,
        Rc<MapWidget>,
        Rc<RecordingHost>,
        Rc<FakeMapState>,
        Rc<RecordingSink>,
    ) {
        let pool = LocalPool::new();
        let spawner = Rc::new(PoolSpawn::new(pool.spawner()));
        let host = Rc::new(RecordingHost::new());
        let state = FakeMapState::new();
        let api = Rc::new(FakeMapApi {
            state: Rc::clone(&state),
        });
        let sink = Rc::new(RecordingSink::new());
        let widget = MapWidget::new(
            config,
            host.clone(),
            loader,
            api,
            spawner,
            Some(sink.clone() as Rc<dyn EventSink>),
        );
        (pool, widget, host, state, sink)
    }

    fn point(title: &str, url: &str) -> PointFeature {
        PointFeature {
            title: title.to_string(),
            url: url.to_string(),
            color: Some("#fa0".to_string()),
            lng: 20.45,
            lat: 44.81,
        }
    }

    #[test]
    fn test_deep_link_expands_and_loads_once() {
        let loader = Rc::new(CountingLoader::ok());
        let (mut pool, widget, host, state, _) =
            build(loader.clone(), config(Some("tok"), None, None));

        widget.check_deep_link("#map");
        pool.run_until_stalled();

        assert!(!widget.is_hidden());
        assert_eq!(loader.calls(), 1);
        assert_eq!(host.scrolls.get(), 1);
        assert_eq!(state.created.get(), 1);
        // The deep link reproduces state already in the URL; no rewrite.
        assert!(host.fragments.borrow().is_empty());
    }

    #[test]
    fn test_foreign_fragment_is_ignored() {
        let loader = Rc::new(CountingLoader::ok());
        let (mut pool, widget, _, _, _) =
            build(loader.clone(), config(Some("tok"), None, None));

        widget.check_deep_link("#about");
        pool.run_until_stalled();

        assert!(widget.is_hidden());
        assert_eq!(loader.calls(), 0);
    }

    #[test]
    fn test_toggle_updates_fragment_and_scrolls() {
        let loader = Rc::new(CountingLoader::ok());
        let (mut pool, widget, host, _, _) =
            build(loader, config(Some("tok"), None, None));

        widget.toggle();
        pool.run_until_stalled();
        assert!(!widget.is_hidden());
        assert_eq!(host.scrolls.get(), 1);
        assert_eq!(
            host.fragments.borrow().last().unwrap().as_deref(),
            Some(MAP_SELECTOR)
        );

        widget.toggle();
        pool.run_until_stalled();
        assert!(widget.is_hidden());
        // Collapsing does not scroll and clears the fragment.
        assert_eq!(host.scrolls.get(), 1);
        assert_eq!(host.fragments.borrow().last().unwrap(), &None);
    }

    #[test]
    fn test_toggles_during_inflight_load_issue_one_load() {
        let loader = Rc::new(PendingLoader::new());
        let (mut pool, widget, _, state, _) =
            build(loader.clone(), config(Some("tok"), None, None));

        widget.toggle();
        pool.run_until_stalled();
        assert!(widget.is_loading());

        widget.toggle();
        widget.toggle();
        pool.run_until_stalled();
        assert_eq!(loader.calls(), 1);

        loader.complete_all(Ok(()));
        pool.run_until_stalled();
        assert_eq!(state.created.get(), 1);
    }

    #[test]
    fn test_failed_load_stays_put_and_allows_retry() {
        let loader = Rc::new(CountingLoader::failing(MAP_SCRIPT_URL));
        let (mut pool, widget, _, state, _) =
            build(loader.clone(), config(Some("tok"), None, None));

        widget.toggle();
        pool.run_until_stalled();
        assert!(!widget.is_hidden());
        assert!(!widget.is_loading());
        assert!(!widget.is_loaded());
        assert_eq!(state.created.get(), 0);

        // The next toggle attempts loading again.
        loader.set_result(Ok(()));
        widget.toggle();
        pool.run_until_stalled();
        assert_eq!(loader.calls(), 2);
        assert_eq!(state.created.get(), 1);
    }

    #[test]
    fn test_script_error_message() {
        let err = ScriptError::Load(MAP_SCRIPT_URL.to_string());
        assert_eq!(
            err.to_string(),
            format!("Failed loading {MAP_SCRIPT_URL}")
        );
    }

    #[test]
    fn test_missing_token_aborts_silently() {
        let loader = Rc::new(CountingLoader::ok());
        let (mut pool, widget, _, state, sink) =
            build(loader, config(None, None, None));

        widget.toggle();
        pool.run_until_stalled();

        assert_eq!(state.created.get(), 0);
        assert!(!widget.is_loading());
        assert!(!widget.is_loaded());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_missing_capability_aborts_silently() {
        let loader = Rc::new(CountingLoader::ok());
        let (mut pool, widget, _, state, _) =
            build(loader, config(Some("tok"), None, None));
        state.available.set(false);

        widget.toggle();
        pool.run_until_stalled();

        assert_eq!(state.created.get(), 0);
        assert!(!widget.is_loading());
    }

    #[test]
    fn test_map_params_from_config() {
        let loader = Rc::new(CountingLoader::ok());
        let (mut pool, widget, _, state, _) =
            build(loader, config(Some("tok"), None, None));

        widget.toggle();
        pool.run_until_stalled();

        let params = state.params.borrow().clone().unwrap();
        assert_eq!(params.token, "tok");
        assert_eq!(params.style, MAP_STYLE);
        assert_eq!(params.center, MAP_CENTER);
        assert_eq!(params.zoom, DEFAULT_ZOOM);
        assert_eq!(params.logo_position, "top-right");
    }

    #[test]
    fn test_map_ready_adds_configured_layers() {
        let loader = Rc::new(CountingLoader::ok());
        let (mut pool, widget, host, state, sink) = build(
            loader,
            config(Some("tok"), Some("/points.geojson"), Some("/loc.geojson")),
        );

        widget.toggle();
        pool.run_until_stalled();
        assert!(!widget.is_loaded());

        state.fire_ready();
        assert!(widget.is_loaded());
        assert!(!widget.is_loading());
        assert_eq!(host.loaded_marks.get(), 1);
        assert_eq!(sink.count(MAP_LOADED), 1);
        assert_eq!(
            *state.layers.borrow(),
            vec![
                ("points".to_string(), "/points.geojson".to_string()),
                ("locations".to_string(), "/loc.geojson".to_string()),
            ]
        );
        assert!(state.enter.borrow().is_some());
        assert!(state.leave.borrow().is_some());
        assert!(state.click.borrow().is_some());

        // A duplicate ready event must not add layers twice.
        state.fire_ready();
        assert_eq!(state.layers.borrow().len(), 2);
    }

    #[test]
    fn test_map_ready_without_points_attaches_nothing() {
        let loader = Rc::new(CountingLoader::ok());
        let (mut pool, widget, _, state, _) =
            build(loader, config(Some("tok"), None, Some("/loc.geojson")));

        widget.toggle();
        pool.run_until_stalled();
        state.fire_ready();

        assert_eq!(
            *state.layers.borrow(),
            vec![("locations".to_string(), "/loc.geojson".to_string())]
        );
        assert!(state.enter.borrow().is_none());
        assert!(state.click.borrow().is_none());
        assert!(widget.is_loaded());
    }

    #[test]
    fn test_second_hover_replaces_popup() {
        let loader = Rc::new(CountingLoader::ok());
        let (mut pool, widget, _, state, _) = build(
            loader,
            config(Some("tok"), Some("/points.geojson"), None),
        );
        widget.toggle();
        pool.run_until_stalled();
        state.fire_ready();

        state.fire_enter(point("First", "/first"));
        assert_eq!(state.cursor.borrow().as_str(), "pointer");
        assert_eq!(state.popups_shown.get(), 1);

        state.fire_enter(point("Second", "/second"));
        assert_eq!(state.popups_shown.get(), 2);
        let live = state.live_popup.borrow();
        let (feature, _) = live.as_ref().unwrap();
        assert_eq!(feature.title, "Second");
        drop(live);

        state.fire_leave();
        assert_eq!(state.cursor.borrow().as_str(), "");
    }

    #[test]
    fn test_popup_click_tracks_url() {
        let loader = Rc::new(CountingLoader::ok());
        let (mut pool, widget, host, state, sink) = build(
            loader,
            config(Some("tok"), Some("/points.geojson"), None),
        );
        widget.toggle();
        pool.run_until_stalled();
        state.fire_ready();

        state.fire_enter(point("Belgrade", "/journal/belgrade"));
        state.click_popup();
        assert_eq!(
            sink.first_attrs(MAP_POINT_CLICKED).unwrap(),
            vec![("url".to_string(), "/journal/belgrade".to_string())]
        );
        // Popup clicks navigate through the anchor, not the host.
        assert!(host.opened.borrow().is_empty());
    }

    #[test]
    fn test_point_click_tracks_and_opens() {
        let loader = Rc::new(CountingLoader::ok());
        let (mut pool, widget, host, state, sink) = build(
            loader,
            config(Some("tok"), Some("/points.geojson"), None),
        );
        widget.toggle();
        pool.run_until_stalled();
        state.fire_ready();

        state.fire_click(point("Belgrade", "/journal/belgrade"));
        assert_eq!(sink.count(MAP_POINT_CLICKED), 1);
        assert_eq!(*host.opened.borrow(), vec!["/journal/belgrade".to_string()]);
    }

    #[test]
    fn test_toggle_after_loaded_does_not_reload() {
        let loader = Rc::new(CountingLoader::ok());
        let (mut pool, widget, _, state, _) =
            build(loader.clone(), config(Some("tok"), None, None));

        widget.toggle();
        pool.run_until_stalled();
        state.fire_ready();
        assert!(widget.is_loaded());

        widget.toggle();
        widget.toggle();
        pool.run_until_stalled();
        assert_eq!(loader.calls(), 1);
        assert_eq!(state.created.get(), 1);
    }
}
