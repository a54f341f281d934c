use std::rc::Rc;

use crate::event::{
    self, EventSink, IMAGE_LOADING_FAILED, PAGE_BOTTOM_VIEWED, PIC_ACTION_FAILED,
};
use crate::ledger::LikeLedger;

/// Fraction of a figure's area that must be inside the viewport for it
/// to count as revealed.
pub const VISIBILITY_THRESHOLD: f64 = 0.25;

/// One content figure, built once from the document at page load.
#[derive(Debug, Clone)]
pub struct Figure {
    pub src: String,
    pub loaded: bool,
    pub visible: bool,
    pub liked: bool,
}

/// Outcome of a visibility callback: keep watching or cancel the watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watch {
    Keep,
    Unwatch,
}

/// Writes derived figure state back to the document as data attributes.
pub trait FigureHost {
    fn set_loaded(&self, index: usize, loaded: bool);
    fn set_visible(&self, index: usize);
    fn set_liked(&self, index: usize, liked: bool);
}

/// The page's figure collection: reveal tracking, image load state and
/// the like toggle.
pub struct Figures {
    figures: Vec<Figure>,
    host: Rc<dyn FigureHost>,
    sink: Option<Rc<dyn EventSink>>,
    ledger: LikeLedger,
    path: String,
    bottom_seen: bool,
}

impl Figures {
    /// Build the figure records from the document's sources and the
    /// images' completion state at registration time. Liked flags come
    /// from the persisted ledger; initial state is mirrored to the host.
    pub fn new(
        sources: Vec<String>,
        complete: &[bool],
        ledger: LikeLedger,
        host: Rc<dyn FigureHost>,
        sink: Option<Rc<dyn EventSink>>,
        path: String,
    ) -> Self {
        let likes = ledger.get();
        let figures: Vec<Figure> = sources
            .into_iter()
            .enumerate()
            .map(|(index, src)| Figure {
                loaded: complete.get(index).copied().unwrap_or(false),
                visible: false,
                liked: likes.contains(&src),
                src,
            })
            .collect();
        for (index, figure) in figures.iter().enumerate() {
            host.set_loaded(index, figure.loaded);
            host.set_liked(index, figure.liked);
        }
        Self {
            figures,
            host,
            sink,
            ledger,
            path,
            bottom_seen: false,
        }
    }

    pub fn len(&self) -> usize {
        self.figures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.figures.is_empty()
    }

    pub fn figure(&self, index: usize) -> Option<&Figure> {
        self.figures.get(index)
    }

    /// One-shot reveal transition, driven by the platform's intersection
    /// callbacks. Returns `Watch::Unwatch` once the figure has crossed
    /// the threshold; the transition never reverts.
    ///
    /// The "page-bottom-viewed" emission is gated on the last-in-order
    /// figure's own crossing, independent of delivery order.
    pub fn on_visibility(&mut self, index: usize, intersecting: bool) -> Watch {
        let last_index = self.figures.len().saturating_sub(1);
        let figure = match self.figures.get_mut(index) {
            Some(figure) => figure,
            None => return Watch::Unwatch,
        };
        if !intersecting {
            return Watch::Keep;
        }
        if figure.visible {
            return Watch::Unwatch;
        }
        figure.visible = true;
        self.host.set_visible(index);
        if index == last_index && !self.bottom_seen {
            self.bottom_seen = true;
            if let Some(sink) = &self.sink {
                sink.track(PAGE_BOTTOM_VIEWED, &[("path", &self.path)]);
            }
        }
        Watch::Unwatch
    }

    pub fn on_image_loaded(&mut self, index: usize) {
        if let Some(figure) = self.figures.get_mut(index) {
            figure.loaded = true;
            self.host.set_loaded(index, true);
        }
    }

    pub fn on_image_error(&mut self, index: usize) {
        let figure = match self.figures.get(index) {
            Some(figure) => figure,
            None => return,
        };
        if let Some(sink) = &self.sink {
            sink.track(IMAGE_LOADING_FAILED, &[("src", &figure.src)]);
        }
    }

    /// Flip the liked flag and persist it. No-op while the underlying
    /// image has not finished loading. A failed write is reported via
    /// the sink; the in-memory flag is not rolled back.
    pub fn toggle_like(&mut self, index: usize) {
        let figure = match self.figures.get_mut(index) {
            Some(figure) => figure,
            None => return,
        };
        if !figure.loaded {
            return;
        }
        figure.liked = !figure.liked;
        let liked = figure.liked;
        let src = figure.src.clone();
        self.host.set_liked(index, liked);
        if let Some(sink) = &self.sink {
            let name = if liked { event::PIC_LIKED } else { event::PIC_UNLIKED };
            sink.track(name, &[("src", &src)]);
        }
        if let Err(err) = self.ledger.set_liked(&src, liked) {
            tracing::warn!("persisting like for {src} failed: {err}");
            if let Some(sink) = &self.sink {
                sink.track(PIC_ACTION_FAILED, &[("err", &err.to_string())]);
            }
        }
    }
}

// Host fake for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod fakes {
    use super::FigureHost;
    use std::cell::RefCell;

    /// Host that records every attribute write.
    #[derive(Default)]
    pub struct RecordingFigureHost {
        pub writes: RefCell<Vec<(usize, String, String)>>,
    }

    impl RecordingFigureHost {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn count(&self, index: usize, attr: &str) -> usize {
            self.writes
                .borrow()
                .iter()
                .filter(|(i, name, _)| *i == index && name == attr)
                .count()
        }
    }

    impl FigureHost for RecordingFigureHost {
        fn set_loaded(&self, index: usize, loaded: bool) {
            self.writes.borrow_mut().push((
                index,
                "loaded".to_string(),
                loaded.to_string(),
            ));
        }

        fn set_visible(&self, index: usize) {
            self.writes
                .borrow_mut()
                .push((index, "visible".to_string(), "true".to_string()));
        }

        fn set_liked(&self, index: usize, liked: bool) {
            self.writes
                .borrow_mut()
                .push((index, "liked".to_string(), liked.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::RecordingFigureHost;
    use super::*;
    use crate::event::recording::RecordingSink;
    use crate::event::{PIC_LIKED, PIC_UNLIKED};
    use crate::storage::memory::{FailingStore, MemoryStore};
    use crate::storage::KeyValueStore;

    fn make_figures(
        sources: &[&str],
        complete: &[bool],
        store: Rc<dyn KeyValueStore>,
        sink: Option<Rc<RecordingSink>>,
    ) -> Figures {
        Figures::new(
            sources.iter().map(|s| s.to_string()).collect(),
            complete,
            LikeLedger::new(store),
            Rc::new(RecordingFigureHost::new()),
            sink.map(|s| s as Rc<dyn EventSink>),
            "/journal/serbia".to_string(),
        )
    }

    #[test]
    fn test_reveal_is_one_shot() {
        let sink = Rc::new(RecordingSink::new());
        let mut figures = make_figures(
            &["a.jpg", "b.jpg"],
            &[true, true],
            Rc::new(MemoryStore::new()),
            Some(sink.clone()),
        );

        assert_eq!(figures.on_visibility(0, false), Watch::Keep);
        assert!(!figures.figure(0).unwrap().visible);

        assert_eq!(figures.on_visibility(0, true), Watch::Unwatch);
        assert!(figures.figure(0).unwrap().visible);

        // A late duplicate delivery must not revert or re-fire anything.
        assert_eq!(figures.on_visibility(0, true), Watch::Unwatch);
        assert!(figures.figure(0).unwrap().visible);
    }

    #[test]
    fn test_page_bottom_viewed_fires_once_on_last_figure() {
        let sink = Rc::new(RecordingSink::new());
        let mut figures = make_figures(
            &["a.jpg", "b.jpg", "c.jpg"],
            &[true, true, true],
            Rc::new(MemoryStore::new()),
            Some(sink.clone()),
        );

        // Deliveries arrive out of document order; only the last figure's
        // own crossing fires the event.
        figures.on_visibility(1, true);
        figures.on_visibility(0, true);
        assert_eq!(sink.count(PAGE_BOTTOM_VIEWED), 0);

        figures.on_visibility(2, true);
        assert_eq!(sink.count(PAGE_BOTTOM_VIEWED), 1);
        assert_eq!(
            sink.first_attrs(PAGE_BOTTOM_VIEWED).unwrap(),
            vec![("path".to_string(), "/journal/serbia".to_string())]
        );

        figures.on_visibility(2, true);
        assert_eq!(sink.count(PAGE_BOTTOM_VIEWED), 1);
    }

    #[test]
    fn test_toggle_like_round_trip() {
        let sink = Rc::new(RecordingSink::new());
        let store = Rc::new(MemoryStore::new());
        let mut figures = make_figures(
            &["a.jpg"],
            &[true],
            store.clone(),
            Some(sink.clone()),
        );

        figures.toggle_like(0);
        assert!(figures.figure(0).unwrap().liked);
        assert_eq!(sink.count(PIC_LIKED), 1);
        assert!(LikeLedger::new(store.clone()).get().contains("a.jpg"));

        figures.toggle_like(0);
        assert!(!figures.figure(0).unwrap().liked);
        assert_eq!(sink.count(PIC_UNLIKED), 1);
        assert!(LikeLedger::new(store).get().is_empty());
    }

    #[test]
    fn test_toggle_like_is_noop_before_image_loads() {
        let sink = Rc::new(RecordingSink::new());
        let store = Rc::new(MemoryStore::new());
        let mut figures = make_figures(
            &["a.jpg"],
            &[false],
            store.clone(),
            Some(sink.clone()),
        );

        figures.toggle_like(0);
        assert!(!figures.figure(0).unwrap().liked);
        assert!(sink.events().is_empty());
        assert!(LikeLedger::new(store.clone()).get().is_empty());

        // After the load callback the toggle goes through.
        figures.on_image_loaded(0);
        figures.toggle_like(0);
        assert!(figures.figure(0).unwrap().liked);
        assert!(LikeLedger::new(store).get().contains("a.jpg"));
    }

    #[test]
    fn test_persist_failure_keeps_flag_and_reports() {
        let sink = Rc::new(RecordingSink::new());
        let mut figures = make_figures(
            &["a.jpg"],
            &[true],
            Rc::new(FailingStore),
            Some(sink.clone()),
        );

        figures.toggle_like(0);
        assert!(figures.figure(0).unwrap().liked);
        assert_eq!(sink.count(PIC_LIKED), 1);
        assert_eq!(sink.count(PIC_ACTION_FAILED), 1);
        let attrs = sink.first_attrs(PIC_ACTION_FAILED).unwrap();
        assert_eq!(attrs[0].0, "err");
        assert!(attrs[0].1.contains("quota exceeded"));
    }

    #[test]
    fn test_image_error_reports_src() {
        let sink = Rc::new(RecordingSink::new());
        let mut figures = make_figures(
            &["broken.jpg"],
            &[false],
            Rc::new(MemoryStore::new()),
            Some(sink.clone()),
        );

        figures.on_image_error(0);
        assert_eq!(
            sink.first_attrs(IMAGE_LOADING_FAILED).unwrap(),
            vec![("src".to_string(), "broken.jpg".to_string())]
        );
    }

    #[test]
    fn test_liked_flag_seeded_from_ledger() {
        let store = Rc::new(MemoryStore::new());
        store.seed(crate::ledger::STORAGE_KEY, r#"["b.jpg"]"#);
        let figures = make_figures(&["a.jpg", "b.jpg"], &[true, true], store, None);

        assert!(!figures.figure(0).unwrap().liked);
        assert!(figures.figure(1).unwrap().liked);
    }
}
