/// Fire-and-forget analytics capability.
///
/// Implementations must never propagate failure to the caller; a broken
/// sink degrades to silence. Presence is optional everywhere: components
/// hold an `Option<Rc<dyn EventSink>>` resolved once at wiring time.
pub trait EventSink {
    fn track(&self, event: &str, attrs: &[(&str, &str)]);
}

pub const MAP_LOADED: &str = "map-loaded";
pub const MAP_POINT_CLICKED: &str = "map-point-clicked";
pub const PAGE_BOTTOM_VIEWED: &str = "page-bottom-viewed";
pub const IMAGE_LOADING_FAILED: &str = "image-loading-failed";
pub const PIC_LIKED: &str = "pic-liked";
pub const PIC_UNLIKED: &str = "pic-unliked";
pub const PIC_ACTION_FAILED: &str = "pic-action-failed";

// In-memory sink for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod recording {
    use super::EventSink;
    use std::cell::RefCell;

    /// Sink that records every tracked event for assertions.
    #[derive(Default)]
    pub struct RecordingSink {
        events: RefCell<Vec<(String, Vec<(String, String)>)>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<(String, Vec<(String, String)>)> {
            self.events.borrow().clone()
        }

        /// Number of recorded events with the given name.
        pub fn count(&self, event: &str) -> usize {
            self.events
                .borrow()
                .iter()
                .filter(|(name, _)| name == event)
                .count()
        }

        /// Attributes of the first recorded event with the given name.
        pub fn first_attrs(&self, event: &str) -> Option<Vec<(String, String)>> {
            self.events
                .borrow()
                .iter()
                .find(|(name, _)| name == event)
                .map(|(_, attrs)| attrs.clone())
        }
    }

    impl EventSink for RecordingSink {
        fn track(&self, event: &str, attrs: &[(&str, &str)]) {
            let attrs = attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.events.borrow_mut().push((event.to_string(), attrs));
        }
    }
}
