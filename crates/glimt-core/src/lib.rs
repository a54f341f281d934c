pub mod error;
pub mod event;
pub mod figure;
pub mod ledger;
pub mod map;
pub mod script;
pub mod storage;

pub use error::{MapError, ScriptError, StorageError};
pub use event::EventSink;
pub use figure::{Figure, FigureHost, Figures, Watch, VISIBILITY_THRESHOLD};
pub use ledger::LikeLedger;
pub use map::config::MapConfig;
pub use map::feature::{popup_html, PointFeature};
pub use map::widget::{MapApi, MapHandle, MapHost, MapParams, MapWidget};
pub use script::{ScriptLoader, Spawn};
pub use storage::KeyValueStore;
