use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::error::ScriptError;

/// Loads an external script resource and resolves when it has executed.
///
/// One injection per call; deduplication is the caller's job (the map
/// widget guards with its own loading flag).
#[async_trait(?Send)]
pub trait ScriptLoader {
    async fn load(&self, url: &str) -> Result<(), ScriptError>;
}

/// Spawns a future onto the page's single-threaded event loop.
pub trait Spawn {
    fn spawn(&self, fut: Pin<Box<dyn Future<Output = ()> + 'static>>);
}

// Scriptable loaders and spawners for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod fakes {
    use super::*;
    use futures::channel::oneshot;
    use futures::executor::LocalSpawner;
    use futures::task::LocalSpawnExt;
    use std::cell::{Cell, RefCell};

    /// Loader that completes immediately with a fixed result.
    pub struct CountingLoader {
        calls: Cell<usize>,
        result: RefCell<Result<(), ScriptError>>,
    }

    impl CountingLoader {
        pub fn ok() -> Self {
            Self {
                calls: Cell::new(0),
                result: RefCell::new(Ok(())),
            }
        }

        pub fn failing(url: &str) -> Self {
            Self {
                calls: Cell::new(0),
                result: RefCell::new(Err(ScriptError::Load(url.to_string()))),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.get()
        }

        /// Change the result returned by subsequent loads.
        pub fn set_result(&self, result: Result<(), ScriptError>) {
            *self.result.borrow_mut() = result;
        }
    }

    #[async_trait(?Send)]
    impl ScriptLoader for CountingLoader {
        async fn load(&self, _url: &str) -> Result<(), ScriptError> {
            self.calls.set(self.calls.get() + 1);
            self.result.borrow().clone()
        }
    }

    /// Loader whose futures stay pending until the test completes them.
    #[derive(Default)]
    pub struct PendingLoader {
        calls: Cell<usize>,
        waiters: RefCell<Vec<oneshot::Sender<Result<(), ScriptError>>>>,
    }

    impl PendingLoader {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> usize {
            self.calls.get()
        }

        /// Complete every in-flight load with the given result.
        pub fn complete_all(&self, result: Result<(), ScriptError>) {
            for waiter in self.waiters.borrow_mut().drain(..) {
                let _ = waiter.send(result.clone());
            }
        }
    }

    #[async_trait(?Send)]
    impl ScriptLoader for PendingLoader {
        async fn load(&self, url: &str) -> Result<(), ScriptError> {
            self.calls.set(self.calls.get() + 1);
            let (tx, rx) = oneshot::channel();
            self.waiters.borrow_mut().push(tx);
            rx.await
                .unwrap_or_else(|_| Err(ScriptError::Load(url.to_string())))
        }
    }

    /// Spawner backed by a `futures` local pool, driven by the test.
    pub struct PoolSpawn {
        spawner: LocalSpawner,
    }

    impl PoolSpawn {
        pub fn new(spawner: LocalSpawner) -> Self {
            Self { spawner }
        }
    }

    impl Spawn for PoolSpawn {
        fn spawn(&self, fut: Pin<Box<dyn Future<Output = ()> + 'static>>) {
            self.spawner.spawn_local(fut).expect("spawn on local pool");
        }
    }
}
