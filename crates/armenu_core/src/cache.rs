//! Decoded model cache
//!
//! Keyed by asset key, never evicted. A key is decoded at most once while its
//! load is in flight: later requests get a clone of the same shared future.
//! The future writes its own result back into the map, so the entry appears
//! even if the caller that started it has moved on. Failed loads leave no
//! entry behind and are retried on the next request.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use futures_util::future::{FutureExt, LocalBoxFuture, Shared};

use crate::error::LoadError;

/// Produces decoded models from asset paths
pub trait ModelLoader {
    type Model: 'static;

    fn load(&self, path: &str) -> LocalBoxFuture<'static, Result<Self::Model, LoadError>>;
}

/// A de-duplicated in-flight load
pub type SharedLoad<M> = Shared<LocalBoxFuture<'static, Result<Rc<M>, LoadError>>>;

/// Result of a cache lookup
pub enum Lookup<M> {
    Ready(Rc<M>),
    Pending(SharedLoad<M>),
}

impl<M> Lookup<M> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Lookup::Ready(_))
    }
}

enum Slot<M> {
    Ready(Rc<M>),
    Loading(SharedLoad<M>),
}

type Slots<M> = Rc<RefCell<HashMap<String, Slot<M>>>>;

pub struct ModelCache<L: ModelLoader> {
    loader: L,
    slots: Slots<L::Model>,
    decodes: Cell<u64>,
}

impl<L: ModelLoader> ModelCache<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            slots: Rc::new(RefCell::new(HashMap::new())),
            decodes: Cell::new(0),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Cached model, in-flight load, or a freshly started load
    pub fn get_or_load(&self, key: &str, path: &str) -> Lookup<L::Model> {
        if let Some(slot) = self.slots.borrow().get(key) {
            return match slot {
                Slot::Ready(model) => Lookup::Ready(Rc::clone(model)),
                Slot::Loading(load) => Lookup::Pending(load.clone()),
            };
        }

        log::debug!("Loading model '{}' from {}", key, path);
        self.decodes.set(self.decodes.get() + 1);

        let load = store_on_completion(
            Rc::downgrade(&self.slots),
            key.to_string(),
            self.loader.load(path),
        )
        .boxed_local()
        .shared();

        self.slots
            .borrow_mut()
            .insert(key.to_string(), Slot::Loading(load.clone()));
        Lookup::Pending(load)
    }

    /// Cached model, without starting a load
    pub fn get(&self, key: &str) -> Option<Rc<L::Model>> {
        match self.slots.borrow().get(key) {
            Some(Slot::Ready(model)) => Some(Rc::clone(model)),
            _ => None,
        }
    }

    /// Whether a decoded model is stored under `key`
    pub fn contains(&self, key: &str) -> bool {
        matches!(self.slots.borrow().get(key), Some(Slot::Ready(_)))
    }

    pub fn is_loading(&self, key: &str) -> bool {
        matches!(self.slots.borrow().get(key), Some(Slot::Loading(_)))
    }

    /// Number of decoded models
    pub fn len(&self) -> usize {
        self.slots
            .borrow()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of loads started over the cache's lifetime
    pub fn decode_count(&self) -> u64 {
        self.decodes.get()
    }
}

async fn store_on_completion<M: 'static>(
    slots: Weak<RefCell<HashMap<String, Slot<M>>>>,
    key: String,
    load: LocalBoxFuture<'static, Result<M, LoadError>>,
) -> Result<Rc<M>, LoadError> {
    let result = load.await.map(Rc::new);

    // Cache already dropped (viewer unmounted): nothing to record
    let Some(slots) = slots.upgrade() else {
        return result;
    };
    let mut slots = slots.borrow_mut();
    match &result {
        Ok(model) => {
            log::info!("Model '{}' decoded", key);
            slots.insert(key, Slot::Ready(Rc::clone(model)));
        }
        Err(err) => {
            log::error!("Model '{}' failed to load: {}", key, err);
            slots.remove(&key);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use futures::executor::block_on;

    /// Loads complete only when the test sends the result
    #[derive(Default)]
    struct Gate {
        senders: RefCell<Vec<oneshot::Sender<Result<String, LoadError>>>>,
    }

    impl ModelLoader for Rc<Gate> {
        type Model = String;

        fn load(&self, path: &str) -> LocalBoxFuture<'static, Result<String, LoadError>> {
            let (tx, rx) = oneshot::channel();
            self.senders.borrow_mut().push(tx);
            let path = path.to_string();
            async move { rx.await.unwrap_or_else(|_| Err(LoadError::fetch(path, "dropped"))) }
                .boxed_local()
        }
    }

    impl Gate {
        fn resolve(&self, result: Result<String, LoadError>) {
            let tx = self.senders.borrow_mut().remove(0);
            tx.send(result).unwrap();
        }
    }

    fn pending(lookup: Lookup<String>) -> SharedLoad<String> {
        match lookup {
            Lookup::Pending(load) => load,
            Lookup::Ready(_) => panic!("expected a pending load"),
        }
    }

    #[test]
    fn test_concurrent_requests_share_one_decode() {
        let gate = Rc::new(Gate::default());
        let cache = ModelCache::new(Rc::clone(&gate));

        let a = pending(cache.get_or_load("pizza", "/models/pizza.gltf"));
        let b = pending(cache.get_or_load("pizza", "/models/pizza.gltf"));
        assert_eq!(cache.decode_count(), 1);
        assert!(cache.is_loading("pizza"));

        gate.resolve(Ok("pizza mesh".into()));
        let a = block_on(a).unwrap();
        let b = block_on(b).unwrap();
        assert!(Rc::ptr_eq(&a, &b));

        match cache.get_or_load("pizza", "/models/pizza.gltf") {
            Lookup::Ready(c) => assert!(Rc::ptr_eq(&a, &c)),
            Lookup::Pending(_) => panic!("expected cached model"),
        }
        assert_eq!(cache.decode_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failure_leaves_no_entry_and_retries() {
        let gate = Rc::new(Gate::default());
        let cache = ModelCache::new(Rc::clone(&gate));

        let load = pending(cache.get_or_load("beer", "/models/beer.glb"));
        gate.resolve(Err(LoadError::decode("/models/beer.glb", "truncated")));
        assert!(block_on(load).is_err());
        assert!(!cache.contains("beer"));
        assert!(!cache.is_loading("beer"));

        let retry = pending(cache.get_or_load("beer", "/models/beer.glb"));
        assert_eq!(cache.decode_count(), 2);
        gate.resolve(Ok("beer mesh".into()));
        assert_eq!(*block_on(retry).unwrap(), "beer mesh");
        assert!(cache.contains("beer"));
    }

    #[test]
    fn test_entry_recorded_after_cache_user_moves_on() {
        let gate = Rc::new(Gate::default());
        let cache = ModelCache::new(Rc::clone(&gate));

        let load = pending(cache.get_or_load("pasta", "/models/pasta.glb"));
        gate.resolve(Ok("pasta mesh".into()));
        // Whoever polls the shared future, the cache records the result
        block_on(load.clone()).unwrap();
        drop(load);
        assert_eq!(cache.get("pasta").as_deref().map(String::as_str), Some("pasta mesh"));
    }

    #[test]
    fn test_load_outliving_cache() {
        let gate = Rc::new(Gate::default());
        let cache = ModelCache::new(Rc::clone(&gate));
        let load = pending(cache.get_or_load("murg", "/models/murg.glb"));
        drop(cache);

        gate.resolve(Ok("murg mesh".into()));
        assert_eq!(*block_on(load).unwrap(), "murg mesh");
    }
}
