//! Per-request feature bag.

use parking_lot::Mutex;
use std::{
    any::Any,
    borrow::Cow,
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

/// Key into a [`Features`] bag.
///
/// Named keys compare by string; symbol keys are unique per process and never
/// equal to any other key, whatever their description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeatureKey {
    /// A string key, conventionally namespaced (`request.body`).
    Named(Cow<'static, str>),
    /// A process-unique key.
    Symbol {
        /// Unique identity.
        id: u64,
        /// Human-readable label, not part of the identity.
        description: &'static str,
    },
}

impl FeatureKey {
    /// A string key usable in `const` items.
    pub const fn named(name: &'static str) -> Self {
        FeatureKey::Named(Cow::Borrowed(name))
    }

    /// A fresh key distinct from every other key.
    pub fn symbol(description: &'static str) -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        FeatureKey::Symbol {
            id: NEXT.fetch_add(1, Ordering::Relaxed),
            description,
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureKey::Named(name) => f.write_str(name),
            FeatureKey::Symbol { id, description } => write!(f, "Symbol({description}#{id})"),
        }
    }
}

impl From<&'static str> for FeatureKey {
    fn from(name: &'static str) -> Self {
        FeatureKey::named(name)
    }
}

impl From<String> for FeatureKey {
    fn from(name: String) -> Self {
        FeatureKey::Named(Cow::Owned(name))
    }
}

impl From<&FeatureKey> for FeatureKey {
    fn from(key: &FeatureKey) -> Self {
        key.clone()
    }
}

type Slot = Box<dyn Any + Send + Sync>;

/// A loosely typed key-value side channel shared by every phase of one request.
///
/// Clones share the same storage. Each access takes a short lock; there is no
/// cross-key synchronization, so listeners of one parallel emission writing
/// the same key race and the last write wins.
#[derive(Clone, Default)]
pub struct Features {
    slots: Arc<Mutex<HashMap<FeatureKey, Slot>>>,
}

impl Features {
    /// An empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<FeatureKey>, value: T) -> &Self {
        self.slots.lock().insert(key.into(), Box::new(value));
        self
    }

    /// Clone out a value. `None` if absent or of another type.
    pub fn get<T: Any + Clone>(&self, key: impl Into<FeatureKey>) -> Option<T> {
        self.with(key, T::clone)
    }

    /// Borrow a value for the duration of `f`.
    ///
    /// `f` runs under the bag's lock and must not access the bag.
    pub fn with<T: Any, R>(&self, key: impl Into<FeatureKey>, f: impl FnOnce(&T) -> R) -> Option<R> {
        let slots = self.slots.lock();
        slots.get(&key.into())?.downcast_ref::<T>().map(f)
    }

    /// Remove and return a value. A value of another type is left in place.
    pub fn take<T: Any>(&self, key: impl Into<FeatureKey>) -> Option<T> {
        let key = key.into();
        let mut slots = self.slots.lock();
        if !slots.get(&key)?.is::<T>() {
            return None;
        }
        slots
            .remove(&key)
            .and_then(|slot| slot.downcast::<T>().ok())
            .map(|value| *value)
    }

    /// Whether a value is stored under `key`.
    pub fn has(&self, key: impl Into<FeatureKey>) -> bool {
        self.slots.lock().contains_key(&key.into())
    }

    /// Remove a value of any type. Returns whether one was present.
    pub fn remove(&self, key: impl Into<FeatureKey>) -> bool {
        self.slots.lock().remove(&key.into()).is_some()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Snapshot of the stored keys.
    pub fn keys(&self) -> Vec<FeatureKey> {
        self.slots.lock().keys().cloned().collect()
    }
}

impl fmt::Debug for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_has() {
        let features = Features::new();
        features.set("foo", String::from("bar"));
        assert_eq!(features.get::<String>("foo").as_deref(), Some("bar"));
        assert!(features.has("foo"));
        assert!(!features.has("bar"));
        assert_eq!(features.get::<u64>("foo"), None);
    }

    #[test]
    fn test_symbols_never_collide() {
        let features = Features::new();
        let a = FeatureKey::symbol("body");
        let b = FeatureKey::symbol("body");
        features.set(&a, 1u64).set(&b, 2u64);
        assert_eq!(features.get::<u64>(&a), Some(1));
        assert_eq!(features.get::<u64>(&b), Some(2));
    }

    #[test]
    fn test_namespaced_keys_are_distinct() {
        let features = Features::new();
        features.set("request.body", 1u64).set("response.body", 2u64);
        assert_eq!(features.len(), 2);
    }

    #[test]
    fn test_take_checks_type() {
        let features = Features::new();
        features.set("n", 5u64);
        assert_eq!(features.take::<String>("n"), None);
        assert_eq!(features.take::<u64>("n"), Some(5));
        assert!(features.is_empty());
    }
}
