//! Priority-ordered listener registry owned by one emitter.

use crate::{
    event::EventName,
    listener::{ListenerId, ListenerOptions},
};
use std::{collections::HashMap, sync::Arc};

/// One registration.
pub(crate) struct Entry<L: ?Sized> {
    pub(crate) id: ListenerId,
    pub(crate) listener: Arc<L>,
    pub(crate) options: ListenerOptions,
}

impl<L: ?Sized> Clone for Entry<L> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            listener: Arc::clone(&self.listener),
            options: self.options,
        }
    }
}

/// Registrations keyed by event name, each list kept in dispatch order.
pub(crate) struct ListenerRegistry<L: ?Sized> {
    entries: HashMap<EventName, Vec<Entry<L>>>,
}

impl<L: ?Sized> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<L: ?Sized> ListenerRegistry<L> {
    /// Insert after every entry of greater or equal priority.
    pub(crate) fn insert(
        &mut self,
        name: EventName,
        id: ListenerId,
        listener: Arc<L>,
        options: ListenerOptions,
    ) {
        let list = self.entries.entry(name).or_default();
        let at = list.partition_point(|e| e.options.priority >= options.priority);
        list.insert(
            at,
            Entry {
                id,
                listener,
                options,
            },
        );
    }

    pub(crate) fn remove(&mut self, name: &EventName, id: ListenerId) -> Option<Entry<L>> {
        let list = self.entries.get_mut(name)?;
        let pos = list.iter().position(|e| e.id == id)?;
        let entry = list.remove(pos);
        if list.is_empty() {
            self.entries.remove(name);
        }
        Some(entry)
    }

    pub(crate) fn contains(&self, name: &EventName, listener: &Arc<L>) -> bool {
        self.entries.get(name).is_some_and(|list| {
            list.iter()
                .any(|e| std::ptr::addr_eq(Arc::as_ptr(&e.listener), Arc::as_ptr(listener)))
        })
    }

    pub(crate) fn count(&self, name: &EventName) -> usize {
        self.entries.get(name).map_or(0, Vec::len)
    }

    /// Copy the dispatch list for `name`.
    ///
    /// `once` entries stay registered until the dispatcher claims them with
    /// [`remove`](Self::remove) right before invoking them.
    pub(crate) fn snapshot(&self, name: &EventName) -> Vec<Entry<L>> {
        self.entries.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::Phase,
        listener::{DynListener, from_sync_fn},
    };

    type Registry = ListenerRegistry<dyn DynListener<()>>;

    fn noop() -> Arc<dyn DynListener<()>> {
        Arc::new(from_sync_fn(|_: &crate::event::Event<()>| ()))
    }

    fn add(
        registry: &mut Registry,
        name: &EventName,
        listener: Arc<dyn DynListener<()>>,
        options: ListenerOptions,
    ) -> ListenerId {
        let id = ListenerId::next();
        registry.insert(name.clone(), id, listener, options);
        id
    }

    #[test]
    fn test_priority_then_insertion_order() {
        let mut registry = Registry::default();
        let name = EventName::from(Phase::Request);
        let low = add(&mut registry, &name, noop(), ListenerOptions::new().priority(-1));
        let first = add(&mut registry, &name, noop(), ListenerOptions::new());
        let high = add(&mut registry, &name, noop(), ListenerOptions::new().priority(5));
        let second = add(&mut registry, &name, noop(), ListenerOptions::new());

        let order: Vec<_> = registry.snapshot(&name).iter().map(|e| e.id).collect();
        assert_eq!(order, vec![high, first, second, low]);
    }

    #[test]
    fn test_snapshot_keeps_once_entries() {
        let mut registry = Registry::default();
        let name = EventName::from(Phase::Finish);
        let once = add(&mut registry, &name, noop(), ListenerOptions::new().once());
        add(&mut registry, &name, noop(), ListenerOptions::new());

        assert_eq!(registry.snapshot(&name).len(), 2);
        assert_eq!(registry.count(&name), 2);

        // Claiming succeeds exactly once.
        assert!(registry.remove(&name, once).is_some());
        assert!(registry.remove(&name, once).is_none());
        assert_eq!(registry.count(&name), 1);
    }

    #[test]
    fn test_contains_by_identity() {
        let mut registry = Registry::default();
        let name = EventName::from(Phase::Request);
        let listener = noop();
        let id = add(&mut registry, &name, Arc::clone(&listener), ListenerOptions::new());

        assert!(registry.contains(&name, &listener));
        assert!(!registry.contains(&name, &noop()));
        assert!(registry.remove(&name, id).is_some());
        assert!(!registry.contains(&name, &listener));
    }
}
