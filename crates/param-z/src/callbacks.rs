//! Handle-addressed callback lists.
//!
//! Callbacks live in a [`Slab`] and are addressed by a [`CallbackHandle`]
//! carrying the slot key plus a generation stamp, so a stale handle whose
//! slot was reused cannot remove somebody else's callback.
//!
//! Emission clones the callback `Arc`s out of the slab first and invokes
//! them with the lock released. A callback may therefore add or remove
//! callbacks (including itself) without deadlocking.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use slab::Slab;

pub type Callback<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Opaque removal token returned by [`CallbackList::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle {
    key: usize,
    generation: u64,
}

struct Slot<A: ?Sized> {
    generation: u64,
    callback: Callback<A>,
}

pub struct CallbackList<A: ?Sized> {
    slots: Mutex<Slab<Slot<A>>>,
    generation: AtomicU64,
}

impl<A: ?Sized> Default for CallbackList<A> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(Slab::new()),
            generation: AtomicU64::new(0),
        }
    }
}

impl<A: ?Sized> std::fmt::Debug for CallbackList<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackList")
            .field("len", &self.len())
            .finish()
    }
}

impl<A: ?Sized> CallbackList<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`. The returned flag is `true` when the list was
    /// empty before this call.
    pub fn add<F>(&self, callback: F) -> (CallbackHandle, bool)
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let mut slots = self.slots.lock();
        let first = slots.is_empty();
        let key = slots.insert(Slot {
            generation,
            callback: Arc::new(callback),
        });
        (CallbackHandle { key, generation }, first)
    }

    /// Removes the callback behind `handle`.
    ///
    /// Returns `None` for unknown or stale handles, otherwise whether the list
    /// became empty.
    pub fn remove(&self, handle: CallbackHandle) -> Option<bool> {
        let mut slots = self.slots.lock();
        match slots.get(handle.key) {
            Some(slot) if slot.generation == handle.generation => {
                slots.remove(handle.key);
                Some(slots.is_empty())
            }
            _ => None,
        }
    }

    /// Drops every callback, returning how many were registered.
    pub fn clear(&self) -> usize {
        let mut slots = self.slots.lock();
        let n = slots.len();
        slots.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Invokes every callback in slot order.
    pub fn emit(&self, arg: &A) {
        let snapshot: Vec<Callback<A>> = {
            let slots = self.slots.lock();
            if slots.is_empty() {
                return;
            }
            slots.iter().map(|(_, s)| Arc::clone(&s.callback)).collect()
        };
        for cb in snapshot {
            cb(arg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn first_and_last_are_reported() {
        let list = CallbackList::<i32>::new();
        let (a, first) = list.add(|_| {});
        assert!(first);
        let (b, first) = list.add(|_| {});
        assert!(!first);

        assert_eq!(list.remove(a), Some(false));
        assert_eq!(list.remove(b), Some(true));
        assert_eq!(list.remove(b), None);
    }

    #[test]
    fn stale_handle_does_not_remove_reused_slot() {
        let list = CallbackList::<i32>::new();
        let (old, _) = list.add(|_| {});
        list.remove(old);
        let (fresh, _) = list.add(|_| {});

        assert_eq!(list.remove(old), None);
        assert_eq!(list.len(), 1);
        assert_eq!(list.remove(fresh), Some(true));
    }

    #[test]
    fn callback_can_remove_itself_during_emit() {
        let list = Arc::new(CallbackList::<i32>::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let slot = Arc::new(Mutex::new(None::<CallbackHandle>));

        let (handle, _) = {
            let list2 = Arc::clone(&list);
            let hits = Arc::clone(&hits);
            let slot = Arc::clone(&slot);
            list.add(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                if let Some(h) = slot.lock().take() {
                    list2.remove(h);
                }
            })
        };
        *slot.lock() = Some(handle);

        list.emit(&1);
        list.emit(&2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(list.is_empty());
    }
}
