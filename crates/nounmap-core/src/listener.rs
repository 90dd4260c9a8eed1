//! Replacement notification for long-lived handles.
//!
//! A component that keeps a [`MentionId`](crate::MentionId) or
//! [`PhraseMappingId`](crate::PhraseMappingId) across mutations registers a
//! listener on it. When the text state retires the handle (merge or removal),
//! every live listener receives exactly one `on_replaced` call naming the live
//! replacement, and its registration moves to the replacement.
//!
//! Listeners are held weakly: dropping the last `Arc` of a listener silently
//! unregisters it. Callbacks run while the text state is mutably borrowed, so
//! they cannot mutate it.

use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

pub trait ReplacementListener<Id>: Send + Sync {
    fn on_replaced(&self, retired: Id, replacement: Id);
}

/// Weak registration handle for a listener; the caller keeps the `Arc`
pub fn downgrade<Id, L>(listener: &Arc<L>) -> Weak<dyn ReplacementListener<Id>>
where
    L: ReplacementListener<Id> + 'static,
{
    let weak: Weak<L> = Arc::downgrade(listener);
    weak
}

/// Weak listener registrations of one mention or phrase mapping
pub(crate) struct ChangeListeners<Id> {
    listeners: Vec<Weak<dyn ReplacementListener<Id>>>,
}

impl<Id> Default for ChangeListeners<Id> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<Id: Copy> fmt::Debug for ChangeListeners<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeListeners")
            .field("live", &self.live_count())
            .finish()
    }
}

impl<Id: Copy> ChangeListeners<Id> {
    /// Register once; a listener already present is not added twice
    pub(crate) fn register(&mut self, listener: Weak<dyn ReplacementListener<Id>>) {
        self.listeners.retain(|l| l.strong_count() > 0);
        if !self.listeners.iter().any(|l| Weak::ptr_eq(l, &listener)) {
            self.listeners.push(listener);
        }
    }

    pub(crate) fn live_count(&self) -> usize {
        self.listeners.iter().filter(|l| l.strong_count() > 0).count()
    }

    /// Notify every live listener once and hand back their registrations
    pub(crate) fn notify_replaced(&mut self, retired: Id, replacement: Id) -> ChangeListeners<Id> {
        let mut survivors = ChangeListeners::default();
        for weak in self.listeners.drain(..) {
            if let Some(listener) = weak.upgrade() {
                listener.on_replaced(retired, replacement);
                survivors.listeners.push(weak);
            }
        }
        survivors
    }

    pub(crate) fn absorb(&mut self, other: ChangeListeners<Id>) {
        for listener in other.listeners {
            self.register(listener);
        }
    }
}

/// A handle that follows its replacements.
///
/// Register it on a mention or phrase mapping and read [`current`](Self::current)
/// whenever the handle is needed; it always names the live successor.
pub struct TrackedHandle<Id> {
    state: Mutex<TrackedState<Id>>,
}

struct TrackedState<Id> {
    current: Id,
    history: Vec<Id>,
}

impl<Id: Copy + Send> TrackedHandle<Id> {
    pub fn new(id: Id) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TrackedState {
                current: id,
                history: Vec::new(),
            }),
        })
    }

    pub fn current(&self) -> Id {
        self.state.lock().current
    }

    /// Handles retired so far, oldest first
    pub fn retired(&self) -> Vec<Id> {
        self.state.lock().history.clone()
    }

    pub fn replacement_count(&self) -> usize {
        self.state.lock().history.len()
    }
}

impl<Id: Copy + Send> ReplacementListener<Id> for TrackedHandle<Id> {
    fn on_replaced(&self, retired: Id, replacement: Id) {
        let mut state = self.state.lock();
        state.history.push(retired);
        state.current = replacement;
    }
}

impl<Id: Copy + Send + fmt::Debug> fmt::Debug for TrackedHandle<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedHandle")
            .field("current", &self.current())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_reaches_live_listeners_once_and_returns_them() {
        let kept = TrackedHandle::new(1u32);
        let dropped = TrackedHandle::new(1u32);
        let mut listeners = ChangeListeners::<u32>::default();
        let kept_weak = downgrade::<u32, _>(&kept);
        let dropped_weak = downgrade::<u32, _>(&dropped);
        listeners.register(kept_weak.clone());
        listeners.register(kept_weak);
        listeners.register(dropped_weak);
        drop(dropped);
        assert_eq!(listeners.live_count(), 1);

        let survivors = listeners.notify_replaced(1, 2);
        assert_eq!(kept.current(), 2);
        assert_eq!(kept.replacement_count(), 1);
        assert_eq!(survivors.live_count(), 1);
        assert_eq!(listeners.live_count(), 0);
    }

    #[test]
    fn tracked_handle_keeps_history() {
        let handle = TrackedHandle::new(10u64);
        handle.on_replaced(10, 11);
        handle.on_replaced(11, 12);
        assert_eq!(handle.current(), 12);
        assert_eq!(handle.retired(), vec![10, 11]);
    }
}
