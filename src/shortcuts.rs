//! Global keyboard shortcuts
//!
//! Listeners subscribe to a [`ShortcutRegistry`] and get a [`Subscription`]
//! back. Dropping the subscription removes the listener, so a view that
//! goes away cannot keep reacting to keys.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace;

/// Actions bound to global keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// `n`: open the quick-add box
    QuickAdd,
    /// `/` or Ctrl+K: focus the search field
    FocusSearch,
}

/// A key press together with the Ctrl modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord {
    pub key: char,
    pub ctrl: bool,
}

impl KeyChord {
    pub fn plain(key: char) -> Self {
        Self { key, ctrl: false }
    }

    pub fn ctrl(key: char) -> Self {
        Self { key, ctrl: true }
    }
}

impl Shortcut {
    pub fn from_chord(chord: KeyChord) -> Option<Self> {
        match (chord.key.to_ascii_lowercase(), chord.ctrl) {
            ('n', false) => Some(Shortcut::QuickAdd),
            ('/', false) | ('k', true) => Some(Shortcut::FocusSearch),
            _ => None,
        }
    }
}

type Listener = Box<dyn FnMut(Shortcut)>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
    dispatching: bool,
    // Dropped while their listener was taken out for a dispatch
    cancelled: Vec<u64>,
}

/// Single-threaded registry of shortcut listeners
#[derive(Clone, Default)]
pub struct ShortcutRegistry {
    inner: Rc<RefCell<Listeners>>,
}

impl ShortcutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener until the returned guard is dropped
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, listener: impl FnMut(Shortcut) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push((id, Box::new(listener)));
        Subscription {
            id,
            registry: Rc::downgrade(&self.inner),
        }
    }

    /// Deliver the shortcut bound to `chord`, returns how many listeners ran
    ///
    /// Listeners are taken out of the registry while they run, so a callback
    /// may subscribe, or drop any subscription including its own. A listener
    /// dropped earlier in the same dispatch is skipped. Dispatching from inside
    /// a callback is ignored.
    pub fn dispatch(&self, chord: KeyChord) -> usize {
        let Some(shortcut) = Shortcut::from_chord(chord) else {
            return 0;
        };

        let mut detached = {
            let mut inner = self.inner.borrow_mut();
            if inner.dispatching {
                trace!(?shortcut, "nested dispatch ignored");
                return 0;
            }
            inner.dispatching = true;
            std::mem::take(&mut inner.entries)
        };
        trace!(?shortcut, listeners = detached.len(), "dispatching shortcut");

        let mut delivered = 0;
        for (id, listener) in detached.iter_mut() {
            if self.inner.borrow().cancelled.contains(id) {
                continue;
            }
            listener(shortcut);
            delivered += 1;
        }

        let gone: Vec<(u64, Listener)> = {
            let mut inner = self.inner.borrow_mut();
            let cancelled = std::mem::take(&mut inner.cancelled);
            let (gone, kept): (Vec<_>, Vec<_>) = detached
                .into_iter()
                .partition(|(id, _)| cancelled.contains(id));
            let added = std::mem::replace(&mut inner.entries, kept);
            inner.entries.extend(added);
            inner.dispatching = false;
            gone
        };
        // Listeners may own subscriptions; drop them with the registry released
        drop(gone);
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }
}

/// Keeps a listener registered while alive
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Listeners>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let removed = {
            let mut inner = registry.borrow_mut();
            match inner.entries.iter().position(|(id, _)| *id == self.id) {
                Some(pos) => Some(inner.entries.remove(pos)),
                None => {
                    if inner.dispatching {
                        inner.cancelled.push(self.id);
                    }
                    None
                }
            }
        };
        drop(removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_chord_mapping() {
        assert_eq!(Shortcut::from_chord(KeyChord::plain('n')), Some(Shortcut::QuickAdd));
        assert_eq!(Shortcut::from_chord(KeyChord::plain('/')), Some(Shortcut::FocusSearch));
        assert_eq!(Shortcut::from_chord(KeyChord::ctrl('K')), Some(Shortcut::FocusSearch));
        assert_eq!(Shortcut::from_chord(KeyChord::plain('k')), None);
        assert_eq!(Shortcut::from_chord(KeyChord::ctrl('n')), None);
    }

    #[test]
    fn test_dispatch_and_drop() {
        let registry = ShortcutRegistry::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        let subscription = registry.subscribe(move |s| sink.borrow_mut().push(s));
        assert_eq!(registry.dispatch(KeyChord::plain('n')), 1);
        assert_eq!(registry.dispatch(KeyChord::plain('x')), 0);
        assert_eq!(*seen.borrow(), vec![Shortcut::QuickAdd]);

        drop(subscription);
        assert_eq!(registry.listener_count(), 0);
        assert_eq!(registry.dispatch(KeyChord::ctrl('k')), 0);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_unsubscribe_only_removes_own_listener() {
        let registry = ShortcutRegistry::new();
        let first = registry.subscribe(|_| {});
        let _second = registry.subscribe(|_| {});

        first.unsubscribe();
        assert_eq!(registry.listener_count(), 1);
        assert_eq!(registry.dispatch(KeyChord::plain('/')), 1);
    }

    #[test]
    fn test_listener_can_drop_its_own_subscription() {
        let registry = ShortcutRegistry::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let calls = Rc::new(Cell::new(0));

        let handle = Rc::clone(&slot);
        let counter = Rc::clone(&calls);
        let own = registry.subscribe(move |_| {
            counter.set(counter.get() + 1);
            // View switch: the view tears itself down
            handle.borrow_mut().take();
        });
        *slot.borrow_mut() = Some(own);
        let _search_box = registry.subscribe(|_| {});

        assert_eq!(registry.dispatch(KeyChord::plain('/')), 2);
        assert_eq!(registry.listener_count(), 1);
        assert_eq!(registry.dispatch(KeyChord::plain('/')), 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_teardown_during_dispatch_skips_and_keeps_new_listeners() {
        let registry = ShortcutRegistry::new();
        let later: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let mounted: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));
        let second_calls = Rc::new(Cell::new(0));

        let victim = Rc::clone(&later);
        let reg = registry.clone();
        let views = Rc::clone(&mounted);
        let _first = registry.subscribe(move |_| {
            victim.borrow_mut().take();
            views.borrow_mut().push(reg.subscribe(|_| {}));
        });
        let counter = Rc::clone(&second_calls);
        *later.borrow_mut() = Some(registry.subscribe(move |_| counter.set(counter.get() + 1)));

        assert_eq!(registry.dispatch(KeyChord::plain('n')), 1);
        assert_eq!(second_calls.get(), 0);
        // first listener plus the one it mounted
        assert_eq!(registry.listener_count(), 2);
        assert_eq!(mounted.borrow().len(), 1);
    }

    #[test]
    fn test_subscription_outliving_registry() {
        let registry = ShortcutRegistry::new();
        let subscription = registry.subscribe(|_| {});
        drop(registry);
        drop(subscription);
    }
}
