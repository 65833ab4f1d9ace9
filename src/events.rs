//! In-process notification that the logged-in user changed.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::debug;

/// Fired after `currentUser` has been written. Ids are `None` for "nobody".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionChanged {
    pub previous: Option<i64>,
    pub next: Option<i64>,
}

type Listener = Rc<dyn Fn(&SessionChanged)>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Synchronous publish/subscribe for [`SessionChanged`].
#[derive(Clone, Default)]
pub struct SessionBus {
    inner: Rc<RefCell<Listeners>>,
}

impl SessionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `f` until the returned guard is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, f: impl Fn(&SessionChanged) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push((id, Rc::new(f)));
        Subscription {
            id,
            bus: Rc::downgrade(&self.inner),
        }
    }

    /// Calls every listener registered at the time of the call. Listeners may
    /// subscribe or unsubscribe while being called.
    pub fn emit(&self, event: &SessionChanged) {
        let listeners: Vec<Listener> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        debug!(previous = ?event.previous, next = ?event.next, listeners = listeners.len(), "session changed");
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }
}

pub struct Subscription {
    id: u64,
    bus: Weak<RefCell<Listeners>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.borrow_mut().entries.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn change(previous: Option<i64>, next: Option<i64>) -> SessionChanged {
        SessionChanged { previous, next }
    }

    #[test]
    fn test_emit_reaches_subscribers() {
        let bus = SessionBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        let _sub = bus.subscribe(move |e| sink.borrow_mut().push(*e));

        bus.emit(&change(None, Some(1)));
        bus.emit(&change(Some(1), None));
        assert_eq!(*seen.borrow(), vec![change(None, Some(1)), change(Some(1), None)]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = SessionBus::new();
        let count = Rc::new(Cell::new(0));

        let counter = count.clone();
        let sub = bus.subscribe(move |_| counter.set(counter.get() + 1));
        assert_eq!(bus.listener_count(), 1);

        bus.emit(&change(None, Some(1)));
        drop(sub);
        assert_eq!(bus.listener_count(), 0);

        bus.emit(&change(Some(1), None));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_subscribing_from_a_listener() {
        let bus = SessionBus::new();
        let late = Rc::new(RefCell::new(Vec::new()));

        let inner_bus = bus.clone();
        let holder = late.clone();
        let _sub = bus.subscribe(move |_| {
            holder.borrow_mut().push(inner_bus.subscribe(|_| {}));
        });

        bus.emit(&change(None, Some(1)));
        assert_eq!(bus.listener_count(), 2);
    }

    #[test]
    fn test_subscription_outliving_bus() {
        let bus = SessionBus::new();
        let sub = bus.subscribe(|_| {});
        drop(bus);
        drop(sub);
    }
}
