#![forbid(unsafe_code)]

//! Per-property dependency registries and the active-collector stack.
//!
//! # Design
//!
//! Every intercepted property owns one [`Dep`]: the set of subscribers that
//! read the property during their last collection pass. Subscribers are held
//! as `Weak<dyn Subscriber>` in registration order and are pruned lazily
//! during notification, so dropping a subscriber is all it takes to
//! unsubscribe.
//!
//! Dependency collection is implicit: a subscriber pushes itself onto a
//! thread-local collector stack (via [`begin_collect`]) before resolving its
//! path, and every [`Dep::depend`] call made by property reads during that
//! resolution registers the top of the stack. The stack — rather than a
//! single slot — keeps nested resolutions from misattributing registrations.
//!
//! # Invariants
//!
//! 1. A subscriber appears at most once per registry (`depend` is
//!    idempotent by pointer identity).
//! 2. Subscribers are notified in registration order.
//! 3. The registry borrow is released before any `update()` runs, so
//!    subscribers may re-register with the notifying registry.
//! 4. A [`CollectGuard`] pops the collector stack on drop, including on the
//!    error path out of a failed resolution.
//!
//! # Failure Modes
//!
//! - A subscriber `update()` error aborts the remaining notifications for
//!   that change and propagates to the writer.
//! - A subscriber that panics unwinds through `notify()`; later subscribers
//!   are not notified.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::tree::ResolveError;

/// A party interested in property changes.
///
/// Registries hold subscribers weakly; implementors are owned elsewhere
/// (e.g. behind the `Rc` inside a [`Watcher`]) and fall out of every
/// registry once dropped.
///
/// [`Watcher`]: crate::watcher::Watcher
pub trait Subscriber {
    /// React to a change in a property this subscriber depends on.
    ///
    /// An error aborts the remaining notifications for that change.
    fn update(&self) -> Result<(), ResolveError>;
}

/// Per-property dependency registry.
///
/// Cloning a `Dep` produces another handle to the same subscriber list.
pub struct Dep {
    subscribers: Rc<RefCell<Vec<Weak<dyn Subscriber>>>>,
}

impl Clone for Dep {
    fn clone(&self) -> Self {
        Self {
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl Dep {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Register the currently collecting subscriber, if any.
    ///
    /// Outside a collection pass this is a no-op. Idempotent: a subscriber
    /// already present is not added again, so repeated collection passes
    /// never produce duplicate notifications.
    pub fn depend(&self) {
        let Some(active) = current_collector() else {
            return;
        };
        let mut subscribers = self.subscribers.borrow_mut();
        if subscribers.iter().any(|s| Weak::ptr_eq(s, &active)) {
            return;
        }
        subscribers.push(active);
        trace!(subscribers = subscribers.len(), "dependency registered");
    }

    /// Notify all live subscribers in registration order.
    ///
    /// Dead entries (dropped subscribers) are pruned before the pass. The
    /// first subscriber error aborts the remainder and propagates.
    pub fn notify(&self) -> Result<(), ResolveError> {
        let live: Vec<Rc<dyn Subscriber>> = {
            let mut subscribers = self.subscribers.borrow_mut();
            let mut live = Vec::with_capacity(subscribers.len());
            subscribers.retain(|s| match s.upgrade() {
                Some(strong) => {
                    live.push(strong);
                    true
                }
                None => false,
            });
            live
        };
        if !live.is_empty() {
            debug!(fanout = live.len(), "notifying subscribers");
        }
        for subscriber in live {
            subscriber.update()?;
        }
        Ok(())
    }

    /// Number of entries in the subscriber list, live or not.
    ///
    /// Dead entries linger until the next [`notify`](Self::notify) prunes
    /// them.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

// ---------------------------------------------------------------------------
// Active-collector stack
// ---------------------------------------------------------------------------

thread_local! {
    /// Subscribers currently collecting dependencies on this thread,
    /// innermost last.
    static COLLECTOR_STACK: RefCell<Vec<Weak<dyn Subscriber>>> =
        const { RefCell::new(Vec::new()) };
}

/// RAII guard marking a subscriber as the active collector.
///
/// Property reads performed while the guard is alive register the subscriber
/// with each registry they touch. Dropping the guard pops the stack, so the
/// collector state is restored even when resolution errors out early.
#[must_use]
pub struct CollectGuard {
    /// Keeps the guard off other threads (the stack is thread-local).
    _marker: PhantomData<*const ()>,
}

impl Drop for CollectGuard {
    fn drop(&mut self) {
        COLLECTOR_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Push `subscriber` as the active collector and return the pop guard.
pub fn begin_collect(subscriber: Weak<dyn Subscriber>) -> CollectGuard {
    COLLECTOR_STACK.with(|stack| stack.borrow_mut().push(subscriber));
    CollectGuard {
        _marker: PhantomData,
    }
}

/// The innermost collecting subscriber, if any.
fn current_collector() -> Option<Weak<dyn Subscriber>> {
    COLLECTOR_STACK.with(|stack| stack.borrow().last().cloned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Probe {
        hits: Cell<u32>,
        fail: bool,
    }

    impl Probe {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                hits: Cell::new(0),
                fail: false,
            })
        }

        fn failing() -> Rc<Self> {
            Rc::new(Self {
                hits: Cell::new(0),
                fail: true,
            })
        }
    }

    impl Subscriber for Probe {
        fn update(&self) -> Result<(), ResolveError> {
            if self.fail {
                return Err(ResolveError::Missing {
                    path: "p".to_string(),
                    segment: "p".to_string(),
                });
            }
            self.hits.set(self.hits.get() + 1);
            Ok(())
        }
    }

    fn collect_into(dep: &Dep, probe: &Rc<Probe>) {
        let probe_dyn: Rc<dyn Subscriber> = probe.clone();
        let weak: Weak<dyn Subscriber> = Rc::downgrade(&probe_dyn);
        let _guard = begin_collect(weak);
        dep.depend();
    }

    #[test]
    fn depend_without_collector_is_noop() {
        let dep = Dep::new();
        dep.depend();
        assert_eq!(dep.subscriber_count(), 0);
    }

    #[test]
    fn depend_registers_once() {
        let dep = Dep::new();
        let probe = Probe::new();
        collect_into(&dep, &probe);
        collect_into(&dep, &probe);
        collect_into(&dep, &probe);
        assert_eq!(dep.subscriber_count(), 1);

        dep.notify().unwrap();
        assert_eq!(probe.hits.get(), 1);
    }

    #[test]
    fn notify_in_registration_order() {
        let dep = Dep::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        struct Logger {
            tag: char,
            order: Rc<RefCell<Vec<char>>>,
        }
        impl Subscriber for Logger {
            fn update(&self) -> Result<(), ResolveError> {
                self.order.borrow_mut().push(self.tag);
                Ok(())
            }
        }

        let loggers: Vec<Rc<Logger>> = ['a', 'b', 'c']
            .into_iter()
            .map(|tag| {
                Rc::new(Logger {
                    tag,
                    order: Rc::clone(&order),
                })
            })
            .collect();
        for logger in &loggers {
            let logger_dyn: Rc<dyn Subscriber> = logger.clone();
            let weak: Weak<dyn Subscriber> = Rc::downgrade(&logger_dyn);
            let _guard = begin_collect(weak);
            dep.depend();
        }

        dep.notify().unwrap();
        assert_eq!(*order.borrow(), vec!['a', 'b', 'c']);
    }

    #[test]
    fn dead_subscribers_pruned_on_notify() {
        let dep = Dep::new();
        let keep = Probe::new();
        let drop_me = Probe::new();
        collect_into(&dep, &keep);
        collect_into(&dep, &drop_me);
        assert_eq!(dep.subscriber_count(), 2);

        drop(drop_me);
        // Dead entry still listed until notify prunes it.
        assert_eq!(dep.subscriber_count(), 2);

        dep.notify().unwrap();
        assert_eq!(dep.subscriber_count(), 1);
        assert_eq!(keep.hits.get(), 1);
    }

    #[test]
    fn update_error_aborts_remaining() {
        let dep = Dep::new();
        let bad = Probe::failing();
        let never_reached = Probe::new();
        collect_into(&dep, &bad);
        collect_into(&dep, &never_reached);

        assert!(dep.notify().is_err());
        assert_eq!(never_reached.hits.get(), 0);
    }

    #[test]
    fn guard_pops_on_drop() {
        let dep = Dep::new();
        let probe = Probe::new();
        {
            let probe_dyn: Rc<dyn Subscriber> = probe.clone();
            let weak: Weak<dyn Subscriber> = Rc::downgrade(&probe_dyn);
            let _guard = begin_collect(weak);
        }
        // Guard dropped: no collector is active any more.
        dep.depend();
        assert_eq!(dep.subscriber_count(), 0);
    }

    #[test]
    fn nested_collection_attributes_to_innermost() {
        let outer_dep = Dep::new();
        let inner_dep = Dep::new();
        let outer = Probe::new();
        let inner = Probe::new();

        let outer_dyn: Rc<dyn Subscriber> = outer.clone();
        let outer_weak: Weak<dyn Subscriber> = Rc::downgrade(&outer_dyn);
        let _outer_guard = begin_collect(outer_weak);
        outer_dep.depend();
        {
            let inner_dyn: Rc<dyn Subscriber> = inner.clone();
            let inner_weak: Weak<dyn Subscriber> = Rc::downgrade(&inner_dyn);
            let _inner_guard = begin_collect(inner_weak);
            inner_dep.depend();
        }
        // Back to the outer collector after the inner guard drops.
        outer_dep.depend();

        assert_eq!(outer_dep.subscriber_count(), 1);
        assert_eq!(inner_dep.subscriber_count(), 1);
        inner_dep.notify().unwrap();
        assert_eq!(inner.hits.get(), 1);
        assert_eq!(outer.hits.get(), 0);
    }

    #[test]
    fn clone_shares_subscriber_list() {
        let dep = Dep::new();
        let clone = dep.clone();
        let probe = Probe::new();
        collect_into(&dep, &probe);
        assert_eq!(clone.subscriber_count(), 1);

        clone.notify().unwrap();
        assert_eq!(probe.hits.get(), 1);
    }
}
