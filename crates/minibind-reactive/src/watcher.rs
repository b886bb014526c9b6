#![forbid(unsafe_code)]

//! Watchers: live bindings between a path through an observed tree and a
//! change callback.
//!
//! # Design
//!
//! A [`Watcher`] runs a two-phase read cycle. **Collecting**: the watcher
//! pushes itself onto the active-collector stack and resolves its path; the
//! property reads performed by that resolution register it with every
//! registry along the path, and the resolved value becomes the stored
//! baseline. **Idle**: the watcher sits in those registries awaiting
//! `update()`. Each `update()` repeats the collecting phase — re-resolving
//! from the root and re-registering (idempotently) — and fires the callback
//! with `(old, new)` only when the resolved value actually changed.
//!
//! Construction performs one collecting phase immediately and fires no
//! callback. Dropping a `Watcher` unsubscribes it: registries hold it weakly
//! and prune the dead entry on their next notification.
//!
//! # Invariants
//!
//! 1. The collector stack is popped before the callback runs (the guard
//!    scopes the resolution only).
//! 2. The callback fires at most once per actual change of the resolved
//!    value, regardless of how many registries the watcher sits in.
//! 3. The stored value is updated before the callback observes it via
//!    [`Watcher::value`].
//!
//! # Failure Modes
//!
//! - A resolution failure during construction aborts it with the error; any
//!   registrations made by the partial walk die with the discarded watcher.
//! - A resolution failure during `update()` (the data's shape no longer
//!   matches the path) propagates to the writer that triggered the
//!   notification.
//! - A callback that writes back into the tree triggers further synchronous
//!   notification from inside the callback; mutually-updating properties
//!   recurse without cycle detection. A callback that re-enters its own
//!   watcher's update panics on `RefCell` borrow rules.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::dep::{Subscriber, begin_collect};
use crate::path::{Path, PathError};
use crate::tree::{ObservedTree, ResolveError};
use crate::value::Value;

/// Errors from [`Watcher::watch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    /// The path expression failed to parse.
    Path(PathError),
    /// The initial collection pass failed to resolve.
    Resolve(ResolveError),
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(e) => write!(f, "{e}"),
            Self::Resolve(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for WatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Path(e) => Some(e),
            Self::Resolve(e) => Some(e),
        }
    }
}

impl From<PathError> for WatchError {
    fn from(e: PathError) -> Self {
        Self::Path(e)
    }
}

impl From<ResolveError> for WatchError {
    fn from(e: ResolveError) -> Self {
        Self::Resolve(e)
    }
}

type ChangeCallback = Box<dyn Fn(&Value, &Value)>;

/// Shared interior: what the registries hold weakly.
struct WatcherCore {
    tree: ObservedTree,
    path: Path,
    callback: ChangeCallback,
    /// Value observed by the most recent collection pass.
    last: RefCell<Value>,
    weak_self: Weak<WatcherCore>,
}

impl WatcherCore {
    /// Collecting phase: resolve the path with this watcher as the active
    /// collector. The guard pops the collector stack on every exit path.
    fn collect(&self) -> Result<Value, ResolveError> {
        let weak: Weak<dyn Subscriber> = self.weak_self.clone();
        let _guard = begin_collect(weak);
        self.tree.read(&self.path)
    }
}

impl Subscriber for WatcherCore {
    fn update(&self) -> Result<(), ResolveError> {
        let new = self.collect()?;
        let old = {
            let mut last = self.last.borrow_mut();
            if new.same_scalar(&*last) {
                return Ok(());
            }
            std::mem::replace(&mut *last, new.clone())
        };
        trace!(path = %self.path, "watched value changed");
        (self.callback)(&old, &new);
        Ok(())
    }
}

/// A live binding between a data path and a callback.
///
/// The callback receives `(old, new)` synchronously, on the thread
/// performing the write, zero or more times, strictly after construction
/// returns.
pub struct Watcher {
    core: Rc<WatcherCore>,
}

impl Watcher {
    /// Watch `path` on `tree`.
    ///
    /// Performs one collecting pass immediately: the watcher subscribes to
    /// every property along the path and stores the resolved value as its
    /// baseline. No callback fires during construction.
    pub fn new(
        tree: &ObservedTree,
        path: Path,
        callback: impl Fn(&Value, &Value) + 'static,
    ) -> Result<Self, ResolveError> {
        let core = Rc::new_cyclic(|weak| WatcherCore {
            tree: tree.clone(),
            path,
            callback: Box::new(callback),
            last: RefCell::new(Value::Null),
            weak_self: weak.clone(),
        });
        let baseline = core.collect()?;
        *core.last.borrow_mut() = baseline;
        Ok(Self { core })
    }

    /// Parse `path` and watch it. Convenience over [`Watcher::new`].
    pub fn watch(
        tree: &ObservedTree,
        path: &str,
        callback: impl Fn(&Value, &Value) + 'static,
    ) -> Result<Self, WatchError> {
        let path = Path::parse(path)?;
        Ok(Self::new(tree, path, callback)?)
    }

    /// The value observed by the most recent collection pass.
    #[must_use]
    pub fn value(&self) -> Value {
        self.core.last.borrow().clone()
    }

    /// The watched path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.core.path
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("path", &self.core.path)
            .field("value", &self.core.last.borrow())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
