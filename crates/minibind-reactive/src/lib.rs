#![forbid(unsafe_code)]

//! Dependency-tracking reactive core for the MiniBind data-binding layer.
//!
//! This crate turns a plain data value into an observed tree, tracks which
//! watchers read which properties, and notifies exactly those watchers when
//! the properties they read later change. It is the engine under MiniBind's
//! template interpolation and two-way input binding; those layers consume it
//! only through [`ObservedTree`] and [`Watcher`].
//!
//! # Architecture
//!
//! - [`Value`]: plain data — scalars plus insertion-ordered objects.
//! - [`Path`]: a parsed, validated dot-delimited property path.
//! - [`Dep`]: per-property subscriber registry with ordered, idempotent
//!   registration and synchronous notification.
//! - [`ObservedTree`]: the interception layer — every property of every
//!   object node gets a backing slot and its own registry; reads register
//!   the active collector, writes gate on scalar equality and fan out.
//! - [`Watcher`]: re-resolves a path on every relevant change and invokes a
//!   callback with `(old, new)` when the resolved value differs.
//!
//! Everything is single-threaded and synchronous: `Rc`/`RefCell` sharing, a
//! thread-local collector stack, and notification on the writing call
//! stack. There is no batching, no computed values, and no array
//! interception.
//!
//! # Example
//!
//! ```
//! use minibind_reactive::{ObservedTree, Path, Value, Watcher};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let data = ObservedTree::new(Value::object([
//!     ("name", Value::from("ada")),
//!     ("obj", Value::object([("name", Value::from("lin"))])),
//! ]));
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let log = Rc::clone(&seen);
//! let _watcher = Watcher::watch(&data, "obj.name", move |old, new| {
//!     log.borrow_mut().push((old.clone(), new.clone()));
//! })
//! .unwrap();
//!
//! let path: Path = "obj.name".parse().unwrap();
//! data.write(&path, Value::from("grace")).unwrap();
//!
//! assert_eq!(
//!     *seen.borrow(),
//!     vec![(Value::from("lin"), Value::from("grace"))]
//! );
//! ```
//!
//! # Invariants
//!
//! 1. After construction, mutating the property at the end of a watched
//!    path (to a different value) invokes the callback exactly once with
//!    the prior and new values.
//! 2. Writing a value equal to what a property already holds notifies
//!    nobody.
//! 3. Registration is idempotent: re-collection never produces duplicate
//!    callbacks.
//! 4. A newly assigned object value is fully observable before any read
//!    can reach it.
//! 5. Watchers on unrelated properties are not notified.
//! 6. Observing a non-object value is a permissive no-op, not an error.

pub mod dep;
pub mod path;
pub mod tree;
pub mod value;
pub mod watcher;

pub use dep::{CollectGuard, Dep, Subscriber, begin_collect};
pub use path::{Path, PathError};
pub use tree::{ObservedTree, ResolveError};
pub use value::Value;
pub use watcher::{WatchError, Watcher};
