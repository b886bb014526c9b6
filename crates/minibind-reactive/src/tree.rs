#![forbid(unsafe_code)]

//! The observed tree: per-property change interception over a typed value
//! tree.
//!
//! # Design
//!
//! [`ObservedTree::new`] consumes a [`Value`] and builds a tree of nodes.
//! Each object property becomes an intercepted slot: the backing node plus
//! exactly one [`Dep`]. Nested objects become nested observed nodes
//! recursively, at construction and again on every write of an object value,
//! so a freshly assigned object is observable before anything can read it.
//!
//! Reads walk the tree fresh from the root on every call — there is no
//! caching. Each step registers the active collector (if any) with that
//! property's registry, which is how a watcher's resolution pass subscribes
//! it to exactly the properties it read. Writes gate on scalar equality,
//! then replace the backing node and notify the property's subscribers after
//! the tree borrow is released, so subscribers are free to re-resolve
//! through the tree.
//!
//! A scalar root builds an inert tree: reads work, nothing is tracked,
//! nothing ever notifies. This is the permissive no-op for non-object input
//! rather than an error.
//!
//! # Invariants
//!
//! 1. Every property of every object node is backed by exactly one [`Dep`].
//! 2. A leaf node never holds `Value::Object`.
//! 3. Writing a scalar equal to the current leaf performs no notification.
//! 4. Notification happens outside the tree borrow.
//!
//! # Failure Modes
//!
//! - Resolution through a leaf, or of an absent key, is a [`ResolveError`]
//!   — a usage error (path does not match the data shape), never silently
//!   absorbed. The tree's shape is fixed at construction; writes cannot add
//!   properties.
//! - A subscriber whose re-resolution fails during notification aborts the
//!   remaining notifications; the write stays applied and the error
//!   surfaces to the writer.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::dep::Dep;
use crate::path::Path;
use crate::value::Value;

/// Errors from resolving a path against an observed tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A path segment landed on a scalar instead of an object.
    NotAnObject { path: String, segment: String },
    /// The object at this step has no property with this name.
    Missing { path: String, segment: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject { path, segment } => {
                write!(f, "path '{path}': segment '{segment}' is not an object")
            }
            Self::Missing { path, segment } => {
                write!(f, "path '{path}': no property named '{segment}'")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// An intercepted property: the backing node plus its dependency registry.
struct Slot {
    dep: Dep,
    node: Node,
}

/// One node of the observed tree.
enum Node {
    /// A scalar. Never `Value::Object`.
    Leaf(Value),
    /// An object: insertion-ordered intercepted properties.
    Object(Vec<(String, Slot)>),
}

impl Node {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Object(entries) => Node::Object(
                entries
                    .into_iter()
                    .map(|(key, v)| {
                        (
                            key,
                            Slot {
                                dep: Dep::new(),
                                node: Node::from_value(v),
                            },
                        )
                    })
                    .collect(),
            ),
            scalar => Node::Leaf(scalar),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Node::Leaf(v) => v.clone(),
            Node::Object(props) => Value::Object(
                props
                    .iter()
                    .map(|(key, slot)| (key.clone(), slot.node.to_value()))
                    .collect(),
            ),
        }
    }

    /// Whether this node is a leaf holding the same scalar as `value`.
    fn holds_scalar(&self, value: &Value) -> bool {
        match self {
            Node::Leaf(v) => v.same_scalar(value),
            Node::Object(_) => false,
        }
    }
}

/// Descend one path segment.
fn step<'a>(node: &'a Node, path: &Path, index: usize) -> Result<&'a Slot, ResolveError> {
    let segment = &path.segments()[index];
    match node {
        Node::Leaf(_) => Err(ResolveError::NotAnObject {
            path: path.to_string(),
            segment: segment.clone(),
        }),
        Node::Object(props) => props
            .iter()
            .find(|(key, _)| key == segment)
            .map(|(_, slot)| slot)
            .ok_or_else(|| ResolveError::Missing {
                path: path.to_string(),
                segment: segment.clone(),
            }),
    }
}

/// Descend one path segment, mutably.
fn step_mut<'a>(
    node: &'a mut Node,
    path: &Path,
    index: usize,
) -> Result<&'a mut Slot, ResolveError> {
    let segment = &path.segments()[index];
    match node {
        Node::Leaf(_) => Err(ResolveError::NotAnObject {
            path: path.to_string(),
            segment: segment.clone(),
        }),
        Node::Object(props) => props
            .iter_mut()
            .find(|(key, _)| key == segment)
            .map(|(_, slot)| slot)
            .ok_or_else(|| ResolveError::Missing {
                path: path.to_string(),
                segment: segment.clone(),
            }),
    }
}

/// Handle to an observed tree.
///
/// Cloning shares the same tree: all handles see the same values and the
/// same subscriber registries.
pub struct ObservedTree {
    root: Rc<RefCell<Node>>,
}

impl Clone for ObservedTree {
    fn clone(&self) -> Self {
        Self {
            root: Rc::clone(&self.root),
        }
    }
}

impl fmt::Debug for ObservedTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedTree")
            .field("value", &self.snapshot())
            .finish()
    }
}

impl ObservedTree {
    /// Observe `value`.
    ///
    /// Objects become fully intercepted trees, recursively. A scalar builds
    /// an inert tree — reads work, nothing is tracked, nothing notifies.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            root: Rc::new(RefCell::new(Node::from_value(value))),
        }
    }

    /// Whether the root is an object, i.e. whether anything can be tracked
    /// at all.
    #[must_use]
    pub fn is_observable(&self) -> bool {
        matches!(&*self.root.borrow(), Node::Object(_))
    }

    /// Resolve `path` to a value snapshot: one fresh walk from the root.
    ///
    /// Every property stepped through registers the active collector (if
    /// any) with its registry. The terminal snapshot itself registers
    /// nothing, so a watcher subscribes to exactly the properties on its
    /// path. The absence of caching is deliberate: the re-walk on every
    /// call is what re-establishes subscriptions.
    pub fn read(&self, path: &Path) -> Result<Value, ResolveError> {
        let root = self.root.borrow();
        let mut node = &*root;
        for index in 0..path.segments().len() {
            let slot = step(node, path, index)?;
            slot.dep.depend();
            node = &slot.node;
        }
        Ok(node.to_value())
    }

    /// Write `value` at `path`.
    ///
    /// Writing the scalar a leaf already holds is a no-op: no notification.
    /// Any other write replaces the backing node — object values become
    /// observed subtrees with fresh registries — and notifies the
    /// property's subscribers in registration order.
    ///
    /// Descending to the target can fail like [`read`](Self::read). A
    /// subscriber whose own re-resolution fails aborts the remaining
    /// notifications and the error surfaces here; the write itself stays
    /// applied.
    pub fn write(&self, path: &Path, value: Value) -> Result<(), ResolveError> {
        let dep = {
            let mut root = self.root.borrow_mut();
            let mut node = &mut *root;
            let last = path.segments().len() - 1;
            for index in 0..last {
                node = &mut step_mut(node, path, index)?.node;
            }
            let slot = step_mut(node, path, last)?;
            if slot.node.holds_scalar(&value) {
                trace!(path = %path, "unchanged write skipped");
                return Ok(());
            }
            slot.node = Node::from_value(value);
            slot.dep.clone()
        };
        dep.notify()
    }

    /// Untracked deep copy of the current tree contents.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.root.borrow().to_value()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
