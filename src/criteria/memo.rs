//! Revision-keyed memoization.
//!
//! Every cached derivation (an expression's IR, a query's compilation or its
//! text) is stored together with the revision number it was computed at. A
//! lookup with a different revision recomputes. Mutators only ever bump a
//! counter; nothing clears caches by hand.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Shared, monotonically increasing mutation counter.
///
/// Clones observe the same counter, so every node of a FROM tree can share
/// one.
#[derive(Debug, Clone, Default)]
pub struct Revision(Rc<Cell<u64>>);

impl Revision {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.0.get()
    }

    pub fn bump(&self) {
        self.0.set(self.0.get() + 1);
    }
}

/// A value cached against the revision it was derived from.
pub struct Memo<T> {
    slot: RefCell<Option<(u64, Rc<T>)>>,
}

impl<T> Memo<T> {
    pub fn new() -> Self {
        Self {
            slot: RefCell::new(None),
        }
    }

    /// The cached value, if it was computed at `revision`.
    pub fn peek(&self, revision: u64) -> Option<Rc<T>> {
        match &*self.slot.borrow() {
            Some((at, value)) if *at == revision => Some(Rc::clone(value)),
            _ => None,
        }
    }

    pub fn get_or_init(&self, revision: u64, init: impl FnOnce() -> T) -> Rc<T> {
        if let Some(value) = self.peek(revision) {
            return value;
        }
        // No borrow is held while `init` runs; it may consult other memos.
        let value = Rc::new(init());
        *self.slot.borrow_mut() = Some((revision, Rc::clone(&value)));
        value
    }

    pub fn get_or_try_init<E>(
        &self,
        revision: u64,
        init: impl FnOnce() -> Result<T, E>,
    ) -> Result<Rc<T>, E> {
        if let Some(value) = self.peek(revision) {
            return Ok(value);
        }
        let value = Rc::new(init()?);
        *self.slot.borrow_mut() = Some((revision, Rc::clone(&value)));
        Ok(value)
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clones share the cached value.
impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            slot: RefCell::new(self.slot.borrow().clone()),
        }
    }
}

impl<T> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.slot.borrow() {
            Some((revision, _)) => write!(f, "Memo(@{})", revision),
            None => write!(f, "Memo(empty)"),
        }
    }
}
