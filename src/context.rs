//! Ambient field stores merged into every record by the shared chain.
//!
//! Two stores with different scope rules:
//! - the context store is bound through guards, so a value lives exactly
//!   as long as the logical task that bound it;
//! - the thread-local store is bound explicitly and persists for the
//!   thread's lifetime until cleared.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::record::Value;

thread_local! {
    static CONTEXT: RefCell<BTreeMap<String, Value>> = RefCell::new(BTreeMap::new());
    static THREAD_LOCAL: RefCell<BTreeMap<String, Value>> = RefCell::new(BTreeMap::new());
}

/// Bind a context variable for the current logical task.
///
/// The previous value for the key, if any, is restored when the returned
/// guard drops. Bind at request/task entry and let the guard fall out of
/// scope at exit.
#[must_use = "the binding is removed when the guard drops"]
pub fn bind(key: impl Into<String>, value: impl Into<Value>) -> ContextGuard {
    let key = key.into();
    let prev = CONTEXT.with(|ctx| ctx.borrow_mut().insert(key.clone(), value.into()));
    ContextGuard { key, prev }
}

pub struct ContextGuard {
    key: String,
    prev: Option<Value>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CONTEXT.with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            match self.prev.take() {
                Some(prev) => ctx.insert(self.key.clone(), prev),
                None => ctx.remove(&self.key),
            }
        });
    }
}

/// Bind a thread-local variable. Stays set until
/// [`clear_threadlocal`] or the thread exits.
pub fn bind_threadlocal(key: impl Into<String>, value: impl Into<Value>) {
    THREAD_LOCAL.with(|tl| tl.borrow_mut().insert(key.into(), value.into()));
}

pub fn clear_threadlocal() {
    THREAD_LOCAL.with(|tl| tl.borrow_mut().clear());
}

pub(crate) fn context_snapshot() -> BTreeMap<String, Value> {
    CONTEXT.with(|ctx| ctx.borrow().clone())
}

pub(crate) fn threadlocal_snapshot() -> BTreeMap<String, Value> {
    THREAD_LOCAL.with(|tl| tl.borrow().clone())
}
