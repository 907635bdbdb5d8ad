use std::ops::{Deref, DerefMut};

use crate::store::InstanceStateStore;

/// Mutable access to a store that is flushed when the guard goes out of
/// scope, including on early return through `?`.
pub(crate) struct FlushGuard<'s, S: InstanceStateStore> {
    store: &'s mut S,
}

impl<'s, S: InstanceStateStore> FlushGuard<'s, S> {
    pub(crate) fn new(store: &'s mut S) -> Self {
        Self { store }
    }
}

impl<S: InstanceStateStore> Deref for FlushGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.store
    }
}

impl<S: InstanceStateStore> DerefMut for FlushGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.store
    }
}

impl<S: InstanceStateStore> Drop for FlushGuard<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.store.flush() {
            tracing::error!(error = %e, "Failed to flush instance records");
        }
    }
}
