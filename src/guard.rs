use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

#[derive(Debug, Default)]
pub struct Lifecycle {
    torn_down: AtomicBool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the call that actually started teardown.
    pub fn begin_teardown(&self) -> bool {
        !self.torn_down.swap(true, Ordering::AcqRel)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }
}

pub trait Teardown {
    fn lifecycle(&self) -> &Lifecycle;

    /// Runs once, when the owner goes away.
    fn teardown(&self) {}
}

/// The single strong owner of a shared value. Dropping it starts teardown even if
/// some other thread still holds a short-lived upgrade.
#[derive(Debug)]
pub struct Owner<T: Teardown> {
    inner: Arc<T>,
}

impl<T: Teardown> Owner<T> {
    pub fn new(inner: Arc<T>) -> Self {
        Self { inner }
    }

    pub fn proxy(&self) -> WeakProxy<T> {
        WeakProxy::new(Arc::downgrade(&self.inner))
    }
}

impl<T: Teardown> Deref for Owner<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: Teardown> Drop for Owner<T> {
    fn drop(&mut self) {
        if self.inner.lifecycle().begin_teardown() {
            self.inner.teardown();
        }
    }
}

/// Non-owning reference for timers and display drivers. Calls through it become
/// no-ops once the owner is gone.
#[derive(Debug)]
pub struct WeakProxy<T: Teardown> {
    target: Weak<T>,
}

impl<T: Teardown> WeakProxy<T> {
    pub fn new(target: Weak<T>) -> Self {
        Self { target }
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let target = self.target.upgrade()?;
        if target.lifecycle().is_torn_down() {
            return None;
        }
        Some(f(&target))
    }

    pub fn is_alive(&self) -> bool {
        self.with(|_| ()).is_some()
    }
}

impl<T: Teardown> Clone for WeakProxy<T> {
    fn clone(&self) -> Self {
        Self {
            target: Weak::clone(&self.target),
        }
    }
}
