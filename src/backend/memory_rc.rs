//! Reference counting for shared runtimes.
//!
//! A backend plugin that wraps a C library with process-global state
//! (an MPI runtime, a libcurl handle pool) registers one [`SharedRuntime`]
//! per distinct runtime identity; every [`Backend`](crate::backend::Backend)
//! instance that opens a handle onto it holds a clone.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::Result;

struct State<T> {
    value: Option<T>,
    count: usize,
}

/// A lazily-initialized, reference-counted runtime shared across every
/// backend instance that needs it.
///
/// Cloning a [`SharedRuntime`] does not call `init` again; only the first
/// clone to call [`SharedRuntime::acquire`] on a fresh (count-0) instance
/// does, and only the clone whose drop brings the count back to zero
/// calls `fini`.
pub struct SharedRuntime<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Clone for SharedRuntime<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> SharedRuntime<T> {
    /// A runtime with nothing constructed yet and a zero refcount.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                value: None,
                count: 0,
            })),
        }
    }

    /// Increment the refcount, calling `init` first if this is the
    /// transition from 0 to 1. Returns a guard that decrements on drop,
    /// calling `fini` on the transition from 1 to 0.
    pub fn acquire<F, G>(&self, init: F, fini: G) -> Result<RuntimeGuard<T, G>>
    where
        F: FnOnce() -> Result<T>,
        G: FnOnce(T),
    {
        let mut state = self.state.lock();
        if state.count == 0 {
            state.value = Some(init()?);
        }
        state.count += 1;
        drop(state);
        Ok(RuntimeGuard {
            shared: self.clone(),
            fini: Some(fini),
        })
    }

    /// Borrow the current runtime value, if any instance currently holds
    /// it acquired.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.state.lock().value.as_ref().map(f)
    }
}

impl<T> Default for SharedRuntime<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Returned by [`SharedRuntime::acquire`]; decrements the refcount on
/// drop and runs `fini` when the last holder releases it.
pub struct RuntimeGuard<T, G: FnOnce(T)> {
    shared: SharedRuntime<T>,
    fini: Option<G>,
}

impl<T, G: FnOnce(T)> Drop for RuntimeGuard<T, G> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.count -= 1;
        if state.count == 0 {
            if let (Some(value), Some(fini)) = (state.value.take(), self.fini.take()) {
                drop(state);
                fini(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn init_runs_once_and_fini_runs_on_last_release() {
        let inits = Arc::new(AtomicUsize::new(0));
        let finis = Arc::new(AtomicUsize::new(0));
        let runtime: SharedRuntime<u32> = SharedRuntime::new();

        let (i1, f1) = (inits.clone(), finis.clone());
        let guard1 = runtime
            .acquire(
                move || {
                    i1.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                },
                move |_| {
                    f1.fetch_add(1, Ordering::SeqCst);
                },
            )
            .unwrap();

        let (i2, f2) = (inits.clone(), finis.clone());
        let guard2 = runtime
            .acquire(
                move || {
                    i2.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                },
                move |_| {
                    f2.fetch_add(1, Ordering::SeqCst);
                },
            )
            .unwrap();

        assert_eq!(inits.load(Ordering::SeqCst), 1);
        drop(guard1);
        assert_eq!(finis.load(Ordering::SeqCst), 0);
        drop(guard2);
        assert_eq!(finis.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn with_reads_the_acquired_value() {
        let runtime: SharedRuntime<u32> = SharedRuntime::new();
        let _guard = runtime.acquire(|| Ok(42), |_| {}).unwrap();
        assert_eq!(runtime.with(|v| *v), Some(42));
    }
}
