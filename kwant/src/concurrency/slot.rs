use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};

use crate::error::{KwantError, Result};

type Continuation<T> = Box<dyn FnOnce(&Arc<T>) + Send>;

struct SlotState<T> {
    value: Option<Arc<T>>,
    pending: VecDeque<Continuation<T>>,
    /// Set while [`Slot::fill`] is running the queued continuations, so late subscribers
    /// line up behind them instead of jumping the queue
    draining: bool,
}

struct SlotInner<T> {
    state: Mutex<SlotState<T>>,
    filled: Condvar,
}

/// A write-once cell which hands its value to every subscriber exactly once.
///
/// Continuations registered before [`fill`](Slot::fill) are queued and run in registration
/// order at fill time, continuations registered afterwards run immediately on the caller's
/// thread. Continuations never run while the internal lock is held, so they may freely
/// subscribe to (or fill) other slots.
///
/// A slot which is never filled never runs its continuations. Dropping the last handle
/// simply drops them.
pub struct Slot<T> {
    inner: Arc<SlotInner<T>>,
}

/// Non-owning handle to a [`Slot`]
pub struct WeakSlot<T> {
    inner: Weak<SlotInner<T>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Clone for WeakSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner);
        f.debug_struct("Slot")
            .field("filled", &state.value.is_some())
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl<T> fmt::Debug for WeakSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakSlot")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

fn lock<T>(inner: &SlotInner<T>) -> MutexGuard<'_, SlotState<T>> {
    // Continuations run outside the lock, a poisoned state is still consistent
    inner.state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Send + Sync + 'static> Slot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SlotInner {
                state: Mutex::new(SlotState {
                    value: None,
                    pending: VecDeque::new(),
                    draining: false,
                }),
                filled: Condvar::new(),
            }),
        }
    }

    /// Stores the value and runs every queued continuation with it.
    ///
    /// Fails with [`KwantError::DoubleAssignment`] if the slot already holds a value, in which
    /// case the stored value is left untouched.
    pub fn fill(&self, value: T) -> Result<()> {
        let value = {
            let mut state = lock(&self.inner);
            if state.value.is_some() {
                return Err(KwantError::DoubleAssignment);
            }
            let value = Arc::new(value);
            state.value = Some(value.clone());
            state.draining = true;
            value
        };
        self.inner.filled.notify_all();

        loop {
            let next = {
                let mut state = lock(&self.inner);
                match state.pending.pop_front() {
                    Some(next) => next,
                    None => {
                        state.draining = false;
                        break;
                    }
                }
            };
            next(&value);
        }
        Ok(())
    }

    /// Runs `continuation` with the value once it exists
    pub fn subscribe<F>(&self, continuation: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.subscribe_shared(move |value: &Arc<T>| continuation(value.as_ref()));
    }

    /// Like [`subscribe`](Slot::subscribe), but hands out the shared allocation
    pub fn subscribe_shared<F>(&self, continuation: F)
    where
        F: FnOnce(&Arc<T>) + Send + 'static,
    {
        let value = {
            let mut state = lock(&self.inner);
            match state.value.clone() {
                Some(value) if !state.draining => value,
                _ => {
                    state.pending.push_back(Box::new(continuation));
                    return;
                }
            }
        };
        continuation(&value);
    }

    /// Current value, if the slot has been filled
    pub fn get(&self) -> Option<Arc<T>> {
        lock(&self.inner).value.clone()
    }

    pub fn is_filled(&self) -> bool {
        lock(&self.inner).value.is_some()
    }

    /// Blocks the calling thread until the slot is filled.
    ///
    /// Never returns if nobody fills the slot.
    pub fn get_blocking(&self) -> Arc<T> {
        let mut state = lock(&self.inner);
        loop {
            if let Some(value) = state.value.as_ref() {
                return value.clone();
            }
            state = self
                .inner
                .filled
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn downgrade(&self) -> WeakSlot<T> {
        WeakSlot {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Resolves with the value once filled, or [`None`] if every owner of the slot went away
    /// before filling it
    #[cfg(feature = "futures")]
    pub fn wait(&self) -> impl std::future::Future<Output = Option<Arc<T>>> {
        let (sender, receiver) = futures::channel::oneshot::channel();
        self.subscribe_shared(move |value: &Arc<T>| {
            let _ = sender.send(value.clone());
        });
        async move { receiver.await.ok() }
    }
}

impl<T: Send + Sync + 'static> WeakSlot<T> {
    /// Subscribes if the slot still exists.
    ///
    /// Returns `false` when the owning side is gone, meaning the slot will never resolve.
    pub fn subscribe<F>(&self, continuation: F) -> bool
    where
        F: FnOnce(&T) + Send + 'static,
    {
        match self.upgrade() {
            Some(slot) => {
                slot.subscribe(continuation);
                true
            }
            None => false,
        }
    }

    pub fn upgrade(&self) -> Option<Slot<T>> {
        self.inner.upgrade().map(|inner| Slot { inner })
    }
}
