//! One-shot cancellation shared between a caller and one logical request.
//!
//! A [`CancelSource`] is the only handle able to trigger cancellation; the
//! [`CancelToken`] it carries is attached to the request (and all of its
//! retries) through [`RequestConfig::with_cancel_token`](crate::RequestConfig::with_cancel_token).

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::oneshot;

use crate::{RequestError, Result};

type Callback = Box<dyn FnOnce(Option<&str>) + Send>;

#[derive(Default)]
struct State {
    cancelled: bool,
    reason: Option<String>,
    next_id: u64,
    subscribers: Vec<(u64, Callback)>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read/subscribe side of a cancellation signal.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("CancelToken")
            .field("cancelled", &state.cancelled)
            .field("reason", &state.reason)
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

impl CancelToken {
    /// Creates a fresh source/token pair.
    pub fn source() -> CancelSource {
        CancelSource::new()
    }

    /// Whether the source has cancelled this token.
    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().cancelled
    }

    /// Reason recorded by the first `cancel` call, if any was given.
    pub fn reason(&self) -> Option<String> {
        self.inner.lock().reason.clone()
    }

    /// Returns [`RequestError::Cancelled`] once the token has been triggered.
    pub fn throw_if_cancelled(&self) -> Result<()> {
        let state = self.inner.lock();
        if state.cancelled {
            return Err(RequestError::Cancelled {
                reason: state.reason.clone(),
            });
        }
        Ok(())
    }

    /// Registers `callback` to run once on cancellation.
    ///
    /// Runs immediately when the token is already cancelled. Dropping the
    /// returned [`Subscription`] before cancellation unregisters it.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnOnce(Option<&str>) + Send + 'static,
    {
        let mut state = self.inner.lock();
        if state.cancelled {
            let reason = state.reason.clone();
            drop(state);
            callback(reason.as_deref());
            return Subscription { slot: None };
        }

        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push((id, Box::new(callback)));
        Subscription {
            slot: Some((Arc::downgrade(&self.inner), id)),
        }
    }

    /// Resolves once the token is cancelled. Pending forever otherwise.
    pub async fn cancelled(&self) {
        let (tx, rx) = oneshot::channel();
        let _subscription = self.subscribe(move |_| {
            let _ = tx.send(());
        });
        // The sender only goes away through `_subscription`, which outlives this await.
        let _ = rx.await;
    }

    fn trigger(&self, reason: Option<String>) -> bool {
        let subscribers = {
            let mut state = self.inner.lock();
            if state.cancelled {
                return false;
            }
            state.cancelled = true;
            state.reason = reason;
            std::mem::take(&mut state.subscribers)
        };

        let reason = self.reason();
        for (_, callback) in subscribers {
            callback(reason.as_deref());
        }
        true
    }
}

/// Trigger side of a cancellation signal.
#[derive(Clone, Debug, Default)]
pub struct CancelSource {
    /// Token to attach to a request.
    pub token: CancelToken,
}

impl CancelSource {
    /// Creates a source with a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token. Only the first call has an effect.
    ///
    /// Returns `true` when this call performed the cancellation.
    pub fn cancel(&self, reason: Option<&str>) -> bool {
        self.token.trigger(reason.map(str::to_owned))
    }
}

/// Registration returned by [`CancelToken::subscribe`]; unregisters on drop.
#[must_use = "dropping a Subscription unregisters its callback"]
pub struct Subscription {
    slot: Option<(Weak<Inner>, u64)>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.slot.as_ref().map(|(_, id)| *id))
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some((inner, id)) = self.slot.take() else {
            return;
        };
        if let Some(inner) = inner.upgrade() {
            let removed = {
                let mut state = inner.lock();
                state
                    .subscribers
                    .iter()
                    .position(|(candidate, _)| *candidate == id)
                    .map(|index| state.subscribers.remove(index))
            };
            // Callbacks are dropped outside the lock.
            drop(removed);
        }
    }
}
