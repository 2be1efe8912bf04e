//! Demand-signaling stream protocol and the row publisher bridging engine cursors onto it.
//!
//! A [`Publisher`] hands each [`Subscriber`] a [`Subscription`] first; the subscriber then
//! asks for items with [`Subscription::request`] and receives at most that many `on_next`
//! calls, followed by exactly one of `on_complete` or `on_error` unless it cancels.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::SqlReactiveDbError;

mod demand;
mod rows;
mod stream;

pub use demand::UNBOUNDED;
pub use rows::RowPublisher;
pub use stream::RowStream;

/// Consumer side of the protocol.
///
/// Signals for one subscription are never delivered concurrently.
pub trait Subscriber<T>: Send + Sync {
    fn on_subscribe(&self, subscription: Subscription);
    fn on_next(&self, item: T);
    fn on_error(&self, error: SqlReactiveDbError);
    fn on_complete(&self);
}

/// Producer side of the protocol.
pub trait Publisher<T>: Send + Sync {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>);
}

/// Demand and cancellation hooks behind a [`Subscription`].
pub trait SubscriptionControl: Send + Sync {
    fn request(&self, n: u64);
    fn cancel(&self);
}

/// Handle a subscriber uses to signal demand or cancel.
#[derive(Clone)]
pub struct Subscription {
    control: Arc<dyn SubscriptionControl>,
}

impl Subscription {
    pub fn new(control: Arc<dyn SubscriptionControl>) -> Self {
        Self { control }
    }

    /// A subscription whose signals are ignored, used for already-terminated streams.
    #[must_use]
    pub fn inert() -> Self {
        Self::new(Arc::new(Inert))
    }

    /// Declare readiness for `n` more items. `n` must be positive; [`UNBOUNDED`] lifts the limit.
    pub fn request(&self, n: u64) {
        self.control.request(n);
    }

    /// Stop the stream. Items already delivered are not retracted.
    pub fn cancel(&self) {
        self.control.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

struct Inert;

impl SubscriptionControl for Inert {
    fn request(&self, _n: u64) {}
    fn cancel(&self) {}
}

/// Publisher that completes immediately without items, used by results that carry no rows.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyPublisher;

impl<T> Publisher<T> for EmptyPublisher {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        subscriber.on_subscribe(Subscription::inert());
        subscriber.on_complete();
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
