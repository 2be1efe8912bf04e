use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

use crate::error::SqlReactiveDbError;

use super::{Publisher, Subscriber, Subscription, lock};

enum Event<T> {
    Next(T),
    Error(SqlReactiveDbError),
    Complete,
}

struct ChannelSubscriber<T> {
    events: UnboundedSender<Event<T>>,
    subscription: Mutex<Option<Subscription>>,
    prefetch: u64,
}

impl<T> ChannelSubscriber<T> {
    fn subscription(&self) -> Option<Subscription> {
        lock(&self.subscription).clone()
    }

    /// Drop the upstream handle, cancelling it when the stream stopped early.
    fn release(&self, cancel: bool) {
        let released = lock(&self.subscription).take();
        if cancel && let Some(subscription) = released {
            subscription.cancel();
        }
    }

    fn deliver(&self, event: Event<T>) {
        if self.events.send(event).is_err() {
            trace!("row stream receiver gone, cancelling upstream");
            self.release(true);
        }
    }
}

impl<T: Send> Subscriber<T> for ChannelSubscriber<T> {
    fn on_subscribe(&self, subscription: Subscription) {
        let first = {
            let mut slot = lock(&self.subscription);
            let first = slot.is_none();
            if first {
                *slot = Some(subscription.clone());
            }
            first
        };
        if first {
            subscription.request(self.prefetch);
        } else {
            subscription.cancel();
        }
    }

    fn on_next(&self, item: T) {
        self.deliver(Event::Next(item));
    }

    fn on_error(&self, error: SqlReactiveDbError) {
        self.deliver(Event::Error(error));
    }

    fn on_complete(&self) {
        self.deliver(Event::Complete);
    }
}

/// Async [`Stream`] view over any [`Publisher`].
///
/// Requests `prefetch` items up front and tops demand back up once half of that window has
/// been consumed, so the channel never holds more than `prefetch` undelivered items.
/// Dropping the stream cancels the subscription.
pub struct RowStream<T> {
    events: UnboundedReceiver<Event<T>>,
    subscriber: Arc<ChannelSubscriber<T>>,
    consumed: u64,
    finished: bool,
}

impl<T: Send + 'static> RowStream<T> {
    /// Subscribe to `publisher` and expose its items as a stream.
    ///
    /// `prefetch` is clamped to at least one.
    pub fn new<P>(publisher: &P, prefetch: u64) -> Self
    where
        P: Publisher<T> + ?Sized,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber = Arc::new(ChannelSubscriber {
            events: tx,
            subscription: Mutex::new(None),
            prefetch: prefetch.max(1),
        });
        publisher.subscribe(subscriber.clone());
        Self {
            events: rx,
            subscriber,
            consumed: 0,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.subscriber.release(false);
    }

    fn replenish(&mut self) {
        self.consumed += 1;
        let threshold = (self.subscriber.prefetch / 2).max(1);
        if self.consumed >= threshold {
            if let Some(subscription) = self.subscriber.subscription() {
                subscription.request(self.consumed);
            }
            self.consumed = 0;
        }
    }
}

impl<T> Unpin for RowStream<T> {}

impl<T: Send + 'static> Stream for RowStream<T> {
    type Item = Result<T, SqlReactiveDbError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.events.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Event::Next(item))) => {
                self.replenish();
                Poll::Ready(Some(Ok(item)))
            }
            Poll::Ready(Some(Event::Error(error))) => {
                self.finish();
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(Some(Event::Complete) | None) => {
                self.finish();
                Poll::Ready(None)
            }
        }
    }
}

impl<T> Drop for RowStream<T> {
    fn drop(&mut self) {
        self.subscriber.release(!self.finished);
    }
}
