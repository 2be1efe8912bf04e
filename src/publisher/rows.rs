use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::config::RedeliveryPolicy;
use crate::engine::{CallbackDirective, CursorCallback, CursorSignal, RowCursor};
use crate::error::SqlReactiveDbError;

use super::demand::{DemandState, Take};
use super::{Publisher, Subscriber, Subscription, SubscriptionControl, lock};

/// Presents an engine cursor as a demand-respecting stream.
///
/// The cursor is started when the first (and only) subscriber arrives. Each ready row is
/// emitted only if the subscriber has outstanding demand; otherwise the engine is told to
/// pause and is resumed once, by the next `request`.
pub struct RowPublisher<T> {
    cursor: Mutex<Option<Arc<dyn RowCursor<T>>>>,
    policy: RedeliveryPolicy,
}

impl<T: Send + 'static> RowPublisher<T> {
    pub fn new(cursor: Arc<dyn RowCursor<T>>, policy: RedeliveryPolicy) -> Self {
        Self {
            cursor: Mutex::new(Some(cursor)),
            policy,
        }
    }
}

impl<T: Send + 'static> Publisher<T> for RowPublisher<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let Some(cursor) = lock(&self.cursor).take() else {
            subscriber.on_subscribe(Subscription::inert());
            subscriber.on_error(SqlReactiveDbError::InvalidOperation(
                "row stream supports a single subscriber".into(),
            ));
            return;
        };

        let emitter = Arc::new(RowEmitter::new(
            Arc::clone(&cursor),
            Arc::clone(&subscriber),
            self.policy,
        ));
        subscriber.on_subscribe(Subscription::new(emitter.clone()));

        // the subscriber may have cancelled from inside on_subscribe
        if !emitter.is_terminated() {
            cursor.start(emitter);
        }
    }
}

impl<T> Drop for RowPublisher<T> {
    fn drop(&mut self) {
        // never subscribed: nobody will drain the cursor
        if let Some(cursor) = lock(&self.cursor).take() {
            cursor.cancel();
        }
    }
}

/// Cursor and subscriber of a live subscription.
struct Handles<T> {
    cursor: Arc<dyn RowCursor<T>>,
    subscriber: Arc<dyn Subscriber<T>>,
}

/// Per-subscription bridge state, shared between the engine's callback threads and the consumer.
///
/// The subscriber holds the emitter through its `Subscription`, so the emitter lets go of the
/// subscriber and the cursor as soon as the stream terminates.
pub(crate) struct RowEmitter<T> {
    demand: DemandState,
    terminated: AtomicBool,
    handles: Mutex<Option<Handles<T>>>,
    policy: RedeliveryPolicy,
    parked: Mutex<Option<T>>,
}

impl<T: Send + 'static> RowEmitter<T> {
    pub(crate) fn new(
        cursor: Arc<dyn RowCursor<T>>,
        subscriber: Arc<dyn Subscriber<T>>,
        policy: RedeliveryPolicy,
    ) -> Self {
        Self {
            demand: DemandState::default(),
            terminated: AtomicBool::new(false),
            handles: Mutex::new(Some(Handles { cursor, subscriber })),
            policy,
            parked: Mutex::new(None),
        }
    }

    /// Apply one cursor signal and tell the engine what to do next.
    pub(crate) fn on_cursor_signal(&self, signal: CursorSignal<T>) -> CallbackDirective {
        if self.is_terminated() {
            return CallbackDirective::Done;
        }

        match signal {
            CursorSignal::RowReady(row) => {
                if self.policy == RedeliveryPolicy::BufferPausedRow {
                    return self.offer_buffered(row);
                }
                match self.demand.try_take() {
                    Take::Granted => {
                        self.emit(row);
                        CallbackDirective::Continue
                    }
                    Take::Paused => {
                        trace!("no outstanding demand, pausing cursor");
                        CallbackDirective::Pause
                    }
                }
            }
            CursorSignal::NotReady => CallbackDirective::Continue,
            CursorSignal::Done => {
                if let Some(handles) = self.terminate() {
                    handles.subscriber.on_complete();
                }
                CallbackDirective::Done
            }
            CursorSignal::Error(error) => {
                if let Some(handles) = self.terminate() {
                    handles.subscriber.on_error(error);
                }
                CallbackDirective::Done
            }
        }
    }

    /// Add demand; when the cursor was paused, resume it exactly once.
    pub(crate) fn on_demand_increase(&self, n: u64) {
        if self.is_terminated() {
            return;
        }
        if n == 0 {
            if let Some(handles) = self.terminate() {
                handles.cursor.cancel();
                handles.subscriber.on_error(SqlReactiveDbError::InvalidOperation(
                    "demand must be positive".into(),
                ));
            }
            return;
        }

        if !self.demand.add(n) {
            return;
        }

        self.emit_parked();
        if let Some(cursor) = self.cursor() {
            trace!(added = n, "demand restored, resuming cursor");
            cursor.resume();
        }
    }

    /// Park the row, then spend demand on it. While paused the row stays in `parked`.
    fn offer_buffered(&self, row: T) -> CallbackDirective {
        *lock(&self.parked) = Some(row);
        match self.demand.try_take() {
            Take::Granted => {
                if let Some(row) = lock(&self.parked).take() {
                    self.emit(row);
                }
                CallbackDirective::Continue
            }
            Take::Paused => {
                trace!("no outstanding demand, parking row and pausing cursor");
                CallbackDirective::Pause
            }
        }
    }

    fn emit(&self, row: T) {
        // cancelled while this row was in flight: drop it
        if let Some(subscriber) = self.subscriber() {
            subscriber.on_next(row);
        }
    }

    fn emit_parked(&self) {
        let Some(row) = lock(&self.parked).take() else {
            return;
        };
        if self.demand.try_take() == Take::Granted {
            self.emit(row);
        } else {
            *lock(&self.parked) = Some(row);
        }
    }

    fn cancel_stream(&self) {
        if let Some(handles) = self.terminate() {
            handles.cursor.cancel();
        }
    }

    /// Flip to terminated. Only the first caller gets the handles back; the emitter keeps none.
    fn terminate(&self) -> Option<Handles<T>> {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return None;
        }
        lock(&self.parked).take();
        lock(&self.handles).take()
    }

    fn cursor(&self) -> Option<Arc<dyn RowCursor<T>>> {
        lock(&self.handles)
            .as_ref()
            .map(|handles| Arc::clone(&handles.cursor))
    }

    fn subscriber(&self) -> Option<Arc<dyn Subscriber<T>>> {
        lock(&self.handles)
            .as_ref()
            .map(|handles| Arc::clone(&handles.subscriber))
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn outstanding_demand(&self) -> u64 {
        self.demand.outstanding()
    }

    #[cfg(test)]
    pub(crate) fn is_paused(&self) -> bool {
        self.demand.is_paused()
    }
}

impl<T: Send + 'static> CursorCallback<T> for RowEmitter<T> {
    fn cursor_ready(&self, cursor: &dyn RowCursor<T>) -> CallbackDirective {
        if self.is_terminated() {
            return CallbackDirective::Done;
        }
        let signal = cursor.pull_next().unwrap_or_else(CursorSignal::Error);
        self.on_cursor_signal(signal)
    }
}

impl<T: Send + 'static> SubscriptionControl for RowEmitter<T> {
    fn request(&self, n: u64) {
        self.on_demand_increase(n);
    }

    fn cancel(&self) {
        self.cancel_stream();
    }
}
