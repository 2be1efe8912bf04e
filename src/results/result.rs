use std::sync::{Arc, OnceLock};

use crate::error::SqlReactiveDbError;
use crate::publisher::{EmptyPublisher, Publisher, RowStream, Subscriber, Subscription};

use super::metadata::RowMetadata;
use super::row::Row;

type RowMapper<U> = dyn Fn(Row, &RowMetadata) -> U + Send + Sync;

/// Outcome of one statement execution: a row stream paired with an update count.
///
/// Queries carry rows and a zero count; DML carries an empty stream and its affected-row count.
pub struct SqlResult {
    rows: Arc<dyn Publisher<Row>>,
    rows_updated: u64,
}

impl SqlResult {
    /// Pair a row stream with an update count.
    ///
    /// # Errors
    /// Returns `InvalidOperation` if `rows` is missing or `update_count` is negative.
    pub fn new(
        rows: Option<Arc<dyn Publisher<Row>>>,
        update_count: i64,
    ) -> Result<Self, SqlReactiveDbError> {
        let rows = rows.ok_or_else(|| {
            SqlReactiveDbError::InvalidOperation("result requires a row stream".into())
        })?;
        let rows_updated = u64::try_from(update_count).map_err(|_| {
            SqlReactiveDbError::InvalidOperation(format!(
                "update count must not be negative, got {update_count}"
            ))
        })?;
        Ok(Self { rows, rows_updated })
    }

    /// Result of a statement that returns no rows.
    ///
    /// # Errors
    /// Returns `InvalidOperation` if `update_count` is negative.
    pub fn from_update_count(update_count: i64) -> Result<Self, SqlReactiveDbError> {
        let rows: Arc<dyn Publisher<Row>> = Arc::new(EmptyPublisher);
        Self::new(Some(rows), update_count)
    }

    /// Number of rows the statement affected. Independent of whether rows were consumed.
    #[must_use]
    pub fn rows_updated(&self) -> u64 {
        self.rows_updated
    }

    /// Apply `mapper` to every emitted row together with the result's column metadata.
    ///
    /// The metadata is built from the first row and shared by all later rows.
    pub fn map<U, F>(self, mapper: F) -> MappedRows<U>
    where
        U: Send + 'static,
        F: Fn(Row, &RowMetadata) -> U + Send + Sync + 'static,
    {
        MappedRows {
            source: self.rows,
            mapper: Arc::new(mapper),
            metadata: Arc::new(OnceLock::new()),
        }
    }

    /// Row filtering is not offered by this driver.
    ///
    /// # Errors
    /// Always returns `NotSupported`.
    pub fn filter<P>(self, _predicate: P) -> Result<Self, SqlReactiveDbError>
    where
        P: Fn(&Row) -> bool,
    {
        Err(SqlReactiveDbError::NotSupported(
            "result filtering is not supported; use map".into(),
        ))
    }

    /// Raw row stream without metadata.
    #[must_use]
    pub fn into_rows(self) -> Arc<dyn Publisher<Row>> {
        self.rows
    }

    /// Consume the raw rows as an async stream.
    #[must_use]
    pub fn into_stream(self, prefetch: u64) -> RowStream<Row> {
        RowStream::new(self.rows.as_ref(), prefetch)
    }
}

impl std::fmt::Debug for SqlResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlResult")
            .field("rows_updated", &self.rows_updated)
            .finish_non_exhaustive()
    }
}

/// Row stream of a [`SqlResult`] passed through a mapping function.
pub struct MappedRows<U> {
    source: Arc<dyn Publisher<Row>>,
    mapper: Arc<RowMapper<U>>,
    metadata: Arc<OnceLock<Arc<RowMetadata>>>,
}

impl<U: Send + 'static> MappedRows<U> {
    /// Metadata built so far; `None` until the first row has been mapped.
    #[must_use]
    pub fn metadata(&self) -> Option<Arc<RowMetadata>> {
        self.metadata.get().cloned()
    }

    /// Consume the mapped rows as an async stream.
    #[must_use]
    pub fn into_stream(self, prefetch: u64) -> RowStream<U> {
        RowStream::new(&self, prefetch)
    }
}

impl<U: Send + 'static> Publisher<U> for MappedRows<U> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<U>>) {
        self.source.subscribe(Arc::new(MapSubscriber {
            downstream: subscriber,
            mapper: Arc::clone(&self.mapper),
            metadata: Arc::clone(&self.metadata),
        }));
    }
}

struct MapSubscriber<U> {
    downstream: Arc<dyn Subscriber<U>>,
    mapper: Arc<RowMapper<U>>,
    metadata: Arc<OnceLock<Arc<RowMetadata>>>,
}

impl<U: Send + 'static> Subscriber<Row> for MapSubscriber<U> {
    fn on_subscribe(&self, subscription: Subscription) {
        self.downstream.on_subscribe(subscription);
    }

    fn on_next(&self, row: Row) {
        let metadata = self
            .metadata
            .get_or_init(|| Arc::new(RowMetadata::from_row(&row)));
        let mapped = (self.mapper)(row, &**metadata);
        self.downstream.on_next(mapped);
    }

    fn on_error(&self, error: SqlReactiveDbError) {
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        self.downstream.on_complete();
    }
}
