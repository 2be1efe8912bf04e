#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::error::Error;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use sql_reactive::prelude::*;

pub type TestResult = Result<(), Box<dyn Error>>;

pub fn block_on<F>(test: F) -> TestResult
where
    F: Future<Output = TestResult>,
{
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(test)
}

pub fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Rows with a single integer column.
pub fn int_rows(column: &str, values: impl IntoIterator<Item = i64>) -> Vec<Row> {
    let names = Arc::new(vec![column.to_string()]);
    values
        .into_iter()
        .map(|v| Row::new(Arc::clone(&names), vec![RowValues::Int(v)]))
        .collect()
}

pub fn ints(rows: &[Row], column: &str) -> Vec<i64> {
    rows.iter()
        .filter_map(|row| row.get(column).and_then(RowValues::as_int).copied())
        .collect()
}

/// One scripted cursor event.
#[derive(Debug, Clone)]
pub enum Step {
    Row(Row),
    NotReady,
    Fail(String),
}

pub fn row_steps(rows: Vec<Row>) -> Vec<Step> {
    rows.into_iter().map(Step::Row).collect()
}

/// Cursor replaying a script of events into the registered callback.
///
/// A refused row is handed back on the next pull when `redeliver` is set. With `threaded`
/// every start or resume drives the callback loop from a fresh OS thread.
pub struct MockCursor {
    me: Weak<MockCursor>,
    steps: Mutex<VecDeque<Step>>,
    callback: Mutex<Option<Arc<dyn CursorCallback<Row>>>>,
    in_flight: Mutex<Option<Row>>,
    drive_lock: Mutex<()>,
    redeliver: bool,
    threaded: bool,
    cancelled: AtomicBool,
    pub starts: AtomicUsize,
    pub resumes: AtomicUsize,
    pub pauses: AtomicUsize,
    pub cancels: AtomicUsize,
    pub directives: Mutex<Vec<CallbackDirective>>,
}

impl MockCursor {
    pub fn new(steps: Vec<Step>, redeliver: bool, threaded: bool) -> Arc<Self> {
        Arc::new_cyclic(|me| MockCursor {
            me: me.clone(),
            steps: Mutex::new(steps.into()),
            callback: Mutex::new(None),
            in_flight: Mutex::new(None),
            drive_lock: Mutex::new(()),
            redeliver,
            threaded,
            cancelled: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            directives: Mutex::new(Vec::new()),
        })
    }

    pub fn with_rows(rows: Vec<Row>) -> Arc<Self> {
        Self::new(row_steps(rows), true, false)
    }

    pub fn remaining(&self) -> usize {
        lock(&self.steps).len()
    }

    pub fn has_callback(&self) -> bool {
        lock(&self.callback).is_some()
    }

    fn drive(&self) {
        let Some(me) = self.me.upgrade() else {
            return;
        };
        if self.threaded {
            std::thread::spawn(move || me.run_loop());
        } else {
            me.run_loop();
        }
    }

    fn run_loop(&self) {
        let _driving = lock(&self.drive_lock);
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                return;
            }
            let Some(callback) = lock(&self.callback).clone() else {
                return;
            };
            let directive = callback.cursor_ready(self);
            lock(&self.directives).push(directive);
            match directive {
                CallbackDirective::Continue => {}
                CallbackDirective::Pause => {
                    self.pauses.fetch_add(1, Ordering::SeqCst);
                    let refused = lock(&self.in_flight).take();
                    if self.redeliver
                        && let Some(row) = refused
                    {
                        lock(&self.steps).push_front(Step::Row(row));
                    }
                    return;
                }
                CallbackDirective::Done => {
                    lock(&self.callback).take();
                    return;
                }
            }
        }
    }
}

impl RowCursor<Row> for MockCursor {
    fn start(&self, callback: Arc<dyn CursorCallback<Row>>) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *lock(&self.callback) = Some(callback);
        self.drive();
    }

    fn pull_next(&self) -> Result<CursorSignal<Row>, SqlReactiveDbError> {
        let next = lock(&self.steps).pop_front();
        match next {
            None => Ok(CursorSignal::Done),
            Some(Step::Row(row)) => {
                *lock(&self.in_flight) = Some(row.clone());
                Ok(CursorSignal::RowReady(row))
            }
            Some(Step::NotReady) => {
                lock(&self.in_flight).take();
                Ok(CursorSignal::NotReady)
            }
            Some(Step::Fail(message)) => Err(SqlReactiveDbError::EngineError(message)),
        }
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        self.drive();
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.cancelled.store(true, Ordering::SeqCst);
        lock(&self.callback).take();
    }
}

/// Engine double recording every call it receives.
pub struct MockEngine {
    calls: Mutex<Vec<String>>,
    contexts: Mutex<Vec<ExecutionContext>>,
    queries: Mutex<Vec<String>>,
    singles: Mutex<Vec<BoundStatement>>,
    batches: Mutex<Vec<Vec<BoundStatement>>>,
    ddl: Mutex<Vec<String>>,
    scripts: Mutex<HashMap<String, Vec<Step>>>,
    cursors: Mutex<Vec<Arc<MockCursor>>>,
    update_counts: Mutex<VecDeque<i64>>,
    failures: Mutex<HashMap<String, String>>,
    closed: AtomicBool,
    redeliver: AtomicBool,
    threaded: AtomicBool,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            contexts: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            singles: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            ddl: Mutex::new(Vec::new()),
            scripts: Mutex::new(HashMap::new()),
            cursors: Mutex::new(Vec::new()),
            update_counts: Mutex::new(VecDeque::new()),
            failures: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            redeliver: AtomicBool::new(true),
            threaded: AtomicBool::new(false),
        })
    }

    /// Script the cursor handed out for `sql`. Unscripted queries return one row `1`.
    pub fn script(&self, sql: &str, steps: Vec<Step>) {
        lock(&self.scripts).insert(sql.to_string(), steps);
    }

    pub fn script_rows(&self, sql: &str, rows: Vec<Row>) {
        self.script(sql, row_steps(rows));
    }

    /// Update counts returned in order by single and batch DML; unqueued statements affect one row.
    pub fn queue_update_counts(&self, counts: &[i64]) {
        lock(&self.update_counts).extend(counts.iter().copied());
    }

    /// Make the next call of `op` fail with an engine error.
    pub fn fail_next(&self, op: &str, message: &str) {
        lock(&self.failures).insert(op.to_string(), message.to_string());
    }

    pub fn set_closed(&self, closed: bool) {
        self.closed.store(closed, Ordering::SeqCst);
    }

    pub fn set_redeliver(&self, redeliver: bool) {
        self.redeliver.store(redeliver, Ordering::SeqCst);
    }

    pub fn set_threaded(&self, threaded: bool) {
        self.threaded.store(threaded, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, op: &str) -> usize {
        lock(&self.calls).iter().filter(|call| *call == op).count()
    }

    pub fn contexts(&self) -> Vec<ExecutionContext> {
        lock(&self.contexts).clone()
    }

    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }

    pub fn singles(&self) -> Vec<BoundStatement> {
        lock(&self.singles).clone()
    }

    pub fn batches(&self) -> Vec<Vec<BoundStatement>> {
        lock(&self.batches).clone()
    }

    pub fn ddl(&self) -> Vec<String> {
        lock(&self.ddl).clone()
    }

    pub fn cursor(&self, index: usize) -> Option<Arc<MockCursor>> {
        lock(&self.cursors).get(index).cloned()
    }

    /// Cursors still referenced from outside the engine's own bookkeeping.
    pub fn live_cursors(&self) -> usize {
        lock(&self.cursors)
            .iter()
            .filter(|cursor| Arc::strong_count(cursor) > 1)
            .count()
    }

    fn record(&self, op: &str) -> Result<(), SqlReactiveDbError> {
        lock(&self.calls).push(op.to_string());
        match lock(&self.failures).remove(op) {
            Some(message) => Err(SqlReactiveDbError::EngineError(message)),
            None => Ok(()),
        }
    }

    fn next_count(&self) -> i64 {
        lock(&self.update_counts).pop_front().unwrap_or(1)
    }
}

#[async_trait]
impl QueryEngine for MockEngine {
    async fn execute_query(
        &self,
        statement: &BoundStatement,
        context: ExecutionContext,
    ) -> Result<Arc<dyn RowCursor<Row>>, SqlReactiveDbError> {
        self.record("execute_query")?;
        lock(&self.contexts).push(context);
        lock(&self.queries).push(statement.sql.clone());
        let steps = lock(&self.scripts)
            .get(&statement.sql)
            .cloned()
            .unwrap_or_else(|| row_steps(int_rows("1", [1])));
        let cursor = MockCursor::new(
            steps,
            self.redeliver.load(Ordering::SeqCst),
            self.threaded.load(Ordering::SeqCst),
        );
        lock(&self.cursors).push(Arc::clone(&cursor));
        let cursor: Arc<dyn RowCursor<Row>> = cursor;
        Ok(cursor)
    }

    async fn execute_single(&self, statement: &BoundStatement) -> Result<i64, SqlReactiveDbError> {
        self.record("execute_single")?;
        lock(&self.singles).push(statement.clone());
        Ok(self.next_count())
    }

    async fn execute_batch(
        &self,
        statements: &[BoundStatement],
    ) -> Result<Vec<i64>, SqlReactiveDbError> {
        self.record("execute_batch")?;
        lock(&self.batches).push(statements.to_vec());
        Ok(statements.iter().map(|_| self.next_count()).collect())
    }

    async fn update_ddl(&self, sql: &str) -> Result<(), SqlReactiveDbError> {
        self.record("update_ddl")?;
        lock(&self.ddl).push(sql.to_string());
        Ok(())
    }

    async fn begin_read_write(&self) -> Result<(), SqlReactiveDbError> {
        self.record("begin_read_write")
    }

    async fn begin_read_only(&self, _bound: ConsistencyBound) -> Result<(), SqlReactiveDbError> {
        self.record("begin_read_only")
    }

    async fn commit(&self) -> Result<(), SqlReactiveDbError> {
        self.record("commit")
    }

    async fn rollback(&self) -> Result<(), SqlReactiveDbError> {
        self.record("rollback")
    }

    async fn close_read_only(&self) -> Result<(), SqlReactiveDbError> {
        self.record("close_read_only")
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub fn connect(engine: &Arc<MockEngine>) -> Connection {
    connect_with(engine, SessionConfig::default())
}

pub fn connect_with(engine: &Arc<MockEngine>, config: SessionConfig) -> Connection {
    let engine: Arc<dyn QueryEngine> = engine.clone();
    match Connection::new(engine, config) {
        Ok(conn) => conn,
        Err(err) => panic!("connection setup failed: {err}"),
    }
}

/// Subscriber that records every signal and leaves demand to the test.
#[derive(Default)]
pub struct Recorder {
    subscription: Mutex<Option<Subscription>>,
    items: Mutex<Vec<Row>>,
    errors: Mutex<Vec<SqlReactiveDbError>>,
    completions: AtomicUsize,
    subscribes: AtomicUsize,
    initial_demand: u64,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Recorder that requests `n` items from inside `on_subscribe`.
    pub fn with_demand(n: u64) -> Arc<Self> {
        Arc::new(Self {
            initial_demand: n,
            ..Self::default()
        })
    }

    pub fn request(&self, n: u64) {
        let subscription = lock(&self.subscription).clone();
        if let Some(subscription) = subscription {
            subscription.request(n);
        }
    }

    pub fn cancel(&self) {
        let subscription = lock(&self.subscription).clone();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }

    pub fn items(&self) -> Vec<Row> {
        lock(&self.items).clone()
    }

    pub fn values(&self, column: &str) -> Vec<i64> {
        ints(&self.items(), column)
    }

    pub fn error_count(&self) -> usize {
        lock(&self.errors).len()
    }

    pub fn take_errors(&self) -> Vec<SqlReactiveDbError> {
        std::mem::take(&mut *lock(&self.errors))
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn subscribes(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }
}

impl Subscriber<Row> for Recorder {
    fn on_subscribe(&self, subscription: Subscription) {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        *lock(&self.subscription) = Some(subscription.clone());
        if self.initial_demand > 0 {
            subscription.request(self.initial_demand);
        }
    }

    fn on_next(&self, item: Row) {
        lock(&self.items).push(item);
    }

    fn on_error(&self, error: SqlReactiveDbError) {
        lock(&self.errors).push(error);
    }

    fn on_complete(&self) {
        self.completions.fetch_add(1, Ordering::SeqCst);
    }
}
