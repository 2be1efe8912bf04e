mod common;

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use sql_reactive::prelude::*;

use common::{MockCursor, MockEngine, TestResult, block_on, connect, int_rows, lock};

const SINGERS: &str = "SELECT id, name FROM singers ORDER BY id";

fn singer_rows() -> Vec<Row> {
    let columns = Arc::new(vec!["id".to_string(), "name".to_string()]);
    [(1, "Marc"), (2, "Catalina"), (3, "Alice"), (4, "Lea"), (5, "David")]
        .into_iter()
        .map(|(id, name)| Row::new(Arc::clone(&columns), vec![RowValues::Int(id), name.into()]))
        .collect()
}

fn row_publisher(rows: Vec<Row>) -> Arc<dyn Publisher<Row>> {
    let cursor: Arc<dyn RowCursor<Row>> = MockCursor::with_rows(rows);
    Arc::new(RowPublisher::new(cursor, RedeliveryPolicy::default()))
}

#[test]
fn construction_rejects_missing_rows_and_negative_counts() {
    let err = SqlResult::new(None, 0).unwrap_err();
    assert!(matches!(err, SqlReactiveDbError::InvalidOperation(_)));

    let err = SqlResult::new(Some(row_publisher(Vec::new())), -1).unwrap_err();
    assert!(matches!(err, SqlReactiveDbError::InvalidOperation(_)));

    let err = SqlResult::from_update_count(-3).unwrap_err();
    assert!(matches!(err, SqlReactiveDbError::InvalidOperation(_)));
}

#[test]
fn update_count_is_independent_of_rows() -> TestResult {
    let result = SqlResult::from_update_count(9)?;
    assert_eq!(result.rows_updated(), 9);
    assert_eq!(result.rows_updated(), 9);

    let result = SqlResult::new(Some(row_publisher(int_rows("n", [1, 2]))), 0)?;
    assert_eq!(result.rows_updated(), 0);
    Ok(())
}

#[test]
fn filter_is_not_supported() -> TestResult {
    let result = SqlResult::from_update_count(1)?;
    let err = result.filter(|_row| true).unwrap_err();
    assert!(matches!(err, SqlReactiveDbError::NotSupported(_)));
    Ok(())
}

#[test]
fn metadata_is_built_once_and_shared() -> TestResult {
    block_on(async {
        let result = SqlResult::new(Some(row_publisher(singer_rows())), 0)?;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&seen);

        let mapped = result.map(move |row, metadata| {
            lock(&recorded).push(std::ptr::from_ref(metadata) as usize);
            row.get("name").and_then(RowValues::as_text).map(str::to_owned)
        });
        assert!(mapped.metadata().is_none());

        let mut names = Vec::new();
        let mut stream = RowStream::new(&mapped, 2);
        while let Some(name) = stream.next().await {
            names.push(name?);
        }

        let addresses = lock(&seen).clone();
        assert_eq!(addresses.len(), 5);
        assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));

        let metadata = mapped.metadata().ok_or("metadata missing after rows")?;
        assert_eq!(metadata.column_names(), vec!["id", "name"]);
        assert_eq!(metadata.index_of("name"), Some(1));
        assert_eq!(
            names,
            vec![
                Some("Marc".to_string()),
                Some("Catalina".to_string()),
                Some("Alice".to_string()),
                Some("Lea".to_string()),
                Some("David".to_string()),
            ]
        );
        Ok(())
    })
}

#[test]
fn mapper_reads_columns_through_metadata() -> TestResult {
    block_on(async {
        let engine = MockEngine::new();
        engine.script_rows(SINGERS, singer_rows());
        let conn = connect(&engine);

        let result = conn.create_statement(SINGERS)?.into_query()?.execute().await?;
        assert_eq!(result.rows_updated(), 0);

        let mut pairs = result
            .map(|row, metadata| {
                let id = metadata
                    .index_of("id")
                    .and_then(|idx| row.get_by_index(idx))
                    .and_then(RowValues::as_int)
                    .copied();
                let width = metadata.columns().len();
                (id, width)
            })
            .into_stream(3);

        let mut ids = Vec::new();
        while let Some(pair) = pairs.next().await {
            let (id, width) = pair?;
            assert_eq!(width, 2);
            ids.push(id);
        }
        assert_eq!(ids, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
        Ok(())
    })
}

#[test]
fn empty_result_completes_without_metadata() -> TestResult {
    block_on(async {
        let result = SqlResult::from_update_count(2)?;
        assert_eq!(result.rows_updated(), 2);

        let mapped = result.map(|row, _metadata| row.len());
        let mut stream = RowStream::new(&mapped, 4);
        assert!(stream.next().await.is_none());
        assert!(mapped.metadata().is_none());
        Ok(())
    })
}

#[test]
fn raw_rows_stream_in_cursor_order() -> TestResult {
    block_on(async {
        let result = SqlResult::new(Some(row_publisher(int_rows("n", 1..=20))), 0)?;
        let mut stream = result.into_stream(4);
        let mut values = Vec::new();
        while let Some(row) = stream.next().await {
            let row = row?;
            values.extend(row.get("n").and_then(RowValues::as_int).copied());
        }
        assert_eq!(values, (1..=20).collect::<Vec<i64>>());
        Ok(())
    })
}

#[test]
fn mapped_rows_accept_single_subscriber() -> TestResult {
    let result = SqlResult::new(Some(row_publisher(int_rows("n", [1]))), 0)?;
    let mapped = result.map(|row, _metadata| row.into_values());

    let _first = RowStream::new(&mapped, 1);
    let mut second = RowStream::new(&mapped, 1);
    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(second.next());
    assert!(matches!(
        outcome,
        Some(Err(SqlReactiveDbError::InvalidOperation(_)))
    ));
    Ok(())
}
