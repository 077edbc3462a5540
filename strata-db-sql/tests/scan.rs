//! End-to-end scan tests: raw row readers over the in-memory store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strata_db_core::codec::{encode_as_key, encode_id, encode_row_payload, map_key, MAPPED_PREFIX};
use strata_db_core::{
    Column, Error as CoreError, Index, MemoryStore, ScanContext, SqlType, SqlValue, Table,
    TxMetadata, WriteBatch,
};
use strata_db_sql::{
    read_all_rows, read_rows_batch, ColSelector, Instant, InstantExp, Period, PeriodBound, Params,
    RangeBound, RawRowReader, RowReader, ScanSpecs, SqlEngine, SqlError, SqlOptions, SqlTx,
    TypedValueRange,
};

const PREFIX: &[u8] = b"sql";

fn users_table() -> Table {
    Table::new(
        1,
        "t",
        vec![
            Column::new(1, "id", SqlType::Integer),
            Column::new(2, "name", SqlType::Varchar).with_max_len(32),
        ],
    )
    .unwrap()
    .with_index(Index {
        id: 0,
        cols: vec![Column::new(1, "id", SqlType::Integer)],
    })
    .unwrap()
}

fn engine_with(table: Table) -> Arc<SqlEngine> {
    let mut engine = SqlEngine::new(SqlOptions {
        prefix: PREFIX.to_vec(),
        batch_size: 100,
    });
    engine.catalog_mut().put_table(table);
    Arc::new(engine)
}

fn begin(engine: &Arc<SqlEngine>, store: &MemoryStore) -> SqlTx {
    engine.begin(Arc::new(store.snapshot()))
}

/// Physical key of a row under the given index: shared table+index prefix
/// plus the key encodings of the indexed columns.
fn row_key(table: &Table, index: &Index, values: &[(u32, SqlValue)]) -> Vec<u8> {
    let mut key = map_key(
        PREFIX,
        MAPPED_PREFIX,
        &[&encode_id(table.id()), &encode_id(index.id)],
    );
    for col in &index.cols {
        let (_, v) = values
            .iter()
            .find(|(id, _)| *id == col.id)
            .expect("indexed column must have a value");
        key.extend(encode_as_key(v, col.ty, col.max_len).unwrap());
    }
    key
}

fn insert_row(store: &MemoryStore, table: &Table, values: Vec<(u32, SqlValue)>) -> u64 {
    let index = table.primary_index().unwrap();
    let key = row_key(table, index, &values);
    store.commit(WriteBatch::new().set(key, encode_row_payload(&values)))
}

fn user(id: i64, name: &str) -> Vec<(u32, SqlValue)> {
    vec![
        (1, SqlValue::Integer(id)),
        (2, SqlValue::Varchar(name.to_string())),
    ]
}

fn reader_for(tx: &SqlTx, table: &str, specs: ScanSpecs) -> RawRowReader {
    RawRowReader::new(
        tx.clone(),
        Params::new(),
        tx.table(table).unwrap(),
        Period::none(),
        "",
        specs,
    )
    .unwrap()
}

fn specs_for(tx: &SqlTx, table: &str) -> ScanSpecs {
    ScanSpecs::over(tx.table(table).unwrap().primary_index().unwrap().clone())
}

fn ids_of(rows: &[strata_db_sql::Row]) -> Vec<i64> {
    rows.iter()
        .map(|r| match r.values_by_selector["(t.id)"] {
            SqlValue::Integer(id) => id,
            ref v => panic!("id must be an integer, got {v:?}"),
        })
        .collect()
}

#[tokio::test]
async fn test_ascending_full_scan() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    insert_row(&store, &table, user(2, "b"));
    insert_row(&store, &table, user(1, "a"));
    insert_row(&store, &table, user(3, "c"));

    let tx = begin(&engine, &store);
    let mut reader = reader_for(&tx, "t", specs_for(&tx, "t"));

    let ctx = ScanContext::none();
    let rows = read_all_rows(&ctx, &mut reader).await.unwrap();
    assert_eq!(ids_of(&rows), vec![1, 2, 3]);
    assert!(matches!(
        reader.read(&ctx).await,
        Err(SqlError::NoMoreRows)
    ));
    reader.close().unwrap();
}

#[tokio::test]
async fn test_point_range_scan() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
        insert_row(&store, &table, user(id, name));
    }

    let tx = begin(&engine, &store);
    let mut specs = specs_for(&tx, "t");
    specs
        .ranges_by_col_id
        .insert(1, TypedValueRange::point(2i64));
    let mut reader = reader_for(&tx, "t", specs);

    let rows = read_all_rows(&ScanContext::none(), &mut reader).await.unwrap();
    assert_eq!(ids_of(&rows), vec![2]);
    assert_eq!(
        rows[0].values_by_selector["(t.name)"],
        SqlValue::Varchar("b".into())
    );
    reader.close().unwrap();
}

#[tokio::test]
async fn test_descending_half_open_range() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
        insert_row(&store, &table, user(id, name));
    }

    let tx = begin(&engine, &store);
    let mut specs = specs_for(&tx, "t");
    specs
        .ranges_by_col_id
        .insert(1, TypedValueRange::up_to(RangeBound::inclusive(2i64)));
    specs.desc_order = true;
    let mut reader = reader_for(&tx, "t", specs);

    let rows = read_all_rows(&ScanContext::none(), &mut reader).await.unwrap();
    assert_eq!(ids_of(&rows), vec![2, 1]);
    reader.close().unwrap();
}

#[tokio::test]
async fn test_dropped_column_skipped_in_decode() {
    let store = MemoryStore::new();
    let table = users_table();
    for (id, name) in [(1, "a"), (2, "b")] {
        insert_row(&store, &table, user(id, name));
    }

    // the catalog now sees the table without `name`; stored payloads
    // still carry values for the dropped id
    let mut dropped = users_table();
    dropped.drop_column("name").unwrap();
    let engine = engine_with(dropped);

    let tx = begin(&engine, &store);
    let mut reader = reader_for(&tx, "t", specs_for(&tx, "t"));

    let rows = read_all_rows(&ScanContext::none(), &mut reader).await.unwrap();
    assert_eq!(ids_of(&rows), vec![1, 2]);
    for row in &rows {
        assert_eq!(row.values_by_position.len(), 1);
        assert!(!row.values_by_selector.contains_key("(t.name)"));
    }
    assert_eq!(reader.columns().len(), 1);
    reader.close().unwrap();
}

#[tokio::test]
async fn test_history_scan_projects_revisions() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    insert_row(&store, &table, user(1, "a"));
    insert_row(&store, &table, user(1, "a2"));
    insert_row(&store, &table, user(1, "a3"));

    let tx = begin(&engine, &store);
    let mut specs = specs_for(&tx, "t");
    specs.include_history = true;
    let mut reader = reader_for(&tx, "t", specs);

    let rows = read_all_rows(&ScanContext::none(), &mut reader).await.unwrap();
    assert_eq!(rows.len(), 3);
    let revs: Vec<SqlValue> = rows
        .iter()
        .map(|r| r.values_by_selector["(t._rev)"].clone())
        .collect();
    assert_eq!(
        revs,
        vec![
            SqlValue::Integer(1),
            SqlValue::Integer(2),
            SqlValue::Integer(3)
        ]
    );
    let names: Vec<SqlValue> = rows
        .iter()
        .map(|r| r.values_by_selector["(t.name)"].clone())
        .collect();
    assert_eq!(
        names,
        vec![
            SqlValue::Varchar("a".into()),
            SqlValue::Varchar("a2".into()),
            SqlValue::Varchar("a3".into())
        ]
    );
    reader.close().unwrap();
}

#[tokio::test]
async fn test_as_of_tx_window() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    insert_row(&store, &table, user(1, "a")); // tx 1
    insert_row(&store, &table, user(2, "b")); // tx 2
    insert_row(&store, &table, user(3, "c")); // tx 3

    let tx = begin(&engine, &store);
    let as_of_2 = Period::as_of(Instant::tx_id(InstantExp::Literal(SqlValue::Integer(2))));
    let mut reader = RawRowReader::new(
        tx.clone(),
        Params::new(),
        tx.table("t").unwrap(),
        as_of_2,
        "",
        specs_for(&tx, "t"),
    )
    .unwrap();

    let rows = read_all_rows(&ScanContext::none(), &mut reader).await.unwrap();
    assert_eq!(ids_of(&rows), vec![2]);
    reader.close().unwrap();

    // a window on a nonexistent tx holds no rows
    let as_of_9 = Period::as_of(Instant::tx_id(InstantExp::Literal(SqlValue::Integer(9))));
    let mut reader = RawRowReader::new(
        tx.clone(),
        Params::new(),
        tx.table("t").unwrap(),
        as_of_9,
        "",
        specs_for(&tx, "t"),
    )
    .unwrap();
    assert!(matches!(
        reader.read(&ScanContext::none()).await,
        Err(SqlError::NoMoreRows)
    ));
    reader.close().unwrap();
}

#[tokio::test]
async fn test_inverted_period_yields_no_rows() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
        insert_row(&store, &table, user(id, name));
    }

    let tx = begin(&engine, &store);
    let period = Period::between(
        PeriodBound {
            instant: Instant::tx_id(InstantExp::Literal(SqlValue::Integer(3))),
            inclusive: true,
        },
        PeriodBound {
            instant: Instant::tx_id(InstantExp::Literal(SqlValue::Integer(1))),
            inclusive: true,
        },
    );
    let mut reader = RawRowReader::new(
        tx.clone(),
        Params::new(),
        tx.table("t").unwrap(),
        period,
        "",
        specs_for(&tx, "t"),
    )
    .unwrap();

    assert!(matches!(
        reader.read(&ScanContext::none()).await,
        Err(SqlError::NoMoreRows)
    ));
    reader.close().unwrap();
}

#[tokio::test]
async fn test_period_parameters_bind_lazily() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    insert_row(&store, &table, user(1, "a"));
    insert_row(&store, &table, user(2, "b"));

    let tx = begin(&engine, &store);
    let period = Period::as_of(Instant::tx_id(InstantExp::Param("at".into())));

    // construction succeeds without the binding; resolution happens on
    // the first read
    let mut params = Params::new();
    params.insert("at".into(), SqlValue::Integer(1));
    let mut reader = RawRowReader::new(
        tx.clone(),
        params,
        tx.table("t").unwrap(),
        period.clone(),
        "",
        specs_for(&tx, "t"),
    )
    .unwrap();
    let rows = read_all_rows(&ScanContext::none(), &mut reader).await.unwrap();
    assert_eq!(ids_of(&rows), vec![1]);
    reader.close().unwrap();

    // missing binding surfaces at read time, not construction
    let mut reader = RawRowReader::new(
        tx.clone(),
        Params::new(),
        tx.table("t").unwrap(),
        period,
        "",
        specs_for(&tx, "t"),
    )
    .unwrap();
    assert!(matches!(
        reader.read(&ScanContext::none()).await,
        Err(SqlError::MissingParameter(_))
    ));
    reader.close().unwrap();

    // inferParameters reports the implied type
    let mut types = HashMap::new();
    let tx2 = begin(&engine, &store);
    let mut reader = RawRowReader::new(
        tx2.clone(),
        Params::new(),
        tx2.table("t").unwrap(),
        Period::as_of(Instant::tx_id(InstantExp::Param("at".into()))),
        "",
        specs_for(&tx2, "t"),
    )
    .unwrap();
    reader.infer_parameters(&mut types).unwrap();
    assert_eq!(types["at"], SqlType::Integer);
    reader.close().unwrap();
}

#[tokio::test]
async fn test_pg_type_scan_is_empty() {
    let store = MemoryStore::new();
    let pg_type = Table::new(
        9,
        "pg_type",
        vec![Column::new(1, "oid", SqlType::Integer)],
    )
    .unwrap()
    .with_index(Index {
        id: 0,
        cols: vec![Column::new(1, "oid", SqlType::Integer)],
    })
    .unwrap();
    let engine = engine_with(pg_type);

    let tx = begin(&engine, &store);
    let mut reader = reader_for(&tx, "pg_type", specs_for(&tx, "pg_type"));
    assert!(matches!(
        reader.read(&ScanContext::none()).await,
        Err(SqlError::NoMoreRows)
    ));
    assert_eq!(reader.columns().len(), 1);
    reader.close().unwrap();
}

#[tokio::test]
async fn test_empty_payload_projects_all_nulls() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    let index = table.primary_index().unwrap();

    let key = row_key(&table, index, &[(1, SqlValue::Integer(5))]);
    store.commit(WriteBatch::new().set(key, encode_row_payload(&[])));

    let tx = begin(&engine, &store);
    let mut specs = specs_for(&tx, "t");
    specs.include_history = true;
    let mut reader = reader_for(&tx, "t", specs);

    let row = reader.read(&ScanContext::none()).await.unwrap();
    assert_eq!(row.values_by_position.len(), 3);
    assert_eq!(row.values_by_selector["(t._rev)"], SqlValue::Integer(1));
    assert_eq!(row.values_by_selector["(t.id)"], SqlValue::Null(SqlType::Integer));
    assert_eq!(
        row.values_by_selector["(t.name)"],
        SqlValue::Null(SqlType::Varchar)
    );
    reader.close().unwrap();
}

#[tokio::test]
async fn test_unknown_column_id_is_corruption() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    let index = table.primary_index().unwrap();

    // column id 99 is above the table's watermark
    let key = row_key(&table, index, &[(1, SqlValue::Integer(1))]);
    let payload = encode_row_payload(&[(99, SqlValue::Integer(1))]);
    store.commit(WriteBatch::new().set(key, payload));

    let tx = begin(&engine, &store);
    let mut reader = reader_for(&tx, "t", specs_for(&tx, "t"));
    let err = reader.read(&ScanContext::none()).await.unwrap_err();
    assert!(err.is_corrupted_data(), "got {err:?}");
    reader.close().unwrap();
}

#[tokio::test]
async fn test_trailing_bytes_are_corruption() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    let index = table.primary_index().unwrap();

    let values = user(1, "a");
    let key = row_key(&table, index, &values);
    let mut payload = encode_row_payload(&values);
    payload.push(0xAB);
    store.commit(WriteBatch::new().set(key, payload));

    let tx = begin(&engine, &store);
    let mut reader = reader_for(&tx, "t", specs_for(&tx, "t"));
    let err = reader.read(&ScanContext::none()).await.unwrap_err();
    assert!(err.is_corrupted_data(), "got {err:?}");
    reader.close().unwrap();
}

#[tokio::test]
async fn test_tx_metadata_projection() {
    let store = MemoryStore::new();
    let table = users_table();
    let index = table.primary_index().unwrap();

    let key = row_key(&table, index, &[(1, SqlValue::Integer(1))]);
    store.commit(
        WriteBatch::new()
            .set(key, encode_row_payload(&user(1, "a")))
            .with_tx_metadata(TxMetadata::with_extra(br#"{"who":"op"}"#.to_vec())),
    );
    let key = row_key(&table, index, &[(1, SqlValue::Integer(2))]);
    store.commit(WriteBatch::new().set(key, encode_row_payload(&user(2, "b"))));

    let mut engine = SqlEngine::new(SqlOptions {
        prefix: PREFIX.to_vec(),
        batch_size: 100,
    });
    engine.catalog_mut().put_table(users_table());
    let engine = Arc::new(
        engine.with_tx_metadata_parser(Arc::new(|extra| {
            serde_json::from_slice(extra).map_err(|e| e.to_string())
        })),
    );

    let tx = begin(&engine, &store);
    let mut specs = specs_for(&tx, "t");
    specs.include_tx_metadata = true;
    let mut reader = reader_for(&tx, "t", specs);

    let rows = read_all_rows(&ScanContext::none(), &mut reader).await.unwrap();
    assert_eq!(
        rows[0].values_by_selector["(t._md)"],
        SqlValue::Json(serde_json::json!({"who": "op"}))
    );
    // no extra payload on the second commit: typed NULL of JSON type
    assert_eq!(
        rows[1].values_by_selector["(t._md)"],
        SqlValue::Null(SqlType::Json)
    );
    reader.close().unwrap();
}

#[tokio::test]
async fn test_tx_metadata_without_parser_fails() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    let index = table.primary_index().unwrap();

    let key = row_key(&table, index, &[(1, SqlValue::Integer(1))]);
    store.commit(
        WriteBatch::new()
            .set(key, encode_row_payload(&user(1, "a")))
            .with_tx_metadata(TxMetadata::with_extra(b"{}".to_vec())),
    );

    let tx = begin(&engine, &store);
    let mut specs = specs_for(&tx, "t");
    specs.include_tx_metadata = true;
    let mut reader = reader_for(&tx, "t", specs);

    assert!(matches!(
        reader.read(&ScanContext::none()).await,
        Err(SqlError::InvalidTxMetadata(_))
    ));
    reader.close().unwrap();
}

#[tokio::test]
async fn test_close_hook_fires_exactly_once() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    insert_row(&store, &table, user(1, "a"));

    let tx = begin(&engine, &store);
    let mut reader = reader_for(&tx, "t", specs_for(&tx, "t"));

    let fired = Arc::new(AtomicUsize::new(0));
    let hook_fired = fired.clone();
    reader.on_close(Box::new(move || {
        hook_fired.fetch_add(1, Ordering::SeqCst);
    }));
    // later registrations are ignored
    reader.on_close(Box::new(|| panic!("second hook must not register")));

    reader.close().unwrap();
    reader.close().unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_close_after_error_still_fires_hook() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    let index = table.primary_index().unwrap();

    let key = row_key(&table, index, &[(1, SqlValue::Integer(1))]);
    store.commit(WriteBatch::new().set(key, vec![1, 2])); // torn payload

    let tx = begin(&engine, &store);
    let mut reader = reader_for(&tx, "t", specs_for(&tx, "t"));
    assert!(reader.read(&ScanContext::none()).await.is_err());

    let fired = Arc::new(AtomicUsize::new(0));
    let hook_fired = fired.clone();
    reader.on_close(Box::new(move || {
        hook_fired.fetch_add(1, Ordering::SeqCst);
    }));
    reader.close().unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancellation_propagates() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    insert_row(&store, &table, user(1, "a"));

    let tx = begin(&engine, &store);
    let mut reader = reader_for(&tx, "t", specs_for(&tx, "t"));

    let ctx = ScanContext::new();
    ctx.cancel();
    assert!(matches!(
        reader.read(&ctx).await,
        Err(SqlError::Core(CoreError::Cancelled))
    ));
    // close still releases the iterator
    reader.close().unwrap();
}

#[tokio::test]
async fn test_position_and_selector_views_agree() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    for (id, name) in [(1, "a"), (2, "b")] {
        insert_row(&store, &table, user(id, name));
    }

    let tx = begin(&engine, &store);
    let mut specs = specs_for(&tx, "t");
    specs.include_history = true;
    let mut reader = reader_for(&tx, "t", specs);

    let columns = reader.columns();
    let rows = read_all_rows(&ScanContext::none(), &mut reader).await.unwrap();
    for row in &rows {
        assert_eq!(row.values_by_position.len(), columns.len());
        for (i, col) in columns.iter().enumerate() {
            assert_eq!(
                row.values_by_selector[&col.selector()],
                row.values_by_position[i]
            );
        }
    }
    reader.close().unwrap();
}

#[tokio::test]
async fn test_order_by_reflects_index_columns() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let tx = begin(&engine, &store);
    let reader = reader_for(&tx, "t", specs_for(&tx, "t"));

    let order_by = reader.order_by();
    assert_eq!(order_by.len(), 1);
    assert_eq!(order_by[0].column, "id");
    assert_eq!(order_by[0].table, "t");
}

#[tokio::test]
async fn test_alias_defaults_to_table_name() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    insert_row(&store, &table, user(1, "a"));

    let tx = begin(&engine, &store);
    let mut reader = RawRowReader::new(
        tx.clone(),
        Params::new(),
        tx.table("t").unwrap(),
        Period::none(),
        "u",
        specs_for(&tx, "t"),
    )
    .unwrap();
    assert_eq!(reader.table_alias(), "u");
    let row = reader.read(&ScanContext::none()).await.unwrap();
    assert!(row.values_by_selector.contains_key("(u.id)"));
    reader.close().unwrap();

    let mut reader = reader_for(&tx, "t", specs_for(&tx, "t"));
    assert_eq!(reader.table_alias(), "t");
    reader.close().unwrap();
}

#[tokio::test]
async fn test_foreign_index_rejected_at_construction() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let tx = begin(&engine, &store);

    let foreign = Arc::new(Index {
        id: 5,
        cols: vec![Column::new(1, "id", SqlType::Integer)],
    });
    let err = RawRowReader::new(
        tx.clone(),
        Params::new(),
        tx.table("t").unwrap(),
        Period::none(),
        "",
        ScanSpecs::over(foreign),
    )
    .unwrap_err();
    assert!(matches!(err, SqlError::IllegalArguments(_)));
}

#[tokio::test]
async fn test_batched_reads_group_rows() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    for id in 1..=5 {
        insert_row(&store, &table, user(id, "x"));
    }

    let tx = begin(&engine, &store);
    let mut reader = reader_for(&tx, "t", specs_for(&tx, "t"));

    let mut batches = Vec::new();
    read_rows_batch(&ScanContext::none(), &mut reader, 2, |batch| {
        batches.push(batch.len());
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(batches, vec![2, 2, 1]);
    reader.close().unwrap();
}

#[tokio::test]
async fn test_partial_composite_range_is_prefix_inclusive() {
    // index on (id, cat): a range on id alone must include every row
    // sharing that id prefix, whatever its cat
    let table = Table::new(
        2,
        "t",
        vec![
            Column::new(1, "id", SqlType::Integer),
            Column::new(2, "cat", SqlType::Varchar).with_max_len(8),
        ],
    )
    .unwrap()
    .with_index(Index {
        id: 0,
        cols: vec![
            Column::new(1, "id", SqlType::Integer),
            Column::new(2, "cat", SqlType::Varchar).with_max_len(8),
        ],
    })
    .unwrap();

    let store = MemoryStore::new();
    for (id, cat) in [(1, "a"), (2, "a"), (2, "zz"), (3, "a")] {
        insert_row(
            &store,
            &table,
            vec![
                (1, SqlValue::Integer(id)),
                (2, SqlValue::Varchar(cat.into())),
            ],
        );
    }
    let engine = engine_with(table);

    let tx = begin(&engine, &store);
    let mut specs = specs_for(&tx, "t");
    specs
        .ranges_by_col_id
        .insert(1, TypedValueRange::point(2i64));
    let mut reader = reader_for(&tx, "t", specs);

    let rows = read_all_rows(&ScanContext::none(), &mut reader).await.unwrap();
    let cats: Vec<SqlValue> = rows
        .iter()
        .map(|r| r.values_by_selector["(t.cat)"].clone())
        .collect();
    assert_eq!(
        cats,
        vec![SqlValue::Varchar("a".into()), SqlValue::Varchar("zz".into())]
    );
    reader.close().unwrap();
}

#[tokio::test]
async fn test_rows_compatible_across_readers() {
    let store = MemoryStore::new();
    let engine = engine_with(users_table());
    let table = users_table();
    insert_row(&store, &table, user(1, "a"));

    let tx = begin(&engine, &store);
    let mut r1 = reader_for(&tx, "t", specs_for(&tx, "t"));
    let mut r2 = reader_for(&tx, "t", specs_for(&tx, "t"));

    let ctx = ScanContext::none();
    let a = r1.read(&ctx).await.unwrap();
    let b = r2.read(&ctx).await.unwrap();
    let sels = [ColSelector::col("id"), ColSelector::col("name")];
    assert!(a.compatible(&b, &sels, "t").unwrap());

    r1.close().unwrap();
    r2.close().unwrap();
}
