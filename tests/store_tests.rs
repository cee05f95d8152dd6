use edgestore::{
    BatchConfig, EdgeStore, EdgeValue, InsertMode, StatementRecord, StoreConfig, StoreError,
    TransactionGuard, open_store,
    literal::{DataType, Number},
    store::execute_batch,
};

fn record(id: &str, node1: &str, label: &str, raw: &str) -> StatementRecord {
    StatementRecord::parse(id, node1, label, raw).unwrap()
}

fn observation_batch() -> Vec<StatementRecord> {
    vec![
        record("e1", "Q1", "P10", "42[40,44]kg"),
        record("e1-ds", "e1", "P2006020004", "Q99"),
        record("e1-time", "e1", "P585", "^2021-06-01/11"),
        record("e2", "Q2", "P10", "7"),
        record("e2-ds", "e2", "P2006020004", "Q99"),
        record("l1", "Q1", "label", "'Alpha'@en"),
        record("c1", "Q1", "P625", "@45.5/-120.25"),
    ]
}

#[test]
fn test_insert_batch_writes_edges_and_values() {
    let store = EdgeStore::open_in_memory().unwrap();
    let stats = store
        .insert_batch(&observation_batch(), InsertMode::Idempotent)
        .unwrap();
    assert_eq!(stats.edges_inserted, 7);
    assert_eq!(stats.edges_skipped, 0);
    assert_eq!(stats.values_inserted, 7);
    assert_eq!(store.edge_count().unwrap(), 7);

    let counts = store.value_counts().unwrap();
    assert_eq!(counts[&DataType::Quantity], 2);
    assert_eq!(counts[&DataType::Symbol], 2);
    assert_eq!(counts[&DataType::DateAndTime], 1);
    assert_eq!(counts[&DataType::String], 1);
    assert_eq!(counts[&DataType::Coordinate], 1);
}

#[test]
fn test_values_read_back_typed() {
    let store = EdgeStore::open_in_memory().unwrap();
    store
        .insert_batch(&observation_batch(), InsertMode::Idempotent)
        .unwrap();

    let Some(EdgeValue::Quantity(q)) = store.get_value("e1").unwrap() else {
        panic!("expected a quantity");
    };
    assert_eq!(q.number, Number::Int(42));
    assert_eq!(q.low_tolerance, Some(40.0));
    assert_eq!(q.high_tolerance, Some(44.0));
    assert_eq!(q.si_units.as_deref(), Some("kg"));

    let Some(EdgeValue::Date(d)) = store.get_value("e1-time").unwrap() else {
        panic!("expected a date");
    };
    assert_eq!(d.date_and_time, "2021-06-01T00:00:00Z");
    assert_eq!(d.precision, Some(11));

    let Some(EdgeValue::String(s)) = store.get_value("l1").unwrap() else {
        panic!("expected a string");
    };
    assert_eq!(s.text, "Alpha");
    assert_eq!(s.language.as_deref(), Some("en"));

    let statement = store.get_statement("c1").unwrap();
    assert_eq!(statement, record("c1", "Q1", "P625", "@45.5/-120.25"));
}

#[test]
fn test_node2_is_stored_canonical() {
    let store = EdgeStore::open_in_memory().unwrap();
    store
        .insert_batch(&[record("n1", "Q1", "P10", "5.20")], InsertMode::Idempotent)
        .unwrap();
    assert_eq!(store.get_edge("n1").unwrap().node2, "5.2");
}

#[test]
fn test_idempotent_reimport_skips_existing_ids() {
    let store = EdgeStore::open_in_memory().unwrap();
    store
        .insert_batch(&observation_batch(), InsertMode::Idempotent)
        .unwrap();
    let stats = store
        .insert_batch(&observation_batch(), InsertMode::Idempotent)
        .unwrap();
    assert_eq!(stats.edges_inserted, 0);
    assert_eq!(stats.edges_skipped, 7);
    assert_eq!(stats.values_inserted, 0);
    assert_eq!(store.edge_count().unwrap(), 7);
}

#[test]
fn test_strict_reimport_fails_and_rolls_back() {
    let store = EdgeStore::open_in_memory().unwrap();
    store
        .insert_batch(&[record("e1", "Q1", "P10", "1")], InsertMode::Idempotent)
        .unwrap();
    let batch = vec![record("fresh", "Q5", "P10", "2"), record("e1", "Q1", "P10", "1")];
    let err = store.insert_batch(&batch, InsertMode::Strict).unwrap_err();
    assert!(matches!(err, StoreError::ImportConflict(ref id) if id == "e1"));
    assert_eq!(store.edge_count().unwrap(), 1);
    assert!(store.get_edge("fresh").is_err());
}

#[test]
fn test_duplicate_ids_within_batch_count_as_skipped() {
    let store = EdgeStore::open_in_memory().unwrap();
    let batch = vec![record("dup", "Q1", "P10", "1"), record("dup", "Q1", "P10", "1")];
    let stats = store.insert_batch(&batch, InsertMode::Idempotent).unwrap();
    assert_eq!(stats.edges_inserted, 1);
    assert_eq!(stats.edges_skipped, 1);
}

#[test]
fn test_invalid_rows_are_rejected_before_writing() {
    let store = EdgeStore::open_in_memory().unwrap();
    let mut mismatched = record("bad", "Q1", "P10", "5");
    mismatched.edge.data_type = DataType::String;
    let batch = vec![record("ok", "Q1", "P10", "1"), mismatched];
    let err = store.insert_batch(&batch, InsertMode::Idempotent).unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));
    assert_eq!(store.edge_count().unwrap(), 0);

    let empty_id = record("", "Q1", "P10", "1");
    assert!(store.insert_batch(&[empty_id], InsertMode::Idempotent).is_err());
}

#[test]
fn test_chunked_insert_matches_single_batch() {
    let cfg = StoreConfig::default().with_batch_size(3);
    let store = open_store(":memory:", &cfg).unwrap();
    let batch: Vec<_> = (0..20)
        .map(|i| record(&format!("e{i}"), &format!("Q{i}"), "P10", &i.to_string()))
        .collect();
    let stats = store.insert_batch(&batch, InsertMode::Idempotent).unwrap();
    assert_eq!(stats.edges_inserted, 20);
    assert_eq!(stats.values_inserted, 20);
}

#[test]
fn test_execute_batch_chunks_by_config() {
    let config = BatchConfig {
        max_batch_size: 4,
        enable_chunking: true,
    };
    let items: Vec<i32> = (0..10).collect();
    let mut calls = 0;
    let out = execute_batch(&items, &config, |chunk| {
        calls += 1;
        Ok(chunk.iter().map(|v| v * 2).collect())
    })
    .unwrap();
    assert_eq!(calls, 3);
    assert_eq!(out.len(), 10);
    assert_eq!(out[9], 18);
}

#[test]
fn test_delete_by_id_removes_sub_statements_and_values() {
    let store = EdgeStore::open_in_memory().unwrap();
    store
        .insert_batch(&observation_batch(), InsertMode::Idempotent)
        .unwrap();
    let removed = store.delete_by_id_set(&["e1".to_string()]).unwrap();
    assert_eq!(removed, 3);
    assert_eq!(store.edge_count().unwrap(), 4);
    assert!(matches!(
        store.get_edge("e1-time").unwrap_err(),
        StoreError::NotFound(_)
    ));
    assert_eq!(store.value_counts().unwrap()[&DataType::DateAndTime], 0);
    assert_eq!(store.delete_by_id_set(&[]).unwrap(), 0);
}

#[test]
fn test_delete_observations_is_scoped_to_dataset() {
    let store = EdgeStore::open_in_memory().unwrap();
    let mut batch = observation_batch();
    batch.push(record("e3", "Q3", "P10", "9"));
    batch.push(record("e3-ds", "e3", "P2006020004", "Q77"));
    store.insert_batch(&batch, InsertMode::Idempotent).unwrap();

    let removed = store
        .delete_observations("Q99", &["P10".to_string()])
        .unwrap();
    assert_eq!(removed, 5);
    assert!(store.get_edge("e3").is_ok());
    assert!(store.get_edge("l1").is_ok());
    assert!(store.get_edge("e2").is_err());
}

#[test]
fn test_lookup_by_subject_predicate_orders_by_id() {
    let store = EdgeStore::open_in_memory().unwrap();
    let batch = vec![
        record("b", "Q1", "P31", "Q5"),
        record("a", "Q1", "P31", "Q6"),
        record("c", "Q1", "P279", "Q7"),
    ];
    store.insert_batch(&batch, InsertMode::Idempotent).unwrap();
    let edges = store.lookup_by_subject_predicate("Q1", "P31").unwrap();
    let ids: Vec<_> = edges.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(store.subjects_with("P31", "Q6").unwrap(), vec!["Q1".to_string()]);
}

#[test]
fn test_transaction_guard_rolls_back_on_drop() {
    let store = EdgeStore::open_in_memory().unwrap();
    {
        let guard = TransactionGuard::new(store.connection()).unwrap();
        guard
            .conn()
            .execute(
                "INSERT INTO edges(id,node1,label,node2,data_type) VALUES('x','Q1','P1','Q2','symbol')",
                [],
            )
            .unwrap();
    }
    assert_eq!(store.edge_count().unwrap(), 0);

    let guard = TransactionGuard::new(store.connection()).unwrap();
    guard
        .conn()
        .execute(
            "INSERT INTO edges(id,node1,label,node2,data_type) VALUES('y','Q1','P1','Q2','symbol')",
            [],
        )
        .unwrap();
    guard.commit().unwrap();
    assert_eq!(store.edge_count().unwrap(), 1);
}

#[test]
fn test_file_backed_store_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("edges.db");
    {
        let store = EdgeStore::open(&path).unwrap();
        store
            .insert_batch(&observation_batch(), InsertMode::Idempotent)
            .unwrap();
    }
    let store = EdgeStore::open(&path).unwrap();
    assert_eq!(store.edge_count().unwrap(), 7);
    assert_eq!(store.all_statements().unwrap().len(), 7);
}

#[test]
fn test_per_statement_chunking_respects_bound_parameter_limit() {
    let config = BatchConfig {
        max_batch_size: 10_000,
        enable_chunking: false,
    };
    let edges = config.per_statement(5);
    assert!(edges.enable_chunking);
    assert_eq!(edges.max_batch_size, 6_553);
    let small = BatchConfig {
        max_batch_size: 3,
        enable_chunking: true,
    };
    assert_eq!(small.per_statement(2).max_batch_size, 3);
}

#[test]
fn test_multi_row_chunks_track_existing_and_repeated_ids() {
    let store = open_store(":memory:", &StoreConfig::default().with_batch_size(3)).unwrap();
    store
        .insert_batch(&[record("e2", "Q2", "P10", "7")], InsertMode::Idempotent)
        .unwrap();

    let mut batch = observation_batch();
    batch.push(record("e1", "Q1", "P10", "42[40,44]kg"));
    let stats = store.insert_batch(&batch, InsertMode::Idempotent).unwrap();
    assert_eq!(stats.edges_inserted, 6);
    assert_eq!(stats.edges_skipped, 2);
    assert_eq!(stats.values_inserted, 6);
    assert_eq!(store.edge_count().unwrap(), 7);
    assert_eq!(store.value_counts().unwrap()[&DataType::Quantity], 2);

    let err = store
        .insert_batch(
            &[record("e9", "Q9", "P10", "1"), record("e1", "Q1", "P10", "5")],
            InsertMode::Strict,
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::ImportConflict(_)));
    assert!(store.get_edge("e9").is_err());
}

#[test]
fn test_replace_statements_drops_stale_edges_only() {
    let store = EdgeStore::open_in_memory().unwrap();
    store
        .insert_batch(
            &[
                record("old-label", "Q1", "label", "\"Old\""),
                record("keep-desc", "Q1", "description", "\"Kept\""),
                record("other", "Q1", "P31", "Q5"),
            ],
            InsertMode::Idempotent,
        )
        .unwrap();

    let stats = store
        .replace_statements(
            "Q1",
            &["label", "description"],
            &[
                record("new-label", "Q1", "label", "\"New\""),
                record("keep-desc", "Q1", "description", "\"Kept\""),
            ],
        )
        .unwrap();
    assert_eq!(stats.edges_inserted, 1);
    assert_eq!(stats.edges_skipped, 1);
    assert!(store.get_edge("old-label").is_err());
    assert!(store.get_edge("keep-desc").is_ok());
    assert!(store.get_edge("other").is_ok());
    assert_eq!(store.value_counts().unwrap()[&DataType::String], 2);
}
