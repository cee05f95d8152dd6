use edgestore::{
    DatasetMetadata, EdgeStore, QualifierProperty, StoreError, VariableMetadata,
    literal::DataType,
};

fn dataset() -> DatasetMetadata {
    DatasetMetadata {
        node: "Q99".to_string(),
        short_name: "WDI-2024".to_string(),
        name: "World Development Indicators".to_string(),
        description: "Country-level development statistics".to_string(),
        url: "https://data.example.org/wdi".to_string(),
    }
}

fn variable() -> VariableMetadata {
    VariableMetadata {
        node: "V1".to_string(),
        short_name: "population".to_string(),
        name: "Population".to_string(),
        dataset_node: "Q99".to_string(),
        corresponds_to_property: "P1082".to_string(),
        description: Some("Total population".to_string()),
        qualifiers: vec!["P585".to_string(), "P248".to_string()],
    }
}

#[test]
fn test_dataset_round_trips_through_edges() {
    let store = EdgeStore::open_in_memory().unwrap();
    let stats = store.put_dataset(&dataset()).unwrap();
    assert_eq!(stats.edges_inserted, 5);
    assert_eq!(store.get_dataset("Q99").unwrap(), Some(dataset()));
    assert_eq!(
        store.dataset_by_short_name("WDI-2024").unwrap(),
        Some(dataset())
    );
    assert_eq!(store.dataset_by_short_name("missing").unwrap(), None);
}

#[test]
fn test_dataset_statements_are_typed() {
    let statements = dataset().to_statements().unwrap();
    let instance = statements
        .iter()
        .find(|s| s.edge.label == "P31")
        .unwrap();
    assert_eq!(instance.edge.node2, "Q1172284");
    assert_eq!(instance.edge.data_type, DataType::Symbol);
    let name = statements
        .iter()
        .find(|s| s.edge.label == "label")
        .unwrap();
    assert_eq!(name.edge.node2, "\"World Development Indicators\"");
}

#[test]
fn test_putting_a_dataset_twice_is_idempotent() {
    let store = EdgeStore::open_in_memory().unwrap();
    store.put_dataset(&dataset()).unwrap();
    let again = store.put_dataset(&dataset()).unwrap();
    assert_eq!(again.edges_inserted, 0);
    assert_eq!(again.edges_skipped, 5);
}

#[test]
fn test_invalid_dataset_fields_are_rejected() {
    let mut bad = dataset();
    bad.short_name = "has space".to_string();
    assert!(matches!(
        bad.validate().unwrap_err(),
        StoreError::InvalidInput(_)
    ));

    let mut bad = dataset();
    bad.url = "ftp://example.org".to_string();
    assert!(bad.validate().is_err());

    let mut bad = dataset();
    bad.description = "  ".to_string();
    assert!(bad.validate().is_err());
}

#[test]
fn test_variable_round_trips_and_resolves_by_property() {
    let store = EdgeStore::open_in_memory().unwrap();
    store.put_dataset(&dataset()).unwrap();
    store.put_variable(&variable()).unwrap();

    let mut expected = variable();
    expected.qualifiers.sort();
    let mut got = store.get_variable("V1").unwrap().unwrap();
    got.qualifiers.sort();
    assert_eq!(got, expected);

    assert_eq!(
        store.variable_node_for_property("Q99", "P1082").unwrap(),
        Some("V1".to_string())
    );
    assert_eq!(
        store
            .variable_for_property("Q99", "P1082")
            .unwrap()
            .map(|v| v.short_name),
        Some("population".to_string())
    );
    assert_eq!(store.variable_for_property("Q77", "P1082").unwrap(), None);
    assert_eq!(store.get_variable("Q99").unwrap(), None);
}

#[test]
fn test_variable_requires_existing_dataset() {
    let store = EdgeStore::open_in_memory().unwrap();
    assert!(matches!(
        store.put_variable(&variable()).unwrap_err(),
        StoreError::NotFound(_)
    ));
}

#[test]
fn test_qualifier_property_feeds_resolution() {
    let store = EdgeStore::open_in_memory().unwrap();
    store.put_dataset(&dataset()).unwrap();
    store
        .put_qualifier_property(&QualifierProperty {
            property: "P1001".to_string(),
            label: "Age Group".to_string(),
            wikidata_data_type: Some("wikibase:String".to_string()),
        })
        .unwrap();
    let mut var = variable();
    var.qualifiers = vec!["P1001".to_string()];
    store.put_variable(&var).unwrap();

    let qualifiers = store.resolve_qualifiers("Q99", "V1").unwrap();
    assert_eq!(qualifiers.len(), 1);
    assert_eq!(qualifiers[0].name, "age_group");
    assert_eq!(store.node_label("P1001").unwrap().as_deref(), Some("Age Group"));
}

#[test]
fn test_unknown_declared_datatype_is_rejected() {
    let property = QualifierProperty {
        property: "P1001".to_string(),
        label: "Age Group".to_string(),
        wikidata_data_type: Some("Lexeme".to_string()),
    };
    assert!(matches!(
        property.validate().unwrap_err(),
        StoreError::UnknownDatatype(_)
    ));
}

#[test]
fn test_putting_a_changed_dataset_replaces_old_fields() {
    let store = EdgeStore::open_in_memory().unwrap();
    store.put_dataset(&dataset()).unwrap();

    let mut renamed = dataset();
    renamed.name = "WDI".to_string();
    renamed.description = "Revised statistics".to_string();
    let stats = store.put_dataset(&renamed).unwrap();
    assert_eq!(stats.edges_inserted, 2);
    assert_eq!(stats.edges_skipped, 3);

    assert_eq!(store.get_dataset("Q99").unwrap(), Some(renamed));
    assert_eq!(store.lookup_by_subject_predicate("Q99", "label").unwrap().len(), 1);
    assert_eq!(
        store
            .lookup_by_subject_predicate("Q99", "description")
            .unwrap()
            .len(),
        1
    );
    assert_eq!(store.edge_count().unwrap(), 5);
}

#[test]
fn test_putting_a_changed_variable_replaces_qualifiers() {
    let store = EdgeStore::open_in_memory().unwrap();
    store.put_dataset(&dataset()).unwrap();
    store.put_variable(&variable()).unwrap();

    let mut trimmed = variable();
    trimmed.qualifiers = vec!["P585".to_string()];
    trimmed.description = None;
    store.put_variable(&trimmed).unwrap();

    assert_eq!(store.get_variable("V1").unwrap(), Some(trimmed));
}

#[test]
fn test_relabelled_qualifier_property_is_visible() {
    let store = EdgeStore::open_in_memory().unwrap();
    let mut property = QualifierProperty {
        property: "P1001".to_string(),
        label: "Age Group".to_string(),
        wikidata_data_type: Some("String".to_string()),
    };
    store.put_qualifier_property(&property).unwrap();
    property.label = "Age Band".to_string();
    property.wikidata_data_type = None;
    store.put_qualifier_property(&property).unwrap();

    assert_eq!(store.node_label("P1001").unwrap().as_deref(), Some("Age Band"));
    assert!(
        store
            .lookup_by_subject_predicate("P1001", "wikidata_data_type")
            .unwrap()
            .is_empty()
    );
}
