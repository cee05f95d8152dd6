use edgestore::{
    StoreError,
    qualifier::Qualifier,
    query::{AdminLevel, PlaceFilter, SqlParam, build_observation_plan},
};

fn time() -> Qualifier {
    Qualifier::resolve("P585", None, "point in time", None).unwrap()
}

fn location() -> Qualifier {
    Qualifier::resolve("P276", None, "location", None).unwrap()
}

fn source() -> Qualifier {
    Qualifier::resolve("P9999", Some("String"), "Source", None).unwrap()
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn owners(plan: &edgestore::QueryPlan) -> Vec<String> {
    plan.fragments().iter().map(|f| f.owner.clone()).collect()
}

#[test]
fn test_only_requested_qualifiers_are_joined() {
    let qualifiers = vec![time(), location(), source()];
    let plan = build_observation_plan(
        "P10",
        "Q99",
        &qualifiers,
        &columns(&["value", "time"]),
        &PlaceFilter::default(),
        0,
    )
    .unwrap();
    assert_eq!(owners(&plan), vec!["base", "time"]);
    assert_eq!(plan.column_names(), vec!["value", "time"]);

    let plan = build_observation_plan(
        "P10",
        "Q99",
        &qualifiers,
        &columns(&["time", "location", "location_id"]),
        &PlaceFilter::default(),
        0,
    )
    .unwrap();
    assert_eq!(owners(&plan), vec!["base", "time", "location"]);
}

#[test]
fn test_subject_label_join_only_when_requested() {
    let plan = build_observation_plan(
        "P10",
        "Q99",
        &[],
        &columns(&["main_subject_id", "value"]),
        &PlaceFilter::default(),
        0,
    )
    .unwrap();
    assert!(!plan.has_fragment("main_subject"));

    let plan = build_observation_plan(
        "P10",
        "Q99",
        &[],
        &columns(&["main_subject"]),
        &PlaceFilter::default(),
        0,
    )
    .unwrap();
    assert!(plan.has_fragment("main_subject"));
}

#[test]
fn test_empty_column_list_projects_everything() {
    let qualifiers = vec![time(), source()];
    let plan = build_observation_plan(
        "P10",
        "Q99",
        &qualifiers,
        &[],
        &PlaceFilter::default(),
        0,
    )
    .unwrap();
    let names = plan.column_names();
    assert_eq!(names.len(), 8 + 2 + 1);
    assert!(names.contains(&"time_precision".to_string()));
    assert!(names.contains(&"source".to_string()));
    assert_eq!(owners(&plan), vec!["base", "main_subject", "time", "source"]);
}

#[test]
fn test_unknown_columns_are_ignored() {
    let plan = build_observation_plan(
        "P10",
        "Q99",
        &[time()],
        &columns(&["bogus"]),
        &PlaceFilter::default(),
        0,
    )
    .unwrap();
    assert_eq!(plan.column_names(), vec!["main_subject_id"]);
    assert_eq!(owners(&plan), vec!["base"]);
}

#[test]
fn test_user_values_are_bound_never_interpolated() {
    let hostile = "Q99' OR '1'='1";
    let places = PlaceFilter::default().with_ids(AdminLevel::Country, vec![hostile.to_string()]);
    let plan =
        build_observation_plan("P10", hostile, &[location()], &[], &places, 10).unwrap();
    let (sql, params) = plan.render();
    assert!(!sql.contains(hostile));
    assert_eq!(sql.matches('?').count(), params.len());
    assert!(params.contains(&SqlParam::Text(hostile.to_string())));
    assert_eq!(params.last(), Some(&SqlParam::Integer(10)));
}

#[test]
fn test_place_filter_forces_location_join_once() {
    let places = PlaceFilter::default()
        .with_ids(AdminLevel::Country, vec!["Q30".to_string()])
        .with_ids(AdminLevel::Admin1, vec!["Q99".to_string(), "Q100".to_string()]);
    let plan = build_observation_plan(
        "P10",
        "Q1",
        &[location()],
        &columns(&["value"]),
        &places,
        0,
    )
    .unwrap();
    assert_eq!(
        owners(&plan),
        vec!["base", "location", "place_country", "place_admin1"]
    );
    let (sql, _) = plan.render();
    assert!(sql.contains("e_country.node1 = \"eq_location\".node2"));
    assert!(sql.contains(" OR "));
}

#[test]
fn test_place_filter_without_location_uses_subject() {
    let places = PlaceFilter::default().with_ids(AdminLevel::Admin2, vec!["Q5".to_string()]);
    let plan =
        build_observation_plan("P10", "Q1", &[], &columns(&["value"]), &places, 0).unwrap();
    let (sql, _) = plan.render();
    assert!(sql.contains("e_admin2.node1 = e_main.node1"));
}

#[test]
fn test_no_place_filter_is_always_true() {
    let plan = build_observation_plan(
        "P10",
        "Q1",
        &[location()],
        &columns(&["value"]),
        &PlaceFilter::default(),
        0,
    )
    .unwrap();
    let (sql, _) = plan.render();
    assert!(sql.contains("1=1"));
    assert!(!plan.has_fragment("location"));
}

#[test]
fn test_order_uses_time_only_when_joined() {
    let plan = build_observation_plan(
        "P10",
        "Q1",
        &[time()],
        &columns(&["value"]),
        &PlaceFilter::default(),
        0,
    )
    .unwrap();
    assert!(plan.render().0.contains("ORDER BY e_main.node1, e_main.id"));

    let plan = build_observation_plan(
        "P10",
        "Q1",
        &[time()],
        &columns(&["value", "time"]),
        &PlaceFilter::default(),
        0,
    )
    .unwrap();
    assert!(
        plan.render()
            .0
            .contains("ORDER BY e_main.node1, \"vq_time\".date_and_time, e_main.id")
    );
}

#[test]
fn test_duplicate_qualifier_names_are_rejected() {
    let err = build_observation_plan(
        "P10",
        "Q1",
        &[time(), time()],
        &[],
        &PlaceFilter::default(),
        0,
    )
    .unwrap_err();
    assert!(matches!(err, StoreError::QueryError(_)));
}

#[test]
fn test_two_location_qualifiers_are_ambiguous() {
    let country = Qualifier::resolve("P17", None, "country", None).unwrap();
    let err = build_observation_plan(
        "P10",
        "Q1",
        &[location(), country],
        &[],
        &PlaceFilter::default(),
        0,
    )
    .unwrap_err();
    assert!(matches!(err, StoreError::AmbiguousLocation(_)));
}

#[test]
fn test_unlabelled_qualifier_and_location_are_ambiguous() {
    let unlabelled = Qualifier::resolve("P9000", None, "???", None).unwrap();
    let err = build_observation_plan(
        "P10",
        "Q1",
        &[unlabelled, location()],
        &[],
        &PlaceFilter::default(),
        0,
    )
    .unwrap_err();
    assert!(matches!(err, StoreError::AmbiguousLocation(_)));
}
