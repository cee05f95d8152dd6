use std::{hint::black_box, time::Duration};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use edgestore::{
    EdgeStore, ExplodeOptions, FlatRow, InsertMode, StatementRecord,
    bulk::explode,
    query::PlaceFilter,
};

const SAMPLE_SIZE: usize = 10;
const WARM_UP: Duration = Duration::from_millis(300);
const MEASURE: Duration = Duration::from_millis(800);
const DATASET: &str = "Q99";
const PROPERTY: &str = "P10";

fn bench_scales() -> &'static [usize] {
    #[cfg(feature = "bench-ci")]
    {
        &[500, 2_000]
    }
    #[cfg(not(feature = "bench-ci"))]
    {
        &[5_000, 20_000]
    }
}

/// `observations` statements of `PROPERTY` with dataset, time and location qualifiers.
fn observation_rows(observations: usize) -> Vec<FlatRow> {
    let mut rows = Vec::with_capacity(observations * 4);
    for i in 0..observations {
        let id = format!("obs-{i}");
        let mut main = FlatRow::new(format!("Q{}", i % 250), PROPERTY, format!("{}.5kg", i));
        main.id = Some(id.clone());
        rows.push(main);
        rows.push(FlatRow::new(id.clone(), "P2006020004", DATASET));
        rows.push(FlatRow::new(
            id.clone(),
            "P585",
            format!("^{}-01-01/9", 1990 + i % 30),
        ));
        rows.push(FlatRow::new(id, "P276", format!("Q{}", 1_000 + i % 50)));
    }
    rows
}

fn exploded(observations: usize) -> Vec<StatementRecord> {
    explode(&observation_rows(observations), ExplodeOptions::default()).records
}

fn bench_explode(c: &mut Criterion) {
    let mut group = c.benchmark_group("explode");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for &size in bench_scales() {
        let rows = observation_rows(size);
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| black_box(explode(&rows, ExplodeOptions::default())));
        });
    }
    group.finish();
}

fn bench_insert_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_batch");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for &size in bench_scales() {
        let records = exploded(size);
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                let store = EdgeStore::open_in_memory().expect("store");
                store
                    .insert_batch(&records, InsertMode::Idempotent)
                    .expect("insert");
            });
        });
    }
    group.finish();
}

fn bench_observation_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("observation_query");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    let columns: Vec<String> = ["main_subject_id", "value", "value_unit", "time", "location_id"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for &size in bench_scales() {
        let store = EdgeStore::open_in_memory().expect("store");
        store
            .insert_batch(&exploded(size), InsertMode::Idempotent)
            .expect("insert");
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                let plan = store
                    .build_observation_query(PROPERTY, DATASET, &columns, &PlaceFilter::default(), 0)
                    .expect("plan");
                black_box(store.fetch_observations(&plan).expect("rows"))
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = import_benches;
    config = Criterion::default();
    targets = bench_explode, bench_insert_batch, bench_observation_query
);
criterion_main!(import_benches);
