use std::{
    env,
    fs::File,
    io::{BufReader, BufWriter},
    process,
};

use serde_json::json;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use edgestore::{
    EdgeStore, InsertMode, StoreError,
    bulk::{self, ExplodeOptions, ExplodeReport},
    client::{CommandLineConfig, has_flag, list_flag_value, flag_value, required_flag_value},
    literal,
    query::{AdminLevel, PlaceFilter},
    safety::run_strict_safety_checks,
    tsv,
};

const DEFAULT_QUERY_LIMIT: i64 = 1000;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("{}", CommandLineConfig::help());
        return;
    }
    let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    let config = match CommandLineConfig::from_args(&arg_refs) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    };
    init_logging(config.verbose);

    let auto_migrate = config.command != "migrate";
    let store = match open_store(&config, auto_migrate) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("{err}");
            process::exit(2);
        }
    };

    if let Err(err) = run_command(&store, &config.command, &config.command_args) {
        eprintln!("command failed: {err}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn open_store(config: &CommandLineConfig, auto_migrate: bool) -> Result<EdgeStore, StoreError> {
    match (config.is_in_memory(), auto_migrate) {
        (true, _) => EdgeStore::open_in_memory(),
        (false, true) => EdgeStore::open(&config.database),
        (false, false) => EdgeStore::open_without_migrations(&config.database),
    }
}

fn run_command(store: &EdgeStore, command: &str, args: &[String]) -> Result<(), StoreError> {
    match command {
        "status" => {
            let version = store.schema_version()?;
            let migrations = store.migration_history()?.len();
            let edges = store.edge_count()?;
            println!(
                "backend=sqlite schema_version={version} migrations_applied={migrations} edges={edges}"
            );
            Ok(())
        }
        "migrate" => run_migrate(store, args),
        "import" => run_import(store, args),
        "export" => run_export(store, args),
        "explode" => run_explode(args),
        "implode" => run_implode(args),
        "decode" => run_decode(args),
        "query" => run_query(store, args),
        "delete" => run_delete(store, args),
        "check" => run_check(store),
        other => Err(StoreError::invalid_input(format!(
            "unknown command {other}; see --help"
        ))),
    }
}

fn open_input(path: &str) -> Result<BufReader<File>, StoreError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| StoreError::invalid_input(format!("cannot open {path}: {e}")))
}

fn create_output(path: &str) -> Result<BufWriter<File>, StoreError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| StoreError::invalid_input(format!("cannot create {path}: {e}")))
}

fn explode_file(path: &str, fail_fast: bool) -> Result<ExplodeReport, StoreError> {
    let rows = tsv::read_flat(open_input(path)?)?;
    let report = bulk::explode(&rows, ExplodeOptions { fail_fast });
    if fail_fast && let Some(first) = report.errors.first() {
        return Err(StoreError::invalid_input(format!(
            "line {} column {}: {}",
            first.line, first.column, first.message
        )));
    }
    for error in &report.errors {
        eprintln!("line {} column {}: {}", error.line, error.column, error.message);
    }
    Ok(report)
}

fn run_migrate(store: &EdgeStore, args: &[String]) -> Result<(), StoreError> {
    let dry_run = has_flag(args, "--dry-run");
    let report = store.run_pending_migrations(dry_run)?;
    let payload = json!({
        "command": "migrate",
        "dry_run": dry_run,
        "from_version": report.from_version,
        "to_version": report.to_version,
        "statements": report.statements,
        "history": store.migration_history()?,
    });
    println!("{payload}");
    Ok(())
}

fn run_import(store: &EdgeStore, args: &[String]) -> Result<(), StoreError> {
    let input = required_flag_value(args, "--input")?;
    let mode = if has_flag(args, "--strict") {
        InsertMode::Strict
    } else {
        store.insert_mode()
    };
    let report = explode_file(input, has_flag(args, "--fail-fast"))?;
    let stats = store.insert_batch(&report.records, mode)?;
    let payload = json!({
        "command": "import",
        "input": input,
        "edges_inserted": stats.edges_inserted,
        "edges_skipped": stats.edges_skipped,
        "values_inserted": stats.values_inserted,
        "rows_rejected": report.errors.len(),
    });
    println!("{payload}");
    Ok(())
}

fn run_export(store: &EdgeStore, args: &[String]) -> Result<(), StoreError> {
    let output = required_flag_value(args, "--output")?;
    let exploded = has_flag(args, "--exploded");
    let statements = store.all_statements()?;
    let writer = create_output(output)?;
    if exploded {
        let rows: Vec<_> = statements.iter().map(bulk::to_exploded).collect();
        tsv::write_exploded(writer, &rows)?;
    } else {
        let rows: Vec<_> = statements.iter().map(bulk::to_flat).collect();
        tsv::write_flat(writer, &rows)?;
    }
    let payload = json!({
        "command": "export",
        "output": output,
        "exploded": exploded,
        "edges": statements.len(),
    });
    println!("{payload}");
    Ok(())
}

fn run_explode(args: &[String]) -> Result<(), StoreError> {
    let input = required_flag_value(args, "--input")?;
    let output = required_flag_value(args, "--output")?;
    let report = explode_file(input, has_flag(args, "--fail-fast"))?;
    let rows: Vec<_> = report.records.iter().map(bulk::to_exploded).collect();
    tsv::write_exploded(create_output(output)?, &rows)?;
    let payload = json!({
        "command": "explode",
        "rows_written": rows.len(),
        "rows_rejected": report.errors.len(),
    });
    println!("{payload}");
    Ok(())
}

fn run_implode(args: &[String]) -> Result<(), StoreError> {
    let input = required_flag_value(args, "--input")?;
    let output = required_flag_value(args, "--output")?;
    let exploded = tsv::read_exploded(open_input(input)?)?;
    let mut rows = Vec::with_capacity(exploded.len());
    for row in &exploded {
        rows.push(bulk::implode(row)?);
    }
    tsv::write_flat(create_output(output)?, &rows)?;
    let payload = json!({
        "command": "implode",
        "rows_written": rows.len(),
    });
    println!("{payload}");
    Ok(())
}

fn run_decode(args: &[String]) -> Result<(), StoreError> {
    let value = required_flag_value(args, "--value")?;
    let decoded = literal::decode(value)?;
    let payload = json!({
        "data_type": decoded.data_type().as_str(),
        "canonical": literal::encode(&decoded),
        "literal": decoded,
    });
    println!("{payload}");
    Ok(())
}

fn run_query(store: &EdgeStore, args: &[String]) -> Result<(), StoreError> {
    let property = required_flag_value(args, "--property")?;
    let dataset = required_flag_value(args, "--dataset")?;
    let columns = list_flag_value(args, "--columns")?;
    let limit = match flag_value(args, "--limit")? {
        Some(value) => value
            .parse::<i64>()
            .map_err(|_| StoreError::invalid_input(format!("--limit expects an integer, got {value}")))?,
        None => DEFAULT_QUERY_LIMIT,
    };
    let mut places = PlaceFilter::default();
    for level in AdminLevel::ALL {
        let ids = list_flag_value(args, &format!("--{}", level.as_str()))?;
        places = places.with_ids(level, ids);
    }
    let plan = store.build_observation_query(property, dataset, &columns, &places, limit)?;
    for row in store.fetch_observations(&plan)? {
        println!("{}", row.to_json());
    }
    Ok(())
}

fn run_delete(store: &EdgeStore, args: &[String]) -> Result<(), StoreError> {
    let dataset = required_flag_value(args, "--dataset")?;
    let properties = list_flag_value(args, "--property")?;
    if properties.is_empty() {
        return Err(StoreError::invalid_input("--property is required"));
    }
    let removed = store.delete_observations(dataset, &properties)?;
    let payload = json!({
        "command": "delete",
        "dataset": dataset,
        "properties": properties,
        "edges_removed": removed,
    });
    println!("{payload}");
    Ok(())
}

fn run_check(store: &EdgeStore) -> Result<(), StoreError> {
    match run_strict_safety_checks(store) {
        Ok(report) => {
            println!("{}", json!({ "command": "check", "ok": true, "report": report }));
            Ok(())
        }
        Err(err) => {
            warn!(%err, "integrity check failed");
            println!("{}", json!({ "command": "check", "ok": false, "report": err.report }));
            Err(StoreError::query(err.to_string()))
        }
    }
}
