//! feature-table CLI - inspect feature table schemas and their data.

use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use feature_table::core::{CacheConfig, FileFetcher, ResourceCache, TableOptions};
use feature_table::{FeatureTable, TableSchema};
use serde_json::{Map, Value};
use tracing::{debug, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }

    let json_mode = filtered_args.iter().any(|&s| s == "--json" || s == "-j");
    if json_mode && level == "info" {
        level = "warn";
    }
    init_logging(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let result = match filtered_args[0] {
        "i" | "info" => match filtered_args.get(1) {
            Some(path) => cmd_info(path),
            None => usage("feature-table info <schema.json>"),
        },
        "d" | "dump" => match filtered_args.iter().skip(1).find(|&&s| s != "--json" && s != "-j") {
            Some(path) => cmd_dump(path, json_mode),
            None => usage("feature-table dump <schema.json> [--json]"),
        },
        "--version" | "-V" | "version" => {
            print_version();
            Ok(())
        }
        "h" | "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Install the fmt subscriber. `RUST_LOG` wins over the command line flags.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn usage(text: &str) -> anyhow::Result<()> {
    bail!("missing schema argument\nUsage: {text}")
}

fn print_version() {
    println!(
        "feature-table {} (built {} {})",
        env!("CARGO_PKG_VERSION"),
        env!("FEATURE_TABLE_BUILD_DATE"),
        env!("FEATURE_TABLE_BUILD_TIME"),
    );
}

fn print_help() {
    println!("feature-table - feature metadata table toolkit");
    println!();
    println!("USAGE:");
    println!("    feature-table [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info   <schema.json>           Show feature count, property types and states");
    println!("    d, dump   <schema.json> [--json]  Print every feature's property values");
    println!("    version                           Show version and build date");
    println!("    h, help                           Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!("    -j, --json       Dump as JSON (dump only)");
    println!();
    println!("NOTES:");
    println!("    - External buffers and documents resolve relative to the schema file");
    println!("    - Embedded buffers are not available from the command line");
    println!("    - RUST_LOG overrides the verbosity flags");
}

/// Load a schema file and build its table, waiting for external resources.
fn load(path: &str) -> anyhow::Result<FeatureTable> {
    let path = Path::new(path);
    info!("Opening schema: {}", path.display());

    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let schema = TableSchema::from_json(&text).with_context(|| format!("invalid schema {}", path.display()))?;

    let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let cache = ResourceCache::new(CacheConfig::from_directory(dir)?, Arc::new(FileFetcher));
    let table = FeatureTable::new(&schema, &cache, &[], TableOptions::default())?;

    if table.is_pending() {
        debug!("Waiting for external resources");
        futures::executor::block_on(table.ready());
    }
    debug!(
        "Cache holds {} JSON documents, {} buffers",
        cache.json_len(),
        cache.buffer_len()
    );
    Ok(table)
}

fn cmd_info(path: &str) -> anyhow::Result<()> {
    let table = load(path)?;

    println!("Schema: {path}");
    match table.count() {
        Some(count) => println!("Features: {count}"),
        None => println!("Features: (no count)"),
    }
    println!();

    let names: Vec<&str> = table.property_names().collect();
    let width = names.iter().map(|n| n.len()).max().unwrap_or(0);
    println!("Properties:");
    for name in &names {
        println!(
            "  {:width$}  {:8}  {}",
            name,
            table.property_type(name)?.to_string(),
            table.property_state(name)?,
        );
    }
    println!();
    println!("Total properties: {}", names.len());

    if let Some(extras) = table.extras() {
        println!("Extras: {extras}");
    }
    Ok(())
}

fn cmd_dump(path: &str, json_mode: bool) -> anyhow::Result<()> {
    let table = load(path)?;
    let names: Vec<&str> = table.property_names().collect();

    if json_mode {
        let mut features = Vec::with_capacity(table.feature_count());
        for feature in table.features() {
            let mut row = Map::new();
            for name in &names {
                let value = feature.get_property(name)?.map(|v| v.to_json()).unwrap_or(Value::Null);
                row.insert((*name).to_owned(), value);
            }
            features.push(Value::Object(row));
        }
        println!("{}", serde_json::to_string_pretty(&Value::Array(features))?);
        return Ok(());
    }

    for feature in table.features() {
        println!("Feature {}:", feature.id());
        for name in &names {
            match feature.get_property(name)? {
                Some(value) => println!("  {name}: {value}"),
                None => println!("  {name}: (unavailable)"),
            }
        }
    }
    if table.feature_count() == 0 {
        println!("(no features)");
    }
    Ok(())
}
