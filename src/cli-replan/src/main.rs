extern crate clap;
use clap::{App, Arg, ArgMatches};
use env_logger::Env;
use log::{error, info};

use batch::csv_utils;
use batch::BenchmarkRunner;
use common::{DbConfig, ReplanError};
use queryexe::{PgExecutor, QueryExecutor};
use std::sync::Arc;

/// Entry point for the batch benchmark CLI.
///
/// Reads a CSV of queries (optionally with captured plans), times each one
/// against the configured database, and writes the table back out with an
/// execution-time column.
fn main() {
    // Configure log environment
    env_logger::from_env(Env::default().default_filter_or("info")).init();

    let matches = App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("csv")
                .value_name("CSV")
                .help("Path to CSV file containing queries")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .value_name("FILE")
                .help("Output CSV path")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("use-hints")
                .long("use-hints")
                .help("Derive and apply plan-reproduction hints per row"),
        )
        .arg(
            Arg::with_name("iterations")
                .short("i")
                .long("iterations")
                .value_name("N")
                .default_value("1")
                .help("Number of benchmark iterations per query")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("workers")
                .short("w")
                .long("workers")
                .value_name("N")
                .default_value("4")
                .help("Parallel workers")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Sets a custom database config file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("db-host")
                .long("db-host")
                .value_name("host")
                .default_value("localhost")
                .help("Database server address")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("db-port")
                .long("db-port")
                .value_name("port")
                .default_value("5432")
                .help("Database server port")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("db-name")
                .long("db-name")
                .value_name("dbname")
                .default_value("replan_test")
                .help("Database name")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("db-user")
                .long("db-user")
                .value_name("user")
                .default_value("postgres")
                .help("Database role")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("db-password")
                .long("db-password")
                .value_name("password")
                .default_value("")
                .help("Database password")
                .takes_value(true),
        )
        .get_matches();

    if let Err(e) = run(&matches) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn parse_count(matches: &ArgMatches, name: &str) -> Result<u32, ReplanError> {
    let raw = matches.value_of(name).unwrap();
    raw.parse()
        .map_err(|_| ReplanError::ConfigError(format!("{} must be a number, got {:?}", name, raw)))
}

fn db_config(matches: &ArgMatches) -> Result<DbConfig, ReplanError> {
    if let Some(path) = matches.value_of("config") {
        return DbConfig::from_file(path);
    }
    let port_raw = matches.value_of("db-port").unwrap();
    let port: u16 = port_raw.parse().map_err(|_| {
        ReplanError::ConfigError(format!("db-port must be a port number, got {:?}", port_raw))
    })?;
    Ok(DbConfig {
        host: matches.value_of("db-host").unwrap().to_string(),
        port,
        dbname: matches.value_of("db-name").unwrap().to_string(),
        user: matches.value_of("db-user").unwrap().to_string(),
        password: matches.value_of("db-password").unwrap().to_string(),
        statement_timeout_ms: None,
    })
}

fn run(matches: &ArgMatches) -> Result<(), ReplanError> {
    let csv_path = matches.value_of("csv").unwrap();
    let use_hints = matches.is_present("use-hints");
    let iterations = parse_count(matches, "iterations")?;
    let workers = parse_count(matches, "workers")? as usize;

    let config = db_config(matches)?;
    info!("Starting batch run over {:?} with config: {:?}", csv_path, config);

    let table = csv_utils::read_queries(csv_path)?;
    let executor: Arc<dyn QueryExecutor> = Arc::new(PgExecutor::new(config));
    let runner = BenchmarkRunner::new(executor, workers)?;
    let results = runner.run_queries(table.inputs(), use_hints, iterations)?;

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    info!("Finished: {} ok, {} failed", results.len() - failed, failed);

    let output = matches
        .value_of("output")
        .map(str::to_string)
        .unwrap_or_else(|| csv_utils::default_output_path(csv_path));
    csv_utils::write_results(&table, &results, &output)?;
    Ok(())
}
