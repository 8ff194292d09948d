//! CSV table layer for the benchmark: reads the (query, optional plan)
//! input table and writes it back out augmented with a timing column.

use crate::{BenchmarkResult, QueryInput};
use common::ReplanError;
use csv::StringRecord;
use std::fs::File;

/// Name of the required SQL-text column.
pub const QUERY_COLUMN: &str = "query";
/// Name of the optional serialized-plan column.
pub const PLAN_COLUMN: &str = "plan_json";
/// Name of the appended timing column.
pub const OUTPUT_COLUMN: &str = "execution_time";

/// The loaded input table. Original cells are kept verbatim so the output
/// preserves every input column, row identity, and row order.
pub struct QueryTable {
    headers: StringRecord,
    records: Vec<StringRecord>,
    query_idx: usize,
    plan_idx: Option<usize>,
}

fn csv_err(e: csv::Error) -> ReplanError {
    ReplanError::IOError(e.to_string())
}

impl QueryTable {
    /// Number of rows in the table.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Extracts the per-row benchmark inputs.
    pub fn inputs(&self) -> Vec<QueryInput> {
        self.records
            .iter()
            .map(|rec| QueryInput {
                query: rec.get(self.query_idx).unwrap_or("").to_string(),
                plan_json: self
                    .plan_idx
                    .and_then(|i| rec.get(i))
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string()),
            })
            .collect()
    }
}

/// Reads the benchmark input table.
///
/// The header row must name a `query` column; its absence aborts the whole
/// run before any dispatch. A `plan_json` column is optional and empty
/// cells in it mean "no plan for this row".
///
/// # Arguments
///
/// * `path` - Path to the input CSV file.
pub fn read_queries(path: &str) -> Result<QueryTable, ReplanError> {
    debug!("batch::csv_utils reading query table from {:?}", path);
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(file);

    let headers = rdr.headers().map_err(csv_err)?.clone();
    let query_idx = headers
        .iter()
        .position(|h| h == QUERY_COLUMN)
        .ok_or_else(|| {
            ReplanError::ConfigError(format!("CSV must have a '{}' column", QUERY_COLUMN))
        })?;
    let plan_idx = headers.iter().position(|h| h == PLAN_COLUMN);

    let mut records = Vec::new();
    for result in rdr.records() {
        let rec = result.map_err(csv_err)?;
        records.push(rec);
    }
    info!("Num query rows loaded: {:?}", records.len());

    Ok(QueryTable {
        headers,
        records,
        query_idx,
        plan_idx,
    })
}

/// Writes the output table: every input column followed by the timing
/// column, one row per input row in input order. Failed rows get an empty
/// timing cell.
///
/// # Arguments
///
/// * `table` - The input table the results belong to.
/// * `results` - One result per input row, indexed by row position.
/// * `path` - Path of the output CSV file.
pub fn write_results(
    table: &QueryTable,
    results: &[BenchmarkResult],
    path: &str,
) -> Result<(), ReplanError> {
    if results.len() != table.len() {
        return Err(ReplanError::ConfigError(format!(
            "result count {} does not match row count {}",
            results.len(),
            table.len()
        )));
    }

    let mut wtr = csv::Writer::from_path(path).map_err(csv_err)?;

    let mut headers = table.headers.clone();
    headers.push_field(OUTPUT_COLUMN);
    wtr.write_record(&headers).map_err(csv_err)?;

    for (rec, result) in table.records.iter().zip(results.iter()) {
        let mut out = rec.clone();
        match result.execution_time_ms {
            Some(ms) => out.push_field(&ms.to_string()),
            None => out.push_field(""),
        }
        wtr.write_record(&out).map_err(csv_err)?;
    }
    wtr.flush()?;
    info!("Saved results to {:?}", path);
    Ok(())
}

/// Default output path: the input path with `_with_times` before the
/// extension (`queries.csv` becomes `queries_with_times.csv`).
///
/// # Arguments
///
/// * `input_path` - Path of the input CSV file.
pub fn default_output_path(input_path: &str) -> String {
    match input_path.rfind('.') {
        Some(dot) if !input_path[dot..].contains('/') => {
            format!("{}_with_times{}", &input_path[..dot], &input_path[dot..])
        }
        _ => format!("{}_with_times.csv", input_path),
    }
}
