//! Execution adapter: runs SQL against the target database in four modes
//! (plan-only, plan+analyze, plain timed run, hinted run) behind one trait
//! so the benchmark layer can be driven by stubs in tests.

extern crate log;

pub mod pg;

pub use pg::PgExecutor;

use common::ReplanError;
use serde_json::Value;

/// Result of planning a query without executing it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEstimate {
    /// The raw EXPLAIN payload (`{"Plan": {...}, ...}`).
    pub plan: Value,
    /// Optimizer cost estimate for the root node.
    pub estimated_cost: f64,
    /// Optimizer row estimate for the root node.
    pub estimated_rows: i64,
    /// Planning time reported by the server, in ms.
    pub planning_time_ms: Option<f64>,
}

/// Result of executing a query under EXPLAIN ANALYZE.
///
/// Carries the three timing fields the benchmark layer resolves between;
/// any of them can be absent depending on server version and plan shape.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeReport {
    /// The raw EXPLAIN payload (`{"Plan": {...}, ...}`).
    pub plan: Value,
    /// Root node "Actual Total Time" in ms.
    pub actual_total_time: Option<f64>,
    /// Top-level "Execution Time" in ms.
    pub execution_time: Option<f64>,
    /// Wall-clock time of the EXPLAIN round trip in ms.
    pub execution_time_ms: Option<f64>,
    /// Root node "Actual Rows".
    pub actual_rows: Option<i64>,
}

impl AnalyzeReport {
    /// Resolves the timing value for this report: the first present of
    /// actual total time, server execution time, and wall-clock time.
    pub fn resolved_time_ms(&self) -> Option<f64> {
        self.actual_total_time
            .or(self.execution_time)
            .or(self.execution_time_ms)
    }
}

/// Result of a plain timed execution.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Wall-clock time of the execution in ms.
    pub elapsed_ms: f64,
    /// Number of rows the query returned.
    pub row_count: usize,
}

/// Adapter contract for query execution.
///
/// Every operation owns its own connection for the duration of the call
/// and releases it on every exit path. Each returns either a success
/// payload or an error, never both.
pub trait QueryExecutor: Send + Sync {
    /// Plan the query without running it.
    fn plan_only(&self, query: &str) -> Result<PlanEstimate, ReplanError>;

    /// Run the query for real under EXPLAIN ANALYZE and report observed
    /// timing and row counts.
    fn plan_and_analyze(&self, query: &str) -> Result<AnalyzeReport, ReplanError>;

    /// Run the query and measure wall-clock time.
    fn run(&self, query: &str) -> Result<RunReport, ReplanError>;

    /// Prepend the hint directive to the query text and analyze the
    /// hinted query.
    fn run_with_hints(&self, query: &str, directive: &str) -> Result<AnalyzeReport, ReplanError>;
}

/// Extracts a plan estimate from an `EXPLAIN (FORMAT JSON)` payload.
///
/// # Arguments
///
/// * `explain` - First element of the EXPLAIN result array.
pub fn estimate_from_explain(explain: Value) -> PlanEstimate {
    let root = &explain["Plan"];
    PlanEstimate {
        estimated_cost: root["Total Cost"].as_f64().unwrap_or(0.0),
        estimated_rows: root["Plan Rows"].as_i64().unwrap_or(0),
        planning_time_ms: explain["Planning Time"].as_f64(),
        plan: explain,
    }
}

/// Extracts an analyze report from an `EXPLAIN (ANALYZE ...)` payload.
///
/// # Arguments
///
/// * `explain` - First element of the EXPLAIN result array.
/// * `wall_ms` - Wall-clock time of the round trip.
pub fn analyze_from_explain(explain: Value, wall_ms: f64) -> AnalyzeReport {
    let root = &explain["Plan"];
    AnalyzeReport {
        actual_total_time: root["Actual Total Time"].as_f64(),
        execution_time: explain["Execution Time"].as_f64(),
        execution_time_ms: Some(wall_ms),
        actual_rows: root["Actual Rows"].as_i64(),
        plan: explain,
    }
}
