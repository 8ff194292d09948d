use crate::{
    analyze_from_explain, estimate_from_explain, AnalyzeReport, PlanEstimate, QueryExecutor,
    RunReport,
};
use common::{DbConfig, ReplanError};
use log::debug;
use postgres::{Client, NoTls};
use serde_json::Value;
use std::time::Instant;

/// Executor backed by a live PostgreSQL server.
///
/// Holds only the connection settings; every call opens a fresh
/// connection, which the client drop releases on all exit paths. There is
/// no call-level timeout here: a query that never returns occupies the
/// calling worker until the server-side `statement_timeout` (if
/// configured) kills it.
pub struct PgExecutor {
    config: DbConfig,
}

fn pg_err(e: postgres::Error) -> ReplanError {
    ReplanError::ExecutionError(e.to_string())
}

impl PgExecutor {
    pub fn new(config: DbConfig) -> Self {
        Self { config }
    }

    fn connect(&self) -> Result<Client, ReplanError> {
        let mut pg = postgres::Config::new();
        pg.host(&self.config.host)
            .port(self.config.port)
            .dbname(&self.config.dbname)
            .user(&self.config.user);
        if !self.config.password.is_empty() {
            pg.password(&self.config.password);
        }
        let mut client = pg.connect(NoTls).map_err(pg_err)?;
        if let Some(ms) = self.config.statement_timeout_ms {
            client
                .batch_execute(&format!("SET statement_timeout = {}", ms))
                .map_err(pg_err)?;
        }
        Ok(client)
    }

    /// Runs an EXPLAIN variant and returns the first element of the JSON
    /// result array together with the round-trip wall time in ms.
    fn explain(&self, explain_cmd: &str, query: &str) -> Result<(Value, f64), ReplanError> {
        let mut client = self.connect()?;
        let explain_query = format!("{}{}", explain_cmd, query);
        debug!("Running {}", explain_cmd.trim_end());

        let start = Instant::now();
        let row = client.query_one(explain_query.as_str(), &[]).map_err(pg_err)?;
        let wall_ms = start.elapsed().as_secs_f64() * 1000.0;

        let payload: Value = row.get(0);
        let explain = match payload {
            Value::Array(mut items) if !items.is_empty() => items.remove(0),
            other => other,
        };
        Ok((explain, wall_ms))
    }
}

impl QueryExecutor for PgExecutor {
    fn plan_only(&self, query: &str) -> Result<PlanEstimate, ReplanError> {
        let (explain, _) = self.explain("EXPLAIN (FORMAT JSON) ", query)?;
        Ok(estimate_from_explain(explain))
    }

    fn plan_and_analyze(&self, query: &str) -> Result<AnalyzeReport, ReplanError> {
        let (explain, wall_ms) =
            self.explain("EXPLAIN (ANALYZE true, BUFFERS true, FORMAT JSON) ", query)?;
        Ok(analyze_from_explain(explain, wall_ms))
    }

    fn run(&self, query: &str) -> Result<RunReport, ReplanError> {
        let mut client = self.connect()?;
        let start = Instant::now();
        let rows = client.query(query, &[]).map_err(pg_err)?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        Ok(RunReport {
            elapsed_ms,
            row_count: rows.len(),
        })
    }

    fn run_with_hints(&self, query: &str, directive: &str) -> Result<AnalyzeReport, ReplanError> {
        // The directive rides in front of the query text; pg_hint_plan
        // only honors hints at the start of the statement.
        let hinted_query = format!("{}\n{}", directive, query);
        self.plan_and_analyze(&hinted_query)
    }
}
