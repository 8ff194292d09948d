//! Benchmark orchestrator: distributes (query, optional plan) rows across
//! a fixed-size worker pool, applies the compiled hint directive when
//! requested, and collects per-row timing results keyed by row index.

#[macro_use]
extern crate log;

pub mod csv_utils;

use common::plan::PlanNode;
use common::ReplanError;
use queryexe::QueryExecutor;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

/// How many completions between progress log lines.
const PROGRESS_INTERVAL: usize = 100;

/// One unit of benchmark work. Exactly one task exists per input row and
/// exactly one worker consumes it; there are no retries.
#[derive(Debug, Clone)]
pub struct BenchmarkTask {
    /// Stable identifier correlating this task to its output row.
    pub row_index: usize,
    /// SQL text to execute.
    pub query: String,
    /// Serialized plan payload, if the input row carried one.
    pub plan_json: Option<String>,
    /// Whether to derive and apply a hint directive from the plan.
    pub use_hints: bool,
    /// Number of timed repetitions; must be at least 1.
    pub iterations: u32,
}

/// Per-row outcome. Either a timing value or an error marker, never both.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub row_index: usize,
    pub execution_time_ms: Option<f64>,
    pub error: Option<String>,
}

/// A query row handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct QueryInput {
    pub query: String,
    pub plan_json: Option<String>,
}

/// Dispatches benchmark tasks over a fixed pool of worker threads, each
/// holding its own database connection through the executor.
pub struct BenchmarkRunner {
    executor: Arc<dyn QueryExecutor>,
    workers: usize,
}

impl BenchmarkRunner {
    /// Creates a runner over `workers` parallel workers.
    ///
    /// # Arguments
    ///
    /// * `executor` - Adapter the workers execute queries through.
    /// * `workers` - Fixed worker count; must be at least 1.
    pub fn new(executor: Arc<dyn QueryExecutor>, workers: usize) -> Result<Self, ReplanError> {
        if workers == 0 {
            return Err(ReplanError::ConfigError(String::from(
                "worker count must be at least 1",
            )));
        }
        Ok(Self { executor, workers })
    }

    /// Benchmarks every input row and returns one result per row, indexed
    /// by the row's position in `rows`.
    ///
    /// All tasks are submitted up front; completions arrive in whatever
    /// order workers finish and are written back solely by row index, so
    /// the output is always input-aligned. A failing or crashing row never
    /// affects any other row.
    ///
    /// # Arguments
    ///
    /// * `rows` - Input rows, one task each.
    /// * `use_hints` - Derive a directive from each row's plan payload.
    /// * `iterations` - Timed repetitions per row; must be at least 1.
    pub fn run_queries(
        &self,
        rows: Vec<QueryInput>,
        use_hints: bool,
        iterations: u32,
    ) -> Result<Vec<BenchmarkResult>, ReplanError> {
        if iterations == 0 {
            return Err(ReplanError::ConfigError(String::from(
                "iterations must be at least 1",
            )));
        }

        let total = rows.len();
        info!(
            "Processing {} queries with {} workers (use_hints={}, iterations={})",
            total, self.workers, use_hints, iterations
        );
        if total == 0 {
            return Ok(Vec::new());
        }

        let (task_tx, task_rx) = mpsc::channel::<BenchmarkTask>();
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (result_tx, result_rx) = mpsc::channel::<BenchmarkResult>();

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let queue = Arc::clone(&task_rx);
            let sink = result_tx.clone();
            let executor = Arc::clone(&self.executor);
            handles.push(thread::spawn(move || {
                worker_loop(worker_id, executor, queue, sink)
            }));
        }
        // The collection loop below must see the channel close once all
        // workers are done, so the orchestrator drops its own handles.
        drop(result_tx);

        for (row_index, row) in rows.into_iter().enumerate() {
            let task = BenchmarkTask {
                row_index,
                query: row.query,
                plan_json: row.plan_json,
                use_hints,
                iterations,
            };
            if task_tx.send(task).is_err() {
                // Only possible if every worker already exited.
                break;
            }
        }
        drop(task_tx);

        let mut results: Vec<Option<BenchmarkResult>> = (0..total).map(|_| None).collect();
        let mut completed = 0;
        for result in result_rx.iter() {
            let row_index = result.row_index;
            match result.error.as_ref() {
                Some(e) => debug!("[{}] ERROR: {}", row_index, e),
                None => debug!("[{}] OK {:?} ms", row_index, result.execution_time_ms),
            }
            results[row_index] = Some(result);
            completed += 1;
            if completed % PROGRESS_INTERVAL == 0 || completed == total {
                info!("Completed {}/{}", completed, total);
            }
        }

        for handle in handles {
            // A worker that panicked outside the task guard has already
            // reported its in-flight row; nothing to propagate here.
            let _ = handle.join();
        }

        Ok(results
            .into_iter()
            .enumerate()
            .map(|(row_index, slot)| {
                slot.unwrap_or_else(|| BenchmarkResult {
                    row_index,
                    execution_time_ms: None,
                    error: Some(String::from("task lost: no worker reported a result")),
                })
            })
            .collect())
    }
}

/// Pulls tasks off the shared queue until it closes, reporting one result
/// per task. The task body runs under a panic guard so an uncaught fault
/// fails only its own row.
fn worker_loop(
    worker_id: usize,
    executor: Arc<dyn QueryExecutor>,
    queue: Arc<Mutex<mpsc::Receiver<BenchmarkTask>>>,
    sink: mpsc::Sender<BenchmarkResult>,
) {
    loop {
        let next = {
            let queue = queue.lock().unwrap();
            queue.recv()
        };
        let task = match next {
            Ok(task) => task,
            Err(_) => break,
        };
        let row_index = task.row_index;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            execute_task(executor.as_ref(), &task)
        }));
        let result = match outcome {
            Ok(Ok(ms)) => BenchmarkResult {
                row_index,
                execution_time_ms: Some(ms),
                error: None,
            },
            Ok(Err(e)) => BenchmarkResult {
                row_index,
                execution_time_ms: None,
                error: Some(e.to_string()),
            },
            Err(payload) => {
                let fault = ReplanError::WorkerFault(panic_message(payload));
                error!("Worker {} crashed on row {}: {}", worker_id, row_index, fault);
                BenchmarkResult {
                    row_index,
                    execution_time_ms: None,
                    error: Some(fault.to_string()),
                }
            }
        };
        if sink.send(result).is_err() {
            break;
        }
    }
}

/// Runs one task to completion and returns its timing value in ms.
///
/// Strategy selection: a present directive routes through the hinted
/// analyze path with the resolved timing field; otherwise plain timed
/// execution. With `iterations > 1` the arithmetic mean is taken and any
/// failing repetition fails the whole task.
fn execute_task(executor: &dyn QueryExecutor, task: &BenchmarkTask) -> Result<f64, ReplanError> {
    let directive = derive_directive(task);

    if !directive.is_empty() {
        let mut times = Vec::with_capacity(task.iterations as usize);
        for _ in 0..task.iterations {
            let report = executor.run_with_hints(&task.query, &directive)?;
            let t = report.resolved_time_ms().ok_or_else(|| {
                ReplanError::ExecutionError(String::from("No timing value found"))
            })?;
            times.push(t);
        }
        Ok(times.iter().sum::<f64>() / times.len() as f64)
    } else {
        let mut times = Vec::with_capacity(task.iterations as usize);
        for _ in 0..task.iterations {
            let report = executor.run(&task.query)?;
            times.push(report.elapsed_ms);
        }
        Ok(times.iter().sum::<f64>() / times.len() as f64)
    }
}

/// Derives the hint directive for a task, or the empty string when hints
/// are off, no plan is present, or the payload does not parse. A bad plan
/// payload downgrades the row to unhinted execution instead of failing it.
fn derive_directive(task: &BenchmarkTask) -> String {
    if !task.use_hints {
        return String::new();
    }
    match task.plan_json.as_deref() {
        Some(payload) => match PlanNode::from_json_str(payload) {
            Ok(plan) => hints::plan_to_hints(&plan),
            Err(e) => {
                warn!(
                    "Row {}: unusable plan payload, running unhinted: {}",
                    task.row_index, e
                );
                String::new()
            }
        },
        None => String::new(),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic payload")
    }
}
