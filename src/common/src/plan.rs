use crate::ReplanError;
use serde_json::Value;
use std::fmt;

/// One node of a captured execution plan.
///
/// The wire format is the JSON tree emitted by `EXPLAIN (FORMAT JSON)`:
/// field names carry spaces, children live under `Plans` and their order is
/// semantically meaningful (left/right join operand identity derives from
/// position). The analyze/estimate fields are kept for rendering only and
/// never feed hint extraction.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PlanNode {
    /// Physical operator tag, e.g. "Seq Scan" or "Hash Join".
    #[serde(rename = "Node Type", default)]
    pub node_type: String,
    /// Base relation scanned by this node, if any.
    #[serde(rename = "Relation Name")]
    pub relation: Option<String>,
    /// Query-level alias for the relation. Preferred over the relation
    /// name when identifying a table.
    #[serde(rename = "Alias")]
    pub alias: Option<String>,
    /// Index used by an index/bitmap scan.
    #[serde(rename = "Index Name")]
    pub index_name: Option<String>,
    /// Ordered child subplans.
    #[serde(rename = "Plans", default)]
    pub children: Vec<PlanNode>,
    /// Measured time in ms, present after ANALYZE.
    #[serde(rename = "Actual Total Time")]
    pub actual_total_time: Option<f64>,
    /// Measured row count, present after ANALYZE.
    #[serde(rename = "Actual Rows")]
    pub actual_rows: Option<i64>,
    /// Optimizer cost estimate.
    #[serde(rename = "Total Cost")]
    pub total_cost: Option<f64>,
    /// Optimizer row estimate.
    #[serde(rename = "Plan Rows")]
    pub plan_rows: Option<i64>,
    /// Hash join condition, e.g. "(a.id = b.id)".
    #[serde(rename = "Hash Cond")]
    pub hash_cond: Option<String>,
    /// Merge join condition.
    #[serde(rename = "Merge Cond")]
    pub merge_cond: Option<String>,
}

impl PlanNode {
    /// Normalize a plan payload into one canonical rooted tree.
    ///
    /// Accepts the three shapes produced by EXPLAIN and its callers: a
    /// single object with a top-level `Plan` field, a single-element array
    /// wrapping such an object, or the bare node object itself.
    ///
    /// # Arguments
    ///
    /// * `payload` - Parsed JSON payload in any of the accepted shapes.
    pub fn from_value(payload: &Value) -> Result<PlanNode, ReplanError> {
        let malformed = |msg: &str| ReplanError::PlanParseError(String::from(msg));

        let obj = match payload {
            Value::Array(items) => items
                .first()
                .ok_or_else(|| malformed("empty plan array"))?,
            Value::Object(_) => payload,
            _ => return Err(malformed("plan payload is not an object or array")),
        };

        let root = match obj.get("Plan") {
            Some(plan) => plan,
            None => obj,
        };

        serde_json::from_value(root.clone())
            .map_err(|e| ReplanError::PlanParseError(format!("malformed plan node: {}", e)))
    }

    /// Parse a plan payload from its serialized-text form.
    ///
    /// # Arguments
    ///
    /// * `payload` - JSON text of any of the accepted payload shapes.
    pub fn from_json_str(payload: &str) -> Result<PlanNode, ReplanError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| ReplanError::PlanParseError(format!("invalid plan json: {}", e)))?;
        PlanNode::from_value(&value)
    }

    /// The identifier hints should use for this node's table, preferring
    /// the alias over the relation name.
    pub fn table_ident(&self) -> Option<&str> {
        self.alias.as_deref().or_else(|| self.relation.as_deref())
    }

    /// Render the subtree as an indented, human-readable listing.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.node_type);
        if let Some(table) = self.table_ident() {
            out.push_str(&format!(" on {}", table));
        }
        if let Some(index) = &self.index_name {
            out.push_str(&format!(" using {}", index));
        }
        if let Some(cond) = self.hash_cond.as_ref().or_else(|| self.merge_cond.as_ref()) {
            out.push_str(&format!(" cond={}", cond));
        }
        match (self.actual_total_time, self.actual_rows) {
            (Some(t), Some(r)) => out.push_str(&format!(" (actual time={} rows={})", t, r)),
            (Some(t), None) => out.push_str(&format!(" (actual time={})", t)),
            _ => {
                if let (Some(c), Some(r)) = (self.total_cost, self.plan_rows) {
                    out.push_str(&format!(" (cost={} rows={})", c, r));
                }
            }
        }
        out.push('\n');
        for child in &self.children {
            child.render_into(out, depth + 1);
        }
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}
