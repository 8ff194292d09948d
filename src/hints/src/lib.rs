//! Compiles a captured execution plan into a `pg_hint_plan` directive that
//! forces the optimizer to reproduce that plan.

use common::plan::PlanNode;
use log::debug;
use std::collections::HashSet;
use std::fmt;

/// Maps a scan operator tag to its hint name.
///
/// # Arguments
///
/// * `node_type` - Plan node operator tag.
pub fn scan_hint_name(node_type: &str) -> Option<&'static str> {
    match node_type {
        "Seq Scan" => Some("SeqScan"),
        "Index Scan" => Some("IndexScan"),
        "Index Only Scan" => Some("IndexOnlyScan"),
        "Bitmap Heap Scan" => Some("BitmapScan"),
        "Bitmap Index Scan" => Some("BitmapScan"),
        "Tid Scan" => Some("TidScan"),
        "Tid Range Scan" => Some("TidRangeScan"),
        _ => None,
    }
}

/// Maps a join operator tag to its hint name.
///
/// # Arguments
///
/// * `node_type` - Plan node operator tag.
pub fn join_hint_name(node_type: &str) -> Option<&'static str> {
    match node_type {
        "Nested Loop" => Some("NestLoop"),
        "Hash Join" => Some("HashJoin"),
        "Merge Join" => Some("MergeJoin"),
        _ => None,
    }
}

/// A single hint token extracted from the plan.
#[derive(Debug, Clone, PartialEq)]
pub enum HintToken {
    /// Forces the scan operator for one table.
    Scan { operator: &'static str, table: String },
    /// Forces the join operator over the named operand tables, in
    /// discovery order (left subtree tables before right).
    Join {
        operator: &'static str,
        tables: Vec<String>,
    },
    /// Pins an index scan on `table` to a specific index.
    Index { table: String, index: String },
}

impl fmt::Display for HintToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HintToken::Scan { operator, table } => write!(f, "{}({})", operator, table),
            HintToken::Join { operator, tables } => {
                write!(f, "{}({})", operator, tables.join(" "))
            }
            HintToken::Index { table, index } => write!(f, "IndexScan({} {})", table, index),
        }
    }
}

/// The ordered hint tokens compiled from one plan tree.
///
/// Token groups keep their discovery order. Scan and index tokens are never
/// deduplicated; join tokens are deduplicated by exact rendered-string
/// equality when the directive is rendered.
#[derive(Debug, Default, Clone)]
pub struct HintSet {
    scans: Vec<HintToken>,
    joins: Vec<HintToken>,
    indexes: Vec<HintToken>,
}

impl HintSet {
    pub fn scans(&self) -> &[HintToken] {
        &self.scans
    }

    pub fn joins(&self) -> &[HintToken] {
        &self.joins
    }

    pub fn indexes(&self) -> &[HintToken] {
        &self.indexes
    }

    /// All distinct table identifiers named by scan tokens, in discovery
    /// order. Diagnostic accessor; not part of the directive.
    pub fn tables(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut tables = Vec::new();
        for token in &self.scans {
            if let HintToken::Scan { table, .. } = token {
                if seen.insert(table.as_str()) {
                    tables.push(table.as_str());
                }
            }
        }
        tables
    }

    /// Renders the directive string: scan tokens, then deduplicated join
    /// tokens, then index tokens, space-joined inside `/*+ ... */`. An
    /// empty token set renders as the empty string so the query runs
    /// unmodified.
    pub fn directive(&self) -> String {
        let mut rendered: Vec<String> = self.scans.iter().map(|t| t.to_string()).collect();

        let mut seen_joins = HashSet::new();
        for token in &self.joins {
            let s = token.to_string();
            if seen_joins.insert(s.clone()) {
                rendered.push(s);
            }
        }

        rendered.extend(self.indexes.iter().map(|t| t.to_string()));

        if rendered.is_empty() {
            String::new()
        } else {
            format!("/*+ {} */", rendered.join(" "))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty() && self.joins.is_empty() && self.indexes.is_empty()
    }
}

/// Walks the plan tree and collects hint tokens.
///
/// The traversal is post-order so each join sees the full set of leaf
/// tables under its child subtrees before emitting its token. A join token
/// names every leaf table under each immediate child, not just the nearest
/// scan on each side; for trees of three or more nested joins this yields
/// join hints naming more than two tables. That over-approximation is the
/// defined output of this compiler and downstream consumers depend on it.
///
/// # Arguments
///
/// * `plan` - Root of the canonical plan tree.
pub fn compile(plan: &PlanNode) -> HintSet {
    let mut set = HintSet::default();
    walk(plan, &mut set);
    debug!(
        "Compiled {} scan, {} join, {} index hint tokens",
        set.scans.len(),
        set.joins.len(),
        set.indexes.len()
    );
    set
}

/// Convenience wrapper: compile and render in one step.
///
/// # Arguments
///
/// * `plan` - Root of the canonical plan tree.
pub fn plan_to_hints(plan: &PlanNode) -> String {
    compile(plan).directive()
}

/// Recursive traversal helper. Returns the ordered table identifiers found
/// in this subtree, children first.
fn walk(node: &PlanNode, set: &mut HintSet) -> Vec<String> {
    let mut child_tables: Vec<Vec<String>> = Vec::new();
    let mut tables_in_subtree: Vec<String> = Vec::new();
    for child in &node.children {
        let tables = walk(child, set);
        tables_in_subtree.extend(tables.iter().cloned());
        child_tables.push(tables);
    }

    if let Some(operator) = scan_hint_name(&node.node_type) {
        if let Some(table) = node.table_ident() {
            set.scans.push(HintToken::Scan {
                operator,
                table: table.to_string(),
            });
            tables_in_subtree.push(table.to_string());

            if let Some(index) = &node.index_name {
                set.indexes.push(HintToken::Index {
                    table: table.to_string(),
                    index: index.clone(),
                });
            }
        }
    } else if let Some(operator) = join_hint_name(&node.node_type) {
        // A join token needs two child subtrees and at least two operand
        // tables between them; anything less carries no information.
        if child_tables.len() >= 2 {
            let operand_tables: Vec<String> = child_tables.into_iter().flatten().collect();
            if operand_tables.len() >= 2 {
                set.joins.push(HintToken::Join {
                    operator,
                    tables: operand_tables,
                });
            }
        }
    }
    // Unrecognized node kinds contribute no token; their children were
    // still traversed above.

    tables_in_subtree
}

#[cfg(test)]
mod test {
    use super::*;
    use common::testutil::*;

    #[test]
    fn test_single_scan() {
        let plan = scan_node("Seq Scan", "users", None);
        let set = compile(&plan);
        assert_eq!(set.scans().len(), 1);
        assert!(set.joins().is_empty());
        assert_eq!(set.directive(), "/*+ SeqScan(users) */");
    }

    #[test]
    fn test_scan_prefers_alias() {
        let plan = scan_node("Seq Scan", "users", Some("u"));
        assert_eq!(plan_to_hints(&plan), "/*+ SeqScan(u) */");
    }

    #[test]
    fn test_scan_without_table_is_skipped() {
        let plan = empty_node("Seq Scan");
        assert_eq!(plan_to_hints(&plan), "");
    }

    #[test]
    fn test_scan_kind_mapping() {
        let cases = [
            ("Seq Scan", "SeqScan"),
            ("Index Scan", "IndexScan"),
            ("Index Only Scan", "IndexOnlyScan"),
            ("Bitmap Heap Scan", "BitmapScan"),
            ("Bitmap Index Scan", "BitmapScan"),
            ("Tid Scan", "TidScan"),
            ("Tid Range Scan", "TidRangeScan"),
        ];
        for (node_type, hint) in &cases {
            let plan = scan_node(node_type, "t", None);
            assert_eq!(plan_to_hints(&plan), format!("/*+ {}(t) */", hint));
        }
    }

    #[test]
    fn test_two_table_hash_join_golden() {
        let plan = join_node(
            "Hash Join",
            vec![
                scan_node("Seq Scan", "a", None),
                scan_node("Seq Scan", "b", None),
            ],
        );
        assert_eq!(
            plan_to_hints(&plan),
            "/*+ SeqScan(a) SeqScan(b) HashJoin(a b) */"
        );
    }

    #[test]
    fn test_join_kind_mapping() {
        for (node_type, hint) in &[
            ("Nested Loop", "NestLoop"),
            ("Hash Join", "HashJoin"),
            ("Merge Join", "MergeJoin"),
        ] {
            let plan = join_node(
                node_type,
                vec![
                    scan_node("Seq Scan", "a", None),
                    scan_node("Seq Scan", "b", None),
                ],
            );
            assert_eq!(
                plan_to_hints(&plan),
                format!("/*+ SeqScan(a) SeqScan(b) {}(a b) */", hint)
            );
        }
    }

    #[test]
    fn test_index_scan_emits_index_hint() {
        let plan = index_scan_node("Index Scan", "orders", "orders_pkey");
        assert_eq!(
            plan_to_hints(&plan),
            "/*+ IndexScan(orders) IndexScan(orders orders_pkey) */"
        );
    }

    #[test]
    fn test_unrecognized_nodes_pass_through() {
        // Aggregate and Sort carry no token but must not hide their
        // children from the traversal.
        let plan = join_node(
            "Aggregate",
            vec![join_node(
                "Sort",
                vec![join_node(
                    "Hash Join",
                    vec![
                        scan_node("Seq Scan", "a", None),
                        scan_node("Seq Scan", "b", None),
                    ],
                )],
            )],
        );
        assert_eq!(
            plan_to_hints(&plan),
            "/*+ SeqScan(a) SeqScan(b) HashJoin(a b) */"
        );
    }

    #[test]
    fn test_single_child_join_emits_no_token() {
        let plan = join_node("Hash Join", vec![scan_node("Seq Scan", "a", None)]);
        assert_eq!(plan_to_hints(&plan), "/*+ SeqScan(a) */");
    }

    #[test]
    fn test_nested_joins_over_approximate() {
        // Three tables under two nested joins: the outer join hint names
        // all leaf tables under its children, not just two operands.
        let plan = join_node(
            "Hash Join",
            vec![
                join_node(
                    "Hash Join",
                    vec![
                        scan_node("Seq Scan", "a", None),
                        scan_node("Seq Scan", "b", None),
                    ],
                ),
                scan_node("Seq Scan", "c", None),
            ],
        );
        assert_eq!(
            plan_to_hints(&plan),
            "/*+ SeqScan(a) SeqScan(b) SeqScan(c) HashJoin(a b) HashJoin(a b c) */"
        );
    }

    #[test]
    fn test_join_through_interposed_node() {
        // A Hash node sits between the join and its right scan, as in real
        // hash join plans. The join still sees the table below it.
        let plan = join_node(
            "Hash Join",
            vec![
                scan_node("Seq Scan", "v", None),
                join_node("Hash", vec![scan_node("Seq Scan", "p", None)]),
            ],
        );
        assert_eq!(
            plan_to_hints(&plan),
            "/*+ SeqScan(v) SeqScan(p) HashJoin(v p) */"
        );
    }

    #[test]
    fn test_join_dedup_by_rendered_string() {
        // Two joins over the same operand pair render identically and must
        // appear once in the directive.
        let plan = join_node(
            "Materialize",
            vec![
                join_node(
                    "Hash Join",
                    vec![
                        scan_node("Seq Scan", "a", None),
                        scan_node("Seq Scan", "b", None),
                    ],
                ),
                join_node(
                    "Hash Join",
                    vec![
                        scan_node("Seq Scan", "a", None),
                        scan_node("Seq Scan", "b", None),
                    ],
                ),
            ],
        );
        assert_eq!(
            plan_to_hints(&plan),
            "/*+ SeqScan(a) SeqScan(b) SeqScan(a) SeqScan(b) HashJoin(a b) */"
        );
    }

    #[test]
    fn test_idempotent_compilation() {
        let plan = left_deep_join_tree(5);
        assert_eq!(plan_to_hints(&plan), plan_to_hints(&plan));
    }

    #[test]
    fn test_empty_plan_renders_empty_directive() {
        let plan = empty_node("Result");
        let set = compile(&plan);
        assert!(set.is_empty());
        assert_eq!(set.directive(), "");
    }

    #[test]
    fn test_tables_accessor() {
        let plan = left_deep_join_tree(3);
        let set = compile(&plan);
        assert_eq!(set.tables(), vec!["t0", "t1", "t2"]);
    }

    #[test]
    fn test_stackexchange_style_plan_golden() {
        // Shape taken from a real EXPLAIN over a posts/users/votes query:
        // aggregation and sorts above two nested hash joins with Hash
        // build sides.
        let text = r#"[{"Plan": {"Node Type": "Limit", "Plans": [
          {"Node Type": "Sort", "Plans": [
            {"Node Type": "Aggregate", "Plans": [
              {"Node Type": "Sort", "Plans": [
                {"Node Type": "Hash Join", "Hash Cond": "(v.postid = p.id)", "Plans": [
                  {"Node Type": "Seq Scan", "Relation Name": "votes", "Alias": "v"},
                  {"Node Type": "Hash", "Plans": [
                    {"Node Type": "Hash Join", "Hash Cond": "(p.owneruserid = u.id)", "Plans": [
                      {"Node Type": "Seq Scan", "Relation Name": "posts", "Alias": "p"},
                      {"Node Type": "Hash", "Plans": [
                        {"Node Type": "Seq Scan", "Relation Name": "users", "Alias": "u"}
                      ]}
                    ]}
                  ]}
                ]}
              ]}
            ]}
          ]}
        ]}}]"#;
        let plan = common::plan::PlanNode::from_json_str(text).unwrap();
        assert_eq!(
            plan_to_hints(&plan),
            "/*+ SeqScan(v) SeqScan(p) SeqScan(u) HashJoin(p u) HashJoin(v p u) */"
        );
    }
}
