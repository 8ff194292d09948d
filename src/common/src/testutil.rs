use crate::plan::PlanNode;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A bare plan node with the given operator tag and no other attributes.
pub fn empty_node(node_type: &str) -> PlanNode {
    PlanNode {
        node_type: node_type.to_string(),
        relation: None,
        alias: None,
        index_name: None,
        children: Vec::new(),
        actual_total_time: None,
        actual_rows: None,
        total_cost: None,
        plan_rows: None,
        hash_cond: None,
        merge_cond: None,
    }
}

/// A leaf scan node over `relation`, optionally aliased.
pub fn scan_node(node_type: &str, relation: &str, alias: Option<&str>) -> PlanNode {
    let mut node = empty_node(node_type);
    node.relation = Some(relation.to_string());
    node.alias = alias.map(|a| a.to_string());
    node
}

/// A scan node that reports using an index.
pub fn index_scan_node(node_type: &str, relation: &str, index: &str) -> PlanNode {
    let mut node = scan_node(node_type, relation, None);
    node.index_name = Some(index.to_string());
    node
}

/// An interior node with the given ordered children.
pub fn join_node(node_type: &str, children: Vec<PlanNode>) -> PlanNode {
    let mut node = empty_node(node_type);
    node.children = children;
    node
}

pub fn gen_rand_string(n: usize) -> String {
    thread_rng()
        .sample_iter(Alphanumeric)
        .take(n)
        .map(char::from)
        .collect()
}

/// Builds a left-deep tree of hash joins over `tables` sequential scans.
///
/// # Arguments
///
/// * `tables` - Number of leaf tables; must be at least 2.
pub fn left_deep_join_tree(tables: usize) -> PlanNode {
    assert!(tables >= 2);
    let name = |i: usize| format!("t{}", i);
    let mut tree = join_node(
        "Hash Join",
        vec![
            scan_node("Seq Scan", &name(0), None),
            scan_node("Seq Scan", &name(1), None),
        ],
    );
    for i in 2..tables {
        tree = join_node(
            "Hash Join",
            vec![tree, scan_node("Seq Scan", &name(i), None)],
        );
    }
    tree
}
