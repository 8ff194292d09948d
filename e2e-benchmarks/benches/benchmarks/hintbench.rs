use criterion::{black_box, criterion_group, Criterion};

use common::plan::PlanNode;
use common::testutil::left_deep_join_tree;
use hints::plan_to_hints;

fn bench_compile_tiny(c: &mut Criterion) {
    let plan = left_deep_join_tree(2);
    c.bench_function("compile_tiny", |b| {
        b.iter(|| plan_to_hints(black_box(&plan)))
    });
}

fn bench_compile_medium(c: &mut Criterion) {
    let plan = left_deep_join_tree(16);
    c.bench_function("compile_medium", |b| {
        b.iter(|| plan_to_hints(black_box(&plan)))
    });
}

fn bench_compile_large(c: &mut Criterion) {
    let plan = left_deep_join_tree(64);
    c.bench_function("compile_large", |b| {
        b.iter(|| plan_to_hints(black_box(&plan)))
    });
}

fn bench_parse_and_compile(c: &mut Criterion) {
    // End to end: payload text to directive, the per-row path the batch
    // workers take.
    let text = r#"[{"Plan": {"Node Type": "Hash Join", "Plans": [
        {"Node Type": "Hash Join", "Plans": [
            {"Node Type": "Seq Scan", "Relation Name": "posts", "Alias": "p"},
            {"Node Type": "Hash", "Plans": [
                {"Node Type": "Seq Scan", "Relation Name": "users", "Alias": "u"}
            ]}
        ]},
        {"Node Type": "Index Scan", "Relation Name": "votes", "Alias": "v",
         "Index Name": "votes_pkey"}
    ]}}]"#;
    c.bench_function("parse_and_compile", |b| {
        b.iter(|| {
            let plan = PlanNode::from_json_str(black_box(text)).unwrap();
            plan_to_hints(&plan)
        })
    });
}

criterion_group! {
    name = hintbench;
    config = Criterion::default().sample_size(10);
    targets =
    bench_compile_tiny,
    bench_compile_medium,
    bench_compile_large,
    bench_parse_and_compile,
}
