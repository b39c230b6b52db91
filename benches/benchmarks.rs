//! Performance benchmarks for execdoc.
//!
//! This module contains benchmarks for:
//! - Markdown parsing and scenario building
//! - Export rewriting with overrides
//! - Output verification
//!
//! Run with: `cargo bench`

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use execdoc::document::{Document, ExpectedOutput};
use execdoc::scenario::{rewrite_export, Scenario};
use execdoc::verify::{compare, jaro_winkler};

// ============================================================================
// Mock Data Fixtures
// ============================================================================

mod fixtures {
    use std::fmt::Write as _;

    /// Generate a tutorial with `num_steps` steps of two blocks each.
    pub fn generate_document(num_steps: usize) -> String {
        let mut doc = String::from("---\ntitle: Bench\n---\n\n# Benchmark tutorial\n\n");
        for step in 0..num_steps {
            let _ = write!(
                doc,
                "## Step {step}\n\nCreate resource {step}.\n\n\
                 ```bash\nexport NAME_{step}=value-{step}\necho $NAME_{step}\n```\n\n\
                 <!-- expected_similarity=0.8 -->\n\n```text\nvalue-{step}\n```\n\n\
                 ```bash\naz group show --name rg-{step}\n```\n\n"
            );
        }
        doc
    }

    pub fn overrides(count: usize) -> std::collections::BTreeMap<String, String> {
        (0..count).map(|i| (format!("NAME_{i}"), format!("override-{i}"))).collect()
    }
}

// ============================================================================
// Parsing Benchmarks
// ============================================================================

fn bench_document_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing/document");

    for num_steps in [10, 50, 200] {
        let markdown = fixtures::generate_document(num_steps);
        group.throughput(Throughput::Bytes(markdown.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", num_steps), &markdown, |b, markdown| {
            b.iter(|| {
                let doc = Document::parse(black_box(markdown));
                black_box(doc.code_blocks(&["bash"]).map(|blocks| blocks.len()))
            });
        });
    }

    group.finish();
}

fn bench_scenario_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing/scenario");

    for num_steps in [10, 50] {
        let markdown = fixtures::generate_document(num_steps);
        let overrides = fixtures::overrides(num_steps / 2);
        group.bench_with_input(BenchmarkId::new("build", num_steps), &markdown, |b, markdown| {
            b.iter(|| {
                Scenario::from_markdown(
                    black_box(markdown.clone()),
                    "bench",
                    &["bash"],
                    BTreeMap::new(),
                    &overrides,
                )
            });
        });
    }

    group.finish();
}

// ============================================================================
// Rewrite Benchmarks
// ============================================================================

fn bench_export_rewrite(c: &mut Criterion) {
    let content = "az group create --name $RG\nexport RG=\"rg-$(date +%s)\" && export LOCATION=eastus; echo done\n";
    c.bench_function("rewrite/export", |b| {
        b.iter(|| rewrite_export(black_box(content), "LOCATION", "west us"));
    });
}

// ============================================================================
// Verification Benchmarks
// ============================================================================

fn bench_verification(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify");

    let text = ExpectedOutput {
        language: "text".to_string(),
        content: "Resource group rg-demo created in eastus".to_string(),
        expected_similarity: 0.8,
        expected_regex: None,
    };
    group.bench_function("text", |b| {
        b.iter(|| compare(black_box("Resource group rg-demo2 created in westus"), &text));
    });

    let json = ExpectedOutput {
        language: "json".to_string(),
        content: r#"{"name": "rg-demo", "location": "eastus", "tags": {"a": 1}}"#.to_string(),
        expected_similarity: 0.9,
        expected_regex: None,
    };
    group.bench_function("json", |b| {
        b.iter(|| compare(black_box(r#"{"tags": {"a": 1}, "location": "eastus", "name": "rg-demo"}"#), &json));
    });

    group.bench_function("jaro_winkler", |b| {
        b.iter(|| jaro_winkler(black_box("Hello, World!"), black_box("Hello, Wordl!"), 0.7, 4));
    });

    group.finish();
}

// ============================================================================
// Criterion Groups and Main
// ============================================================================

criterion_group!(parsing_benches, bench_document_parsing, bench_scenario_building,);

criterion_group!(rewrite_benches, bench_export_rewrite,);

criterion_group!(verify_benches, bench_verification,);

criterion_main!(parsing_benches, rewrite_benches, verify_benches,);
