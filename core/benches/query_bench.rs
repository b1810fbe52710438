use criterion::{criterion_group, criterion_main, Criterion};
use docsim_core::{Document, DocumentIndex, IndexConfig};

fn corpus() -> Vec<Document> {
    let words = ["budget", "report", "meeting", "notes", "deadline", "invoice", "travel", "contract", "review", "team"];
    (0..500)
        .map(|i| {
            let content: Vec<&str> = (0..40).map(|j| words[(i * 7 + j * 3) % words.len()]).collect();
            Document::new(format!("doc-{i}"), content.join(" "))
        })
        .collect()
}

fn bench_query(c: &mut Criterion) {
    let index = DocumentIndex::build(corpus(), &IndexConfig::default());
    c.bench_function("query_500_docs", |b| b.iter(|| index.query("quarterly budget review", 6)));
}

fn bench_build(c: &mut Criterion) {
    let docs = corpus();
    c.bench_function("build_500_docs", |b| b.iter(|| DocumentIndex::build(docs.clone(), &IndexConfig::default())));
}

criterion_group!(benches, bench_query, bench_build);
criterion_main!(benches);
