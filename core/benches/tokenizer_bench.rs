use criterion::{criterion_group, criterion_main, Criterion};
use quarry_core::tokenizer::{count_terms, tokenize};

fn bench_tokenize(c: &mut Criterion) {
    let text = "The quick brown fox, aged 3, jumps over the lazy dog! ".repeat(2_000);
    c.bench_function("tokenize_paragraphs", |b| b.iter(|| tokenize(&text)));
    c.bench_function("count_terms_paragraphs", |b| b.iter(|| count_terms(tokenize(&text))));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
