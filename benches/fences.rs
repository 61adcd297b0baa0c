use askdb::translate::{build_prompt, strip_code_fences};
use criterion::{Criterion, criterion_group, criterion_main};
use itertools::Itertools;
use std::hint::black_box;

pub fn criterion_benchmark(c: &mut Criterion) {
    let reply = "```sqlite\n```sql\nSELECT region, SUM(total) AS revenue\nFROM orders\nGROUP BY region\nORDER BY revenue DESC\n```\n```";
    c.bench_function("strip_code_fences", |b| {
        b.iter(|| strip_code_fences(black_box(reply)))
    });

    let context = (0..3)
        .map(|i| {
            format!(
                "Table: table_{i}\nColumns: id (INTEGER), name (TEXT), amount (REAL), created (DATE)\n"
            )
        })
        .join("\n\n");
    c.bench_function("build_prompt", |b| {
        b.iter(|| {
            build_prompt(
                black_box("What is the total amount per name this year?"),
                black_box(&context),
            )
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
