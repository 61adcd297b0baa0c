use askdb::chart::{ChartKind, ChartRenderer, SvgRenderer, shape_chart};
use askdb::execution::{QueryResult, Value};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn sample_result(rows: i64) -> QueryResult {
    QueryResult {
        columns: vec!["day".to_string(), "region".to_string(), "sales".to_string()],
        rows: (0..rows)
            .map(|i| {
                vec![
                    Value::Text(format!("2024-01-{:02}", i % 28 + 1)),
                    Value::Text(if i % 2 == 0 { "north" } else { "south" }.to_string()),
                    if i % 10 == 0 {
                        Value::Null
                    } else {
                        Value::Real(i as f64 * 1.5)
                    },
                ]
            })
            .collect(),
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let result = sample_result(1_000);
    c.bench_function("shape_chart", |b| {
        b.iter(|| shape_chart(black_box(&result), None, None, ChartKind::Line))
    });

    let renderer = SvgRenderer::default();
    for kind in ChartKind::ALL {
        let spec = shape_chart(&result, Some("day"), Some("sales"), kind)
            .expect("sample result has a numeric column");
        c.bench_function(&format!("render_{}", kind), |b| {
            b.iter(|| renderer.render(black_box(&spec)))
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
