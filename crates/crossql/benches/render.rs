use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use crossql::{Dialect, Filter, Query, Row, Value};

/// A query with `n` equality conditions, half of them in a nested OR group:
/// SELECT col0, ... FROM t WHERE col0 = ? AND ... OR (colk = ? AND ...) ORDER BY id
fn build_query(n: usize, dialect: Dialect) -> Query {
    let columns: Vec<String> = (0..n).map(|i| format!("col{i}")).collect();
    let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();

    let half = n / 2;
    let mut q = Query::new()
        .table("t")
        .dialect(dialect)
        .select(&column_refs)
        .order_by("id")
        .limit(50);
    for (i, column) in columns.iter().enumerate().take(half) {
        q = q.eq(column, i as i64);
    }
    q.or_nest(|mut c| {
        for (i, column) in columns.iter().enumerate().skip(half) {
            c = c.eq(column, i as i64);
        }
        c
    })
}

fn build_rows(rows: usize, columns: usize) -> Vec<Row> {
    (0..rows)
        .map(|r| {
            (0..columns)
                .map(|c| (format!("col{c}"), Value::Int((r * columns + c) as i64)))
                .collect()
        })
        .collect()
}

fn bench_render(c: &mut Criterion) {
    for dialect in Dialect::ALL {
        let mut group = c.benchmark_group(format!("query/render/{dialect}"));
        for n in [1, 5, 10, 50, 100] {
            let q = build_query(n, dialect);
            group.bench_with_input(BenchmarkId::from_parameter(n), &q, |b, q| {
                b.iter(|| black_box(q.render()));
            });
        }
        group.finish();
    }
}

fn bench_insert_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("query/insert_many");

    for rows in [10, 100, 500] {
        let data = build_rows(rows, 8);
        let q = Query::new().table("t").dialect(Dialect::Sqlite);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter(|| black_box(q.insert_many(data.clone())));
        });
    }

    group.finish();
}

fn bench_count_placeholders(c: &mut Criterion) {
    let mut group = c.benchmark_group("query/count_placeholders");

    for n in [10, 100] {
        let built = match build_query(n, Dialect::MySql).render() {
            Ok(built) => built,
            Err(err) => panic!("render failed: {err}"),
        };
        group.bench_with_input(BenchmarkId::from_parameter(n), &built, |b, built| {
            b.iter(|| black_box(built.placeholder_count()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_render, bench_insert_many, bench_count_placeholders);
criterion_main!(benches);
