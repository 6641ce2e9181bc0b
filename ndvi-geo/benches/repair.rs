//! Benchmarks pour la réparation et le dissolve

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geo::{Geometry, LineString, Polygon};
use ndvi_geo::{algebra, repair, FeatureCollection, Field, FieldKind, Schema, Value};

/// Grille de talhões, un sur trois en nœud papillon
fn synthetic_farm(side: usize) -> FeatureCollection {
    let schema = Schema::new(vec![
        Field::new("FAZENDA", FieldKind::Text),
        Field::new("GRIDCODE", FieldKind::Integer),
    ]);
    let mut fc = FeatureCollection::new(schema, 4326);
    let step = 0.001;

    for i in 0..side {
        for j in 0..side {
            let x = -47.8 + i as f64 * step;
            let y = -21.2 + j as f64 * step;
            let ring = if (i + j) % 3 == 0 {
                vec![(x, y), (x + step, y + step), (x + step, y), (x, y + step), (x, y)]
            } else {
                vec![(x, y), (x + step, y), (x + step, y + step), (x, y + step), (x, y)]
            };
            fc.push(
                Geometry::Polygon(Polygon::new(LineString::from(ring), vec![])),
                vec![
                    Value::from(format!("FAZ{}", i % 4)),
                    Value::Integer((j % 6 + 1) as i64),
                ],
            );
        }
    }
    fc
}

fn bench_repair(c: &mut Criterion) {
    let mut group = c.benchmark_group("repair");
    for side in [10usize, 30, 60] {
        let fc = synthetic_farm(side);
        group.throughput(Throughput::Elements(fc.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fc.len()), &fc, |b, fc| {
            b.iter(|| black_box(repair(black_box(fc))))
        });
    }
    group.finish();
}

fn bench_dissolve(c: &mut Criterion) {
    let fc = repair(&synthetic_farm(30));
    let mut group = c.benchmark_group("dissolve");
    group.sample_size(10);
    group.bench_function("by_fazenda", |b| {
        b.iter(|| black_box(algebra::dissolve(black_box(&fc), Some(&["FAZENDA"]), None)))
    });
    group.finish();
}

criterion_group!(benches, bench_repair, bench_dissolve);
criterion_main!(benches);
