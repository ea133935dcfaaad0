use criterion::{criterion_group, criterion_main, Criterion};
use larder_core::{generate_id, normalize, rank_matches, CategoryTable};
use std::hint::black_box;

fn vocabulary(size: usize) -> Vec<(String, String)> {
    let bases = [
        "thịt bò", "thịt heo", "cà chua", "hành tây", "rau muống", "nước mắm", "tỏi",
        "gừng", "sả", "bún tươi", "sữa đặc", "đậu phụ", "ớt hiểm", "tiêu đen",
    ];
    (0..size)
        .map(|i| {
            let name = format!("{} {}", bases[i % bases.len()], i);
            (generate_id(&name), normalize(&name))
        })
        .collect()
}

fn bench_text(c: &mut Criterion) {
    let table = CategoryTable::default();

    c.bench_function("text/generate_id", |b| {
        b.iter(|| black_box(generate_id(black_box("  Thịt BÒ  xay (500g) "))));
    });

    c.bench_function("category/categorize", |b| {
        b.iter(|| black_box(table.categorize(black_box("lá chanh thái sợi"))));
    });
}

fn bench_similarity_scan(c: &mut Criterion) {
    let entries = vocabulary(100);

    c.bench_function("similarity/rank_100", |b| {
        b.iter(|| {
            let matches = rank_matches(
                black_box("hành tây tím"),
                entries.iter().map(|(id, name)| (id.as_str(), name.as_str())),
                0.9,
            );
            black_box(matches.len());
        });
    });
}

criterion_group!(benches, bench_text, bench_similarity_scan);
criterion_main!(benches);
