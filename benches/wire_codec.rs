use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use gridgate::wire;

const PAIR_COUNTS: &[usize] = &[4, 16, 64];

fn sample_text(pairs: usize) -> String {
    (0..pairs)
        .map(|i| format!("key{i}=value{i}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn sample_map(pairs: usize) -> BTreeMap<String, String> {
    (0..pairs)
        .map(|i| (format!("key{i}"), format!("value {i} & more")))
        .collect()
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for &pairs in PAIR_COUNTS {
        let text = sample_text(pairs);
        group.bench_with_input(BenchmarkId::from_parameter(pairs), &text, |b, text| {
            b.iter(|| wire::decode(black_box(text)));
        });
    }
    group.finish();
}

fn bench_encode_escaped(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_escaped");
    for &pairs in PAIR_COUNTS {
        let map = sample_map(pairs);
        group.bench_with_input(BenchmarkId::from_parameter(pairs), &map, |b, map| {
            b.iter(|| wire::encode(&wire::escape_map(black_box(map))));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode, bench_encode_escaped);
criterion_main!(benches);
