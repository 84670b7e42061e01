//! Benchmarks for patch reassembly, verification and application

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lora_ota_update::delta::{DigestAlgorithm, compress_patch, decompress_patch, verify_checksum};
use lora_ota_update::text_patch;

fn source_text(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("value_{i} = compute({i}, 'lora')\n"))
        .collect()
}

fn bench_decompress(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompress");

    for lines in [10, 100, 1000].iter() {
        let text = source_text(*lines);
        let compressed = compress_patch(text.as_bytes()).expect("Compression failed");

        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &compressed, |b, data| {
            b.iter(|| decompress_patch("bench.py", data).expect("Decompression failed"));
        });
    }

    group.finish();
}

fn bench_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("digest");

    for lines in [10, 100, 1000].iter() {
        let text = source_text(*lines);
        let sha1 = DigestAlgorithm::Sha1.hex_digest(text.as_bytes());

        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("sha1_verify", lines), &text, |b, text| {
            b.iter(|| verify_checksum("bench.py", text.as_bytes(), &sha1).expect("Checksum failed"));
        });
        group.bench_with_input(BenchmarkId::new("sha256", lines), &text, |b, text| {
            b.iter(|| DigestAlgorithm::Sha256.hex_digest(text.as_bytes()));
        });
    }

    group.finish();
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_patch");

    for lines in [10, 100, 1000].iter() {
        let old = source_text(*lines);
        let new = old.replacen("'lora'", "'lorawan'", 1);
        let patch = text_patch::make_patch(&old, &new);
        let hunks = text_patch::parse(&patch).expect("Patch parse failed");

        group.throughput(Throughput::Bytes(old.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", lines), &patch, |b, patch| {
            b.iter(|| text_patch::parse(patch).expect("Patch parse failed"));
        });
        group.bench_with_input(BenchmarkId::new("apply", lines), &old, |b, old| {
            b.iter(|| text_patch::apply(&hunks, old));
        });

        // Server positions drift when the device file has an extra header.
        let drifted = format!("# local edit\n{old}");
        group.bench_with_input(
            BenchmarkId::new("apply_drifted", lines),
            &drifted,
            |b, drifted| {
                b.iter(|| text_patch::apply(&hunks, drifted));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_decompress, bench_digest, bench_apply);
criterion_main!(benches);
