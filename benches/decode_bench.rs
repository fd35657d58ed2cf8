use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sensor_stream::Schema;

fn benchmark_channel_decode(c: &mut Criterion) {
    let frame = br#"{"channel":2,"timestamp":1000,"value":3.5}"#;
    c.bench_function("decode_channel_sample", |b| {
        b.iter(|| Schema::Channel.decode(black_box(frame)))
    });
}

fn benchmark_raw_decode(c: &mut Criterion) {
    let frame = br#"{"timestamp":4000000000,"value":4095}"#;
    c.bench_function("decode_raw_sample", |b| {
        b.iter(|| Schema::Raw.decode(black_box(frame)))
    });
}

fn benchmark_csv_line(c: &mut Criterion) {
    let sample = Schema::Channel
        .decode(br#"{"channel":2,"timestamp":1000,"value":3.5}"#)
        .unwrap();
    c.bench_function("format_csv_line", |b| {
        b.iter(|| black_box(&sample).to_csv_line())
    });
}

criterion_group!(
    benches,
    benchmark_channel_decode,
    benchmark_raw_decode,
    benchmark_csv_line
);
criterion_main!(benches);
