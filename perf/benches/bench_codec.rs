use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use quartz_events::{decode_command, encode_reading};
use quartz_perf::{command_corpus, make_test_reading};

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(1));

    let reading = make_test_reading(3);
    group.bench_function("encode_reading", |b| {
        b.iter(|| black_box(encode_reading(black_box(&reading))))
    });

    let readings: Vec<_> = (0..64).map(make_test_reading).collect();
    group.bench_function("encode_reading_varied", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % readings.len();
            black_box(encode_reading(&readings[i]))
        })
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(1));

    let on = br#"{"led":"on"}"#;
    group.bench_function("decode_command", |b| {
        b.iter(|| black_box(decode_command(black_box(on))))
    });

    let corpus = command_corpus();
    group.bench_function("decode_command_mixed", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % corpus.len();
            black_box(decode_command(&corpus[i]).is_ok())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
