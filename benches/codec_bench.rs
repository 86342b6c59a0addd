//! Benchmarks for frame encoding, segment splitting and contiguity checks
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use telemetry_client::*;

fn create_test_frame(channels: u32, samples: usize) -> Frame {
    Frame::from_pairs((0..channels).map(|key| {
        let values: Vec<f64> = (0..samples).map(|i| i as f64 * 0.5).collect();
        (key, Series::new(values))
    }))
    .unwrap()
}

fn bench_frame_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_codec");

    for (channels, samples) in [(1, 10_000), (10, 1_000), (100, 100)] {
        let frame = create_test_frame(channels, samples);
        let keys = frame.keys();
        let data_types = frame.data_types();

        group.throughput(Throughput::Bytes(FrameCodec::encoded_len(&frame) as u64));

        group.bench_function(format!("encode_{}x{}", channels, samples), |b| {
            b.iter(|| FrameCodec::encode(black_box(&frame)).unwrap())
        });

        let encoded = FrameCodec::encode(&frame).unwrap();

        group.bench_function(format!("decode_{}x{}", channels, samples), |b| {
            b.iter(|| FrameCodec::decode(black_box(&encoded), &keys, &data_types).unwrap())
        });
    }

    group.finish();
}

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment");
    let stamps = Stamps::Rate(TimeSpan::MILLISECOND);

    for size in [1_000, 100_000] {
        let series = Series::new(vec![1.5f32; size]);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("split_{}", size), |b| {
            b.iter(|| {
                let segment = Segment::new(1, TimeStamp::ZERO, series.clone(), &stamps);
                segment.split(&stamps, black_box(256)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_contiguity(c: &mut Criterion) {
    let mut group = c.benchmark_group("contiguity");
    let stamps = Stamps::Rate(TimeSpan::NANOSECOND);
    let segments: Vec<Segment> = (0..1000)
        .map(|i| Segment::new(1, TimeStamp(i * 10), Series::new(vec![0u8; 10]), &stamps))
        .collect();

    group.throughput(Throughput::Elements(segments.len() as u64));
    group.bench_function("validate_1000", |b| {
        b.iter(|| {
            let mut validator = ContiguityValidator::new(ContiguityConfig::seeding());
            for segment in &segments {
                validator.validate(black_box(segment)).unwrap();
            }
        })
    });
    group.bench_function("validate_batch_1000", |b| {
        b.iter(|| {
            let mut validator = ContiguityValidator::new(ContiguityConfig::seeding());
            validator.validate_batch(black_box(&segments)).unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_frame_codec, bench_split, bench_contiguity);
criterion_main!(benches);
