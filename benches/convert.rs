//! Benchmarks for the conversion kernel.
//!
//! Run with:
//!   cargo bench -- convert

use aperture::{ArrayPool, DataType, Dimension};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

/// Common detector frame sizes to benchmark.
const FRAME_SIZES: &[(usize, usize, &str)] = &[
    (512, 512, "512x512"),
    (1024, 1024, "1024x1024"),
    (2048, 2048, "2048x2048"),
];

fn make_frame(pool: &ArrayPool, width: usize, height: usize) -> aperture::Array {
    let mut frame = pool.alloc(&[width, height], DataType::UInt16, 0).unwrap();
    let data = frame.elements_mut::<u16>().unwrap();
    for (i, value) in data.iter_mut().enumerate() {
        *value = (i % 4096) as u16;
    }
    frame
}

fn bench_type_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert_type");
    let pool = ArrayPool::default();

    for &(width, height, name) in FRAME_SIZES {
        let frame = make_frame(&pool, width, height);
        let template = [Dimension::new(width), Dimension::new(height)];

        group.throughput(Throughput::Bytes((width * height * 2) as u64));
        group.bench_with_input(BenchmarkId::new("u16_to_f32", name), &frame, |b, frame| {
            b.iter(|| {
                let out = pool.convert(frame, &template, DataType::Float32).unwrap();
                std::hint::black_box(&out);
            });
        });
    }

    group.finish();
}

fn bench_binning(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert_bin");
    let pool = ArrayPool::default();

    for &(width, height, name) in FRAME_SIZES {
        let frame = make_frame(&pool, width, height);
        let template = [
            Dimension {
                size: width,
                offset: 0,
                binning: 2,
                reverse: false,
            },
            Dimension {
                size: height,
                offset: 0,
                binning: 2,
                reverse: false,
            },
        ];

        group.throughput(Throughput::Bytes((width * height * 2) as u64));
        group.bench_with_input(BenchmarkId::new("bin_2x2_u32", name), &frame, |b, frame| {
            b.iter(|| {
                let out = pool.convert(frame, &template, DataType::UInt32).unwrap();
                std::hint::black_box(&out);
            });
        });
    }

    group.finish();
}

fn bench_byte_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert_copy");
    let pool = ArrayPool::default();

    for &(width, height, name) in FRAME_SIZES {
        let frame = make_frame(&pool, width, height);
        let template = [Dimension::new(width), Dimension::new(height)];

        group.throughput(Throughput::Bytes((width * height * 2) as u64));
        group.bench_with_input(BenchmarkId::new("identity", name), &frame, |b, frame| {
            b.iter(|| {
                let out = pool.convert(frame, &template, DataType::UInt16).unwrap();
                std::hint::black_box(&out);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_type_conversion, bench_binning, bench_byte_copy);
criterion_main!(benches);
