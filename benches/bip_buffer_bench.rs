//! Criterion benchmark for the bip buffer
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use bipbuf::core::BipBuffer;
use bipbuf::protocol;

fn bench_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("bip_buffer");
    group.throughput(Throughput::Bytes(64));

    // Benchmark one write reservation
    group.bench_function("write_acquire_release", |b| {
        let mut buf = BipBuffer::new(65536).unwrap();
        b.iter(|| {
            match buf.write_acquire() {
                Some(dst) => {
                    let n = dst.len().min(64);
                    dst[..n].fill(black_box(0xAB));
                    buf.write_release(n);
                }
                None => {
                    let n = buf.len();
                    buf.consume(n);
                }
            }
        });
    });

    // Benchmark full cycle with wraparound
    group.bench_function("cycle_wrapping", |b| {
        let mut buf = BipBuffer::new(65536).unwrap();
        // Keep a backlog so writes alternate between tail and head
        buf.write(&[0u8; 40000]);
        let chunk = [0u8; 64];
        b.iter(|| {
            buf.write(black_box(&chunk));
            black_box(buf.read_acquire());
            buf.consume(64);
        });
    });

    group.bench_function("peek_across_regions", |b| {
        let mut buf = BipBuffer::new(1024).unwrap();
        buf.write(&[1u8; 1000]);
        buf.consume(600);
        buf.write(&[2u8; 500]);
        b.iter(|| black_box(buf.peek(black_box(700))));
    });

    group.finish();
}

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");

    // Copy helpers with different chunk sizes
    for chunk_size in [16usize, 256, 4096].iter() {
        group.throughput(Throughput::Bytes(*chunk_size as u64 * 64));
        group.bench_function(format!("copy_{}", chunk_size), |b| {
            let mut buf = BipBuffer::new(65536).unwrap();
            let data = vec![0x5Au8; *chunk_size];
            let mut out = vec![0u8; *chunk_size];
            b.iter(|| {
                for _ in 0..64 {
                    buf.write(black_box(&data));
                    black_box(buf.read(&mut out));
                }
            });
        });
    }

    group.throughput(Throughput::Elements(100));
    group.bench_function("frames_100", |b| {
        let mut buf = BipBuffer::new(8192).unwrap();
        let payload = [0u8; 48];
        let mut out = Vec::with_capacity(48);
        b.iter(|| {
            for _ in 0..100 {
                protocol::encode(&mut buf, black_box(&payload)).unwrap();
                out.clear();
                black_box(protocol::decode(&mut buf, &mut out).unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_acquire_release, bench_throughput);
criterion_main!(benches);
