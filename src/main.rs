//! bipbuf - quick latency tour
//!
//! Measures the hot paths:
//! - Acquire/release on a heap-backed buffer
//! - The same cycle over a memory-mapped file
//! - Frame encode/decode through a wrapping buffer

use bipbuf::core::{BipBuffer, BufferOptions, MmapStorage, Storage};
use bipbuf::protocol;
use std::time::Instant;

fn main() {
    println!("🚀 bipbuf - Bipartite Circular Buffer");
    println!("=====================================\n");

    if let Err(e) = run() {
        eprintln!("❌ Benchmark failed: {}", e);
        std::process::exit(1);
    }

    println!("\n✅ All benchmarks complete!");
    println!("\nTo start the echo server: cargo run --release --bin bipbuf_echo -- --bind 0.0.0.0:9999");
}

fn run() -> Result<(), bipbuf::Error> {
    benchmark_heap()?;
    benchmark_mmap()?;
    benchmark_frames()?;
    Ok(())
}

/// Write one chunk, read it back, repeated. The chunk size does not divide
/// the capacity so the buffer keeps wrapping.
fn cycle<S: Storage>(buf: &mut BipBuffer<S>, chunk: &[u8], iterations: usize) -> f64 {
    let start = Instant::now();
    for _ in 0..iterations {
        if let Some(dst) = buf.write_acquire() {
            let n = dst.len().min(chunk.len());
            dst[..n].copy_from_slice(&chunk[..n]);
            buf.write_release(n);
        }
        if let Some(src) = buf.read_acquire() {
            let n = src.len();
            buf.read_release(n);
        }
    }
    start.elapsed().as_nanos() as f64 / iterations as f64
}

fn benchmark_heap() -> Result<(), bipbuf::Error> {
    println!("📊 Heap Bip Buffer (acquire/commit/read/release)");
    println!("-----------------------------------------------");

    const ITERATIONS: usize = 1_000_000;
    const CHUNK: usize = 100;

    let mut buf = BipBuffer::new(64 * 1024)?;
    let chunk = [0xABu8; CHUNK];

    // Warm up
    cycle(&mut buf, &chunk, 1000);

    let ns = cycle(&mut buf, &chunk, ITERATIONS);

    println!("  Chunk size: {} bytes", CHUNK);
    println!("  Operations: {}", ITERATIONS);
    println!("  Cycle latency: {:.2} ns/op ({:.3} μs/op)", ns, ns / 1000.0);
    println!(
        "  Throughput:    {:.2} MB/sec\n",
        CHUNK as f64 / ns * 1_000.0
    );

    // Keep some bytes queued so writes alternate between tail and head
    let mut buf = BipBuffer::new(64 * 1024)?;
    buf.write(&[0u8; 48 * 1024]);
    let start = Instant::now();
    let mut wraps = 0usize;
    for _ in 0..ITERATIONS {
        buf.write(&chunk);
        if !buf.regions().b.is_empty() {
            wraps += 1;
        }
        buf.consume(CHUNK.min(buf.len()));
    }
    let ns = start.elapsed().as_nanos() as f64 / ITERATIONS as f64;
    println!("  Steady-state (48KB queued): {:.2} ns/op, {} ops wrapped\n", ns, wraps);

    Ok(())
}

fn benchmark_mmap() -> Result<(), bipbuf::Error> {
    println!("📊 Mmap-backed Bip Buffer");
    println!("------------------------");

    const ITERATIONS: usize = 100_000;
    const CHUNK: usize = 64;

    let path = "bipbuf_bench.dat";
    let storage = MmapStorage::open(path, 4 * 1024 * 1024)?;
    let mut buf = BipBuffer::from_storage(storage, BufferOptions::default())?;
    let chunk = [0u8; CHUNK];

    let ns = cycle(&mut buf, &chunk, ITERATIONS);

    println!("  Chunk size: {} bytes", CHUNK);
    println!("  Operations: {}", ITERATIONS);
    println!("  Cycle latency: {:.2} ns/op ({:.3} μs/op)\n", ns, ns / 1000.0);

    drop(buf.teardown(false));
    std::fs::remove_file(path).ok();

    Ok(())
}

fn benchmark_frames() -> Result<(), bipbuf::Error> {
    println!("📊 Frame Encode/Decode (length-prefixed)");
    println!("----------------------------------------");

    const ITERATIONS: usize = 1_000_000;
    const PAYLOAD_SIZE: usize = 64;

    let mut buf = BipBuffer::new(1000)?;
    let payload = [0u8; PAYLOAD_SIZE];
    let mut out = Vec::with_capacity(PAYLOAD_SIZE);
    let mut decoded = 0usize;

    let start = Instant::now();
    for _ in 0..ITERATIONS {
        if protocol::encode(&mut buf, &payload).is_err() {
            while let Ok(true) = protocol::decode(&mut buf, &mut out) {
                out.clear();
                decoded += 1;
            }
        }
    }
    let duration = start.elapsed();

    let ns = duration.as_nanos() as f64 / ITERATIONS as f64;

    println!("  Payload size: {} bytes", PAYLOAD_SIZE);
    println!("  Encode ops: {}", ITERATIONS);
    println!("  Decoded: {}", decoded);
    println!("  Encode+decode latency: {:.2} ns/op ({:.3} μs/op)", ns, ns / 1000.0);
    println!(
        "  Throughput: {:.2} M frames/sec",
        ITERATIONS as f64 / duration.as_secs_f64() / 1_000_000.0
    );

    Ok(())
}
