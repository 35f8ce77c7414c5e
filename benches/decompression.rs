use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use decrunch::{
    kwaj_decompress_bytes, lzss_decompress_bytes, mszip_decompress_bytes, none_decompress_bytes,
    LzssMode,
};
use std::hint::black_box;
use std::time::Duration;

fn generate_payload(size: usize, pattern: &str) -> Vec<u8> {
    match pattern {
        "text" => {
            let base = b"Lorem ipsum dolor sit amet, consectetur adipiscing elit. ";
            let mut data = Vec::with_capacity(size);
            while data.len() < size {
                data.extend_from_slice(base);
            }
            data.truncate(size);
            data
        }
        "binary" => (0..size).map(|i| ((i * 17 + 11) % 256) as u8).collect(),
        "random" => (0..size)
            .map(|i| {
                let x = i as u32;
                ((x.wrapping_mul(1664525).wrapping_add(1013904223)) % 256) as u8
            })
            .collect(),
        _ => panic!("Unknown pattern: {}", pattern),
    }
}

/// MSZIP stream of stored frames (no DEFLATE compression applied).
fn mszip_stored_stream(payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    for frame in payload.chunks(0x8000) {
        data.extend_from_slice(&[b'C', b'K', 0x01]);
        let len = frame.len() as u16;
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&(!len).to_le_bytes());
        data.extend_from_slice(frame);
    }
    data
}

/// LZSS stream of literals only.
fn lzss_literal_stream(payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    for chunk in payload.chunks(8) {
        data.push(0xFF);
        data.extend_from_slice(chunk);
    }
    data
}

/// KWAJ LZH stream: flat trees, literal runs only.
fn kwaj_literal_stream(payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut acc = 0u32;
    let mut nbits = 0u32;
    let mut push = |bytes: &mut Vec<u8>, acc: &mut u32, nbits: &mut u32, value: u32, width: u32| {
        for i in (0..width).rev() {
            *acc = (*acc << 1) | ((value >> i) & 1);
            *nbits += 1;
            if *nbits == 8 {
                bytes.push(*acc as u8);
                *acc = 0;
                *nbits = 0;
            }
        }
    };
    for _ in 0..6 {
        push(&mut bytes, &mut acc, &mut nbits, 3, 4);
    }
    for _ in 0..32 {
        push(&mut bytes, &mut acc, &mut nbits, 4, 4);
    }
    for _ in 0..32 {
        push(&mut bytes, &mut acc, &mut nbits, 5, 4);
    }
    for _ in 0..64 {
        push(&mut bytes, &mut acc, &mut nbits, 6, 4);
    }
    for _ in 0..256 {
        push(&mut bytes, &mut acc, &mut nbits, 8, 4);
    }
    for chunk in payload.chunks(32) {
        push(&mut bytes, &mut acc, &mut nbits, 0, 4);
        push(&mut bytes, &mut acc, &mut nbits, chunk.len() as u32 - 1, 5);
        for &b in chunk {
            push(&mut bytes, &mut acc, &mut nbits, u32::from(b), 8);
        }
    }
    if nbits > 0 {
        bytes.push((acc << (8 - nbits)) as u8);
    }
    bytes
}

fn decompression_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompression_throughput");
    group.measurement_time(Duration::from_secs(10));

    for size in [1024usize, 102400, 1048576].iter() {
        let size_label = match *size {
            1024 => "1KB",
            102400 => "100KB",
            1048576 => "1MB",
            _ => "unknown",
        };

        for pattern in ["text", "binary", "random"].iter() {
            let payload = generate_payload(*size, pattern);

            let mszip = mszip_stored_stream(&payload);
            group.throughput(Throughput::Bytes(*size as u64));
            group.bench_with_input(
                BenchmarkId::from_parameter(format!("mszip/{}/{}", size_label, pattern)),
                &mszip,
                |b, data| {
                    b.iter(|| {
                        mszip_decompress_bytes(black_box(data), payload.len() as u64, false)
                            .expect("Decompression failed")
                    });
                },
            );

            let lzss = lzss_literal_stream(&payload);
            group.throughput(Throughput::Bytes(*size as u64));
            group.bench_with_input(
                BenchmarkId::from_parameter(format!("lzss/{}/{}", size_label, pattern)),
                &lzss,
                |b, data| {
                    b.iter(|| {
                        lzss_decompress_bytes(black_box(data), LzssMode::Expand)
                            .expect("Decompression failed")
                    });
                },
            );

            let kwaj = kwaj_literal_stream(&payload);
            group.throughput(Throughput::Bytes(*size as u64));
            group.bench_with_input(
                BenchmarkId::from_parameter(format!("kwaj/{}/{}", size_label, pattern)),
                &kwaj,
                |b, data| {
                    b.iter(|| kwaj_decompress_bytes(black_box(data)).expect("Decompression failed"));
                },
            );
        }
    }

    group.finish();
}

fn passthrough_baseline(c: &mut Criterion) {
    let mut group = c.benchmark_group("passthrough_baseline");
    group.measurement_time(Duration::from_secs(5));

    for size in [102400usize, 1048576].iter() {
        let payload = generate_payload(*size, "binary");
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{} bytes", size)),
            &payload,
            |b, data| {
                b.iter(|| none_decompress_bytes(black_box(data)).expect("Copy failed"));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, decompression_throughput, passthrough_baseline);
criterion_main!(benches);
