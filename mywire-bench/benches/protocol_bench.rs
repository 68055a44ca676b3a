//! Framing and packet parsing benchmarks.

use bytes::{Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mywire_protocol::{auth, Decoder, Encoder, PacketReader, PacketWriter, RowPacket};

fn encoded_row(columns: usize, width: usize) -> Bytes {
    let value = "x".repeat(width);
    let mut writer = PacketWriter::new();
    for i in 0..columns {
        if i % 5 == 4 {
            writer.write_u8(0xfb);
        } else {
            writer.write_lenenc_string(&value);
        }
    }
    writer.into_inner().freeze()
}

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [100, 10_000, 0xff_ffff + 100] {
        let payload = vec![b'x'; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| black_box(Encoder::encode(payload, 0)));
        });
    }

    group.finish();
}

fn bench_packet_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_decode");

    for size in [100, 10_000, 0xff_ffff + 100] {
        let (encoded, _) = Encoder::encode(&vec![b'x'; size], 0);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                decoder.extend(encoded);
                black_box(decoder.decode_packet().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_packet_decode_chunked(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_decode_chunked");

    // Many small packets arriving in socket-sized reads.
    let mut stream = BytesMut::new();
    let mut seq = 0u8;
    for _ in 0..1000 {
        let (frame, next) = Encoder::encode(&encoded_row(4, 16), seq);
        stream.extend_from_slice(&frame);
        seq = next;
    }
    let stream = stream.freeze();

    for chunk in [512, 4096, 65536] {
        group.throughput(Throughput::Bytes(stream.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &stream, |b, stream| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                let mut packets = 0;
                for piece in stream.chunks(chunk) {
                    decoder.extend(piece);
                    while let Some(packet) = decoder.decode_packet().unwrap() {
                        black_box(&packet);
                        packets += 1;
                    }
                }
                assert_eq!(packets, 1000);
            });
        });
    }

    group.finish();
}

fn bench_row_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_parse");

    for columns in [1, 10, 50] {
        let payload = encoded_row(columns, 32);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(columns), &payload, |b, payload| {
            b.iter(|| black_box(RowPacket::parse(payload, columns).unwrap()));
        });
    }

    group.finish();
}

fn bench_lenenc(c: &mut Criterion) {
    let values = [0u64, 250, 251, 0xffff, 0x10000, 0xff_ffff, 0x100_0000, u64::MAX];
    let mut writer = PacketWriter::new();
    for &value in &values {
        writer.write_lenenc_int(value);
    }
    let encoded = writer.into_inner();

    c.bench_function("lenenc_write", |b| {
        b.iter(|| {
            let mut writer = PacketWriter::with_capacity(64);
            for &value in &values {
                writer.write_lenenc_int(black_box(value));
            }
            black_box(writer.into_inner())
        });
    });

    c.bench_function("lenenc_read", |b| {
        b.iter(|| {
            let mut reader = PacketReader::new(&encoded);
            for _ in 0..values.len() {
                black_box(reader.read_lenenc_int().unwrap());
            }
        });
    });
}

fn bench_scramble(c: &mut Criterion) {
    let seed: Vec<u8> = (1..=20).collect();

    c.bench_function("native_password", |b| {
        b.iter(|| black_box(auth::native_password(black_box("secret"), &seed)));
    });

    c.bench_function("caching_sha2_password", |b| {
        b.iter(|| black_box(auth::caching_sha2_password(black_box("secret"), &seed)));
    });
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_packet_decode,
    bench_packet_decode_chunked,
    bench_row_parse,
    bench_lenenc,
    bench_scramble,
);
criterion_main!(benches);
