//! Protocol state machine throughput benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mywire_protocol::constants::{capabilities, column_type, status};
use mywire_protocol::{
    Command, EofPacket, FieldPacket, HandshakeOptions, HandshakePacket, OkPacket, Output, Packet,
    Protocol, RawPacket, ResultSetHeaderPacket, RowPacket,
};

fn raw(sequence_id: u8, packet: &Packet) -> RawPacket {
    RawPacket {
        sequence_id,
        frames: 1,
        payload: packet.to_payload(),
    }
}

fn connected() -> Protocol {
    let mut protocol = Protocol::new(HandshakeOptions {
        user: "bench".to_string(),
        password: "secret".to_string(),
        charset: 33,
        ..Default::default()
    });
    protocol.start_handshake().unwrap();
    let greeting = Packet::Handshake(HandshakePacket {
        protocol_version: 10,
        server_version: "8.0.36".to_string(),
        thread_id: 1,
        scramble: (1..=20).collect(),
        server_capabilities: capabilities::DEFAULT_CLIENT_FLAGS,
        server_charset: 33,
        server_status: status::SERVER_STATUS_AUTOCOMMIT,
        auth_plugin_name: Some("mysql_native_password".to_string()),
    });
    protocol.receive(raw(0, &greeting)).unwrap();
    protocol
        .receive(raw(2, &Packet::Ok(OkPacket::default())))
        .unwrap();
    protocol
}

/// Response packets for a result set of `rows` rows and `columns` columns.
fn result_set(columns: usize, rows: usize) -> Vec<RawPacket> {
    let mut packets = Vec::with_capacity(columns + rows + 3);
    let mut seq = 1u8;
    let mut push = |packet: Packet| {
        packets.push(raw(seq, &packet));
        seq = seq.wrapping_add(1);
    };

    push(Packet::ResultSetHeader(ResultSetHeaderPacket {
        field_count: columns as u64,
    }));
    for i in 0..columns {
        push(Packet::Field(FieldPacket {
            catalog: "def".to_string(),
            name: format!("c{}", i),
            charset_nr: 33,
            column_type: column_type::VAR_STRING,
            ..Default::default()
        }));
    }
    push(Packet::Eof(EofPacket::default()));
    let value = Bytes::from_static(b"0123456789abcdef");
    for _ in 0..rows {
        push(Packet::Row(RowPacket::new(vec![Some(value.clone()); columns])));
    }
    push(Packet::Eof(EofPacket {
        warning_count: 0,
        server_status: status::SERVER_STATUS_AUTOCOMMIT,
    }));
    packets
}

fn bench_result_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("machine_result_set");

    for rows in [1, 100, 10_000] {
        let packets = result_set(8, rows);

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &packets, |b, packets| {
            let mut protocol = connected();
            let command = Command::Query("SELECT * FROM bench".to_string());
            b.iter(|| {
                black_box(protocol.start(&command).unwrap());
                let mut events = 0usize;
                for packet in packets {
                    for output in protocol.receive(packet.clone()).unwrap() {
                        if let Output::Event(event) = output {
                            black_box(event);
                            events += 1;
                        }
                    }
                }
                events
            });
        });
    }

    group.finish();
}

fn bench_ping(c: &mut Criterion) {
    let mut protocol = connected();
    let ok = raw(1, &Packet::Ok(OkPacket::default()));

    c.bench_function("machine_ping", |b| {
        b.iter(|| {
            black_box(protocol.start(&Command::Ping).unwrap());
            black_box(protocol.receive(ok.clone()).unwrap())
        });
    });
}

criterion_group!(benches, bench_result_set, bench_ping);
criterion_main!(benches);
