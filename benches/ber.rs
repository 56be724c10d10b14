//! BER codec benchmarks.
//!
//! The codec sits on the hot path of every engine role, so encode and
//! decode cost per varbind and per message is what matters.

use std::hint::black_box;

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use snmp_engine::ber::{Decoder, EncoderFactory};
use snmp_engine::message::{CommunityMessage, Message};
use snmp_engine::pdu::Pdu;
use snmp_engine::value::Value;
use snmp_engine::varbind::VarBind;
use snmp_engine::Oid;

fn bench_varbind_encode(c: &mut Criterion) {
    let factory = EncoderFactory::new();
    let mut group = c.benchmark_group("varbind_encode");

    let varbinds: Vec<(&str, VarBind)> = vec![
        (
            "integer",
            VarBind::new(
                Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 3, 0]),
                Value::Integer(42),
            ),
        ),
        (
            "string",
            VarBind::new(
                Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]),
                Value::OctetString(Bytes::from_static(
                    b"Linux router 5.15.0-generic #123-Ubuntu SMP",
                )),
            ),
        ),
        (
            "counter64",
            VarBind::new(
                Oid::from_slice(&[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 6, 1]),
                Value::Counter64(1_000_000_000_000),
            ),
        ),
    ];

    for (name, vb) in &varbinds {
        group.bench_with_input(BenchmarkId::new("encode", name), vb, |b, vb| {
            b.iter(|| {
                let mut enc = factory.encoder();
                vb.encode(&mut enc).unwrap();
                black_box(enc.finish())
            })
        });
    }

    group.finish();
}

fn bench_varbind_decode(c: &mut Criterion) {
    let factory = EncoderFactory::new();
    let mut group = c.benchmark_group("varbind_decode");

    let varbinds: Vec<(&str, VarBind)> = vec![
        (
            "integer",
            VarBind::new(
                Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 3, 0]),
                Value::Integer(42),
            ),
        ),
        (
            "string",
            VarBind::new(
                Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]),
                Value::OctetString(Bytes::from_static(
                    b"Linux router 5.15.0-generic #123-Ubuntu SMP",
                )),
            ),
        ),
    ];

    for (name, vb) in &varbinds {
        let mut enc = factory.encoder();
        vb.encode(&mut enc).unwrap();
        let encoded = enc.finish();

        group.bench_with_input(BenchmarkId::new("decode", name), &encoded, |b, data| {
            b.iter(|| {
                let mut decoder = Decoder::new(data.clone());
                black_box(VarBind::decode(&mut decoder).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_message_roundtrip(c: &mut Criterion) {
    let factory = EncoderFactory::new();
    let mut group = c.benchmark_group("message");

    let varbinds: Vec<VarBind> = (0..10)
        .map(|i| {
            VarBind::new(
                Oid::from_slice(&[1, 3, 6, 1, 2, 1, 2, 2, 1, 2, i]),
                Value::OctetString(Bytes::from(format!("GigabitEthernet0/{}", i))),
            )
        })
        .collect();
    let mut pdu = Pdu::get_request(12345, &[]).to_response();
    pdu.varbinds = varbinds;
    let msg = CommunityMessage::v2c(&b"public"[..], pdu);
    let encoded = msg.encode(&factory).unwrap();

    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("encode_10_varbinds", |b| {
        b.iter(|| black_box(msg.encode(&factory).unwrap()))
    });
    group.bench_function("decode_10_varbinds", |b| {
        b.iter(|| black_box(Message::decode(encoded.clone()).unwrap()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_varbind_encode,
    bench_varbind_decode,
    bench_message_roundtrip,
);

criterion_main!(benches);
