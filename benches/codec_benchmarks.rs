use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use riphttplib::h2::hpack::HpackCodec;
use riphttplib::types::{Frame, Header};

fn sample_headers(n: usize) -> Vec<Header> {
    let mut headers = vec![
        Header { name: ":method".to_string(), value: Some("GET".to_string()) },
        Header { name: ":scheme".to_string(), value: Some("https".to_string()) },
        Header { name: ":path".to_string(), value: Some("/".to_string()) },
        Header { name: ":authority".to_string(), value: Some("example.com".to_string()) },
    ];
    for i in 0..n {
        headers.push(Header {
            name: format!("x-custom-header-{}", i),
            value: Some(format!("value-{}", i)),
        });
    }
    headers
}

fn bench_hpack_encode(c: &mut Criterion) {
    let headers = sample_headers(20);
    c.bench_function("hpack_encode_24_headers", |b| {
        let mut codec = HpackCodec::new(4096, 4096);
        b.iter(|| {
            let encoded = codec.encode(black_box(&headers)).unwrap();
            black_box(encoded);
        });
    });
}

fn bench_hpack_decode(c: &mut Criterion) {
    let headers = sample_headers(20);
    let mut encoder = HpackCodec::new(4096, 4096);
    let encoded = encoder.encode(&headers).unwrap();

    c.bench_function("hpack_decode_24_headers", |b| {
        let mut codec = HpackCodec::new(4096, 4096);
        b.iter(|| {
            let decoded = codec.decode(black_box(&encoded)).unwrap();
            black_box(decoded);
        });
    });
}

fn bench_frame_serialize(c: &mut Criterion) {
    let payload = Bytes::from(vec![0u8; 16_384]);
    c.bench_function("frame_serialize_16kb_data", |b| {
        b.iter(|| {
            let frame = Frame::data(1, black_box(payload.clone()), false);
            black_box(frame.serialize().unwrap());
        });
    });
}

fn bench_frame_parse(c: &mut Criterion) {
    let payload = Bytes::from(vec![0u8; 16_384]);
    let wire = Frame::data(1, payload, false).serialize().unwrap();

    c.bench_function("frame_parse_16kb_data", |b| {
        b.iter(|| {
            let frame = Frame::parse(black_box(&wire)).unwrap();
            black_box(frame);
        });
    });
}

criterion_group!(
    codec_benches,
    bench_hpack_encode,
    bench_hpack_decode,
    bench_frame_serialize,
    bench_frame_parse
);
criterion_main!(codec_benches);
