//! Criterion benchmarks for the security schemes.
//!
//! Measures a full in-memory handshake per scheme (dominated by X25519 for
//! sec1 and the 3072-bit modular exponentiations for sec2) and the per-frame
//! cost of encrypt + decrypt on an established session.
//!
//! Run with:
//! ```bash
//! cargo bench --package rmaker-core --bench security_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rmaker_core::security::{DeviceCredentials, SecurityScheme, SessionResponder};

fn run_handshake(client: &mut SecurityScheme, device: &mut SessionResponder) {
    let mut response: Option<Vec<u8>> = None;
    while let Some(request) = client
        .handshake_step(response.as_deref())
        .expect("client step")
    {
        response = Some(device.handle(&request).expect("device step"));
    }
}

type Fixture = fn() -> (SecurityScheme, DeviceCredentials);

fn plain() -> (SecurityScheme, DeviceCredentials) {
    (SecurityScheme::plain(), DeviceCredentials::plain())
}

fn pop() -> (SecurityScheme, DeviceCredentials) {
    (
        SecurityScheme::key_exchange_pop("abcd1234"),
        DeviceCredentials::with_pop("abcd1234"),
    )
}

fn password() -> (SecurityScheme, DeviceCredentials) {
    (
        SecurityScheme::mutual_auth_password("wifiprov", "abcd1234", 1),
        DeviceCredentials::with_password("wifiprov", "abcd1234", 1),
    )
}

const FIXTURES: [(&str, Fixture); 3] = [("sec0", plain), ("sec1", pop), ("sec2", password)];

fn bench_handshake(c: &mut Criterion) {
    let mut group = c.benchmark_group("handshake");
    group.sample_size(10);
    for (label, make) in FIXTURES {
        group.bench_function(BenchmarkId::from_parameter(label), |b| {
            b.iter(|| {
                let (mut client, creds) = make();
                let mut device = SessionResponder::new(creds);
                run_handshake(&mut client, &mut device);
                black_box(client.is_established())
            })
        });
    }
    group.finish();
}

fn bench_frame(c: &mut Criterion) {
    let payload = vec![0x5a_u8; 512];
    let mut group = c.benchmark_group("frame_512b");
    for (label, make) in FIXTURES {
        let (mut client, creds) = make();
        let mut device = SessionResponder::new(creds);
        run_handshake(&mut client, &mut device);
        group.bench_function(BenchmarkId::from_parameter(label), |b| {
            b.iter(|| {
                let ct = client.encrypt(black_box(&payload)).expect("encrypt");
                black_box(device.decrypt(&ct).expect("decrypt"))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_handshake, bench_frame);
criterion_main!(benches);
