// Signing & verification benchmarks for escrow request authentication.
//
// Covers Ed25519 keypair generation, canonical message construction, the
// node's verify_caller path, and the hashlock digest at various sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use htlc_protocol::crypto::signatures::{canonical_message, sign, verify, verify_caller};
use htlc_protocol::crypto::{sha256_array, sha256_multi, HtlcKeypair};

const CONTRACT_ID: &str = "5f1d0c7a2b9e8d3c4a6f0e1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f";

fn bench_keypair_generation(c: &mut Criterion) {
    c.bench_function("ed25519/keypair_generate", |b| {
        b.iter(HtlcKeypair::generate);
    });
}

fn bench_sign_and_verify(c: &mut Criterion) {
    let keypair = HtlcKeypair::generate();
    let message = canonical_message("refund", &[CONTRACT_ID], 42);
    let signature = sign(&keypair, &message);
    let public_key = keypair.public_key();

    c.bench_function("ed25519/sign_request", |b| {
        b.iter(|| sign(&keypair, &message));
    });
    c.bench_function("ed25519/verify_request", |b| {
        b.iter(|| verify(&public_key, &message, &signature));
    });
}

fn bench_verify_caller(c: &mut Criterion) {
    let keypair = HtlcKeypair::generate();
    let caller = keypair.address();
    let preimage = "00".repeat(32);
    let message = canonical_message("withdraw", &[CONTRACT_ID, &preimage], 7);
    let signature = keypair.sign(&message).to_hex();

    c.bench_function("auth/verify_caller", |b| {
        b.iter(|| verify_caller(&caller, &message, &signature).unwrap());
    });
    c.bench_function("auth/canonical_message", |b| {
        b.iter(|| canonical_message("withdraw", &[CONTRACT_ID, &preimage], 7));
    });
}

fn bench_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("sha256");

    for size in [32usize, 256, 4096] {
        let data = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("digest", size), &data, |b, data| {
            b.iter(|| sha256_array(data));
        });
    }

    let (sender, receiver) = (b"alice".as_slice(), b"bob".as_slice());
    group.bench_function("multi_part_id", |b| {
        b.iter(|| sha256_multi(&[sender, &[0], receiver, &[0], b"native", &[0], &[0; 48]]));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_keypair_generation,
    bench_sign_and_verify,
    bench_verify_caller,
    bench_hashing
);
criterion_main!(benches);
