// Signing & verification benchmarks for the transaction layer.
//
// Covers canonical encoding, transaction signing with both credential
// regimes, verification, confidential sealing, and verification throughput
// at various payload sizes.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use sealtx_protocol::identity::{EnrollmentCredential, TransientCertificate};
use sealtx_protocol::transaction::{
    canonical_bytes, sign_transaction, verify_transaction, AesGcmEngine, BuildRequest,
    ChaincodeId, ChaincodeInvocationSpec, ChaincodeSpec, ChaincodeType, ConfidentialitySealer,
    Transaction, TransactionBuilder,
};

fn invocation(payload_len: usize) -> ChaincodeInvocationSpec {
    let blob = "x".repeat(payload_len);
    ChaincodeInvocationSpec::new(
        ChaincodeSpec::new(ChaincodeType::Golang, ChaincodeId::named("mycc"))
            .args(["invoke", "a", "b", blob.as_str()]),
    )
}

fn unsigned(payload_len: usize) -> Transaction {
    TransactionBuilder::new()
        .build_execute(&invocation(payload_len), &BuildRequest::new("bench-tx"))
        .unwrap()
}

fn bench_canonical_encoding(c: &mut Criterion) {
    let tx = unsigned(256);
    c.bench_function("tx/canonical_bytes", |b| {
        b.iter(|| canonical_bytes(&tx).unwrap());
    });
}

fn bench_build_execute(c: &mut Criterion) {
    let builder = TransactionBuilder::new();
    let spec = invocation(256);
    c.bench_function("tx/build_execute", |b| {
        b.iter(|| builder.build_execute(&spec, &BuildRequest::new("bench-tx")).unwrap());
    });
}

fn bench_build_confidential(c: &mut Criterion) {
    let builder = TransactionBuilder::new().sealer(ConfidentialitySealer::new(Arc::new(
        AesGcmEngine::new([7u8; 32]),
    )));
    let mut spec = invocation(256);
    spec.chaincode_spec = spec.chaincode_spec.confidential();
    c.bench_function("tx/build_confidential", |b| {
        b.iter(|| builder.build_execute(&spec, &BuildRequest::new("bench-tx")).unwrap());
    });
}

fn bench_sign_ecert(c: &mut Criterion) {
    let ecert = EnrollmentCredential::issue("bench").unwrap();
    let tx = unsigned(256);
    c.bench_function("tx/sign_ecert", |b| {
        b.iter(|| {
            let mut tx = tx.clone();
            sign_transaction(&mut tx, &ecert).unwrap();
        });
    });
}

fn bench_sign_tcert(c: &mut Criterion) {
    let tcert = TransientCertificate::issue("bench-tcert", [1u8; 32]).unwrap();
    let tx = unsigned(256);
    c.bench_function("tx/sign_tcert", |b| {
        b.iter(|| {
            let mut tx = tx.clone();
            sign_transaction(&mut tx, &tcert).unwrap();
        });
    });
}

fn bench_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("tx/verify");
    let ecert = EnrollmentCredential::issue("bench").unwrap();

    for size in [64, 1_024, 16_384, 131_072] {
        let mut tx = unsigned(size);
        sign_transaction(&mut tx, &ecert).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &tx, |b, tx| {
            b.iter(|| verify_transaction(tx).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_canonical_encoding,
    bench_build_execute,
    bench_build_confidential,
    bench_sign_ecert,
    bench_sign_tcert,
    bench_verify,
);
criterion_main!(benches);
