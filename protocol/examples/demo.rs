//! Walkthrough of the transaction lifecycle.
//!
//! Enrolls a client, builds a public invoke signed with the enrollment
//! certificate, a confidential ABAC-bound invoke signed with a transient
//! certificate, ships both over the wire encoding, verifies them, and shows
//! a tampered copy being rejected.
//!
//! Run with:
//!   cargo run --example demo --release

use std::sync::Arc;
use std::time::Instant;

use sealtx_protocol::abac::AttributeBindingEncoder;
use sealtx_protocol::client::Client;
use sealtx_protocol::config::SecurityConfig;
use sealtx_protocol::identity::{Credential, EnrollmentCredential, TransientCertificate};
use sealtx_protocol::transaction::{
    verify_transaction, AesGcmEngine, ChaincodeId, ChaincodeInvocationSpec, ChaincodeSpec,
    ChaincodeType, ConfidentialityEngine, Transaction,
};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn step(n: usize, title: &str) {
    println!();
    println!("{BOLD}{CYAN}[{n}] {title}{RESET}");
}

fn field(name: &str, value: impl std::fmt::Display) {
    println!("    {DIM}{name:<22}{RESET} {value}");
}

fn short_hex(bytes: &[u8]) -> String {
    let h = hex::encode(bytes);
    if h.len() > 24 {
        format!("{}…{}", &h[..12], &h[h.len() - 12..])
    } else {
        h
    }
}

fn show(tx: &Transaction) {
    field("txid", &tx.txid);
    field("type", tx.tx_type);
    field("confidentiality", tx.confidentiality_level);
    field(
        "protocol version",
        tx.confidentiality_protocol_version.as_deref().unwrap_or("-"),
    );
    field("nonce", short_hex(&tx.nonce));
    field("payload", format!("{} bytes", tx.payload.len()));
    field("cert", tx.cert.as_deref().map(short_hex).unwrap_or_default());
    field(
        "signature",
        tx.signature.as_deref().map(short_hex).unwrap_or_default(),
    );
}

fn verdict(tx: &Transaction) {
    match verify_transaction(tx) {
        Ok(signer) => println!(
            "    {GREEN}✔ valid{RESET}, signed by {}",
            signer.subject_cn.unwrap_or_else(|| signer.fingerprint[..16].to_string())
        ),
        Err(e) => println!("    {RED}✘ rejected{RESET}: {e}"),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    let chain_key = [0x42u8; 32];

    step(1, "Enroll");
    let ecert = EnrollmentCredential::issue("alice")?;
    let client = Client::builder(ecert)
        .config(SecurityConfig {
            abac_enabled: true,
            ..SecurityConfig::default()
        })
        .confidentiality_engine(Arc::new(AesGcmEngine::new(chain_key)))
        .build()?;
    field("abac", client.config().abac_enabled);

    step(2, "Public invoke, enrollment certificate");
    let spec = ChaincodeInvocationSpec::new(
        ChaincodeSpec::new(ChaincodeType::Golang, ChaincodeId::named("example02"))
            .args(["invoke", "a", "b", "10"]),
    );
    // ABAC needs a transient certificate, so the ecert flow runs on a
    // client without it.
    let plain = Client::builder(EnrollmentCredential::issue("alice")?).build()?;
    let public = plain.new_chaincode_execute_using_ecert(&spec, "demo-1", None)?;
    show(&public);
    verdict(&public);

    step(3, "Confidential invoke, transient certificate, ABAC");
    let tcert = TransientCertificate::issue("alice-tcert-0", [0x17; 32])?;
    let attributes = vec!["role".to_string(), "dept".to_string()];
    let mut confidential_spec = spec.clone();
    confidential_spec.chaincode_spec = confidential_spec
        .chaincode_spec
        .metadata(b"invoice-7731".to_vec())
        .confidential();
    let sealed = client.new_chaincode_execute_using_tcert(
        &confidential_spec,
        "demo-2",
        &attributes,
        &tcert,
        None,
    )?;
    show(&sealed);

    step(4, "Over the wire");
    let wire = sealed.to_wire_bytes()?;
    field("wire bytes", wire.len());
    let received = Transaction::from_wire_bytes(&wire)?;
    verdict(&received);

    step(5, "Unseal and check attribute bindings");
    let mut opened = received.clone();
    AesGcmEngine::new(chain_key).unseal_transaction(&mut opened)?;
    let call = opened.invocation_spec()?;
    let args: Vec<String> = call
        .chaincode_spec
        .input
        .args
        .iter()
        .map(|a| String::from_utf8_lossy(a).into_owned())
        .collect();
    field("chaincode", &call.chaincode_spec.chaincode_id.name);
    field("args", args.join(" "));
    let metadata = AttributeBindingEncoder::decode(&opened.metadata)?;
    field("attributes", metadata.attribute_names().join(", "));
    field(
        "bindings hold",
        AttributeBindingEncoder::verify_bindings(&metadata, tcert.certificate(), tcert.derived_key()),
    );

    step(6, "Tampering");
    let mut tampered = received;
    if let Some(byte) = tampered.payload.first_mut() {
        *byte ^= 0x01;
    }
    verdict(&tampered);

    client.shutdown();
    plain.shutdown();
    println!();
    println!("{DIM}done in {:.1?}{RESET}", started.elapsed());
    Ok(())
}
