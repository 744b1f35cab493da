// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # sealtx — Transaction Sealing for Permissioned Ledgers
//!
//! The client-side transaction layer of a permissioned ledger: it builds
//! chaincode transactions, binds attribute metadata to transaction
//! certificates, seals confidential payloads, signs with either a
//! per-transaction or a long-term credential, and verifies what others
//! signed.
//!
//! Ed25519 for signatures, X.509 for carrying public keys, AES-256-GCM for
//! confidential payloads, BLAKE3 and SHA-256 for derivation and
//! fingerprints. Nothing cryptographic is hand-rolled.
//!
//! ## Architecture
//!
//! - **config** — Protocol constants and [`config::SecurityConfig`].
//! - **crypto** — Keys, signatures, certificates, encryption, nonces.
//! - **identity** — Transient and enrollment credentials.
//! - **abac** — Attribute-bound transaction metadata.
//! - **transaction** — Build, seal, sign, verify.
//! - **client** — The enrolled session tying it all together.
//! - **channel** — TLS root bootstrap and dialing peers.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sealtx_protocol::client::Client;
//! use sealtx_protocol::identity::EnrollmentCredential;
//! use sealtx_protocol::transaction::*;
//!
//! let client = Client::builder(EnrollmentCredential::issue("alice").unwrap())
//!     .build()
//!     .unwrap();
//! let spec = ChaincodeInvocationSpec::new(
//!     ChaincodeSpec::new(ChaincodeType::Golang, ChaincodeId::named("mycc"))
//!         .args(["invoke", "a", "b", "10"]),
//! );
//! let tx = client.new_chaincode_execute_using_ecert(&spec, "tx-1", None).unwrap();
//! client.check_transaction(&tx).unwrap();
//! ```

pub mod abac;
pub mod channel;
pub mod client;
pub mod config;
pub mod crypto;
pub mod identity;
pub mod transaction;
