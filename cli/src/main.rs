// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # sealtx
//!
//! Entry point for the `sealtx` binary. Parses CLI arguments, initializes
//! logging, and runs one command:
//!
//! - `enroll`  — generate an enrollment key and self-signed certificate
//! - `deploy`  — build and sign a deploy transaction
//! - `invoke`  — build and sign an invoke transaction
//! - `query`   — build and sign a query transaction
//! - `verify`  — decode and verify a wire transaction
//! - `version` — print build version information
//!
//! Every command prints a single JSON document on stdout. Logs go to stderr.

mod cli;
mod logging;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;

use sealtx_protocol::channel::{ChannelProvider, InsecureTcpFetcher, TlsRootStore};
use sealtx_protocol::client::Client;
use sealtx_protocol::config::{
    SecurityConfig, CONFIDENTIALITY_PROTOCOL_VERSION, DERIVED_KEY_LENGTH,
};
use sealtx_protocol::crypto::{issue_self_signed, Keypair, NonceSource, OsNonceSource};
use sealtx_protocol::identity::{EnrollmentCredential, TransientCertificate};
use sealtx_protocol::transaction::{
    verify_transaction, AesGcmEngine, ChaincodeDeploymentSpec, ChaincodeId,
    ChaincodeInvocationSpec, ChaincodeSpec, ConfidentialityEngine, Transaction, TransactionType,
};

use cli::{Commands, SealtxCli};
use logging::LogFormat;

fn main() -> Result<()> {
    let cli = SealtxCli::parse();
    logging::init_logging(&cli.log_level, LogFormat::from_str_lossy(&cli.log_format));

    match cli.command {
        Commands::Enroll(args) => enroll(args),
        Commands::Deploy(args) => deploy(args),
        Commands::Invoke(args) => {
            let spec = ChaincodeInvocationSpec::new(chaincode_spec(&args));
            run_transaction(&args, Request::Invoke(spec))
        }
        Commands::Query(args) => {
            let spec = ChaincodeInvocationSpec::new(chaincode_spec(&args));
            run_transaction(&args, Request::Query(spec))
        }
        Commands::Verify(args) => verify(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// enroll
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct EnrollSummary {
    subject: String,
    public_key: String,
    certificate: PathBuf,
    secret_key: PathBuf,
}

fn enroll(args: cli::EnrollArgs) -> Result<()> {
    for path in [&args.cert_out, &args.key_out] {
        if path.exists() && !args.force {
            bail!("{} already exists (pass --force to overwrite)", path.display());
        }
    }

    let keypair = Keypair::generate();
    let issued = issue_self_signed(&keypair, &args.name)
        .with_context(|| format!("failed to issue certificate for {}", args.name))?;

    write_file(&args.cert_out, issued.pem.as_bytes())?;
    write_file(&args.key_out, keypair.secret_key_hex().as_bytes())?;
    restrict_permissions(&args.key_out)?;

    tracing::info!(
        subject = %args.name,
        cert = %args.cert_out.display(),
        "enrollment credential written"
    );

    print_json(&EnrollSummary {
        subject: args.name,
        public_key: keypair.public_key().to_hex(),
        certificate: args.cert_out,
        secret_key: args.key_out,
    })
}

// ---------------------------------------------------------------------------
// deploy / invoke / query
// ---------------------------------------------------------------------------

enum Request {
    Deploy(ChaincodeDeploymentSpec),
    Invoke(ChaincodeInvocationSpec),
    Query(ChaincodeInvocationSpec),
}

#[derive(Serialize)]
struct TransactionSummary {
    txid: String,
    tx_type: String,
    confidentiality_level: String,
    confidentiality_protocol_version: Option<String>,
    nonce: String,
    signer: &'static str,
    certificate_fingerprint: String,
    wire_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    out: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wire_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    submitted_to: Option<String>,
}

fn chaincode_spec(args: &cli::TxArgs) -> ChaincodeSpec {
    let mut spec = ChaincodeSpec::new(args.language.into(), ChaincodeId::named(&args.chaincode))
        .args(&args.args);
    if let Some(metadata) = &args.metadata {
        spec = spec.metadata(metadata.as_bytes().to_vec());
    }
    if args.confidential {
        spec = spec.confidential();
    }
    spec
}

fn deploy(args: cli::DeployArgs) -> Result<()> {
    let mut spec = chaincode_spec(&args.tx);
    if let Some(path) = &args.path {
        spec.chaincode_id = spec.chaincode_id.with_path(path);
    }
    let code_package = match &args.code_package {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read code package {}", path.display()))?,
        None => Vec::new(),
    };
    run_transaction(
        &args.tx,
        Request::Deploy(ChaincodeDeploymentSpec::new(spec, code_package)),
    )
}

fn run_transaction(args: &cli::TxArgs, request: Request) -> Result<()> {
    let config = security_config(&args.security)?;

    let enrollment = EnrollmentCredential::load(&args.cert, &args.key).with_context(|| {
        format!(
            "failed to load enrollment credential ({}, {})",
            args.cert.display(),
            args.key.display()
        )
    })?;

    let mut builder = Client::builder(enrollment).config(config.clone());
    if let Some(chain_key) = &args.chain_key {
        builder = builder.confidentiality_engine(Arc::new(AesGcmEngine::new(parse_key(chain_key)?)));
    }
    let client = builder.build().context("invalid security configuration")?;

    let txid = args
        .txid
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let nonce = args
        .nonce
        .as_deref()
        .map(hex::decode)
        .transpose()
        .context("--nonce is not valid hex")?;
    let nonce = nonce.as_deref();

    let (tx, signer) = if args.tcert {
        let tcert = issue_transient_certificate(&txid)?;
        let attrs = &args.attributes;
        let tx = match &request {
            Request::Deploy(spec) => {
                client.new_chaincode_deploy_using_tcert(spec, &txid, attrs, &tcert, nonce)
            }
            Request::Invoke(spec) => {
                client.new_chaincode_execute_using_tcert(spec, &txid, attrs, &tcert, nonce)
            }
            Request::Query(spec) => {
                client.new_chaincode_query_using_tcert(spec, &txid, attrs, &tcert, nonce)
            }
        };
        (tx, "tcert")
    } else {
        if !args.attributes.is_empty() {
            tracing::warn!("--attributes ignored without --tcert");
        }
        let tx = match &request {
            Request::Deploy(spec) => client.new_chaincode_deploy_using_ecert(spec, &txid, nonce),
            Request::Invoke(spec) => client.new_chaincode_execute_using_ecert(spec, &txid, nonce),
            Request::Query(spec) => client.new_chaincode_query_using_ecert(spec, &txid, nonce),
        };
        (tx, "ecert")
    };
    let tx = tx.with_context(|| format!("failed to build transaction {txid}"))?;

    let signer_cert = client
        .check_transaction(&tx)
        .with_context(|| format!("freshly signed transaction {txid} does not verify"))?;
    client.shutdown();

    let wire = tx.to_wire_bytes().context("failed to encode transaction")?;
    if let Some(out) = &args.out {
        write_file(out, &wire)?;
    }

    let submitted_to = match &args.security.submit {
        Some(address) => {
            submit(&config, &args.security, address, &wire)?;
            Some(address.clone())
        }
        None => None,
    };

    tracing::info!(txid = %tx.txid, tx_type = %tx.tx_type, signer, "transaction signed");

    print_json(&TransactionSummary {
        txid: tx.txid.clone(),
        tx_type: tx.tx_type.to_string(),
        confidentiality_level: tx.confidentiality_level.to_string(),
        confidentiality_protocol_version: tx.confidentiality_protocol_version.clone(),
        nonce: hex::encode(&tx.nonce),
        signer,
        certificate_fingerprint: signer_cert.fingerprint,
        wire_bytes: wire.len(),
        out: args.out.clone(),
        wire_hex: args.out.is_none().then(|| hex::encode(&wire)),
        submitted_to,
    })
}

/// Fresh self-signed transient certificate with a random derived key.
/// Stands in for the membership service's tCert batch.
fn issue_transient_certificate(txid: &str) -> Result<TransientCertificate> {
    let derived = OsNonceSource::with_length(DERIVED_KEY_LENGTH)
        .generate()
        .context("failed to draw derived key")?;
    let derived: [u8; DERIVED_KEY_LENGTH] = derived
        .as_slice()
        .try_into()
        .context("derived key has the wrong length")?;
    TransientCertificate::issue(&format!("tcert-{txid}"), derived)
        .context("failed to issue transient certificate")
}

/// Dials `address` and sends the wire transaction behind a u32 LE length.
fn submit(config: &SecurityConfig, args: &cli::SecurityArgs, address: &str, wire: &[u8]) -> Result<()> {
    let source = args.tls_root_source.as_deref().unwrap_or(address);
    let fetcher = InsecureTcpFetcher::new(source, config.dial_timeout());
    let roots =
        TlsRootStore::bootstrap(config, &fetcher).context("failed to load TLS root certificate")?;

    let provider = ChannelProvider::new(config, roots);
    let mut conn = provider
        .connect(address, &args.server_name, config.tls_enabled)
        .with_context(|| format!("failed to connect to {address}"))?;

    let len = u32::try_from(wire.len()).context("transaction too large to frame")?;
    conn.write_all(&len.to_le_bytes())
        .and_then(|_| conn.write_all(wire))
        .and_then(|_| conn.flush())
        .with_context(|| format!("failed to send transaction to {address}"))?;

    tracing::info!(address, secure = conn.is_secure(), bytes = wire.len(), "transaction submitted");
    Ok(())
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct VerifySummary {
    txid: String,
    tx_type: String,
    confidentiality_level: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    signer_subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    certificate_fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chaincode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<Vec<String>>,
}

fn verify(args: cli::VerifyArgs) -> Result<()> {
    let wire = read_input(&args.input)?;
    let tx = Transaction::from_wire_bytes(&wire).context("input is not a wire transaction")?;

    let mut summary = VerifySummary {
        txid: tx.txid.clone(),
        tx_type: tx.tx_type.to_string(),
        confidentiality_level: tx.confidentiality_level.to_string(),
        valid: false,
        signer_subject: None,
        certificate_fingerprint: None,
        error: None,
        chaincode: None,
        args: None,
    };

    match verify_transaction(&tx) {
        Ok(signer) => {
            summary.valid = true;
            summary.signer_subject = signer.subject_cn;
            summary.certificate_fingerprint = Some(signer.fingerprint);
        }
        Err(e) => summary.error = Some(e.to_string()),
    }

    if summary.valid {
        let opened = open_payload(&tx, args.chain_key.as_deref())?;
        if let Some(spec) = opened {
            summary.chaincode = Some(spec.chaincode_id.name.clone());
            summary.args = Some(
                spec.input
                    .args
                    .iter()
                    .map(|a| String::from_utf8_lossy(a).into_owned())
                    .collect(),
            );
        }
    }

    print_json(&summary)?;
    if !summary.valid {
        bail!("transaction {} failed verification", tx.txid);
    }
    Ok(())
}

/// Decodes the chaincode spec carried by `tx`, unsealing it first when it
/// is confidential. `None` when it is confidential and no key was given.
fn open_payload(tx: &Transaction, chain_key: Option<&str>) -> Result<Option<ChaincodeSpec>> {
    let mut tx = tx.clone();
    if tx.is_confidential() {
        let Some(chain_key) = chain_key else {
            return Ok(None);
        };
        AesGcmEngine::new(parse_key(chain_key)?)
            .unseal_transaction(&mut tx)
            .with_context(|| {
                format!(
                    "failed to unseal {} (protocol {})",
                    tx.txid, CONFIDENTIALITY_PROTOCOL_VERSION
                )
            })?;
    }

    let spec = match tx.tx_type {
        TransactionType::ChaincodeDeploy => tx.deployment_spec()?.chaincode_spec,
        TransactionType::ChaincodeInvoke | TransactionType::ChaincodeQuery => {
            tx.invocation_spec()?.chaincode_spec
        }
    };
    Ok(Some(spec))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn security_config(args: &cli::SecurityArgs) -> Result<SecurityConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            SecurityConfig::from_json(&raw)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => SecurityConfig::default(),
    };

    config.abac_enabled |= args.abac;
    config.tls_enabled |= args.tls;
    if args.tls_root.is_some() {
        config.tls_root_cert_path = args.tls_root.clone();
    }
    if args.server_name_override.is_some() {
        config.tls_server_name_override = args.server_name_override.clone();
    }
    if let Some(dial_timeout_ms) = args.dial_timeout_ms {
        config.dial_timeout_ms = dial_timeout_ms;
    }

    config.validate().context("invalid security configuration")?;
    Ok(config)
}

fn parse_key(hex_key: &str) -> Result<[u8; DERIVED_KEY_LENGTH]> {
    let bytes = hex::decode(hex_key.trim()).context("chain key is not valid hex")?;
    bytes
        .as_slice()
        .try_into()
        .with_context(|| format!("chain key must be {DERIVED_KEY_LENGTH} bytes, got {}", bytes.len()))
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to restrict permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to render summary")?;
    println!("{json}");
    Ok(())
}

fn print_version() {
    println!("sealtx          {}", env!("CARGO_PKG_VERSION"));
    println!("confidentiality {}", CONFIDENTIALITY_PROTOCOL_VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealtx_protocol::config::DEFAULT_DIAL_TIMEOUT_MS;
    use sealtx_protocol::transaction::ConfidentialityLevel;

    fn security_args() -> cli::SecurityArgs {
        cli::SecurityArgs {
            config: None,
            abac: false,
            tls: false,
            tls_root: None,
            tls_root_source: None,
            server_name: "localhost".into(),
            server_name_override: None,
            dial_timeout_ms: None,
            submit: None,
        }
    }

    fn tx_args(dir: &Path) -> cli::TxArgs {
        cli::TxArgs {
            cert: dir.join("ecert.pem"),
            key: dir.join("ecert.key"),
            chaincode: "mycc".into(),
            language: cli::Language::Golang,
            args: vec!["invoke".into(), "a".into(), "b".into(), "10".into()],
            metadata: Some("app".into()),
            txid: Some("cli-tx".into()),
            nonce: None,
            confidential: false,
            chain_key: None,
            tcert: false,
            attributes: vec![],
            out: Some(dir.join("tx.bin")),
            security: security_args(),
        }
    }

    fn enroll_into(dir: &Path) {
        enroll(cli::EnrollArgs {
            name: "alice".into(),
            cert_out: dir.join("ecert.pem"),
            key_out: dir.join("ecert.key"),
            force: false,
        })
        .unwrap();
    }

    #[test]
    fn enroll_refuses_to_clobber() {
        let dir = tempfile::tempdir().unwrap();
        enroll_into(dir.path());
        let again = enroll(cli::EnrollArgs {
            name: "alice".into(),
            cert_out: dir.path().join("ecert.pem"),
            key_out: dir.path().join("ecert.key"),
            force: false,
        });
        assert!(again.is_err());
    }

    #[test]
    fn invoke_writes_a_verifiable_transaction() {
        let dir = tempfile::tempdir().unwrap();
        enroll_into(dir.path());

        let args = tx_args(dir.path());
        let spec = ChaincodeInvocationSpec::new(chaincode_spec(&args));
        run_transaction(&args, Request::Invoke(spec)).unwrap();

        let wire = std::fs::read(dir.path().join("tx.bin")).unwrap();
        let tx = Transaction::from_wire_bytes(&wire).unwrap();
        assert_eq!(tx.txid, "cli-tx");
        let signer = verify_transaction(&tx).unwrap();
        assert_eq!(signer.subject_cn.as_deref(), Some("alice"));
    }

    #[test]
    fn confidential_tcert_query_opens_with_chain_key() {
        let dir = tempfile::tempdir().unwrap();
        enroll_into(dir.path());
        let chain_key = hex::encode([9u8; 32]);

        let mut args = tx_args(dir.path());
        args.confidential = true;
        args.tcert = true;
        args.chain_key = Some(chain_key.clone());
        let spec = ChaincodeInvocationSpec::new(chaincode_spec(&args));
        run_transaction(&args, Request::Query(spec)).unwrap();

        let tx = Transaction::from_wire_bytes(&std::fs::read(dir.path().join("tx.bin")).unwrap())
            .unwrap();
        assert_eq!(tx.confidentiality_level, ConfidentialityLevel::Confidential);
        assert!(open_payload(&tx, None).unwrap().is_none());

        let spec = open_payload(&tx, Some(&chain_key)).unwrap().unwrap();
        assert_eq!(spec.chaincode_id.name, "mycc");
    }

    #[test]
    fn short_chain_key_is_rejected() {
        assert!(parse_key("0011").is_err());
        assert!(parse_key(&hex::encode([1u8; 32])).is_ok());
    }

    #[test]
    fn tls_without_root_path_is_invalid() {
        let mut args = security_args();
        args.tls = true;
        assert!(security_config(&args).is_err());
    }

    #[test]
    fn config_file_dial_timeout_is_kept_without_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security.json");
        std::fs::write(&path, r#"{"dial_timeout_ms": 10000}"#).unwrap();

        let mut args = security_args();
        args.config = Some(path);
        assert_eq!(security_config(&args).unwrap().dial_timeout_ms, 10_000);

        args.dial_timeout_ms = Some(250);
        assert_eq!(security_config(&args).unwrap().dial_timeout_ms, 250);
    }

    #[test]
    fn dial_timeout_defaults_without_config_or_flag() {
        let config = security_config(&security_args()).unwrap();
        assert_eq!(config.dial_timeout_ms, DEFAULT_DIAL_TIMEOUT_MS);
    }
}
