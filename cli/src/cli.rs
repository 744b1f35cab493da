//! # CLI Interface
//!
//! Defines the command-line argument structure for `sealtx` using `clap`
//! derive. Subcommands: `enroll`, `deploy`, `invoke`, `query`, `verify`
//! and `version`.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use sealtx_protocol::transaction::ChaincodeType;

/// Build, sign, submit and verify chaincode transactions.
#[derive(Parser, Debug)]
#[command(
    name = "sealtx",
    about = "Chaincode transaction client",
    version,
    propagate_version = true
)]
pub struct SealtxCli {
    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, global = true, env = "SEALTX_LOG", default_value = "sealtx=info,sealtx_protocol=warn")]
    pub log_level: String,

    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "SEALTX_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate an enrollment key and a self-signed enrollment certificate.
    Enroll(EnrollArgs),
    /// Build and sign a chaincode deploy transaction.
    Deploy(DeployArgs),
    /// Build and sign a chaincode invoke transaction.
    Invoke(TxArgs),
    /// Build and sign a chaincode query transaction.
    Query(TxArgs),
    /// Decode a wire transaction and verify its signature.
    Verify(VerifyArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct EnrollArgs {
    /// Subject common name of the certificate.
    #[arg(long, short = 'n')]
    pub name: String,

    /// Where to write the PEM certificate.
    #[arg(long, env = "SEALTX_CERT", default_value = "ecert.pem")]
    pub cert_out: PathBuf,

    /// Where to write the hex-encoded secret key.
    #[arg(long, env = "SEALTX_KEY", default_value = "ecert.key")]
    pub key_out: PathBuf,

    /// Overwrite existing files.
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub tx: TxArgs,

    /// Chaincode source path.
    #[arg(long)]
    pub path: Option<String>,

    /// File holding the chaincode code package.
    #[arg(long)]
    pub code_package: Option<PathBuf>,
}

/// Flags shared by every transaction-building command.
#[derive(Args, Debug)]
pub struct TxArgs {
    /// Enrollment certificate (PEM).
    #[arg(long, env = "SEALTX_CERT", default_value = "ecert.pem")]
    pub cert: PathBuf,

    /// Enrollment secret key (hex).
    #[arg(long, env = "SEALTX_KEY", default_value = "ecert.key")]
    pub key: PathBuf,

    /// Chaincode name.
    #[arg(long, short = 'c')]
    pub chaincode: String,

    #[arg(long, value_enum, default_value_t = Language::Golang)]
    pub language: Language,

    /// Chaincode arguments, comma separated.
    #[arg(long, short = 'a', value_delimiter = ',')]
    pub args: Vec<String>,

    /// Application metadata (UTF-8).
    #[arg(long)]
    pub metadata: Option<String>,

    /// Transaction id. A random UUID when omitted.
    #[arg(long)]
    pub txid: Option<String>,

    /// Hex nonce. Drawn from the OS generator when omitted.
    #[arg(long)]
    pub nonce: Option<String>,

    /// Seal payload, chaincode id and metadata.
    #[arg(long)]
    pub confidential: bool,

    /// Hex 32-byte chain key for the confidentiality engine.
    #[arg(long, env = "SEALTX_CHAIN_KEY")]
    pub chain_key: Option<String>,

    /// Sign with a freshly issued transient certificate instead of the
    /// enrollment certificate.
    #[arg(long)]
    pub tcert: bool,

    /// Attribute names to bind into the metadata (requires `--abac` and
    /// `--tcert`).
    #[arg(long, value_delimiter = ',')]
    pub attributes: Vec<String>,

    /// Write the wire-encoded transaction here.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    #[command(flatten)]
    pub security: SecurityArgs,
}

/// Flags mapped onto `SecurityConfig`.
#[derive(Args, Debug)]
pub struct SecurityArgs {
    /// JSON `SecurityConfig` file. Flags below are applied on top.
    #[arg(long, env = "SEALTX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable attribute-based access control.
    #[arg(long, env = "SEALTX_ABAC")]
    pub abac: bool,

    /// Dial the peer over TLS.
    #[arg(long, env = "SEALTX_TLS")]
    pub tls: bool,

    /// TLS root certificate (PEM). Fetched on first use when missing.
    #[arg(long, env = "SEALTX_TLS_ROOT")]
    pub tls_root: Option<PathBuf>,

    /// Address serving the TLS root certificate. Defaults to `--submit`.
    #[arg(long, env = "SEALTX_TLS_ROOT_SOURCE")]
    pub tls_root_source: Option<String>,

    /// Server name checked against the peer certificate.
    #[arg(long, env = "SEALTX_SERVER_NAME", default_value = "localhost")]
    pub server_name: String,

    /// Replaces `--server-name` regardless of what the caller passes.
    #[arg(long, env = "SEALTX_SERVER_NAME_OVERRIDE")]
    pub server_name_override: Option<String>,

    /// Dial timeout in milliseconds. Falls back to the config file, then
    /// to 3000.
    #[arg(long, env = "SEALTX_DIAL_TIMEOUT_MS")]
    pub dial_timeout_ms: Option<u64>,

    /// Send the signed transaction, length-prefixed, to this peer.
    #[arg(long, env = "SEALTX_PEER")]
    pub submit: Option<String>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Wire transaction file. `-` reads stdin.
    #[arg(default_value = "-")]
    pub input: PathBuf,

    /// Hex chain key; when given, confidential transactions are unsealed
    /// and their payload reported.
    #[arg(long, env = "SEALTX_CHAIN_KEY")]
    pub chain_key: Option<String>,
}

/// Chaincode language as accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Golang,
    Node,
    Car,
    Java,
}

impl From<Language> for ChaincodeType {
    fn from(language: Language) -> Self {
        match language {
            Language::Golang => ChaincodeType::Golang,
            Language::Node => ChaincodeType::Node,
            Language::Car => ChaincodeType::Car,
            Language::Java => ChaincodeType::Java,
        }
    }
}
