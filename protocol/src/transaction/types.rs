//! Core type definitions for chaincode transactions.
//!
//! The chaincode specs here are what applications hand to the client; the
//! [`super::builder::Transaction`] is what goes on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// TransactionType
// ---------------------------------------------------------------------------

/// The intent a transaction carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Install and instantiate chaincode.
    ChaincodeDeploy,
    /// State-changing chaincode call.
    ChaincodeInvoke,
    /// Read-only chaincode call.
    ChaincodeQuery,
}

impl TransactionType {
    /// Stable one-byte code used in the canonical encoding.
    pub fn code(&self) -> u8 {
        match self {
            Self::ChaincodeDeploy => 1,
            Self::ChaincodeInvoke => 2,
            Self::ChaincodeQuery => 3,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChaincodeDeploy => write!(f, "ChaincodeDeploy"),
            Self::ChaincodeInvoke => write!(f, "ChaincodeInvoke"),
            Self::ChaincodeQuery => write!(f, "ChaincodeQuery"),
        }
    }
}

// ---------------------------------------------------------------------------
// ConfidentialityLevel
// ---------------------------------------------------------------------------

/// Whether a transaction's payload must be sealed from unauthorized readers.
///
/// Chosen on the chaincode spec; the builder copies it onto the transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfidentialityLevel {
    #[default]
    Public,
    Confidential,
}

impl ConfidentialityLevel {
    pub fn code(&self) -> u8 {
        match self {
            Self::Public => 0,
            Self::Confidential => 1,
        }
    }
}

impl fmt::Display for ConfidentialityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "PUBLIC"),
            Self::Confidential => write!(f, "CONFIDENTIAL"),
        }
    }
}

// ---------------------------------------------------------------------------
// Chaincode specs
// ---------------------------------------------------------------------------

/// Language/packaging of a chaincode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChaincodeType {
    #[default]
    Undefined,
    Golang,
    Node,
    Car,
    Java,
}

/// Identifies a chaincode by source path and/or deployed name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChaincodeId {
    pub path: String,
    pub name: String,
}

impl ChaincodeId {
    pub fn named(name: &str) -> Self {
        Self {
            path: String::new(),
            name: name.to_string(),
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }
}

/// Function name and arguments, as raw byte strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeInput {
    pub args: Vec<Vec<u8>>,
}

impl ChaincodeInput {
    pub fn from_strs<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            args: args
                .into_iter()
                .map(|a| a.as_ref().as_bytes().to_vec())
                .collect(),
        }
    }
}

/// Everything an application says about a chaincode call.
///
/// ```rust
/// use sealtx_protocol::transaction::types::{ChaincodeId, ChaincodeSpec, ChaincodeType};
///
/// let spec = ChaincodeSpec::new(ChaincodeType::Golang, ChaincodeId::named("mycc"))
///     .args(["invoke", "a", "b", "10"])
///     .metadata(b"app-data".to_vec())
///     .confidential();
/// assert!(spec.is_confidential());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeSpec {
    pub chaincode_type: ChaincodeType,
    pub chaincode_id: ChaincodeId,
    pub input: ChaincodeInput,
    pub confidentiality_level: ConfidentialityLevel,
    /// Raw application metadata. May be replaced by ABAC-encoded metadata
    /// on the built transaction.
    pub metadata: Vec<u8>,
}

impl ChaincodeSpec {
    pub fn new(chaincode_type: ChaincodeType, chaincode_id: ChaincodeId) -> Self {
        Self {
            chaincode_type,
            chaincode_id,
            ..Self::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.input = ChaincodeInput::from_strs(args);
        self
    }

    pub fn metadata(mut self, metadata: Vec<u8>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn confidentiality(mut self, level: ConfidentialityLevel) -> Self {
        self.confidentiality_level = level;
        self
    }

    /// Shorthand for `confidentiality(ConfidentialityLevel::Confidential)`.
    pub fn confidential(self) -> Self {
        self.confidentiality(ConfidentialityLevel::Confidential)
    }

    pub fn is_confidential(&self) -> bool {
        self.confidentiality_level == ConfidentialityLevel::Confidential
    }
}

/// A chaincode spec plus the code to deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeDeploymentSpec {
    pub chaincode_spec: ChaincodeSpec,
    pub code_package: Vec<u8>,
    /// Unix milliseconds from which the deployment takes effect.
    pub effective_date_ms: Option<u64>,
}

impl ChaincodeDeploymentSpec {
    pub fn new(chaincode_spec: ChaincodeSpec, code_package: Vec<u8>) -> Self {
        Self {
            chaincode_spec,
            code_package,
            effective_date_ms: None,
        }
    }

    pub fn effective_from(mut self, unix_ms: u64) -> Self {
        self.effective_date_ms = Some(unix_ms);
        self
    }
}

/// A chaincode spec for an invoke or query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeInvocationSpec {
    pub chaincode_spec: ChaincodeSpec,
    /// How the network derives ids for this invocation; empty means the
    /// caller-supplied transaction id is used as is.
    pub id_generation_alg: String,
}

impl ChaincodeInvocationSpec {
    pub fn new(chaincode_spec: ChaincodeSpec) -> Self {
        Self {
            chaincode_spec,
            id_generation_alg: String::new(),
        }
    }

    pub fn id_generation_alg(mut self, alg: &str) -> Self {
        self.id_generation_alg = alg.to_string();
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
