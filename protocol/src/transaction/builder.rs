//! Transaction construction.
//!
//! [`Transaction`] is the wire object. [`TransactionBuilder`] runs the
//! construction pipeline shared by deploy, invoke and query:
//!
//! 1. construct the empty transaction from the chaincode spec and txid,
//! 2. enrich metadata (ABAC or pass-through),
//! 3. resolve the nonce (caller-supplied or freshly drawn),
//! 4. seal when the spec asks for confidentiality.
//!
//! The builder does not sign; that happens in [`super::signing`].

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::canonical::{canonical_bytes, EncodingError};
use super::confidential::ConfidentialitySealer;
use super::error::{MissingPart, Stage, TransactionError};
use super::metadata::MetadataEnricher;
use super::types::{
    ChaincodeDeploymentSpec, ChaincodeInvocationSpec, ChaincodeSpec, ConfidentialityLevel,
    TransactionType,
};
use crate::config::MIN_CALLER_NONCE_LENGTH;
use crate::crypto::nonce::{NonceSource, OsNonceSource};
use crate::identity::TransientCertificate;

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A chaincode transaction.
///
/// Mutable until signed. `cert` and `signature` are either both present
/// (signed) or both absent (unsigned); anything else is rejected by
/// verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_type: TransactionType,

    /// Encoded [`super::types::ChaincodeId`]. Ciphertext when confidential.
    pub chaincode_id: Vec<u8>,

    /// Encoded deployment or invocation spec. Ciphertext when confidential.
    pub payload: Vec<u8>,

    /// Application metadata, or its ABAC encoding.
    pub metadata: Vec<u8>,

    /// Caller-supplied transaction id.
    pub txid: String,

    /// Unix milliseconds at construction.
    pub timestamp_ms: u64,

    pub confidentiality_level: ConfidentialityLevel,

    /// Set only for confidential transactions.
    pub confidentiality_protocol_version: Option<String>,

    /// Unique per transaction; never empty once built.
    pub nonce: Vec<u8>,

    /// DER certificate of the signing credential.
    pub cert: Option<Vec<u8>>,

    /// Ed25519 signature over [`Transaction::signable_bytes`].
    pub signature: Option<Vec<u8>>,
}

impl Transaction {
    /// Empty deploy transaction for `spec`.
    pub fn deploy(spec: &ChaincodeDeploymentSpec, txid: &str) -> Result<Self, EncodingError> {
        Self::from_parts(
            TransactionType::ChaincodeDeploy,
            &spec.chaincode_spec,
            bincode::serialize(spec)?,
            txid,
        )
    }

    /// Empty invoke transaction for `spec`.
    pub fn invoke(spec: &ChaincodeInvocationSpec, txid: &str) -> Result<Self, EncodingError> {
        Self::from_parts(
            TransactionType::ChaincodeInvoke,
            &spec.chaincode_spec,
            bincode::serialize(spec)?,
            txid,
        )
    }

    /// Empty query transaction for `spec`.
    pub fn query(spec: &ChaincodeInvocationSpec, txid: &str) -> Result<Self, EncodingError> {
        Self::from_parts(
            TransactionType::ChaincodeQuery,
            &spec.chaincode_spec,
            bincode::serialize(spec)?,
            txid,
        )
    }

    fn from_parts(
        tx_type: TransactionType,
        spec: &ChaincodeSpec,
        payload: Vec<u8>,
        txid: &str,
    ) -> Result<Self, EncodingError> {
        Ok(Self {
            tx_type,
            chaincode_id: bincode::serialize(&spec.chaincode_id)?,
            payload,
            metadata: Vec::new(),
            txid: txid.to_string(),
            timestamp_ms: unix_millis(Utc::now().timestamp_millis()),
            confidentiality_level: ConfidentialityLevel::Public,
            confidentiality_protocol_version: None,
            nonce: Vec::new(),
            cert: None,
            signature: None,
        })
    }

    /// The bytes that get signed: every field except `signature`, in
    /// canonical order. See [`super::canonical`].
    pub fn signable_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        canonical_bytes(self)
    }

    /// Serialized form handed to the network layer.
    pub fn to_wire_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_wire_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// `true` once both `cert` and `signature` are attached.
    pub fn is_signed(&self) -> bool {
        self.cert.is_some() && self.signature.is_some()
    }

    pub fn is_confidential(&self) -> bool {
        self.confidentiality_level == ConfidentialityLevel::Confidential
    }

    /// Which half of the credential pair is absent, if any.
    pub fn missing_credential(&self) -> Option<MissingPart> {
        match (&self.cert, &self.signature) {
            (Some(_), Some(_)) => None,
            (None, None) => Some(MissingPart::Both),
            (None, Some(_)) => Some(MissingPart::Certificate),
            (Some(_), None) => Some(MissingPart::Signature),
        }
    }

    /// Decodes the invocation spec from a public invoke/query payload.
    pub fn invocation_spec(&self) -> Result<ChaincodeInvocationSpec, EncodingError> {
        Ok(bincode::deserialize(&self.payload)?)
    }

    /// Decodes the deployment spec from a public deploy payload.
    pub fn deployment_spec(&self) -> Result<ChaincodeDeploymentSpec, EncodingError> {
        Ok(bincode::deserialize(&self.payload)?)
    }
}

// ---------------------------------------------------------------------------
// BuildRequest
// ---------------------------------------------------------------------------

/// Per-call inputs to the builder besides the chaincode spec.
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    pub txid: &'a str,
    /// Used verbatim when present; must be at least
    /// [`MIN_CALLER_NONCE_LENGTH`] bytes.
    pub nonce: Option<&'a [u8]>,
    pub tcert: Option<&'a TransientCertificate>,
    pub attributes: &'a [String],
}

impl<'a> BuildRequest<'a> {
    pub fn new(txid: &'a str) -> Self {
        Self {
            txid,
            nonce: None,
            tcert: None,
            attributes: &[],
        }
    }

    pub fn nonce(mut self, nonce: &'a [u8]) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn tcert(mut self, tcert: &'a TransientCertificate) -> Self {
        self.tcert = Some(tcert);
        self
    }

    pub fn attributes(mut self, attributes: &'a [String]) -> Self {
        self.attributes = attributes;
        self
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Builds unsigned transactions.
///
/// ```rust,no_run
/// use sealtx_protocol::transaction::{BuildRequest, TransactionBuilder};
/// use sealtx_protocol::transaction::types::*;
///
/// let spec = ChaincodeInvocationSpec::new(
///     ChaincodeSpec::new(ChaincodeType::Golang, ChaincodeId::named("mycc"))
///         .args(["invoke", "a", "b", "10"]),
/// );
/// let tx = TransactionBuilder::new()
///     .build_execute(&spec, &BuildRequest::new("tx-1"))
///     .unwrap();
/// assert!(!tx.is_signed());
/// ```
///
/// Shareable across threads: every collaborator is `Send + Sync` and the
/// builder holds no per-call state.
#[derive(Clone)]
pub struct TransactionBuilder {
    nonce_source: Arc<dyn NonceSource>,
    enricher: MetadataEnricher,
    sealer: ConfidentialitySealer,
}

impl TransactionBuilder {
    /// OS nonces, ABAC off, no confidentiality engine.
    pub fn new() -> Self {
        Self {
            nonce_source: Arc::new(OsNonceSource::new()),
            enricher: MetadataEnricher::disabled(),
            sealer: ConfidentialitySealer::without_engine(),
        }
    }

    pub fn nonce_source(mut self, source: Arc<dyn NonceSource>) -> Self {
        self.nonce_source = source;
        self
    }

    pub fn enricher(mut self, enricher: MetadataEnricher) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn sealer(mut self, sealer: ConfidentialitySealer) -> Self {
        self.sealer = sealer;
        self
    }

    pub fn is_abac_enabled(&self) -> bool {
        self.enricher.is_abac_enabled()
    }

    pub fn build_deploy(
        &self,
        spec: &ChaincodeDeploymentSpec,
        request: &BuildRequest<'_>,
    ) -> Result<Transaction, TransactionError> {
        let tx = Transaction::deploy(spec, request.txid)
            .map_err(|source| construct_failed(request.txid, source))?;
        self.complete(tx, &spec.chaincode_spec, request)
    }

    pub fn build_execute(
        &self,
        spec: &ChaincodeInvocationSpec,
        request: &BuildRequest<'_>,
    ) -> Result<Transaction, TransactionError> {
        let tx = Transaction::invoke(spec, request.txid)
            .map_err(|source| construct_failed(request.txid, source))?;
        self.complete(tx, &spec.chaincode_spec, request)
    }

    pub fn build_query(
        &self,
        spec: &ChaincodeInvocationSpec,
        request: &BuildRequest<'_>,
    ) -> Result<Transaction, TransactionError> {
        let tx = Transaction::query(spec, request.txid)
            .map_err(|source| construct_failed(request.txid, source))?;
        self.complete(tx, &spec.chaincode_spec, request)
    }

    /// Steps 2-4 of the pipeline, shared by all three intents.
    fn complete(
        &self,
        mut tx: Transaction,
        spec: &ChaincodeSpec,
        request: &BuildRequest<'_>,
    ) -> Result<Transaction, TransactionError> {
        tx.metadata =
            self.enricher
                .enrich(request.txid, &spec.metadata, request.tcert, request.attributes)?;

        tx.nonce = self.resolve_nonce(request)?;

        self.sealer.seal(&mut tx, spec.confidentiality_level)?;

        debug!(
            txid = %tx.txid,
            tx_type = %tx.tx_type,
            level = %tx.confidentiality_level,
            "transaction built"
        );
        Ok(tx)
    }

    fn resolve_nonce(&self, request: &BuildRequest<'_>) -> Result<Vec<u8>, TransactionError> {
        if let Some(nonce) = request.nonce {
            if nonce.len() < MIN_CALLER_NONCE_LENGTH {
                error!(txid = request.txid, len = nonce.len(), "caller nonce too short");
                return Err(TransactionError::MalformedNonce {
                    txid: request.txid.to_string(),
                    len: nonce.len(),
                    min: MIN_CALLER_NONCE_LENGTH,
                });
            }
            return Ok(nonce.to_vec());
        }

        self.nonce_source.generate().map_err(|source| {
            error!(txid = request.txid, error = %source, "nonce generation failed");
            TransactionError::RandomnessUnavailable {
                stage: Stage::Nonce,
                txid: request.txid.to_string(),
                source,
            }
        })
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransactionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionBuilder")
            .field("enricher", &self.enricher)
            .field("sealer", &self.sealer)
            .finish_non_exhaustive()
    }
}

fn construct_failed(txid: &str, source: EncodingError) -> TransactionError {
    error!(txid, error = %source, "transaction construction failed");
    TransactionError::MarshalFailed {
        stage: Stage::Build,
        txid: txid.to_string(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Clamps a pre-epoch clock reading to zero.
fn unix_millis(millis: i64) -> u64 {
    u64::try_from(millis).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::nonce::NonceError;
    use crate::transaction::confidential::AesGcmEngine;
    use crate::transaction::types::{ChaincodeId, ChaincodeType};
    use std::collections::HashSet;

    struct BrokenRng;

    impl NonceSource for BrokenRng {
        fn generate(&self) -> Result<Vec<u8>, NonceError> {
            Err(NonceError::from(rand::Error::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "entropy pool drained",
            ))))
        }
    }

    fn invocation() -> ChaincodeInvocationSpec {
        ChaincodeInvocationSpec::new(
            ChaincodeSpec::new(ChaincodeType::Golang, ChaincodeId::named("mycc"))
                .args(["invoke", "a", "b", "10"])
                .metadata(b"app-meta".to_vec()),
        )
    }

    #[test]
    fn execute_builds_unsigned_public_transaction() {
        let tx = TransactionBuilder::new()
            .build_execute(&invocation(), &BuildRequest::new("tx-1"))
            .unwrap();

        assert_eq!(tx.tx_type, TransactionType::ChaincodeInvoke);
        assert_eq!(tx.txid, "tx-1");
        assert_eq!(tx.metadata, b"app-meta");
        assert!(tx.nonce.len() >= MIN_CALLER_NONCE_LENGTH);
        assert_eq!(tx.confidentiality_level, ConfidentialityLevel::Public);
        assert!(tx.confidentiality_protocol_version.is_none());
        assert!(tx.cert.is_none());
        assert!(tx.signature.is_none());
        assert_eq!(tx.invocation_spec().unwrap(), invocation());
    }

    #[test]
    fn query_and_deploy_use_their_own_types() {
        let builder = TransactionBuilder::new();
        let query = builder
            .build_query(&invocation(), &BuildRequest::new("q"))
            .unwrap();
        assert_eq!(query.tx_type, TransactionType::ChaincodeQuery);

        let deploy_spec =
            ChaincodeDeploymentSpec::new(invocation().chaincode_spec, b"package".to_vec());
        let deploy = builder
            .build_deploy(&deploy_spec, &BuildRequest::new("d"))
            .unwrap();
        assert_eq!(deploy.tx_type, TransactionType::ChaincodeDeploy);
        assert_eq!(deploy.deployment_spec().unwrap(), deploy_spec);
    }

    #[test]
    fn caller_nonce_is_used_verbatim() {
        let nonce = [0x42u8; 16];
        let tx = TransactionBuilder::new()
            .build_execute(&invocation(), &BuildRequest::new("tx-n").nonce(&nonce))
            .unwrap();
        assert_eq!(tx.nonce, nonce);
    }

    #[test]
    fn short_caller_nonce_is_rejected() {
        let err = TransactionBuilder::new()
            .build_execute(&invocation(), &BuildRequest::new("tx-s").nonce(&[1, 2, 3]))
            .unwrap_err();
        assert!(matches!(
            err,
            TransactionError::MalformedNonce { len: 3, min: 16, .. }
        ));
    }

    #[test]
    fn empty_caller_nonce_is_rejected() {
        let err = TransactionBuilder::new()
            .build_execute(&invocation(), &BuildRequest::new("tx-e").nonce(&[]))
            .unwrap_err();
        assert!(matches!(err, TransactionError::MalformedNonce { len: 0, .. }));
    }

    #[test]
    fn rng_failure_is_randomness_unavailable() {
        let err = TransactionBuilder::new()
            .nonce_source(Arc::new(BrokenRng))
            .build_execute(&invocation(), &BuildRequest::new("tx-r"))
            .unwrap_err();
        assert!(matches!(
            err,
            TransactionError::RandomnessUnavailable {
                stage: Stage::Nonce,
                ..
            }
        ));
    }

    #[test]
    fn generated_nonces_do_not_repeat() {
        let builder = TransactionBuilder::new();
        let mut seen = HashSet::new();
        for i in 0..2_000 {
            let txid = format!("tx-{i}");
            let tx = builder
                .build_execute(&invocation(), &BuildRequest::new(&txid))
                .unwrap();
            assert!(seen.insert(tx.nonce), "nonce repeated at draw {i}");
        }
    }

    #[test]
    fn confidential_spec_is_sealed() {
        let mut spec = invocation();
        spec.chaincode_spec = spec.chaincode_spec.confidential();
        let public_payload = bincode::serialize(&spec).unwrap();

        let tx = TransactionBuilder::new()
            .sealer(ConfidentialitySealer::new(Arc::new(AesGcmEngine::new(
                [1u8; 32],
            ))))
            .build_execute(&spec, &BuildRequest::new("tx-c"))
            .unwrap();

        assert!(tx.is_confidential());
        assert_eq!(tx.confidentiality_protocol_version.as_deref(), Some("1.2"));
        assert_ne!(tx.payload, public_payload);
    }

    #[test]
    fn wire_roundtrip() {
        let tx = TransactionBuilder::new()
            .build_execute(&invocation(), &BuildRequest::new("tx-w"))
            .unwrap();
        let decoded = Transaction::from_wire_bytes(&tx.to_wire_bytes().unwrap()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn missing_credential_reports_the_absent_half() {
        let mut tx = TransactionBuilder::new()
            .build_execute(&invocation(), &BuildRequest::new("tx-m"))
            .unwrap();
        assert_eq!(tx.missing_credential(), Some(MissingPart::Both));
        tx.cert = Some(vec![1]);
        assert_eq!(tx.missing_credential(), Some(MissingPart::Signature));
        tx.cert = None;
        tx.signature = Some(vec![1]);
        assert_eq!(tx.missing_credential(), Some(MissingPart::Certificate));
    }

    #[test]
    fn pre_epoch_clock_clamps_to_zero() {
        assert_eq!(unix_millis(-1), 0);
        assert_eq!(unix_millis(i64::MIN), 0);
        assert_eq!(unix_millis(1_700_000_000_000), 1_700_000_000_000);
    }
}
