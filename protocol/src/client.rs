//! # Client
//!
//! A [`Client`] is one enrolled identity talking to the network. It owns
//! the enrollment credential and the configured [`TransactionBuilder`], and
//! exposes the six construction entry points:
//!
//! | intent  | transient certificate                  | enrollment certificate                 |
//! |---------|----------------------------------------|----------------------------------------|
//! | deploy  | [`Client::new_chaincode_deploy_using_tcert`]  | [`Client::new_chaincode_deploy_using_ecert`]  |
//! | invoke  | [`Client::new_chaincode_execute_using_tcert`] | [`Client::new_chaincode_execute_using_ecert`] |
//! | query   | [`Client::new_chaincode_query_using_tcert`]   | [`Client::new_chaincode_query_using_ecert`]   |
//!
//! A client is initialized by construction (there is no way to build one
//! without an enrollment credential) and stays initialized until
//! [`Client::shutdown`]. After shutdown every operation fails with
//! `NotInitialized`.
//!
//! `Client` is `Send + Sync`; share it behind an `Arc`.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::abac::{AbacEncoder, AttributeBindingEncoder};
use crate::config::{ConfigError, SecurityConfig};
use crate::crypto::certificate::ParsedCertificate;
use crate::crypto::nonce::{NonceSource, OsNonceSource};
use crate::identity::{Credential, EnrollmentCredential, TransientCertificate};
use crate::transaction::{
    sign_transaction, verify_transaction, BuildRequest, ChaincodeDeploymentSpec,
    ChaincodeInvocationSpec, ConfidentialityEngine, ConfidentialitySealer, MetadataEnricher,
    Stage, Transaction, TransactionBuilder, TransactionError,
};

// ---------------------------------------------------------------------------
// ClientBuilder
// ---------------------------------------------------------------------------

/// Assembles a [`Client`].
pub struct ClientBuilder {
    enrollment: EnrollmentCredential,
    config: SecurityConfig,
    nonce_source: Option<Arc<dyn NonceSource>>,
    abac_encoder: Option<Arc<dyn AbacEncoder>>,
    engine: Option<Arc<dyn ConfidentialityEngine>>,
}

impl ClientBuilder {
    pub fn config(mut self, config: SecurityConfig) -> Self {
        self.config = config;
        self
    }

    pub fn nonce_source(mut self, source: Arc<dyn NonceSource>) -> Self {
        self.nonce_source = Some(source);
        self
    }

    /// Encoder used when `abac_enabled` is set. Defaults to
    /// [`AttributeBindingEncoder`].
    pub fn abac_encoder(mut self, encoder: Arc<dyn AbacEncoder>) -> Self {
        self.abac_encoder = Some(encoder);
        self
    }

    /// Engine for confidential transactions. Without one, building a
    /// confidential transaction fails with `EncryptionFailed`.
    pub fn confidentiality_engine(mut self, engine: Arc<dyn ConfidentialityEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn build(self) -> Result<Client, ConfigError> {
        self.config.validate()?;

        let enricher = if self.config.abac_enabled {
            MetadataEnricher::abac(
                self.abac_encoder
                    .unwrap_or_else(|| Arc::new(AttributeBindingEncoder::new())),
            )
        } else {
            MetadataEnricher::disabled()
        };

        let sealer = match self.engine {
            Some(engine) => ConfidentialitySealer::new(engine),
            None => ConfidentialitySealer::without_engine(),
        };

        let builder = TransactionBuilder::new()
            .nonce_source(
                self.nonce_source
                    .unwrap_or_else(|| Arc::new(OsNonceSource::new())),
            )
            .enricher(enricher)
            .sealer(sealer);

        info!(
            abac = self.config.abac_enabled,
            tls = self.config.tls_enabled,
            cert_len = self.enrollment.certificate().len(),
            "client initialized"
        );

        Ok(Client {
            config: self.config,
            builder,
            enrollment: RwLock::new(Some(Arc::new(self.enrollment))),
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// An enrolled client session.
pub struct Client {
    config: SecurityConfig,
    builder: TransactionBuilder,
    enrollment: RwLock<Option<Arc<EnrollmentCredential>>>,
}

impl Client {
    pub fn builder(enrollment: EnrollmentCredential) -> ClientBuilder {
        ClientBuilder {
            enrollment,
            config: SecurityConfig::default(),
            nonce_source: None,
            abac_encoder: None,
            engine: None,
        }
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.enrollment.read().is_some()
    }

    /// Drops the enrollment credential. Idempotent.
    pub fn shutdown(&self) {
        if self.enrollment.write().take().is_some() {
            info!("client shut down");
        }
    }

    fn enrollment(&self, stage: Stage) -> Result<Arc<EnrollmentCredential>, TransactionError> {
        self.enrollment.read().clone().ok_or_else(|| {
            warn!(%stage, "operation on a client that is not initialized");
            TransactionError::NotInitialized { stage }
        })
    }

    fn ensure_initialized(&self, stage: Stage) -> Result<(), TransactionError> {
        self.enrollment(stage).map(|_| ())
    }

    // -- transient certificate ----------------------------------------------

    pub fn new_chaincode_deploy_using_tcert(
        &self,
        spec: &ChaincodeDeploymentSpec,
        txid: &str,
        attributes: &[String],
        tcert: &TransientCertificate,
        nonce: Option<&[u8]>,
    ) -> Result<Transaction, TransactionError> {
        self.ensure_initialized(Stage::Build)?;
        let request = tcert_request(txid, attributes, tcert, nonce);
        let mut tx = self.builder.build_deploy(spec, &request)?;
        sign_transaction(&mut tx, tcert)?;
        Ok(tx)
    }

    pub fn new_chaincode_execute_using_tcert(
        &self,
        spec: &ChaincodeInvocationSpec,
        txid: &str,
        attributes: &[String],
        tcert: &TransientCertificate,
        nonce: Option<&[u8]>,
    ) -> Result<Transaction, TransactionError> {
        self.ensure_initialized(Stage::Build)?;
        let request = tcert_request(txid, attributes, tcert, nonce);
        let mut tx = self.builder.build_execute(spec, &request)?;
        sign_transaction(&mut tx, tcert)?;
        Ok(tx)
    }

    pub fn new_chaincode_query_using_tcert(
        &self,
        spec: &ChaincodeInvocationSpec,
        txid: &str,
        attributes: &[String],
        tcert: &TransientCertificate,
        nonce: Option<&[u8]>,
    ) -> Result<Transaction, TransactionError> {
        self.ensure_initialized(Stage::Build)?;
        let request = tcert_request(txid, attributes, tcert, nonce);
        let mut tx = self.builder.build_query(spec, &request)?;
        sign_transaction(&mut tx, tcert)?;
        Ok(tx)
    }

    // -- enrollment certificate ---------------------------------------------

    pub fn new_chaincode_deploy_using_ecert(
        &self,
        spec: &ChaincodeDeploymentSpec,
        txid: &str,
        nonce: Option<&[u8]>,
    ) -> Result<Transaction, TransactionError> {
        self.ensure_initialized(Stage::Build)?;
        let mut tx = self.builder.build_deploy(spec, &ecert_request(txid, nonce))?;
        self.sign_with_enrollment_certificate(&mut tx)?;
        Ok(tx)
    }

    pub fn new_chaincode_execute_using_ecert(
        &self,
        spec: &ChaincodeInvocationSpec,
        txid: &str,
        nonce: Option<&[u8]>,
    ) -> Result<Transaction, TransactionError> {
        self.ensure_initialized(Stage::Build)?;
        let mut tx = self.builder.build_execute(spec, &ecert_request(txid, nonce))?;
        self.sign_with_enrollment_certificate(&mut tx)?;
        Ok(tx)
    }

    pub fn new_chaincode_query_using_ecert(
        &self,
        spec: &ChaincodeInvocationSpec,
        txid: &str,
        nonce: Option<&[u8]>,
    ) -> Result<Transaction, TransactionError> {
        self.ensure_initialized(Stage::Build)?;
        let mut tx = self.builder.build_query(spec, &ecert_request(txid, nonce))?;
        self.sign_with_enrollment_certificate(&mut tx)?;
        Ok(tx)
    }

    /// Signs an already built transaction with the enrollment credential.
    pub fn sign_with_enrollment_certificate(
        &self,
        tx: &mut Transaction,
    ) -> Result<(), TransactionError> {
        let enrollment = self.enrollment(Stage::Sign)?;
        sign_transaction(tx, enrollment.as_ref())?;
        Ok(())
    }

    /// Verifies that `tx` is well formed with respect to the security layer:
    /// cert and signature present, cert parseable, signature valid.
    pub fn check_transaction(&self, tx: &Transaction) -> Result<ParsedCertificate, TransactionError> {
        self.ensure_initialized(Stage::Verify)?;
        verify_transaction(tx)
    }

    /// The builder this client uses, for callers that sign elsewhere.
    pub fn transaction_builder(&self) -> &TransactionBuilder {
        &self.builder
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

fn tcert_request<'a>(
    txid: &'a str,
    attributes: &'a [String],
    tcert: &'a TransientCertificate,
    nonce: Option<&'a [u8]>,
) -> BuildRequest<'a> {
    let mut request = BuildRequest::new(txid).tcert(tcert).attributes(attributes);
    request.nonce = nonce;
    request
}

fn ecert_request<'a>(txid: &'a str, nonce: Option<&'a [u8]>) -> BuildRequest<'a> {
    let mut request = BuildRequest::new(txid);
    request.nonce = nonce;
    request
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{ChaincodeId, ChaincodeSpec, ChaincodeType, MissingPart};

    fn client(config: SecurityConfig) -> Client {
        Client::builder(EnrollmentCredential::issue("alice").unwrap())
            .config(config)
            .build()
            .unwrap()
    }

    fn invocation() -> ChaincodeInvocationSpec {
        ChaincodeInvocationSpec::new(
            ChaincodeSpec::new(ChaincodeType::Golang, ChaincodeId::named("mycc"))
                .args(["invoke", "a", "b", "10"]),
        )
    }

    #[test]
    fn client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Client>();
    }

    #[test]
    fn ecert_flow_signs_and_checks() {
        let client = client(SecurityConfig::default());
        let tx = client
            .new_chaincode_execute_using_ecert(&invocation(), "tx-1", None)
            .unwrap();
        assert!(tx.is_signed());
        assert!(client.check_transaction(&tx).is_ok());
    }

    #[test]
    fn tcert_flow_uses_the_tcert() {
        let client = client(SecurityConfig::default());
        let tcert = TransientCertificate::issue("tcert", [3u8; 32]).unwrap();
        let tx = client
            .new_chaincode_query_using_tcert(&invocation(), "tx-2", &[], &tcert, None)
            .unwrap();
        assert_eq!(tx.cert.as_deref(), Some(tcert.certificate()));
        assert!(client.check_transaction(&tx).is_ok());
    }

    #[test]
    fn ecert_flow_with_abac_is_missing_credential() {
        let client = client(SecurityConfig {
            abac_enabled: true,
            ..SecurityConfig::default()
        });
        let err = client
            .new_chaincode_execute_using_ecert(&invocation(), "tx-3", None)
            .unwrap_err();
        assert!(matches!(
            err,
            TransactionError::MissingCredential {
                missing: MissingPart::Certificate,
                ..
            }
        ));
    }

    #[test]
    fn shutdown_makes_everything_fail() {
        let client = client(SecurityConfig::default());
        let tx = client
            .new_chaincode_execute_using_ecert(&invocation(), "tx-4", None)
            .unwrap();

        client.shutdown();
        assert!(!client.is_initialized());

        assert!(matches!(
            client.check_transaction(&tx),
            Err(TransactionError::NotInitialized {
                stage: Stage::Verify
            })
        ));
        assert!(matches!(
            client.new_chaincode_execute_using_ecert(&invocation(), "tx-5", None),
            Err(TransactionError::NotInitialized { .. })
        ));

        let tcert = TransientCertificate::issue("tcert", [0u8; 32]).unwrap();
        assert!(matches!(
            client.new_chaincode_execute_using_tcert(&invocation(), "tx-6", &[], &tcert, None),
            Err(TransactionError::NotInitialized { .. })
        ));

        // A second shutdown is harmless.
        client.shutdown();
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = Client::builder(EnrollmentCredential::issue("bob").unwrap())
            .config(SecurityConfig {
                dial_timeout_ms: 0,
                ..SecurityConfig::default()
            })
            .build();
        assert!(matches!(result, Err(ConfigError::ZeroDialTimeout)));
    }
}
