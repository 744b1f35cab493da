//! Metadata enrichment.
//!
//! With ABAC off the application's metadata passes through untouched. With
//! ABAC on, a transient certificate is mandatory and the metadata is
//! replaced by whatever the configured [`AbacEncoder`] produces.

use std::sync::Arc;

use tracing::{debug, error};

use super::error::{MissingPart, Stage, TransactionError};
use crate::abac::{AbacEncoder, AttributeBindingEncoder};
use crate::config::SecurityConfig;
use crate::identity::{Credential, TransientCertificate};

/// Decides what ends up in `Transaction::metadata`.
#[derive(Clone)]
pub struct MetadataEnricher {
    encoder: Option<Arc<dyn AbacEncoder>>,
}

impl MetadataEnricher {
    /// Pass-through enricher.
    pub fn disabled() -> Self {
        Self { encoder: None }
    }

    /// ABAC enricher backed by `encoder`.
    pub fn abac(encoder: Arc<dyn AbacEncoder>) -> Self {
        Self {
            encoder: Some(encoder),
        }
    }

    /// [`AttributeBindingEncoder`] when `abac_enabled`, pass-through otherwise.
    pub fn from_config(config: &SecurityConfig) -> Self {
        if config.abac_enabled {
            Self::abac(Arc::new(AttributeBindingEncoder::new()))
        } else {
            Self::disabled()
        }
    }

    pub fn is_abac_enabled(&self) -> bool {
        self.encoder.is_some()
    }

    pub fn enrich(
        &self,
        txid: &str,
        base_metadata: &[u8],
        tcert: Option<&TransientCertificate>,
        attributes: &[String],
    ) -> Result<Vec<u8>, TransactionError> {
        let Some(encoder) = &self.encoder else {
            return Ok(base_metadata.to_vec());
        };

        let Some(tcert) = tcert else {
            error!(txid, "ABAC enabled but no transient certificate supplied");
            return Err(TransactionError::MissingCredential {
                stage: Stage::Enrich,
                txid: txid.to_string(),
                missing: MissingPart::Certificate,
            });
        };

        let encoded = encoder
            .encode(
                tcert.certificate(),
                base_metadata,
                tcert.derived_key(),
                attributes,
            )
            .map_err(|source| {
                error!(txid, error = %source, "ABAC metadata encoding failed");
                TransactionError::MetadataEncodingFailed {
                    txid: txid.to_string(),
                    source,
                }
            })?;

        debug!(txid, attributes = attributes.len(), "metadata bound to tCert");
        Ok(encoded)
    }
}

impl Default for MetadataEnricher {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for MetadataEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataEnricher")
            .field("abac_enabled", &self.is_abac_enabled())
            .finish()
    }
}
