//! # Identity
//!
//! The credentials a client signs with. See [`credential`] for the
//! transient/enrollment split.

pub mod credential;

pub use credential::{
    Credential, CredentialError, CredentialKind, EnrollmentCredential, TransientCertificate,
};
