use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid NCBI protein accession: {0}")]
    InvalidAccession(String),

    #[error("invalid UniProt accession: {0}")]
    InvalidUniprotId(String),

    #[error("invalid taxonomy id: {0}")]
    InvalidTaxonId(String),

    #[error("species name must not be empty")]
    EmptySpecies,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("{service} request failed: {message}")]
    Http {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned status {status}: {message}")]
    Status {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("{service} result not ready after {attempts} attempts")]
    NotReady {
        service: &'static str,
        attempts: usize,
    },

    #[error("{service} returned an unexpected payload: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },

    #[error("protein record not found: {0}")]
    RecordNotFound(String),

    #[error("no UniProt identifier could be established for {0}")]
    Unresolved(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("headless browser failed: {0}")]
    Browser(String),

    #[error("usage ledger error: {0}")]
    Ledger(String),

    #[error("summary API key not configured (set {0})")]
    MissingApiKey(String),
}

impl KiraError {
    pub fn http(service: &'static str, err: impl ToString) -> Self {
        KiraError::Http {
            service,
            message: err.to_string(),
        }
    }

    pub fn malformed(service: &'static str, message: impl Into<String>) -> Self {
        KiraError::Malformed {
            service,
            message: message.into(),
        }
    }

    /// True for faults raised by a remote service rather than by local input or state.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            KiraError::Http { .. }
                | KiraError::Status { .. }
                | KiraError::NotReady { .. }
                | KiraError::Malformed { .. }
        )
    }
}
