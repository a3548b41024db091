//! SF-009: Provisioning error taxonomy.

use crate::transport::CallError;
use std::path::PathBuf;

/// Every way a provisioning attempt can fail. All variants are fatal for the
/// current attempt; the already-exists race is not an error and never appears here.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The spec itself cannot be used (e.g. an unconvertible probe parameter).
    #[error("invalid provisioning spec: {0}")]
    InvalidSpec(String),

    /// A declared class or archive is not in the resource space.
    #[error("missing resource: {0}")]
    MissingResource(String),

    #[error("payload file {name} is too big at {size} bytes; max length is {limit}")]
    BundleTooLarge { name: String, size: u64, limit: u64 },

    #[error("attempt to execute @UpdateClasses failed: {0}")]
    UploadFailed(String),

    #[error("attempt to execute '{statement}' failed: {message}")]
    DdlFailed { statement: String, message: String },

    #[error("attempt to define procedure '{statement}' failed: {message}")]
    ProcedureDefinitionFailed { statement: String, message: String },

    /// The call never completed; passed through unchanged.
    #[error(transparent)]
    Transport(#[from] CallError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write bundle {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

impl ProvisionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProvisionError::Io {
            path: path.into(),
            source,
        }
    }
}
