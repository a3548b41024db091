//! SF-013: YAML parsing and validation.
//!
//! Parses schemaforge.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - Name, package, bundle, and probe procedure must be set
//! - Bundle must be a bare file name
//! - At least one DDL statement
//! - Probe parameters must convert to call parameters

use super::types::*;
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a schemaforge.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<ProvisioningSpec, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse a schemaforge.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<ProvisioningSpec, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &ProvisioningSpec) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut push = |message: String| errors.push(ValidationError { message });

    if config.version != "1.0" {
        push(format!("version must be \"1.0\", got \"{}\"", config.version));
    }

    for (field, value) in [
        ("name", &config.name),
        ("package", &config.package),
        ("bundle", &config.bundle),
        ("probe.procedure", &config.probe.procedure),
    ] {
        if value.trim().is_empty() {
            push(format!("{} must not be empty", field));
        }
    }

    if config.bundle.contains('/') || config.bundle.contains('\\') || config.bundle == ".." {
        push(format!("bundle '{}' must be a file name, not a path", config.bundle));
    }

    if config.policy.max_message_bytes == 0 {
        push("policy.max_message_bytes must be greater than 0".to_string());
    }

    if config.ddl.is_empty() {
        push("ddl must contain at least one statement".to_string());
    }

    for (i, stmt) in config.ddl.iter().enumerate() {
        if stmt.trim().is_empty() {
            push(format!("ddl[{}] is empty", i));
        }
    }
    for (i, stmt) in config.procedures.iter().enumerate() {
        if stmt.trim().is_empty() {
            push(format!("procedures[{}] is empty", i));
        }
    }

    if let Err(e) = config.probe.call_params() {
        push(e);
    }

    if config.connection.servers.is_empty() {
        push("connection.servers must list at least one host".to_string());
    }

    errors
}
