//! SF-001: Configuration and result types.
//!
//! `ProvisioningSpec` is the YAML document a caller hands to the tool. It is
//! immutable once loaded; statement lists are applied strictly in file order.

use crate::transport::Param;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// schemaforge.yaml
// ============================================================================

/// Everything needed to provision one schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningSpec {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Schema name, used for the event log directory
    pub name: String,

    /// Namespace of the stored procedure classes (e.g. `com.example.kv`)
    pub package: String,

    /// File name of the generated bundle
    pub bundle: String,

    /// DDL statements, in dependency order
    #[serde(default)]
    pub ddl: Vec<String>,

    /// Procedure definitions, in order
    #[serde(default)]
    pub procedures: Vec<String>,

    /// Auxiliary code units, fully qualified
    #[serde(default)]
    pub classes: Vec<String>,

    /// Auxiliary archives, stored under the namespace path
    #[serde(default)]
    pub archives: Vec<String>,

    /// Read-only call whose success means "already provisioned"
    pub probe: ProbeConfig,

    #[serde(default)]
    pub policy: Policy,

    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// The existence probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub procedure: String,

    /// Positional parameters: scalars, `null`, or `{base64: "..."}` for bytes
    #[serde(default)]
    pub params: Vec<serde_yaml_ng::Value>,
}

impl ProbeConfig {
    /// Convert the YAML parameters into call parameters.
    pub fn call_params(&self) -> Result<Vec<Param>, String> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, v)| yaml_to_param(v).map_err(|e| format!("probe param {}: {}", i, e)))
            .collect()
    }
}

fn yaml_to_param(value: &serde_yaml_ng::Value) -> Result<Param, String> {
    use serde_yaml_ng::Value;
    match value {
        Value::Null => Ok(Param::Null),
        Value::Bool(b) => Ok(Param::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Param::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Param::Float(f))
            } else {
                Err(format!("unsupported number {}", n))
            }
        }
        Value::String(s) => Ok(Param::Str(s.clone())),
        Value::Mapping(m) if m.len() == 1 => match m.get("base64") {
            Some(Value::String(encoded)) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map(Param::Bytes)
                .map_err(|e| format!("invalid base64: {}", e)),
            _ => Err("mapping must be {base64: \"...\"}".to_string()),
        },
        _ => Err("unsupported parameter type".to_string()),
    }
}

/// Provisioning policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Keep the bundle file after a successful upload
    #[serde(default)]
    pub retain_bundle: bool,

    /// Transport maximum message size in bytes
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: u64,

    /// Append provenance events to the state directory
    #[serde(default = "default_true")]
    pub event_log: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            retain_bundle: false,
            max_message_bytes: default_max_message_bytes(),
            event_log: true,
        }
    }
}

/// Largest message the cluster's wire protocol accepts (50 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: u64 = 50 * 1024 * 1024;

fn default_max_message_bytes() -> u64 {
    DEFAULT_MAX_MESSAGE_BYTES
}

fn default_true() -> bool {
    true
}

/// How the CLI reaches the cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_servers")]
    pub servers: Vec<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Client binary
    #[serde(default = "default_sqlcmd")]
    pub sqlcmd: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            port: None,
            user: None,
            password: None,
            sqlcmd: default_sqlcmd(),
        }
    }
}

fn default_servers() -> Vec<String> {
    vec!["localhost".to_string()]
}

fn default_sqlcmd() -> String {
    "sqlcmd".to_string()
}

// ============================================================================
// Derived / runtime types
// ============================================================================

/// A code unit named by a `... FROM CLASS x;` procedure definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureReference {
    /// Position of the defining statement in `procedures`
    pub statement_index: usize,

    /// Class name as written, minus the terminator
    pub class_name: String,
}

/// Raw outcome of the existence probe, before it collapses to a boolean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExistenceVerdict {
    Exists,
    Absent,
    Indeterminate(String),
}

impl ExistenceVerdict {
    /// Ambiguous outcomes count as "not present" so provisioning is attempted.
    pub fn exists(&self) -> bool {
        matches!(self, ExistenceVerdict::Exists)
    }
}

/// A sealed bundle on disk.
#[derive(Debug, Clone)]
pub struct BundleInfo {
    pub path: PathBuf,
    pub bytes: u64,
    pub entries: usize,
    /// `blake3:{hex}` of the bundle contents
    pub hash: String,
    /// False once the file has been deleted after upload
    pub retained: bool,
}

/// How a provisioning attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// Probe found the schema before any work was done
    AlreadyPresent,
    /// A DDL statement hit an existing object: another provisioner won
    LostRace,
    /// Everything applied and the post-check found the schema
    Created,
    /// Everything applied but the post-check did not see the schema
    NotVisible,
}

impl fmt::Display for ProvisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionOutcome::AlreadyPresent => write!(f, "already-present"),
            ProvisionOutcome::LostRace => write!(f, "lost-race"),
            ProvisionOutcome::Created => write!(f, "created"),
            ProvisionOutcome::NotVisible => write!(f, "not-visible"),
        }
    }
}

/// Result of [`crate::core::orchestrator::SchemaBuilder::provision`].
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub outcome: ProvisionOutcome,
    pub bundle: Option<BundleInfo>,
    pub ddl_applied: usize,
    pub procedures_applied: usize,
    pub duration_seconds: f64,
}

impl ProvisionReport {
    /// True only if this call created the schema and it is now visible.
    pub fn newly_provisioned(&self) -> bool {
        self.outcome == ProvisionOutcome::Created
    }
}

// ============================================================================
// Provenance events
// ============================================================================

/// One line of the provisioning event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvisionEvent {
    ProvisionStarted {
        schema: String,
        run_id: String,
        version: String,
    },
    SchemaPresent {
        schema: String,
    },
    BundleSealed {
        path: String,
        bytes: u64,
        entries: usize,
        hash: String,
    },
    BundleUploaded {
        bytes: u64,
    },
    RaceLost {
        statement: String,
        message: String,
    },
    ProvisionCompleted {
        schema: String,
        outcome: String,
        total_seconds: f64,
    },
    ProvisionFailed {
        schema: String,
        error: String,
    },
}

/// Event with a timestamp, as written to the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvisionEvent,
}
