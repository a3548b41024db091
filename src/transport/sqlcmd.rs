//! SF-011: `sqlcmd` transport.
//!
//! Drives the cluster's own command-line client. Each call becomes a short
//! script piped to stdin (not passed as an argument) so statement text never
//! hits argument length limits or shell quoting.

use super::{CallError, ClientResponse, DatabaseClient, Param, ADHOC, UPDATE_CLASSES};
use crate::core::types::ConnectionConfig;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Client that shells out to `sqlcmd` for every call.
#[derive(Debug, Clone)]
pub struct SqlcmdClient {
    binary: PathBuf,
    servers: Vec<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
}

impl SqlcmdClient {
    pub fn new(binary: impl Into<PathBuf>, servers: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            servers,
            port: None,
            user: None,
            password: None,
        }
    }

    pub fn from_config(conn: &ConnectionConfig) -> Self {
        Self {
            binary: PathBuf::from(&conn.sqlcmd),
            servers: conn.servers.clone(),
            port: conn.port,
            user: conn.user.clone(),
            password: conn.password.clone(),
        }
    }

    fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if !self.servers.is_empty() {
            args.push(format!("--servers={}", self.servers.join(",")));
        }
        if let Some(port) = self.port {
            args.push(format!("--port={}", port));
        }
        if let Some(ref user) = self.user {
            args.push(format!("--user={}", user));
        }
        if let Some(ref password) = self.password {
            args.push(format!("--password={}", password));
        }
        args
    }

    fn run(&self, script: &str) -> Result<ClientResponse, CallError> {
        tracing::debug!(binary = %self.binary.display(), "sqlcmd: {}", script.trim());

        let mut child = Command::new(&self.binary)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CallError::Connection(format!("failed to spawn {}: {}", self.binary.display(), e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A client that exits without reading is judged by its exit status.
            match stdin.write_all(script.as_bytes()) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => {
                    return Err(CallError::Connection(format!("stdin write error: {}", e)));
                }
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| CallError::Connection(format!("wait error: {}", e)))?;

        if output.status.success() {
            return Ok(ClientResponse {
                status: super::Status::Success,
                status_string: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            });
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr
        };
        match output.status.code() {
            Some(_) => Err(CallError::Rejected(message)),
            None => Err(CallError::Connection(format!("sqlcmd killed by signal: {}", message))),
        }
    }
}

impl DatabaseClient for SqlcmdClient {
    fn call_procedure(&self, procedure: &str, params: &[Param]) -> Result<ClientResponse, CallError> {
        match procedure {
            UPDATE_CLASSES => {
                let bytes = params.first().and_then(Param::as_bytes).ok_or_else(|| {
                    CallError::Rejected("@UpdateClasses expects bundle bytes".to_string())
                })?;
                let mut jar = tempfile::Builder::new()
                    .prefix("schemaforge-")
                    .suffix(".jar")
                    .tempfile()
                    .map_err(|e| CallError::Connection(format!("cannot stage bundle: {}", e)))?;
                jar.write_all(bytes)
                    .and_then(|_| jar.flush())
                    .map_err(|e| CallError::Connection(format!("cannot stage bundle: {}", e)))?;
                self.run(&load_classes_script(jar.path()))
            }
            _ => {
                let script = render_script(procedure, params)
                    .ok_or_else(|| CallError::Rejected(format!("{} expects one SQL string", ADHOC)))?;
                self.run(&script)
            }
        }
    }
}

/// Render a non-bundle call as sqlcmd input. `None` when `@AdHoc` lacks its statement.
pub fn render_script(procedure: &str, params: &[Param]) -> Option<String> {
    if procedure == ADHOC {
        let sql = params.first().and_then(Param::as_str)?;
        let sql = sql.trim();
        return Some(if sql.ends_with(';') {
            format!("{}\n", sql)
        } else {
            format!("{};\n", sql)
        });
    }

    let args: Vec<String> = params.iter().map(render_literal).collect();
    if args.is_empty() {
        Some(format!("exec {};\n", procedure))
    } else {
        Some(format!("exec {} {};\n", procedure, args.join(", ")))
    }
}

fn load_classes_script(jar: &Path) -> String {
    format!("load classes {};\n", jar.display())
}

fn render_literal(param: &Param) -> String {
    match param {
        Param::Null => "NULL".to_string(),
        Param::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Param::Int(i) => i.to_string(),
        Param::Float(x) => x.to_string(),
        Param::Str(s) => format!("'{}'", s.replace('\'', "''")),
        Param::Bytes(b) => {
            let hex: String = b.iter().map(|byte| format!("{:02X}", byte)).collect();
            format!("'{}'", hex)
        }
    }
}
