//! SF-012: In-memory cluster catalog.
//!
//! Answers calls the way a live cluster does for the subset provisioning
//! touches: tables, indexes, procedures, and classes loaded from uploaded
//! bundles. Rejection messages mirror the server's wording so race and
//! existence classification can be exercised without a cluster.

use super::{CallError, ClientResponse, DatabaseClient, Param, ADHOC, UPDATE_CLASSES};
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use std::io::{Cursor, Read};
use std::sync::{LazyLock, Mutex, MutexGuard};

static CREATE_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*CREATE\s+TABLE\s+(\w+)").expect("static regex"));
static CREATE_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*CREATE\s+(?:UNIQUE\s+|ASSUMEUNIQUE\s+)?INDEX\s+(\w+)\s+ON\s+(\w+)")
        .expect("static regex")
});
static PROC_FROM_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*CREATE\s+PROCEDURE\b.*?\bFROM\s+CLASS\s+([\w.$]+)").expect("static regex")
});
static PROC_AS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*CREATE\s+PROCEDURE\s+(\w+)\b.*?\bAS\b").expect("static regex")
});

/// A one-shot failure returned by the next call to a given procedure.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Call completes with a non-success status.
    Status(String),
    /// Call is refused with a message.
    Rejected(String),
    /// Call never reaches the cluster.
    Connection(String),
}

/// How a registered procedure was defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcedureSource {
    Class(String),
    Inline,
}

#[derive(Debug, Default)]
struct Catalog {
    tables: IndexSet<String>,
    indexes: IndexMap<String, String>,
    procedures: IndexMap<String, ProcedureSource>,
    classes: IndexMap<String, u64>,
    calls: Vec<String>,
    faults: Vec<(String, Fault)>,
}

/// Thread-safe simulated cluster implementing [`DatabaseClient`].
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    catalog: Mutex<Catalog>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Catalog> {
        self.catalog.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pre-create a table, as if another provisioner got there first.
    pub fn with_table(self, name: &str) -> Self {
        self.lock().tables.insert(name.to_uppercase());
        self
    }

    /// Pre-register an inline procedure.
    pub fn with_procedure(self, name: &str) -> Self {
        self.lock()
            .procedures
            .insert(name.to_string(), ProcedureSource::Inline);
        self
    }

    /// Fail the next call to `procedure` with `fault`.
    pub fn inject(&self, procedure: &str, fault: Fault) {
        self.lock().faults.push((procedure.to_string(), fault));
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.lock().tables.contains(&name.to_uppercase())
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.lock().indexes.contains_key(&name.to_uppercase())
    }

    pub fn procedure(&self, name: &str) -> Option<ProcedureSource> {
        self.lock().procedures.get(name).cloned()
    }

    /// Entry paths of every class loaded so far, in load order.
    pub fn loaded_classes(&self) -> Vec<String> {
        self.lock().classes.keys().cloned().collect()
    }

    /// Procedure names of every call received, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, procedure: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == procedure).count()
    }
}

impl DatabaseClient for MemoryDatabase {
    fn call_procedure(&self, procedure: &str, params: &[Param]) -> Result<ClientResponse, CallError> {
        let mut catalog = self.lock();
        catalog.calls.push(procedure.to_string());

        if let Some(pos) = catalog.faults.iter().position(|(p, _)| p == procedure) {
            let (_, fault) = catalog.faults.remove(pos);
            return match fault {
                Fault::Status(msg) => Ok(ClientResponse::failure(msg)),
                Fault::Rejected(msg) => Err(CallError::Rejected(msg)),
                Fault::Connection(msg) => Err(CallError::Connection(msg)),
            };
        }

        match procedure {
            ADHOC => {
                let sql = params.first().and_then(Param::as_str).ok_or_else(|| {
                    CallError::Rejected(format!("{} expects one SQL string", ADHOC))
                })?;
                catalog.execute(sql)
            }
            UPDATE_CLASSES => {
                let bytes = params.first().and_then(Param::as_bytes).ok_or_else(|| {
                    CallError::Rejected(format!("{} expects bundle bytes", UPDATE_CLASSES))
                })?;
                Ok(catalog.load_classes(bytes))
            }
            name if catalog.procedures.contains_key(name) => Ok(ClientResponse::success()),
            name => Err(CallError::Rejected(format!("Procedure {} was not found", name))),
        }
    }
}

impl Catalog {
    fn execute(&mut self, sql: &str) -> Result<ClientResponse, CallError> {
        if let Some(caps) = CREATE_TABLE.captures(sql) {
            let table = caps[1].to_uppercase();
            if !self.tables.insert(table.clone()) {
                return Err(already_exists(&table));
            }
            return Ok(ClientResponse::success());
        }

        if let Some(caps) = CREATE_INDEX.captures(sql) {
            let index = caps[1].to_uppercase();
            let table = caps[2].to_uppercase();
            if !self.tables.contains(&table) {
                return Err(CallError::Rejected(format!(
                    "user lacks privilege or object not found: {}",
                    table
                )));
            }
            if self.indexes.contains_key(&index) {
                return Err(already_exists(&index));
            }
            self.indexes.insert(index, table);
            return Ok(ClientResponse::success());
        }

        if let Some(caps) = PROC_FROM_CLASS.captures(sql) {
            let class = caps[1].to_string();
            if !self.has_class(&class) {
                return Err(CallError::Rejected(format!(
                    "Cannot load class for procedure: {}",
                    class
                )));
            }
            let name = class.rsplit('.').next().unwrap_or(&class).to_string();
            return self.register(name, ProcedureSource::Class(class));
        }

        if let Some(caps) = PROC_AS.captures(sql) {
            return self.register(caps[1].to_string(), ProcedureSource::Inline);
        }

        Ok(ClientResponse::success())
    }

    fn register(&mut self, name: String, source: ProcedureSource) -> Result<ClientResponse, CallError> {
        if self.procedures.contains_key(&name) {
            return Err(already_exists(&name.to_uppercase()));
        }
        self.procedures.insert(name, source);
        Ok(ClientResponse::success())
    }

    fn has_class(&self, class: &str) -> bool {
        if class.contains('.') {
            let path = format!("{}.class", class.replace('.', "/"));
            return self.classes.contains_key(&path);
        }
        let suffix = format!("/{}.class", class);
        self.classes
            .keys()
            .any(|p| p.ends_with(&suffix) || *p == format!("{}.class", class))
    }

    fn load_classes(&mut self, bytes: &[u8]) -> ClientResponse {
        let mut archive = match zip::ZipArchive::new(Cursor::new(bytes)) {
            Ok(a) => a,
            Err(e) => return ClientResponse::failure(format!("Invalid jar file: {}", e)),
        };
        for i in 0..archive.len() {
            let mut entry = match archive.by_index(i) {
                Ok(e) => e,
                Err(e) => return ClientResponse::failure(format!("Invalid jar entry: {}", e)),
            };
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut sink = Vec::new();
            if let Err(e) = entry.read_to_end(&mut sink) {
                return ClientResponse::failure(format!("Corrupt jar entry {}: {}", name, e));
            }
            self.classes.insert(name, sink.len() as u64);
        }
        ClientResponse::success()
    }
}

fn already_exists(name: &str) -> CallError {
    CallError::Rejected(format!("object name already exists: {}", name))
}
