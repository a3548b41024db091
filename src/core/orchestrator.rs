//! SF-002: Provisioning orchestrator.
//!
//! probe → resolve → package → size guard → upload → DDL → procedures → probe
//!
//! One attempt runs at a time per [`SchemaBuilder`]. That lock only covers
//! threads in this process. Across processes the database's refusal to create
//! a duplicate object is the only coordination: a DDL statement rejected with
//! "object name already exists" means another provisioner won, and the attempt
//! ends with `false` instead of an error.

use super::classify;
use super::error::ProvisionError;
use super::extractor;
use super::guard;
use super::packager;
use super::prober;
use super::types::*;
use crate::provenance::eventlog::{self, EventLog};
use crate::provenance::hasher;
use crate::resources::{self, ResourceSpace};
use crate::transport::{self, CallOutcome, DatabaseClient, Param, ADHOC, UPDATE_CLASSES};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

/// Provisions one schema against a borrowed client.
///
/// The client is never closed here; its lifecycle belongs to the caller.
pub struct SchemaBuilder<'a, C: DatabaseClient + ?Sized, R: ResourceSpace + ?Sized> {
    client: &'a C,
    resources: &'a R,
    spec: ProvisioningSpec,
    procedure_classes: Vec<ProcedureReference>,
    probe_params: Vec<Param>,
    retain_bundle: bool,
    work_dir: Option<PathBuf>,
    event_log: Option<EventLog>,
    in_flight: Mutex<()>,
}

/// Statement counters for one attempt.
#[derive(Default)]
struct Progress {
    bundle: Option<BundleInfo>,
    ddl_applied: usize,
    procedures_applied: usize,
}

impl<'a, C: DatabaseClient + ?Sized, R: ResourceSpace + ?Sized> SchemaBuilder<'a, C, R> {
    /// Bind a spec to a client and resource space. Procedure classes are
    /// extracted here, once.
    pub fn new(spec: ProvisioningSpec, client: &'a C, resources: &'a R) -> Result<Self, ProvisionError> {
        let probe_params = spec.probe.call_params().map_err(ProvisionError::InvalidSpec)?;
        let procedure_classes = extractor::extract_procedure_classes(&spec.procedures);
        Ok(Self {
            client,
            resources,
            retain_bundle: spec.policy.retain_bundle,
            spec,
            procedure_classes,
            probe_params,
            work_dir: None,
            event_log: None,
            in_flight: Mutex::new(()),
        })
    }

    /// Build bundles under `dir` instead of a fresh temporary directory.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_event_log(mut self, log: EventLog) -> Self {
        self.event_log = Some(log);
        self
    }

    pub fn spec(&self) -> &ProvisioningSpec {
        &self.spec
    }

    /// Classes named by `FROM CLASS` procedure definitions, in statement order.
    pub fn procedure_classes(&self) -> &[ProcedureReference] {
        &self.procedure_classes
    }

    /// Whether the bundle file is kept after a successful upload.
    pub fn retain_bundle(&self) -> bool {
        self.retain_bundle
    }

    pub fn set_retain_bundle(&mut self, retain: bool) {
        self.retain_bundle = retain;
    }

    fn record(&self, event: ProvisionEvent) {
        if let Some(ref log) = self.event_log {
            log.record(event);
        }
    }

    /// Run the existence probe. Ambiguous outcomes count as absent.
    pub fn schema_exists(&self) -> bool {
        prober::schema_exists(self.client, &self.spec.probe.procedure, &self.probe_params)
    }

    /// Resolve, package, and size-check the bundle into `dir`, without any
    /// network call. The file is left in place.
    ///
    /// Waits for any attempt in flight on this builder, since both write the
    /// same bundle path.
    pub fn package_bundle(&self, dir: &Path) -> Result<BundleInfo, ProvisionError> {
        let _guard = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        self.seal_bundle(dir)
    }

    /// Caller holds `in_flight`.
    fn seal_bundle(&self, dir: &Path) -> Result<BundleInfo, ProvisionError> {
        let dest = dir.join(&self.spec.bundle);
        tracing::info!("creating bundle {}", dest.display());

        let entries = resources::plan_entries(&self.spec, &self.procedure_classes);
        let resolved = resources::resolve_all(self.resources, &entries)?;

        let sealed = match packager::write_bundle(&dest, resolved) {
            Ok(s) => s,
            Err(e) => {
                discard(&dest);
                return Err(e);
            }
        };

        guard::check_bundle_size(&self.spec.bundle, sealed.bytes, self.spec.policy.max_message_bytes)?;

        let hash = hasher::hash_file(&sealed.path)
            .map_err(|e| ProvisionError::io(&sealed.path, std::io::Error::other(e)))?;

        let info = BundleInfo {
            path: sealed.path,
            bytes: sealed.bytes,
            entries: sealed.entries,
            hash,
            retained: true,
        };
        self.record(ProvisionEvent::BundleSealed {
            path: info.path.display().to_string(),
            bytes: info.bytes,
            entries: info.entries,
            hash: info.hash.clone(),
        });
        Ok(info)
    }

    /// Provision the schema if the probe does not find it.
    ///
    /// Returns true only if this call created the schema.
    pub fn provision_if_needed(&self) -> Result<bool, ProvisionError> {
        self.provision().map(|r| r.newly_provisioned())
    }

    /// Provision the schema if the probe does not find it, with details.
    pub fn provision(&self) -> Result<ProvisionReport, ProvisionError> {
        let _guard = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let start = Instant::now();

        self.record(ProvisionEvent::ProvisionStarted {
            schema: self.spec.name.clone(),
            run_id: eventlog::generate_run_id(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        });

        let mut progress = Progress::default();
        let result = self.run(&mut progress);
        let duration_seconds = start.elapsed().as_secs_f64();

        match result {
            Ok(outcome) => {
                self.record(ProvisionEvent::ProvisionCompleted {
                    schema: self.spec.name.clone(),
                    outcome: outcome.to_string(),
                    total_seconds: duration_seconds,
                });
                Ok(ProvisionReport {
                    outcome,
                    bundle: progress.bundle,
                    ddl_applied: progress.ddl_applied,
                    procedures_applied: progress.procedures_applied,
                    duration_seconds,
                })
            }
            Err(e) => {
                self.record(ProvisionEvent::ProvisionFailed {
                    schema: self.spec.name.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn run(&self, progress: &mut Progress) -> Result<ProvisionOutcome, ProvisionError> {
        if self.schema_exists() {
            tracing::info!("schema '{}' already present", self.spec.name);
            self.record(ProvisionEvent::SchemaPresent {
                schema: self.spec.name.clone(),
            });
            return Ok(ProvisionOutcome::AlreadyPresent);
        }

        let dir = self.bundle_dir()?;
        let bundle = progress.bundle.insert(self.seal_bundle(&dir)?);

        self.upload(&bundle.path)?;
        self.record(ProvisionEvent::BundleUploaded { bytes: bundle.bytes });

        if !self.retain_bundle {
            match std::fs::remove_file(&bundle.path) {
                Ok(()) => bundle.retained = false,
                Err(e) => tracing::warn!("cannot delete {}: {}", bundle.path.display(), e),
            }
        }

        for stmt in &self.spec.ddl {
            tracing::info!("{}", stmt);
            match self.adhoc(stmt)? {
                CallOutcome::Ok => progress.ddl_applied += 1,
                CallOutcome::Rejected(message) if classify::is_already_exists_race(&message) => {
                    tracing::info!("lost provisioning race: {}", message);
                    self.record(ProvisionEvent::RaceLost {
                        statement: stmt.clone(),
                        message,
                    });
                    return Ok(ProvisionOutcome::LostRace);
                }
                CallOutcome::Rejected(message) => {
                    return Err(ProvisionError::DdlFailed {
                        statement: stmt.clone(),
                        message,
                    });
                }
            }
        }

        for stmt in &self.spec.procedures {
            tracing::info!("{}", stmt);
            match self.adhoc(stmt)? {
                CallOutcome::Ok => progress.procedures_applied += 1,
                CallOutcome::Rejected(message) => {
                    return Err(ProvisionError::ProcedureDefinitionFailed {
                        statement: stmt.clone(),
                        message,
                    });
                }
            }
        }

        if self.schema_exists() {
            Ok(ProvisionOutcome::Created)
        } else {
            tracing::warn!("schema '{}' not visible after provisioning", self.spec.name);
            Ok(ProvisionOutcome::NotVisible)
        }
    }

    /// Work directory for this attempt. A temporary directory is kept on disk;
    /// cleaning it up is left to the caller.
    fn bundle_dir(&self) -> Result<PathBuf, ProvisionError> {
        match self.work_dir {
            Some(ref dir) => {
                std::fs::create_dir_all(dir).map_err(|e| ProvisionError::io(dir, e))?;
                Ok(dir.clone())
            }
            None => tempfile::Builder::new()
                .prefix("schemaforge")
                .tempdir()
                .map(|d| d.keep())
                .map_err(|e| ProvisionError::io(std::env::temp_dir(), e)),
        }
    }

    fn upload(&self, path: &Path) -> Result<(), ProvisionError> {
        let payload = std::fs::read(path).map_err(|e| ProvisionError::io(path, e))?;
        tracing::info!("calling {} to load bundle containing procedures", UPDATE_CLASSES);
        let result = self
            .client
            .call_procedure(UPDATE_CLASSES, &[Param::Bytes(payload), Param::Null]);
        match transport::outcome(result)? {
            CallOutcome::Ok => Ok(()),
            CallOutcome::Rejected(message) => Err(ProvisionError::UploadFailed(message)),
        }
    }

    fn adhoc(&self, stmt: &str) -> Result<CallOutcome, ProvisionError> {
        let result = self
            .client
            .call_procedure(ADHOC, &[Param::Str(stmt.to_string())]);
        Ok(transport::outcome(result)?)
    }
}

/// Best-effort removal of a partially written bundle.
fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("cannot remove partial bundle {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::embedded::EmbeddedResources;
    use crate::transport::memory::{Fault, MemoryDatabase, ProcedureSource};
    use std::fs::File;
    use std::io::Read;

    const CLASS: &[u8] = b"\xCA\xFE\xBA\xBE\x00\x00\x00\x34";

    fn spec() -> ProvisioningSpec {
        serde_yaml_ng::from_str(
            r#"
version: "1.0"
name: kv
package: com.example.kv
bundle: kv-procs.jar
ddl:
  - CREATE TABLE kv (k varchar(80) not null, v varchar(2048), primary key (k));
  - CREATE INDEX kv_v ON kv (v);
procedures:
  - CREATE PROCEDURE PARTITION ON TABLE kv COLUMN k FROM CLASS com.example.kv.Get;
  - CREATE PROCEDURE CountKv AS SELECT COUNT(*) FROM kv;
classes: [com.example.kv.util.Codec]
archives: [lookup.zip]
probe:
  procedure: Get
  params: ["probe-key"]
"#,
        )
        .unwrap()
    }

    fn space() -> EmbeddedResources {
        EmbeddedResources::new()
            .with("com/example/kv/util/Codec.class", CLASS)
            .with("com/example/kv/Get.class", CLASS)
            .with("com/example/kv/lookup.zip", b"PK\x05\x06 lookup")
    }

    fn builder<'a>(
        spec: ProvisioningSpec,
        db: &'a MemoryDatabase,
        space: &'a EmbeddedResources,
        dir: &Path,
    ) -> SchemaBuilder<'a, MemoryDatabase, EmbeddedResources> {
        SchemaBuilder::new(spec, db, space).unwrap().with_work_dir(dir)
    }

    #[test]
    fn test_sf002_provisions_fresh_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        let b = builder(spec(), &db, &space, dir.path());

        let report = b.provision().unwrap();
        assert_eq!(report.outcome, ProvisionOutcome::Created);
        assert_eq!(report.ddl_applied, 2);
        assert_eq!(report.procedures_applied, 2);
        assert!(db.has_table("kv"));
        assert!(db.has_index("kv_v"));
        assert_eq!(
            db.procedure("Get"),
            Some(ProcedureSource::Class("com.example.kv.Get".into()))
        );
        assert_eq!(
            db.calls(),
            vec!["Get", UPDATE_CLASSES, ADHOC, ADHOC, ADHOC, ADHOC, "Get"]
        );
    }

    #[test]
    fn test_sf002_present_schema_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new().with_procedure("Get");
        let space = space();
        let b = builder(spec(), &db, &space, dir.path());

        assert!(!b.provision_if_needed().unwrap());
        assert_eq!(db.calls(), vec!["Get"]);
        assert!(!dir.path().join("kv-procs.jar").exists());
    }

    #[test]
    fn test_sf002_second_call_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        let b = builder(spec(), &db, &space, dir.path());

        assert!(b.provision_if_needed().unwrap());
        assert!(!b.provision_if_needed().unwrap());
        assert_eq!(db.call_count(UPDATE_CLASSES), 1);

        // A fresh builder with the same spec sees the same thing
        let again = builder(spec(), &db, &space, dir.path());
        assert!(!again.provision_if_needed().unwrap());
        assert_eq!(db.call_count(UPDATE_CLASSES), 1);
    }

    #[test]
    fn test_sf002_ddl_applied_in_declared_order() {
        let dir = tempfile::tempdir().unwrap();
        let space = space();

        let mut reversed = spec();
        reversed.ddl.reverse();
        let db = MemoryDatabase::new();
        let err = builder(reversed, &db, &space, dir.path())
            .provision()
            .unwrap_err();
        match err {
            ProvisionError::DdlFailed { statement, message } => {
                assert!(statement.starts_with("CREATE INDEX kv_v"));
                assert!(message.contains("object not found: KV"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!db.has_table("kv"));

        let db = MemoryDatabase::new();
        assert!(builder(spec(), &db, &space, dir.path())
            .provision_if_needed()
            .unwrap());
    }

    #[test]
    fn test_sf002_already_exists_is_lost_race() {
        let dir = tempfile::tempdir().unwrap();
        // Peer created the table but has not yet defined the probe procedure
        let db = MemoryDatabase::new().with_table("kv");
        let space = space();
        let b = builder(spec(), &db, &space, dir.path());

        let report = b.provision().unwrap();
        assert_eq!(report.outcome, ProvisionOutcome::LostRace);
        assert!(!report.newly_provisioned());
        assert_eq!(report.ddl_applied, 0);
        assert_eq!(db.procedure("Get"), None);
    }

    #[test]
    fn test_sf002_race_reported_as_status() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        db.inject(ADHOC, Fault::Status("object name already exists: KV".into()));
        let b = builder(spec(), &db, &space, dir.path());
        assert!(!b.provision_if_needed().unwrap());
    }

    #[test]
    fn test_sf002_other_ddl_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        db.inject(ADHOC, Fault::Rejected("unexpected token: TABEL".into()));
        let err = builder(spec(), &db, &space, dir.path())
            .provision_if_needed()
            .unwrap_err();
        match err {
            ProvisionError::DdlFailed { message, .. } => assert_eq!(message, "unexpected token: TABEL"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sf002_procedure_failure_is_fatal_even_if_exists() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        let mut s = spec();
        s.procedures.push("CREATE PROCEDURE CountKv AS SELECT 1;".into());
        let err = builder(s, &db, &space, dir.path()).provision().unwrap_err();
        match err {
            ProvisionError::ProcedureDefinitionFailed { statement, message } => {
                assert_eq!(statement, "CREATE PROCEDURE CountKv AS SELECT 1;");
                assert!(classify::is_already_exists_race(&message));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sf002_transport_error_in_ddl_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        db.inject(ADHOC, Fault::Connection("connection lost".into()));
        let err = builder(spec(), &db, &space, dir.path())
            .provision()
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Transport(transport::CallError::Connection(_))
        ));
    }

    #[test]
    fn test_sf002_oversized_bundle_never_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        let mut s = spec();
        s.policy.max_message_bytes = 100;
        let err = builder(s, &db, &space, dir.path()).provision().unwrap_err();
        match err {
            ProvisionError::BundleTooLarge { size, limit, .. } => {
                assert_eq!(limit, 90);
                assert!(size > limit);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(db.call_count(UPDATE_CLASSES), 0);
        assert_eq!(db.call_count(ADHOC), 0);
    }

    #[test]
    fn test_sf002_missing_resource_before_any_upload() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = EmbeddedResources::new().with("com/example/kv/util/Codec.class", CLASS);
        let err = builder(spec(), &db, &space, dir.path())
            .provision()
            .unwrap_err();
        match err {
            ProvisionError::MissingResource(path) => assert_eq!(path, "/com/example/kv/Get.class"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(db.calls(), vec!["Get"]);
        assert!(!dir.path().join("kv-procs.jar").exists());
    }

    #[test]
    fn test_sf002_upload_failure() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        db.inject(UPDATE_CLASSES, Fault::Status("Unexpected condition".into()));
        let err = builder(spec(), &db, &space, dir.path())
            .provision()
            .unwrap_err();
        match err {
            ProvisionError::UploadFailed(msg) => assert_eq!(msg, "Unexpected condition"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(db.call_count(ADHOC), 0);
    }

    #[test]
    fn test_sf002_bundle_deleted_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        let b = builder(spec(), &db, &space, dir.path());
        assert!(!b.retain_bundle());
        let report = b.provision().unwrap();
        let bundle = report.bundle.unwrap();
        assert!(!bundle.retained);
        assert!(!bundle.path.exists());
    }

    #[test]
    fn test_sf002_retained_bundle_layout() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        let mut b = builder(spec(), &db, &space, dir.path());
        b.set_retain_bundle(true);

        let bundle = b.provision().unwrap().bundle.unwrap();
        assert!(bundle.retained);
        assert_eq!(bundle.entries, 3);
        assert!(bundle.hash.starts_with("blake3:"));

        let mut archive = zip::ZipArchive::new(File::open(&bundle.path).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                packager::MANIFEST_PATH,
                "com/example/kv/util/Codec.class",
                "com/example/kv/Get.class",
                "com/example/kv/lookup.zip",
            ]
        );
        let mut buf = Vec::new();
        archive
            .by_name("com/example/kv/Get.class")
            .unwrap()
            .read_to_end(&mut buf)
            .unwrap();
        assert_eq!(buf, CLASS);
    }

    #[test]
    fn test_sf002_bare_procedure_class_under_package() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        let mut s = spec();
        s.procedures = vec!["CREATE PROCEDURE FROM CLASS Get;".into()];
        let b = builder(s, &db, &space, dir.path());
        assert_eq!(b.procedure_classes()[0].class_name, "Get");
        assert!(b.provision_if_needed().unwrap());
        assert!(db
            .loaded_classes()
            .contains(&"com/example/kv/Get.class".to_string()));
    }

    #[test]
    fn test_sf002_indeterminate_probe_still_provisions() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        db.inject("Get", Fault::Connection("no connections".into()));
        let b = builder(spec(), &db, &space, dir.path());
        assert!(b.provision_if_needed().unwrap());
    }

    #[test]
    fn test_sf002_not_visible_after_provisioning() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        let mut s = spec();
        s.probe.procedure = "NeverDefined".into();
        let report = builder(s, &db, &space, dir.path()).provision().unwrap();
        assert_eq!(report.outcome, ProvisionOutcome::NotVisible);
        assert!(!report.newly_provisioned());
    }

    #[test]
    fn test_sf002_invalid_probe_params() {
        let db = MemoryDatabase::new();
        let space = space();
        let mut s = spec();
        s.probe.params = vec![serde_yaml_ng::Value::Sequence(vec![])];
        let err = SchemaBuilder::new(s, &db, &space).err().unwrap();
        assert!(matches!(err, ProvisionError::InvalidSpec(_)));
    }

    #[test]
    fn test_sf002_threads_share_one_builder() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        let b = builder(spec(), &db, &space, dir.path());

        let results: Vec<bool> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| b.provision_if_needed().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| **r).count(), 1);
        assert_eq!(db.call_count(UPDATE_CLASSES), 1);
    }

    #[test]
    fn test_sf002_independent_provisioners_race() {
        let db = MemoryDatabase::new();
        let space = space();
        let dirs: Vec<_> = (0..4).map(|_| tempfile::tempdir().unwrap()).collect();

        let results: Vec<bool> = std::thread::scope(|scope| {
            let handles: Vec<_> = dirs
                .iter()
                .map(|d| {
                    let b = builder(spec(), &db, &space, d.path());
                    scope.spawn(move || b.provision_if_needed().unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| **r).count(), 1);
        assert!(db.procedure("Get").is_some());
    }

    #[test]
    fn test_sf002_event_log_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let state = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        let b = builder(spec(), &db, &space, dir.path())
            .with_event_log(EventLog::new(state.path(), "kv"));

        b.provision().unwrap();
        b.provision().unwrap();

        let kinds: Vec<String> = EventLog::new(state.path(), "kv").read()
            .unwrap()
            .into_iter()
            .map(|te| {
                serde_json::to_value(&te.event).unwrap()["event"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "provision_started",
                "bundle_sealed",
                "bundle_uploaded",
                "provision_completed",
                "provision_started",
                "schema_present",
                "provision_completed",
            ]
        );
    }

    #[test]
    fn test_sf002_event_log_records_race() {
        let dir = tempfile::tempdir().unwrap();
        let state = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new().with_table("kv");
        let space = space();
        let b = builder(spec(), &db, &space, dir.path())
            .with_event_log(EventLog::new(state.path(), "kv"));
        b.provision().unwrap();

        let events = EventLog::new(state.path(), "kv").read().unwrap();
        assert!(events
            .iter()
            .any(|te| matches!(te.event, ProvisionEvent::RaceLost { .. })));
    }

    #[test]
    fn test_sf002_package_bundle_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        let b = builder(spec(), &db, &space, dir.path());
        let info = b.package_bundle(dir.path()).unwrap();
        assert!(info.path.exists());
        assert_eq!(info.entries, 3);
        assert!(db.calls().is_empty());
    }

    #[test]
    fn test_sf002_package_bundle_waits_for_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let space = space();
        let mut s = spec();
        s.policy.retain_bundle = true;
        let b = builder(s, &db, &space, dir.path());

        std::thread::scope(|scope| {
            let packagers: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| b.package_bundle(dir.path())))
                .collect();
            let attempt = scope.spawn(|| b.provision());
            for h in packagers {
                assert_eq!(h.join().unwrap().unwrap().entries, 3);
            }
            assert_eq!(attempt.join().unwrap().unwrap().outcome, ProvisionOutcome::Created);
        });

        let file = File::open(dir.path().join("kv-procs.jar")).unwrap();
        assert_eq!(zip::ZipArchive::new(file).unwrap().len(), 3);
        assert_eq!(db.call_count(UPDATE_CLASSES), 1);
    }

    /// Resource space whose reads always fail.
    struct Unreadable;

    impl ResourceSpace for Unreadable {
        fn open(&self, _name: &str) -> std::io::Result<Option<Box<dyn Read + '_>>> {
            Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
        }
    }

    #[test]
    fn test_sf002_unreadable_resource_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDatabase::new();
        let b = SchemaBuilder::new(spec(), &db, &Unreadable)
            .unwrap()
            .with_work_dir(dir.path());

        let err = b.provision().unwrap_err();
        assert!(matches!(err, ProvisionError::Io { .. }), "{err}");
        assert_eq!(db.call_count(UPDATE_CLASSES), 0);
        assert!(!db.has_table("kv"));
    }
}
