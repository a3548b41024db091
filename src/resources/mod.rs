//! SF-004: Resource resolution: locate the bytes for every bundle entry.
//!
//! A resource space maps logical, slash-separated names (the way a class path
//! does: `com/example/Get.class`) to readable content. Two spaces ship:
//! 1. [`embedded::EmbeddedResources`]: bytes compiled into the binary
//! 2. [`directory::DirectoryResources`]: files under a root directory
//!
//! Presence is checked for every entry before the bundle is written; content
//! is opened only when its entry is written, one stream at a time.

pub mod directory;
pub mod embedded;

use crate::core::error::ProvisionError;
use crate::core::types::{ProcedureReference, ProvisioningSpec};
use std::io::{self, Read};

/// Source of bundle content, looked up by logical name.
///
/// `Ok(None)` means the resource does not exist. `Err` is reserved for real
/// I/O failures on a resource that may well exist.
pub trait ResourceSpace {
    /// Open `name` for reading.
    fn open(&self, name: &str) -> io::Result<Option<Box<dyn Read + '_>>>;

    /// Whether `name` exists, without keeping anything open.
    fn contains(&self, name: &str) -> io::Result<bool> {
        Ok(self.open(name)?.is_some())
    }
}

/// Which part of the spec an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    AuxiliaryClass,
    ProcedureClass,
    Archive,
}

/// A planned bundle entry: where it comes from and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    pub kind: EntryKind,
    /// Lookup name in the resource space (leading `/`, class-path style)
    pub resource: String,
    /// Path inside the bundle
    pub entry_path: String,
}

/// A resource ready to be packaged; consumed exactly once.
pub struct ResolvedResource<'a> {
    pub entry_path: String,
    pub reader: Box<dyn Read + 'a>,
}

impl std::fmt::Debug for ResolvedResource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedResource")
            .field("entry_path", &self.entry_path)
            .finish_non_exhaustive()
    }
}

/// `com.example` -> `com/example`
pub fn namespace_path(namespace: &str) -> String {
    namespace.replace('.', "/")
}

/// Bundle path of a fully qualified code unit: `a.b.C` -> `a/b/C.class`.
pub fn class_entry_path(class: &str) -> String {
    format!("{}.class", namespace_path(class))
}

/// Bundle path of a procedure class. Dotted names are taken as fully
/// qualified; bare names live under the package.
pub fn procedure_entry_path(package: &str, class: &str) -> String {
    if class.contains('.') || package.is_empty() {
        class_entry_path(class)
    } else {
        format!("{}/{}.class", namespace_path(package), class)
    }
}

/// Bundle path of an auxiliary archive, stored under the package.
pub fn archive_entry_path(package: &str, archive: &str) -> String {
    if package.is_empty() {
        archive.to_string()
    } else {
        format!("{}/{}", namespace_path(package), archive)
    }
}

/// Every bundle entry, in packaging order: auxiliary classes, then procedure
/// classes, then archives. Duplicates are passed through unchanged.
pub fn plan_entries(spec: &ProvisioningSpec, procedures: &[ProcedureReference]) -> Vec<BundleEntry> {
    let classes = spec.classes.iter().map(|c| (EntryKind::AuxiliaryClass, class_entry_path(c)));
    let procs = procedures.iter().map(|p| {
        (
            EntryKind::ProcedureClass,
            procedure_entry_path(&spec.package, &p.class_name),
        )
    });
    let archives = spec
        .archives
        .iter()
        .map(|a| (EntryKind::Archive, archive_entry_path(&spec.package, a)));

    classes
        .chain(procs)
        .chain(archives)
        .map(|(kind, entry_path)| BundleEntry {
            kind,
            resource: format!("/{}", entry_path),
            entry_path,
        })
        .collect()
}

fn lookup_name(name: &str) -> &str {
    name.trim_start_matches('/')
}

/// Open one resource by name. A missing resource is a packaging defect; any
/// other failure is reported as I/O against that name.
pub fn resolve<'a, S: ResourceSpace + ?Sized>(
    space: &'a S,
    name: &str,
) -> Result<Box<dyn Read + 'a>, ProvisionError> {
    space
        .open(lookup_name(name))
        .map_err(|e| ProvisionError::io(name, e))?
        .ok_or_else(|| ProvisionError::MissingResource(name.to_string()))
}

/// Check every planned entry, failing on the first one that is absent or
/// unreadable. The returned readers open their resource on first read.
pub fn resolve_all<'a, S: ResourceSpace + ?Sized>(
    space: &'a S,
    entries: &[BundleEntry],
) -> Result<Vec<ResolvedResource<'a>>, ProvisionError> {
    let mut resolved = Vec::with_capacity(entries.len());
    for e in entries {
        tracing::info!("processing {}", e.resource);
        let present = space
            .contains(lookup_name(&e.resource))
            .map_err(|err| ProvisionError::io(&e.resource, err))?;
        if !present {
            return Err(ProvisionError::MissingResource(e.resource.clone()));
        }
        resolved.push(ResolvedResource {
            entry_path: e.entry_path.clone(),
            reader: Box::new(DeferredReader {
                space,
                name: e.resource.clone(),
                inner: None,
            }),
        });
    }
    Ok(resolved)
}

/// Opens its resource on the first read and closes it when dropped.
struct DeferredReader<'a, S: ResourceSpace + ?Sized> {
    space: &'a S,
    name: String,
    inner: Option<Box<dyn Read + 'a>>,
}

impl<'a, S: ResourceSpace + ?Sized> Read for DeferredReader<'a, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.inner.is_none() {
            let space: &'a S = self.space;
            let opened = space
                .open(lookup_name(&self.name))
                .map_err(|e| io::Error::new(e.kind(), format!("cannot open {}: {}", self.name, e)))?
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("{} disappeared before it was packaged", self.name),
                    )
                })?;
            self.inner = Some(opened);
        }
        match self.inner {
            Some(ref mut r) => r.read(buf),
            None => Ok(0),
        }
    }
}
