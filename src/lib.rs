//! Schemaforge: idempotent schema provisioning for clustered databases.
//!
//! Probe, bundle, upload, apply. A concurrent provisioner that gets there
//! first is detected from the database's own "already exists" rejection.

pub mod cli;
pub mod core;
pub mod provenance;
pub mod resources;
pub mod transport;
