//! Provenance: bundle fingerprints and the provisioning event log.

pub mod eventlog;
pub mod hasher;
