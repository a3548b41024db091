//! Core provisioning logic: types, parsing, extraction, packaging, orchestration.

pub mod classify;
pub mod error;
pub mod extractor;
pub mod guard;
pub mod orchestrator;
pub mod packager;
pub mod parser;
pub mod prober;
pub mod types;
