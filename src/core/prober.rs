//! SF-003: Existence probe.
//!
//! Calls a read-only procedure that only exists once the schema is in place.
//! Success means present; the exact "Procedure X was not found" rejection means
//! absent; anything else is indeterminate, reported, and treated as absent.

use super::classify;
use super::types::ExistenceVerdict;
use crate::transport::{CallError, DatabaseClient, Param};

/// Run the probe and classify the outcome.
pub fn probe<C: DatabaseClient + ?Sized>(
    client: &C,
    procedure: &str,
    params: &[Param],
) -> ExistenceVerdict {
    match client.call_procedure(procedure, params) {
        Ok(resp) if resp.is_success() => ExistenceVerdict::Exists,
        Ok(resp) => ExistenceVerdict::Indeterminate(format!(
            "error while checking schema existence: {}",
            resp.status_string
        )),
        Err(CallError::Rejected(msg)) if classify::is_missing_procedure(&msg, procedure) => {
            ExistenceVerdict::Absent
        }
        Err(CallError::Rejected(msg)) => ExistenceVerdict::Indeterminate(format!(
            "unexpected rejection while checking schema existence: {}",
            msg
        )),
        Err(e) => ExistenceVerdict::Indeterminate(format!(
            "error while checking schema existence: {}",
            e
        )),
    }
}

/// Probe and collapse to a boolean, reporting indeterminate outcomes.
pub fn schema_exists<C: DatabaseClient + ?Sized>(client: &C, procedure: &str, params: &[Param]) -> bool {
    let verdict = probe(client, procedure, params);
    if let ExistenceVerdict::Indeterminate(ref why) = verdict {
        tracing::error!(procedure, "{}", why);
    }
    verdict.exists()
}
