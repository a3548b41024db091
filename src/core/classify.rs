//! SF-008: Server message classification.
//!
//! The cluster reports "already exists" and "no such procedure" only as
//! message text. Both matching rules live here and nowhere else.

/// Substring the cluster uses when a CREATE hits an existing object.
pub const OBJECT_ALREADY_EXISTS: &str = "object name already exists";

/// True when a DDL rejection means another provisioner already created the object.
pub fn is_already_exists_race(message: &str) -> bool {
    message.contains(OBJECT_ALREADY_EXISTS)
}

/// Exact rejection text for a call to an undefined procedure.
pub fn missing_procedure_message(procedure: &str) -> String {
    format!("Procedure {} was not found", procedure)
}

/// True when `message` is exactly the "no such procedure" rejection for `procedure`.
pub fn is_missing_procedure(message: &str, procedure: &str) -> bool {
    message == missing_procedure_message(procedure)
}
