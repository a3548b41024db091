//! SF-005: Procedure class extraction.
//!
//! Finds procedure definitions of the form `CREATE PROCEDURE ... FROM CLASS x;`
//! and returns the referenced class names so the packager can include them.
//! Extraction is best-effort: a marked statement that cannot be parsed is
//! reported and skipped.

use super::types::ProcedureReference;

/// Marker, in normalized (uppercase, single-line) form.
pub const FROM_CLASS_MARKER: &str = " FROM CLASS ";

/// Statement terminator the class token must end with.
pub const TERMINATOR: char = ';';

/// A marked statement whose class name could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAnomaly {
    pub statement_index: usize,
    pub statement: String,
}

/// Uppercase and fold line breaks into spaces.
fn normalize(statement: &str) -> String {
    statement
        .to_uppercase()
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
}

/// True when the statement defines a procedure from an external class.
pub fn references_class(statement: &str) -> bool {
    normalize(statement).contains(FROM_CLASS_MARKER)
}

/// Extract class references and parse anomalies, both in statement order.
pub fn scan(statements: &[String]) -> (Vec<ProcedureReference>, Vec<ParseAnomaly>) {
    let mut refs = Vec::new();
    let mut anomalies = Vec::new();

    for (i, stmt) in statements.iter().enumerate() {
        if !references_class(stmt) {
            continue;
        }
        let class = stmt
            .split_whitespace()
            .last()
            .and_then(|tok| tok.strip_suffix(TERMINATOR))
            .map(|tok| tok.trim_end_matches(TERMINATOR))
            .filter(|name| !name.is_empty());
        match class {
            Some(name) => refs.push(ProcedureReference {
                statement_index: i,
                class_name: name.to_string(),
            }),
            None => anomalies.push(ParseAnomaly {
                statement_index: i,
                statement: stmt.clone(),
            }),
        }
    }

    (refs, anomalies)
}

/// Extract class references, logging any statement that had to be skipped.
pub fn extract_procedure_classes(statements: &[String]) -> Vec<ProcedureReference> {
    let (refs, anomalies) = scan(statements);
    for a in &anomalies {
        tracing::warn!(
            statement = a.statement_index,
            "parsing of '{}' went wrong; can't find proc name",
            a.statement
        );
    }
    refs
}
