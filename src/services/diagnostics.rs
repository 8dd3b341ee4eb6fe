//! Correlation of caller diagnostics with the completion they describe.

use crate::models::{DiagnosticInput, NewLogEntry};

/// Attach a diagnostic to the completion it was reported for.
///
/// Level, message and details are copied verbatim. Performs no I/O.
pub fn correlate(
    diagnostic: DiagnosticInput,
    api_key_id: i64,
    upstream_id: Option<i64>,
    completion_id: i64,
) -> NewLogEntry {
    NewLogEntry {
        level: diagnostic.level,
        message: diagnostic.message,
        details: diagnostic.details,
        related_api_key_id: api_key_id,
        related_upstream_id: upstream_id,
        related_completion_id: completion_id,
    }
}
