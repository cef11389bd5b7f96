//! Shared HTTP utilities for the payment service workspace.
//!
//! Framework-agnostic JSON error bodies and resource path helpers used by
//! api-server.

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Create a structured error JSON with a default message based on the code.
///
/// Returns: `{"error": {"code": "<code>", "message": "<default message>"}}`
pub fn json_err(code: &str) -> serde_json::Value {
    let message = match code {
        "invalid_query" => "Invalid search query",
        "error" | "internal" => "Internal server error",
        _ => code, // Fallback to code as message for unknown codes
    };
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a structured error JSON with a custom message.
///
/// Returns: `{"error": {"code": "<code>", "message": "<message>"}}`
pub fn json_error_with_message(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create an entity-scoped validation error body.
///
/// Names the entity and a stable error key so clients can localize the message
/// (`error.<key>`).
pub fn json_entity_error(entity: &str, key: &str, title: &str, status: u16) -> serde_json::Value {
    serde_json::json!({
        "entityName": entity,
        "errorKey": key,
        "title": title,
        "status": status,
        "message": format!("error.{}", key),
        "params": entity,
    })
}

// ============================================================================
// Resource paths
// ============================================================================

/// Path of a single resource under a collection path, used for `Location`.
pub fn resource_location(collection: &str, id: i64) -> String {
    format!("{}/{}", collection.trim_end_matches('/'), id)
}
