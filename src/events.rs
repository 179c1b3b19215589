//! Behavioral event types and payload builders.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    FieldEdit,
    Action,
    PageView,
    ProjectOpen,
    Error,
}

impl EventType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FieldEdit => "field_edit",
            Self::Action => "action",
            Self::PageView => "page_view",
            Self::ProjectOpen => "project_open",
            Self::Error => "error",
        }
    }
}

/// A tracked event, bound to the session it was recorded under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedEvent {
    #[serde(skip)]
    pub session_id: String,
    pub event_type: EventType,
    pub timestamp: i64,
    pub event_data: Value,
}

impl QueuedEvent {
    #[must_use]
    pub fn new(session_id: impl Into<String>, event_type: EventType, timestamp: i64, event_data: Value) -> Self {
        Self { session_id: session_id.into(), event_type, timestamp, event_data }
    }
}

/// Payload missing a field the backend requires.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{event} event missing required field `{field}`")]
pub struct MissingField {
    pub event: &'static str,
    pub field: &'static str,
}

fn require(event: EventType, field: &'static str, value: &str) -> Result<(), MissingField> {
    if value.trim().is_empty() {
        return Err(MissingField { event: event.as_str(), field });
    }
    Ok(())
}

// =============================================================================
// PAYLOAD BUILDERS
// =============================================================================

/// # Errors
///
/// Returns [`MissingField`] if `field` is blank.
pub fn field_edit_data(
    field: &str,
    old_value: &Value,
    new_value: &Value,
    entity: Option<&str>,
) -> Result<Value, MissingField> {
    require(EventType::FieldEdit, "fieldName", field)?;
    let mut data = json!({ "fieldName": field, "oldValue": old_value, "newValue": new_value });
    if let Some(entity) = entity {
        data["entity"] = json!(entity);
    }
    Ok(data)
}

/// # Errors
///
/// Returns [`MissingField`] if `page` is blank.
pub fn page_view_data(page: &str, project_id: Option<&str>) -> Result<Value, MissingField> {
    require(EventType::PageView, "page", page)?;
    Ok(json!({ "page": page, "projectId": project_id }))
}

/// # Errors
///
/// Returns [`MissingField`] if `project_id` is blank.
pub fn project_open_data(project_id: &str, project_name: Option<&str>) -> Result<Value, MissingField> {
    require(EventType::ProjectOpen, "projectId", project_id)?;
    Ok(json!({ "projectId": project_id, "projectName": project_name }))
}

/// # Errors
///
/// Returns [`MissingField`] if `action` is blank.
pub fn action_data(action: &str, details: Option<Value>) -> Result<Value, MissingField> {
    require(EventType::Action, "action", action)?;
    let mut data = json!({ "action": action });
    if let Some(details) = details {
        data["details"] = details;
    }
    Ok(data)
}

/// # Errors
///
/// Returns [`MissingField`] if `message` is blank.
pub fn error_data(message: &str, context: Option<&str>) -> Result<Value, MissingField> {
    require(EventType::Error, "message", message)?;
    Ok(json!({ "message": message, "context": context }))
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
