//! Skill abstraction hosted by the MCP server.
//!
//! A skill is a named unit of functionality with a declared parameter
//! schema and optional resources and prompts. Skills are registered once
//! at startup in a [`SkillRegistry`] and invoked by the dispatcher via
//! `tools/call`. Descriptors are immutable after registration.
//!
//! # Modules
//!
//! - [`context`] — process-wide key/value execution context
//! - [`registry`] — name → skill mapping with URI uniqueness enforcement
//! - [`schema`] — declarative parameter schemas and validation

pub mod context;
pub mod registry;
pub mod schema;

pub use context::ExecutionContext;
pub use registry::SkillRegistry;
pub use schema::{ParamSchema, ParamSpec, ParamType};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::ErrorDescriptor;

/// A read-only, URI-addressed data endpoint exposed by a skill.
///
/// URIs follow the `skill://<capability>/<resource>` scheme and must be
/// unique within a registry.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDescriptor {
    /// Stable resource URI.
    pub uri: String,
    /// Short resource name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// MIME type of the resource contents.
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Hint that the contents may be cached by the client.
    #[serde(rename = "cacheHint", skip_serializing_if = "Option::is_none")]
    pub cache_hint: Option<bool>,
}

/// The materialised contents of one resource read.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceContents {
    /// The URI that was read.
    pub uri: String,
    /// MIME type of `text`.
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// The resource body.
    pub text: String,
}

/// An argument accepted by a prompt template.
#[derive(Debug, Clone, Serialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the argument must be supplied.
    pub required: bool,
}

/// A prompt template exposed by a skill.
#[derive(Debug, Clone, Serialize)]
pub struct PromptDescriptor {
    /// Prompt name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Accepted arguments (may be empty).
    pub arguments: Vec<PromptArgument>,
}

/// One message of a materialised prompt.
#[derive(Debug, Clone)]
pub struct PromptMessage {
    /// Message role ("user" or "assistant").
    pub role: &'static str,
    /// Message text.
    pub text: String,
}

impl Serialize for PromptMessage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("role", self.role)?;
        map.serialize_entry(
            "content",
            &serde_json::json!({ "type": "text", "text": self.text }),
        )?;
        map.end()
    }
}

/// The materialised contents of one prompt.
#[derive(Debug, Clone, Serialize)]
pub struct PromptContents {
    /// Prompt description.
    pub description: String,
    /// Prompt messages.
    pub messages: Vec<PromptMessage>,
}

/// Immutable description of a skill, constructed once at startup.
#[derive(Debug)]
pub struct SkillDescriptor {
    /// Unique skill name (the `tools/call` tool name).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Declared parameter schema.
    pub schema: ParamSchema,
    /// Resources exposed by the skill.
    pub resources: Vec<ResourceDescriptor>,
    /// Prompts exposed by the skill.
    pub prompts: Vec<PromptDescriptor>,
}

/// The outcome of one skill invocation.
///
/// Exactly one of `payload`/`error` is populated depending on `success`.
/// Field names follow the established wire contract.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Whether the invocation succeeded.
    pub success: bool,

    /// Name of the skill that produced this result.
    #[serde(rename = "function_name")]
    pub skill: String,

    /// Success payload.
    #[serde(rename = "result", skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
}

impl ExecutionResult {
    /// Creates a successful result carrying `payload`.
    #[must_use]
    pub fn ok(skill: impl Into<String>, payload: Value) -> Self {
        Self {
            success: true,
            skill: skill.into(),
            payload: Some(payload),
            error: None,
        }
    }

    /// Creates a failed result carrying `error`.
    #[must_use]
    pub fn fail(skill: impl Into<String>, error: ErrorDescriptor) -> Self {
        Self {
            success: false,
            skill: skill.into(),
            payload: None,
            error: Some(error),
        }
    }
}

/// A named unit of functionality invocable through the dispatcher.
///
/// Implementations must be stateless across invocations apart from what
/// they record in the [`ExecutionContext`]; the dispatcher executes
/// strictly sequentially, so `execute` never runs concurrently with
/// itself.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Returns the immutable descriptor for this skill.
    fn descriptor(&self) -> &SkillDescriptor;

    /// Executes the skill against caller-supplied arguments.
    ///
    /// Never returns a transport-level error: every failure is folded
    /// into an [`ExecutionResult`] with `success == false`.
    async fn execute(&self, ctx: &mut ExecutionContext, args: &Value) -> ExecutionResult;

    /// Reads one of this skill's resources by URI.
    ///
    /// Returns `None` for URIs the skill does not own.
    fn read_resource(&self, ctx: &ExecutionContext, uri: &str) -> Option<ResourceContents>;

    /// Materialises one of this skill's prompts by name.
    ///
    /// Returns `None` for unknown prompt names. Default: no prompts.
    fn prompt(&self, name: &str) -> Option<PromptContents> {
        let _ = name;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_result_success_wire_shape() {
        let result = ExecutionResult::ok("gmail_send", serde_json::json!({"message": "sent"}));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["function_name"], "gmail_send");
        assert_eq!(json["result"]["message"], "sent");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn execution_result_failure_wire_shape() {
        use crate::error::{ErrorDescriptor, ErrorKind};

        let result = ExecutionResult::fail(
            "gmail_send",
            ErrorDescriptor::new(ErrorKind::ValidationError, "Username is required"),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["type"], "validation_error");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn prompt_message_wire_shape() {
        let message = PromptMessage {
            role: "user",
            text: "hello".to_string(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"]["type"], "text");
        assert_eq!(json["content"]["text"], "hello");
    }

    #[test]
    fn resource_descriptor_camel_case() {
        let descriptor = ResourceDescriptor {
            uri: "skill://gmail_send/status".to_string(),
            name: "gmail_send_status".to_string(),
            description: "status".to_string(),
            mime_type: "application/json".to_string(),
            cache_hint: None,
        };
        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(json.contains("mimeType"));
        assert!(!json.contains("cacheHint"));
    }
}
