//! The gmail_send skill: email sending via Gmail App Password
//! authentication.
//!
//! Pipeline for one invocation: validate parameters, convert the
//! Markdown body to email-safe HTML, drive one SMTP session, record the
//! outcome in the execution context. Validation failures never reach the
//! network; transport failures are classified at the session boundary.
//!
//! # Modules
//!
//! - [`markdown`] — two-engine Markdown to HTML conversion
//! - [`smtp`] — session state machine and relay seam
//! - [`validate`] — schema and semantic parameter validation

pub mod markdown;
pub mod smtp;
pub mod validate;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::SmtpConfig;
use crate::error::{ErrorDescriptor, ErrorKind};
use crate::skill::context::namespaced;
use crate::skill::{
    ExecutionContext, ExecutionResult, ParamSchema, ParamSpec, ParamType, PromptContents,
    PromptDescriptor, PromptMessage, ResourceContents, ResourceDescriptor, Skill, SkillDescriptor,
};
use markdown::Engine;
use smtp::{MailMessage, MailSession, Relay, SmtpRelay};

/// The skill's registered name (also the `tools/call` tool name).
pub const SKILL_NAME: &str = "gmail_send";

/// URI of the status resource.
pub const STATUS_URI: &str = "skill://gmail_send/status";

/// URI of the last-result resource.
pub const LAST_RESULT_URI: &str = "skill://gmail_send/last_result";

/// Subject applied when the caller supplies none.
const DEFAULT_SUBJECT: &str = "Email from Gmail Send Skill";

/// Declares the gmail_send parameter schema.
#[must_use]
pub fn send_schema() -> ParamSchema {
    ParamSchema::new(vec![
        ParamSpec::required(
            "username",
            ParamType::String,
            "Gmail username (email address) for authentication. Must be a valid Gmail address.",
        ),
        ParamSpec::required(
            "app_password",
            ParamType::String,
            "Gmail App Password for authentication (not the regular password). Must be a \
             16-character App Password generated from Google Account settings.",
        ),
        ParamSpec::required(
            "content",
            ParamType::String,
            "Email content in Markdown format. Will be converted to HTML for rich formatting. \
             Supports standard Markdown syntax including headers, lists, links, etc.",
        ),
        ParamSpec::required(
            "to_email",
            ParamType::String,
            "Recipient email address. Must be a valid email address.",
        ),
        ParamSpec::optional("subject", ParamType::String, "Email subject line.")
            .with_default(json!(DEFAULT_SUBJECT)),
        ParamSpec::optional(
            "from_name",
            ParamType::String,
            "Display name for the sender. If not provided, uses the username.",
        )
        .with_default(Value::Null),
    ])
}

fn build_descriptor() -> SkillDescriptor {
    SkillDescriptor {
        name: SKILL_NAME.to_string(),
        description: "Send email via Gmail using App Password authentication. Supports Markdown \
                      content conversion to HTML and provides detailed success/failure feedback."
            .to_string(),
        schema: send_schema(),
        resources: vec![
            ResourceDescriptor {
                uri: LAST_RESULT_URI.to_string(),
                name: "gmail_send_last_result".to_string(),
                description: "Last email sending result with status and details".to_string(),
                mime_type: "application/json".to_string(),
                cache_hint: None,
            },
            ResourceDescriptor {
                uri: STATUS_URI.to_string(),
                name: "gmail_send_status".to_string(),
                description: "Current status of Gmail Send skill".to_string(),
                mime_type: "application/json".to_string(),
                cache_hint: Some(false),
            },
        ],
        prompts: vec![PromptDescriptor {
            name: "gmail_send_help".to_string(),
            description: "Get help and usage instructions for Gmail Send skill".to_string(),
            arguments: vec![],
        }],
    }
}

/// The mail-sending skill.
pub struct GmailSendSkill {
    descriptor: SkillDescriptor,
    relay: Box<dyn Relay>,
    smtp: SmtpConfig,
}

impl GmailSendSkill {
    /// Creates the skill with the production SMTP relay.
    #[must_use]
    pub fn new(smtp: SmtpConfig) -> Self {
        let relay = Box::new(SmtpRelay::new(smtp.clone()));
        Self::with_relay(smtp, relay)
    }

    /// Creates the skill with a caller-supplied relay.
    ///
    /// Used by tests to reject at a chosen session stage without any
    /// network activity.
    #[must_use]
    pub fn with_relay(smtp: SmtpConfig, relay: Box<dyn Relay>) -> Self {
        Self {
            descriptor: build_descriptor(),
            relay,
            smtp,
        }
    }

    /// Records `result` as the skill's last result.
    fn record(ctx: &mut ExecutionContext, result: &ExecutionResult) {
        if let Ok(value) = serde_json::to_value(result) {
            ctx.set(namespaced(SKILL_NAME, "last_result"), value);
        }
    }

    fn status(&self, ctx: &ExecutionContext) -> Value {
        json!({
            "skill_name": SKILL_NAME,
            "status": "ready",
            "smtp_server": self.smtp.server,
            "smtp_port": self.smtp.port,
            "markdown_engine": Engine::active().name(),
            "last_execution": ctx.has(&namespaced(SKILL_NAME, "last_result")),
        })
    }

    fn help_text() -> String {
        format!(
            "# Gmail Send Skill Usage\n\n\
             This skill sends emails via Gmail using App Password authentication.\n\n\
             ## Required Parameters:\n\
             - **username**: Your Gmail address (e.g., user@gmail.com)\n\
             - **app_password**: 16-character App Password from Google Account settings\n\
             - **content**: Email content in Markdown format\n\
             - **to_email**: Recipient email address\n\n\
             ## Optional Parameters:\n\
             - **subject**: Email subject line (default: \"{DEFAULT_SUBJECT}\")\n\
             - **from_name**: Display name for sender (default: uses username)\n\n\
             ## App Password Setup:\n\
             1. Go to Google Account settings\n\
             2. Enable 2-Factor Authentication\n\
             3. Generate App Password for \"Mail\"\n\
             4. Use the 16-character password (spaces optional)\n\n\
             ## Markdown Support:\n\
             Content is converted to HTML for rich formatting: headers, lists,\n\
             links, bold/italic, inline code, and block quotes.\n"
        )
    }
}

#[async_trait]
impl Skill for GmailSendSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &mut ExecutionContext, args: &Value) -> ExecutionResult {
        // Fail fast on any validation problem; no network I/O happens
        // past this point unless every constraint holds.
        let params = match validate::validate_args(&self.descriptor.schema, args) {
            Ok(params) => params,
            Err(violations) => {
                let result = ExecutionResult::fail(
                    SKILL_NAME,
                    ErrorDescriptor::new(ErrorKind::ValidationError, violations.join("; ")),
                );
                Self::record(ctx, &result);
                return result;
            }
        };

        tracing::info!(
            from = %params.username,
            to = %params.to_email,
            "attempting to send email"
        );

        let message = MailMessage {
            sender_address: params.username.clone(),
            sender_display_name: params.from_name.clone(),
            recipient_address: params.to_email.clone(),
            subject: params.subject.clone(),
            body_rich: markdown::to_html(&params.content),
            body_markup: params.content,
        };

        let mut session = MailSession::new(self.relay.as_ref());
        let outcome = session
            .send(&message, &params.username, &params.app_password)
            .await;

        let result = match outcome {
            Ok(()) => ExecutionResult::ok(
                SKILL_NAME,
                json!({
                    "message": format!("Email sent successfully to {}", params.to_email),
                    "timestamp": chrono::Local::now().to_rfc3339(),
                    "from": params.username,
                    "to": params.to_email,
                    "subject": params.subject,
                }),
            ),
            Err(descriptor) => ExecutionResult::fail(SKILL_NAME, descriptor),
        };

        Self::record(ctx, &result);
        result
    }

    fn read_resource(&self, ctx: &ExecutionContext, uri: &str) -> Option<ResourceContents> {
        let value = match uri {
            LAST_RESULT_URI => ctx
                .get(&namespaced(SKILL_NAME, "last_result"))
                .cloned()
                .unwrap_or_else(|| json!({"message": "No emails sent yet"})),
            STATUS_URI => self.status(ctx),
            _ => return None,
        };

        Some(ResourceContents {
            uri: uri.to_string(),
            mime_type: "application/json".to_string(),
            text: serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
        })
    }

    fn prompt(&self, name: &str) -> Option<PromptContents> {
        (name == "gmail_send_help").then(|| PromptContents {
            description: "Gmail Send Skill usage help".to_string(),
            messages: vec![PromptMessage {
                role: "user",
                text: Self::help_text(),
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use smtp::{RelayDialogue, RelayError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Relay that accepts everything without touching the network.
    struct AcceptingRelay {
        connects: Arc<AtomicUsize>,
    }

    struct AcceptingDialogue;

    #[async_trait]
    impl Relay for AcceptingRelay {
        async fn connect(&self) -> Result<Box<dyn RelayDialogue>, RelayError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(AcceptingDialogue))
        }
    }

    #[async_trait]
    impl RelayDialogue for AcceptingDialogue {
        async fn secure(&mut self) -> Result<(), RelayError> {
            Ok(())
        }
        async fn authenticate(&mut self, _user: &str, _pass: &str) -> Result<(), RelayError> {
            Ok(())
        }
        async fn submit(&mut self, _message: &MailMessage) -> Result<(), RelayError> {
            Ok(())
        }
        async fn close(&mut self) {}
    }

    fn skill_with_counter() -> (GmailSendSkill, Arc<AtomicUsize>) {
        let connects = Arc::new(AtomicUsize::new(0));
        let relay = AcceptingRelay {
            connects: Arc::clone(&connects),
        };
        (
            GmailSendSkill::with_relay(SmtpConfig::default(), Box::new(relay)),
            connects,
        )
    }

    fn valid_args() -> Value {
        json!({
            "username": "sender@gmail.com",
            "app_password": "abcd efgh ijkl mnop",
            "content": "# Hello\n\nThis is a **test**.",
            "to_email": "recipient@example.com",
        })
    }

    #[tokio::test]
    async fn successful_send_produces_payload() {
        let (skill, connects) = skill_with_counter();
        let mut ctx = ExecutionContext::new();

        let result = skill.execute(&mut ctx, &valid_args()).await;

        assert!(result.success);
        let payload = result.payload.unwrap();
        assert_eq!(payload["from"], "sender@gmail.com");
        assert_eq!(payload["to"], "recipient@example.com");
        assert_eq!(payload["subject"], DEFAULT_SUBJECT);
        assert!(payload["message"]
            .as_str()
            .unwrap()
            .contains("recipient@example.com"));
        assert!(payload["timestamp"].as_str().is_some());
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn validation_failure_never_connects() {
        let (skill, connects) = skill_with_counter();
        let mut ctx = ExecutionContext::new();

        let result = skill.execute(&mut ctx, &json!({})).await;

        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind, ErrorKind::ValidationError);
        assert_eq!(connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn validation_message_concatenates_violations() {
        let (skill, _) = skill_with_counter();
        let mut ctx = ExecutionContext::new();

        let result = skill
            .execute(
                &mut ctx,
                &json!({"username": "bad", "app_password": "short"}),
            )
            .await;

        let error = result.error.unwrap();
        let message = error.message;
        assert!(message.contains("Invalid username email format"));
        assert!(message.contains("App Password"));
        assert!(message.contains("content"));
        assert!(message.contains("to_email"));
    }

    #[tokio::test]
    async fn two_sends_mean_two_attempts() {
        let (skill, connects) = skill_with_counter();
        let mut ctx = ExecutionContext::new();

        let first = skill.execute(&mut ctx, &valid_args()).await;
        let second = skill.execute(&mut ctx, &valid_args()).await;

        assert!(first.success && second.success);
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn last_result_recorded_in_context() {
        let (skill, _) = skill_with_counter();
        let mut ctx = ExecutionContext::new();

        skill.execute(&mut ctx, &valid_args()).await;

        let stored = ctx.get("skill:gmail_send:last_result").unwrap();
        assert_eq!(stored["success"], true);

        let contents = skill.read_resource(&ctx, LAST_RESULT_URI).unwrap();
        assert!(contents.text.contains("\"success\": true"));
    }

    #[tokio::test]
    async fn status_resource_reports_engine() {
        let (skill, _) = skill_with_counter();
        let ctx = ExecutionContext::new();

        let contents = skill.read_resource(&ctx, STATUS_URI).unwrap();
        let status: Value = serde_json::from_str(&contents.text).unwrap();
        assert_eq!(status["skill_name"], SKILL_NAME);
        assert_eq!(status["markdown_engine"], Engine::active().name());
        assert_eq!(status["last_execution"], false);
        assert_eq!(status["smtp_server"], "smtp.gmail.com");
    }

    #[tokio::test]
    async fn unknown_resource_is_none() {
        let (skill, _) = skill_with_counter();
        let ctx = ExecutionContext::new();
        assert!(skill.read_resource(&ctx, "skill://other/thing").is_none());
    }

    #[test]
    fn help_prompt_materialises() {
        let (skill, _) = skill_with_counter();
        let prompt = skill.prompt("gmail_send_help").unwrap();
        assert_eq!(prompt.messages.len(), 1);
        assert!(prompt.messages[0].text.contains("App Password"));
        assert!(skill.prompt("unknown").is_none());
    }
}
