//! Parameter validation for the gmail_send skill.
//!
//! Two passes over caller-supplied arguments: the generic schema pass
//! (presence, type, enum, bounds — see [`crate::skill::schema`]) and the
//! mail-specific semantic pass (email-address grammar, App Password
//! shape). Violations from both passes are collected into one list so a
//! caller sees every problem at once; any violation means no transport
//! connection is attempted.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::skill::ParamSchema;

/// Admitted email-address grammar.
fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
            .expect("email pattern is a valid regex")
    })
}

/// Checks an address against the email grammar.
#[must_use]
pub fn is_valid_email(address: &str) -> bool {
    email_pattern().is_match(address)
}

/// Strips internal whitespace from a credential.
///
/// Google displays App Passwords in four-character groups
/// ("abcd efgh ijkl mnop"); both spaced and compact forms are admitted.
#[must_use]
pub fn normalise_app_password(credential: &str) -> String {
    credential.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Checks a whitespace-normalised credential: exactly 16 characters of
/// the admitted alphabet (ASCII letters and digits).
#[must_use]
pub fn is_valid_app_password(normalised: &str) -> bool {
    normalised.len() == 16 && normalised.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Fully validated, normalised send parameters.
#[derive(Debug, Clone)]
pub struct SendParams {
    /// Sender address (also the authentication username).
    pub username: String,
    /// App Password with internal whitespace removed.
    pub app_password: String,
    /// Email body in Markdown.
    pub content: String,
    /// Recipient address.
    pub to_email: String,
    /// Subject line.
    pub subject: String,
    /// Optional sender display name.
    pub from_name: Option<String>,
}

fn trimmed(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Validates raw arguments against the skill schema and the
/// mail-specific semantic rules.
///
/// # Errors
///
/// Returns every violated constraint across both passes. The list is
/// non-empty exactly when no [`SendParams`] is produced.
pub fn validate_args(schema: &ParamSchema, args: &Value) -> Result<SendParams, Vec<String>> {
    match schema.validate(args) {
        Ok(normalised) => check_semantics(&normalised),
        Err(mut violations) => {
            // Still surface format problems on the fields that were
            // supplied, so the caller sees everything in one pass.
            if let Value::Object(raw) = args {
                append_format_violations(raw, &mut violations);
            }
            Err(violations)
        }
    }
}

/// Semantic pass over a schema-normalised parameter set.
fn check_semantics(normalised: &Map<String, Value>) -> Result<SendParams, Vec<String>> {
    let mut violations = Vec::new();

    let username = trimmed(normalised, "username");
    let app_password = normalise_app_password(&trimmed(normalised, "app_password"));
    let content = trimmed(normalised, "content");
    let to_email = trimmed(normalised, "to_email");
    let subject = trimmed(normalised, "subject");
    let from_name = normalised
        .get("from_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string);

    if username.is_empty() {
        violations.push("Username is required".to_string());
    } else if !is_valid_email(&username) {
        violations.push("Invalid username email format".to_string());
    }

    if app_password.is_empty() {
        violations.push("App Password is required".to_string());
    } else if !is_valid_app_password(&app_password) {
        violations
            .push("Invalid App Password format. Should be 16 alphanumeric characters.".to_string());
    }

    if content.is_empty() {
        violations.push("Email content is required".to_string());
    }

    if to_email.is_empty() {
        violations.push("Recipient email address is required".to_string());
    } else if !is_valid_email(&to_email) {
        violations.push("Invalid recipient email format".to_string());
    }

    if !violations.is_empty() {
        return Err(violations);
    }

    Ok(SendParams {
        username,
        app_password,
        content,
        to_email,
        subject,
        from_name,
    })
}

/// Best-effort format checks on raw arguments when the schema pass
/// already failed. Only fields supplied as non-empty strings are
/// inspected, so nothing is reported twice.
fn append_format_violations(raw: &Map<String, Value>, violations: &mut Vec<String>) {
    if let Some(username) = raw.get("username").and_then(Value::as_str) {
        let username = username.trim();
        if !username.is_empty() && !is_valid_email(username) {
            violations.push("Invalid username email format".to_string());
        }
    }

    if let Some(credential) = raw.get("app_password").and_then(Value::as_str) {
        let credential = normalise_app_password(credential);
        if !credential.is_empty() && !is_valid_app_password(&credential) {
            violations.push(
                "Invalid App Password format. Should be 16 alphanumeric characters.".to_string(),
            );
        }
    }

    if let Some(to_email) = raw.get("to_email").and_then(Value::as_str) {
        let to_email = to_email.trim();
        if !to_email.is_empty() && !is_valid_email(to_email) {
            violations.push("Invalid recipient email format".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::send_schema;
    use serde_json::json;

    fn valid_args() -> Value {
        json!({
            "username": "sender@gmail.com",
            "app_password": "abcdefghijklmnop",
            "content": "# Hello",
            "to_email": "recipient@example.com",
        })
    }

    #[test]
    fn valid_arguments_pass() {
        let params = validate_args(&send_schema(), &valid_args()).unwrap();
        assert_eq!(params.username, "sender@gmail.com");
        assert_eq!(params.to_email, "recipient@example.com");
        // Default subject applied by the schema pass.
        assert_eq!(params.subject, "Email from Gmail Send Skill");
        assert!(params.from_name.is_none());
    }

    #[test]
    fn missing_required_field_is_sole_violation() {
        let mut args = valid_args();
        args.as_object_mut().unwrap().remove("to_email");

        let violations = validate_args(&send_schema(), &args).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("to_email"));
    }

    #[test]
    fn spaced_and_compact_credentials_are_equivalent() {
        for credential in ["abcd efgh ijkl mnop", "abcdefghijklmnop"] {
            let mut args = valid_args();
            args["app_password"] = json!(credential);
            let params = validate_args(&send_schema(), &args).unwrap();
            assert_eq!(params.app_password, "abcdefghijklmnop");
        }
    }

    #[test]
    fn short_credential_rejected() {
        let mut args = valid_args();
        args["app_password"] = json!("short");
        let violations = validate_args(&send_schema(), &args).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("App Password"));
    }

    #[test]
    fn seventeen_character_credential_rejected() {
        let mut args = valid_args();
        args["app_password"] = json!("abcdefghijklmnopq");
        assert!(validate_args(&send_schema(), &args).is_err());
    }

    #[test]
    fn invalid_addresses_rejected() {
        let mut args = valid_args();
        args["username"] = json!("not-an-address");
        args["to_email"] = json!("also@invalid");
        let violations = validate_args(&send_schema(), &args).unwrap_err();
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn all_violations_reported_together() {
        let args = json!({
            "username": "bad",
            "app_password": "short",
            "content": "",
            "to_email": "worse",
        });
        let violations = validate_args(&send_schema(), &args).unwrap_err();
        assert_eq!(violations.len(), 4);
    }

    #[test]
    fn format_violations_surface_alongside_missing_fields() {
        // Schema pass fails (content and to_email missing) but the
        // supplied fields are still format-checked.
        let args = json!({
            "username": "bad",
            "app_password": "short",
        });
        let violations = validate_args(&send_schema(), &args).unwrap_err();
        assert_eq!(violations.len(), 4);
        assert!(violations.iter().any(|v| v.contains("content")));
        assert!(violations.iter().any(|v| v.contains("to_email")));
        assert!(violations.iter().any(|v| v.contains("username email format")));
        assert!(violations.iter().any(|v| v.contains("App Password")));
    }

    #[test]
    fn from_name_passes_through() {
        let mut args = valid_args();
        args["from_name"] = json!("  Alice  ");
        let params = validate_args(&send_schema(), &args).unwrap();
        assert_eq!(params.from_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn email_grammar_accepts_common_forms() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user example.com"));
    }
}
