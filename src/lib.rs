//! gmail-send-mcp: MCP server for Gmail email sending
//!
//! This library exposes one capability — composing and transmitting an
//! email through Gmail's SMTP relay with App Password authentication —
//! to AI hosts over a newline-delimited JSON-RPC stdio protocol.
//!
//! # Architecture
//!
//! The protocol server decodes one request per line, routes it through
//! a static skill registry, and encodes one response per line. The
//! mail-sending skill runs a three-stage pipeline:
//!
//! - **Validation**: schema and semantic checks, fail-fast before any
//!   network activity
//! - **Conversion**: Markdown body to email-safe HTML (enhanced or
//!   fallback engine, selected at build time)
//! - **Transport**: exactly one SMTP session per request — connect,
//!   STARTTLS, authenticate, submit, close — with stage-classified
//!   failures
//!
//! # Modules
//!
//! - [`config`] — Configuration loading and validation
//! - [`error`] — Error types and the skill failure taxonomy
//! - [`gmail`] — The gmail_send skill and its pipeline
//! - [`mcp`] — MCP protocol implementation
//! - [`skill`] — Skill abstraction: registry, schemas, context

pub mod config;
pub mod error;
pub mod gmail;
pub mod mcp;
pub mod skill;
