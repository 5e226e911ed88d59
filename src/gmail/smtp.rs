//! SMTP session management for one send attempt.
//!
//! A [`MailSession`] performs exactly one submission per invocation:
//! connect, upgrade to an encrypted channel, authenticate, submit,
//! close. There is no retry; retry policy belongs to the caller.
//!
//! # Session lifecycle
//!
//! ```text
//! Idle → Connected → SecureChannel → Authenticated → Submitted → Closed
//!                \            \              \            \
//!                 `────────────`──────────────`────────────`──→ Failed(kind)
//! ```
//!
//! `Closed` and `Failed` are both terminal and both guarantee the
//! underlying connection has been released (QUIT on the happy path,
//! QUIT or abort on failure).
//!
//! # Failure classification
//!
//! The stage that detects a fault fixes its [`ErrorKind`]: connect and
//! STARTTLS failures, timeouts in any stage, and connection loss are
//! `connection_error`; an AUTH rejection is `authentication_error`; a
//! recipient refusal during submission is `recipient_error`; everything
//! else is `execution_error`. The relay's raw fault text is preserved in
//! the descriptor's `details`, never as the primary message.
//!
//! The relay is a trait seam: the production [`SmtpRelay`] drives
//! lettre's `AsyncSmtpConnection` stage by stage; tests substitute a
//! dialogue that rejects at a chosen stage without touching the network.

use std::time::Duration;

use async_trait::async_trait;
use lettre::address::Address;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::Message;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::SmtpConfig;
use crate::error::{ErrorDescriptor, ErrorKind};

/// SMTP reply codes that mean the relay refused the destination.
const RECIPIENT_REFUSAL_CODES: [&str; 4] = ["550", "551", "552", "553"];

/// An outbound mail message, created per invocation and consumed
/// exactly once by the session. Never persisted.
#[derive(Debug, Clone)]
pub struct MailMessage {
    /// Sender address.
    pub sender_address: String,
    /// Optional sender display name.
    pub sender_display_name: Option<String>,
    /// Recipient address.
    pub recipient_address: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body (the original markup).
    pub body_markup: String,
    /// HTML body derived by the content converter.
    pub body_rich: String,
}

impl MailMessage {
    /// Builds the multipart/alternative MIME message.
    fn to_mime(&self) -> Result<Message, RelayError> {
        let sender: Address = self
            .sender_address
            .parse()
            .map_err(|e| RelayError::Other(format!("invalid sender address: {e}")))?;
        let recipient: Address = self
            .recipient_address
            .parse()
            .map_err(|e| RelayError::Other(format!("invalid recipient address: {e}")))?;

        Message::builder()
            .from(Mailbox::new(self.sender_display_name.clone(), sender))
            .to(Mailbox::new(None, recipient))
            .subject(self.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                self.body_markup.clone(),
                self.body_rich.clone(),
            ))
            .map_err(|e| RelayError::Other(format!("failed to build message: {e}")))
    }
}

/// Low-level failure surfaced by a relay dialogue stage.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Could not reach the relay.
    #[error("connection failed: {0}")]
    Connect(String),

    /// A stage exceeded the configured timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Encrypted-channel negotiation failed.
    #[error("TLS negotiation failed: {0}")]
    Tls(String),

    /// The relay rejected the supplied credentials.
    #[error("credentials rejected: {0}")]
    CredentialsRejected(String),

    /// The relay refused the destination address.
    #[error("recipient rejected: {0}")]
    RecipientRejected(String),

    /// The connection dropped mid-session.
    #[error("connection lost: {0}")]
    Disconnected(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// One open dialogue with the relay, driven stage by stage.
///
/// Implementations report faults through [`RelayError`]; the variant a
/// stage returns determines the error classification. `close` must be
/// infallible and safe to call after any failed stage.
#[async_trait]
pub trait RelayDialogue: Send {
    /// Upgrades the dialogue to an encrypted channel (STARTTLS).
    async fn secure(&mut self) -> Result<(), RelayError>;

    /// Authenticates with caller-supplied credentials.
    async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), RelayError>;

    /// Submits the message.
    async fn submit(&mut self, message: &MailMessage) -> Result<(), RelayError>;

    /// Releases the connection.
    async fn close(&mut self);
}

/// Connector producing one dialogue per send attempt.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Opens a connection to the relay.
    async fn connect(&self) -> Result<Box<dyn RelayDialogue>, RelayError>;
}

/// Production relay backed by lettre's async SMTP client.
pub struct SmtpRelay {
    config: SmtpConfig,
}

impl SmtpRelay {
    /// Creates a relay for the configured endpoint.
    #[must_use]
    pub const fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Relay for SmtpRelay {
    async fn connect(&self) -> Result<Box<dyn RelayDialogue>, RelayError> {
        let window = Duration::from_secs(self.config.timeout_secs);
        let hello = ClientId::default();

        tracing::debug!(
            server = %self.config.server,
            port = self.config.port,
            "connecting to mail relay"
        );

        let connection = timeout(
            window,
            AsyncSmtpConnection::connect_tokio1(
                (self.config.server.as_str(), self.config.port),
                Some(window),
                &hello,
                None,
                None,
            ),
        )
        .await
        .map_err(|_| RelayError::Timeout(window))?
        .map_err(|e| {
            if e.is_timeout() {
                RelayError::Timeout(window)
            } else {
                RelayError::Connect(e.to_string())
            }
        })?;

        Ok(Box::new(SmtpDialogue {
            connection,
            domain: self.config.server.clone(),
            hello,
            window,
        }))
    }
}

/// Dialogue over a live lettre connection.
struct SmtpDialogue {
    connection: AsyncSmtpConnection,
    domain: String,
    hello: ClientId,
    window: Duration,
}

#[async_trait]
impl RelayDialogue for SmtpDialogue {
    async fn secure(&mut self) -> Result<(), RelayError> {
        if !self.connection.can_starttls() {
            return Err(RelayError::Tls(
                "relay does not offer STARTTLS".to_string(),
            ));
        }

        let tls = TlsParameters::new(self.domain.clone())
            .map_err(|e| RelayError::Tls(e.to_string()))?;

        timeout(self.window, self.connection.starttls(tls, &self.hello))
            .await
            .map_err(|_| RelayError::Timeout(self.window))?
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::Timeout(self.window)
                } else {
                    RelayError::Tls(e.to_string())
                }
            })
    }

    async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), RelayError> {
        let credentials = Credentials::new(username.to_string(), password.to_string());

        timeout(
            self.window,
            self.connection
                .auth(&[Mechanism::Plain, Mechanism::Login], &credentials),
        )
        .await
        .map_err(|_| RelayError::Timeout(self.window))?
        .map(|_| ())
        .map_err(|e| {
            if e.is_timeout() {
                RelayError::Timeout(self.window)
            } else if e.is_response() {
                RelayError::CredentialsRejected(e.to_string())
            } else {
                RelayError::Disconnected(e.to_string())
            }
        })
    }

    async fn submit(&mut self, message: &MailMessage) -> Result<(), RelayError> {
        let mime = message.to_mime()?;
        let raw = mime.formatted();

        timeout(self.window, self.connection.send(mime.envelope(), &raw))
            .await
            .map_err(|_| RelayError::Timeout(self.window))?
            .map(|_| ())
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::Timeout(self.window)
                } else if e
                    .status()
                    .is_some_and(|code| RECIPIENT_REFUSAL_CODES.contains(&code.to_string().as_str()))
                {
                    RelayError::RecipientRejected(e.to_string())
                } else if e.is_response() {
                    RelayError::Other(e.to_string())
                } else {
                    RelayError::Disconnected(e.to_string())
                }
            })
    }

    async fn close(&mut self) {
        if self.connection.has_broken() {
            self.connection.abort().await;
        } else if self.connection.quit().await.is_err() {
            self.connection.abort().await;
        }
    }
}

/// Session state for one send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection yet.
    Idle,
    /// TCP connection established.
    Connected,
    /// Encrypted channel negotiated.
    SecureChannel,
    /// Credentials accepted.
    Authenticated,
    /// Message accepted by the relay.
    Submitted,
    /// Session ended cleanly; connection released.
    Closed,
    /// Session ended in failure; connection released.
    Failed(ErrorKind),
}

impl SessionState {
    /// Returns whether this state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed(_))
    }
}

/// Drives one send attempt through the session state machine.
pub struct MailSession<'a> {
    relay: &'a dyn Relay,
    state: SessionState,
}

impl<'a> MailSession<'a> {
    /// Creates an idle session against `relay`.
    #[must_use]
    pub const fn new(relay: &'a dyn Relay) -> Self {
        Self {
            relay,
            state: SessionState::Idle,
        }
    }

    /// Returns the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns whether the session has released its connection.
    ///
    /// True in both terminal states.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.state.is_terminal()
    }

    /// Performs exactly one send attempt.
    ///
    /// Every exit path — success, rejection, or fault — leaves the
    /// session in a terminal state with the connection released.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ErrorDescriptor`] when any stage fails.
    pub async fn send(
        &mut self,
        message: &MailMessage,
        username: &str,
        password: &str,
    ) -> Result<(), ErrorDescriptor> {
        let mut dialogue = match self.relay.connect().await {
            Ok(dialogue) => dialogue,
            Err(error) => {
                let descriptor = classify(&error, message);
                self.state = SessionState::Failed(descriptor.kind);
                return Err(descriptor);
            }
        };
        self.state = SessionState::Connected;

        if let Err(error) = dialogue.secure().await {
            return Err(self.fail(dialogue.as_mut(), &error, message).await);
        }
        self.state = SessionState::SecureChannel;

        if let Err(error) = dialogue.authenticate(username, password).await {
            return Err(self.fail(dialogue.as_mut(), &error, message).await);
        }
        self.state = SessionState::Authenticated;

        if let Err(error) = dialogue.submit(message).await {
            return Err(self.fail(dialogue.as_mut(), &error, message).await);
        }
        self.state = SessionState::Submitted;

        dialogue.close().await;
        self.state = SessionState::Closed;
        tracing::info!(to = %message.recipient_address, "message submitted");
        Ok(())
    }

    /// Releases the connection and records the classified failure.
    async fn fail(
        &mut self,
        dialogue: &mut dyn RelayDialogue,
        error: &RelayError,
        message: &MailMessage,
    ) -> ErrorDescriptor {
        dialogue.close().await;
        let descriptor = classify(error, message);
        tracing::warn!(kind = %descriptor.kind, "send attempt failed");
        self.state = SessionState::Failed(descriptor.kind);
        descriptor
    }
}

/// Maps a relay fault to its stable, user-safe descriptor. The raw
/// fault text survives only as `details`.
fn classify(error: &RelayError, message: &MailMessage) -> ErrorDescriptor {
    let details = error.to_string();
    let (kind, text) = match error {
        RelayError::Timeout(_) => (
            ErrorKind::ConnectionError,
            "Timed out while communicating with the mail relay".to_string(),
        ),
        RelayError::Connect(_) | RelayError::Tls(_) => (
            ErrorKind::ConnectionError,
            "Unable to establish a connection to the mail relay".to_string(),
        ),
        RelayError::Disconnected(_) => (
            ErrorKind::ConnectionError,
            "Lost connection to the mail relay".to_string(),
        ),
        RelayError::CredentialsRejected(_) => (
            ErrorKind::AuthenticationError,
            "Authentication failed. Please check your username and App Password.".to_string(),
        ),
        RelayError::RecipientRejected(_) => (
            ErrorKind::RecipientError,
            format!(
                "Recipient email address rejected: {}",
                message.recipient_address
            ),
        ),
        RelayError::Other(_) => (
            ErrorKind::ExecutionError,
            "Failed to send email".to_string(),
        ),
    };
    ErrorDescriptor::new(kind, text).with_details(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Stage at which the scripted dialogue rejects.
    #[derive(Clone, Copy)]
    enum RejectAt {
        Nowhere,
        Connect,
        Secure,
        Authenticate,
        Submit,
    }

    struct ScriptedRelay {
        reject_at: RejectAt,
        connects: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
    }

    impl ScriptedRelay {
        fn new(reject_at: RejectAt) -> Self {
            Self {
                reject_at,
                connects: Arc::new(AtomicUsize::new(0)),
                closed: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    struct ScriptedDialogue {
        reject_at: RejectAt,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Relay for ScriptedRelay {
        async fn connect(&self) -> Result<Box<dyn RelayDialogue>, RelayError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if matches!(self.reject_at, RejectAt::Connect) {
                return Err(RelayError::Connect("connection refused".to_string()));
            }
            Ok(Box::new(ScriptedDialogue {
                reject_at: self.reject_at,
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    #[async_trait]
    impl RelayDialogue for ScriptedDialogue {
        async fn secure(&mut self) -> Result<(), RelayError> {
            match self.reject_at {
                RejectAt::Secure => Err(RelayError::Tls("handshake failed".to_string())),
                _ => Ok(()),
            }
        }

        async fn authenticate(&mut self, _user: &str, _pass: &str) -> Result<(), RelayError> {
            match self.reject_at {
                RejectAt::Authenticate => Err(RelayError::CredentialsRejected(
                    "535 5.7.8 Username and Password not accepted".to_string(),
                )),
                _ => Ok(()),
            }
        }

        async fn submit(&mut self, _message: &MailMessage) -> Result<(), RelayError> {
            match self.reject_at {
                RejectAt::Submit => Err(RelayError::RecipientRejected(
                    "550 5.1.1 No such user".to_string(),
                )),
                _ => Ok(()),
            }
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn test_message() -> MailMessage {
        MailMessage {
            sender_address: "sender@gmail.com".to_string(),
            sender_display_name: None,
            recipient_address: "recipient@example.com".to_string(),
            subject: "Test".to_string(),
            body_markup: "# Hello".to_string(),
            body_rich: "<h1>Hello</h1>".to_string(),
        }
    }

    #[tokio::test]
    async fn successful_send_closes_session() {
        let relay = ScriptedRelay::new(RejectAt::Nowhere);
        let mut session = MailSession::new(&relay);

        session
            .send(&test_message(), "sender@gmail.com", "abcdefghijklmnop")
            .await
            .unwrap();

        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.is_closed());
        assert!(relay.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn auth_rejection_classified_and_closed() {
        let relay = ScriptedRelay::new(RejectAt::Authenticate);
        let mut session = MailSession::new(&relay);

        let error = session
            .send(&test_message(), "sender@gmail.com", "abcdefghijklmnop")
            .await
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::AuthenticationError);
        assert!(error.details.unwrap().contains("535"));
        // The session released its connection even though the send failed.
        assert!(session.is_closed());
        assert_eq!(
            session.state(),
            SessionState::Failed(ErrorKind::AuthenticationError)
        );
        assert!(relay.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn recipient_rejection_classified() {
        let relay = ScriptedRelay::new(RejectAt::Submit);
        let mut session = MailSession::new(&relay);

        let error = session
            .send(&test_message(), "sender@gmail.com", "abcdefghijklmnop")
            .await
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::RecipientError);
        assert!(error.message.contains("recipient@example.com"));
        assert!(relay.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn connect_failure_is_connection_error() {
        let relay = ScriptedRelay::new(RejectAt::Connect);
        let mut session = MailSession::new(&relay);

        let error = session
            .send(&test_message(), "sender@gmail.com", "abcdefghijklmnop")
            .await
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::ConnectionError);
        assert_eq!(
            session.state(),
            SessionState::Failed(ErrorKind::ConnectionError)
        );
    }

    #[tokio::test]
    async fn tls_failure_is_connection_error() {
        let relay = ScriptedRelay::new(RejectAt::Secure);
        let mut session = MailSession::new(&relay);

        let error = session
            .send(&test_message(), "sender@gmail.com", "abcdefghijklmnop")
            .await
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::ConnectionError);
        assert!(relay.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn one_attempt_per_send() {
        let relay = ScriptedRelay::new(RejectAt::Nowhere);

        for _ in 0..2 {
            let mut session = MailSession::new(&relay);
            session
                .send(&test_message(), "sender@gmail.com", "abcdefghijklmnop")
                .await
                .unwrap();
        }

        // Two invocations, exactly two connects: no dedup, no retry.
        assert_eq!(relay.connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn timeout_classifies_as_connection_error() {
        let error = RelayError::Timeout(Duration::from_secs(30));
        let descriptor = classify(&error, &test_message());
        assert_eq!(descriptor.kind, ErrorKind::ConnectionError);
        assert!(descriptor.message.contains("Timed out"));
    }

    #[test]
    fn classification_keeps_raw_text_in_details() {
        let error = RelayError::CredentialsRejected("535 5.7.8 Bad credentials".to_string());
        let descriptor = classify(&error, &test_message());
        assert_eq!(
            descriptor.message,
            "Authentication failed. Please check your username and App Password."
        );
        assert!(descriptor.details.unwrap().contains("5.7.8"));
    }

    #[test]
    fn mime_message_builds() {
        let mime = test_message().to_mime().unwrap();
        let rendered = String::from_utf8(mime.formatted()).unwrap();
        assert!(rendered.contains("Subject: Test"));
        assert!(rendered.contains("multipart/alternative"));
    }

    #[test]
    fn terminal_states() {
        assert!(SessionState::Closed.is_terminal());
        assert!(SessionState::Failed(ErrorKind::ConnectionError).is_terminal());
        assert!(!SessionState::Authenticated.is_terminal());
        assert!(!SessionState::Idle.is_terminal());
    }
}
