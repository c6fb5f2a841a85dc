//! Outbound email queue.
//!
//! Mail is a side effect of request handling and of the recurring jobs, and
//! the caller never waits on the provider: composing a message enqueues it on
//! a bounded channel and returns immediately. A background worker drains the
//! queue and delivers over SMTP via lettre, logging failures. A full queue or
//! a dead worker is also only logged — mail loss is never surfaced to the
//! operation that triggered it.
//!
//! Bodies are Askama text + HTML template pairs; the notification mails carry
//! an inline PNG the HTML references by content id.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tokio::sync::mpsc;

use plaza_core::Email;

use crate::config::MailConfig;

/// Mail waiting in the queue beyond this count is dropped (and logged).
const QUEUE_CAPACITY: usize = 256;

// =============================================================================
// Templates
// =============================================================================

#[derive(Template)]
#[template(path = "email/verification_code.html")]
struct VerificationCodeHtml<'a> {
    name: &'a str,
    code: &'a str,
}

#[derive(Template)]
#[template(path = "email/verification_code.txt")]
struct VerificationCodeText<'a> {
    name: &'a str,
    code: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_recovery.html")]
struct PasswordRecoveryHtml<'a> {
    name: &'a str,
    password: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_recovery.txt")]
struct PasswordRecoveryText<'a> {
    name: &'a str,
    password: &'a str,
}

#[derive(Template)]
#[template(path = "email/engagement_nudge.html")]
struct EngagementNudgeHtml<'a> {
    name: &'a str,
    icon_cid: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/engagement_nudge.txt")]
struct EngagementNudgeText<'a> {
    name: &'a str,
}

#[derive(Template)]
#[template(path = "email/weekly_broadcast.html")]
struct WeeklyBroadcastHtml<'a> {
    name: &'a str,
    icon_cid: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/weekly_broadcast.txt")]
struct WeeklyBroadcastText<'a> {
    name: &'a str,
}

// =============================================================================
// Types
// =============================================================================

/// Errors that can occur when composing or delivering email.
///
/// These never cross a service boundary; every path that hits one logs it
/// and moves on.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// Invalid attachment content type.
    #[error("invalid content type: {0}")]
    ContentType(#[from] lettre::message::header::ContentTypeErr),

    /// Template rendering error.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

/// A PNG delivered inline with a notification mail.
///
/// The HTML body references it as `cid:<content_id>`.
#[derive(Debug, Clone)]
pub struct InlineIcon {
    pub content_id: String,
    pub bytes: Vec<u8>,
}

impl InlineIcon {
    /// Create an inline icon with the given content id.
    #[must_use]
    pub fn new(content_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            content_id: content_id.into(),
            bytes,
        }
    }
}

/// A composed email waiting for delivery.
#[derive(Debug)]
pub struct OutboundEmail {
    pub to: Email,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub inline_icon: Option<InlineIcon>,
}

/// Handle onto the outbound mail queue.
///
/// Cheap to clone; every composition method is fire-and-forget.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::Sender<OutboundEmail>,
}

impl Outbox {
    /// Build the SMTP transport and start the delivery worker.
    ///
    /// # Errors
    ///
    /// Returns `OutboxError::Smtp` if the relay cannot be configured and
    /// `OutboxError::InvalidAddress` if the sender address does not parse.
    pub fn spawn(config: &MailConfig) -> Result<Self, OutboxError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|_| OutboxError::InvalidAddress(config.from_address.clone()))?;

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(deliver_queued(transport, from, rx));

        Ok(Self { tx })
    }

    /// Queue handle plus the receiving end, for tests that assert on mail.
    #[must_use]
    pub fn test() -> (Self, mpsc::Receiver<OutboundEmail>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        (Self { tx }, rx)
    }

    /// Queue the registration verification code.
    pub fn send_verification_code(&self, to: &Email, name: &str, code: &str) {
        self.enqueue(compose(
            to,
            "Your Plaza verification code",
            VerificationCodeText { name, code },
            VerificationCodeHtml { name, code },
            None,
        ));
    }

    /// Queue the recovery mail carrying the replacement password.
    pub fn send_recovered_password(&self, to: &Email, name: &str, password: &str) {
        self.enqueue(compose(
            to,
            "Your new Plaza password",
            PasswordRecoveryText { name, password },
            PasswordRecoveryHtml { name, password },
            None,
        ));
    }

    /// Queue the nudge mailed to frequent posters.
    pub fn send_engagement_nudge(&self, to: &Email, name: &str, icon: Option<&InlineIcon>) {
        self.enqueue(compose(
            to,
            "Your visitors want to see more",
            EngagementNudgeText { name },
            EngagementNudgeHtml {
                name,
                icon_cid: icon.map(|i| i.content_id.as_str()),
            },
            icon.cloned(),
        ));
    }

    /// Queue the weekly broadcast sent to every verified account.
    pub fn send_weekly_broadcast(&self, to: &Email, name: &str, icon: Option<&InlineIcon>) {
        self.enqueue(compose(
            to,
            "Happy Friday from Plaza",
            WeeklyBroadcastText { name },
            WeeklyBroadcastHtml {
                name,
                icon_cid: icon.map(|i| i.content_id.as_str()),
            },
            icon.cloned(),
        ));
    }

    fn enqueue(&self, composed: Result<OutboundEmail, OutboxError>) {
        match composed {
            Ok(mail) => {
                if let Err(error) = self.tx.try_send(mail) {
                    tracing::error!(%error, "outbound mail queue rejected message");
                }
            }
            Err(error) => tracing::error!(%error, "failed to compose outbound email"),
        }
    }
}

/// Render both bodies and assemble the queue entry.
fn compose(
    to: &Email,
    subject: &str,
    text: impl Template,
    html: impl Template,
    inline_icon: Option<InlineIcon>,
) -> Result<OutboundEmail, OutboxError> {
    Ok(OutboundEmail {
        to: to.clone(),
        subject: subject.to_owned(),
        text: text.render()?,
        html: html.render()?,
        inline_icon,
    })
}

/// Delivery worker: drains the queue until every handle is dropped.
async fn deliver_queued(
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    mut rx: mpsc::Receiver<OutboundEmail>,
) {
    while let Some(mail) = rx.recv().await {
        let to = mail.to.clone();
        let subject = mail.subject.clone();

        match build_message(&from, mail) {
            Ok(message) => match transport.send(message).await {
                Ok(_) => tracing::info!(to = %to, subject = %subject, "email sent"),
                Err(error) => tracing::error!(to = %to, %error, "email delivery failed"),
            },
            Err(error) => tracing::error!(to = %to, %error, "failed to build email message"),
        }
    }
}

/// Assemble the MIME message: text + HTML alternatives, with the inline icon
/// in a related part when present.
fn build_message(from: &Mailbox, mail: OutboundEmail) -> Result<Message, OutboxError> {
    let to: Mailbox = mail
        .to
        .as_str()
        .parse()
        .map_err(|_| OutboxError::InvalidAddress(mail.to.to_string()))?;

    let text = SinglePart::builder()
        .header(ContentType::TEXT_PLAIN)
        .body(mail.text);
    let html = SinglePart::builder()
        .header(ContentType::TEXT_HTML)
        .body(mail.html);

    let body = match mail.inline_icon {
        Some(icon) => {
            let attachment = Attachment::new_inline(icon.content_id)
                .body(icon.bytes, ContentType::parse("image/png")?);
            MultiPart::alternative().singlepart(text).multipart(
                MultiPart::related().singlepart(html).singlepart(attachment),
            )
        }
        None => MultiPart::alternative().singlepart(text).singlepart(html),
    };

    Ok(Message::builder()
        .from(from.clone())
        .to(to)
        .subject(mail.subject)
        .multipart(body)?)
}
