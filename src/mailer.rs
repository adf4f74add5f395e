use crate::config::SmtpConfig;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP credentials are not configured")]
    MissingCredentials,
    #[error("no sender address configured")]
    MissingSender,
    #[error("invalid address {0}")]
    InvalidAddress(String),
    #[error("could not read attachment: {0}")]
    Attachment(#[from] std::io::Error),
    #[error("could not build message: {0}")]
    Build(String),
    #[error("{0}")]
    Transport(String),
}

/// A file to attach, referenced by where it was stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: String,
    pub path: PathBuf,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub from: Option<String>,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachment: Option<MailAttachment>,
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    authenticated: bool,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| MailError::Transport(format!("SMTP relay error: {e}")))?
            .port(config.port);

        let (builder, authenticated) = match (&config.user, &config.password) {
            (Some(user), Some(password)) => (
                builder.credentials(Credentials::new(user.clone(), password.clone())),
                true,
            ),
            _ => (builder, false),
        };

        Ok(Self {
            transport: builder.build(),
            authenticated,
        })
    }
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| MailError::InvalidAddress(format!("{address}: {e}")))
}

pub async fn build_message(mail: OutgoingMail) -> Result<Message, MailError> {
    let from = mail.from.as_deref().ok_or(MailError::MissingSender)?;
    let builder = Message::builder()
        .from(mailbox(from)?)
        .to(mailbox(&mail.to)?)
        .subject(mail.subject);

    let message = match mail.attachment {
        Some(attachment) => {
            let bytes = tokio::fs::read(&attachment.path).await?;
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| MailError::Build(format!("bad attachment type: {e}")))?;
            builder.multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(mail.html))
                    .singlepart(Attachment::new(attachment.filename).body(bytes, content_type)),
            )
        }
        None => builder.header(ContentType::TEXT_HTML).body(mail.html),
    };

    message.map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if !self.authenticated {
            return Err(MailError::MissingCredentials);
        }
        let to = mail.to.clone();
        let message = build_message(mail).await?;

        debug!("Sending confirmation to {}", to);
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        info!("Mail to {} accepted: {:?}", to, response.code());
        Ok(())
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use recording::RecordingMailer;

#[cfg(any(test, feature = "test-util"))]
mod recording {
    use super::{MailError, MailSender, OutgoingMail};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Keeps every mail instead of sending it. Can be told to fail every send.
    #[derive(Clone, Default)]
    pub struct RecordingMailer {
        sent: Arc<Mutex<Vec<OutgoingMail>>>,
        failure: Option<String>,
    }

    impl RecordingMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(reason: &str) -> Self {
            Self {
                sent: Arc::default(),
                failure: Some(reason.to_string()),
            }
        }

        pub async fn sent(&self) -> Vec<OutgoingMail> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl MailSender for RecordingMailer {
        async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
            if let Some(reason) = &self.failure {
                return Err(MailError::Transport(reason.clone()));
            }
            self.sent.lock().await.push(mail);
            Ok(())
        }
    }
}
