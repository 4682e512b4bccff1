//! End-of-run error notification
//!
//! [`ErrorReport`] summarizes the ledger and any fatal error of the run.
//! Delivery goes through the [`Notifier`] trait: [`LogNotifier`] writes the
//! report to the log, [`SmtpNotifier`] mails it with the run's log files
//! attached.

use crate::enrichment::ErrorLedger;
use crate::error::SyncError;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use qa_sync_common::config::MailSettings;
use qa_sync_common::{Error, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Composed error notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    error_count: usize,
    pub subject: String,
    pub body: Vec<String>,
    pub attachments: Vec<PathBuf>,
}

impl ErrorReport {
    /// One body line per (scope, issue) pair, in first-recorded order
    pub fn from_ledger(ledger: &ErrorLedger, attachments: Vec<PathBuf>) -> Self {
        let body = ledger
            .entries()
            .iter()
            .map(|entry| {
                let codes: Vec<String> = entry.codes.iter().map(ToString::to_string).collect();
                format!("[{}] {}: {}", entry.scope, entry.issue, codes.join(", "))
            })
            .collect();

        let error_count = ledger.total_codes();
        Self {
            error_count,
            subject: subject_for(error_count),
            body,
            attachments,
        }
    }

    /// Append the fatal error that ended the run
    pub fn with_fatal(mut self, err: &SyncError) -> Self {
        self.body.push(format!("Fatal {}: {}", err.report_code(), err));
        self.error_count += 1;
        self.subject = subject_for(self.error_count);
        self
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn is_empty(&self) -> bool {
        self.error_count == 0
    }

    pub fn body_text(&self) -> String {
        self.body.join("\n")
    }
}

fn subject_for(error_count: usize) -> String {
    format!("{} errors found!", error_count)
}

/// Delivers error reports
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, report: &ErrorReport) -> Result<()>;
}

/// Writes the report to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, report: &ErrorReport) -> Result<()> {
        error!("{}", report.subject);
        for line in &report.body {
            error!("{}", line);
        }
        for path in &report.attachments {
            info!("Related log file: {}", path.display());
        }
        Ok(())
    }
}

/// Mails the report over SMTP with implicit TLS
pub struct SmtpNotifier<T = AsyncSmtpTransport<Tokio1Executor>> {
    transport: T,
    sender: Mailbox,
    receiver: Mailbox,
}

impl SmtpNotifier {
    /// Build a TLS relay transport from resolved mail settings
    ///
    /// No connection is made until the first report is sent.
    pub fn from_settings(settings: &MailSettings) -> Result<Self> {
        let sender = parse_mailbox("sender", &settings.sender)?;
        let receiver = parse_mailbox("receiver", &settings.receiver)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|e| Error::Config(format!("Mail host {}: {}", settings.host, e)))?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self::with_transport(transport, sender, receiver))
    }
}

impl<T> SmtpNotifier<T> {
    pub fn with_transport(transport: T, sender: Mailbox, receiver: Mailbox) -> Self {
        Self {
            transport,
            sender,
            receiver,
        }
    }

    /// Compose the multipart message: plain-text body then one part per log file
    ///
    /// Unreadable attachments are skipped with a warning.
    pub async fn build_message(&self, report: &ErrorReport) -> Result<Message> {
        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(report.body_text()));

        for path in &report.attachments {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            match tokio::fs::read(path).await {
                Ok(bytes) => {
                    let attachment = Attachment::new(name).body(bytes, ContentType::TEXT_PLAIN);
                    parts = parts.singlepart(attachment);
                }
                Err(e) => warn!("Skipping attachment {}: {}", path.display(), e),
            }
        }

        Message::builder()
            .from(self.sender.clone())
            .to(self.receiver.clone())
            .subject(report.subject.as_str())
            .multipart(parts)
            .map_err(|e| Error::Internal(format!("Compose error report mail: {}", e)))
    }
}

#[async_trait]
impl<T> Notifier for SmtpNotifier<T>
where
    T: AsyncTransport + Send + Sync,
    T::Ok: Send,
    T::Error: std::fmt::Display + Send,
{
    async fn notify(&self, report: &ErrorReport) -> Result<()> {
        let message = self.build_message(report).await?;
        self.transport
            .send(message)
            .await
            .map_err(|e| Error::Internal(format!("Send error report mail: {}", e)))?;
        info!("Error report mailed to {}", self.receiver);
        Ok(())
    }
}

fn parse_mailbox(field: &str, value: &str) -> Result<Mailbox> {
    value
        .parse()
        .map_err(|e| Error::Config(format!("Mail {} {:?}: {}", field, value, e)))
}
