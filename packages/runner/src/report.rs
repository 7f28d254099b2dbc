use crate::config::{ReportConfig, SmtpSettings};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use harness::Summary;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::fmt::Display;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const SENDER_NAME: &str = "Isaac Regression Test";
const ATTACHMENT_NAME: &str = "test_results.txt";

/// The end-of-run mail: subject, plain text body and the run log.
#[derive(Debug, Clone)]
pub struct Report {
    pub subject: String,
    pub body: String,
    pub log: Option<PathBuf>,
}

impl Report {
    pub fn new<Tz>(started: DateTime<Tz>, summary: &Summary, log: Option<PathBuf>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let subject = format!(
            "Isaac Regression Test on {}",
            started.format("%d/%m/%Y at %H:%M")
        );
        let body = format!("{subject}\n\n{summary}");
        Self { subject, body, log }
    }
}

#[async_trait]
pub trait ReportMailer: Send + Sync {
    async fn send(&self, report: &Report) -> Result<()>;
}

/// Picks the mailer for the configured mode. `Off` sends nothing.
pub fn mailer(config: &ReportConfig) -> Option<Box<dyn ReportMailer>> {
    match config {
        ReportConfig::Smtp(settings) => Some(Box::new(SmtpReportMailer::new(settings.clone()))),
        ReportConfig::Console => Some(Box::new(ConsoleReportMailer)),
        ReportConfig::Off => None,
    }
}

/// Sends the report over an SMTP relay with STARTTLS.
pub struct SmtpReportMailer {
    settings: SmtpSettings,
}

impl SmtpReportMailer {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn message(&self, report: &Report) -> Result<Message> {
        let from = Mailbox::new(
            Some(SENDER_NAME.to_string()),
            self.settings
                .from
                .parse()
                .with_context(|| format!("invalid REPORT_FROM address '{}'", self.settings.from))?,
        );
        let mut builder = Message::builder().from(from).subject(&report.subject);
        for to in &self.settings.to {
            builder = builder.to(to
                .parse()
                .with_context(|| format!("invalid REPORT_TO address '{to}'"))?);
        }

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(report.body.clone()));
        if let Some(path) = &report.log {
            match std::fs::read(path) {
                Ok(contents) => {
                    parts = parts.singlepart(
                        Attachment::new(ATTACHMENT_NAME.to_string())
                            .body(contents, ContentType::TEXT_PLAIN),
                    );
                }
                Err(e) => warn!("Not attaching {}: {}", path.display(), e),
            }
        }
        Ok(builder.multipart(parts)?)
    }
}

#[async_trait]
impl ReportMailer for SmtpReportMailer {
    async fn send(&self, report: &Report) -> Result<()> {
        debug!(
            "report.smtp.send: host={} port={} recipients={}",
            self.settings.host,
            self.settings.port,
            self.settings.to.len()
        );
        let email = self.message(report)?;

        let mut transport = SmtpTransport::starttls_relay(&self.settings.host)?
            .port(self.settings.port);
        if let (Some(username), Some(password)) = (&self.settings.username, &self.settings.password)
        {
            transport = transport.credentials(Credentials::new(username.clone(), password.clone()));
        }
        let mailer = transport.build();

        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| anyhow!("Task join error: {}", e))??;

        info!("Report mail sent to {}.", self.settings.to.join(", "));
        Ok(())
    }
}

/// Prints the report instead of sending it.
pub struct ConsoleReportMailer;

#[async_trait]
impl ReportMailer for ConsoleReportMailer {
    async fn send(&self, report: &Report) -> Result<()> {
        println!("\nREPORT (console mode, not sent)");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("Subject: {}", report.subject);
        if let Some(log) = &report.log {
            println!("Log: {}", log.display());
        }
        println!("────────────────────────────────");
        println!("{}", report.body);
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
        Ok(())
    }
}
