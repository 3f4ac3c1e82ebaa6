use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailFormat {
    Html,
    Plain,
}

#[derive(Debug, Clone)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub format: MailFormat,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: Mail) -> anyhow::Result<()>;
    fn contact_recipient(&self) -> &str;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    contact_recipient: String,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host)
            .context("smtp relay")?
            .port(cfg.smtp_port)
            .credentials(Credentials::new(cfg.smtp_user.clone(), cfg.smtp_pass.clone()))
            .build();
        Ok(Self {
            transport,
            from: cfg.from.clone(),
            contact_recipient: cfg.contact_recipient.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: Mail) -> anyhow::Result<()> {
        let content_type = match mail.format {
            MailFormat::Html => ContentType::TEXT_HTML,
            MailFormat::Plain => ContentType::TEXT_PLAIN,
        };
        let message = Message::builder()
            .from(self.from.parse().context("parse from address")?)
            .to(mail.to.parse().context("parse to address")?)
            .subject(mail.subject.clone())
            .header(content_type)
            .body(mail.body)
            .context("build message")?;

        self.transport.send(message).await.context("smtp send")?;
        info!(to = %mail.to, subject = %mail.subject, "mail sent");
        Ok(())
    }

    fn contact_recipient(&self) -> &str {
        &self.contact_recipient
    }
}

pub fn verification_email(base_url: &str, to: &str, token: &str) -> Mail {
    let url = format!("{}/api/v1/verify-email?token={}", base_url.trim_end_matches('/'), token);
    let body = format!(
        r#"<div style="font-family: Arial, sans-serif; text-align: center; padding: 20px;">
  <h2>Email Verification</h2>
  <p>Please click the button below to verify your email address:</p>
  <a href="{url}">Verify Email</a>
  <p>This link will expire in 1 hour.</p>
  <p>If you did not request this, please ignore this email.</p>
</div>"#
    );
    Mail {
        to: to.to_string(),
        subject: "Please Verify Your Email Address".into(),
        body,
        format: MailFormat::Html,
    }
}
