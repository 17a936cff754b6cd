use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use natours_core::notify::{MailMessage, Mailer};
use natours_core::{CoreError, CoreResult};
use natours_shared::Masked;

use crate::app_config::MailConfig;

/// SMTP delivery over STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> CoreResult<Self> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| CoreError::InternalError(format!("Invalid from address: {}", e)))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| CoreError::InternalError(format!("SMTP relay error: {}", e)))?
            .port(config.smtp_port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: MailMessage) -> CoreResult<()> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| CoreError::validation(format!("Invalid recipient address: {}", e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative_plain_html(message.text, message.html))
            .map_err(|e| CoreError::InternalError(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| CoreError::UpstreamError(format!("Failed to send email: {}", e)))?;

        tracing::info!(to = %Masked(&message.to), subject = %message.subject, "Email sent");
        Ok(())
    }
}
