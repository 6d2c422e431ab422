//! SMTP 发信封装，OTP 投递与 SOS 通知共用。

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType, transport::smtp::authentication::Credentials,
};
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("invalid message: {0}")]
    Message(String),

    #[error("send failed: {0}")]
    Send(String),
}

#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl Mailer {
    // SMTP 未配置时返回 None，调用方降级为仅打日志
    pub fn from_config(config: &Config) -> Option<Self> {
        let host = config.smtp_host.as_deref()?;
        let from = config
            .smtp_from
            .clone()
            .or_else(|| config.smtp_username.clone())?;

        let credentials = Credentials::new(
            config.smtp_username.clone().unwrap_or_default(),
            config.smtp_password.clone().unwrap_or_default(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .ok()?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        tracing::info!(host = %host, port = config.smtp_port, "SMTP mailer configured");

        Some(Self { transport, from })
    }

    pub async fn send(&self, to: &str, subject: &str, body: String) -> Result<(), MailerError> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| MailerError::Message(format!("from address: {}", e)))?,
            )
            .to(to
                .parse()
                .map_err(|e| MailerError::Message(format!("to address: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| MailerError::Message(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailerError::Send(e.to_string()))?;

        tracing::info!(to = %to, subject = %subject, "Email sent");

        Ok(())
    }
}
