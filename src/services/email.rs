//! Email service for password-reset mail

use anyhow::{anyhow, Result};
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;

/// Email service for sending transactional mail
pub struct EmailService {
    config: EmailConfig,
    base_url: String,
}

impl EmailService {
    pub fn new(config: EmailConfig, base_url: String) -> Self {
        Self { config, base_url }
    }

    /// Whether an SMTP relay is configured
    pub fn is_configured(&self) -> bool {
        !self.config.smtp_host.is_empty()
    }

    /// Send the password-reset link for `token` to `to_email`.
    ///
    /// Without a configured relay the link is logged instead, so local
    /// setups can still complete the flow.
    pub async fn send_password_reset(
        &self,
        to_email: &str,
        name: &str,
        token: &str,
    ) -> Result<()> {
        let link = format!("{}/reset-password?token={}", self.base_url, token);

        if !self.is_configured() {
            tracing::info!(email = %to_email, link = %link, "SMTP not configured; logging reset link");
            return Ok(());
        }

        let from = format!("{} <{}>", self.config.from_name, self.config.from_address);
        let body = format!(
            "Hello {name},\n\n\
             Someone requested a password reset for your account. If this was you,\n\
             open the link below within one hour to choose a new password:\n\n\
             {link}\n\n\
             If you did not request this, you can ignore this email.\n\n\
             The {from_name} team",
            name = name,
            link = link,
            from_name = self.config.from_name,
        );

        let email = Message::builder()
            .from(from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(to_email
                .parse()
                .map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(format!("[{}] Password reset", self.config.from_name))
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );

        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
                .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
                .credentials(creds)
                .port(self.config.smtp_port)
                .build();

        mailer
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_relay_is_a_no_op() {
        let service = EmailService::new(EmailConfig::default(), "http://localhost:3000".into());
        assert!(!service.is_configured());
        service
            .send_password_reset("jan@example.com", "Jan", "token123")
            .await
            .expect("logs instead of sending");
    }
}
