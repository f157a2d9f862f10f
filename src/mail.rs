use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

/// Outbound email. Implementations must return an error when the message
/// was not accepted for delivery, so callers can roll back.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()>;
}

/// Development mailer: records the message in the log instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        tracing::info!(%to, %subject, body_len = html_body.len(), "email not sent (log mailer)");
        Ok(())
    }
}

/// Client for a JSON mail-delivery API (`POST {url}` with a bearer key).
pub struct HttpMailer {
    url: String,
    api_key: Option<String>,
    from: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(url: String, api_key: Option<String>, from: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            url,
            api_key,
            from,
            client,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        let mut request = self.client.post(&self.url).json(&OutgoingEmail {
            from: &self.from,
            to,
            subject,
            html: html_body,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request
            .send()
            .await
            .context("Mail API request failed")?
            .error_for_status()
            .context("Mail API rejected the message")?;
        tracing::info!(%to, %subject, "email sent");
        Ok(())
    }
}

pub const VERIFICATION_SUBJECT: &str = "Verification Email";
pub const RESET_SUBJECT: &str = "Password Reset Request";

pub fn verification_email(otp: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; text-align: center;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2>OTP Verification Email</h2>
        <p>Dear User,</p>
        <p>Thank you for registering. To complete your registration, please use the following OTP
            (One-Time Password) to verify your account:</p>
        <h2 style="letter-spacing: 4px;">{otp}</h2>
        <p>This code will expire in 5 minutes. If you did not request this verification,
            please disregard this email.</p>
    </div>
</body>
</html>"#
    )
}

pub fn password_reset_email(reset_link: &str) -> String {
    format!(
        r#"<h3>Password Reset Request</h3><p>Click <a href="{reset_link}">here</a> to reset your password. This link will expire in 15 minutes.</p>"#
    )
}
