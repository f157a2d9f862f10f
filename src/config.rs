use std::net::SocketAddr;

use anyhow::{Context, Result};

/// Runtime configuration, read once at startup from the environment
/// (after `dotenvy` has loaded any `.env` file).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    /// Prefix for URLs handed out for uploaded files.
    pub public_base_url: String,
    pub upload_dir: String,
    pub reset_url_base: String,
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
    pub otp_ttl_secs: i64,
    /// Echo freshly issued OTPs in the `/sendotp` response. Development only.
    pub echo_otp: bool,
}

impl Config {
    /// # Environment Variables
    /// - `DATABASE_URL` (required)
    /// - `JWT_SECRET` (required)
    /// - `HOST` / `PORT` (default `127.0.0.1:5000`)
    /// - `PUBLIC_BASE_URL` (default `http://HOST:PORT`)
    /// - `UPLOAD_DIR` (default `uploads`)
    /// - `RESET_URL_BASE` (default `http://localhost:5000/reset-password`)
    /// - `MAIL_API_URL`, `MAIL_API_KEY` (optional, log-only mailer when unset)
    /// - `MAIL_FROM`
    /// - `OTP_TTL_SECS` (default 300)
    /// - `ECHO_OTP` (default false)
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .context("PORT must be a valid port number")?;
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));
        let otp_ttl_secs = std::env::var("OTP_TTL_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .context("OTP_TTL_SECS must be a number of seconds")?;
        let echo_otp = std::env::var("ECHO_OTP")
            .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            public_base_url,
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()),
            reset_url_base: std::env::var("RESET_URL_BASE")
                .unwrap_or_else(|_| "http://localhost:5000/reset-password".into()),
            mail_api_url: std::env::var("MAIL_API_URL").ok(),
            mail_api_key: std::env::var("MAIL_API_KEY").ok(),
            mail_from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Social Media <no-reply@localhost>".into()),
            otp_ttl_secs,
            echo_otp,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}
