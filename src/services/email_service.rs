use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use std::env;
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Failed to build email message: {0}")]
    MessageBuild(String),
    #[error("Failed to send email: {0}")]
    SendFailed(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send_magic_link_email(
        &self,
        to_email: &str,
        name: &str,
        login_url: &str,
    ) -> Result<(), EmailError>;
    async fn send_digest_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), EmailError>;
}

pub const MAGIC_LINK_SUBJECT: &str = "☕ Your Steep login link";

pub fn magic_link_html(name: &str, login_url: &str) -> String {
    format!(
        r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 500px; margin: 0 auto; padding: 40px 20px;">
    <h1 style="font-size: 24px; margin-bottom: 20px;">☕ Steep</h1>
    <p style="font-size: 16px; color: #333; margin-bottom: 20px;">Hi {name},</p>
    <p style="font-size: 16px; color: #333; margin-bottom: 30px;">Click the button below to log in to your Steep dashboard:</p>
    <p style="text-align: center; margin: 30px 0;">
        <a href="{url}" style="display: inline-block; background: #1a1a2e; color: white; padding: 14px 28px; text-decoration: none; border-radius: 8px; font-weight: 600;">Log in to Steep</a>
    </p>
    <p style="color: #666; font-size: 14px;">Or copy and paste this link into your browser:</p>
    <p style="color: #666; font-size: 14px; word-break: break-all;">{url}</p>
    <p style="color: #999; font-size: 12px; margin-top: 40px;">This link expires in 15 minutes. If you didn't request this, you can ignore this email.</p>
</body>
</html>
"#,
        name = escape_html(name),
        url = login_url,
    )
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A message captured by [`MockEmailService`] instead of being delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Logs outgoing mail and keeps it in memory so tests can inspect the outbox.
#[derive(Default)]
pub struct MockEmailService {
    outbox: Mutex<Vec<SentEmail>>,
    fail_sends: bool,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock whose every send fails, for exercising error paths.
    pub fn failing() -> Self {
        Self {
            outbox: Mutex::new(Vec::new()),
            fail_sends: true,
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    fn record(&self, to: &str, subject: &str, body: String) -> Result<(), EmailError> {
        if self.fail_sends {
            return Err(EmailError::SendFailed("mock delivery failure".to_string()));
        }
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EmailService for MockEmailService {
    async fn send_magic_link_email(
        &self,
        to_email: &str,
        name: &str,
        login_url: &str,
    ) -> Result<(), EmailError> {
        tracing::info!("📧 [MOCK EMAIL] Magic login link to: {}", to_email);
        tracing::info!("   Subject: {}", MAGIC_LINK_SUBJECT);
        tracing::info!("   Login link: {}", login_url);
        tracing::info!("   ---");
        self.record(to_email, MAGIC_LINK_SUBJECT, magic_link_html(name, login_url))
    }

    async fn send_digest_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        tracing::info!("📧 [MOCK EMAIL] Weekly digest to: {}", to_email);
        tracing::info!("   Subject: {}", subject);
        tracing::info!("   Body: {} bytes of HTML", html_body.len());
        tracing::info!("   ---");
        self.record(to_email, subject, html_body.to_string())
    }
}

pub struct SmtpEmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    from_name: String,
}

impl SmtpEmailService {
    pub fn new() -> Result<Self, EmailError> {
        let smtp_host = env::var("SMTP_HOST")
            .map_err(|_| EmailError::ConfigError("SMTP_HOST not set".to_string()))?;
        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .map_err(|_| EmailError::ConfigError("Invalid SMTP_PORT".to_string()))?;
        let smtp_username = env::var("SMTP_USERNAME")
            .map_err(|_| EmailError::ConfigError("SMTP_USERNAME not set".to_string()))?;
        let smtp_password = env::var("SMTP_PASSWORD")
            .map_err(|_| EmailError::ConfigError("SMTP_PASSWORD not set".to_string()))?;
        let from_email = env::var("SMTP_FROM_EMAIL")
            .map_err(|_| EmailError::ConfigError("SMTP_FROM_EMAIL not set".to_string()))?;
        let from_name = env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Steep".to_string());

        let encryption = env::var("SMTP_ENCRYPTION").unwrap_or_else(|_| "starttls".to_string());

        let credentials = Credentials::new(smtp_username, smtp_password);

        let mailer = match encryption.to_lowercase().as_str() {
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp_host)
                .map_err(|e| EmailError::ConfigError(format!("SMTP relay error: {}", e)))?
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            "starttls" => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp_host)
                .map_err(|e| EmailError::ConfigError(format!("SMTP starttls error: {}", e)))?
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp_host)
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            _ => {
                return Err(EmailError::ConfigError(format!(
                    "Invalid SMTP_ENCRYPTION value: {}. Use 'tls', 'starttls', or 'none'",
                    encryption
                )))
            }
        };

        Ok(Self {
            mailer,
            from_email,
            from_name,
        })
    }

    async fn send_html(&self, to_email: &str, subject: &str, html_body: String) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                format!("{} <{}>", self.from_name, self.from_email)
                    .parse()
                    .map_err(|e| {
                        EmailError::MessageBuild(format!("Invalid from address: {}", e))
                    })?,
            )
            .to(to_email
                .parse()
                .map_err(|e| EmailError::MessageBuild(format!("Invalid to address: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body)
            .map_err(|e| EmailError::MessageBuild(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl EmailService for SmtpEmailService {
    async fn send_magic_link_email(
        &self,
        to_email: &str,
        name: &str,
        login_url: &str,
    ) -> Result<(), EmailError> {
        self.send_html(to_email, MAGIC_LINK_SUBJECT, magic_link_html(name, login_url))
            .await
    }

    async fn send_digest_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        self.send_html(to_email, subject, html_body.to_string()).await
    }
}

pub fn create_email_service() -> Arc<dyn EmailService> {
    if env::var("SMTP_HOST").is_ok() {
        match SmtpEmailService::new() {
            Ok(service) => {
                tracing::info!("Using SMTP email service");
                Arc::new(service)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize SMTP email service: {}. Falling back to mock service",
                    e
                );
                Arc::new(MockEmailService::new())
            }
        }
    } else {
        tracing::info!(
            "SMTP not configured. Using mock email service (emails will be logged to console)"
        );
        Arc::new(MockEmailService::new())
    }
}
