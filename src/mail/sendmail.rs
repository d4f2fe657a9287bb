use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use thiserror::Error;
use tokio::time::{sleep, Duration};

use crate::config::Config;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Could not build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Transport(String),

    #[error("Mail task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Fills `{{key}}` placeholders; values are escaped before they reach the HTML.
pub fn render_template(template: &str, placeholders: &[(&str, String)]) -> String {
    placeholders
        .iter()
        .fold(template.to_string(), |html, (key, value)| {
            html.replace(&format!("{{{{{}}}}}", key), &ammonia::clean_text(value))
        })
}

#[derive(Debug, Clone)]
pub struct Mailer {
    host: String,
    port: u16,
    username: String,
    password: String,
    from: String,
}

impl Mailer {
    pub fn new(config: &Config) -> Self {
        Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            username: config.smtp_username.clone(),
            password: config.smtp_password.clone(),
            from: config.mail_default_sender.clone(),
        }
    }

    pub async fn send_email(&self, to_email: &str, subject: &str, html_body: String) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.parse::<Mailbox>().map_err(|_| MailError::InvalidAddress(self.from.clone()))?)
            .to(to_email.parse::<Mailbox>().map_err(|_| MailError::InvalidAddress(to_email.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body)?;

        let mut last_error = None;
        for attempt in 1..=MAX_RETRIES {
            match self.send_blocking(message.clone()).await {
                Ok(()) => {
                    tracing::info!("Email '{}' sent to {}", subject, to_email);
                    return Ok(());
                }
                Err(e) => {
                    if attempt < MAX_RETRIES {
                        let delay = RETRY_DELAY_MS * 2_u64.pow(attempt - 1);
                        tracing::warn!(
                            "Email attempt {} to {} failed: {}. Retrying in {}ms...",
                            attempt,
                            to_email,
                            e,
                            delay
                        );
                        sleep(Duration::from_millis(delay)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let error = last_error.unwrap_or_else(|| MailError::Transport("unknown error".to_string()));
        tracing::error!("Email to {} failed after {} attempts: {}", to_email, MAX_RETRIES, error);
        Err(error)
    }

    async fn send_blocking(&self, message: Message) -> Result<(), MailError> {
        let mailer = self.clone();
        tokio::task::spawn_blocking(move || {
            let credentials = Credentials::new(mailer.username, mailer.password);
            let builder = if mailer.port == 465 {
                SmtpTransport::relay(&mailer.host)
            } else {
                SmtpTransport::starttls_relay(&mailer.host)
            }
            .map_err(|e| MailError::Transport(e.to_string()))?;

            builder
                .port(mailer.port)
                .credentials(credentials)
                .build()
                .send(&message)
                .map(|_| ())
                .map_err(|e| MailError::Transport(e.to_string()))
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_template_escapes_values() {
        let html = render_template(
            "<p>Hello {{username}}</p><a href=\"{{link}}\">go</a>",
            &[
                ("username", "<script>alert(1)</script>".to_string()),
                ("link", "https://shrambandhu.app/verify".to_string()),
            ],
        );
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("{{link}}"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_rejected_before_sending() {
        let mailer = Mailer::new(&Config::test_config());
        let err = mailer
            .send_email("not-an-address", "Subject", "<p>hi</p>".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress(_)));
    }
}
