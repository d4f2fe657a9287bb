use super::sendmail::{render_template, MailError, Mailer};

const VERIFICATION_TEMPLATE: &str = include_str!("templates/Verification-email.html");
const RESET_PASSWORD_TEMPLATE: &str = include_str!("templates/ResetPassword-email.html");

pub fn verification_link(app_url: &str, token: &str) -> String {
    format!(
        "{}/api/auth/verify-email?token={}",
        app_url.trim_end_matches('/'),
        urlencoding::encode(token)
    )
}

pub fn reset_link(app_url: &str, token: &str) -> String {
    format!(
        "{}/reset-password?token={}",
        app_url.trim_end_matches('/'),
        urlencoding::encode(token)
    )
}

pub async fn send_verification_email(
    mailer: &Mailer,
    to_email: &str,
    username: &str,
    link: &str,
) -> Result<(), MailError> {
    let html = render_template(
        VERIFICATION_TEMPLATE,
        &[("username", username.to_string()), ("verification_link", link.to_string())],
    );
    mailer.send_email(to_email, "Verify your ShramBandhu email", html).await
}

pub async fn send_password_reset_email(
    mailer: &Mailer,
    to_email: &str,
    username: &str,
    link: &str,
) -> Result<(), MailError> {
    let html = render_template(
        RESET_PASSWORD_TEMPLATE,
        &[("username", username.to_string()), ("reset_link", link.to_string())],
    );
    mailer.send_email(to_email, "Reset your ShramBandhu password", html).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links() {
        assert_eq!(
            verification_link("http://localhost:8000/", "abc123"),
            "http://localhost:8000/api/auth/verify-email?token=abc123"
        );
        assert_eq!(
            reset_link("https://shrambandhu.app", "tok"),
            "https://shrambandhu.app/reset-password?token=tok"
        );
    }

    #[test]
    fn test_templates_carry_placeholders() {
        assert!(VERIFICATION_TEMPLATE.contains("{{verification_link}}"));
        assert!(RESET_PASSWORD_TEMPLATE.contains("{{reset_link}}"));
    }
}
