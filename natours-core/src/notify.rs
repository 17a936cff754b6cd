use async_trait::async_trait;
use natours_shared::Masked;

use crate::models::{Booking, Tour, User};
use crate::password::RESET_TOKEN_TTL_MINUTES;
use crate::CoreResult;

#[derive(Debug, Clone, PartialEq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl MailMessage {
    pub fn welcome(user: &User, url: &str) -> Self {
        let first_name = user.first_name();
        Self {
            to: user.email.clone(),
            subject: "Welcome to the Natours Family!".to_string(),
            html: layout(
                first_name,
                "Welcome to Natours, we're glad to have you 🎉🙏",
                "We're all a big family here, so make sure to upload your user photo so we get to know you a bit better!",
                url,
                "Upload user photo",
            ),
            text: format!(
                "Hi {},\n\nWelcome to Natours, we're glad to have you.\nUpload your user photo: {}\n",
                first_name, url
            ),
        }
    }

    pub fn booking_confirmation(user: &User, tour: &Tour, booking: &Booking, url: &str) -> Self {
        let first_name = user.first_name();
        let line = format!("Your booking for {} is confirmed. We charged {:.2}.", tour.name, booking.price);
        Self {
            to: user.email.clone(),
            subject: format!("Your booking: {}", tour.name),
            html: layout(first_name, &line, "See all your upcoming adventures in your account.", url, "My tours"),
            text: format!("Hi {},\n\n{}\nYour tours: {}\n", first_name, line, url),
        }
    }

    pub fn password_reset(user: &User, url: &str) -> Self {
        let first_name = user.first_name();
        let lead = "Forgot your password? Submit a PATCH request with your new password and passwordConfirm to the link below.";
        Self {
            to: user.email.clone(),
            subject: format!("Your password reset token (valid for only {} minutes)", RESET_TOKEN_TTL_MINUTES),
            html: layout(
                first_name,
                lead,
                "If you didn't forget your password, please ignore this email!",
                url,
                "Reset your password",
            ),
            text: format!(
                "Hi {},\n\n{}\n{}\nIf you didn't forget your password, please ignore this email!\n",
                first_name, lead, url
            ),
        }
    }
}

fn layout(first_name: &str, lead: &str, body: &str, url: &str, action: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"></head>
<body style="font-family: sans-serif; line-height: 1.6; color: #333;">
  <p>Hi {first_name},</p>
  <p>{lead}</p>
  <p>{body}</p>
  <p><a href="{url}" style="display: inline-block; background-color: #55c57a; color: white; padding: 10px 20px; text-decoration: none; border-radius: 4px;">{action}</a></p>
  <p>- Natours</p>
</body>
</html>"#
    )
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> CoreResult<()>;
}

/// Used when outbound mail is disabled; only logs what would be sent.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> CoreResult<()> {
        tracing::info!(to = %Masked(&message.to), subject = %message.subject, "Mail delivery disabled, message dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> User {
        crate::entity::build(json!({ "name": "Laura Wilson", "email": "laura@example.com" })).unwrap()
    }

    #[test]
    fn test_welcome_addresses_first_name() {
        let message = MailMessage::welcome(&user(), "https://natours.test/me");
        assert_eq!(message.to, "laura@example.com");
        assert!(message.html.contains("Hi Laura,"));
        assert!(message.text.contains("https://natours.test/me"));
    }

    #[test]
    fn test_password_reset_carries_link() {
        let url = "https://natours.test/api/v1/users/resetPassword/abc123";
        let message = MailMessage::password_reset(&user(), url);
        assert_eq!(message.subject, "Your password reset token (valid for only 10 minutes)");
        assert!(message.html.contains(url));
        assert!(message.text.contains(url));
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_everything() {
        let message = MailMessage::welcome(&user(), "https://natours.test/me");
        assert!(LogMailer.send(message).await.is_ok());
    }
}
