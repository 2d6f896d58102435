// src/services/mail_service.rs

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::SmtpConfig;
use crate::error::ApiResult;

/// Port that expects TLS from the first byte rather than STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

/// A rendered message ready to send.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub struct Mailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: &SmtpConfig) -> ApiResult<Self> {
        let builder = if config.port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(&config.server)?
        } else {
            SmtpTransport::starttls_relay(&config.server)?
        };
        let mut builder = builder.port(config.port);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from.parse()?,
        })
    }

    /// Sends on a blocking thread so the SMTP exchange never stalls a worker.
    pub async fn send(&self, email: OutgoingEmail) -> ApiResult<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(email.subject)
            .multipart(MultiPart::alternative_plain_html(email.text, email.html))?;

        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&message)).await??;
        log::info!("email sent to {}", email.to);
        Ok(())
    }
}

pub fn verification_email(to: &str, username: &str, link: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Verify Your Email".to_string(),
        text: format!(
            "Hi {},\n\nPlease verify your email address by opening this link:\n{}\n\nThe link expires in 24 hours.",
            username, link
        ),
        html: format!(
            "<p>Hi {},</p><p>Please verify your email address:</p>\
             <p><a href=\"{}\">Verify email</a></p><p>The link expires in 24 hours.</p>",
            username, link
        ),
    }
}

pub fn password_reset_email(to: &str, username: &str, token: &str, link: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Password Reset Request".to_string(),
        text: format!(
            "Hi {},\n\nYour password reset token is: {}\nReset your password here: {}\n\nThe token expires in 1 hour.",
            username, token, link
        ),
        html: format!(
            "<p>Hi {},</p><p>Your password reset token is: <strong>{}</strong></p>\
             <p><a href=\"{}\">Reset password</a></p><p>The token expires in 1 hour.</p>",
            username, token, link
        ),
    }
}

/// Escapes text for an HTML body or a double-quoted attribute.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn blog_notification_email(to: &str, username: &str, title: &str, excerpt: Option<&str>, url: &str) -> OutgoingEmail {
    let excerpt = excerpt.unwrap_or_default();
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("New post: {}", title),
        text: format!("Hi {},\n\nA new post is up: {}\n{}\n\nRead it here: {}", username, title, excerpt, url),
        html: format!(
            "<p>Hi {},</p><h2>{}</h2><p>{}</p><p><a href=\"{}\">Read the post</a></p>",
            escape_html(username),
            escape_html(title),
            escape_html(excerpt),
            escape_html(url)
        ),
    }
}
