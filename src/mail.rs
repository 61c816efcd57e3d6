//! Outbound mail delivery through an HTTP mail API.
//!
//! Three notification kinds leave the system: an activation code, a password
//! recovery code, and a temporary password. Each message carries a plain-text
//! and an HTML body, plus the school logo as an inline attachment when the
//! configured logo file exists on disk. Sends are attempt-once with a bounded
//! timeout; callers decide how a failure surfaces.

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde::Serialize;

const SEND_TIMEOUT: Duration = Duration::from_secs(20);
const LOGO_CONTENT_ID: &str = "ojt-logo";

/// A fully composed message ready for the mail API.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub attachments: Vec<InlineAttachment>,
}

/// Inline attachment referenced from the HTML body via `cid:`.
#[derive(Debug, Clone)]
pub struct InlineAttachment {
    pub filename: String,
    pub content_type: String,
    pub content_id: String,
    pub bytes: Vec<u8>,
}

impl InlineAttachment {
    /// Load an attachment from disk with the provided metadata.
    pub fn from_path(
        path: impl AsRef<Path>,
        content_type: impl Into<String>,
        content_id: impl Into<String>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("unable to derive filename from {:?}", path))?;
        let bytes =
            fs::read(path).with_context(|| format!("failed to read attachment from {:?}", path))?;

        Ok(Self {
            filename: filename.to_string(),
            content_type: content_type.into(),
            content_id: content_id.into(),
            bytes,
        })
    }
}

#[derive(Serialize)]
struct MailPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
    html_body: &'a str,
    attachments: Vec<AttachmentPayload>,
}

#[derive(Serialize)]
struct AttachmentPayload {
    filename: String,
    content_type: String,
    content_id: String,
    data: String,
    disposition: &'static str,
}

/// Client for the outbound mail API.
#[derive(Clone)]
pub struct Mailer {
    http: Client,
    config: MailConfig,
}

#[derive(Clone, Default)]
struct MailConfig {
    api_url: Option<String>,
    api_key: Option<String>,
    sender: Option<String>,
    logo_path: Option<PathBuf>,
}

impl Mailer {
    /// Build a client using environment variables. Missing configuration is
    /// only an error once a send is attempted.
    pub fn from_env() -> Result<Self> {
        let api_url = env::var("MAIL_API_URL").ok();
        let api_key = env::var("MAIL_API_KEY").ok();
        let sender = env::var("MAIL_FROM").ok();
        let logo_path = env::var("MAIL_LOGO_PATH").ok().map(PathBuf::from);

        Ok(Self {
            http: Client::new(),
            config: MailConfig {
                api_url,
                api_key,
                sender,
                logo_path,
            },
        })
    }

    pub fn activation_code_message(&self, to: &str, code: &str) -> OutboundMessage {
        let subject = "OJT System Activation Code".to_string();
        let text_body = format!("Your activation code is: {code}");
        let html_body = render_code_email(
            "Account Activation",
            &format!(
                "Use the code below to activate the OJT System account for {}.",
                to
            ),
            code,
        );
        self.compose(to, subject, text_body, html_body)
    }

    pub fn recovery_code_message(&self, to: &str, code: &str) -> OutboundMessage {
        let subject = "OJT System Password Reset Code".to_string();
        let text_body = format!("Your password reset code is: {code}");
        let html_body = render_code_email(
            "Password Reset",
            &format!(
                "A password reset was requested for {}. Enter the code below to continue.",
                to
            ),
            code,
        );
        self.compose(to, subject, text_body, html_body)
    }

    pub fn temp_password_message(&self, to: &str, temp_password: &str) -> OutboundMessage {
        let subject = "OJT System Temporary Password".to_string();
        let text_body = format!(
            "Your account is now active.\nTemporary password: {temp_password}\nPlease log in and change your password immediately."
        );
        let html_body = render_code_email(
            "Account Activated",
            "Your account is now active. Sign in with the temporary password below and change it immediately.",
            temp_password,
        );
        self.compose(to, subject, text_body, html_body)
    }

    /// Deliver a message. One attempt, bounded timeout.
    pub async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let Some(api_url) = self.config.api_url.as_ref() else {
            bail!("MAIL_API_URL is not configured but required for outbound mail");
        };
        let Some(api_key) = self.config.api_key.as_ref() else {
            bail!("MAIL_API_KEY is not configured but required for outbound mail");
        };
        let Some(sender) = self.config.sender.as_ref() else {
            bail!("MAIL_FROM is not configured but required for outbound mail");
        };

        let payload = MailPayload {
            from: sender,
            to: &message.to,
            subject: &message.subject,
            text_body: &message.text_body,
            html_body: &message.html_body,
            attachments: message
                .attachments
                .iter()
                .map(|attachment| AttachmentPayload {
                    filename: attachment.filename.clone(),
                    content_type: attachment.content_type.clone(),
                    content_id: attachment.content_id.clone(),
                    data: BASE64.encode(&attachment.bytes),
                    disposition: "inline",
                })
                .collect(),
        };

        let response = self
            .http
            .post(api_url)
            .bearer_auth(api_key)
            .timeout(SEND_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .context("mail API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("mail API returned {status}: {body}"));
        }

        Ok(())
    }

    fn compose(
        &self,
        to: &str,
        subject: String,
        text_body: String,
        html_body: String,
    ) -> OutboundMessage {
        OutboundMessage {
            to: to.to_string(),
            subject,
            text_body,
            html_body,
            attachments: load_logo(self.config.logo_path.as_deref())
                .into_iter()
                .collect(),
        }
    }
}

/// Load the inline logo when the configured file is present. A missing or
/// unreadable logo only drops the attachment, never the message.
fn load_logo(path: Option<&Path>) -> Option<InlineAttachment> {
    let path = path?;
    if !path.exists() {
        return None;
    }
    InlineAttachment::from_path(path, "image/png", LOGO_CONTENT_ID).ok()
}

fn render_code_email(heading: &str, intro: &str, code: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<body style="font-family: Arial, sans-serif; background: #f1f5f9; margin: 0; padding: 1.5rem;">
    <div style="max-width: 480px; margin: 0 auto; background: #ffffff; border-radius: 12px; padding: 2rem; border: 1px solid #e2e8f0;">
        <img src="cid:{LOGO_CONTENT_ID}" alt="" style="max-height: 64px; margin-bottom: 1rem;">
        <h1 style="font-size: 1.3rem; color: #0f172a;">{heading}</h1>
        <p style="color: #475569;">{intro}</p>
        <p style="font-size: 1.6rem; letter-spacing: 0.25rem; font-weight: 700; color: #1d4ed8;">{code}</p>
        <p style="color: #94a3b8; font-size: 0.85rem;">If you did not request this, you can ignore this message.</p>
    </div>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_mailer(logo_path: Option<PathBuf>) -> Mailer {
        Mailer {
            http: Client::new(),
            config: MailConfig {
                api_url: Some("http://localhost/send".to_string()),
                api_key: Some("key".to_string()),
                sender: Some("ojt@example.edu".to_string()),
                logo_path,
            },
        }
    }

    #[test]
    fn activation_message_carries_code_in_both_bodies() {
        let mailer = test_mailer(None);
        let message = mailer.activation_code_message("student@example.edu", "042137");
        assert!(message.text_body.contains("042137"));
        assert!(message.html_body.contains("042137"));
        assert_eq!(message.to, "student@example.edu");
        assert!(message.attachments.is_empty());
    }

    #[test]
    fn missing_logo_is_skipped() {
        assert!(load_logo(Some(Path::new("/nonexistent/logo.png"))).is_none());
        assert!(load_logo(None).is_none());
    }

    #[test]
    fn present_logo_becomes_inline_attachment() {
        let mut file = tempfile::NamedTempFile::with_suffix(".png").unwrap();
        file.write_all(b"\x89PNG fake bytes").unwrap();

        let mailer = test_mailer(Some(file.path().to_path_buf()));
        let message = mailer.temp_password_message("staff@example.edu", "Zq3kP9aB");
        assert_eq!(message.attachments.len(), 1);
        let attachment = &message.attachments[0];
        assert_eq!(attachment.content_id, LOGO_CONTENT_ID);
        assert_eq!(attachment.content_type, "image/png");
        assert!(!attachment.bytes.is_empty());
    }
}
