//! One-time-code flows: account activation and password recovery.
//!
//! Codes are six random digits stored on the account row and delivered by
//! mail. Resend cooldowns and "code verified" marks live in an in-process
//! store keyed by (operation, email); both are advisory, matching the
//! original per-session behavior.

use std::collections::HashMap;

use axum::{
    extract::{Form, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use serde::Deserialize;
use tracing::error;

use crate::web::{
    AppState,
    auth::{self, Account},
    templates::{self, CodePageKind, CodePageView},
};

pub const RESEND_COOLDOWN_SECS: i64 = 60;
const VERIFIED_TTL_MINUTES: i64 = 15;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CodeOp {
    Activation,
    Recovery,
}

#[derive(Clone, Copy, Default)]
struct CodeEntry {
    last_sent_at: Option<DateTime<Utc>>,
    verified_until: Option<DateTime<Utc>>,
}

/// Keyed (operation, email) → cooldown/verification state.
#[derive(Default)]
pub struct CodeGate {
    entries: HashMap<(CodeOp, String), CodeEntry>,
}

impl CodeGate {
    /// Seconds left before another send is allowed, or None when clear.
    pub fn cooldown_remaining(&self, op: CodeOp, email: &str, now: DateTime<Utc>) -> Option<i64> {
        let entry = self.entries.get(&(op, email.to_string()))?;
        let last = entry.last_sent_at?;
        let elapsed = (now - last).num_seconds();
        if elapsed < RESEND_COOLDOWN_SECS {
            Some(RESEND_COOLDOWN_SECS - elapsed)
        } else {
            None
        }
    }

    pub fn note_sent(&mut self, op: CodeOp, email: &str, now: DateTime<Utc>) {
        let entry = self.entries.entry((op, email.to_string())).or_default();
        entry.last_sent_at = Some(now);
    }

    pub fn mark_verified(&mut self, op: CodeOp, email: &str, now: DateTime<Utc>) {
        let entry = self.entries.entry((op, email.to_string())).or_default();
        entry.verified_until = Some(now + Duration::minutes(VERIFIED_TTL_MINUTES));
    }

    pub fn is_verified(&self, op: CodeOp, email: &str, now: DateTime<Utc>) -> bool {
        self.entries
            .get(&(op, email.to_string()))
            .and_then(|entry| entry.verified_until)
            .map(|until| now < until)
            .unwrap_or(false)
    }

    /// Consume the verification mark after a successful reset.
    pub fn clear_verified(&mut self, op: CodeOp, email: &str) {
        if let Some(entry) = self.entries.get_mut(&(op, email.to_string())) {
            entry.verified_until = None;
        }
    }
}

/// Random six-digit code, zero padded.
pub fn six_digit_code() -> String {
    let mut buf = [0u8; 4];
    OsRng.fill_bytes(&mut buf);
    format!("{:06}", u32::from_le_bytes(buf) % 1_000_000)
}

/// Random URL-safe temporary password (eight characters).
pub fn temp_password() -> String {
    let mut buf = [0u8; 6];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

#[derive(Deserialize)]
pub struct ActivationForm {
    #[serde(default)]
    cca_email: String,
    #[serde(default)]
    stage: Option<String>,
    #[serde(default)]
    activation_code: Option<String>,
}

pub async fn activation_page() -> Html<String> {
    Html(templates::render_code_page(&CodePageView::blank(
        CodePageKind::Activation,
    )))
}

pub async fn process_activation(
    State(state): State<AppState>,
    Form(form): Form<ActivationForm>,
) -> Response {
    let email = form.cca_email.trim().to_lowercase();
    if email.is_empty() {
        return activation_view(CodePageView {
            message: Some(("Please enter your CCA email.", "error")),
            ..CodePageView::blank(CodePageKind::Activation)
        });
    }

    let stage = form.stage.as_deref().unwrap_or("send");
    if matches!(stage, "send" | "resend") {
        return send_activation_code(&state, &email).await;
    }

    redeem_activation_code(&state, &email, form.activation_code.as_deref()).await
}

async fn send_activation_code(state: &AppState, email: &str) -> Response {
    let now = Utc::now();
    {
        let gate = state.code_gate().read().await;
        if let Some(remaining) = gate.cooldown_remaining(CodeOp::Activation, email, now) {
            return activation_view(CodePageView {
                message: Some(("Please wait before resending the code.", "error")),
                email,
                show_code: true,
                cooldown_seconds: Some(remaining),
                ..CodePageView::blank(CodePageKind::Activation)
            });
        }
    }

    let account = match auth::find_account_by_email(state.pool_ref(), email).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return activation_view(CodePageView {
                message: Some(("Email not found. Please contact the admin.", "error")),
                email,
                ..CodePageView::blank(CodePageKind::Activation)
            });
        }
        Err(err) => {
            error!(?err, "failed to look up account for activation");
            return activation_server_error(email);
        }
    };

    let code = six_digit_code();
    let query = format!(
        "UPDATE {} SET activation_code = $1, active_status = FALSE, is_password_temp = TRUE WHERE cca_email = $2",
        account.role.table()
    );
    if let Err(err) = sqlx::query(&query)
        .bind(&code)
        .bind(email)
        .execute(state.pool_ref())
        .await
    {
        error!(?err, "failed to store activation code");
        return activation_server_error(email);
    }

    let message = state.mailer().activation_code_message(email, &code);
    if let Err(err) = state.mailer().send(&message).await {
        error!(?err, %email, "failed to send activation email");
        return activation_view(CodePageView {
            message: Some(("Failed to send the activation email. Please try again.", "error")),
            email,
            ..CodePageView::blank(CodePageKind::Activation)
        });
    }

    state
        .code_gate()
        .write()
        .await
        .note_sent(CodeOp::Activation, email, now);

    activation_view(CodePageView {
        message: Some(("Activation code sent. Please check your email.", "success")),
        email,
        show_code: true,
        cooldown_seconds: Some(RESEND_COOLDOWN_SECS),
        ..CodePageView::blank(CodePageKind::Activation)
    })
}

async fn redeem_activation_code(state: &AppState, email: &str, code: Option<&str>) -> Response {
    let code = code.map(str::trim).unwrap_or_default();
    if code.is_empty() {
        return activation_view(CodePageView {
            message: Some(("Please enter the activation code.", "error")),
            email,
            show_code: true,
            ..CodePageView::blank(CodePageKind::Activation)
        });
    }

    let account = match auth::find_account_by_email(state.pool_ref(), email).await {
        Ok(Some(account)) => account,
        Ok(None) => return invalid_activation_code(email),
        Err(err) => {
            error!(?err, "failed to look up account for code redemption");
            return activation_server_error(email);
        }
    };

    let temp_password = temp_password();
    let password_hash = match auth::hash_password(&temp_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!(?err, "failed to hash temporary password");
            return activation_server_error(email);
        }
    };

    // The code is cleared in the same statement so a second redemption with
    // the consumed code no longer matches.
    let query = format!(
        "UPDATE {} SET active_status = TRUE, password = $1, is_password_temp = TRUE, activation_code = ''
         WHERE cca_email = $2 AND activation_code = $3",
        account.role.table()
    );
    let result = match sqlx::query(&query)
        .bind(&password_hash)
        .bind(email)
        .bind(code)
        .execute(state.pool_ref())
        .await
    {
        Ok(result) => result,
        Err(err) => {
            error!(?err, "failed to redeem activation code");
            return activation_server_error(email);
        }
    };

    if result.rows_affected() == 0 {
        return invalid_activation_code(email);
    }

    let message = state.mailer().temp_password_message(email, &temp_password);
    if let Err(err) = state.mailer().send(&message).await {
        error!(?err, %email, "failed to send temporary password email");
        return activation_view(CodePageView {
            message: Some((
                "Account activated, but the temporary password email failed to send. Use password recovery to set a password.",
                "error",
            )),
            email,
            ..CodePageView::blank(CodePageKind::Activation)
        });
    }

    Redirect::to("/?status=activated").into_response()
}

fn invalid_activation_code(email: &str) -> Response {
    activation_view(CodePageView {
        message: Some(("Invalid activation code.", "error")),
        email,
        show_code: true,
        ..CodePageView::blank(CodePageKind::Activation)
    })
}

fn activation_server_error(email: &str) -> Response {
    activation_view(CodePageView {
        message: Some(("Something went wrong. Please try again.", "error")),
        email,
        ..CodePageView::blank(CodePageKind::Activation)
    })
}

fn activation_view(view: CodePageView) -> Response {
    Html(templates::render_code_page(&view)).into_response()
}

#[derive(Deserialize)]
pub struct ForgotPasswordForm {
    #[serde(default)]
    reset_email: String,
    #[serde(default)]
    stage: Option<String>,
    #[serde(default)]
    recovery_code: Option<String>,
    #[serde(default)]
    new_password: Option<String>,
    #[serde(default)]
    confirm_password: Option<String>,
}

pub async fn forgot_password_page() -> Html<String> {
    Html(templates::render_code_page(&CodePageView::blank(
        CodePageKind::Recovery,
    )))
}

pub async fn process_forgot_password(
    State(state): State<AppState>,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    let email = form.reset_email.trim().to_lowercase();
    if email.is_empty() {
        return recovery_view(CodePageView {
            message: Some(("Please enter your email.", "error")),
            ..CodePageView::blank(CodePageKind::Recovery)
        });
    }

    let account = match auth::find_account_by_email(state.pool_ref(), &email).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return recovery_view(CodePageView {
                message: Some(("Email not found. Please contact the admin.", "error")),
                email: &email,
                ..CodePageView::blank(CodePageKind::Recovery)
            });
        }
        Err(err) => {
            error!(?err, "failed to look up account for recovery");
            return recovery_server_error(&email);
        }
    };

    match form.stage.as_deref().unwrap_or("send") {
        "send" | "resend" => send_recovery_code(&state, &account).await,
        "verify" => verify_recovery_code(&state, &account, form.recovery_code.as_deref()).await,
        "reset" => {
            reset_password(
                &state,
                &account,
                form.new_password.as_deref(),
                form.confirm_password.as_deref(),
            )
            .await
        }
        _ => recovery_view(CodePageView {
            message: Some(("Invalid request.", "error")),
            email: &email,
            ..CodePageView::blank(CodePageKind::Recovery)
        }),
    }
}

async fn send_recovery_code(state: &AppState, account: &Account) -> Response {
    let email = account.cca_email.as_str();
    let now = Utc::now();
    {
        let gate = state.code_gate().read().await;
        if let Some(remaining) = gate.cooldown_remaining(CodeOp::Recovery, email, now) {
            return recovery_view(CodePageView {
                message: Some(("Please wait before resending the code.", "error")),
                email,
                show_code: true,
                cooldown_seconds: Some(remaining),
                ..CodePageView::blank(CodePageKind::Recovery)
            });
        }
    }

    let code = six_digit_code();
    let query = format!(
        "UPDATE {} SET recovery_code = $1 WHERE id = $2",
        account.role.table()
    );
    if let Err(err) = sqlx::query(&query)
        .bind(&code)
        .bind(account.id)
        .execute(state.pool_ref())
        .await
    {
        error!(?err, "failed to store recovery code");
        return recovery_server_error(email);
    }

    let message = state.mailer().recovery_code_message(email, &code);
    if let Err(err) = state.mailer().send(&message).await {
        error!(?err, %email, "failed to send recovery email");
        return recovery_view(CodePageView {
            message: Some(("Failed to send the reset email. Please try again.", "error")),
            email,
            ..CodePageView::blank(CodePageKind::Recovery)
        });
    }

    state
        .code_gate()
        .write()
        .await
        .note_sent(CodeOp::Recovery, email, now);

    recovery_view(CodePageView {
        message: Some(("Reset code sent. Please check your email.", "success")),
        email,
        show_code: true,
        cooldown_seconds: Some(RESEND_COOLDOWN_SECS),
        ..CodePageView::blank(CodePageKind::Recovery)
    })
}

async fn verify_recovery_code(state: &AppState, account: &Account, code: Option<&str>) -> Response {
    let email = account.cca_email.as_str();
    let code = code.map(str::trim).unwrap_or_default();
    if code.is_empty() {
        return recovery_view(CodePageView {
            message: Some(("Please enter the reset code.", "error")),
            email,
            show_code: true,
            ..CodePageView::blank(CodePageKind::Recovery)
        });
    }

    let query = format!(
        "SELECT recovery_code FROM {} WHERE id = $1",
        account.role.table()
    );
    let stored: Option<String> = match sqlx::query_scalar(&query)
        .bind(account.id)
        .fetch_one(state.pool_ref())
        .await
    {
        Ok(stored) => stored,
        Err(err) => {
            error!(?err, "failed to read recovery code");
            return recovery_server_error(email);
        }
    };

    // A wrong guess leaves the stored code valid for further attempts.
    if stored.as_deref() != Some(code) {
        return recovery_view(CodePageView {
            message: Some(("Invalid reset code.", "error")),
            email,
            show_code: true,
            ..CodePageView::blank(CodePageKind::Recovery)
        });
    }

    state
        .code_gate()
        .write()
        .await
        .mark_verified(CodeOp::Recovery, email, Utc::now());

    recovery_view(CodePageView {
        email,
        show_password: true,
        ..CodePageView::blank(CodePageKind::Recovery)
    })
}

async fn reset_password(
    state: &AppState,
    account: &Account,
    new_password: Option<&str>,
    confirm_password: Option<&str>,
) -> Response {
    let email = account.cca_email.as_str();

    let verified = state
        .code_gate()
        .read()
        .await
        .is_verified(CodeOp::Recovery, email, Utc::now());
    if !verified {
        return recovery_view(CodePageView {
            message: Some(("Please verify your reset code first.", "error")),
            email,
            show_code: true,
            ..CodePageView::blank(CodePageKind::Recovery)
        });
    }

    let new_password = new_password.unwrap_or_default();
    let confirm_password = confirm_password.unwrap_or_default();
    if new_password.is_empty() || confirm_password.is_empty() {
        return recovery_view(CodePageView {
            message: Some(("Please fill in both password fields.", "error")),
            email,
            show_password: true,
            ..CodePageView::blank(CodePageKind::Recovery)
        });
    }
    if new_password != confirm_password {
        return recovery_view(CodePageView {
            message: Some(("Passwords do not match.", "error")),
            email,
            show_password: true,
            ..CodePageView::blank(CodePageKind::Recovery)
        });
    }

    let password_hash = match auth::hash_password(new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!(?err, "failed to hash reset password");
            return recovery_server_error(email);
        }
    };

    let query = format!(
        "UPDATE {} SET password = $1, is_password_temp = FALSE, recovery_code = NULL WHERE id = $2",
        account.role.table()
    );
    if let Err(err) = sqlx::query(&query)
        .bind(&password_hash)
        .bind(account.id)
        .execute(state.pool_ref())
        .await
    {
        error!(?err, "failed to store reset password");
        return recovery_server_error(email);
    }

    state
        .code_gate()
        .write()
        .await
        .clear_verified(CodeOp::Recovery, email);

    Redirect::to("/?status=password_reset").into_response()
}

fn recovery_server_error(email: &str) -> Response {
    recovery_view(CodePageView {
        message: Some(("Something went wrong. Please try again.", "error")),
        email,
        ..CodePageView::blank(CodePageKind::Recovery)
    })
}

fn recovery_view(view: CodePageView) -> Response {
    Html(templates::render_code_page(&view)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_750_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn cooldown_counts_down_and_expires() {
        let mut gate = CodeGate::default();
        assert_eq!(gate.cooldown_remaining(CodeOp::Activation, "a@x", at(0)), None);

        gate.note_sent(CodeOp::Activation, "a@x", at(0));
        assert_eq!(
            gate.cooldown_remaining(CodeOp::Activation, "a@x", at(10)),
            Some(50)
        );
        assert_eq!(
            gate.cooldown_remaining(CodeOp::Activation, "a@x", at(59)),
            Some(1)
        );
        assert_eq!(gate.cooldown_remaining(CodeOp::Activation, "a@x", at(60)), None);
    }

    #[test]
    fn cooldown_is_keyed_per_operation_and_email() {
        let mut gate = CodeGate::default();
        gate.note_sent(CodeOp::Activation, "a@x", at(0));
        assert_eq!(gate.cooldown_remaining(CodeOp::Recovery, "a@x", at(10)), None);
        assert_eq!(
            gate.cooldown_remaining(CodeOp::Activation, "b@x", at(10)),
            None
        );
    }

    #[test]
    fn verification_mark_expires_and_clears() {
        let mut gate = CodeGate::default();
        assert!(!gate.is_verified(CodeOp::Recovery, "a@x", at(0)));

        gate.mark_verified(CodeOp::Recovery, "a@x", at(0));
        assert!(gate.is_verified(CodeOp::Recovery, "a@x", at(60)));
        assert!(!gate.is_verified(CodeOp::Recovery, "a@x", at(VERIFIED_TTL_MINUTES * 60)));

        gate.mark_verified(CodeOp::Recovery, "a@x", at(0));
        gate.clear_verified(CodeOp::Recovery, "a@x");
        assert!(!gate.is_verified(CodeOp::Recovery, "a@x", at(1)));
    }

    #[test]
    fn six_digit_codes_are_exactly_six_digits() {
        for _ in 0..32 {
            let code = six_digit_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn temp_passwords_are_url_safe() {
        for _ in 0..32 {
            let password = temp_password();
            assert_eq!(password.len(), 8);
            assert!(
                password
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            );
        }
    }
}
