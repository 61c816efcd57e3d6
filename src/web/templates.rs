use std::borrow::Cow;

use chrono::{Datelike, Utc};

use crate::web::auth::Role;

const BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }
        header { background: #ffffff; padding: 1.5rem; border-bottom: 1px solid #e2e8f0; }
        .header-bar { display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; }
        .header-bar h1 { margin: 0; font-size: 1.4rem; }
        .who { color: #475569; font-size: 0.9rem; }
        nav.app-nav { display: flex; gap: 0.5rem; flex-wrap: wrap; margin-top: 1rem; }
        nav.app-nav a { color: #1d4ed8; text-decoration: none; font-weight: 600; background: #e0f2fe; padding: 0.45rem 0.9rem; border-radius: 999px; border: 1px solid #bfdbfe; }
        nav.app-nav a:hover { background: #bfdbfe; }
        nav.app-nav a.active { background: #1d4ed8; color: #ffffff; border-color: #1d4ed8; }
        main { padding: 1.5rem; max-width: 1200px; margin: 0 auto; box-sizing: border-box; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; box-shadow: 0 18px 40px rgba(15, 23, 42, 0.08); margin-bottom: 1.5rem; }
        .panel h2 { margin-top: 0; }
        label { display: block; margin-bottom: 0.35rem; font-weight: 600; }
        input, select { padding: 0.6rem; border-radius: 8px; border: 1px solid #cbd5f5; background: #f8fafc; color: #0f172a; box-sizing: border-box; }
        input:focus, select:focus { outline: none; border-color: #2563eb; box-shadow: 0 0 0 3px rgba(37, 99, 235, 0.12); }
        button { padding: 0.6rem 1.1rem; border: none; border-radius: 8px; background: #2563eb; color: #ffffff; font-weight: 600; cursor: pointer; }
        button:hover { background: #1d4ed8; }
        button.quiet { background: #e2e8f0; color: #0f172a; }
        table { width: 100%; border-collapse: collapse; margin-top: 1rem; background: #ffffff; }
        th, td { padding: 0.55rem 0.7rem; border-bottom: 1px solid #e2e8f0; text-align: left; font-size: 0.92rem; }
        th { background: #f1f5f9; font-weight: 600; }
        .flash { padding: 0.75rem 1rem; border-radius: 8px; margin-bottom: 1rem; font-weight: 600; }
        .flash.success { background: #dcfce7; color: #166534; }
        .flash.error { background: #fee2e2; color: #b91c1c; }
        .summary-cards { display: flex; gap: 1rem; flex-wrap: wrap; }
        .summary-cards .card { flex: 1 1 160px; background: #f1f5f9; border-radius: 10px; padding: 1rem; }
        .summary-cards .card .value { font-size: 1.6rem; font-weight: 700; }
        .note { color: #475569; font-size: 0.9rem; }
        .check-cell { text-align: center; }
        .app-footer { margin-top: 3rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }
        @media (max-width: 768px) {
            main { padding: 1rem; }
            table { font-size: 0.85rem; }
        }
"#;

const AUTH_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; display: flex; flex-direction: column; align-items: center; justify-content: center; min-height: 100vh; margin: 0; background: #f1f5f9; color: #0f172a; padding: 1.5rem; box-sizing: border-box; }
        main { width: 100%; max-width: 440px; }
        .panel { background: #ffffff; padding: 2.25rem 2rem; border-radius: 18px; box-shadow: 0 20px 60px rgba(15, 23, 42, 0.08); border: 1px solid #e2e8f0; box-sizing: border-box; }
        h1 { margin: 0 0 0.5rem; font-size: 1.5rem; text-align: center; }
        p.description { margin: 0 0 1.5rem; color: #475569; text-align: center; font-size: 0.95rem; }
        label { display: block; margin-top: 1.1rem; font-weight: 600; }
        input { width: 100%; padding: 0.8rem; margin-top: 0.5rem; border-radius: 10px; border: 1px solid #cbd5f5; background: #f8fafc; font-size: 1rem; box-sizing: border-box; }
        input:focus { outline: none; border-color: #2563eb; box-shadow: 0 0 0 3px rgba(37, 99, 235, 0.15); }
        button { margin-top: 1.5rem; width: 100%; padding: 0.85rem; border: none; border-radius: 10px; background: #2563eb; color: #ffffff; font-weight: 600; font-size: 1rem; cursor: pointer; }
        button:hover { background: #1d4ed8; }
        button.quiet { background: #e2e8f0; color: #0f172a; }
        .flash { padding: 0.75rem 1rem; border-radius: 8px; margin-bottom: 1rem; font-weight: 600; }
        .flash.success { background: #dcfce7; color: #166534; }
        .flash.error { background: #fee2e2; color: #b91c1c; }
        .aux-links { margin-top: 1.25rem; text-align: center; font-size: 0.9rem; }
        .aux-links a { color: #1d4ed8; text-decoration: none; margin: 0 0.4rem; }
        .app-footer { margin-top: 2rem; text-align: center; font-size: 0.85rem; color: #64748b; }
"#;

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(
        r#"<footer class="app-footer">© {year} OJT Practicum Tracker — internal use only</footer>"#,
        year = current_year
    )
}

/// Flash message shown on the login page, composed either from redirect
/// query codes or directly from a handler.
pub struct LoginFlash {
    message: Option<(String, &'static str)>,
}

impl LoginFlash {
    pub fn none() -> Self {
        Self { message: None }
    }

    pub fn error(message: &str) -> Self {
        Self {
            message: Some((message.to_string(), "error")),
        }
    }

    pub fn from_codes(status: Option<&str>, error: Option<&str>) -> Self {
        if let Some(status) = status {
            let message = match status {
                "logged_out" => "You have been logged out.",
                "activated" => "Account activated. Temporary password sent to your email.",
                "password_reset" => "Password reset successful. You can now sign in.",
                _ => "",
            };
            if !message.is_empty() {
                return Self {
                    message: Some((message.to_string(), "success")),
                };
            }
        }

        if let Some(error) = error {
            let message = match error {
                "login_required" => "Please log in to continue.",
                "not_authorized" => "You do not have access to that page.",
                _ => "Something went wrong. Please try again.",
            };
            return Self {
                message: Some((message.to_string(), "error")),
            };
        }

        Self::none()
    }

    fn to_html(&self) -> String {
        match &self.message {
            Some((text, kind)) => {
                format!(r#"<div class="flash {kind}">{}</div>"#, escape_html(text))
            }
            None => String::new(),
        }
    }
}

pub fn render_login_page(flash: LoginFlash) -> String {
    let flash_html = flash.to_html();
    let footer = render_footer();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>OJT Practicum Tracker</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>{AUTH_STYLES}</style>
</head>
<body>
    <main>
        <section class="panel">
            <h1>OJT Practicum Tracker</h1>
            <p class="description">Sign in with your CCA email.</p>
            {flash_html}
            <form method="post" action="/login">
                <label for="cca_email">CCA email</label>
                <input id="cca_email" name="cca_email" type="email" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" required>
                <button type="submit">Sign in</button>
            </form>
            <div class="aux-links">
                <a href="/activate">Activate account</a> ·
                <a href="/forgot-password">Forgot password</a>
            </div>
        </section>
        {footer}
    </main>
</body>
</html>"#
    )
}

#[derive(Clone, Copy, Eq, PartialEq)]
pub enum CodePageKind {
    Activation,
    Recovery,
}

/// State of the staged activation / recovery forms.
pub struct CodePageView<'a> {
    pub kind: CodePageKind,
    pub message: Option<(&'a str, &'a str)>,
    pub email: &'a str,
    pub show_code: bool,
    pub show_password: bool,
    pub cooldown_seconds: Option<i64>,
}

impl<'a> CodePageView<'a> {
    pub fn blank(kind: CodePageKind) -> Self {
        Self {
            kind,
            message: None,
            email: "",
            show_code: false,
            show_password: false,
            cooldown_seconds: None,
        }
    }
}

pub fn render_code_page(view: &CodePageView) -> String {
    let (title, description, action, email_field, code_field, code_label, submit_label) =
        match view.kind {
            CodePageKind::Activation => (
                "Activate Account",
                "Request an activation code, then enter it to receive a temporary password.",
                "/activate",
                "cca_email",
                "activation_code",
                "Activation code",
                "Activate account",
            ),
            CodePageKind::Recovery => (
                "Reset Password",
                "Request a reset code, verify it, then choose a new password.",
                "/forgot-password",
                "reset_email",
                "recovery_code",
                "Reset code",
                "Verify code",
            ),
        };

    let flash_html = match view.message {
        Some((text, kind)) => format!(r#"<div class="flash {kind}">{}</div>"#, escape_html(text)),
        None => String::new(),
    };

    let cooldown_html = match view.cooldown_seconds {
        Some(seconds) => format!(
            r#"<p class="description">You can resend the code in {seconds} seconds.</p>"#
        ),
        None => String::new(),
    };

    let email_value = escape_html(view.email);

    let stage_html = if view.show_password {
        r#"<label for="new_password">New password</label>
                <input id="new_password" type="password" name="new_password" required>
                <label for="confirm_password">Confirm password</label>
                <input id="confirm_password" type="password" name="confirm_password" required>
                <button type="submit" name="stage" value="reset">Reset password</button>"#
            .to_string()
    } else if view.show_code {
        format!(
            r#"<label for="{code_field}">{code_label}</label>
                <input id="{code_field}" name="{code_field}" inputmode="numeric" autocomplete="one-time-code">
                <button type="submit" name="stage" value="verify">{submit_label}</button>
                <button type="submit" name="stage" value="resend" class="quiet">Resend code</button>
                {cooldown_html}"#
        )
    } else {
        r#"<button type="submit" name="stage" value="send">Send code</button>"#.to_string()
    };

    let footer = render_footer();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title} — OJT Practicum Tracker</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>{AUTH_STYLES}</style>
</head>
<body>
    <main>
        <section class="panel">
            <h1>{title}</h1>
            <p class="description">{description}</p>
            {flash_html}
            <form method="post" action="{action}">
                <label for="{email_field}">CCA email</label>
                <input id="{email_field}" name="{email_field}" type="email" value="{email_value}" required>
                {stage_html}
            </form>
            <div class="aux-links"><a href="/">Back to sign in</a></div>
        </section>
        {footer}
    </main>
</body>
</html>"#
    )
}

pub fn render_change_password_page(email: &str, message: Option<&str>) -> String {
    let flash_html = match message {
        Some(text) => format!(r#"<div class="flash error">{}</div>"#, escape_html(text)),
        None => String::new(),
    };
    let email = escape_html(email);
    let footer = render_footer();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Change Password — OJT Practicum Tracker</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>{AUTH_STYLES}</style>
</head>
<body>
    <main>
        <section class="panel">
            <h1>Change Password</h1>
            <p class="description">Set a new password for {email}.</p>
            {flash_html}
            <form method="post" action="/change-password">
                <label for="new_password">New password</label>
                <input id="new_password" type="password" name="new_password" required>
                <label for="confirm_password">Confirm password</label>
                <input id="confirm_password" type="password" name="confirm_password" required>
                <button type="submit">Save password</button>
            </form>
        </section>
        {footer}
    </main>
</body>
</html>"#
    )
}

/// Compose a flash snippet for known staff-page status or error codes.
pub fn compose_flash_message(status: Option<&str>, error: Option<&str>) -> String {
    if let Some(status) = status {
        let message = match status {
            "updated" => "Student requirement updated.",
            "synced" => "Student details have been synced.",
            "assigned" => "Instructor assigned to section.",
            "assignment_removed" => "Assignment removed.",
            "student_added" => "Student account added.",
            "student_updated" => "Student account updated.",
            "instructor_added" => "Instructor account added.",
            "instructor_updated" => "Instructor account updated.",
            "profile_uploaded" => "Profile photo updated.",
            "profile_removed" => "Profile photo removed.",
            _ => "",
        };

        if !message.is_empty() {
            return format!(r#"<div class="flash success">{message}</div>"#);
        }
    }

    if let Some(error) = error {
        let message = match error {
            "not_authorized" => "You do not have access to that page.",
            "invalid_update" => "Invalid update request.",
            "invalid_date" => "Invalid date format.",
            "invalid_hours" => "Hours must be a valid number.",
            "negative_hours" => "Hours cannot be negative.",
            "missing_section" => "Please select a section.",
            "duplicate_student" => "Student account already exists (student number or email).",
            "duplicate_instructor" => "Instructor account already exists (email).",
            "not_found" => "Record not found.",
            "missing_fields" => "Please fill in all required fields.",
            "missing_file" => "Please choose a CSV file first.",
            "invalid_file_type" => "Invalid file type. Upload a .csv file.",
            "invalid_encoding" => "CSV must be UTF-8 encoded.",
            "missing_image" => "Please choose an image to upload.",
            "upload_failed" => "Upload failed. Please try again.",
            _ => "Something went wrong. Please try again.",
        };

        return format!(r#"<div class="flash error">{message}</div>"#);
    }

    String::new()
}

pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::Student => "Student",
        Role::Coordinator => "Practicum Coordinator",
        Role::Instructor => "Practicum Instructor",
    }
}

pub struct StaffPageLayout<'a> {
    pub meta_title: &'a str,
    pub heading: &'a str,
    pub account_name: &'a str,
    pub role: Role,
    pub active_path: &'a str,
    pub flash_html: Cow<'a, str>,
    pub body_html: Cow<'a, str>,
    pub body_scripts: Vec<Cow<'a, str>>,
}

const STAFF_NAV: [(&str, &str); 6] = [
    ("/staff", "Home"),
    ("/staff/manage-records", "Manage Records"),
    ("/staff/manage-accounts", "Manage Accounts"),
    ("/staff/handled-sections", "Handled Sections"),
    ("/staff/company-checklist", "Company Checklist"),
    ("/staff/profile", "Profile"),
];

pub fn render_staff_page(layout: StaffPageLayout<'_>) -> String {
    let StaffPageLayout {
        meta_title,
        heading,
        account_name,
        role,
        active_path,
        flash_html,
        body_html,
        body_scripts,
    } = layout;

    let nav_html = STAFF_NAV
        .iter()
        .map(|(path, label)| {
            let class = if *path == active_path { " class=\"active\"" } else { "" };
            format!(r#"<a href="{path}"{class}>{label}</a>"#)
        })
        .collect::<Vec<_>>()
        .join("\n            ");

    let scripts = body_scripts
        .into_iter()
        .map(|script| script.into_owned())
        .collect::<Vec<_>>()
        .join("\n");

    let who = format!(
        "{} · {}",
        escape_html(account_name),
        role_label(role)
    );
    let footer = render_footer();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{meta_title} — OJT Practicum Tracker</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>{BASE_STYLES}</style>
</head>
<body>
    <header>
        <div class="header-bar">
            <h1>{heading}</h1>
            <div style="display:flex; gap:0.75rem; align-items:center;">
                <span class="who">{who}</span>
                <form method="post" action="/logout" style="margin:0;">
                    <button type="submit" class="quiet">Sign out</button>
                </form>
            </div>
        </div>
        <nav class="app-nav">
            {nav_html}
        </nav>
    </header>
    <main>
        {flash_html}
        {body_html}
        {footer}
    </main>
{scripts}
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_covers_special_characters() {
        assert_eq!(
            escape_html(r#"<b a="1">&'"#),
            "&lt;b a=&quot;1&quot;&gt;&amp;&#39;"
        );
    }

    #[test]
    fn login_flash_prefers_status_over_error() {
        let flash = LoginFlash::from_codes(Some("logged_out"), Some("login_required"));
        assert!(flash.to_html().contains("logged out"));
        assert!(flash.to_html().contains("success"));
    }

    #[test]
    fn unknown_error_code_falls_back_to_generic_text() {
        let html = compose_flash_message(None, Some("mystery"));
        assert!(html.contains("Something went wrong"));
        assert!(html.contains("error"));
    }

    #[test]
    fn unknown_status_code_renders_nothing() {
        assert!(compose_flash_message(Some("mystery"), None).is_empty());
    }
}
