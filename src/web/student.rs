use axum::{
    extract::State,
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::web::{
    AppState, escape_html,
    auth::{self, Role},
    templates,
};

#[derive(sqlx::FromRow)]
struct StudentDetailRow {
    student_no: String,
    program: String,
    section: String,
    school_year: Option<String>,
}

pub async fn student_home(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Html<String>, Redirect> {
    let Some(account) = auth::current_account(&state, &jar).await else {
        return Err(Redirect::to("/?error=login_required"));
    };
    if account.role != Role::Student {
        return Err(Redirect::to("/?error=not_authorized"));
    }

    let detail = match fetch_student_detail(state.pool_ref(), account.id).await {
        Ok(Some(detail)) => detail,
        Ok(None) => return Err(Redirect::to("/?error=login_required")),
        Err(err) => {
            error!(?err, "failed to load student detail");
            return Err(Redirect::to("/?error=unknown"));
        }
    };

    let body = format!(
        r#"<section class="panel">
            <h2>My Enrollment</h2>
            <table>
                <tr><th>Student number</th><td>{student_no}</td></tr>
                <tr><th>Program</th><td>{program}</td></tr>
                <tr><th>Section</th><td>{section}</td></tr>
                <tr><th>School year</th><td>{school_year}</td></tr>
                <tr><th>CCA email</th><td>{email}</td></tr>
            </table>
            <p class="note">Requirement and journal records are maintained by your practicum staff.</p>
        </section>"#,
        student_no = escape_html(&detail.student_no),
        program = escape_html(&detail.program),
        section = escape_html(&detail.section),
        school_year = escape_html(detail.school_year.as_deref().unwrap_or("—")),
        email = escape_html(&account.cca_email),
    );

    let name = account.full_name();
    Ok(Html(render_student_page(&name, &body)))
}

async fn fetch_student_detail(
    pool: &PgPool,
    student_id: Uuid,
) -> sqlx::Result<Option<StudentDetailRow>> {
    sqlx::query_as::<_, StudentDetailRow>(
        "SELECT student_no, program, section, school_year FROM students WHERE id = $1",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

fn render_student_page(name: &str, body_html: &str) -> String {
    let footer = templates::render_footer();
    let name = escape_html(name);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Student Home — OJT Practicum Tracker</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
        body {{ font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }}
        header {{ background: #ffffff; padding: 1.5rem; border-bottom: 1px solid #e2e8f0; display: flex; justify-content: space-between; align-items: center; }}
        header h1 {{ margin: 0; font-size: 1.4rem; }}
        main {{ padding: 1.5rem; max-width: 720px; margin: 0 auto; }}
        .panel {{ background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; }}
        table {{ width: 100%; border-collapse: collapse; }}
        th, td {{ padding: 0.55rem 0.7rem; border-bottom: 1px solid #e2e8f0; text-align: left; }}
        button {{ padding: 0.6rem 1.1rem; border: none; border-radius: 8px; background: #e2e8f0; color: #0f172a; font-weight: 600; cursor: pointer; }}
        .note {{ color: #475569; font-size: 0.9rem; }}
        .app-footer {{ margin-top: 3rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }}
    </style>
</head>
<body>
    <header>
        <h1>Welcome, {name}</h1>
        <form method="post" action="/logout" style="margin:0;">
            <button type="submit">Sign out</button>
        </form>
    </header>
    <main>
        {body_html}
        {footer}
    </main>
</body>
</html>"#
    )
}
