//! Read-only reporting: the staff home dashboard, the handled-sections
//! list, and the per-section detail feed (requirements + DTR + weekly
//! journal matrix). Section detail is only served to staff actually
//! assigned to the section.

use std::borrow::Cow;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::web::{
    ApiMessage, AppState, escape_html, json_error,
    auth::{Account, Role, compose_full_name},
    staff::{journal, records::REQUIREMENT_FIELDS, require_staff_json, require_staff_user},
    templates::{self, StaffPageLayout},
};

/// Boolean AND over the sixteen requirement columns, evaluated in SQL.
fn requirements_done_sql() -> String {
    REQUIREMENT_FIELDS
        .iter()
        .map(|(column, _)| format!("sr.{column}"))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn assignment_column(role: Role) -> &'static str {
    match role {
        Role::Coordinator => "coordinator_id",
        _ => "instructor_id",
    }
}

#[derive(sqlx::FromRow)]
struct AssignedSectionRow {
    id: Uuid,
    section: String,
    school_year: String,
}

async fn fetch_assigned_sections(
    pool: &PgPool,
    account: &Account,
) -> sqlx::Result<Vec<AssignedSectionRow>> {
    let sql = format!(
        "SELECT sl.id, sl.section, sl.school_year
         FROM section_instructors si
         JOIN section_list sl ON sl.id = si.section_id
         WHERE si.{} = $1
         ORDER BY sl.school_year DESC, sl.section ASC",
        assignment_column(account.role)
    );
    sqlx::query_as::<_, AssignedSectionRow>(&sql)
        .bind(account.id)
        .fetch_all(pool)
        .await
}

#[derive(sqlx::FromRow)]
struct RosterRow {
    student_no: String,
    first_name: String,
    second_name: Option<String>,
    middle_initial: Option<String>,
    last_name: String,
    section: String,
    school_year: Option<String>,
    total_hours: i64,
    requirements_done: bool,
}

struct InstructorSummary {
    total_sections: usize,
    total_students: usize,
    completed_requirements: usize,
    total_hours: i64,
}

fn summarize(sections: usize, roster: &[RosterRow]) -> InstructorSummary {
    InstructorSummary {
        total_sections: sections,
        total_students: roster.len(),
        completed_requirements: roster.iter().filter(|row| row.requirements_done).count(),
        total_hours: roster.iter().map(|row| row.total_hours).sum(),
    }
}

#[derive(Default, Deserialize)]
pub struct HomeQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub async fn staff_home(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<HomeQuery>,
) -> Result<Html<String>, Redirect> {
    let account = require_staff_user(&state, &jar).await?;
    let pool = state.pool();

    let body_html = match account.role {
        Role::Instructor => {
            let sections = fetch_assigned_sections(&pool, &account).await.map_err(|err| {
                error!(?err, "failed to load assigned sections");
                Redirect::to("/?error=unknown")
            })?;

            let sql = format!(
                "SELECT
                    sr.student_no,
                    sr.first_name,
                    sr.second_name,
                    sr.middle_initial,
                    sr.last_name,
                    sr.section,
                    sr.school_year,
                    (COALESCE(dtr.january_hours, 0) + COALESCE(dtr.february_hours, 0)
                     + COALESCE(dtr.march_hours, 0) + COALESCE(dtr.april_hours, 0)
                     + COALESCE(dtr.may_hours, 0) + COALESCE(dtr.june_hours, 0))::bigint AS total_hours,
                    ({requirements_done}) AS requirements_done
                 FROM section_instructors si
                 JOIN section_list sl ON sl.id = si.section_id
                 JOIN student_requirements sr
                   ON sr.section = sl.section AND sr.school_year = sl.school_year
                 LEFT JOIN attendance_sheet_dtr dtr ON dtr.student_id = sr.student_id
                 WHERE si.instructor_id = $1
                 ORDER BY sr.last_name, sr.first_name",
                requirements_done = requirements_done_sql()
            );
            let roster = sqlx::query_as::<_, RosterRow>(&sql)
                .bind(account.id)
                .fetch_all(&pool)
                .await
                .map_err(|err| {
                    error!(?err, "failed to load instructor roster");
                    Redirect::to("/?error=unknown")
                })?;

            let summary = summarize(sections.len(), &roster);
            render_instructor_home(&sections, &roster, &summary)
        }
        _ => render_coordinator_home(),
    };

    let flash_html =
        templates::compose_flash_message(query.status.as_deref(), query.error.as_deref());
    let name = account.full_name();
    Ok(Html(templates::render_staff_page(StaffPageLayout {
        meta_title: "Staff Home",
        heading: "Staff Home",
        account_name: &name,
        role: account.role,
        active_path: "/staff",
        flash_html: Cow::Owned(flash_html),
        body_html: Cow::Owned(body_html),
        body_scripts: Vec::new(),
    })))
}

fn render_instructor_home(
    sections: &[AssignedSectionRow],
    roster: &[RosterRow],
    summary: &InstructorSummary,
) -> String {
    let section_items = if sections.is_empty() {
        r#"<p class="note">No sections assigned yet.</p>"#.to_string()
    } else {
        let items = sections
            .iter()
            .map(|row| {
                format!(
                    "<li>{} ({})</li>",
                    escape_html(&row.section),
                    escape_html(&row.school_year)
                )
            })
            .collect::<Vec<_>>()
            .join("");
        format!("<ul>{items}</ul>")
    };

    let roster_rows = roster
        .iter()
        .map(|row| {
            let name = compose_full_name(
                &row.first_name,
                row.second_name.as_deref(),
                row.middle_initial.as_deref(),
                &row.last_name,
            );
            format!(
                "<tr><td>{student_no}</td><td>{name}</td><td>{section}</td><td>{school_year}</td><td>{hours}</td><td>{done}</td></tr>",
                student_no = escape_html(&row.student_no),
                name = escape_html(&name),
                section = escape_html(&row.section),
                school_year = escape_html(row.school_year.as_deref().unwrap_or("—")),
                hours = row.total_hours,
                done = if row.requirements_done { "Complete" } else { "In progress" },
            )
        })
        .collect::<Vec<_>>()
        .join("");

    format!(
        r#"<section class="panel">
            <h2>Overview</h2>
            <div class="summary-cards">
                <div class="card"><div class="value">{sections}</div><div>Assigned sections</div></div>
                <div class="card"><div class="value">{students}</div><div>Students</div></div>
                <div class="card"><div class="value">{completed}</div><div>Requirements complete</div></div>
                <div class="card"><div class="value">{hours}</div><div>Total hours logged</div></div>
            </div>
        </section>
        <section class="panel">
            <h2>My Sections</h2>
            {section_items}
        </section>
        <section class="panel" style="overflow-x:auto;">
            <h2>My Students</h2>
            <table>
                <thead><tr><th>Student No.</th><th>Name</th><th>Section</th><th>School Year</th><th>Total Hours</th><th>Requirements</th></tr></thead>
                <tbody>{roster_rows}</tbody>
            </table>
        </section>"#,
        sections = summary.total_sections,
        students = summary.total_students,
        completed = summary.completed_requirements,
        hours = summary.total_hours,
    )
}

fn render_coordinator_home() -> String {
    r#"<section class="panel">
        <h2>Welcome</h2>
        <p>Use <a href="/staff/manage-records">Manage Records</a> to keep requirement checklists and
        hour logs current, <a href="/staff/manage-accounts">Manage Accounts</a> to enroll students and
        instructors, and <a href="/staff/handled-sections">Handled Sections</a> for the sections
        assigned to you.</p>
    </section>"#
        .to_string()
}

pub async fn handled_sections(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Html<String>, Redirect> {
    let account = require_staff_user(&state, &jar).await?;

    let sections = fetch_assigned_sections(state.pool_ref(), &account)
        .await
        .map_err(|err| {
            error!(?err, "failed to load handled sections");
            Redirect::to("/staff?error=unknown")
        })?;

    let rows = if sections.is_empty() {
        r#"<tr><td colspan="3" class="note">No sections assigned to you.</td></tr>"#.to_string()
    } else {
        sections
            .iter()
            .map(|row| {
                format!(
                    r#"<tr>
                        <td>{section}</td><td>{school_year}</td>
                        <td><button type="button" data-section-details="{id}">View details</button></td>
                    </tr>"#,
                    section = escape_html(&row.section),
                    school_year = escape_html(&row.school_year),
                    id = row.id,
                )
            })
            .collect::<Vec<_>>()
            .join("")
    };

    let body_html = format!(
        r#"<section class="panel">
            <h2>Handled Sections</h2>
            <table>
                <thead><tr><th>Section</th><th>School Year</th><th></th></tr></thead>
                <tbody>{rows}</tbody>
            </table>
        </section>
        <section class="panel" id="section-detail" style="display:none; overflow-x:auto;">
            <h2 id="detail-heading">Section Detail</h2>
            <div id="detail-body"></div>
        </section>"#
    );

    let name = account.full_name();
    Ok(Html(templates::render_staff_page(StaffPageLayout {
        meta_title: "Handled Sections",
        heading: "Handled Sections",
        account_name: &name,
        role: account.role,
        active_path: "/staff/handled-sections",
        flash_html: Cow::Borrowed(""),
        body_html: Cow::Owned(body_html),
        body_scripts: vec![Cow::Borrowed(SECTIONS_SCRIPT)],
    })))
}

/// Preferred calendar year for journal display: the end year of a
/// "2025 - 2026" school-year label, falling back to the start year.
fn school_year_target(school_year: &str) -> Option<i32> {
    let mut parts = school_year.split('-').map(str::trim);
    let start: Option<i32> = parts.next().and_then(|part| part.parse().ok());
    let end: Option<i32> = parts.next().and_then(|part| part.parse().ok());
    end.or(start)
}

#[derive(sqlx::FromRow)]
struct SectionDetailRow {
    student_id: Uuid,
    student_no: String,
    first_name: String,
    second_name: Option<String>,
    middle_initial: Option<String>,
    last_name: String,
    program: String,
    practicum_application: bool,
    letter_of_intent: bool,
    endorsement_letter: bool,
    practicum_parental_consent: bool,
    acceptance_form: bool,
    reply_form: bool,
    practicum_training_agreement: bool,
    attendance_sheet: bool,
    weekly_journal: bool,
    transmittal_form: bool,
    evaluation_form: bool,
    outreach_program_design: bool,
    outreach_post_activity_report: bool,
    ojt_log_sheet: bool,
    requirements_checklist: bool,
    cca_hymn: bool,
    january_hours: i32,
    february_hours: i32,
    march_hours: i32,
    april_hours: i32,
    may_hours: i32,
    june_hours: i32,
}

pub async fn handled_section_details(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(section_id): Path<Uuid>,
) -> Result<Json<Value>, (StatusCode, Json<ApiMessage>)> {
    let account = require_staff_json(&state, &jar).await?;
    let pool = state.pool();

    // Authorization precedes any data assembly: the caller must hold the
    // assignment for this very section.
    let sql = format!(
        "SELECT sl.section, sl.school_year
         FROM section_instructors si
         JOIN section_list sl ON sl.id = si.section_id
         WHERE si.{} = $1 AND sl.id = $2",
        assignment_column(account.role)
    );
    let assigned: Option<(String, String)> = sqlx::query_as(&sql)
        .bind(account.id)
        .bind(section_id)
        .fetch_optional(&pool)
        .await
        .map_err(|err| {
            error!(?err, "failed to check section assignment");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
        })?;

    let Some((section, school_year)) = assigned else {
        return Err(json_error(StatusCode::NOT_FOUND, "Section not found."));
    };

    let rows = sqlx::query_as::<_, SectionDetailRow>(
        "SELECT
            sr.student_id,
            sr.student_no,
            sr.first_name,
            sr.second_name,
            sr.middle_initial,
            sr.last_name,
            sr.program,
            sr.practicum_application,
            sr.letter_of_intent,
            sr.endorsement_letter,
            sr.practicum_parental_consent,
            sr.acceptance_form,
            sr.reply_form,
            sr.practicum_training_agreement,
            sr.attendance_sheet,
            sr.weekly_journal,
            sr.transmittal_form,
            sr.evaluation_form,
            sr.outreach_program_design,
            sr.outreach_post_activity_report,
            sr.ojt_log_sheet,
            sr.requirements_checklist,
            sr.cca_hymn,
            COALESCE(dtr.january_hours, 0) AS january_hours,
            COALESCE(dtr.february_hours, 0) AS february_hours,
            COALESCE(dtr.march_hours, 0) AS march_hours,
            COALESCE(dtr.april_hours, 0) AS april_hours,
            COALESCE(dtr.may_hours, 0) AS may_hours,
            COALESCE(dtr.june_hours, 0) AS june_hours
         FROM student_requirements sr
         LEFT JOIN attendance_sheet_dtr dtr ON dtr.student_id = sr.student_id
         WHERE sr.section = $1 AND sr.school_year = $2
         ORDER BY sr.last_name, sr.first_name",
    )
    .bind(&section)
    .bind(&school_year)
    .fetch_all(&pool)
    .await
    .map_err(|err| {
        error!(?err, "failed to load section detail rows");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
    })?;

    let mut students = Vec::new();
    let mut requirements = Vec::new();
    let mut dtr = Vec::new();
    let mut roster = Vec::new();

    for row in &rows {
        let name = compose_full_name(
            &row.first_name,
            row.second_name.as_deref(),
            row.middle_initial.as_deref(),
            &row.last_name,
        );
        let total_hours = row.january_hours
            + row.february_hours
            + row.march_hours
            + row.april_hours
            + row.may_hours
            + row.june_hours;

        students.push(json!({
            "student_id": row.student_id,
            "student_no": row.student_no,
            "name": name,
            "program": row.program,
        }));
        requirements.push(json!({
            "student_no": row.student_no,
            "name": name,
            "practicum_application": row.practicum_application,
            "letter_of_intent": row.letter_of_intent,
            "endorsement_letter": row.endorsement_letter,
            "practicum_parental_consent": row.practicum_parental_consent,
            "acceptance_form": row.acceptance_form,
            "reply_form": row.reply_form,
            "practicum_training_agreement": row.practicum_training_agreement,
            "attendance_sheet": row.attendance_sheet,
            "weekly_journal": row.weekly_journal,
            "transmittal_form": row.transmittal_form,
            "evaluation_form": row.evaluation_form,
            "outreach_program_design": row.outreach_program_design,
            "outreach_post_activity_report": row.outreach_post_activity_report,
            "ojt_log_sheet": row.ojt_log_sheet,
            "requirements_checklist": row.requirements_checklist,
            "cca_hymn": row.cca_hymn,
        }));
        dtr.push(json!({
            "student_no": row.student_no,
            "name": name,
            "january_hours": row.january_hours,
            "february_hours": row.february_hours,
            "march_hours": row.march_hours,
            "april_hours": row.april_hours,
            "may_hours": row.may_hours,
            "june_hours": row.june_hours,
            "total_hours": total_hours,
        }));
        roster.push(journal::RosterStudent {
            student_id: row.student_id,
            student_no: row.student_no.clone(),
            name,
        });
    }

    let matrix = match school_year_target(&school_year) {
        Some(target_year) => {
            let entries = sqlx::query_as::<_, journal::JournalEntryRow>(
                "SELECT student_id, week_no, due_date, submitted_at, status, status_note
                 FROM weekly_journal
                 WHERE section = $1 AND year = $2
                 ORDER BY due_date ASC, week_no ASC",
            )
            .bind(&section)
            .bind(target_year)
            .fetch_all(&pool)
            .await
            .map_err(|err| {
                error!(?err, "failed to load weekly journal entries");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
            })?;
            journal::build_journal_matrix(&roster, &entries)
        }
        None => journal::build_journal_matrix(&roster, &[]),
    };

    Ok(Json(json!({
        "ok": true,
        "data": {
            "section": section,
            "school_year": school_year,
            "students": students,
            "requirements": requirements,
            "dtr": dtr,
            "weekly_journal": matrix,
        },
    })))
}

const SECTIONS_SCRIPT: &str = r#"<script>
(function () {
    const panel = document.getElementById("section-detail");
    const heading = document.getElementById("detail-heading");
    const body = document.getElementById("detail-body");

    const REQUIREMENT_LABELS = [
        ["practicum_application", "Application"],
        ["letter_of_intent", "Intent"],
        ["endorsement_letter", "Endorsement"],
        ["practicum_parental_consent", "Consent"],
        ["acceptance_form", "Acceptance"],
        ["reply_form", "Reply"],
        ["practicum_training_agreement", "Agreement"],
        ["attendance_sheet", "Attendance"],
        ["weekly_journal", "Journal"],
        ["transmittal_form", "Transmittal"],
        ["evaluation_form", "Evaluation"],
        ["outreach_program_design", "Outreach Design"],
        ["outreach_post_activity_report", "Outreach Report"],
        ["ojt_log_sheet", "Log Sheet"],
        ["requirements_checklist", "Checklist"],
        ["cca_hymn", "Hymn"],
    ];

    function mark(flag) { return flag ? "✓" : "—"; }

    function renderDetail(data) {
        heading.textContent = "Section " + data.section + " (" + data.school_year + ")";

        let html = "<h3>Requirements</h3><table><thead><tr><th>Student</th>";
        REQUIREMENT_LABELS.forEach(([, label]) => { html += "<th>" + label + "</th>"; });
        html += "</tr></thead><tbody>";
        data.requirements.forEach((row) => {
            html += "<tr><td>" + row.name + "</td>";
            REQUIREMENT_LABELS.forEach(([key]) => { html += '<td class="check-cell">' + mark(row[key]) + "</td>"; });
            html += "</tr>";
        });
        html += "</tbody></table>";

        html += "<h3>Hours (DTR)</h3><table><thead><tr><th>Student</th><th>Jan</th><th>Feb</th><th>Mar</th><th>Apr</th><th>May</th><th>Jun</th><th>Total</th></tr></thead><tbody>";
        data.dtr.forEach((row) => {
            html += "<tr><td>" + row.name + "</td><td>" + row.january_hours + "</td><td>" + row.february_hours +
                "</td><td>" + row.march_hours + "</td><td>" + row.april_hours + "</td><td>" + row.may_hours +
                "</td><td>" + row.june_hours + "</td><td>" + row.total_hours + "</td></tr>";
        });
        html += "</tbody></table>";

        const matrix = data.weekly_journal;
        html += "<h3>Weekly Journal</h3>";
        if (!matrix.columns.length) {
            html += '<p class="note">No journal weeks generated for this section yet.</p>';
        } else {
            html += "<table><thead><tr><th>Student</th>";
            matrix.columns.forEach((column) => { html += "<th>" + column.label + "</th>"; });
            html += "</tr></thead><tbody>";
            matrix.rows.forEach((row) => {
                html += "<tr><td>" + row.name + "</td>";
                row.cells.forEach((cell) => {
                    if (!cell) { html += '<td class="check-cell">·</td>'; return; }
                    let text = cell.status;
                    if (cell.note) { text += " (" + cell.note + ")"; }
                    html += '<td class="check-cell">' + text + "</td>";
                });
                html += "</tr>";
            });
            html += "</tbody></table>";
        }

        body.innerHTML = html;
        panel.style.display = "";
        panel.scrollIntoView({ behavior: "smooth" });
    }

    document.querySelectorAll("[data-section-details]").forEach((button) => {
        button.addEventListener("click", () => {
            fetch("/staff/handled-sections/" + button.dataset.sectionDetails + "/details", {
                headers: { "X-Requested-With": "XMLHttpRequest" },
            })
                .then((resp) => resp.json())
                .then((data) => {
                    if (!data.ok) { alert(data.message || "Could not load section details."); return; }
                    renderDetail(data.data);
                })
                .catch(() => alert("Could not load section details."));
        });
    });
})();
</script>"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_row(total_hours: i64, requirements_done: bool) -> RosterRow {
        RosterRow {
            student_no: "22-0001".to_string(),
            first_name: "Alice".to_string(),
            second_name: None,
            middle_initial: None,
            last_name: "Reyes".to_string(),
            section: "CS-404".to_string(),
            school_year: Some("2025 - 2026".to_string()),
            total_hours,
            requirements_done,
        }
    }

    #[test]
    fn summary_counts_sections_students_hours_and_completion() {
        let roster = vec![roster_row(120, true), roster_row(80, false), roster_row(0, true)];
        let summary = summarize(2, &roster);
        assert_eq!(summary.total_sections, 2);
        assert_eq!(summary.total_students, 3);
        assert_eq!(summary.completed_requirements, 2);
        assert_eq!(summary.total_hours, 200);
    }

    #[test]
    fn school_year_prefers_the_end_year() {
        assert_eq!(school_year_target("2025 - 2026"), Some(2026));
        assert_eq!(school_year_target("2025-2026"), Some(2026));
        assert_eq!(school_year_target("2026"), Some(2026));
        assert_eq!(school_year_target("TBD"), None);
        assert_eq!(school_year_target(""), None);
    }

    #[test]
    fn requirements_done_sql_covers_all_sixteen_columns() {
        let sql = requirements_done_sql();
        assert_eq!(sql.matches(" AND ").count(), 15);
        assert!(sql.contains("sr.practicum_application"));
        assert!(sql.contains("sr.cca_hymn"));
    }
}
