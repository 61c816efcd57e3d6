//! Requirement ledger: the manage-records page, field-level updates, and the
//! student/DTR/journal sync action.

use std::borrow::Cow;

use axum::{
    Json,
    extract::{Form, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::web::{
    ApiMessage, AppState, escape_html, is_ajax, json_error,
    staff::{journal, require_staff_json, require_staff_user, sections},
    templates::{self, StaffPageLayout},
};

/// The sixteen requirement checkboxes: column name and display label.
pub(crate) const REQUIREMENT_FIELDS: [(&str, &str); 16] = [
    ("practicum_application", "Practicum Application"),
    ("letter_of_intent", "Letter of Intent"),
    ("endorsement_letter", "Endorsement Letter"),
    ("practicum_parental_consent", "Parental Consent"),
    ("acceptance_form", "Acceptance Form"),
    ("reply_form", "Reply Form"),
    ("practicum_training_agreement", "Training Agreement"),
    ("attendance_sheet", "Attendance Sheet"),
    ("weekly_journal", "Weekly Journal"),
    ("transmittal_form", "Transmittal Form"),
    ("evaluation_form", "Evaluation Form"),
    ("outreach_program_design", "Outreach Program Design"),
    ("outreach_post_activity_report", "Outreach Post-Activity Report"),
    ("ojt_log_sheet", "OJT Log Sheet"),
    ("requirements_checklist", "Requirements Checklist"),
    ("cca_hymn", "CCA Hymn"),
];

/// Monthly hour fields: form name, DTR column, display label.
pub(crate) const MONTH_HOUR_FIELDS: [(&str, &str, &str); 6] = [
    ("dtr_january_hours", "january_hours", "Jan"),
    ("dtr_february_hours", "february_hours", "Feb"),
    ("dtr_march_hours", "march_hours", "Mar"),
    ("dtr_april_hours", "april_hours", "Apr"),
    ("dtr_may_hours", "may_hours", "May"),
    ("dtr_june_hours", "june_hours", "Jun"),
];

/// Classified target of a field-level update. Carries the canonical static
/// column name so user input never reaches the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateField {
    Requirement(&'static str),
    StartOfOjt,
    MonthHours(&'static str),
}

impl UpdateField {
    fn parse(name: &str) -> Option<Self> {
        if let Some((column, _)) = REQUIREMENT_FIELDS
            .iter()
            .copied()
            .find(|(column, _)| *column == name)
        {
            return Some(UpdateField::Requirement(column));
        }
        if name == "start_of_ojt" {
            return Some(UpdateField::StartOfOjt);
        }
        MONTH_HOUR_FIELDS
            .iter()
            .copied()
            .find(|(form_name, _, _)| *form_name == name)
            .map(|(_, column, _)| UpdateField::MonthHours(column))
    }
}

/// Boolean updates only accept the literal strings "true" and "false".
fn parse_bool_literal(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[derive(Default, Deserialize)]
pub struct RecordsQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub school_year: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(sqlx::FromRow)]
struct RequirementRecordRow {
    student_id: Uuid,
    student_no: String,
    last_name: String,
    first_name: String,
    middle_initial: Option<String>,
    program: String,
    section: String,
    school_year: Option<String>,
    start_of_ojt: Option<NaiveDate>,
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
    dtr_january_hours: i32,
    dtr_february_hours: i32,
    dtr_march_hours: i32,
    dtr_april_hours: i32,
    dtr_may_hours: i32,
    dtr_june_hours: i32,
}

impl RequirementRecordRow {
    fn requirement_value(&self, column: &str) -> bool {
        match column {
            "practicum_application" => self.practicum_application,
            "letter_of_intent" => self.letter_of_intent,
            "endorsement_letter" => self.endorsement_letter,
            "practicum_parental_consent" => self.practicum_parental_consent,
            "acceptance_form" => self.acceptance_form,
            "reply_form" => self.reply_form,
            "practicum_training_agreement" => self.practicum_training_agreement,
            "attendance_sheet" => self.attendance_sheet,
            "weekly_journal" => self.weekly_journal,
            "transmittal_form" => self.transmittal_form,
            "evaluation_form" => self.evaluation_form,
            "outreach_program_design" => self.outreach_program_design,
            "outreach_post_activity_report" => self.outreach_post_activity_report,
            "ojt_log_sheet" => self.ojt_log_sheet,
            "requirements_checklist" => self.requirements_checklist,
            "cca_hymn" => self.cca_hymn,
            _ => false,
        }
    }

    fn hour_value(&self, form_name: &str) -> i32 {
        match form_name {
            "dtr_january_hours" => self.dtr_january_hours,
            "dtr_february_hours" => self.dtr_february_hours,
            "dtr_march_hours" => self.dtr_march_hours,
            "dtr_april_hours" => self.dtr_april_hours,
            "dtr_may_hours" => self.dtr_may_hours,
            "dtr_june_hours" => self.dtr_june_hours,
            _ => 0,
        }
    }
}

async fn fetch_requirement_records(
    pool: &PgPool,
    query: &RecordsQuery,
) -> sqlx::Result<Vec<RequirementRecordRow>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<String> = Vec::new();

    if let Some(q) = query.q.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        args.push(format!("%{q}%"));
        let n = args.len();
        clauses.push(format!(
            "(sr.last_name ILIKE ${n} OR sr.first_name ILIKE ${n} OR sr.student_no ILIKE ${n})"
        ));
    }
    if let Some(program) = query
        .program
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        args.push(format!("%{program}%"));
        let n = args.len();
        clauses.push(format!("(sr.program ILIKE ${n} OR sr.section ILIKE ${n})"));
    }
    if let Some(year) = query
        .school_year
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        args.push(year.to_string());
        let n = args.len();
        clauses.push(format!("sr.school_year = ${n}"));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let sql = format!(
        "SELECT
            sr.student_id,
            sr.student_no,
            sr.last_name,
            sr.first_name,
            sr.middle_initial,
            sr.program,
            sr.section,
            sr.school_year,
            sr.start_of_ojt,
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
            COALESCE(dtr.january_hours, 0) AS dtr_january_hours,
            COALESCE(dtr.february_hours, 0) AS dtr_february_hours,
            COALESCE(dtr.march_hours, 0) AS dtr_march_hours,
            COALESCE(dtr.april_hours, 0) AS dtr_april_hours,
            COALESCE(dtr.may_hours, 0) AS dtr_may_hours,
            COALESCE(dtr.june_hours, 0) AS dtr_june_hours
        FROM student_requirements sr
        LEFT JOIN attendance_sheet_dtr dtr ON dtr.student_id = sr.student_id
        {where_sql}
        ORDER BY sr.last_name, sr.first_name"
    );

    let mut query = sqlx::query_as::<_, RequirementRecordRow>(&sql);
    for arg in &args {
        query = query.bind(arg);
    }
    query.fetch_all(pool).await
}

/// Insert missing requirement rows and refresh the denormalized identity
/// columns; checkbox state is never touched.
pub(crate) async fn sync_requirement_rows(pool: &PgPool) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO student_requirements
            (student_id, student_no, last_name, first_name, second_name, middle_initial, program, section, school_year)
         SELECT id, student_no, last_name, first_name, second_name, middle_initial, program, section, school_year
         FROM students
         ON CONFLICT (student_id) DO UPDATE SET
            student_no = EXCLUDED.student_no,
            last_name = EXCLUDED.last_name,
            first_name = EXCLUDED.first_name,
            second_name = EXCLUDED.second_name,
            middle_initial = EXCLUDED.middle_initial,
            program = EXCLUDED.program,
            section = EXCLUDED.section,
            school_year = EXCLUDED.school_year",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn sync_dtr_rows(pool: &PgPool) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO attendance_sheet_dtr (student_id)
         SELECT id FROM students
         ON CONFLICT (student_id) DO NOTHING",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn manage_records(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<RecordsQuery>,
) -> Result<axum::response::Html<String>, Redirect> {
    let account = require_staff_user(&state, &jar).await?;
    let pool = state.pool();

    // New students may have arrived since the last visit; keep the ledger
    // and the section registry in step before rendering.
    if let Err(err) = sections::sync_section_list(&pool).await {
        error!(?err, "failed to refresh section list");
    }

    let records = match fetch_requirement_records(&pool, &query).await {
        Ok(records) => records,
        Err(err) => {
            error!(?err, "failed to load requirement records");
            return Err(Redirect::to("/staff?error=unknown"));
        }
    };

    let assignments = match sections::fetch_section_assignments(&pool).await {
        Ok(assignments) => assignments,
        Err(err) => {
            error!(?err, "failed to load section assignments");
            return Err(Redirect::to("/staff?error=unknown"));
        }
    };

    let staff_options = match sections::fetch_assignable_staff(&pool).await {
        Ok(options) => options,
        Err(err) => {
            error!(?err, "failed to load staff options");
            return Err(Redirect::to("/staff?error=unknown"));
        }
    };

    let flash_html =
        templates::compose_flash_message(query.status.as_deref(), query.error.as_deref());
    let body_html = render_records_body(&query, &records, &assignments, &staff_options);

    let name = account.full_name();
    Ok(axum::response::Html(templates::render_staff_page(
        StaffPageLayout {
            meta_title: "Manage Records",
            heading: "Manage Records",
            account_name: &name,
            role: account.role,
            active_path: "/staff/manage-records",
            flash_html: Cow::Owned(flash_html),
            body_html: Cow::Owned(body_html),
            body_scripts: vec![Cow::Borrowed(RECORDS_SCRIPT)],
        },
    )))
}

#[derive(Deserialize)]
pub struct UpdateFieldForm {
    pub student_id: String,
    pub field: String,
    #[serde(default)]
    pub value: Option<String>,
}

pub async fn update_student_requirement(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Form(form): Form<UpdateFieldForm>,
) -> Response {
    let ajax = is_ajax(&headers);
    if let Err(rejection) = require_staff_json(&state, &jar).await {
        if ajax {
            return rejection.into_response();
        }
        return Redirect::to("/?error=login_required").into_response();
    }

    let Ok(student_id) = Uuid::parse_str(form.student_id.trim()) else {
        return update_error(ajax, StatusCode::BAD_REQUEST, "invalid_update", "Invalid update request.");
    };
    let Some(field) = UpdateField::parse(form.field.trim()) else {
        return update_error(ajax, StatusCode::BAD_REQUEST, "invalid_update", "Invalid update request.");
    };

    let value = form.value.as_deref().unwrap_or("");
    let pool = state.pool();

    match field {
        UpdateField::Requirement(column) => {
            let Some(flag) = parse_bool_literal(value) else {
                return update_error(
                    ajax,
                    StatusCode::BAD_REQUEST,
                    "invalid_update",
                    "Invalid update request.",
                );
            };

            let sql = format!(
                "UPDATE student_requirements SET {column} = $1 WHERE student_id = $2"
            );
            match sqlx::query(&sql).bind(flag).bind(student_id).execute(&pool).await {
                Ok(result) if result.rows_affected() > 0 => {
                    update_success(ajax, &form.field, json!(flag))
                }
                Ok(_) => update_error(ajax, StatusCode::NOT_FOUND, "not_found", "Record not found."),
                Err(err) => {
                    error!(?err, "failed to update requirement flag");
                    update_error(ajax, StatusCode::INTERNAL_SERVER_ERROR, "unknown", "Something went wrong.")
                }
            }
        }
        UpdateField::StartOfOjt => {
            let parsed: Option<NaiveDate> = if value.is_empty() {
                None
            } else {
                match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
                    Ok(date) => Some(date),
                    Err(_) => {
                        return update_error(
                            ajax,
                            StatusCode::BAD_REQUEST,
                            "invalid_date",
                            "Invalid date format.",
                        );
                    }
                }
            };

            match sqlx::query("UPDATE student_requirements SET start_of_ojt = $1 WHERE student_id = $2")
                .bind(parsed)
                .bind(student_id)
                .execute(&pool)
                .await
            {
                Ok(result) if result.rows_affected() > 0 => update_success(
                    ajax,
                    &form.field,
                    json!(parsed.map(|date| date.to_string()).unwrap_or_default()),
                ),
                Ok(_) => update_error(ajax, StatusCode::NOT_FOUND, "not_found", "Record not found."),
                Err(err) => {
                    error!(?err, "failed to update start of OJT");
                    update_error(ajax, StatusCode::INTERNAL_SERVER_ERROR, "unknown", "Something went wrong.")
                }
            }
        }
        UpdateField::MonthHours(column) => {
            let parsed: i32 = match value.trim().parse() {
                Ok(parsed) => parsed,
                Err(_) => {
                    return update_error(
                        ajax,
                        StatusCode::BAD_REQUEST,
                        "invalid_hours",
                        "Hours must be a valid number.",
                    );
                }
            };
            if parsed < 0 {
                return update_error(
                    ajax,
                    StatusCode::BAD_REQUEST,
                    "negative_hours",
                    "Hours cannot be negative.",
                );
            }

            let ensure = sqlx::query(
                "INSERT INTO attendance_sheet_dtr (student_id) VALUES ($1)
                 ON CONFLICT (student_id) DO NOTHING",
            )
            .bind(student_id)
            .execute(&pool)
            .await;
            if let Err(err) = ensure {
                error!(?err, "failed to ensure DTR row");
                return update_error(ajax, StatusCode::INTERNAL_SERVER_ERROR, "unknown", "Something went wrong.");
            }

            let sql = format!(
                "UPDATE attendance_sheet_dtr SET {column} = $1, updated_at = NOW() WHERE student_id = $2"
            );
            match sqlx::query(&sql).bind(parsed).bind(student_id).execute(&pool).await {
                Ok(result) if result.rows_affected() > 0 => {
                    update_success(ajax, &form.field, json!(parsed))
                }
                Ok(_) => update_error(ajax, StatusCode::NOT_FOUND, "not_found", "Record not found."),
                Err(err) => {
                    error!(?err, "failed to update DTR hours");
                    update_error(ajax, StatusCode::INTERNAL_SERVER_ERROR, "unknown", "Something went wrong.")
                }
            }
        }
    }
}

fn update_success(ajax: bool, field: &str, value: serde_json::Value) -> Response {
    if ajax {
        Json(json!({ "ok": true, "field": field, "value": value })).into_response()
    } else {
        Redirect::to("/staff/manage-records?status=updated").into_response()
    }
}

fn update_error(ajax: bool, status: StatusCode, code: &str, message: &str) -> Response {
    if ajax {
        json_error(status, message).into_response()
    } else {
        Redirect::to(&format!("/staff/manage-records?error={code}")).into_response()
    }
}

pub async fn sync_student_records(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Response {
    let ajax = is_ajax(&headers);
    if let Err(rejection) = require_staff_json(&state, &jar).await {
        if ajax {
            return rejection.into_response();
        }
        return Redirect::to("/?error=login_required").into_response();
    }

    let pool = state.pool();
    let outcome = async {
        sync_requirement_rows(&pool).await?;
        sync_dtr_rows(&pool).await?;
        journal::sync_weekly_journal(&pool, Utc::now().year()).await
    }
    .await;

    if let Err(err) = outcome {
        error!(?err, "failed to sync student records");
        return update_error(ajax, StatusCode::INTERNAL_SERVER_ERROR, "unknown", "Something went wrong.");
    }

    if ajax {
        Json(ApiMessage::success("Student details have been synced.")).into_response()
    } else {
        Redirect::to("/staff/manage-records?status=synced").into_response()
    }
}

fn render_records_body(
    query: &RecordsQuery,
    records: &[RequirementRecordRow],
    assignments: &[sections::SectionAssignmentView],
    staff_options: &sections::AssignableStaff,
) -> String {
    let q = escape_html(query.q.as_deref().unwrap_or(""));
    let program = escape_html(query.program.as_deref().unwrap_or(""));
    let school_year = escape_html(query.school_year.as_deref().unwrap_or(""));

    let requirement_headers = REQUIREMENT_FIELDS
        .iter()
        .map(|(_, label)| format!("<th>{label}</th>"))
        .collect::<Vec<_>>()
        .join("");
    let hour_headers = MONTH_HOUR_FIELDS
        .iter()
        .map(|(_, _, label)| format!("<th>{label}</th>"))
        .collect::<Vec<_>>()
        .join("");

    let mut rows = String::new();
    for record in records {
        let name = crate::web::auth::compose_full_name(
            &record.first_name,
            None,
            record.middle_initial.as_deref(),
            &record.last_name,
        );

        let checkboxes = REQUIREMENT_FIELDS
            .iter()
            .map(|(column, _)| {
                let checked = if record.requirement_value(column) {
                    " checked"
                } else {
                    ""
                };
                format!(
                    r#"<td class="check-cell"><input type="checkbox" data-update-field="{column}" data-student-id="{id}"{checked}></td>"#,
                    id = record.student_id
                )
            })
            .collect::<Vec<_>>()
            .join("");

        let hours = MONTH_HOUR_FIELDS
            .iter()
            .map(|(form_name, _, _)| {
                format!(
                    r#"<td><input type="number" min="0" style="width:4.5rem" value="{value}" data-update-field="{form_name}" data-student-id="{id}"></td>"#,
                    value = record.hour_value(form_name),
                    id = record.student_id
                )
            })
            .collect::<Vec<_>>()
            .join("");

        let start_of_ojt = record
            .start_of_ojt
            .map(|date| date.to_string())
            .unwrap_or_default();

        rows.push_str(&format!(
            r#"<tr>
                <td>{student_no}</td>
                <td>{name}</td>
                <td>{section}</td>
                <td>{school_year}</td>
                <td><input type="date" value="{start_of_ojt}" data-update-field="start_of_ojt" data-student-id="{id}"></td>
                {checkboxes}
                {hours}
            </tr>"#,
            student_no = escape_html(&record.student_no),
            name = escape_html(&name),
            section = escape_html(&record.section),
            school_year = escape_html(record.school_year.as_deref().unwrap_or("")),
            id = record.student_id,
        ));
    }

    if records.is_empty() {
        let span = 5 + REQUIREMENT_FIELDS.len() + MONTH_HOUR_FIELDS.len();
        rows = format!(r#"<tr><td colspan="{span}" class="note">No matching students.</td></tr>"#);
    }

    let assignment_rows = assignments
        .iter()
        .map(|assignment| {
            format!(
                "<tr><td>{section}</td><td>{school_year}</td><td>{instructor}</td><td>{coordinator}</td></tr>",
                section = escape_html(&assignment.section),
                school_year = escape_html(&assignment.school_year),
                instructor = escape_html(assignment.instructor_name.as_deref().unwrap_or("—")),
                coordinator = escape_html(assignment.coordinator_name.as_deref().unwrap_or("—")),
            )
        })
        .collect::<Vec<_>>()
        .join("");

    let section_options = assignments
        .iter()
        .map(|assignment| {
            format!(
                r#"<option value="{id}">{section} ({school_year})</option>"#,
                id = assignment.section_id,
                section = escape_html(&assignment.section),
                school_year = escape_html(&assignment.school_year),
            )
        })
        .collect::<Vec<_>>()
        .join("");

    let instructor_options = staff_options
        .instructors
        .iter()
        .map(|staff| {
            format!(
                r#"<option value="inst:{id}">{name}</option>"#,
                id = staff.id,
                name = escape_html(&staff.name)
            )
        })
        .collect::<Vec<_>>()
        .join("");
    let coordinator_options = staff_options
        .coordinators
        .iter()
        .map(|staff| {
            format!(
                r#"<option value="coord:{id}">{name}</option>"#,
                id = staff.id,
                name = escape_html(&staff.name)
            )
        })
        .collect::<Vec<_>>()
        .join("");

    format!(
        r#"<section class="panel">
            <h2>Find Students</h2>
            <form method="get" action="/staff/manage-records" style="display:flex; gap:0.75rem; flex-wrap:wrap; align-items:end;">
                <div><label for="q">Name or student no.</label><input id="q" name="q" value="{q}"></div>
                <div><label for="program">Program or section</label><input id="program" name="program" value="{program}"></div>
                <div><label for="school_year">School year</label><input id="school_year" name="school_year" value="{school_year}" placeholder="2025 - 2026"></div>
                <button type="submit">Filter</button>
            </form>
            <form method="post" action="/staff/manage-records/sync" style="margin-top:0.75rem;">
                <button type="submit" class="quiet">Sync student details</button>
            </form>
        </section>
        <section class="panel" style="overflow-x:auto;">
            <h2>Requirements &amp; Hours</h2>
            <table>
                <thead>
                    <tr>
                        <th>Student No.</th><th>Name</th><th>Section</th><th>School Year</th><th>Start of OJT</th>
                        {requirement_headers}
                        {hour_headers}
                    </tr>
                </thead>
                <tbody>
                    {rows}
                </tbody>
            </table>
        </section>
        <section class="panel">
            <h2>Section Assignments</h2>
            <form method="post" action="/staff/section-instructors" style="display:flex; gap:0.75rem; flex-wrap:wrap; align-items:end;">
                <div>
                    <label for="section_id">Section</label>
                    <select id="section_id" name="section_id" required>
                        <option value="">Select a section…</option>
                        {section_options}
                    </select>
                </div>
                <div>
                    <label for="staff">Assigned staff</label>
                    <select id="staff" name="staff">
                        <option value="">Unassigned</option>
                        <optgroup label="Instructors">{instructor_options}</optgroup>
                        <optgroup label="Coordinators">{coordinator_options}</optgroup>
                    </select>
                </div>
                <button type="submit">Save assignment</button>
            </form>
            <table>
                <thead><tr><th>Section</th><th>School Year</th><th>Instructor</th><th>Coordinator</th></tr></thead>
                <tbody>{assignment_rows}</tbody>
            </table>
        </section>
        <section class="panel">
            <h2>Weekly Journal Schedules</h2>
            <p class="note">Pick a submission day per section; journal weeks are generated for the current year.</p>
            <div style="display:flex; gap:0.75rem; flex-wrap:wrap; align-items:end;">
                <div>
                    <label for="schedule-section">Section</label>
                    <input id="schedule-section" placeholder="CS-404">
                </div>
                <div>
                    <label for="schedule-day">Submission day</label>
                    <select id="schedule-day">
                        <option value="1">Monday</option>
                        <option value="2">Tuesday</option>
                        <option value="3">Wednesday</option>
                        <option value="4">Thursday</option>
                        <option value="5" selected>Friday</option>
                        <option value="6">Saturday</option>
                        <option value="7">Sunday</option>
                    </select>
                </div>
                <button type="button" id="schedule-save">Save schedule</button>
            </div>
            <table>
                <thead><tr><th>Section</th><th>Submission day</th><th></th></tr></thead>
                <tbody id="schedule-rows"><tr><td colspan="3" class="note">Loading…</td></tr></tbody>
            </table>
        </section>
        <section class="panel" style="overflow-x:auto;">
            <h2>Weekly Journal Checking</h2>
            <div style="display:flex; gap:0.75rem; flex-wrap:wrap; align-items:end;">
                <div><label for="journal-section">Section</label><input id="journal-section" placeholder="CS-404"></div>
                <div><label for="journal-month">Month</label>
                    <select id="journal-month">
                        <option value="1">January</option><option value="2">February</option>
                        <option value="3">March</option><option value="4">April</option>
                        <option value="5">May</option><option value="6" selected>June</option>
                        <option value="7">July</option><option value="8">August</option>
                        <option value="9">September</option><option value="10">October</option>
                        <option value="11">November</option><option value="12">December</option>
                    </select>
                </div>
                <div><label for="journal-year">Year</label><input id="journal-year" type="number" style="width:6rem"></div>
                <button type="button" id="journal-load">Load weeks</button>
            </div>
            <table>
                <thead><tr><th>Student</th><th>Week</th><th>Due</th><th>Submitted</th><th>Status</th><th>Note</th></tr></thead>
                <tbody id="journal-rows"><tr><td colspan="6" class="note">Pick a section and month.</td></tr></tbody>
            </table>
        </section>"#
    )
}

const RECORDS_SCRIPT: &str = r#"<script>
(function () {
    const DAY_NAMES = ["", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];

    function postForm(url, fields) {
        return fetch(url, {
            method: "POST",
            headers: {
                "Content-Type": "application/x-www-form-urlencoded",
                "X-Requested-With": "XMLHttpRequest",
            },
            body: new URLSearchParams(fields),
        }).then((resp) => resp.json().then((data) => ({ ok: resp.ok, data })));
    }

    document.querySelectorAll("[data-update-field]").forEach((input) => {
        input.addEventListener("change", () => {
            const value = input.type === "checkbox" ? String(input.checked) : input.value;
            postForm("/staff/manage-records/update", {
                student_id: input.dataset.studentId,
                field: input.dataset.updateField,
                value: value,
            }).then(({ ok, data }) => {
                if (!ok) {
                    alert(data.message || "Update failed.");
                    if (input.type === "checkbox") {
                        input.checked = !input.checked;
                    }
                }
            }).catch(() => alert("Update failed."));
        });
    });

    const scheduleRows = document.getElementById("schedule-rows");

    function loadSchedules() {
        fetch("/staff/schedules", { headers: { "X-Requested-With": "XMLHttpRequest" } })
            .then((resp) => resp.json())
            .then((data) => {
                if (!data.ok) { return; }
                if (!data.schedules.length) {
                    scheduleRows.innerHTML = '<tr><td colspan="3" class="note">No schedules configured.</td></tr>';
                    return;
                }
                scheduleRows.innerHTML = data.schedules.map((row) =>
                    "<tr><td>" + row.section + "</td><td>" + (DAY_NAMES[row.submission_day] || row.submission_day) +
                    '</td><td><button type="button" class="quiet" data-remove-schedule="' + row.section + '">Remove</button></td></tr>'
                ).join("");
                scheduleRows.querySelectorAll("[data-remove-schedule]").forEach((button) => {
                    button.addEventListener("click", () => {
                        postForm("/staff/schedules", { action: "delete", section: button.dataset.removeSchedule })
                            .then(loadSchedules);
                    });
                });
            });
    }

    const saveButton = document.getElementById("schedule-save");
    if (saveButton) {
        saveButton.addEventListener("click", () => {
            const section = document.getElementById("schedule-section").value.trim();
            const day = document.getElementById("schedule-day").value;
            if (!section) { alert("Please enter a section."); return; }
            postForm("/staff/schedules", { action: "add", section: section, submission_day: day })
                .then(({ ok, data }) => {
                    if (!ok) { alert(data.message || "Could not save schedule."); }
                    loadSchedules();
                });
        });
        loadSchedules();
    }

    const journalRows = document.getElementById("journal-rows");
    const journalLoad = document.getElementById("journal-load");

    function statusLabel(row) {
        if (row.status) { return row.status; }
        return row.submitted_at ? "passed" : "pending";
    }

    function loadJournalWeeks() {
        const section = document.getElementById("journal-section").value.trim();
        const month = document.getElementById("journal-month").value;
        const year = document.getElementById("journal-year").value;
        if (!section || !year) { alert("Please enter a section and year."); return; }

        const params = new URLSearchParams({ section: section, month: month, year: year });
        fetch("/staff/weekly-journal/weeks?" + params, { headers: { "X-Requested-With": "XMLHttpRequest" } })
            .then((resp) => resp.json())
            .then((data) => {
                if (!data.ok) { alert(data.message || "Could not load journal weeks."); return; }
                if (!data.weeks.length) {
                    journalRows.innerHTML = '<tr><td colspan="6" class="note">No journal weeks for that month. Is a schedule configured?</td></tr>';
                    return;
                }
                journalRows.innerHTML = data.weeks.map((row) =>
                    '<tr data-entry-id="' + row.id + '">' +
                    "<td>" + row.student_no + " — " + row.student_name + "</td>" +
                    "<td>Week " + row.week_no + "</td>" +
                    "<td>" + row.due_date + "</td>" +
                    '<td class="check-cell"><input type="checkbox" data-journal-check ' + (row.submitted_at ? "checked" : "") + "></td>" +
                    '<td><select data-journal-status>' +
                    '<option value=""' + (row.status ? "" : " selected") + ">on time</option>" +
                    '<option value="late"' + (row.status === "late" ? " selected" : "") + ">late</option>" +
                    '<option value="late_excused"' + (row.status === "late_excused" ? " selected" : "") + ">late (excused)</option>" +
                    "</select> <span class=\"note\">" + statusLabel(row) + "</span></td>" +
                    '<td><input data-journal-note value="' + (row.status_note || "").replace(/"/g, "&quot;") + '"></td>' +
                    "</tr>"
                ).join("");

                journalRows.querySelectorAll("tr[data-entry-id]").forEach((tr) => {
                    const send = () => {
                        postForm("/staff/weekly-journal/check", {
                            entry_id: tr.dataset.entryId,
                            checked: String(tr.querySelector("[data-journal-check]").checked),
                            status_override: tr.querySelector("[data-journal-status]").value,
                            status_note: tr.querySelector("[data-journal-note]").value,
                        }).then(({ ok, data }) => {
                            if (!ok) { alert(data.message || "Update failed."); }
                            loadJournalWeeks();
                        });
                    };
                    tr.querySelector("[data-journal-check]").addEventListener("change", send);
                    tr.querySelector("[data-journal-status]").addEventListener("change", send);
                    tr.querySelector("[data-journal-note]").addEventListener("change", send);
                });
            });
    }

    if (journalLoad) {
        document.getElementById("journal-year").value = new Date().getFullYear();
        journalLoad.addEventListener("click", loadJournalWeeks);
    }
})();
</script>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_classifier_accepts_the_allow_list_only() {
        assert_eq!(
            UpdateField::parse("practicum_application"),
            Some(UpdateField::Requirement("practicum_application"))
        );
        assert_eq!(
            UpdateField::parse("cca_hymn"),
            Some(UpdateField::Requirement("cca_hymn"))
        );
        assert_eq!(UpdateField::parse("start_of_ojt"), Some(UpdateField::StartOfOjt));
        assert_eq!(
            UpdateField::parse("dtr_june_hours"),
            Some(UpdateField::MonthHours("june_hours"))
        );
        assert_eq!(UpdateField::parse("password"), None);
        assert_eq!(UpdateField::parse("student_no"), None);
        assert_eq!(UpdateField::parse(""), None);
    }

    #[test]
    fn bool_literals_are_strict() {
        assert_eq!(parse_bool_literal("true"), Some(true));
        assert_eq!(parse_bool_literal("false"), Some(false));
        assert_eq!(parse_bool_literal("TRUE"), None);
        assert_eq!(parse_bool_literal("1"), None);
        assert_eq!(parse_bool_literal("yes"), None);
        assert_eq!(parse_bool_literal(""), None);
    }

    #[test]
    fn sixteen_requirements_are_declared() {
        assert_eq!(REQUIREMENT_FIELDS.len(), 16);
        assert_eq!(MONTH_HOUR_FIELDS.len(), 6);
    }
}
