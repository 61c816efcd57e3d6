//! Student and instructor account management, including the roster CSV
//! import and its downloadable template.

use std::borrow::Cow;

use axum::{
    Json,
    extract::{Form, Multipart, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::csvutil::{csv_line, header_indexes, parse_csv_record, strip_bom};
use crate::web::{
    AppState, escape_html, is_ajax, json_error,
    auth::compose_full_name,
    staff::{require_staff_json, require_staff_user},
    templates::{self, StaffPageLayout},
};

/// Maximum row errors echoed back in an import summary.
const IMPORT_ERROR_CAP: usize = 50;

const CSV_TEMPLATE_HEADER: [&str; 9] = [
    "student_no",
    "cca_email",
    "last_name",
    "first_name",
    "second_name",
    "middle_initial",
    "program",
    "section",
    "school_year",
];

const CSV_TEMPLATE_EXAMPLE: [&str; 9] = [
    "22-2246",
    "student@cca.edu.ph",
    "Acopio",
    "Ross Jhem",
    "",
    "P",
    "Bachelor of Science in Computer Science",
    "CS-404",
    "2025 - 2026",
];

#[derive(sqlx::FromRow)]
struct StudentListRow {
    id: Uuid,
    student_no: String,
    cca_email: String,
    last_name: String,
    first_name: String,
    second_name: Option<String>,
    middle_initial: Option<String>,
    school_year: Option<String>,
    program: String,
    section: String,
    active_status: bool,
}

#[derive(sqlx::FromRow)]
struct InstructorListRow {
    id: Uuid,
    cca_email: String,
    last_name: String,
    first_name: String,
    second_name: Option<String>,
    middle_initial: Option<String>,
    active_status: bool,
}

#[derive(Default, Deserialize)]
pub struct AccountsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub edit_type: Option<String>,
    #[serde(default)]
    pub edit_id: Option<Uuid>,
}

pub async fn manage_accounts(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<AccountsQuery>,
) -> Result<Html<String>, Redirect> {
    let account = require_staff_user(&state, &jar).await?;
    let pool = state.pool();

    let students = sqlx::query_as::<_, StudentListRow>(
        "SELECT id, student_no, cca_email, last_name, first_name, second_name, middle_initial,
                school_year, program, section, active_status
         FROM students ORDER BY last_name, first_name",
    )
    .fetch_all(&pool)
    .await
    .map_err(|err| {
        error!(?err, "failed to list students");
        Redirect::to("/staff?error=unknown")
    })?;

    let instructors = sqlx::query_as::<_, InstructorListRow>(
        "SELECT id, cca_email, last_name, first_name, second_name, middle_initial, active_status
         FROM practicum_instructors ORDER BY last_name, first_name",
    )
    .fetch_all(&pool)
    .await
    .map_err(|err| {
        error!(?err, "failed to list instructors");
        Redirect::to("/staff?error=unknown")
    })?;

    let edit_student = match (query.edit_type.as_deref(), query.edit_id) {
        (Some("student"), Some(id)) => students.iter().find(|row| row.id == id),
        _ => None,
    };
    let edit_instructor = match (query.edit_type.as_deref(), query.edit_id) {
        (Some("instructor"), Some(id)) => instructors.iter().find(|row| row.id == id),
        _ => None,
    };

    let flash_html =
        templates::compose_flash_message(query.status.as_deref(), query.error.as_deref());
    let body_html = render_accounts_body(&students, &instructors, edit_student, edit_instructor);

    let name = account.full_name();
    Ok(Html(templates::render_staff_page(StaffPageLayout {
        meta_title: "Manage Accounts",
        heading: "Manage Accounts",
        account_name: &name,
        role: account.role,
        active_path: "/staff/manage-accounts",
        flash_html: Cow::Owned(flash_html),
        body_html: Cow::Owned(body_html),
        body_scripts: Vec::new(),
    })))
}

#[derive(Deserialize)]
pub struct AccountActionForm {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub student_no: Option<String>,
    #[serde(default)]
    pub cca_email: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub second_name: Option<String>,
    #[serde(default)]
    pub middle_initial: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub school_year: Option<String>,
}

fn clean(value: &Option<String>) -> String {
    value.as_deref().unwrap_or("").trim().to_string()
}

fn clean_optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}

pub async fn manage_accounts_action(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Form(form): Form<AccountActionForm>,
) -> Response {
    let ajax = is_ajax(&headers);
    if let Err(rejection) = require_staff_json(&state, &jar).await {
        if ajax {
            return rejection.into_response();
        }
        return Redirect::to("/?error=login_required").into_response();
    }

    match form.action.as_str() {
        "add_student" => add_student(&state, ajax, &form).await,
        "add_instructor" => add_instructor(&state, ajax, &form).await,
        "update_student" => update_student(&state, ajax, &form).await,
        "update_instructor" => update_instructor(&state, ajax, &form).await,
        _ => accounts_error(ajax, StatusCode::BAD_REQUEST, "unknown", "Invalid request."),
    }
}

async fn add_student(state: &AppState, ajax: bool, form: &AccountActionForm) -> Response {
    let student_no = clean(&form.student_no);
    let cca_email = clean(&form.cca_email).to_lowercase();
    let last_name = clean(&form.last_name);
    let first_name = clean(&form.first_name);
    let program = clean(&form.program);
    let section = clean(&form.section);

    if student_no.is_empty()
        || cca_email.is_empty()
        || last_name.is_empty()
        || first_name.is_empty()
        || program.is_empty()
        || section.is_empty()
    {
        return accounts_error(
            ajax,
            StatusCode::BAD_REQUEST,
            "missing_fields",
            "Please fill in all required fields.",
        );
    }

    let id = Uuid::new_v4();
    let result = sqlx::query(
        "INSERT INTO students
            (id, student_no, cca_email, last_name, first_name, second_name, middle_initial,
             school_year, program, section, password, activation_code, active_status, is_password_temp)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, '', '', FALSE, TRUE)",
    )
    .bind(id)
    .bind(&student_no)
    .bind(&cca_email)
    .bind(&last_name)
    .bind(&first_name)
    .bind(clean_optional(&form.second_name))
    .bind(clean_optional(&form.middle_initial))
    .bind(clean_optional(&form.school_year))
    .bind(&program)
    .bind(&section)
    .execute(state.pool_ref())
    .await;

    match result {
        Ok(_) => {
            if ajax {
                student_record_json(state.pool_ref(), id, "add").await
            } else {
                Redirect::to("/staff/manage-accounts?status=student_added").into_response()
            }
        }
        Err(err) if is_unique_violation(&err) => accounts_error(
            ajax,
            StatusCode::BAD_REQUEST,
            "duplicate_student",
            "Student account already exists (student number or email).",
        ),
        Err(err) => {
            error!(?err, "failed to add student");
            accounts_error(ajax, StatusCode::INTERNAL_SERVER_ERROR, "unknown", "Something went wrong.")
        }
    }
}

async fn add_instructor(state: &AppState, ajax: bool, form: &AccountActionForm) -> Response {
    let cca_email = clean(&form.cca_email).to_lowercase();
    let last_name = clean(&form.last_name);
    let first_name = clean(&form.first_name);

    if cca_email.is_empty() || last_name.is_empty() || first_name.is_empty() {
        return accounts_error(
            ajax,
            StatusCode::BAD_REQUEST,
            "missing_fields",
            "Please fill in all required fields.",
        );
    }

    let id = Uuid::new_v4();
    let result = sqlx::query(
        "INSERT INTO practicum_instructors
            (id, cca_email, last_name, first_name, second_name, middle_initial,
             password, activation_code, active_status, is_password_temp)
         VALUES ($1, $2, $3, $4, $5, $6, '', '', FALSE, TRUE)",
    )
    .bind(id)
    .bind(&cca_email)
    .bind(&last_name)
    .bind(&first_name)
    .bind(clean_optional(&form.second_name))
    .bind(clean_optional(&form.middle_initial))
    .execute(state.pool_ref())
    .await;

    match result {
        Ok(_) => {
            if ajax {
                instructor_record_json(state.pool_ref(), id, "add").await
            } else {
                Redirect::to("/staff/manage-accounts?status=instructor_added").into_response()
            }
        }
        Err(err) if is_unique_violation(&err) => accounts_error(
            ajax,
            StatusCode::BAD_REQUEST,
            "duplicate_instructor",
            "Instructor account already exists (email).",
        ),
        Err(err) => {
            error!(?err, "failed to add instructor");
            accounts_error(ajax, StatusCode::INTERNAL_SERVER_ERROR, "unknown", "Something went wrong.")
        }
    }
}

async fn update_student(state: &AppState, ajax: bool, form: &AccountActionForm) -> Response {
    let Some(id) = form.id else {
        return accounts_error(ajax, StatusCode::BAD_REQUEST, "not_found", "Record not found.");
    };

    let result = sqlx::query(
        "UPDATE students SET
            student_no = $1, cca_email = $2, last_name = $3, first_name = $4,
            second_name = $5, middle_initial = $6, program = $7, section = $8, school_year = $9
         WHERE id = $10",
    )
    .bind(clean(&form.student_no))
    .bind(clean(&form.cca_email).to_lowercase())
    .bind(clean(&form.last_name))
    .bind(clean(&form.first_name))
    .bind(clean_optional(&form.second_name))
    .bind(clean_optional(&form.middle_initial))
    .bind(clean(&form.program))
    .bind(clean(&form.section))
    .bind(clean_optional(&form.school_year))
    .bind(id)
    .execute(state.pool_ref())
    .await;

    match result {
        Ok(outcome) if outcome.rows_affected() > 0 => {
            if ajax {
                student_record_json(state.pool_ref(), id, "update").await
            } else {
                Redirect::to("/staff/manage-accounts?status=student_updated").into_response()
            }
        }
        Ok(_) => accounts_error(ajax, StatusCode::NOT_FOUND, "not_found", "Record not found."),
        Err(err) if is_unique_violation(&err) => accounts_error(
            ajax,
            StatusCode::BAD_REQUEST,
            "duplicate_student",
            "Student account already exists (student number or email).",
        ),
        Err(err) => {
            error!(?err, "failed to update student");
            accounts_error(ajax, StatusCode::INTERNAL_SERVER_ERROR, "unknown", "Something went wrong.")
        }
    }
}

async fn update_instructor(state: &AppState, ajax: bool, form: &AccountActionForm) -> Response {
    let Some(id) = form.id else {
        return accounts_error(ajax, StatusCode::BAD_REQUEST, "not_found", "Record not found.");
    };

    let result = sqlx::query(
        "UPDATE practicum_instructors SET
            cca_email = $1, last_name = $2, first_name = $3, second_name = $4, middle_initial = $5
         WHERE id = $6",
    )
    .bind(clean(&form.cca_email).to_lowercase())
    .bind(clean(&form.last_name))
    .bind(clean(&form.first_name))
    .bind(clean_optional(&form.second_name))
    .bind(clean_optional(&form.middle_initial))
    .bind(id)
    .execute(state.pool_ref())
    .await;

    match result {
        Ok(outcome) if outcome.rows_affected() > 0 => {
            if ajax {
                instructor_record_json(state.pool_ref(), id, "update").await
            } else {
                Redirect::to("/staff/manage-accounts?status=instructor_updated").into_response()
            }
        }
        Ok(_) => accounts_error(ajax, StatusCode::NOT_FOUND, "not_found", "Record not found."),
        Err(err) if is_unique_violation(&err) => accounts_error(
            ajax,
            StatusCode::BAD_REQUEST,
            "duplicate_instructor",
            "Instructor account already exists (email).",
        ),
        Err(err) => {
            error!(?err, "failed to update instructor");
            accounts_error(ajax, StatusCode::INTERNAL_SERVER_ERROR, "unknown", "Something went wrong.")
        }
    }
}

async fn student_record_json(pool: &PgPool, id: Uuid, mode: &str) -> Response {
    match sqlx::query_as::<_, StudentListRow>(
        "SELECT id, student_no, cca_email, last_name, first_name, second_name, middle_initial,
                school_year, program, section, active_status
         FROM students WHERE id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    {
        Ok(row) => Json(json!({
            "ok": true,
            "mode": mode,
            "type": "student",
            "record": {
                "id": row.id,
                "student_no": row.student_no,
                "last_name": row.last_name,
                "first_name": row.first_name,
                "middle_initial": row.middle_initial,
                "second_name": row.second_name,
                "section": row.section,
                "program": row.program,
                "school_year": row.school_year,
                "cca_email": row.cca_email,
                "active_status": row.active_status,
            },
        }))
        .into_response(),
        Err(err) => {
            error!(?err, "failed to reload student record");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.").into_response()
        }
    }
}

async fn instructor_record_json(pool: &PgPool, id: Uuid, mode: &str) -> Response {
    match sqlx::query_as::<_, InstructorListRow>(
        "SELECT id, cca_email, last_name, first_name, second_name, middle_initial, active_status
         FROM practicum_instructors WHERE id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    {
        Ok(row) => Json(json!({
            "ok": true,
            "mode": mode,
            "type": "instructor",
            "record": {
                "id": row.id,
                "last_name": row.last_name,
                "first_name": row.first_name,
                "middle_initial": row.middle_initial,
                "second_name": row.second_name,
                "cca_email": row.cca_email,
                "active_status": row.active_status,
            },
        }))
        .into_response(),
        Err(err) => {
            error!(?err, "failed to reload instructor record");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.").into_response()
        }
    }
}

fn accounts_error(ajax: bool, status: StatusCode, code: &str, message: &str) -> Response {
    if ajax {
        json_error(status, message).into_response()
    } else {
        Redirect::to(&format!("/staff/manage-accounts?error={code}")).into_response()
    }
}

/// Column positions resolved from a (case-insensitively) normalized header.
#[derive(Debug)]
struct ImportHeader {
    student_no: usize,
    email: usize,
    last_name: usize,
    first_name: usize,
    program: usize,
    section: usize,
    second_name: Option<usize>,
    middle_initial: Option<usize>,
    school_year: Option<usize>,
}

/// Either `cca_email` or plain `email` satisfies the email column.
fn resolve_import_header(fields: &[String]) -> Result<ImportHeader, Vec<&'static str>> {
    let indexes = header_indexes(fields);
    let mut missing = Vec::new();

    let mut required = |name: &'static str| -> usize {
        match indexes.get(name) {
            Some(idx) => *idx,
            None => {
                missing.push(name);
                usize::MAX
            }
        }
    };

    let student_no = required("student_no");
    let last_name = required("last_name");
    let first_name = required("first_name");
    let program = required("program");
    let section = required("section");
    let email = match indexes.get("cca_email").or_else(|| indexes.get("email")) {
        Some(idx) => *idx,
        None => {
            missing.push("cca_email");
            usize::MAX
        }
    };

    if !missing.is_empty() {
        return Err(missing);
    }

    Ok(ImportHeader {
        student_no,
        email,
        last_name,
        first_name,
        program,
        section,
        second_name: indexes.get("second_name").copied(),
        middle_initial: indexes.get("middle_initial").copied(),
        school_year: indexes.get("school_year").copied(),
    })
}

struct ImportedStudent {
    student_no: String,
    cca_email: String,
    last_name: String,
    first_name: String,
    second_name: Option<String>,
    middle_initial: Option<String>,
    program: String,
    section: String,
    school_year: Option<String>,
}

enum RowOutcome {
    Blank,
    Invalid(&'static str),
    Student(ImportedStudent),
}

fn field_at(fields: &[String], idx: usize) -> String {
    fields.get(idx).map(|v| v.trim().to_string()).unwrap_or_default()
}

fn optional_field(fields: &[String], idx: Option<usize>) -> Option<String> {
    idx.map(|idx| field_at(fields, idx)).filter(|v| !v.is_empty())
}

/// Validate one data row. Fully blank rows are skipped silently; rows with
/// some but not all required values land in the error list.
fn parse_import_row(header: &ImportHeader, fields: &[String]) -> RowOutcome {
    let student_no = field_at(fields, header.student_no);
    let cca_email = field_at(fields, header.email).to_lowercase();
    let last_name = field_at(fields, header.last_name);
    let first_name = field_at(fields, header.first_name);
    let program = field_at(fields, header.program);
    let section = field_at(fields, header.section);

    if student_no.is_empty()
        && cca_email.is_empty()
        && last_name.is_empty()
        && first_name.is_empty()
        && program.is_empty()
        && section.is_empty()
    {
        return RowOutcome::Blank;
    }

    if student_no.is_empty()
        || cca_email.is_empty()
        || last_name.is_empty()
        || first_name.is_empty()
        || program.is_empty()
        || section.is_empty()
    {
        return RowOutcome::Invalid("Missing required value(s).");
    }

    RowOutcome::Student(ImportedStudent {
        student_no,
        cca_email,
        last_name,
        first_name,
        second_name: optional_field(fields, header.second_name),
        middle_initial: optional_field(fields, header.middle_initial),
        program,
        section,
        school_year: optional_field(fields, header.school_year),
    })
}

enum ImportAction {
    Created,
    Updated,
}

/// Match by student number first, then email; update in place or create a
/// fresh record awaiting activation.
async fn upsert_imported_student(
    pool: &PgPool,
    student: &ImportedStudent,
) -> sqlx::Result<ImportAction> {
    let existing: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM students WHERE student_no = $1")
            .bind(&student.student_no)
            .fetch_optional(pool)
            .await?;
    let existing = match existing {
        Some(id) => Some(id),
        None => {
            sqlx::query_scalar("SELECT id FROM students WHERE cca_email = $1")
                .bind(&student.cca_email)
                .fetch_optional(pool)
                .await?
        }
    };

    if let Some(id) = existing {
        sqlx::query(
            "UPDATE students SET
                student_no = $1, cca_email = $2, last_name = $3, first_name = $4,
                second_name = $5, middle_initial = $6, program = $7, section = $8, school_year = $9
             WHERE id = $10",
        )
        .bind(&student.student_no)
        .bind(&student.cca_email)
        .bind(&student.last_name)
        .bind(&student.first_name)
        .bind(&student.second_name)
        .bind(&student.middle_initial)
        .bind(&student.program)
        .bind(&student.section)
        .bind(&student.school_year)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(ImportAction::Updated)
    } else {
        sqlx::query(
            "INSERT INTO students
                (id, student_no, cca_email, last_name, first_name, second_name, middle_initial,
                 school_year, program, section, password, activation_code, active_status, is_password_temp)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, '', '', FALSE, TRUE)",
        )
        .bind(Uuid::new_v4())
        .bind(&student.student_no)
        .bind(&student.cca_email)
        .bind(&student.last_name)
        .bind(&student.first_name)
        .bind(&student.second_name)
        .bind(&student.middle_initial)
        .bind(&student.school_year)
        .bind(&student.program)
        .bind(&student.section)
        .execute(pool)
        .await?;
        Ok(ImportAction::Created)
    }
}

#[derive(Default)]
struct ImportSummary {
    created: usize,
    updated: usize,
    skipped: usize,
    errors: Vec<(usize, String)>,
}

pub async fn import_students_csv(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let ajax = is_ajax(&headers);
    if let Err(rejection) = require_staff_json(&state, &jar).await {
        if ajax {
            return rejection.into_response();
        }
        return Redirect::to("/?error=login_required").into_response();
    }

    let mut upload: Option<(String, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("student_csv") {
                    continue;
                }
                let filename = field.file_name().unwrap_or("").to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((filename, bytes.to_vec())),
                    Err(err) => {
                        error!(?err, "failed to read uploaded CSV");
                        return accounts_error(
                            ajax,
                            StatusCode::BAD_REQUEST,
                            "missing_file",
                            "Please choose a CSV file first.",
                        );
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                error!(?err, "failed to read multipart body");
                return accounts_error(
                    ajax,
                    StatusCode::BAD_REQUEST,
                    "missing_file",
                    "Please choose a CSV file first.",
                );
            }
        }
    }

    let Some((filename, bytes)) = upload else {
        return accounts_error(
            ajax,
            StatusCode::BAD_REQUEST,
            "missing_file",
            "Please choose a CSV file first.",
        );
    };

    if !filename.to_lowercase().ends_with(".csv") {
        return accounts_error(
            ajax,
            StatusCode::BAD_REQUEST,
            "invalid_file_type",
            "Invalid file type. Upload a .csv file.",
        );
    }

    let Ok(content) = String::from_utf8(bytes) else {
        return accounts_error(
            ajax,
            StatusCode::BAD_REQUEST,
            "invalid_encoding",
            "CSV must be UTF-8 encoded.",
        );
    };

    let content = strip_bom(&content);
    let mut lines = content.lines();
    let Some(header_line) = lines.next().filter(|line| !line.trim().is_empty()) else {
        return accounts_error(
            ajax,
            StatusCode::BAD_REQUEST,
            "invalid_file_type",
            "CSV is empty or missing headers.",
        );
    };

    let header = match resolve_import_header(&parse_csv_record(header_line)) {
        Ok(header) => header,
        Err(missing) => {
            let message = format!("CSV missing required columns: {}", missing.join(", "));
            if ajax {
                return json_error(StatusCode::BAD_REQUEST, message).into_response();
            }
            return Html(render_import_summary_page(&message, &ImportSummary::default()))
                .into_response();
        }
    };

    let pool = state.pool();
    let mut summary = ImportSummary::default();

    // Header is line 1; data rows get 1-based file line numbers from 2.
    for (idx, line) in lines.enumerate() {
        let row_no = idx + 2;
        if line.trim().is_empty() {
            summary.skipped += 1;
            continue;
        }

        match parse_import_row(&header, &parse_csv_record(line)) {
            RowOutcome::Blank => summary.skipped += 1,
            RowOutcome::Invalid(reason) => summary.errors.push((row_no, reason.to_string())),
            RowOutcome::Student(student) => {
                match upsert_imported_student(&pool, &student).await {
                    Ok(ImportAction::Created) => summary.created += 1,
                    Ok(ImportAction::Updated) => summary.updated += 1,
                    Err(err) if is_unique_violation(&err) => summary
                        .errors
                        .push((row_no, "Duplicate student number or email conflict.".to_string())),
                    Err(err) => {
                        error!(?err, row_no, "failed to import student row");
                        summary.errors.push((row_no, "Database error.".to_string()));
                    }
                }
            }
        }
    }

    let message = format!(
        "Student CSV import done. Created: {}, Updated: {}, Skipped: {}, Errors: {}.",
        summary.created,
        summary.updated,
        summary.skipped,
        summary.errors.len()
    );

    if ajax {
        let errors: Vec<_> = summary
            .errors
            .iter()
            .take(IMPORT_ERROR_CAP)
            .map(|(row, reason)| json!({ "row": row, "reason": reason }))
            .collect();
        return Json(json!({
            "ok": summary.errors.is_empty(),
            "message": message,
            "created": summary.created,
            "updated": summary.updated,
            "skipped": summary.skipped,
            "error_count": summary.errors.len(),
            "errors": errors,
        }))
        .into_response();
    }

    Html(render_import_summary_page(&message, &summary)).into_response()
}

fn render_import_summary_page(message: &str, summary: &ImportSummary) -> String {
    let error_rows = summary
        .errors
        .iter()
        .take(IMPORT_ERROR_CAP)
        .map(|(row, reason)| {
            format!(
                "<tr><td>{row}</td><td>{reason}</td></tr>",
                reason = escape_html(reason)
            )
        })
        .collect::<Vec<_>>()
        .join("");

    let errors_html = if summary.errors.is_empty() {
        String::new()
    } else {
        let truncated_note = if summary.errors.len() > IMPORT_ERROR_CAP {
            format!(
                r#"<p class="note">Showing the first {IMPORT_ERROR_CAP} of {} errors.</p>"#,
                summary.errors.len()
            )
        } else {
            String::new()
        };
        format!(
            r#"<table>
                <thead><tr><th>Row</th><th>Problem</th></tr></thead>
                <tbody>{error_rows}</tbody>
            </table>
            {truncated_note}"#
        )
    };

    let kind = if summary.errors.is_empty() { "success" } else { "error" };
    let footer = templates::render_footer();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>CSV Import — OJT Practicum Tracker</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
        body {{ font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }}
        main {{ padding: 2rem 1.5rem; max-width: 720px; margin: 0 auto; }}
        .panel {{ background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; }}
        table {{ width: 100%; border-collapse: collapse; margin-top: 1rem; }}
        th, td {{ padding: 0.55rem 0.7rem; border-bottom: 1px solid #e2e8f0; text-align: left; }}
        .flash {{ padding: 0.75rem 1rem; border-radius: 8px; margin-bottom: 1rem; font-weight: 600; }}
        .flash.success {{ background: #dcfce7; color: #166534; }}
        .flash.error {{ background: #fee2e2; color: #b91c1c; }}
        .note {{ color: #475569; font-size: 0.9rem; }}
        a {{ color: #1d4ed8; }}
        .app-footer {{ margin-top: 3rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }}
    </style>
</head>
<body>
    <main>
        <section class="panel">
            <h1>CSV Import</h1>
            <div class="flash {kind}">{message}</div>
            {errors_html}
            <p><a href="/staff/manage-accounts">Back to Manage Accounts</a></p>
        </section>
        {footer}
    </main>
</body>
</html>"#,
        message = escape_html(message),
    )
}

pub async fn students_csv_template(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Response, Redirect> {
    require_staff_user(&state, &jar).await?;

    let body = format!(
        "{}\r\n{}\r\n",
        csv_line(&CSV_TEMPLATE_HEADER),
        csv_line(&CSV_TEMPLATE_EXAMPLE)
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                r#"attachment; filename="students_template.csv""#.to_string(),
            ),
        ],
        body,
    )
        .into_response())
}

fn render_accounts_body(
    students: &[StudentListRow],
    instructors: &[InstructorListRow],
    edit_student: Option<&StudentListRow>,
    edit_instructor: Option<&InstructorListRow>,
) -> String {
    let student_rows = students
        .iter()
        .map(|row| {
            let name = compose_full_name(
                &row.first_name,
                row.second_name.as_deref(),
                row.middle_initial.as_deref(),
                &row.last_name,
            );
            format!(
                r#"<tr>
                    <td>{student_no}</td><td>{name}</td><td>{email}</td><td>{section}</td>
                    <td>{school_year}</td><td>{active}</td>
                    <td><a href="/staff/manage-accounts?edit_type=student&edit_id={id}">Edit</a></td>
                </tr>"#,
                student_no = escape_html(&row.student_no),
                name = escape_html(&name),
                email = escape_html(&row.cca_email),
                section = escape_html(&row.section),
                school_year = escape_html(row.school_year.as_deref().unwrap_or("—")),
                active = if row.active_status { "Active" } else { "Pending" },
                id = row.id,
            )
        })
        .collect::<Vec<_>>()
        .join("");

    let instructor_rows = instructors
        .iter()
        .map(|row| {
            let name = compose_full_name(
                &row.first_name,
                row.second_name.as_deref(),
                row.middle_initial.as_deref(),
                &row.last_name,
            );
            format!(
                r#"<tr>
                    <td>{name}</td><td>{email}</td><td>{active}</td>
                    <td><a href="/staff/manage-accounts?edit_type=instructor&edit_id={id}">Edit</a></td>
                </tr>"#,
                name = escape_html(&name),
                email = escape_html(&row.cca_email),
                active = if row.active_status { "Active" } else { "Pending" },
                id = row.id,
            )
        })
        .collect::<Vec<_>>()
        .join("");

    let (student_action, student_heading, student_id_field, s) = match edit_student {
        Some(row) => (
            "update_student",
            "Edit Student",
            format!(r#"<input type="hidden" name="id" value="{}">"#, row.id),
            (
                escape_html(&row.student_no),
                escape_html(&row.cca_email),
                escape_html(&row.last_name),
                escape_html(&row.first_name),
                escape_html(row.second_name.as_deref().unwrap_or("")),
                escape_html(row.middle_initial.as_deref().unwrap_or("")),
                escape_html(&row.program),
                escape_html(&row.section),
                escape_html(row.school_year.as_deref().unwrap_or("")),
            ),
        ),
        None => (
            "add_student",
            "Add Student",
            String::new(),
            Default::default(),
        ),
    };

    let (instructor_action, instructor_heading, instructor_id_field, i) = match edit_instructor {
        Some(row) => (
            "update_instructor",
            "Edit Instructor",
            format!(r#"<input type="hidden" name="id" value="{}">"#, row.id),
            (
                escape_html(&row.cca_email),
                escape_html(&row.last_name),
                escape_html(&row.first_name),
                escape_html(row.second_name.as_deref().unwrap_or("")),
                escape_html(row.middle_initial.as_deref().unwrap_or("")),
            ),
        ),
        None => (
            "add_instructor",
            "Add Instructor",
            String::new(),
            Default::default(),
        ),
    };

    format!(
        r#"<section class="panel">
            <h2>Import Students from CSV</h2>
            <form method="post" action="/staff/manage-accounts/import" enctype="multipart/form-data" style="display:flex; gap:0.75rem; align-items:center; flex-wrap:wrap;">
                <input type="file" name="student_csv" accept=".csv">
                <button type="submit">Import CSV</button>
                <a href="/staff/manage-accounts/csv-template">Download template</a>
            </form>
        </section>
        <section class="panel">
            <h2>{student_heading}</h2>
            <form method="post" action="/staff/manage-accounts" style="display:grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); gap:0.75rem;">
                <input type="hidden" name="action" value="{student_action}">
                {student_id_field}
                <div><label>Student no.</label><input name="student_no" value="{sn}" required></div>
                <div><label>CCA email</label><input name="cca_email" type="email" value="{se}" required></div>
                <div><label>Last name</label><input name="last_name" value="{sl}" required></div>
                <div><label>First name</label><input name="first_name" value="{sf}" required></div>
                <div><label>Second name</label><input name="second_name" value="{ss}"></div>
                <div><label>Middle initial</label><input name="middle_initial" value="{sm}"></div>
                <div><label>Program</label><input name="program" value="{sp}" required></div>
                <div><label>Section</label><input name="section" value="{ssec}" required></div>
                <div><label>School year</label><input name="school_year" value="{ssy}" placeholder="2025 - 2026"></div>
                <div style="align-self:end;"><button type="submit">Save student</button></div>
            </form>
            <table>
                <thead><tr><th>Student No.</th><th>Name</th><th>Email</th><th>Section</th><th>School Year</th><th>Status</th><th></th></tr></thead>
                <tbody>{student_rows}</tbody>
            </table>
        </section>
        <section class="panel">
            <h2>{instructor_heading}</h2>
            <form method="post" action="/staff/manage-accounts" style="display:grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); gap:0.75rem;">
                <input type="hidden" name="action" value="{instructor_action}">
                {instructor_id_field}
                <div><label>CCA email</label><input name="cca_email" type="email" value="{ie}" required></div>
                <div><label>Last name</label><input name="last_name" value="{il}" required></div>
                <div><label>First name</label><input name="first_name" value="{ifn}" required></div>
                <div><label>Second name</label><input name="second_name" value="{is}"></div>
                <div><label>Middle initial</label><input name="middle_initial" value="{im}"></div>
                <div style="align-self:end;"><button type="submit">Save instructor</button></div>
            </form>
            <table>
                <thead><tr><th>Name</th><th>Email</th><th>Status</th><th></th></tr></thead>
                <tbody>{instructor_rows}</tbody>
            </table>
        </section>"#,
        sn = s.0,
        se = s.1,
        sl = s.2,
        sf = s.3,
        ss = s.4,
        sm = s.5,
        sp = s.6,
        ssec = s.7,
        ssy = s.8,
        ie = i.0,
        il = i.1,
        ifn = i.2,
        is = i.3,
        im = i.4,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn header_accepts_either_email_column() {
        let with_cca = header_fields(&[
            "student_no", "cca_email", "last_name", "first_name", "program", "section",
        ]);
        assert!(resolve_import_header(&with_cca).is_ok());

        let with_plain = header_fields(&[
            "Student_No", "Email", "Last_Name", "First_Name", "Program", "Section",
        ]);
        let header = resolve_import_header(&with_plain).unwrap();
        assert_eq!(header.email, 1);
        assert!(header.school_year.is_none());
    }

    #[test]
    fn header_reports_every_missing_column() {
        let fields = header_fields(&["student_no", "first_name"]);
        let missing = resolve_import_header(&fields).unwrap_err();
        assert!(missing.contains(&"last_name"));
        assert!(missing.contains(&"program"));
        assert!(missing.contains(&"section"));
        assert!(missing.contains(&"cca_email"));
        assert!(!missing.contains(&"student_no"));
    }

    fn full_header() -> ImportHeader {
        resolve_import_header(&header_fields(&[
            "student_no",
            "cca_email",
            "last_name",
            "first_name",
            "second_name",
            "middle_initial",
            "program",
            "section",
            "school_year",
        ]))
        .unwrap()
    }

    #[test]
    fn row_missing_last_name_is_invalid() {
        let header = full_header();
        let fields = header_fields(&[
            "22-2246", "a@cca.edu.ph", "", "Ross", "", "", "BSCS", "CS-404", "",
        ]);
        assert!(matches!(
            parse_import_row(&header, &fields),
            RowOutcome::Invalid("Missing required value(s).")
        ));
    }

    #[test]
    fn fully_blank_row_is_skipped_not_errored() {
        let header = full_header();
        let fields = header_fields(&["", "", "", "", "", "", "", "", ""]);
        assert!(matches!(parse_import_row(&header, &fields), RowOutcome::Blank));
    }

    #[test]
    fn valid_row_normalizes_email_and_optionals() {
        let header = full_header();
        let fields = header_fields(&[
            " 22-2246 ",
            "Student@CCA.edu.ph",
            "Acopio",
            "Ross Jhem",
            "",
            "P",
            "BSCS",
            "CS-404",
            "2025 - 2026",
        ]);
        let RowOutcome::Student(student) = parse_import_row(&header, &fields) else {
            panic!("expected a valid student row");
        };
        assert_eq!(student.student_no, "22-2246");
        assert_eq!(student.cca_email, "student@cca.edu.ph");
        assert_eq!(student.second_name, None);
        assert_eq!(student.middle_initial.as_deref(), Some("P"));
        assert_eq!(student.school_year.as_deref(), Some("2025 - 2026"));
    }

    #[test]
    fn short_rows_are_padded_with_empty_fields() {
        let header = full_header();
        let fields = header_fields(&["22-2246", "a@cca.edu.ph", "Acopio"]);
        assert!(matches!(
            parse_import_row(&header, &fields),
            RowOutcome::Invalid(_)
        ));
    }

    #[test]
    fn template_has_matching_header_and_example_width() {
        assert_eq!(CSV_TEMPLATE_HEADER.len(), CSV_TEMPLATE_EXAMPLE.len());
        let line = csv_line(&CSV_TEMPLATE_HEADER);
        assert!(line.starts_with("student_no,cca_email"));
    }
}
