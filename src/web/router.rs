use axum::{
    Router,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};

use crate::web::{AppState, auth, codes, staff, student};

const ROBOTS_TXT_BODY: &str = include_str!("../../robots.txt");

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(auth::login_page))
        .route("/login", post(auth::process_login))
        .route("/logout", post(auth::logout))
        .route("/healthz", get(healthz))
        .route("/robots.txt", get(robots_txt))
        .route(
            "/activate",
            get(codes::activation_page).post(codes::process_activation),
        )
        .route(
            "/forgot-password",
            get(codes::forgot_password_page).post(codes::process_forgot_password),
        )
        .route(
            "/change-password",
            get(auth::change_password_page).post(auth::process_change_password),
        )
        .route("/student", get(student::student_home))
        .route("/staff", get(staff::staff_home))
        .route("/staff/manage-records", get(staff::manage_records))
        .route(
            "/staff/manage-records/update",
            post(staff::update_student_requirement),
        )
        .route("/staff/manage-records/sync", post(staff::sync_student_records))
        .route(
            "/staff/section-instructors",
            post(staff::assign_section_staff),
        )
        .route(
            "/staff/schedules",
            get(staff::list_schedules).post(staff::modify_schedules),
        )
        .route("/staff/weekly-journal/weeks", get(staff::weekly_journal_weeks))
        .route(
            "/staff/weekly-journal/check",
            post(staff::update_weekly_journal_check),
        )
        .route(
            "/staff/company-checklist",
            get(staff::company_checklist_page),
        )
        .route(
            "/staff/company-checklist/data",
            get(staff::company_checklist_rows).post(staff::company_checklist_mutate),
        )
        .route(
            "/staff/manage-accounts",
            get(staff::manage_accounts).post(staff::manage_accounts_action),
        )
        .route(
            "/staff/manage-accounts/import",
            post(staff::import_students_csv),
        )
        .route(
            "/staff/manage-accounts/csv-template",
            get(staff::students_csv_template),
        )
        .route("/staff/handled-sections", get(staff::handled_sections))
        .route(
            "/staff/handled-sections/:section_id/details",
            get(staff::handled_section_details),
        )
        .route("/staff/profile", get(staff::staff_profile))
        .route("/staff/profile/upload", post(staff::upload_profile_image))
        .route("/staff/profile/remove", post(staff::remove_profile_image))
        .with_state(state)
}

async fn robots_txt() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        ROBOTS_TXT_BODY,
    )
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
