mod accounts;
mod company;
mod journal;
mod profile;
mod records;
mod reports;
mod sections;

pub use accounts::{
    import_students_csv, manage_accounts, manage_accounts_action, students_csv_template,
};
pub use company::{company_checklist_mutate, company_checklist_page, company_checklist_rows};
pub use journal::{
    list_schedules, modify_schedules, update_weekly_journal_check, weekly_journal_weeks,
};
pub use profile::{remove_profile_image, staff_profile, upload_profile_image};
pub use records::{manage_records, sync_student_records, update_student_requirement};
pub use reports::{handled_section_details, handled_sections, staff_home};
pub use sections::assign_section_staff;

use axum::{Json, http::StatusCode, response::Redirect};
use axum_extra::extract::cookie::CookieJar;

use crate::web::{
    ApiMessage, AppState,
    auth::{self, Account},
    json_error,
};

/// Gate for staff-only pages. Students and anonymous callers are bounced to
/// the login page with the matching flash code.
pub async fn require_staff_user(state: &AppState, jar: &CookieJar) -> Result<Account, Redirect> {
    let Some(account) = auth::current_account(state, jar).await else {
        return Err(Redirect::to("/?error=login_required"));
    };

    if !account.role.is_staff() {
        return Err(Redirect::to("/?error=not_authorized"));
    }

    Ok(account)
}

/// JSON twin of [`require_staff_user`] for the AJAX endpoints.
pub async fn require_staff_json(
    state: &AppState,
    jar: &CookieJar,
) -> Result<Account, (StatusCode, Json<ApiMessage>)> {
    let Some(account) = auth::current_account(state, jar).await else {
        return Err(json_error(StatusCode::UNAUTHORIZED, "Unauthorized."));
    };

    if !account.role.is_staff() {
        return Err(json_error(StatusCode::UNAUTHORIZED, "Unauthorized."));
    }

    Ok(account)
}
