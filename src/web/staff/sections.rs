//! Section registry and staff assignment.
//!
//! Sections are derived lazily from the distinct (section, school year)
//! pairs in the requirement ledger; each section carries at most one
//! assignment row naming an instructor and/or coordinator.

use axum::{
    extract::{Form, State},
    response::Redirect,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::web::{AppState, auth::compose_full_name, staff::require_staff_user};

/// One row of the assignment table: every known section with whoever is
/// currently assigned to it.
#[derive(sqlx::FromRow)]
pub(crate) struct SectionAssignmentRow {
    pub section_id: Uuid,
    pub section: String,
    pub school_year: String,
    pub instructor_first: Option<String>,
    pub instructor_second: Option<String>,
    pub instructor_mi: Option<String>,
    pub instructor_last: Option<String>,
    pub coordinator_first: Option<String>,
    pub coordinator_second: Option<String>,
    pub coordinator_mi: Option<String>,
    pub coordinator_last: Option<String>,
}

pub(crate) struct SectionAssignmentView {
    pub section_id: Uuid,
    pub section: String,
    pub school_year: String,
    pub instructor_name: Option<String>,
    pub coordinator_name: Option<String>,
}

pub(crate) struct StaffOption {
    pub id: Uuid,
    pub name: String,
}

pub(crate) struct AssignableStaff {
    pub instructors: Vec<StaffOption>,
    pub coordinators: Vec<StaffOption>,
}

/// Insert any (section, school year) pair present in the requirement ledger
/// but missing from the registry. Idempotent.
pub(crate) async fn sync_section_list(pool: &PgPool) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO section_list (section, school_year)
         SELECT DISTINCT section, school_year
         FROM student_requirements
         WHERE section IS NOT NULL AND section <> ''
           AND school_year IS NOT NULL AND school_year <> ''
         ON CONFLICT (section, school_year) DO NOTHING",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn fetch_section_assignments(
    pool: &PgPool,
) -> sqlx::Result<Vec<SectionAssignmentView>> {
    let rows = sqlx::query_as::<_, SectionAssignmentRow>(
        "SELECT
            sl.id AS section_id,
            sl.section,
            sl.school_year,
            pi.first_name AS instructor_first,
            pi.second_name AS instructor_second,
            pi.middle_initial AS instructor_mi,
            pi.last_name AS instructor_last,
            pc.first_name AS coordinator_first,
            pc.second_name AS coordinator_second,
            pc.middle_initial AS coordinator_mi,
            pc.last_name AS coordinator_last
        FROM section_list sl
        LEFT JOIN section_instructors si ON si.section_id = sl.id
        LEFT JOIN practicum_instructors pi ON pi.id = si.instructor_id
        LEFT JOIN practicum_coordinators pc ON pc.id = si.coordinator_id
        ORDER BY sl.school_year DESC, sl.section ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let instructor_name = row.instructor_last.as_ref().map(|last| {
                compose_full_name(
                    row.instructor_first.as_deref().unwrap_or(""),
                    row.instructor_second.as_deref(),
                    row.instructor_mi.as_deref(),
                    last,
                )
            });
            let coordinator_name = row.coordinator_last.as_ref().map(|last| {
                compose_full_name(
                    row.coordinator_first.as_deref().unwrap_or(""),
                    row.coordinator_second.as_deref(),
                    row.coordinator_mi.as_deref(),
                    last,
                )
            });
            SectionAssignmentView {
                section_id: row.section_id,
                section: row.section,
                school_year: row.school_year,
                instructor_name,
                coordinator_name,
            }
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct StaffNameRow {
    id: Uuid,
    first_name: String,
    second_name: Option<String>,
    middle_initial: Option<String>,
    last_name: String,
}

/// Active instructors and coordinators offered in the assignment dropdown.
pub(crate) async fn fetch_assignable_staff(pool: &PgPool) -> sqlx::Result<AssignableStaff> {
    let instructors = sqlx::query_as::<_, StaffNameRow>(
        "SELECT id, first_name, second_name, middle_initial, last_name
         FROM practicum_instructors
         WHERE active_status = TRUE
         ORDER BY last_name, first_name",
    )
    .fetch_all(pool)
    .await?;
    let coordinators = sqlx::query_as::<_, StaffNameRow>(
        "SELECT id, first_name, second_name, middle_initial, last_name
         FROM practicum_coordinators
         WHERE active_status = TRUE
         ORDER BY last_name, first_name",
    )
    .fetch_all(pool)
    .await?;

    let to_option = |row: StaffNameRow| StaffOption {
        id: row.id,
        name: compose_full_name(
            &row.first_name,
            row.second_name.as_deref(),
            row.middle_initial.as_deref(),
            &row.last_name,
        ),
    };

    Ok(AssignableStaff {
        instructors: instructors.into_iter().map(to_option).collect(),
        coordinators: coordinators.into_iter().map(to_option).collect(),
    })
}

/// The assignment dropdown encodes the role in a value prefix; a bare id is
/// treated as an instructor for older forms.
fn parse_staff_value(value: &str) -> (Option<&str>, Option<&str>) {
    let value = value.trim();
    if let Some(id) = value.strip_prefix("inst:") {
        (Some(id), None)
    } else if let Some(id) = value.strip_prefix("coord:") {
        (None, Some(id))
    } else if !value.is_empty() {
        (Some(value), None)
    } else {
        (None, None)
    }
}

#[derive(Deserialize)]
pub struct AssignSectionForm {
    #[serde(default)]
    pub section_id: String,
    #[serde(default)]
    pub staff: Option<String>,
}

pub async fn assign_section_staff(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<AssignSectionForm>,
) -> Result<Redirect, Redirect> {
    require_staff_user(&state, &jar).await?;

    let Ok(section_id) = Uuid::parse_str(form.section_id.trim()) else {
        return Ok(Redirect::to("/staff/manage-records?error=missing_section"));
    };

    let (instructor_raw, coordinator_raw) = parse_staff_value(form.staff.as_deref().unwrap_or(""));
    let instructor_id = instructor_raw.and_then(|id| Uuid::parse_str(id).ok());
    let coordinator_id = coordinator_raw.and_then(|id| Uuid::parse_str(id).ok());

    let pool = state.pool();
    if instructor_id.is_some() || coordinator_id.is_some() {
        let result = sqlx::query(
            "INSERT INTO section_instructors (section_id, instructor_id, coordinator_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (section_id) DO UPDATE SET
                instructor_id = EXCLUDED.instructor_id,
                coordinator_id = EXCLUDED.coordinator_id,
                assigned_at = NOW()",
        )
        .bind(section_id)
        .bind(instructor_id)
        .bind(coordinator_id)
        .execute(&pool)
        .await;

        match result {
            Ok(_) => Ok(Redirect::to("/staff/manage-records?status=assigned")),
            Err(err) => {
                error!(?err, "failed to upsert section assignment");
                Ok(Redirect::to("/staff/manage-records?error=unknown"))
            }
        }
    } else {
        match sqlx::query("DELETE FROM section_instructors WHERE section_id = $1")
            .bind(section_id)
            .execute(&pool)
            .await
        {
            Ok(_) => Ok(Redirect::to(
                "/staff/manage-records?status=assignment_removed",
            )),
            Err(err) => {
                error!(?err, "failed to remove section assignment");
                Ok(Redirect::to("/staff/manage-records?error=unknown"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_value_prefixes_select_the_role() {
        assert_eq!(parse_staff_value("inst:abc"), (Some("abc"), None));
        assert_eq!(parse_staff_value("coord:def"), (None, Some("def")));
        assert_eq!(parse_staff_value("bare-id"), (Some("bare-id"), None));
        assert_eq!(parse_staff_value(""), (None, None));
        assert_eq!(parse_staff_value("   "), (None, None));
    }
}
