//! Weekly journal scheduling and submission tracking.
//!
//! Each section can be given a submission weekday; syncing materializes one
//! journal entry per student per occurrence of that weekday in the year.
//! Sync only ever inserts missing rows, so recorded submissions survive any
//! number of re-runs. Submission state is flipped by an explicit operator
//! check/uncheck; lateness is never inferred from the due date.

use axum::{
    Json,
    extract::{Form, Query, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::web::{
    ApiMessage, AppState, json_error,
    staff::require_staff_json,
};

const ALLOWED_OVERRIDE_STATUSES: [&str; 2] = ["late", "late_excused"];

fn weekday_from_iso(day: i16) -> Option<Weekday> {
    match day {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

/// Every date in `year` falling on `weekday`, in order.
fn weekday_dates_in_year(year: i32, weekday: Weekday) -> Vec<NaiveDate> {
    let Some(first_of_year) = NaiveDate::from_ymd_opt(year, 1, 1) else {
        return Vec::new();
    };
    let offset = (7 + weekday.num_days_from_monday() as i64
        - first_of_year.weekday().num_days_from_monday() as i64)
        % 7;
    let mut date = first_of_year + Duration::days(offset);

    let mut dates = Vec::with_capacity(53);
    while date.year() == year {
        dates.push(date);
        date += Duration::days(7);
    }
    dates
}

/// 1-based index of a due date's weekday within its month (June 5 is the
/// first Friday of June, June 12 the second, ...).
fn week_no_within_month(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

/// Run the journal sync for every section with a configured schedule.
pub(crate) async fn sync_weekly_journal(pool: &PgPool, year: i32) -> sqlx::Result<()> {
    let schedules: Vec<(String, i16)> =
        sqlx::query_as("SELECT section, submission_day FROM submission_schedules")
            .fetch_all(pool)
            .await?;

    for (section, submission_day) in schedules {
        sync_section_journal(pool, year, &section, submission_day).await?;
    }
    Ok(())
}

/// Sync one section if it has a schedule; silently a no-op otherwise.
pub(crate) async fn sync_section_journal_if_scheduled(
    pool: &PgPool,
    year: i32,
    section: &str,
) -> sqlx::Result<()> {
    let submission_day: Option<i16> =
        sqlx::query_scalar("SELECT submission_day FROM submission_schedules WHERE section = $1")
            .bind(section)
            .fetch_optional(pool)
            .await?;

    if let Some(day) = submission_day {
        sync_section_journal(pool, year, section, day).await?;
    }
    Ok(())
}

/// Insert any missing (student, due date) entries for the section. Existing
/// rows, including their submission data, are left untouched.
async fn sync_section_journal(
    pool: &PgPool,
    year: i32,
    section: &str,
    submission_day: i16,
) -> sqlx::Result<()> {
    let Some(weekday) = weekday_from_iso(submission_day) else {
        return Ok(());
    };

    let dates = weekday_dates_in_year(year, weekday);
    let months: Vec<i32> = dates.iter().map(|date| date.month() as i32).collect();
    let week_nos: Vec<i32> = dates
        .iter()
        .map(|date| week_no_within_month(*date) as i32)
        .collect();

    sqlx::query(
        "INSERT INTO weekly_journal
            (student_id, section, year, month, week_no, due_date, submission_day)
         SELECT s.id, $1, $2, d.month, d.week_no, d.due_date, $3
         FROM students s
         CROSS JOIN UNNEST($4::date[], $5::int[], $6::int[]) AS d(due_date, month, week_no)
         WHERE s.section = $1
         ON CONFLICT (student_id, section, year, due_date) DO NOTHING",
    )
    .bind(section)
    .bind(year)
    .bind(submission_day)
    .bind(&dates)
    .bind(&months)
    .bind(&week_nos)
    .execute(pool)
    .await?;

    Ok(())
}

#[derive(Serialize)]
struct ScheduleItem {
    section: String,
    submission_day: i16,
}

pub async fn list_schedules(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ApiMessage>)> {
    require_staff_json(&state, &jar).await?;

    let rows: Vec<(String, i16)> = sqlx::query_as(
        "SELECT section, submission_day FROM submission_schedules ORDER BY section",
    )
    .fetch_all(state.pool_ref())
    .await
    .map_err(|err| {
        error!(?err, "failed to list submission schedules");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
    })?;

    let schedules: Vec<ScheduleItem> = rows
        .into_iter()
        .map(|(section, submission_day)| ScheduleItem {
            section,
            submission_day,
        })
        .collect();

    Ok(Json(json!({ "ok": true, "schedules": schedules })))
}

#[derive(Deserialize)]
pub struct ScheduleForm {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub submission_day: Option<String>,
}

pub async fn modify_schedules(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ScheduleForm>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ApiMessage>)> {
    require_staff_json(&state, &jar).await?;

    let section = form.section.trim().to_string();
    let pool = state.pool();
    let year = Utc::now().year();

    match form.action.as_str() {
        "add" => {
            let submission_day: i16 = form
                .submission_day
                .as_deref()
                .and_then(|value| value.trim().parse().ok())
                .filter(|day| (1..=7).contains(day))
                .ok_or_else(|| {
                    json_error(StatusCode::BAD_REQUEST, "Section and day required.")
                })?;
            if section.is_empty() {
                return Err(json_error(StatusCode::BAD_REQUEST, "Section and day required."));
            }

            sqlx::query(
                "INSERT INTO submission_schedules (section, submission_day)
                 VALUES ($1, $2)
                 ON CONFLICT (section) DO UPDATE SET submission_day = EXCLUDED.submission_day",
            )
            .bind(&section)
            .bind(submission_day)
            .execute(&pool)
            .await
            .map_err(|err| {
                error!(?err, "failed to upsert submission schedule");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
            })?;

            sync_section_journal(&pool, year, &section, submission_day)
                .await
                .map_err(|err| {
                    error!(?err, "failed to sync weekly journal after schedule change");
                    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
                })?;

            Ok(Json(json!({ "ok": true })))
        }
        "delete" => {
            if section.is_empty() {
                return Err(json_error(StatusCode::BAD_REQUEST, "Section required."));
            }

            sqlx::query("DELETE FROM submission_schedules WHERE section = $1")
                .bind(&section)
                .execute(&pool)
                .await
                .map_err(|err| {
                    error!(?err, "failed to delete submission schedule");
                    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
                })?;
            sqlx::query("DELETE FROM weekly_journal WHERE section = $1 AND year = $2")
                .bind(&section)
                .bind(year)
                .execute(&pool)
                .await
                .map_err(|err| {
                    error!(?err, "failed to delete weekly journal entries");
                    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
                })?;

            Ok(Json(json!({ "ok": true })))
        }
        _ => Err(json_error(StatusCode::BAD_REQUEST, "Invalid request.")),
    }
}

#[derive(Deserialize)]
pub struct WeeksQuery {
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub month: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
}

#[derive(sqlx::FromRow)]
struct WeekRow {
    id: Uuid,
    student_no: String,
    first_name: String,
    last_name: String,
    week_no: i32,
    due_date: NaiveDate,
    submitted_at: Option<DateTime<Utc>>,
    status: Option<String>,
    submission_day: i16,
    status_note: Option<String>,
}

pub async fn weekly_journal_weeks(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<WeeksQuery>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ApiMessage>)> {
    require_staff_json(&state, &jar).await?;

    let section = query
        .section
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let month: Option<i32> = query.month.as_deref().and_then(|v| v.trim().parse().ok());
    let year: Option<i32> = query.year.as_deref().and_then(|v| v.trim().parse().ok());
    let (Some(section), Some(month), Some(year)) = (section, month, year) else {
        return Err(json_error(StatusCode::BAD_REQUEST, "Missing parameters."));
    };

    let pool = state.pool();
    sync_section_journal_if_scheduled(&pool, year, section)
        .await
        .map_err(|err| {
            error!(?err, "failed to sync weekly journal before listing");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
        })?;

    let rows = sqlx::query_as::<_, WeekRow>(
        "SELECT wj.id, s.student_no, s.first_name, s.last_name, wj.week_no, wj.due_date,
                wj.submitted_at, wj.status, wj.submission_day, wj.status_note
         FROM weekly_journal wj
         JOIN students s ON s.id = wj.student_id
         WHERE wj.section = $1 AND wj.month = $2 AND wj.year = $3
         ORDER BY wj.week_no, s.last_name, s.first_name",
    )
    .bind(section)
    .bind(month)
    .bind(year)
    .fetch_all(&pool)
    .await
    .map_err(|err| {
        error!(?err, "failed to list weekly journal entries");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
    })?;

    let weeks: Vec<serde_json::Value> = rows
        .into_iter()
        .map(|row| {
            json!({
                "id": row.id,
                "student_no": row.student_no,
                "student_name": format!("{} {}", row.first_name, row.last_name),
                "week_no": row.week_no,
                "due_date": row.due_date.to_string(),
                "submitted_at": row.submitted_at.map(|ts| ts.to_rfc3339()),
                "status": row.status,
                "submission_day": row.submission_day,
                "status_note": row.status_note,
            })
        })
        .collect();

    Ok(Json(json!({ "ok": true, "weeks": weeks })))
}

#[derive(Deserialize)]
pub struct JournalCheckForm {
    #[serde(default)]
    pub entry_id: String,
    #[serde(default)]
    pub checked: Option<String>,
    #[serde(default)]
    pub status_override: Option<String>,
    #[serde(default)]
    pub status_note: Option<String>,
}

pub async fn update_weekly_journal_check(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<JournalCheckForm>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ApiMessage>)> {
    require_staff_json(&state, &jar).await?;

    let Ok(entry_id) = Uuid::parse_str(form.entry_id.trim()) else {
        return Err(json_error(StatusCode::BAD_REQUEST, "Missing parameters."));
    };
    let Some(checked) = form.checked.as_deref() else {
        return Err(json_error(StatusCode::BAD_REQUEST, "Missing parameters."));
    };

    let status_note = form
        .status_note
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let override_status = form
        .status_override
        .as_deref()
        .filter(|status| ALLOWED_OVERRIDE_STATUSES.contains(status));

    let pool = state.pool();
    let result = if checked == "true" {
        if let Some(status) = override_status {
            sqlx::query(
                "UPDATE weekly_journal
                 SET submitted_at = NOW(), status = $1, status_override = TRUE, status_note = $2
                 WHERE id = $3",
            )
            .bind(status)
            .bind(status_note)
            .bind(entry_id)
            .execute(&pool)
            .await
        } else {
            sqlx::query(
                "UPDATE weekly_journal
                 SET submitted_at = NOW(), status = NULL, status_override = FALSE, status_note = NULL
                 WHERE id = $1",
            )
            .bind(entry_id)
            .execute(&pool)
            .await
        }
    } else {
        sqlx::query(
            "UPDATE weekly_journal
             SET submitted_at = NULL, status = NULL, status_override = FALSE, status_note = NULL
             WHERE id = $1",
        )
        .bind(entry_id)
        .execute(&pool)
        .await
    };

    match result {
        Ok(outcome) if outcome.rows_affected() == 0 => {
            return Err(json_error(StatusCode::NOT_FOUND, "Journal entry not found."));
        }
        Ok(_) => {}
        Err(err) => {
            error!(?err, "failed to update weekly journal entry");
            return Err(json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong."));
        }
    }

    let row: (Option<DateTime<Utc>>, Option<String>, Option<String>) = sqlx::query_as(
        "SELECT submitted_at, status, status_note FROM weekly_journal WHERE id = $1",
    )
    .bind(entry_id)
    .fetch_one(&pool)
    .await
    .map_err(|err| {
        error!(?err, "failed to read back weekly journal entry");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
    })?;

    Ok(Json(json!({
        "ok": true,
        "submitted_at": row.0.map(|ts| ts.to_rfc3339()),
        "status": row.1,
        "status_note": row.2,
    })))
}

/// One journal row as it feeds the section-detail matrix.
#[derive(sqlx::FromRow)]
pub(crate) struct JournalEntryRow {
    pub student_id: Uuid,
    pub week_no: i32,
    pub due_date: NaiveDate,
    pub submitted_at: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub status_note: Option<String>,
}

#[derive(Serialize, Clone, PartialEq, Debug)]
pub(crate) struct MatrixCell {
    pub submitted: bool,
    pub status: String,
    pub note: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct MatrixColumn {
    pub label: String,
    pub due_date: NaiveDate,
    pub week_no: i32,
}

#[derive(Serialize)]
pub(crate) struct MatrixRow {
    pub student_no: String,
    pub name: String,
    pub cells: Vec<Option<MatrixCell>>,
}

#[derive(Serialize)]
pub(crate) struct JournalMatrix {
    pub columns: Vec<MatrixColumn>,
    pub rows: Vec<MatrixRow>,
}

/// Roster entry handed to the matrix builder.
pub(crate) struct RosterStudent {
    pub student_id: Uuid,
    pub student_no: String,
    pub name: String,
}

/// Collapse journal entries into a (due date, week) × student grid. Columns
/// are the distinct (due_date, week_no) pairs in due-date order; a missing
/// entry leaves a null cell, which should not occur after a sync but is
/// tolerated.
pub(crate) fn build_journal_matrix(
    students: &[RosterStudent],
    entries: &[JournalEntryRow],
) -> JournalMatrix {
    let mut columns: Vec<MatrixColumn> = Vec::new();
    for entry in entries {
        let exists = columns
            .iter()
            .any(|column| column.due_date == entry.due_date && column.week_no == entry.week_no);
        if !exists {
            columns.push(MatrixColumn {
                label: format!("Week {} · {}", entry.week_no, entry.due_date.format("%b %d")),
                due_date: entry.due_date,
                week_no: entry.week_no,
            });
        }
    }
    columns.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.week_no.cmp(&b.week_no)));

    let rows = students
        .iter()
        .map(|student| {
            let cells = columns
                .iter()
                .map(|column| {
                    entries
                        .iter()
                        .find(|entry| {
                            entry.student_id == student.student_id
                                && entry.due_date == column.due_date
                                && entry.week_no == column.week_no
                        })
                        .map(|entry| MatrixCell {
                            submitted: entry.submitted_at.is_some(),
                            status: entry.status.clone().unwrap_or_else(|| {
                                if entry.submitted_at.is_some() {
                                    "passed".to_string()
                                } else {
                                    "pending".to_string()
                                }
                            }),
                            note: entry.status_note.clone(),
                        })
                })
                .collect();
            MatrixRow {
                student_no: student.student_no.clone(),
                name: student.name.clone(),
                cells,
            }
        })
        .collect();

    JournalMatrix { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fridays_of_2026_start_and_end_inside_the_year() {
        let fridays = weekday_dates_in_year(2026, Weekday::Fri);
        assert_eq!(fridays.first().copied(), NaiveDate::from_ymd_opt(2026, 1, 2));
        assert_eq!(fridays.last().copied(), NaiveDate::from_ymd_opt(2026, 12, 25));
        assert!(fridays.iter().all(|date| date.weekday() == Weekday::Fri));
        assert_eq!(fridays.len(), 52);
    }

    #[test]
    fn june_2026_has_four_fridays() {
        let fridays: Vec<NaiveDate> = weekday_dates_in_year(2026, Weekday::Fri)
            .into_iter()
            .filter(|date| date.month() == 6)
            .collect();
        let expected: Vec<NaiveDate> = [5, 12, 19, 26]
            .iter()
            .map(|day| NaiveDate::from_ymd_opt(2026, 6, *day).unwrap())
            .collect();
        assert_eq!(fridays, expected);
    }

    #[test]
    fn week_numbers_restart_each_month() {
        assert_eq!(week_no_within_month(NaiveDate::from_ymd_opt(2026, 6, 5).unwrap()), 1);
        assert_eq!(week_no_within_month(NaiveDate::from_ymd_opt(2026, 6, 12).unwrap()), 2);
        assert_eq!(week_no_within_month(NaiveDate::from_ymd_opt(2026, 6, 26).unwrap()), 4);
        assert_eq!(week_no_within_month(NaiveDate::from_ymd_opt(2026, 7, 3).unwrap()), 1);
    }

    #[test]
    fn first_weekday_on_january_first_is_included() {
        // 2027-01-01 is a Friday.
        let fridays = weekday_dates_in_year(2027, Weekday::Fri);
        assert_eq!(fridays.first().copied(), NaiveDate::from_ymd_opt(2027, 1, 1));
    }

    #[test]
    fn iso_weekday_mapping_is_monday_based() {
        assert_eq!(weekday_from_iso(1), Some(Weekday::Mon));
        assert_eq!(weekday_from_iso(5), Some(Weekday::Fri));
        assert_eq!(weekday_from_iso(7), Some(Weekday::Sun));
        assert_eq!(weekday_from_iso(0), None);
        assert_eq!(weekday_from_iso(8), None);
    }

    fn entry(
        student_id: Uuid,
        due: (i32, u32, u32),
        week_no: i32,
        submitted: bool,
        status: Option<&str>,
        note: Option<&str>,
    ) -> JournalEntryRow {
        JournalEntryRow {
            student_id,
            week_no,
            due_date: NaiveDate::from_ymd_opt(due.0, due.1, due.2).unwrap(),
            submitted_at: submitted.then(|| Utc.timestamp_opt(1_750_000_000, 0).unwrap()),
            status: status.map(str::to_string),
            status_note: note.map(str::to_string),
        }
    }

    #[test]
    fn matrix_derives_status_and_tolerates_gaps() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let students = vec![
            RosterStudent {
                student_id: alice,
                student_no: "22-0001".to_string(),
                name: "Alice Reyes".to_string(),
            },
            RosterStudent {
                student_id: bob,
                student_no: "22-0002".to_string(),
                name: "Bob Santos".to_string(),
            },
        ];
        let entries = vec![
            entry(alice, (2026, 6, 5), 1, true, None, None),
            entry(alice, (2026, 6, 12), 2, true, Some("late"), Some("traffic")),
            entry(bob, (2026, 6, 5), 1, false, None, None),
            // Bob has no entry for June 12.
        ];

        let matrix = build_journal_matrix(&students, &entries);
        assert_eq!(matrix.columns.len(), 2);
        assert_eq!(matrix.columns[0].week_no, 1);
        assert_eq!(matrix.rows.len(), 2);

        let alice_cells = &matrix.rows[0].cells;
        assert_eq!(alice_cells[0].as_ref().unwrap().status, "passed");
        assert!(alice_cells[0].as_ref().unwrap().submitted);
        assert_eq!(alice_cells[1].as_ref().unwrap().status, "late");
        assert_eq!(alice_cells[1].as_ref().unwrap().note.as_deref(), Some("traffic"));

        let bob_cells = &matrix.rows[1].cells;
        assert_eq!(bob_cells[0].as_ref().unwrap().status, "pending");
        assert!(!bob_cells[0].as_ref().unwrap().submitted);
        assert!(bob_cells[1].is_none());
    }

    #[test]
    fn matrix_columns_are_sorted_by_due_date() {
        let student = Uuid::new_v4();
        let students = vec![RosterStudent {
            student_id: student,
            student_no: "22-0001".to_string(),
            name: "Alice Reyes".to_string(),
        }];
        let entries = vec![
            entry(student, (2026, 6, 12), 2, false, None, None),
            entry(student, (2026, 6, 5), 1, false, None, None),
        ];

        let matrix = build_journal_matrix(&students, &entries);
        assert_eq!(
            matrix.columns[0].due_date,
            NaiveDate::from_ymd_opt(2026, 6, 5).unwrap()
        );
        assert_eq!(
            matrix.columns[1].due_date,
            NaiveDate::from_ymd_opt(2026, 6, 12).unwrap()
        );
    }
}
