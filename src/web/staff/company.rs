//! Company approval checklist: an independent list of companies with four
//! approval stages, edited wholesale from a JSON table UI.

use std::borrow::Cow;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::error;
use uuid::Uuid;

use crate::web::{
    ApiMessage, AppState, json_error,
    staff::{require_staff_json, require_staff_user},
    templates::{self, StaffPageLayout},
};

const SELECT_COLUMNS: &str = "id, company_name, \
     city_resolution_checked, city_resolution_passed_at, city_resolution_status, city_resolution_returned_at, \
     company_signing_checked, company_signing_passed_at, \
     office_president_checked, office_president_passed_at, \
     processed_notarized_checked, processed_notarized_passed_at";

#[derive(sqlx::FromRow)]
struct CompanyRow {
    id: Uuid,
    company_name: String,
    city_resolution_checked: bool,
    city_resolution_passed_at: Option<DateTime<Utc>>,
    city_resolution_status: Option<String>,
    city_resolution_returned_at: Option<DateTime<Utc>>,
    company_signing_checked: bool,
    company_signing_passed_at: Option<DateTime<Utc>>,
    office_president_checked: bool,
    office_president_passed_at: Option<DateTime<Utc>>,
    processed_notarized_checked: bool,
    processed_notarized_passed_at: Option<DateTime<Utc>>,
}

fn timestamp_or_empty(value: Option<DateTime<Utc>>) -> String {
    value.map(|ts| ts.to_rfc3339()).unwrap_or_default()
}

fn serialize_row(row: &CompanyRow) -> Value {
    json!({
        "id": row.id,
        "companyName": row.company_name,
        "cityResolution": {
            "checked": row.city_resolution_checked,
            "passedAt": timestamp_or_empty(row.city_resolution_passed_at),
            "approval": row.city_resolution_status.clone().unwrap_or_default(),
            "returnedIn": timestamp_or_empty(row.city_resolution_returned_at),
        },
        "companySigning": {
            "checked": row.company_signing_checked,
            "passedAt": timestamp_or_empty(row.company_signing_passed_at),
        },
        "officePresident": {
            "checked": row.office_president_checked,
            "passedAt": timestamp_or_empty(row.office_president_passed_at),
        },
        "processedNotarized": {
            "checked": row.processed_notarized_checked,
            "passedAt": timestamp_or_empty(row.processed_notarized_passed_at),
        },
    })
}

/// Checked flags arrive as whatever the table UI last serialized; accept the
/// usual truthy spellings.
fn to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => {
            matches!(text.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
        }
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(false),
        _ => false,
    }
}

/// Lenient ISO-8601 parsing: full RFC 3339, a trailing `Z`, a naive
/// datetime, or a bare date (taken as midnight UTC).
fn parse_iso_datetime(value: Option<&str>) -> Option<DateTime<Utc>> {
    let text = value?.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(parsed.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct IncomingStage {
    checked: Value,
    passed_at: Option<String>,
    approval: Option<String>,
    returned_in: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct IncomingRow {
    company_name: Option<String>,
    city_resolution: IncomingStage,
    company_signing: IncomingStage,
    office_president: IncomingStage,
    processed_notarized: IncomingStage,
}

/// Server-side shape of a checklist update after normalization.
#[derive(Debug, PartialEq)]
struct NormalizedChecklist {
    company_name: String,
    city_checked: bool,
    city_passed_at: Option<DateTime<Utc>>,
    city_status: Option<String>,
    city_returned_at: Option<DateTime<Utc>>,
    signing_checked: bool,
    signing_passed_at: Option<DateTime<Utc>>,
    office_checked: bool,
    office_passed_at: Option<DateTime<Utc>>,
    notarized_checked: bool,
    notarized_passed_at: Option<DateTime<Utc>>,
}

/// An unchecked stage loses its timestamp/status fields no matter what the
/// client sent; the city-resolution return date only survives while the
/// approval is "approved".
fn normalize(row: &IncomingRow) -> NormalizedChecklist {
    let city_checked = to_bool(&row.city_resolution.checked);
    let city_status = if city_checked {
        row.city_resolution
            .approval
            .as_deref()
            .map(|status| status.trim().to_ascii_lowercase())
            .filter(|status| status == "pending" || status == "approved")
    } else {
        None
    };
    let city_passed_at = if city_checked {
        parse_iso_datetime(row.city_resolution.passed_at.as_deref())
    } else {
        None
    };
    let city_returned_at = if city_checked && city_status.as_deref() == Some("approved") {
        parse_iso_datetime(row.city_resolution.returned_in.as_deref())
    } else {
        None
    };

    let signing_checked = to_bool(&row.company_signing.checked);
    let office_checked = to_bool(&row.office_president.checked);
    let notarized_checked = to_bool(&row.processed_notarized.checked);

    NormalizedChecklist {
        company_name: row
            .company_name
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        city_checked,
        city_passed_at,
        city_status,
        city_returned_at,
        signing_checked,
        signing_passed_at: signing_checked
            .then(|| parse_iso_datetime(row.company_signing.passed_at.as_deref()))
            .flatten(),
        office_checked,
        office_passed_at: office_checked
            .then(|| parse_iso_datetime(row.office_president.passed_at.as_deref()))
            .flatten(),
        notarized_checked,
        notarized_passed_at: notarized_checked
            .then(|| parse_iso_datetime(row.processed_notarized.passed_at.as_deref()))
            .flatten(),
    }
}

pub async fn company_checklist_page(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Html<String>, Redirect> {
    let account = require_staff_user(&state, &jar).await?;

    let body_html = r#"<section class="panel" style="overflow-x:auto;">
            <h2>Company Approval Checklist</h2>
            <p class="note">Each stage records when it was completed; the city resolution also tracks approval and return.</p>
            <button type="button" id="company-add">Add company</button>
            <table>
                <thead>
                    <tr>
                        <th>Company</th>
                        <th>City Resolution</th>
                        <th>Company Signing</th>
                        <th>Office of the President</th>
                        <th>Processed &amp; Notarized</th>
                        <th></th>
                    </tr>
                </thead>
                <tbody id="company-rows"><tr><td colspan="6" class="note">Loading…</td></tr></tbody>
            </table>
        </section>"#;

    let name = account.full_name();
    Ok(Html(templates::render_staff_page(StaffPageLayout {
        meta_title: "Company Checklist",
        heading: "Company Checklist",
        account_name: &name,
        role: account.role,
        active_path: "/staff/company-checklist",
        flash_html: Cow::Borrowed(""),
        body_html: Cow::Borrowed(body_html),
        body_scripts: vec![Cow::Borrowed(COMPANY_SCRIPT)],
    })))
}

pub async fn company_checklist_rows(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Value>, (StatusCode, Json<ApiMessage>)> {
    require_staff_json(&state, &jar).await?;

    let sql = format!("SELECT {SELECT_COLUMNS} FROM company_checklist ORDER BY created_at ASC");
    let rows = sqlx::query_as::<_, CompanyRow>(&sql)
        .fetch_all(state.pool_ref())
        .await
        .map_err(|err| {
            error!(?err, "failed to list company checklist rows");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
        })?;

    Ok(Json(json!({
        "ok": true,
        "rows": rows.iter().map(serialize_row).collect::<Vec<_>>(),
    })))
}

#[derive(Deserialize)]
pub struct ChecklistAction {
    #[serde(default)]
    action: String,
    #[serde(default)]
    row_id: Option<Uuid>,
    #[serde(default)]
    row: Option<IncomingRow>,
}

pub async fn company_checklist_mutate(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<ChecklistAction>,
) -> Result<Json<Value>, (StatusCode, Json<ApiMessage>)> {
    require_staff_json(&state, &jar).await?;
    let pool = state.pool();

    match payload.action.as_str() {
        "add" => {
            let sql = format!(
                "INSERT INTO company_checklist (company_name) VALUES ('') RETURNING {SELECT_COLUMNS}"
            );
            let row = sqlx::query_as::<_, CompanyRow>(&sql)
                .fetch_one(&pool)
                .await
                .map_err(|err| {
                    error!(?err, "failed to add company checklist row");
                    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
                })?;
            Ok(Json(json!({ "ok": true, "row": serialize_row(&row) })))
        }
        "delete" => {
            let row_id = payload
                .row_id
                .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "Missing row_id."))?;
            let result = sqlx::query("DELETE FROM company_checklist WHERE id = $1")
                .bind(row_id)
                .execute(&pool)
                .await
                .map_err(|err| {
                    error!(?err, "failed to delete company checklist row");
                    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
                })?;
            if result.rows_affected() == 0 {
                return Err(json_error(StatusCode::NOT_FOUND, "Checklist row not found."));
            }
            Ok(Json(json!({ "ok": true })))
        }
        "update" => {
            let row_id = payload
                .row_id
                .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "Missing row_id."))?;
            let incoming = payload.row.unwrap_or_default();
            let normalized = normalize(&incoming);

            let sql = format!(
                "UPDATE company_checklist SET
                    company_name = $1,
                    city_resolution_checked = $2,
                    city_resolution_passed_at = $3,
                    city_resolution_status = $4,
                    city_resolution_returned_at = $5,
                    company_signing_checked = $6,
                    company_signing_passed_at = $7,
                    office_president_checked = $8,
                    office_president_passed_at = $9,
                    processed_notarized_checked = $10,
                    processed_notarized_passed_at = $11,
                    updated_at = NOW()
                 WHERE id = $12
                 RETURNING {SELECT_COLUMNS}"
            );
            let updated = sqlx::query_as::<_, CompanyRow>(&sql)
                .bind(&normalized.company_name)
                .bind(normalized.city_checked)
                .bind(normalized.city_passed_at)
                .bind(normalized.city_status.as_deref())
                .bind(normalized.city_returned_at)
                .bind(normalized.signing_checked)
                .bind(normalized.signing_passed_at)
                .bind(normalized.office_checked)
                .bind(normalized.office_passed_at)
                .bind(normalized.notarized_checked)
                .bind(normalized.notarized_passed_at)
                .bind(row_id)
                .fetch_optional(&pool)
                .await
                .map_err(|err| {
                    error!(?err, "failed to update company checklist row");
                    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
                })?;

            let Some(updated) = updated else {
                return Err(json_error(StatusCode::NOT_FOUND, "Checklist row not found."));
            };
            Ok(Json(json!({ "ok": true, "row": serialize_row(&updated) })))
        }
        _ => Err(json_error(StatusCode::BAD_REQUEST, "Unknown action.")),
    }
}

const COMPANY_SCRIPT: &str = r#"<script>
(function () {
    const tbody = document.getElementById("company-rows");

    function callData(payload) {
        return fetch("/staff/company-checklist/data", {
            method: "POST",
            headers: {
                "Content-Type": "application/json",
                "X-Requested-With": "XMLHttpRequest",
            },
            body: JSON.stringify(payload),
        }).then((resp) => resp.json());
    }

    function stageCell(row, key, withApproval) {
        const stage = row[key];
        let html = '<label><input type="checkbox" data-stage="' + key + '" ' + (stage.checked ? "checked" : "") + "> Done</label>";
        html += '<input type="date" data-stage-date="' + key + '" value="' + (stage.passedAt ? stage.passedAt.slice(0, 10) : "") + '" style="margin-top:0.25rem; display:block;">';
        if (withApproval) {
            html += '<select data-stage-approval="' + key + '" style="margin-top:0.25rem; display:block;">' +
                '<option value=""' + (stage.approval ? "" : " selected") + '>—</option>' +
                '<option value="pending"' + (stage.approval === "pending" ? " selected" : "") + '>Pending</option>' +
                '<option value="approved"' + (stage.approval === "approved" ? " selected" : "") + '>Approved</option>' +
                "</select>";
            html += '<input type="date" data-stage-returned="' + key + '" value="' + (stage.returnedIn ? stage.returnedIn.slice(0, 10) : "") + '" style="margin-top:0.25rem; display:block;">';
        }
        return "<td>" + html + "</td>";
    }

    function readStage(tr, key, withApproval) {
        const stage = {
            checked: tr.querySelector('[data-stage="' + key + '"]').checked,
            passedAt: tr.querySelector('[data-stage-date="' + key + '"]').value,
        };
        if (withApproval) {
            stage.approval = tr.querySelector('[data-stage-approval="' + key + '"]').value;
            stage.returnedIn = tr.querySelector('[data-stage-returned="' + key + '"]').value;
        }
        return stage;
    }

    function renderRows(rows) {
        if (!rows.length) {
            tbody.innerHTML = '<tr><td colspan="6" class="note">No companies yet.</td></tr>';
            return;
        }
        tbody.innerHTML = rows.map((row) =>
            '<tr data-row-id="' + row.id + '">' +
            '<td><input data-company-name value="' + row.companyName.replace(/"/g, "&quot;") + '"></td>' +
            stageCell(row, "cityResolution", true) +
            stageCell(row, "companySigning", false) +
            stageCell(row, "officePresident", false) +
            stageCell(row, "processedNotarized", false) +
            '<td><button type="button" data-save>Save</button> <button type="button" class="quiet" data-delete>Delete</button></td>' +
            "</tr>"
        ).join("");

        tbody.querySelectorAll("tr[data-row-id]").forEach((tr) => {
            tr.querySelector("[data-save]").addEventListener("click", () => {
                callData({
                    action: "update",
                    row_id: tr.dataset.rowId,
                    row: {
                        companyName: tr.querySelector("[data-company-name]").value,
                        cityResolution: readStage(tr, "cityResolution", true),
                        companySigning: readStage(tr, "companySigning", false),
                        officePresident: readStage(tr, "officePresident", false),
                        processedNotarized: readStage(tr, "processedNotarized", false),
                    },
                }).then((data) => {
                    if (!data.ok) { alert(data.message || "Save failed."); }
                    load();
                });
            });
            tr.querySelector("[data-delete]").addEventListener("click", () => {
                callData({ action: "delete", row_id: tr.dataset.rowId }).then(load);
            });
        });
    }

    function load() {
        fetch("/staff/company-checklist/data", { headers: { "X-Requested-With": "XMLHttpRequest" } })
            .then((resp) => resp.json())
            .then((data) => { if (data.ok) { renderRows(data.rows); } });
    }

    document.getElementById("company-add").addEventListener("click", () => {
        callData({ action: "add" }).then(load);
    });

    load();
})();
</script>"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(checked: Value, passed_at: Option<&str>) -> IncomingStage {
        IncomingStage {
            checked,
            passed_at: passed_at.map(str::to_string),
            approval: None,
            returned_in: None,
        }
    }

    #[test]
    fn unchecking_city_resolution_clears_dependent_fields() {
        let row = IncomingRow {
            company_name: Some("Acme Manufacturing".to_string()),
            city_resolution: IncomingStage {
                checked: Value::Bool(false),
                passed_at: Some("2026-06-05T10:00:00Z".to_string()),
                approval: Some("approved".to_string()),
                returned_in: Some("2026-06-10".to_string()),
            },
            ..IncomingRow::default()
        };

        let normalized = normalize(&row);
        assert!(!normalized.city_checked);
        assert_eq!(normalized.city_passed_at, None);
        assert_eq!(normalized.city_status, None);
        assert_eq!(normalized.city_returned_at, None);
    }

    #[test]
    fn returned_date_requires_approved_status() {
        let mut row = IncomingRow {
            city_resolution: IncomingStage {
                checked: Value::Bool(true),
                passed_at: Some("2026-06-05".to_string()),
                approval: Some("pending".to_string()),
                returned_in: Some("2026-06-10".to_string()),
            },
            ..IncomingRow::default()
        };
        assert_eq!(normalize(&row).city_returned_at, None);

        row.city_resolution.approval = Some("Approved".to_string());
        let normalized = normalize(&row);
        assert_eq!(normalized.city_status.as_deref(), Some("approved"));
        assert!(normalized.city_returned_at.is_some());
    }

    #[test]
    fn invalid_approval_values_are_dropped() {
        let row = IncomingRow {
            city_resolution: IncomingStage {
                checked: Value::Bool(true),
                passed_at: None,
                approval: Some("maybe".to_string()),
                returned_in: None,
            },
            ..IncomingRow::default()
        };
        assert_eq!(normalize(&row).city_status, None);
    }

    #[test]
    fn unchecked_simple_stage_loses_its_timestamp() {
        let row = IncomingRow {
            company_signing: stage(Value::Bool(false), Some("2026-06-05T10:00:00Z")),
            office_president: stage(Value::String("true".to_string()), Some("2026-06-05T10:00:00Z")),
            ..IncomingRow::default()
        };
        let normalized = normalize(&row);
        assert_eq!(normalized.signing_passed_at, None);
        assert!(normalized.office_checked);
        assert!(normalized.office_passed_at.is_some());
    }

    #[test]
    fn checked_flag_accepts_common_truthy_spellings() {
        assert!(to_bool(&Value::Bool(true)));
        assert!(to_bool(&Value::String("YES".to_string())));
        assert!(to_bool(&Value::String("on".to_string())));
        assert!(to_bool(&json!(1)));
        assert!(!to_bool(&Value::String("nope".to_string())));
        assert!(!to_bool(&Value::Null));
        assert!(!to_bool(&json!(0)));
    }

    #[test]
    fn iso_datetime_parsing_accepts_the_usual_shapes() {
        assert!(parse_iso_datetime(Some("2026-06-05T10:00:00Z")).is_some());
        assert!(parse_iso_datetime(Some("2026-06-05T10:00:00+08:00")).is_some());
        assert!(parse_iso_datetime(Some("2026-06-05T10:00:00")).is_some());
        assert!(parse_iso_datetime(Some("2026-06-05")).is_some());
        assert!(parse_iso_datetime(Some("")).is_none());
        assert!(parse_iso_datetime(Some("not-a-date")).is_none());
        assert!(parse_iso_datetime(None).is_none());
    }
}
