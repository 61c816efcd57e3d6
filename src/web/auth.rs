use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration as ChronoDuration, Utc};
use cookie::time::Duration as CookieDuration;
use rand_core::OsRng;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::web::{
    AppState,
    templates::{self, LoginFlash},
};

pub const SESSION_COOKIE: &str = "ojt_session";
pub const SESSION_TTL_DAYS: i64 = 7;

/// The three account populations. Lookup precedence and home pages follow
/// the role, and the session row stores it as an explicit discriminant.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Role {
    Student,
    Coordinator,
    Instructor,
}

impl Role {
    /// Lookup order for email-based flows.
    pub const LOOKUP_ORDER: [Role; 3] = [Role::Student, Role::Coordinator, Role::Instructor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Coordinator => "coordinator",
            Role::Instructor => "instructor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student" => Some(Role::Student),
            "coordinator" => Some(Role::Coordinator),
            "instructor" => Some(Role::Instructor),
            _ => None,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Coordinator | Role::Instructor)
    }

    pub fn table(&self) -> &'static str {
        match self {
            Role::Student => "students",
            Role::Coordinator => "practicum_coordinators",
            Role::Instructor => "practicum_instructors",
        }
    }

    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Student => "/student",
            Role::Coordinator | Role::Instructor => "/staff",
        }
    }
}

/// Columns shared by all three account tables.
#[derive(Clone, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    cca_email: String,
    last_name: String,
    first_name: String,
    second_name: Option<String>,
    middle_initial: Option<String>,
    password: String,
    active_status: bool,
    is_password_temp: bool,
    profile_path: Option<String>,
}

/// An account resolved from any of the three tables, tagged with its role.
#[derive(Clone)]
pub struct Account {
    pub id: Uuid,
    pub role: Role,
    pub cca_email: String,
    pub last_name: String,
    pub first_name: String,
    pub second_name: Option<String>,
    pub middle_initial: Option<String>,
    pub password_hash: String,
    pub active_status: bool,
    pub is_password_temp: bool,
    pub profile_path: Option<String>,
}

impl Account {
    fn from_row(row: AccountRow, role: Role) -> Self {
        Self {
            id: row.id,
            role,
            cca_email: row.cca_email,
            last_name: row.last_name,
            first_name: row.first_name,
            second_name: row.second_name,
            middle_initial: row.middle_initial,
            password_hash: row.password,
            active_status: row.active_status,
            is_password_temp: row.is_password_temp,
            profile_path: row.profile_path,
        }
    }

    pub fn full_name(&self) -> String {
        compose_full_name(
            &self.first_name,
            self.second_name.as_deref(),
            self.middle_initial.as_deref(),
            &self.last_name,
        )
    }
}

/// Display name from the stored parts. Legacy imports left the literal
/// strings "none"/"null" in optional columns; those render as absent.
pub fn compose_full_name(
    first: &str,
    second: Option<&str>,
    middle_initial: Option<&str>,
    last: &str,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !first.trim().is_empty() {
        parts.push(first.trim().to_string());
    }
    if let Some(second) = second.map(str::trim).filter(|v| is_present(v)) {
        parts.push(second.to_string());
    }
    if let Some(mi) = middle_initial.map(str::trim).filter(|v| is_present(v)) {
        parts.push(format!("{mi}."));
    }
    if !last.trim().is_empty() {
        parts.push(last.trim().to_string());
    }
    parts.join(" ")
}

fn is_present(value: &str) -> bool {
    !value.is_empty() && !value.eq_ignore_ascii_case("none") && !value.eq_ignore_ascii_case("null")
}

const ACCOUNT_COLUMNS: &str = "id, cca_email, last_name, first_name, second_name, middle_initial, \
     password, active_status, is_password_temp, profile_path";

/// Single polymorphic lookup across the three account tables, in student →
/// coordinator → instructor precedence. First email match wins.
pub async fn find_account_by_email(pool: &PgPool, email: &str) -> sqlx::Result<Option<Account>> {
    for role in Role::LOOKUP_ORDER {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM {} WHERE cca_email = $1",
            role.table()
        );
        if let Some(row) = sqlx::query_as::<_, AccountRow>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await?
        {
            return Ok(Some(Account::from_row(row, role)));
        }
    }
    Ok(None)
}

pub async fn find_account_by_id(
    pool: &PgPool,
    role: Role,
    id: Uuid,
) -> sqlx::Result<Option<Account>> {
    let query = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM {} WHERE id = $1",
        role.table()
    );
    let row = sqlx::query_as::<_, AccountRow>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| Account::from_row(row, role)))
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    account_id: Uuid,
    role: String,
}

pub async fn create_session(pool: &PgPool, account: &Account) -> sqlx::Result<Uuid> {
    let token = Uuid::new_v4();
    let expires_at = Utc::now() + ChronoDuration::days(SESSION_TTL_DAYS);
    sqlx::query("INSERT INTO sessions (id, account_id, role, expires_at) VALUES ($1, $2, $3, $4)")
        .bind(token)
        .bind(account.id)
        .bind(account.role.as_str())
        .bind(expires_at)
        .execute(pool)
        .await?;
    Ok(token)
}

pub async fn fetch_account_by_session(
    pool: &PgPool,
    token: Uuid,
) -> sqlx::Result<Option<Account>> {
    let session = sqlx::query_as::<_, SessionRow>(
        "SELECT account_id, role FROM sessions WHERE id = $1 AND expires_at > NOW()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    let Some(session) = session else {
        return Ok(None);
    };
    let Some(role) = Role::parse(&session.role) else {
        return Ok(None);
    };
    find_account_by_id(pool, role, session.account_id).await
}

/// Resolve the caller's account from the session cookie, logging lookup
/// failures instead of bubbling them into every page handler.
pub async fn current_account(state: &AppState, jar: &CookieJar) -> Option<Account> {
    let token_cookie = jar.get(SESSION_COOKIE)?;
    let token = Uuid::parse_str(token_cookie.value()).ok()?;

    match fetch_account_by_session(state.pool_ref(), token).await {
        Ok(account) => account,
        Err(err) => {
            error!(?err, "failed to resolve session");
            None
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(Default, Deserialize)]
pub struct LandingQuery {
    pub status: Option<String>,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub cca_email: String,
    pub password: String,
}

pub async fn login_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<LandingQuery>,
) -> Result<Html<String>, Redirect> {
    if let Some(account) = current_account(&state, &jar).await {
        if account.is_password_temp {
            return Err(Redirect::to("/change-password"));
        }
        return Err(Redirect::to(account.role.home_path()));
    }

    let flash = LoginFlash::from_codes(params.status.as_deref(), params.error.as_deref());
    Ok(Html(templates::render_login_page(flash)))
}

pub async fn process_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), (StatusCode, Html<String>)> {
    let email = form.cca_email.trim().to_lowercase();
    if email.is_empty() || form.password.is_empty() {
        return Err(login_error(
            StatusCode::BAD_REQUEST,
            "Please enter your email and password.",
        ));
    }

    let account = match find_account_by_email(state.pool_ref(), &email).await {
        Ok(Some(account)) => account,
        Ok(None) => return Err(invalid_credentials()),
        Err(err) => {
            error!(?err, "failed to fetch account during login");
            return Err(server_error());
        }
    };

    if !account.active_status {
        return Err(login_error(
            StatusCode::UNAUTHORIZED,
            "Account is not activated yet.",
        ));
    }

    if !verify_password(&form.password, &account.password_hash) {
        return Err(invalid_credentials());
    }

    let token = match create_session(state.pool_ref(), &account).await {
        Ok(token) => token,
        Err(err) => {
            error!(?err, "failed to create session");
            return Err(server_error());
        }
    };

    let mut cookie = Cookie::new(SESSION_COOKIE, token.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::days(SESSION_TTL_DAYS));
    let jar = jar.add(cookie);

    let destination = if account.is_password_temp {
        "/change-password"
    } else {
        account.role.home_path()
    };
    Ok((jar, Redirect::to(destination)))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let mut jar = jar;

    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(token) = Uuid::parse_str(cookie.value()) {
            if let Err(err) = sqlx::query("DELETE FROM sessions WHERE id = $1")
                .bind(token)
                .execute(state.pool_ref())
                .await
            {
                error!(?err, "failed to remove session during logout");
            }
        }
    }

    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");
    removal.set_http_only(true);
    removal.set_same_site(SameSite::Lax);
    removal.set_max_age(CookieDuration::seconds(0));
    jar = jar.remove(removal);

    (jar, Redirect::to("/?status=logged_out"))
}

#[derive(Deserialize)]
pub struct ChangePasswordForm {
    pub new_password: String,
    pub confirm_password: String,
}

pub async fn change_password_page(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Html<String>, Redirect> {
    let Some(account) = current_account(&state, &jar).await else {
        return Err(Redirect::to("/?error=login_required"));
    };

    Ok(Html(templates::render_change_password_page(
        &account.cca_email,
        None,
    )))
}

pub async fn process_change_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ChangePasswordForm>,
) -> Result<Redirect, (StatusCode, Html<String>)> {
    let Some(account) = current_account(&state, &jar).await else {
        return Ok(Redirect::to("/?error=login_required"));
    };

    if form.new_password.is_empty() || form.confirm_password.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Html(templates::render_change_password_page(
                &account.cca_email,
                Some("Please fill in both password fields."),
            )),
        ));
    }

    if form.new_password != form.confirm_password {
        return Err((
            StatusCode::BAD_REQUEST,
            Html(templates::render_change_password_page(
                &account.cca_email,
                Some("Passwords do not match."),
            )),
        ));
    }

    let password_hash = match hash_password(&form.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!(?err, "failed to hash password during change");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(templates::render_change_password_page(
                    &account.cca_email,
                    Some("Something went wrong. Please try again."),
                )),
            ));
        }
    };

    let query = format!(
        "UPDATE {} SET password = $1, is_password_temp = FALSE WHERE id = $2",
        account.role.table()
    );
    if let Err(err) = sqlx::query(&query)
        .bind(&password_hash)
        .bind(account.id)
        .execute(state.pool_ref())
        .await
    {
        error!(?err, "failed to store changed password");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(templates::render_change_password_page(
                &account.cca_email,
                Some("Something went wrong. Please try again."),
            )),
        ));
    }

    Ok(Redirect::to(account.role.home_path()))
}

fn invalid_credentials() -> (StatusCode, Html<String>) {
    login_error(StatusCode::UNAUTHORIZED, "Invalid login credentials.")
}

fn login_error(status: StatusCode, message: &str) -> (StatusCode, Html<String>) {
    (
        status,
        Html(templates::render_login_page(LoginFlash::error(message))),
    )
}

fn server_error() -> (StatusCode, Html<String>) {
    login_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Something went wrong. Please try again.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_strings_round_trip() {
        for role in Role::LOOKUP_ORDER {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("admin"), None);
    }

    #[test]
    fn lookup_order_starts_with_students() {
        assert_eq!(Role::LOOKUP_ORDER[0], Role::Student);
        assert!(!Role::LOOKUP_ORDER[0].is_staff());
        assert!(Role::LOOKUP_ORDER[1].is_staff());
        assert!(Role::LOOKUP_ORDER[2].is_staff());
    }

    #[test]
    fn full_name_skips_legacy_placeholder_values() {
        assert_eq!(
            compose_full_name("Ross Jhem", Some("none"), Some("P"), "Acopio"),
            "Ross Jhem P. Acopio"
        );
        assert_eq!(
            compose_full_name("Maria", Some("Luisa"), Some("null"), "Reyes"),
            "Maria Luisa Reyes"
        );
        assert_eq!(compose_full_name("Juan", None, None, "Santos"), "Juan Santos");
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("s3cret!").unwrap();
        assert!(verify_password("s3cret!", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret!", "not-a-hash"));
    }
}
