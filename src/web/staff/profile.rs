//! Staff profile page and profile-image handling. Images live in object
//! storage under a per-account key; the account row only keeps the public
//! URL.

use std::borrow::Cow;
use std::path::Path as FilePath;

use axum::{
    extract::{Multipart, Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::web::{
    AppState, escape_html,
    auth::Account,
    staff::require_staff_user,
    templates::{self, StaffPageLayout},
};

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Lowercased extension from the uploaded filename, restricted to the
/// allow-list with a png fallback.
fn safe_extension(filename: &str) -> &'static str {
    let ext = FilePath::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ALLOWED_EXTENSIONS.iter().find(|allowed| **allowed == ext) {
        Some(&"jpg") => "jpg",
        Some(&"jpeg") => "jpeg",
        Some(&"webp") => "webp",
        _ => "png",
    }
}

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => mime::IMAGE_JPEG.essence_str(),
        "webp" => "image/webp",
        _ => mime::IMAGE_PNG.essence_str(),
    }
}

fn object_key(account: &Account, extension: &str) -> String {
    format!(
        "staff/{}/{}/{}.{}",
        account.role.as_str(),
        account.id,
        Uuid::new_v4().simple(),
        extension
    )
}

#[derive(Default, Deserialize)]
pub struct ProfileQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub async fn staff_profile(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<ProfileQuery>,
) -> Result<Html<String>, Redirect> {
    let account = require_staff_user(&state, &jar).await?;

    let image_html = match account.profile_path.as_deref() {
        Some(url) => format!(
            r#"<img src="{url}" alt="Profile photo" style="max-width:180px; border-radius:12px; border:1px solid #e2e8f0;">
            <form method="post" action="/staff/profile/remove" style="margin-top:0.75rem;">
                <button type="submit" class="quiet">Remove photo</button>
            </form>"#,
            url = escape_html(url)
        ),
        None => r#"<p class="note">No profile photo uploaded.</p>"#.to_string(),
    };

    let body_html = format!(
        r#"<section class="panel">
            <h2>My Profile</h2>
            <table>
                <tr><th>Name</th><td>{name}</td></tr>
                <tr><th>Role</th><td>{role}</td></tr>
                <tr><th>CCA email</th><td>{email}</td></tr>
            </table>
        </section>
        <section class="panel">
            <h2>Profile Photo</h2>
            {image_html}
            <form method="post" action="/staff/profile/upload" enctype="multipart/form-data" style="margin-top:1rem; display:flex; gap:0.75rem; align-items:center;">
                <input type="file" name="profile_image" accept="image/*">
                <button type="submit">Upload photo</button>
            </form>
            <p class="note">JPG, PNG, or WebP.</p>
        </section>"#,
        name = escape_html(&account.full_name()),
        role = templates::role_label(account.role),
        email = escape_html(&account.cca_email),
    );

    let flash_html =
        templates::compose_flash_message(query.status.as_deref(), query.error.as_deref());
    let name = account.full_name();
    Ok(Html(templates::render_staff_page(StaffPageLayout {
        meta_title: "Profile",
        heading: "Profile",
        account_name: &name,
        role: account.role,
        active_path: "/staff/profile",
        flash_html: Cow::Owned(flash_html),
        body_html: Cow::Owned(body_html),
        body_scripts: Vec::new(),
    })))
}

pub async fn upload_profile_image(
    State(state): State<AppState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<Redirect, Redirect> {
    let account = require_staff_user(&state, &jar).await?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("profile_image") {
                    continue;
                }
                let filename = field.file_name().unwrap_or("").to_string();
                match field.bytes().await {
                    Ok(bytes) if !bytes.is_empty() => upload = Some((filename, bytes.to_vec())),
                    Ok(_) => {}
                    Err(err) => {
                        error!(?err, "failed to read uploaded profile image");
                        return Ok(Redirect::to("/staff/profile?error=upload_failed"));
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                error!(?err, "failed to read multipart body");
                return Ok(Redirect::to("/staff/profile?error=missing_image"));
            }
        }
    }

    let Some((filename, bytes)) = upload else {
        return Ok(Redirect::to("/staff/profile?error=missing_image"));
    };

    let extension = safe_extension(&filename);
    let key = object_key(&account, extension);

    if let Err(err) = state
        .storage()
        .upload(&key, content_type_for(extension), bytes)
        .await
    {
        error!(?err, "profile image upload failed");
        return Ok(Redirect::to("/staff/profile?error=upload_failed"));
    }

    let public_url = state.storage().public_url(&key);
    let sql = format!(
        "UPDATE {} SET profile_path = $1 WHERE id = $2",
        account.role.table()
    );
    if let Err(err) = sqlx::query(&sql)
        .bind(&public_url)
        .bind(account.id)
        .execute(state.pool_ref())
        .await
    {
        error!(?err, "failed to store profile image reference");
        return Ok(Redirect::to("/staff/profile?error=unknown"));
    }

    Ok(Redirect::to("/staff/profile?status=profile_uploaded"))
}

pub async fn remove_profile_image(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Redirect, Redirect> {
    let account = require_staff_user(&state, &jar).await?;

    // Best-effort remote delete; the local reference is cleared either way
    // so the account never stays stuck on an unreachable image.
    if let Some(object_path) = account
        .profile_path
        .as_deref()
        .and_then(|url| state.storage().object_path_from_public_url(url))
    {
        if let Err(err) = state.storage().delete(&object_path).await {
            warn!(?err, %object_path, "profile image delete failed; clearing reference anyway");
        }
    }

    let sql = format!(
        "UPDATE {} SET profile_path = NULL WHERE id = $1",
        account.role.table()
    );
    if let Err(err) = sqlx::query(&sql)
        .bind(account.id)
        .execute(state.pool_ref())
        .await
    {
        error!(?err, "failed to clear profile image reference");
        return Ok(Redirect::to("/staff/profile?error=unknown"));
    }

    Ok(Redirect::to("/staff/profile?status=profile_removed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_allow_list_falls_back_to_png() {
        assert_eq!(safe_extension("photo.JPG"), "jpg");
        assert_eq!(safe_extension("photo.jpeg"), "jpeg");
        assert_eq!(safe_extension("photo.webp"), "webp");
        assert_eq!(safe_extension("photo.png"), "png");
        assert_eq!(safe_extension("photo.gif"), "png");
        assert_eq!(safe_extension("photo"), "png");
        assert_eq!(safe_extension(""), "png");
    }

    #[test]
    fn content_types_match_extensions() {
        assert_eq!(content_type_for("jpg"), "image/jpeg");
        assert_eq!(content_type_for("jpeg"), "image/jpeg");
        assert_eq!(content_type_for("webp"), "image/webp");
        assert_eq!(content_type_for("png"), "image/png");
    }
}
