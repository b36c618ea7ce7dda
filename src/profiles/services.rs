use anyhow::Context;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    forms::PictureChange,
    repo_types::{Profile, DEFAULT_PICTURE},
};
use crate::{auth::repo_types::User, state::AppState};

/// Served in place of users' pictures until they upload one.
pub const PLACEHOLDER_URL: &str = "/static/default-avatar.svg";

pub const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="160" height="160" viewBox="0 0 160 160"><rect width="160" height="160" fill="#d7dce1"/><circle cx="80" cy="62" r="30" fill="#9aa5b1"/><path d="M28 146c4-30 26-46 52-46s48 16 52 46z" fill="#9aa5b1"/></svg>"##;

pub(crate) fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

pub(crate) fn picture_key(user_id: Uuid, content_type: &str) -> String {
    let ext = ext_from_mime(content_type).unwrap_or("bin");
    format!("profile_pics/{}/{}.{}", user_id, Uuid::new_v4(), ext)
}

/// Browser URL of a stored picture key.
pub async fn picture_url(st: &AppState, key: &str) -> anyhow::Result<String> {
    if key.is_empty() || key == DEFAULT_PICTURE {
        return Ok(PLACEHOLDER_URL.to_string());
    }
    st.storage
        .object_url(key)
        .await
        .with_context(|| format!("url for picture {}", key))
}

/// Saves a validated edit: the new picture goes to storage first, then the
/// user's email, the profile's email and the picture key are written in one
/// transaction. The replaced picture is removed afterwards.
pub async fn save_profile_edit(
    st: &AppState,
    user: &User,
    current: &Profile,
    email: &str,
    change: PictureChange,
) -> anyhow::Result<Profile> {
    let (new_picture, uploaded) = match change {
        PictureChange::Keep => (current.picture.clone(), false),
        PictureChange::Clear => (DEFAULT_PICTURE.to_string(), false),
        PictureChange::Replace(pic) => {
            let key = picture_key(user.id, pic.content_type);
            st.storage
                .put_object(&key, pic.body, pic.content_type)
                .await
                .with_context(|| format!("put_object {}", key))?;
            (key, true)
        }
    };

    let saved = match write_profile_edit(st, user.id, email, &new_picture).await {
        Ok(profile) => profile,
        Err(e) => {
            if uploaded {
                if let Err(cleanup) = st.storage.delete_object(&new_picture).await {
                    warn!(error = %cleanup, key = %new_picture, "orphaned picture after failed save");
                }
            }
            return Err(e);
        }
    };

    if current.has_custom_picture() && current.picture != saved.picture {
        if let Err(e) = st.storage.delete_object(&current.picture).await {
            warn!(error = %e, key = %current.picture, "could not delete replaced picture");
        }
    }

    info!(user_id = %user.id, picture = %saved.picture, "profile updated");
    Ok(saved)
}

async fn write_profile_edit(
    st: &AppState,
    user_id: Uuid,
    email: &str,
    picture: &str,
) -> anyhow::Result<Profile> {
    let mut tx = st.db.begin().await.context("begin tx")?;
    User::update_email_tx(&mut tx, user_id, email)
        .await
        .context("update user email")?;
    let profile = Profile::update_tx(&mut tx, user_id, email, picture)
        .await
        .context("update profile")?;
    tx.commit().await.context("commit tx")?;
    Ok(profile)
}
