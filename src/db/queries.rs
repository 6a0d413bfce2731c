use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::{
    DefaultQuality, EffectiveSettings, GroupSettings, SettingsStats, UserProfile, UserSettings,
};
use crate::locales::Language;

const USER_COLUMNS: &str = "user_id, language, default_quality, username, first_name, last_name, \
     phone_number, is_premium, created_at, updated_at";

// ========== User settings ==========

/// Get a user's settings, creating the defaults on first access.
pub async fn get_or_create_user_settings(pool: &SqlitePool, user_id: i64) -> Result<UserSettings> {
    sqlx::query("INSERT OR IGNORE INTO user_settings (user_id) VALUES (?)")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to create user settings")?;

    sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM user_settings WHERE user_id = ?"
    ))
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("Failed to fetch user settings")
}

/// Get a user's settings without creating them.
pub async fn get_user_settings(pool: &SqlitePool, user_id: i64) -> Result<Option<UserSettings>> {
    sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM user_settings WHERE user_id = ?"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to fetch user settings")
}

pub async fn update_user_language(
    pool: &SqlitePool,
    user_id: i64,
    language: Language,
) -> Result<UserSettings> {
    sqlx::query(
        r"
        INSERT INTO user_settings (user_id, language) VALUES (?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            language = excluded.language,
            updated_at = datetime('now')
        ",
    )
    .bind(user_id)
    .bind(language.code())
    .execute(pool)
    .await
    .context("Failed to update user language")?;

    get_or_create_user_settings(pool, user_id).await
}

pub async fn update_user_quality(
    pool: &SqlitePool,
    user_id: i64,
    quality: DefaultQuality,
) -> Result<UserSettings> {
    sqlx::query(
        r"
        INSERT INTO user_settings (user_id, default_quality) VALUES (?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            default_quality = excluded.default_quality,
            updated_at = datetime('now')
        ",
    )
    .bind(user_id)
    .bind(quality.as_str())
    .execute(pool)
    .await
    .context("Failed to update user quality")?;

    get_or_create_user_settings(pool, user_id).await
}

/// Record the user's current Telegram profile.
pub async fn update_user_profile(
    pool: &SqlitePool,
    user_id: i64,
    profile: &UserProfile,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO user_settings (user_id, username, first_name, last_name, is_premium)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            username = excluded.username,
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            is_premium = excluded.is_premium,
            updated_at = datetime('now')
        ",
    )
    .bind(user_id)
    .bind(&profile.username)
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(profile.is_premium)
    .execute(pool)
    .await
    .context("Failed to update user profile")?;

    Ok(())
}

pub async fn update_user_phone(pool: &SqlitePool, user_id: i64, phone_number: &str) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO user_settings (user_id, phone_number) VALUES (?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            phone_number = excluded.phone_number,
            updated_at = datetime('now')
        ",
    )
    .bind(user_id)
    .bind(phone_number)
    .execute(pool)
    .await
    .context("Failed to update phone number")?;

    Ok(())
}

// ========== Group settings ==========

pub async fn get_group_settings(pool: &SqlitePool, group_id: i64) -> Result<Option<GroupSettings>> {
    sqlx::query_as(
        r"
        SELECT group_id, admin_id, language, default_quality, created_at, updated_at
        FROM group_settings WHERE group_id = ?
        ",
    )
    .bind(group_id)
    .fetch_optional(pool)
    .await
    .context("Failed to fetch group settings")
}

/// Create or update a group's settings.
///
/// The admin is recorded when the row is first created and kept afterwards.
/// Fields passed as `None` keep their current (or default) value.
pub async fn upsert_group_settings(
    pool: &SqlitePool,
    group_id: i64,
    admin_id: i64,
    language: Option<Language>,
    quality: Option<DefaultQuality>,
) -> Result<GroupSettings> {
    sqlx::query(
        r"
        INSERT INTO group_settings (group_id, admin_id, language, default_quality)
        VALUES (?, ?, COALESCE(?, 'ru'), COALESCE(?, 'ask'))
        ON CONFLICT(group_id) DO UPDATE SET
            language = COALESCE(?, group_settings.language),
            default_quality = COALESCE(?, group_settings.default_quality),
            updated_at = datetime('now')
        ",
    )
    .bind(group_id)
    .bind(admin_id)
    .bind(language.map(Language::code))
    .bind(quality.map(|q| q.as_str()))
    .bind(language.map(Language::code))
    .bind(quality.map(|q| q.as_str()))
    .execute(pool)
    .await
    .context("Failed to upsert group settings")?;

    get_group_settings(pool, group_id)
        .await?
        .context("Group settings missing after upsert")
}

/// The admin who created a group's settings.
pub async fn get_group_admin(pool: &SqlitePool, group_id: i64) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT admin_id FROM group_settings WHERE group_id = ?")
        .bind(group_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch group admin")?;

    Ok(row.map(|(id,)| id))
}

/// Settings for a message from `user_id` in `chat_id`.
///
/// Group chats (negative ids) with stored settings use those; everything
/// else uses the user's own settings.
pub async fn effective_settings(
    pool: &SqlitePool,
    user_id: i64,
    chat_id: i64,
) -> Result<EffectiveSettings> {
    if chat_id < 0 {
        if let Some(group) = get_group_settings(pool, chat_id).await? {
            return Ok(EffectiveSettings::from(&group));
        }
    }

    let user = get_or_create_user_settings(pool, user_id).await?;
    Ok(EffectiveSettings::from(&user))
}

// ========== Statistics ==========

pub async fn get_settings_stats(pool: &SqlitePool) -> Result<SettingsStats> {
    let (total_users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_settings")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;

    let (total_groups,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM group_settings")
        .fetch_one(pool)
        .await
        .context("Failed to count groups")?;

    let (premium_users,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM user_settings WHERE is_premium = 1")
            .fetch_one(pool)
            .await
            .context("Failed to count premium users")?;

    let languages: Vec<(String, i64)> = sqlx::query_as(
        r"
        SELECT language, COUNT(*) AS users
        FROM user_settings
        GROUP BY language
        ORDER BY users DESC, language
        ",
    )
    .fetch_all(pool)
    .await
    .context("Failed to get language distribution")?;

    let recent_users: Vec<(i64, String)> = sqlx::query_as(
        r"
        SELECT user_id, updated_at
        FROM user_settings
        ORDER BY updated_at DESC, user_id DESC
        LIMIT 5
        ",
    )
    .fetch_all(pool)
    .await
    .context("Failed to get recent users")?;

    Ok(SettingsStats {
        total_users,
        total_groups,
        premium_users,
        languages,
        recent_users,
    })
}
