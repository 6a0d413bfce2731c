use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::locales::Language;

/// What to do when a URL has several qualities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultQuality {
    /// Show the format keyboard.
    #[default]
    Ask,
    /// Download the best format right away.
    Best,
}

impl DefaultQuality {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ask => "ask",
            Self::Best => "best",
        }
    }
}

impl FromStr for DefaultQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ask" => Ok(Self::Ask),
            "best" => Ok(Self::Best),
            other => Err(format!("unknown quality setting: {other}")),
        }
    }
}

impl fmt::Display for DefaultQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-user preferences and profile.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSettings {
    pub user_id: i64,
    pub language: String,
    pub default_quality: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub is_premium: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-group preferences, owned by the admin who first set them.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GroupSettings {
    pub group_id: i64,
    pub admin_id: i64,
    pub language: String,
    pub default_quality: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Settings that apply to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectiveSettings {
    pub language: Language,
    pub default_quality: DefaultQuality,
    /// Whether these came from the group rather than the user.
    pub from_group: bool,
}

impl UserSettings {
    /// Stored language, falling back to the default for unknown values.
    #[must_use]
    pub fn language(&self) -> Language {
        self.language.parse().unwrap_or_default()
    }

    #[must_use]
    pub fn default_quality(&self) -> DefaultQuality {
        self.default_quality.parse().unwrap_or_default()
    }
}

impl GroupSettings {
    #[must_use]
    pub fn language(&self) -> Language {
        self.language.parse().unwrap_or_default()
    }

    #[must_use]
    pub fn default_quality(&self) -> DefaultQuality {
        self.default_quality.parse().unwrap_or_default()
    }
}

impl From<&UserSettings> for EffectiveSettings {
    fn from(settings: &UserSettings) -> Self {
        Self {
            language: settings.language(),
            default_quality: settings.default_quality(),
            from_group: false,
        }
    }
}

impl From<&GroupSettings> for EffectiveSettings {
    fn from(settings: &GroupSettings) -> Self {
        Self {
            language: settings.language(),
            default_quality: settings.default_quality(),
            from_group: true,
        }
    }
}

/// Profile fields refreshed from incoming updates.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_premium: bool,
}

/// Aggregate numbers for the stats tool.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsStats {
    pub total_users: i64,
    pub total_groups: i64,
    pub premium_users: i64,
    /// `(language, users)`, most common first.
    pub languages: Vec<(String, i64)>,
    /// `(user_id, updated_at)`, most recent first.
    pub recent_users: Vec<(i64, String)>,
}
