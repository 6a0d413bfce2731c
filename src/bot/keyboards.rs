//! Reply and inline keyboards, and the callback data they carry.

use crate::db::{DefaultQuality, EffectiveSettings};
use crate::extractors::MediaFormat;
use crate::locales::{t, tf, Language, Msg};
use crate::telegram::types::{InlineKeyboardButton, ReplyMarkup};

/// Decoded `action:value` callback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Download the pending URL in this format (`best` or a format id).
    Quality(String),
    /// Settings navigation: `language`, `quality` or `back`.
    Settings(String),
    SetLanguage(Language),
    SetQuality(DefaultQuality),
}

impl CallbackAction {
    /// Parse callback data. Unknown actions and values yield `None`.
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        let (action, value) = data.split_once(':')?;
        match action {
            "quality" => Some(Self::Quality(value.to_string())),
            "settings" => Some(Self::Settings(value.to_string())),
            "set_lang" => value.parse().ok().map(Self::SetLanguage),
            "set_quality" => value.parse().ok().map(Self::SetQuality),
            _ => None,
        }
    }
}

/// Persistent reply keyboard with Settings, Help and Donate.
#[must_use]
pub fn main_keyboard(lang: Language) -> ReplyMarkup {
    ReplyMarkup::keyboard(vec![vec![
        t(lang, Msg::BtnSettings),
        t(lang, Msg::BtnHelp),
        t(lang, Msg::BtnDonate),
    ]])
}

#[must_use]
pub fn settings_keyboard(lang: Language) -> ReplyMarkup {
    ReplyMarkup::inline(vec![vec![
        InlineKeyboardButton::callback(t(lang, Msg::BtnLanguage), "settings:language"),
        InlineKeyboardButton::callback(t(lang, Msg::BtnQuality), "settings:quality"),
    ]])
}

#[must_use]
pub fn language_keyboard(lang: Language) -> ReplyMarkup {
    ReplyMarkup::inline(vec![
        vec![
            InlineKeyboardButton::callback(t(lang, Msg::BtnRussian), "set_lang:ru"),
            InlineKeyboardButton::callback(t(lang, Msg::BtnEnglish), "set_lang:en"),
        ],
        vec![back_button(lang)],
    ])
}

#[must_use]
pub fn quality_keyboard(lang: Language) -> ReplyMarkup {
    ReplyMarkup::inline(vec![
        vec![InlineKeyboardButton::callback(t(lang, Msg::BtnAsk), "set_quality:ask")],
        vec![InlineKeyboardButton::callback(t(lang, Msg::BtnBest), "set_quality:best")],
        vec![back_button(lang)],
    ])
}

/// One button per format, then a "best" button.
#[must_use]
pub fn format_keyboard(lang: Language, formats: &[MediaFormat]) -> ReplyMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = formats
        .iter()
        .map(|format| {
            vec![InlineKeyboardButton::callback(
                tf(
                    lang,
                    Msg::QualityFormat,
                    &[("quality", &format.quality), ("ext", &format.ext)],
                ),
                format!("quality:{}", format.id),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        t(lang, Msg::BestQuality),
        "quality:best",
    )]);
    ReplyMarkup::inline(rows)
}

fn back_button(lang: Language) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(t(lang, Msg::BtnBack), "settings:back")
}

/// Settings summary shown above the settings keyboard.
#[must_use]
pub fn settings_text(settings: &EffectiveSettings) -> String {
    let lang = settings.language;
    let quality = match settings.default_quality {
        DefaultQuality::Ask => t(lang, Msg::AskEveryTime),
        DefaultQuality::Best => t(lang, Msg::BestAvailable),
    };
    tf(
        lang,
        Msg::SettingsMenu,
        &[
            ("language", &lang.code().to_uppercase()),
            ("quality", &quality),
        ],
    )
}

/// Reply-keyboard button a private text corresponds to, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuButton {
    Settings,
    Help,
    Donate,
}

impl MenuButton {
    /// Match a text against the localized button labels.
    #[must_use]
    pub fn from_label(lang: Language, text: &str) -> Option<Self> {
        let text = text.trim();
        if text == t(lang, Msg::BtnSettings) {
            Some(Self::Settings)
        } else if text == t(lang, Msg::BtnHelp) {
            Some(Self::Help)
        } else if text == t(lang, Msg::BtnDonate) {
            Some(Self::Donate)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callbacks(markup: &ReplyMarkup) -> Vec<String> {
        match markup {
            ReplyMarkup::Inline { inline_keyboard } => inline_keyboard
                .iter()
                .flatten()
                .map(|b| b.callback_data.clone())
                .collect(),
            ReplyMarkup::Keyboard { .. } => panic!("expected an inline keyboard"),
        }
    }

    #[test]
    fn test_callback_parse() {
        assert_eq!(
            CallbackAction::parse("quality:137"),
            Some(CallbackAction::Quality("137".to_string()))
        );
        assert_eq!(
            CallbackAction::parse("set_lang:en"),
            Some(CallbackAction::SetLanguage(Language::En))
        );
        assert_eq!(
            CallbackAction::parse("set_quality:best"),
            Some(CallbackAction::SetQuality(DefaultQuality::Best))
        );
        assert_eq!(CallbackAction::parse("set_lang:de"), None);
        assert_eq!(CallbackAction::parse("garbage"), None);
    }

    #[test]
    fn test_format_keyboard() {
        let formats = vec![
            MediaFormat {
                id: "137".to_string(),
                quality: "1080p".to_string(),
                ext: "mp4".to_string(),
            },
            MediaFormat {
                id: "22".to_string(),
                quality: "720p".to_string(),
                ext: "mp4".to_string(),
            },
        ];
        let markup = format_keyboard(Language::En, &formats);
        assert_eq!(
            callbacks(&markup),
            vec!["quality:137", "quality:22", "quality:best"]
        );
    }

    #[test]
    fn test_settings_keyboards() {
        assert_eq!(
            callbacks(&language_keyboard(Language::Ru)),
            vec!["set_lang:ru", "set_lang:en", "settings:back"]
        );
        assert_eq!(
            callbacks(&quality_keyboard(Language::En)),
            vec!["set_quality:ask", "set_quality:best", "settings:back"]
        );
    }

    #[test]
    fn test_settings_text() {
        let settings = EffectiveSettings {
            language: Language::En,
            default_quality: DefaultQuality::Best,
            from_group: false,
        };
        assert_eq!(
            settings_text(&settings),
            "⚙️ Settings\n\nLanguage: EN\nDefault quality: Best available"
        );
    }

    #[test]
    fn test_menu_button_from_label() {
        assert_eq!(
            MenuButton::from_label(Language::Ru, &t(Language::Ru, Msg::BtnHelp)),
            Some(MenuButton::Help)
        );
        assert_eq!(
            MenuButton::from_label(Language::En, &t(Language::Ru, Msg::BtnHelp)),
            None
        );
        assert_eq!(MenuButton::from_label(Language::En, "https://youtu.be/x"), None);
    }
}
