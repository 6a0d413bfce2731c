//! Russian and English UI strings.

use std::fmt;
use std::str::FromStr;

use crate::error::DownloadError;
use crate::extractors::html_escape;

/// UI language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    Ru,
    En,
}

impl Language {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::En => "en",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ru" => Ok(Self::Ru),
            "en" => Ok(Self::En),
            other => Err(format!("unknown language: {other}")),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Message keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg {
    Welcome,
    GroupWelcome,
    Help,
    SettingsMenu,
    AskEveryTime,
    BestAvailable,
    SelectLanguage,
    SelectDefaultQuality,
    SelectQuality,
    QualityFormat,
    BestQuality,
    BtnSettings,
    BtnHelp,
    BtnDonate,
    BtnBack,
    BtnLanguage,
    BtnQuality,
    BtnRussian,
    BtnEnglish,
    BtnAsk,
    BtnBest,
    Processing,
    StatusGettingInfo,
    StatusDownloading,
    StatusSending,
    UnsupportedUrl,
    SessionExpired,
    MissingUrl,
    DownloadFailed,
    ErrorOccurred,
    SlowDown,
    InvoiceTitle,
    InvoiceDescription,
    PriceLabel,
    PaymentSupport,
    PaymentThanks,
    InlineTitle,
    InlineDescription,
    ErrRateLimited,
    ErrPrivate,
    ErrLoginRequired,
    ErrNotFound,
    ErrNoMedia,
    ErrTooLarge,
    ErrTimeout,
    ErrNotConfigured,
    ErrUnsupported,
    ErrExtraction,
    ErrNetwork,
    ErrShuttingDown,
    ErrInternal,
}

impl Msg {
    #[allow(clippy::too_many_lines)]
    fn template(self, lang: Language) -> &'static str {
        use Language::{En, Ru};
        match (self, lang) {
            (Self::Welcome, Ru) => "👋 Привет! Я Zenload.\n\nОтправь мне ссылку на видео из Instagram, TikTok, YouTube, Pinterest или трек из Яндекс Музыки, и я пришлю файл.",
            (Self::Welcome, En) => "👋 Hi! I'm Zenload.\n\nSend me a link to a video from Instagram, TikTok, YouTube, Pinterest or a Yandex Music track and I'll send you the file.",
            (Self::GroupWelcome, Ru) => "👋 Привет! Упомяните меня со ссылкой или используйте /zen &lt;ссылка&gt;, чтобы скачать видео.",
            (Self::GroupWelcome, En) => "👋 Hi! Mention me with a link or use /zen &lt;url&gt; to download a video.",
            (Self::Help, Ru) => "ℹ️ Как пользоваться:\n\n1. Скопируйте ссылку на видео или трек\n2. Отправьте её мне\n3. Выберите качество\n\nПоддерживаются: Instagram, TikTok, YouTube, Pinterest, Яндекс Музыка.\n\nКоманды:\n/zen &lt;ссылка&gt; — скачать по ссылке\n/settings — настройки\n/donate — поддержать проект\n/paysupport — помощь с оплатой",
            (Self::Help, En) => "ℹ️ How to use:\n\n1. Copy a link to a video or track\n2. Send it to me\n3. Pick a quality\n\nSupported: Instagram, TikTok, YouTube, Pinterest, Yandex Music.\n\nCommands:\n/zen &lt;url&gt; — download a link\n/settings — settings\n/donate — support the project\n/paysupport — payment help",
            (Self::SettingsMenu, Ru) => "⚙️ Настройки\n\nЯзык: {language}\nКачество по умолчанию: {quality}",
            (Self::SettingsMenu, En) => "⚙️ Settings\n\nLanguage: {language}\nDefault quality: {quality}",
            (Self::AskEveryTime, Ru) => "Спрашивать каждый раз",
            (Self::AskEveryTime, En) => "Ask every time",
            (Self::BestAvailable, Ru) => "Лучшее доступное",
            (Self::BestAvailable, En) => "Best available",
            (Self::SelectLanguage, Ru) => "🌐 Выберите язык:",
            (Self::SelectLanguage, En) => "🌐 Choose a language:",
            (Self::SelectDefaultQuality, Ru) => "🎬 Выберите качество по умолчанию:",
            (Self::SelectDefaultQuality, En) => "🎬 Choose the default quality:",
            (Self::SelectQuality, Ru) => "🎬 Выберите качество:",
            (Self::SelectQuality, En) => "🎬 Choose a quality:",
            (Self::QualityFormat, _) => "{quality} ({ext})",
            (Self::BestQuality, Ru) => "⭐ Лучшее качество",
            (Self::BestQuality, En) => "⭐ Best quality",
            (Self::BtnSettings, Ru) => "⚙️ Настройки",
            (Self::BtnSettings, En) => "⚙️ Settings",
            (Self::BtnHelp, Ru) => "ℹ️ Помощь",
            (Self::BtnHelp, En) => "ℹ️ Help",
            (Self::BtnDonate, Ru) => "⭐ Поддержать",
            (Self::BtnDonate, En) => "⭐ Donate",
            (Self::BtnBack, Ru) => "◀️ Назад",
            (Self::BtnBack, En) => "◀️ Back",
            (Self::BtnLanguage, Ru) => "🌐 Язык",
            (Self::BtnLanguage, En) => "🌐 Language",
            (Self::BtnQuality, Ru) => "🎬 Качество",
            (Self::BtnQuality, En) => "🎬 Quality",
            (Self::BtnRussian, _) => "🇷🇺 Русский",
            (Self::BtnEnglish, _) => "🇬🇧 English",
            (Self::BtnAsk, Ru) => "❓ Спрашивать каждый раз",
            (Self::BtnAsk, En) => "❓ Ask every time",
            (Self::BtnBest, Ru) => "⭐ Всегда лучшее",
            (Self::BtnBest, En) => "⭐ Always best",
            (Self::Processing, Ru) => "⏳ Обрабатываю ссылку...",
            (Self::Processing, En) => "⏳ Processing the link...",
            (Self::StatusGettingInfo, Ru) => "🔍 Получаю информацию... {progress}%",
            (Self::StatusGettingInfo, En) => "🔍 Getting info... {progress}%",
            (Self::StatusDownloading, Ru) => "⬇️ Скачиваю... {progress}%",
            (Self::StatusDownloading, En) => "⬇️ Downloading... {progress}%",
            (Self::StatusSending, Ru) => "📤 Отправляю... {progress}%",
            (Self::StatusSending, En) => "📤 Sending... {progress}%",
            (Self::UnsupportedUrl, Ru) => "❌ Эта ссылка не поддерживается.",
            (Self::UnsupportedUrl, En) => "❌ This link is not supported.",
            (Self::SessionExpired, Ru) => "⌛ Сессия истекла. Отправьте ссылку ещё раз.",
            (Self::SessionExpired, En) => "⌛ The session has expired. Please send the link again.",
            (Self::MissingUrl, Ru) => "Укажите ссылку: /zen &lt;ссылка&gt;",
            (Self::MissingUrl, En) => "Please provide a link: /zen &lt;url&gt;",
            (Self::DownloadFailed, Ru) => "❌ Не удалось скачать: {error}",
            (Self::DownloadFailed, En) => "❌ Download failed: {error}",
            (Self::ErrorOccurred, Ru) => "❌ Произошла ошибка. Попробуйте позже.",
            (Self::ErrorOccurred, En) => "❌ An error occurred. Please try again later.",
            (Self::SlowDown, Ru) => "🐢 Слишком много запросов. Подождите немного и попробуйте снова.",
            (Self::SlowDown, En) => "🐢 Too many requests. Please wait a bit and try again.",
            (Self::InvoiceTitle, Ru) => "Поддержать Zenload",
            (Self::InvoiceTitle, En) => "Support Zenload",
            (Self::InvoiceDescription, Ru) => "Спасибо, что помогаете развивать бота!",
            (Self::InvoiceDescription, En) => "Thank you for helping the bot grow!",
            (Self::PriceLabel, Ru) => "Пожертвование",
            (Self::PriceLabel, En) => "Donation",
            (Self::PaymentSupport, Ru) => "💬 По вопросам оплаты напишите разработчику. Пожертвования в Telegram Stars не возвращаются.",
            (Self::PaymentSupport, En) => "💬 For payment questions, contact the developer. Telegram Stars donations are non-refundable.",
            (Self::PaymentThanks, Ru) => "💖 Спасибо за поддержку!",
            (Self::PaymentThanks, En) => "💖 Thank you for your support!",
            (Self::InlineTitle, _) => "Download from URL",
            (Self::InlineDescription, _) => "Process URL: {url}",
            (Self::ErrRateLimited, Ru) => "платформа ограничила запросы, попробуйте через несколько минут",
            (Self::ErrRateLimited, En) => "the platform is rate limiting requests, try again in a few minutes",
            (Self::ErrPrivate, Ru) => "контент приватный",
            (Self::ErrPrivate, En) => "the content is private",
            (Self::ErrLoginRequired, Ru) => "платформа требует авторизацию",
            (Self::ErrLoginRequired, En) => "the platform requires authentication",
            (Self::ErrNotFound, Ru) => "контент не найден",
            (Self::ErrNotFound, En) => "the content was not found",
            (Self::ErrNoMedia, Ru) => "не найдено медиа для скачивания",
            (Self::ErrNoMedia, En) => "no downloadable media found",
            (Self::ErrTooLarge, Ru) => "файл слишком большой (лимит {limit})",
            (Self::ErrTooLarge, En) => "the file is too large (limit {limit})",
            (Self::ErrTimeout, Ru) => "превышено время ожидания",
            (Self::ErrTimeout, En) => "the download timed out",
            (Self::ErrNotConfigured, Ru) => "платформа не настроена на сервере",
            (Self::ErrNotConfigured, En) => "the platform is not configured on the server",
            (Self::ErrUnsupported, Ru) => "ссылка не поддерживается",
            (Self::ErrUnsupported, En) => "the link is not supported",
            (Self::ErrExtraction, Ru) => "ошибка извлечения: {details}",
            (Self::ErrExtraction, En) => "extraction error: {details}",
            (Self::ErrNetwork, Ru) => "ошибка сети",
            (Self::ErrNetwork, En) => "network error",
            (Self::ErrShuttingDown, Ru) => "бот перезапускается, попробуйте позже",
            (Self::ErrShuttingDown, En) => "the bot is restarting, try again later",
            (Self::ErrInternal, Ru) => "внутренняя ошибка",
            (Self::ErrInternal, En) => "internal error",
        }
    }
}

/// Localized text for a key without placeholders.
#[must_use]
pub fn t(lang: Language, key: Msg) -> String {
    key.template(lang).to_string()
}

/// Localized text with `{name}` placeholders filled in.
#[must_use]
pub fn tf(lang: Language, key: Msg, args: &[(&str, &str)]) -> String {
    let mut text = key.template(lang).to_string();
    for (name, value) in args {
        text = text.replace(&format!("{{{name}}}"), value);
    }
    text
}

/// Localized description of a download failure.
#[must_use]
pub fn describe_error(lang: Language, err: &DownloadError) -> String {
    match err {
        DownloadError::UnsupportedUrl(_) => t(lang, Msg::ErrUnsupported),
        DownloadError::RateLimited => t(lang, Msg::ErrRateLimited),
        DownloadError::PrivateContent => t(lang, Msg::ErrPrivate),
        DownloadError::LoginRequired => t(lang, Msg::ErrLoginRequired),
        DownloadError::NotFound => t(lang, Msg::ErrNotFound),
        DownloadError::NoMedia => t(lang, Msg::ErrNoMedia),
        DownloadError::FileTooLarge { limit, .. } => {
            tf(lang, Msg::ErrTooLarge, &[("limit", &format_size(*limit))])
        }
        DownloadError::Timeout(_) => t(lang, Msg::ErrTimeout),
        DownloadError::NotConfigured(_) => t(lang, Msg::ErrNotConfigured),
        DownloadError::Extraction(details) => {
            tf(lang, Msg::ErrExtraction, &[("details", &html_escape(details))])
        }
        DownloadError::Network(_) => t(lang, Msg::ErrNetwork),
        DownloadError::ShuttingDown => t(lang, Msg::ErrShuttingDown),
        DownloadError::Io(_) => t(lang, Msg::ErrInternal),
    }
}

/// Human-readable byte count, e.g. `50 MB`.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    if bytes >= MB {
        format!("{} MB", bytes / MB)
    } else {
        format!("{} KB", bytes.div_ceil(1024))
    }
}
