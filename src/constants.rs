//! Shared constants used across the application.

/// Browser user agent sent to platforms that reject non-browser clients.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Instagram web application id expected in the `X-IG-App-ID` header.
pub const INSTAGRAM_APP_ID: &str = "936619743392459";

/// Largest file a bot may upload through the public Bot API (50 MiB).
pub const TELEGRAM_UPLOAD_LIMIT_BYTES: u64 = 50 * 1024 * 1024;

/// Telegram Stars currency code used for donation invoices.
pub const STARS_CURRENCY: &str = "XTR";

/// Invoice payload identifying a donation.
pub const DONATE_PAYLOAD: &str = "donate_stars";

/// Donation amount in stars.
pub const DONATE_AMOUNT_STARS: u32 = 100;
