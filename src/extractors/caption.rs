//! Caption formatting shared by extractors.

/// Compact view/like count: `1.2M`, `3.4K`, or the plain number.
#[must_use]
pub fn format_count(count: Option<u64>) -> String {
    match count {
        None | Some(0) => "0".to_string(),
        Some(n) if n >= 1_000_000 => format!("{:.1}M", n as f64 / 1_000_000.0),
        Some(n) if n >= 1_000 => format!("{:.1}K", n as f64 / 1_000.0),
        Some(n) => n.to_string(),
    }
}

/// Escape text for Telegram's HTML parse mode.
#[must_use]
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// `m:ss` from a duration in seconds.
#[must_use]
pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

const MAX_STEM_CHARS: usize = 100;

/// Leaves room for the extension under the 255-byte file name limit.
const MAX_STEM_BYTES: usize = 200;

/// Make a string safe to use as a file name stem.
#[must_use]
pub fn sanitize_file_stem(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    let mut stem = String::new();
    for c in trimmed.chars().take(MAX_STEM_CHARS) {
        if stem.len() + c.len_utf8() > MAX_STEM_BYTES {
            break;
        }
        stem.push(c);
    }
    if stem.is_empty() {
        stem.push_str("media");
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(None), "0");
        assert_eq!(format_count(Some(0)), "0");
        assert_eq!(format_count(Some(999)), "999");
        assert_eq!(format_count(Some(1_500)), "1.5K");
        assert_eq!(format_count(Some(1_234_567)), "1.2M");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<b>Tom & \"Jerry\"</b>"), "&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(215), "3:35");
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("a/b:c"), "a_b_c");
        assert_eq!(sanitize_file_stem("  ..  "), "media");
        assert_eq!(sanitize_file_stem(&"x".repeat(300)).len(), 100);
        let emoji = sanitize_file_stem(&"🎵".repeat(100));
        assert!(emoji.len() <= 200);
        assert_eq!(emoji.chars().count(), 50);
    }
}
