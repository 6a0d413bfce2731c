//! Slash-command parsing.

/// Commands the bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Settings,
    Donate,
    PaySupport,
    /// `/zen <url>`; `None` when the argument is missing.
    Zen(Option<String>),
}

impl Command {
    /// Parse a message text as a command.
    ///
    /// Accepts the `/cmd@botname args` form; commands addressed to another
    /// bot are ignored. Returns `None` for non-commands and unknown commands.
    #[must_use]
    pub fn parse(text: &str, bot_username: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let (head, args) = rest
            .split_once(char::is_whitespace)
            .map_or((rest, ""), |(h, a)| (h, a.trim()));

        let name = match head.split_once('@') {
            Some((name, target)) => {
                if !target.eq_ignore_ascii_case(bot_username) {
                    return None;
                }
                name
            }
            None => head,
        };

        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "settings" => Some(Self::Settings),
            "donate" => Some(Self::Donate),
            "paysupport" => Some(Self::PaySupport),
            "zen" => Some(Self::Zen(
                args.split_whitespace().next().map(ToString::to_string),
            )),
            _ => None,
        }
    }
}

/// First `http(s)://` token in a text.
#[must_use]
pub fn find_url(text: &str) -> Option<&str> {
    text.split_whitespace()
        .find(|word| word.starts_with("http://") || word.starts_with("https://"))
}

/// Whether a message mentions `@bot_username`.
#[must_use]
pub fn mentions(text: &str, bot_username: &str) -> bool {
    let mention = format!("@{}", bot_username.to_lowercase());
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == ',')
        .any(|word| word == mention)
}
