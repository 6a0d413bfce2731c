//! Bot API objects, limited to the fields the bot reads or sends.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default)]
    pub inline_query: Option<InlineQuery>,
    #[serde(default)]
    pub pre_checkout_query: Option<PreCheckoutQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub is_premium: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatType,
    #[serde(default)]
    pub title: Option<String>,
}

impl Chat {
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.kind == ChatType::Private
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    pub phone_number: String,
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuccessfulPayment {
    pub currency: String,
    pub total_amount: i64,
    pub invoice_payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub contact: Option<Contact>,
    #[serde(default)]
    pub successful_payment: Option<SuccessfulPayment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    pub query: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreCheckoutQuery {
    pub id: String,
    pub from: User,
    pub currency: String,
    pub total_amount: i64,
    pub invoice_payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub status: String,
    pub user: User,
}

impl ChatMember {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self.status.as_str(), "creator" | "administrator")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardButton {
    #[must_use]
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

/// `reply_markup` variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline {
        inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
    },
    Keyboard {
        keyboard: Vec<Vec<KeyboardButton>>,
        resize_keyboard: bool,
        is_persistent: bool,
    },
}

impl ReplyMarkup {
    #[must_use]
    pub fn inline(rows: Vec<Vec<InlineKeyboardButton>>) -> Self {
        Self::Inline {
            inline_keyboard: rows,
        }
    }

    /// Persistent, resized reply keyboard from rows of labels.
    #[must_use]
    pub fn keyboard(rows: Vec<Vec<String>>) -> Self {
        Self::Keyboard {
            keyboard: rows
                .into_iter()
                .map(|row| row.into_iter().map(|text| KeyboardButton { text }).collect())
                .collect(),
            resize_keyboard: true,
            is_persistent: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LabeledPrice {
    pub label: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputTextMessageContent {
    pub message_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineQueryResultArticle {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub title: String,
    pub description: String,
    pub input_message_content: InputTextMessageContent,
}

impl InlineQueryResultArticle {
    #[must_use]
    pub fn new(id: String, title: String, description: String, message_text: String) -> Self {
        Self {
            kind: "article",
            id,
            title,
            description,
            input_message_content: InputTextMessageContent { message_text },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_message_update() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 5,
                "from": {"id": 42, "is_bot": false, "first_name": "Ann", "username": "ann"},
                "chat": {"id": -100123, "type": "supergroup", "title": "Group"},
                "date": 1700000000,
                "text": "@zenload_bot https://vm.tiktok.com/x/"
            }
        }))
        .unwrap();

        let message = update.message.unwrap();
        assert_eq!(message.chat.kind, ChatType::Supergroup);
        assert!(!message.chat.is_private());
        assert_eq!(message.from.unwrap().username.as_deref(), Some("ann"));
        assert!(update.callback_query.is_none());
    }

    #[test]
    fn test_serialize_markup() {
        let inline = ReplyMarkup::inline(vec![vec![InlineKeyboardButton::callback("720p", "quality:22")]]);
        assert_eq!(
            serde_json::to_value(&inline).unwrap(),
            serde_json::json!({"inline_keyboard": [[{"text": "720p", "callback_data": "quality:22"}]]})
        );

        let keyboard = ReplyMarkup::keyboard(vec![vec!["A".to_string(), "B".to_string()]]);
        assert_eq!(
            serde_json::to_value(&keyboard).unwrap(),
            serde_json::json!({
                "keyboard": [[{"text": "A"}, {"text": "B"}]],
                "resize_keyboard": true,
                "is_persistent": true
            })
        );
    }

    #[test]
    fn test_chat_member_admin() {
        let member: ChatMember = serde_json::from_value(serde_json::json!({
            "status": "creator",
            "user": {"id": 1, "is_bot": false, "first_name": "A"}
        }))
        .unwrap();
        assert!(member.is_admin());
    }
}
