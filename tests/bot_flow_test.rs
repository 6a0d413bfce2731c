//! End-to-end update handling against a mock Bot API.

mod common;

use std::num::NonZeroU32;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zenload::bot::Bot;
use zenload::db::{update_user_quality, Database, DefaultQuality};
use zenload::locales::{t, Language, Msg};
use zenload::telegram::types::Update;
use zenload::telegram::TelegramClient;

use common::{fake_dispatcher, request_dirs, FAKE_URL};

const USER_ID: i64 = 5;

struct Harness {
    bot: Bot,
    api: MockServer,
    media: MockServer,
    db: Database,
    downloads: TempDir,
}

async fn harness(requests_per_minute: u32) -> Harness {
    let api = MockServer::start().await;
    let media = MockServer::start().await;
    let downloads = TempDir::new().unwrap();

    let db = Database::new(&downloads.path().join("test.sqlite"))
        .await
        .unwrap();
    let dispatcher = fake_dispatcher(
        downloads.path(),
        format!("{}/media.mp4", media.uri()),
        None,
    );
    let client = TelegramClient::new(reqwest::Client::new(), &api.uri(), "1:token");
    let bot = Bot::new(
        client,
        db.clone(),
        Arc::new(dispatcher),
        "zenload_bot",
        NonZeroU32::new(requests_per_minute).unwrap(),
    );

    Harness {
        bot,
        api,
        media,
        db,
        downloads,
    }
}

fn api_path(method_name: &str) -> String {
    format!("/bot1:token/{method_name}")
}

fn sent_message(message_id: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "ok": true,
        "result": {
            "message_id": message_id,
            "chat": {"id": USER_ID, "type": "private"},
            "date": 1_700_000_000
        }
    }))
}

fn ok_true() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true}))
}

fn user() -> serde_json::Value {
    json!({"id": USER_ID, "is_bot": false, "first_name": "Ann", "username": "ann"})
}

fn text_update(update_id: i64, text: &str) -> Update {
    serde_json::from_value(json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "from": user(),
            "chat": {"id": USER_ID, "type": "private"},
            "date": 1_700_000_000,
            "text": text
        }
    }))
    .unwrap()
}

fn callback_update(update_id: i64, data: &str, message_id: i64) -> Update {
    serde_json::from_value(json!({
        "update_id": update_id,
        "callback_query": {
            "id": format!("cb{update_id}"),
            "from": user(),
            "message": {
                "message_id": message_id,
                "chat": {"id": USER_ID, "type": "private"},
                "date": 1_700_000_000,
                "text": "..."
            },
            "data": data
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_start_sends_welcome_with_keyboard() {
    let h = harness(5).await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .and(body_partial_json(json!({
            "chat_id": USER_ID,
            "text": t(Language::Ru, Msg::Welcome),
            "reply_markup": {
                "keyboard": [[
                    {"text": t(Language::Ru, Msg::BtnSettings)},
                    {"text": t(Language::Ru, Msg::BtnHelp)},
                    {"text": t(Language::Ru, Msg::BtnDonate)}
                ]],
                "resize_keyboard": true
            }
        })))
        .respond_with(sent_message(1))
        .expect(1)
        .mount(&h.api)
        .await;

    h.bot.handle_update(text_update(1, "/start")).await;

    // The profile is recorded on first contact
    let settings = zenload::db::get_user_settings(h.db.pool(), USER_ID)
        .await
        .unwrap()
        .expect("user settings missing");
    assert_eq!(settings.username.as_deref(), Some("ann"));
}

#[tokio::test]
async fn test_zen_without_url() {
    let h = harness(5).await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .and(body_partial_json(json!({"text": t(Language::Ru, Msg::MissingUrl)})))
        .respond_with(sent_message(1))
        .expect(1)
        .mount(&h.api)
        .await;

    h.bot.handle_update(text_update(1, "/zen")).await;
}

#[tokio::test]
async fn test_unsupported_url() {
    let h = harness(5).await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .and(body_partial_json(json!({"text": t(Language::Ru, Msg::UnsupportedUrl)})))
        .respond_with(sent_message(1))
        .expect(1)
        .mount(&h.api)
        .await;

    h.bot
        .handle_update(text_update(1, "https://example.com/not-a-video"))
        .await;
}

#[tokio::test]
async fn test_zen_asks_for_quality_then_downloads() {
    let h = harness(5).await;

    Mock::given(method("GET"))
        .and(path("/media.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 4096]))
        .expect(1)
        .mount(&h.media)
        .await;

    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .and(body_partial_json(json!({"text": t(Language::Ru, Msg::Processing)})))
        .respond_with(sent_message(100))
        .expect(1)
        .mount(&h.api)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("editMessageText")))
        .and(body_partial_json(json!({
            "message_id": 100,
            "text": t(Language::Ru, Msg::SelectQuality),
            "reply_markup": {"inline_keyboard": [
                [{"text": "720p (mp4)", "callback_data": "quality:hd"}],
                [{"text": t(Language::Ru, Msg::BestQuality), "callback_data": "quality:best"}]
            ]}
        })))
        .respond_with(ok_true())
        .expect(1)
        .with_priority(1)
        .mount(&h.api)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("editMessageText")))
        .respond_with(ok_true())
        .mount(&h.api)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("answerCallbackQuery")))
        .respond_with(ok_true())
        .expect(1)
        .mount(&h.api)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("sendVideo")))
        .respond_with(sent_message(101))
        .expect(1)
        .mount(&h.api)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("deleteMessage")))
        .and(body_partial_json(json!({"message_id": 100})))
        .respond_with(ok_true())
        .expect(1)
        .mount(&h.api)
        .await;

    h.bot
        .handle_update(text_update(1, &format!("/zen {FAKE_URL}")))
        .await;
    h.bot.handle_update(callback_update(2, "quality:hd", 100)).await;

    assert_eq!(request_dirs(h.downloads.path()), 0);
}

#[tokio::test]
async fn test_best_default_downloads_immediately() {
    let h = harness(5).await;
    update_user_quality(h.db.pool(), USER_ID, DefaultQuality::Best)
        .await
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/media.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 1024]))
        .expect(1)
        .mount(&h.media)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .respond_with(sent_message(100))
        .expect(1)
        .mount(&h.api)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("editMessageText")))
        .respond_with(ok_true())
        .mount(&h.api)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("sendVideo")))
        .respond_with(sent_message(101))
        .expect(1)
        .mount(&h.api)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("deleteMessage")))
        .respond_with(ok_true())
        .expect(1)
        .mount(&h.api)
        .await;

    h.bot.handle_update(text_update(1, FAKE_URL)).await;
}

#[tokio::test]
async fn test_expired_selection() {
    let h = harness(5).await;
    Mock::given(method("POST"))
        .and(path(api_path("answerCallbackQuery")))
        .respond_with(ok_true())
        .mount(&h.api)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("editMessageText")))
        .and(body_partial_json(json!({"text": t(Language::Ru, Msg::SessionExpired)})))
        .respond_with(ok_true())
        .expect(1)
        .mount(&h.api)
        .await;

    h.bot.handle_update(callback_update(1, "quality:best", 50)).await;
}

#[tokio::test]
async fn test_per_user_quota() {
    let h = harness(1).await;
    update_user_quality(h.db.pool(), USER_ID, DefaultQuality::Ask)
        .await
        .unwrap();

    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .and(body_partial_json(json!({"text": t(Language::Ru, Msg::SlowDown)})))
        .respond_with(sent_message(2))
        .expect(1)
        .with_priority(1)
        .mount(&h.api)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .respond_with(sent_message(1))
        .mount(&h.api)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("editMessageText")))
        .respond_with(ok_true())
        .mount(&h.api)
        .await;

    h.bot.handle_update(text_update(1, FAKE_URL)).await;
    h.bot.handle_update(text_update(2, FAKE_URL)).await;
}

#[tokio::test]
async fn test_settings_language_change() {
    let h = harness(5).await;
    Mock::given(method("POST"))
        .and(path(api_path("answerCallbackQuery")))
        .respond_with(ok_true())
        .mount(&h.api)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .and(body_partial_json(json!({"text": t(Language::En, Msg::Welcome)})))
        .respond_with(sent_message(3))
        .expect(1)
        .mount(&h.api)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("editMessageText")))
        .and(body_partial_json(json!({
            "message_id": 20,
            "text": "⚙️ Settings\n\nLanguage: EN\nDefault quality: Ask every time"
        })))
        .respond_with(ok_true())
        .expect(1)
        .mount(&h.api)
        .await;

    h.bot.handle_update(callback_update(1, "set_lang:en", 20)).await;

    let settings = zenload::db::get_user_settings(h.db.pool(), USER_ID)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settings.language(), Language::En);
}

#[tokio::test]
async fn test_inline_query() {
    let h = harness(5).await;
    Mock::given(method("POST"))
        .and(path(api_path("answerInlineQuery")))
        .and(body_partial_json(json!({
            "inline_query_id": "iq1",
            "results": [{
                "type": "article",
                "title": "Download from URL",
                "description": "Process URL: https://youtu.be/abc",
                "input_message_content": {"message_text": "/zen https://youtu.be/abc"}
            }]
        })))
        .respond_with(ok_true())
        .expect(1)
        .mount(&h.api)
        .await;

    let update: Update = serde_json::from_value(json!({
        "update_id": 1,
        "inline_query": {"id": "iq1", "from": user(), "query": "https://youtu.be/abc", "offset": ""}
    }))
    .unwrap();
    h.bot.handle_update(update).await;

    // Empty queries are ignored
    let update: Update = serde_json::from_value(json!({
        "update_id": 2,
        "inline_query": {"id": "iq2", "from": user(), "query": "  ", "offset": ""}
    }))
    .unwrap();
    h.bot.handle_update(update).await;
}

#[tokio::test]
async fn test_pre_checkout_for_donation() {
    let h = harness(5).await;
    Mock::given(method("POST"))
        .and(path(api_path("answerPreCheckoutQuery")))
        .and(body_partial_json(json!({"pre_checkout_query_id": "pc1", "ok": true})))
        .respond_with(ok_true())
        .expect(1)
        .mount(&h.api)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("answerPreCheckoutQuery")))
        .and(body_partial_json(json!({"pre_checkout_query_id": "pc2", "ok": false})))
        .respond_with(ok_true())
        .expect(1)
        .mount(&h.api)
        .await;

    for (id, payload) in [("pc1", "donate_stars"), ("pc2", "something_else")] {
        let update: Update = serde_json::from_value(json!({
            "update_id": 1,
            "pre_checkout_query": {
                "id": id,
                "from": user(),
                "currency": "XTR",
                "total_amount": 100,
                "invoice_payload": payload
            }
        }))
        .unwrap();
        h.bot.handle_update(update).await;
    }
}

#[tokio::test]
async fn test_donate_sends_stars_invoice() {
    let h = harness(5).await;
    Mock::given(method("POST"))
        .and(path(api_path("sendInvoice")))
        .and(body_partial_json(json!({
            "chat_id": USER_ID,
            "payload": "donate_stars",
            "currency": "XTR",
            "provider_token": "",
            "prices": [{"amount": 100}]
        })))
        .respond_with(sent_message(4))
        .expect(1)
        .mount(&h.api)
        .await;

    h.bot.handle_update(text_update(1, "/donate")).await;
}
