//! Integration tests for the Bot API client against a mock server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zenload::telegram::types::{InlineKeyboardButton, ReplyMarkup};
use zenload::telegram::{TelegramClient, TelegramError, UploadKind};

const TOKEN: &str = "123:abc";

fn client(server: &MockServer) -> TelegramClient {
    TelegramClient::new(reqwest::Client::new(), &server.uri(), TOKEN)
}

fn message(message_id: i64, chat_id: i64) -> serde_json::Value {
    json!({
        "message_id": message_id,
        "chat": {"id": chat_id, "type": "private"},
        "date": 1_700_000_000
    })
}

#[tokio::test]
async fn test_get_me() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/getMe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"id": 1, "is_bot": true, "first_name": "Zenload", "username": "zenload_bot"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let me = client(&server).get_me().await.expect("getMe failed");
    assert_eq!(me.id, 1);
    assert_eq!(me.username.as_deref(), Some("zenload_bot"));
}

#[tokio::test]
async fn test_send_message_with_markup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_partial_json(json!({
            "chat_id": 42,
            "text": "hello",
            "parse_mode": "HTML",
            "reply_markup": {"inline_keyboard": [[{"text": "A", "callback_data": "quality:best"}]]}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": message(7, 42)})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let markup = ReplyMarkup::inline(vec![vec![InlineKeyboardButton::callback("A", "quality:best")]]);
    let sent = client(&server)
        .send_message(42, "hello", Some(&markup))
        .await
        .expect("sendMessage failed");
    assert_eq!(sent.message_id, 7);
}

#[tokio::test]
async fn test_api_error_and_not_modified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/editMessageText"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: message is not modified"
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .edit_message_text(1, 2, "same", None)
        .await
        .unwrap_err();
    assert!(err.is_not_modified());
    assert!(matches!(err, TelegramError::Api { code: 400, .. }));
}

#[tokio::test]
async fn test_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/getUpdates"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 3",
            "parameters": {"retry_after": 3}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .get_updates(0, Duration::from_secs(0))
        .await
        .unwrap_err();
    assert!(matches!(err, TelegramError::RetryAfter(3)));
}

#[tokio::test]
async fn test_get_updates_decodes_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/getUpdates"))
        .and(body_partial_json(json!({"offset": 11})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [
                {"update_id": 11, "message": {
                    "message_id": 1,
                    "from": {"id": 5, "is_bot": false, "first_name": "A"},
                    "chat": {"id": 5, "type": "private"},
                    "date": 1,
                    "text": "/start"
                }},
                {"update_id": 12, "inline_query": {
                    "id": "q1",
                    "from": {"id": 5, "is_bot": false, "first_name": "A"},
                    "query": "https://youtu.be/abc",
                    "offset": ""
                }}
            ]
        })))
        .mount(&server)
        .await;

    let updates = client(&server)
        .get_updates(11, Duration::from_secs(0))
        .await
        .expect("getUpdates failed");
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("/start"));
    assert_eq!(updates[1].inline_query.as_ref().unwrap().query, "https://youtu.be/abc");
}

#[tokio::test]
async fn test_send_file_is_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendVideo"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": message(9, 42)})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("clip.mp4");
    std::fs::write(&file, vec![0u8; 4096]).unwrap();

    let sent = client(&server)
        .send_file(42, UploadKind::Video, &file, "clip.mp4", "<b>caption</b>")
        .await
        .expect("sendVideo failed");
    assert_eq!(sent.message_id, 9);
}

#[tokio::test]
async fn test_send_file_missing_file() {
    let server = MockServer::start().await;
    let err = client(&server)
        .send_file(
            42,
            UploadKind::Document,
            std::path::Path::new("/nonexistent/zenload/file.bin"),
            "file.bin",
            "",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TelegramError::Io(_)));
}
