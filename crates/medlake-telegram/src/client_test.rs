use super::*;

fn classify_value(
    status: u16,
    header: Option<u64>,
    body: serde_json::Value,
) -> Result<Reply<serde_json::Value>, TelegramError> {
    classify(status, header, &body.to_string(), "getChatHistory", Some("chemed"))
}

#[test]
fn ok_envelope_yields_result() {
    let reply = classify_value(200, None, serde_json::json!({ "ok": true, "result": [1, 2] }));
    assert!(matches!(reply, Ok(Reply::Ok(v)) if v == serde_json::json!([1, 2])));
}

#[test]
fn ok_without_result_is_an_api_error() {
    let reply = classify_value(200, None, serde_json::json!({ "ok": true }));
    assert!(matches!(reply, Err(TelegramError::Api { .. })));
}

#[test]
fn malformed_success_body_is_deserialize_error() {
    let reply = classify::<Vec<i64>>(200, None, "not json", "getChatHistory", None);
    assert!(matches!(reply, Err(TelegramError::Deserialize { .. })));
}

#[test]
fn rate_limit_prefers_parameters() {
    let reply = classify_value(
        429,
        Some(9),
        serde_json::json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 7",
            "parameters": { "retry_after": 5 }
        }),
    );
    assert!(matches!(reply, Ok(Reply::RetryAfter(d)) if d == Duration::from_secs(5)));
}

#[test]
fn rate_limit_falls_back_to_header() {
    let reply = classify_value(
        429,
        Some(9),
        serde_json::json!({ "ok": false, "error_code": 429, "description": "Too Many Requests" }),
    );
    assert!(matches!(reply, Ok(Reply::RetryAfter(d)) if d == Duration::from_secs(9)));
}

#[test]
fn rate_limit_falls_back_to_description() {
    let reply = classify_value(
        429,
        None,
        serde_json::json!({ "ok": false, "error_code": 429, "description": "Too Many Requests: retry after 7" }),
    );
    assert!(matches!(reply, Ok(Reply::RetryAfter(d)) if d == Duration::from_secs(7)));
}

#[test]
fn flood_wait_description_is_understood() {
    let reply = classify_value(
        400,
        None,
        serde_json::json!({ "ok": false, "error_code": 429, "description": "FLOOD_WAIT_12" }),
    );
    assert!(matches!(reply, Ok(Reply::RetryAfter(d)) if d == Duration::from_secs(12)));
}

#[test]
fn rate_limit_without_any_duration_waits_a_minute() {
    let reply = classify_value(429, None, serde_json::json!({ "ok": false }));
    assert!(matches!(reply, Ok(Reply::RetryAfter(d)) if d == Duration::from_secs(60)));
}

#[test]
fn unauthorized_is_authentication_error() {
    let reply = classify_value(
        401,
        None,
        serde_json::json!({ "ok": false, "error_code": 401, "description": "Unauthorized" }),
    );
    assert!(matches!(reply, Err(TelegramError::Authentication(_))));
}

#[test]
fn private_channel_is_access_denied() {
    let reply = classify_value(
        400,
        None,
        serde_json::json!({ "ok": false, "error_code": 400, "description": "Bad Request: CHANNEL_PRIVATE" }),
    );
    match reply {
        Err(TelegramError::AccessDenied { channel, reason }) => {
            assert_eq!(channel, "chemed");
            assert!(reason.contains("CHANNEL_PRIVATE"));
        }
        other => panic!("expected AccessDenied, got {other:?}"),
    }
}

#[test]
fn forbidden_is_access_denied() {
    let reply = classify_value(
        403,
        None,
        serde_json::json!({ "ok": false, "error_code": 403, "description": "Forbidden: bot is not a member" }),
    );
    assert!(matches!(reply, Err(TelegramError::AccessDenied { .. })));
}

#[test]
fn chat_not_found_is_not_found() {
    let reply = classify_value(
        400,
        None,
        serde_json::json!({ "ok": false, "error_code": 400, "description": "Bad Request: chat not found" }),
    );
    assert!(matches!(reply, Ok(Reply::NotFound { code: 400, .. })));
}

#[test]
fn other_errors_are_api_errors() {
    let reply = classify_value(
        400,
        None,
        serde_json::json!({ "ok": false, "error_code": 400, "description": "Bad Request: message is too long" }),
    );
    assert!(matches!(reply, Err(TelegramError::Api { code: 400, .. })));
}

#[test]
fn non_json_error_body_keeps_status() {
    let reply = classify::<serde_json::Value>(502, None, "<html>Bad Gateway</html>", "getChat", None);
    match reply {
        Err(TelegramError::Api { code, description }) => {
            assert_eq!(code, 502);
            assert!(description.contains("Bad Gateway"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[test]
fn chat_id_prefixes_usernames_only() {
    assert_eq!(chat_id("chemed"), "@chemed");
    assert_eq!(chat_id("@chemed"), "@chemed");
    assert_eq!(chat_id("-1001234"), "-1001234");
}

#[test]
fn settings_debug_redacts_secrets() {
    let settings = ClientSettings {
        api_id: 1,
        api_hash: "hash-secret".to_owned(),
        bot_token: "123:token-secret".to_owned(),
        base_url: "http://localhost".to_owned(),
        timeout_secs: 5,
        max_retries: 0,
        backoff_base_ms: 0,
        user_agent: "test".to_owned(),
        data_dir: PathBuf::from("/tmp"),
        session_file: PathBuf::from("/tmp/telegram_session.txt"),
    };
    let rendered = format!("{settings:?}");
    assert!(!rendered.contains("hash-secret"));
    assert!(!rendered.contains("token-secret"));
}
