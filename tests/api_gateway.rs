use std::sync::Arc;

use metric_harness::api::{
    ApiError, ApiGateway, CallParams, CredentialCache, HttpMethod, MonitorService,
};
use metric_harness::config::ApiSettings;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn gateway(server: &MockServer, cache: Arc<CredentialCache>) -> ApiGateway {
    ApiGateway::new(server.uri(), "app", "secret", cache).unwrap()
}

#[tokio::test]
async fn call_sends_credential_header_and_returns_data() {
    let server = MockServer::start().await;
    let credential = r#"{"bk_app_code":"app","bk_app_secret":"secret","bk_username":"bk_chat"}"#;

    Mock::given(method("POST"))
        .and(path("/do_thing/"))
        .and(move |req: &Request| {
            req.headers
                .get("x-bkapi-authorization")
                .and_then(|v| v.to_str().ok())
                == Some(credential)
        })
        .and(header("x-trace", "t-1"))
        .and(body_json(json!({"a": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": true,
            "code": 0,
            "data": {"ok": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server, Arc::new(CredentialCache::new()));
    let params = CallParams::json(json!({"a": 1})).with_header("x-trace", "t-1");
    let data = gw.call("do_thing/", HttpMethod::Post, params).await.unwrap();
    assert_eq!(data, json!({"ok": 1}));
}

#[tokio::test]
async fn get_sends_query_parameters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/lookup/"))
        .and(query_param("bk_biz_id", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 0, "data": [1]})))
        .mount(&server)
        .await;

    let gw = gateway(&server, Arc::new(CredentialCache::new()));
    let params = CallParams::default().with_query("bk_biz_id", "2");
    let data = gw.call("lookup/", HttpMethod::Get, params).await.unwrap();
    assert_eq!(data, json!([1]));
}

#[tokio::test]
async fn rejected_action_carries_code_and_body() {
    let server = MockServer::start().await;
    let body = json!({"result": false, "code": 1306000, "message": "no permission"});

    Mock::given(method("POST"))
        .and(path("/deny/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
        .mount(&server)
        .await;

    let gw = gateway(&server, Arc::new(CredentialCache::new()));
    let err = gw
        .call("deny/", HttpMethod::Post, CallParams::default())
        .await
        .unwrap_err();
    match err {
        ApiError::ActionFailed { code, info } => {
            assert_eq!(code, json!(1306000));
            assert_eq!(info, body);
        }
        other => panic!("expected ActionFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn non_2xx_is_http_failed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/broken/"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({"result": true})))
        .mount(&server)
        .await;

    let gw = gateway(&server, Arc::new(CredentialCache::new()));
    let err = gw
        .call("broken/", HttpMethod::Post, CallParams::default())
        .await
        .unwrap_err();
    match err {
        ApiError::HttpFailed(status) => assert_eq!(status.as_u16(), 502),
        other => panic!("expected HttpFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn plain_text_body_is_action_failed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/text/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("gateway says hi"))
        .mount(&server)
        .await;

    let gw = gateway(&server, Arc::new(CredentialCache::new()));
    let err = gw
        .call("text/", HttpMethod::Post, CallParams::default())
        .await
        .unwrap_err();
    match err {
        ApiError::ActionFailed { code, info } => {
            assert_eq!(code, Value::Null);
            assert_eq!(info, json!("gateway says hi"));
        }
        other => panic!("expected ActionFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn transport_failure_is_network_error() {
    let cache = Arc::new(CredentialCache::new());
    // Nothing listens on port 1.
    let gw = ApiGateway::new("http://127.0.0.1:1", "app", "secret", cache).unwrap();
    let err = gw
        .call("x/", HttpMethod::Post, CallParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NetworkError(_)), "{err:?}");
}

#[tokio::test]
async fn products_share_one_cached_credential() {
    let server = MockServer::start().await;
    let cache = Arc::new(CredentialCache::new());
    let settings = ApiSettings::new(format!("{}/{{product}}", server.uri()), "app", "secret");

    Mock::given(method("POST"))
        .and(path("/bkcmdb/api/v3/biz/search/tencent"))
        .and(body_json(json!({"condition": {"bk_biz_id": 2}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": true,
            "data": {"count": 1, "info": [{"bk_biz_id": 2, "bk_biz_name": "Blueking"}]}
        })))
        .mount(&server)
        .await;

    let service = MonitorService::new(&settings, cache.clone()).unwrap();
    let again = MonitorService::new(&settings, cache.clone()).unwrap();
    assert_eq!(cache.len(), 1);

    let found = again.cmdb.business_by_id(2).await.unwrap();
    assert_eq!(found.count, 1);
    assert_eq!(found.first().unwrap()["bk_biz_name"], "Blueking");

    let first = cache.get("app").unwrap();
    let _ = service.cmdb.business_by_id(2).await.unwrap();
    assert_eq!(cache.get("app").unwrap(), first);
    assert_eq!(cache.len(), 1);
}
