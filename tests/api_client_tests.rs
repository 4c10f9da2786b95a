//! HTTP layer against a mock platform: bearer attachment, 401 handling,
//! login flows and resource routes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use baas_client::app::Application;
use baas_client::auth::{LoginRequest, Token, UserInfo};
use baas_client::config::ClientConfig;
use baas_client::error::SdkError;
use baas_client::events::{EventOrigin, LifecycleEvent};
use baas_client::resources::Resource;
use baas_client::routes::{FindOptions, GetOptions};
use baas_client::storage::MemoryStorage;
use common::EventRecorder;
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Article {
    id: String,
    title: String,
}

fn article(id: &str, title: &str) -> Article {
    Article {
        id: id.to_string(),
        title: title.to_string(),
    }
}

fn application(server: &MockServer, medium: &MemoryStorage) -> Application {
    let config = ClientConfig::new("app")
        .with_api_root_url(server.address().to_string())
        .with_use_ssl(false);
    Application::new(config, Arc::new(medium.context())).unwrap()
}

#[tokio::test]
async fn find_sends_bearer_token_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/beta/app/article"))
        .and(header("authorization", "Bearer abc"))
        .and(query_param("searchQuery", "rust"))
        .and(query_param("rpp", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "item": [{"id": "1", "title": "Ownership"}],
            "page": 1,
            "rpp": 5,
            "totalRecords": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let medium = MemoryStorage::new();
    let app = application(&server, &medium);
    app.tokens().store(Some(Token::bearer("abc")));

    let articles = app.resource::<Article>(Resource::Articles).unwrap();
    let page = articles
        .find(&FindOptions::builder().search_query("rust").rpp(5).build())
        .await
        .unwrap();

    assert_eq!(page.item, vec![article("1", "Ownership")]);
    assert_eq!(page.total_records, 1);
}

#[tokio::test]
async fn unauthorized_response_clears_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/beta/app/article/1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Token expired"})))
        .mount(&server)
        .await;

    let medium = MemoryStorage::new();
    let app = application(&server, &medium);
    let events = EventRecorder::attach(app.relay());
    app.tokens().store(Some(Token::bearer("abc").with_expires_in(3600)));

    let articles = app.resource::<Article>(Resource::Articles).unwrap();
    let err = articles.get("1", &GetOptions::default()).await.unwrap_err();

    assert!(matches!(err, SdkError::Authentication(ref m) if m == "Token expired"));
    assert!(!app.tokens().is_authenticated());
    assert!(!app.tokens().is_timer_armed());
    assert_eq!(events.count(LifecycleEvent::TokenExpired, EventOrigin::Local), 1);
}

#[tokio::test]
async fn late_unauthorized_response_keeps_a_newer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/beta/app/article/1"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let medium = MemoryStorage::new();
    let app = application(&server, &medium);
    let other_tab = application(&server, &medium);
    let events = EventRecorder::attach(app.relay());
    app.tokens().store(Some(Token::bearer("old").with_expires_in(3600)));

    let articles = app.resource::<Article>(Resource::Articles).unwrap();
    let relogin = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        other_tab
            .tokens()
            .store(Some(Token::bearer("newer").with_expires_in(3600)));
    };
    let get_options = GetOptions::default();
    let (result, ()) = tokio::join!(articles.get("1", &get_options), relogin);

    assert!(matches!(result, Err(SdkError::Authentication(_))));
    assert_eq!(app.tokens().get().unwrap().token, "newer");
    assert_eq!(events.count(LifecycleEvent::TokenExpired, EventOrigin::Local), 0);
}

#[tokio::test]
async fn unauthorized_without_token_changes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let medium = MemoryStorage::new();
    let app = application(&server, &medium);
    let events = EventRecorder::attach(app.relay());

    let articles = app.resource::<Article>(Resource::Articles).unwrap();
    let err = articles.find(&FindOptions::default()).await.unwrap_err();

    assert!(matches!(err, SdkError::Authentication(_)));
    assert_eq!(events.total(), 0);
}

#[tokio::test]
async fn platform_errors_keep_details() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/beta/app/article/missing"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"message": "Resource not found", "errorCode": 404})),
        )
        .mount(&server)
        .await;

    let medium = MemoryStorage::new();
    let app = application(&server, &medium);
    let articles = app.resource::<Article>(Resource::Articles).unwrap();
    let err = articles
        .get("missing", &GetOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    match err {
        SdkError::Api { message, details, .. } => {
            assert_eq!(message, "Resource not found");
            assert_eq!(details.unwrap().error_code, Some(404));
        }
        other => panic!("expected Api, got {other:?}"),
    }
}

#[tokio::test]
async fn crud_and_batch_routes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/beta/app/article"))
        .and(body_json(json!({"id": "", "title": "Draft"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "7", "title": "Draft"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/beta/app/article/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "7", "title": "Final"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/beta/app/article/7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/beta/app/article/batch"))
        .and(body_json(json!(["1", "2"])))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let medium = MemoryStorage::new();
    let app = application(&server, &medium);
    let articles = app.resource::<Article>(Resource::Articles).unwrap();

    let created = articles.create(&article("", "Draft")).await.unwrap();
    assert_eq!(created, article("7", "Draft"));
    let updated = articles.update("7", &article("7", "Final")).await.unwrap();
    assert_eq!(updated.title, "Final");
    articles.delete("7").await.unwrap();
    articles.batch_delete(&["1", "2"]).await.unwrap();
}

#[tokio::test]
async fn login_posts_password_grant_and_stores_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/beta/app/login"))
        .and(query_param("options", "sliding"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=ana"))
        .and(body_string_contains("password=s3cret%21"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "xyz",
            "token_type": "bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let medium = MemoryStorage::new();
    let app = application(&server, &medium);
    let events = EventRecorder::attach(app.relay());

    let token = app
        .login()
        .login(
            LoginRequest::builder()
                .username("ana")
                .password("s3cret!")
                .options("sliding")
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(token.token, "xyz");
    assert_eq!(token.expires_in, Some(3600));
    assert!(token.expire_time.is_some());
    assert_eq!(app.tokens().get(), Some(token));
    assert!(app.tokens().is_timer_armed());
    assert_eq!(events.count(LifecycleEvent::TokenUpdated, EventOrigin::Local), 1);
}

#[tokio::test]
async fn rejected_login_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/beta/app/login"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
        )
        .mount(&server)
        .await;

    let medium = MemoryStorage::new();
    let app = application(&server, &medium);
    let err = app
        .login()
        .login(LoginRequest::builder().username("ana").password("nope").build())
        .await
        .unwrap_err();

    assert!(matches!(err, SdkError::Authentication(ref m) if m == "invalid_grant"));
    assert!(!app.tokens().is_authenticated());
}

#[tokio::test]
async fn load_user_caches_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/beta/app/login"))
        .and(query_param("embed", "permissions"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userName": "ana",
            "email": "ana@example.com",
            "roles": ["Administrators"],
            "permissions": {"article": ["Read"]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let medium = MemoryStorage::new();
    let app = application(&server, &medium);
    app.tokens().store(Some(Token::bearer("abc")));

    let user = app.login().load_user(Some("permissions")).await.unwrap();

    assert_eq!(user.user_name, "ana");
    assert!(user.is_in_role("administrators"));
    assert!(user.extra.contains_key("permissions"));
    assert_eq!(app.users().get(), Some(user));
}

#[tokio::test]
async fn load_user_requires_a_session() {
    let server = MockServer::start().await;
    let medium = MemoryStorage::new();
    let app = application(&server, &medium);

    let err = app.login().load_user(None).await.unwrap_err();
    assert!(matches!(err, SdkError::InvalidState(_)));
}

#[tokio::test]
async fn logout_revokes_token_and_clears_session() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/beta/app/login"))
        .and(body_json(json!({"token": "abc", "type": "bearer"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let medium = MemoryStorage::new();
    let app = application(&server, &medium);
    app.tokens().store(Some(Token::bearer("abc")));
    app.users().set(Some(UserInfo::new("ana")));

    app.login().logout().await.unwrap();

    assert!(!app.tokens().is_authenticated());
    assert_eq!(app.users().get(), None);
}

#[tokio::test]
async fn logout_clears_session_even_when_revocation_fails() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/beta/app/login"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let medium = MemoryStorage::new();
    let app = application(&server, &medium);
    app.tokens().store(Some(Token::bearer("abc")));
    app.users().set(Some(UserInfo::new("ana")));

    let err = app.login().logout().await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(!app.tokens().is_authenticated());
    assert_eq!(app.users().get(), None);
}

#[tokio::test]
async fn application_resumes_persisted_session() {
    let server = MockServer::start().await;
    let medium = MemoryStorage::new();
    let first = application(&server, &medium);
    first
        .tokens()
        .store(Some(Token::bearer("abc").with_expires_in(3600)));

    let second = application(&server, &medium);

    assert!(second.tokens().is_timer_armed());
    assert_eq!(second.tokens().get(), first.tokens().get());
}
