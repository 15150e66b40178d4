mod common;

use common::MockTransport;
use driver_auth::{AuthError, AuthErrorKind, Location, Method, SessionState, TransportError};
use serde_json::json;
use std::time::Duration;
use token_store::{now_millis, Credential, Identity, MemoryTokenStore, StoredSnapshot, TokenStore};

fn stored_session(access: &str, refresh: &str) -> Box<dyn TokenStore> {
    let store = MemoryTokenStore::new();
    store
        .save(&StoredSnapshot::new(
            Credential {
                access_token: access.to_string(),
                refresh_token: refresh.to_string(),
                token_type: "bearer".to_string(),
                expires_at: now_millis() + 600_000,
            },
            Identity::placeholder("session-1"),
        ))
        .unwrap();
    Box::new(store)
}

fn expired_jwt(driver_id: i64) -> String {
    common::jwt(driver_id, common::now_secs() - 60)
}

#[tokio::test]
async fn exchange_without_refresh_token_leaves_access_token() {
    let transport = MockTransport::new();
    let manager = common::manager_with_store(&transport, stored_session("access-only", ""));
    assert_eq!(manager.state(), SessionState::Authenticated);

    let err = manager
        .exchange_refresh_for_access_token(None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), AuthErrorKind::Authentication);
    assert_eq!(manager.credential().unwrap().access_token, "access-only");
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn exchange_without_session_is_authentication_error() {
    let transport = MockTransport::new();
    let manager = common::manager(&transport);

    let err = manager
        .exchange_refresh_for_access_token(None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), AuthErrorKind::Authentication);
}

#[tokio::test]
async fn exchange_replaces_access_token_only() {
    let transport = MockTransport::new();
    let manager = common::manager(&transport);
    let refresh = common::live_jwt(7);
    common::sign_in_with_sms(&transport, &manager, &refresh).await;

    let exp = common::now_secs() + 900;
    let access = common::jwt(7, exp);
    transport.queue_ok(json!({"access_token": access, "token_type": "Bearer"}));
    let returned = manager
        .exchange_refresh_for_access_token(Some(Location { lat: 52.2, lng: 21.0 }))
        .await
        .unwrap();

    assert_eq!(returned, access);
    let credential = manager.credential().unwrap();
    assert_eq!(credential.access_token, access);
    assert_eq!(credential.refresh_token, refresh);
    assert_eq!(credential.token_type, "Bearer");
    assert_eq!(credential.expires_at, exp * 1000);
    assert_eq!(manager.identity().unwrap().driver_id, 7);
    assert_eq!(manager.state(), SessionState::Authenticated);

    let request = &transport.requests_to("driver/getAccessToken")[0];
    assert_eq!(request.body.as_ref().unwrap()["refresh_token"], refresh);
    assert_eq!(request.query_param("lat"), Some("52.2"));
    assert_eq!(request.query_param("lng"), Some("21"));
}

#[tokio::test]
async fn exchange_failure_keeps_session() {
    let transport = MockTransport::new();
    let manager = common::manager(&transport);
    let refresh = common::live_jwt(7);
    common::sign_in_with_sms(&transport, &manager, &refresh).await;

    let body = json!({"code": 401, "message": "refresh token revoked"});
    transport.queue_response(401, body.clone());
    let err = manager
        .exchange_refresh_for_access_token(None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), AuthErrorKind::Authentication);
    assert_eq!(err.payload(), Some(&body));
    assert_eq!(manager.credential().unwrap().access_token, refresh);
    assert_eq!(manager.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn exchange_with_missing_access_token_is_authentication_error() {
    let transport = MockTransport::new();
    let manager = common::manager(&transport);
    common::sign_in_with_sms(&transport, &manager, &common::live_jwt(7)).await;

    transport.queue_ok(json!({"token_type": "bearer"}));
    let err = manager
        .exchange_refresh_for_access_token(None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), AuthErrorKind::Authentication);
}

#[tokio::test]
async fn exchange_rejects_driver_id_change() {
    let transport = MockTransport::new();
    let manager = common::manager(&transport);
    let refresh = common::live_jwt(7);
    common::sign_in_with_sms(&transport, &manager, &refresh).await;

    transport.queue_ok(json!({"access_token": common::live_jwt(8)}));
    let err = manager
        .exchange_refresh_for_access_token(None)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Decode(_)));
    assert_eq!(manager.credential().unwrap().access_token, refresh);
    assert_eq!(manager.identity().unwrap().driver_id, 7);
}

#[tokio::test]
async fn exchange_with_unreadable_claims_keeps_identity() {
    let transport = MockTransport::new();
    let manager = common::manager(&transport);
    common::sign_in_with_sms(&transport, &manager, &common::live_jwt(7)).await;
    let before = manager.identity().unwrap();

    transport.queue_ok(json!({"access_token": "opaque-access"}));
    let token = manager.exchange_refresh_for_access_token(None).await.unwrap();

    assert_eq!(token, "opaque-access");
    assert_eq!(manager.identity().unwrap(), before);
}

#[tokio::test]
async fn ensure_valid_without_token_fails() {
    let transport = MockTransport::new();
    let manager = common::manager(&transport);

    match manager.ensure_valid().await.unwrap_err() {
        AuthError::Authentication { message, .. } => assert_eq!(message, "no token"),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn ensure_valid_with_live_token_makes_no_request() {
    let transport = MockTransport::new();
    let manager = common::manager(&transport);
    let token = common::live_jwt(7);
    common::sign_in_with_sms(&transport, &manager, &token).await;
    let sent = transport.requests().len();

    assert_eq!(manager.get_valid_access_token().await.unwrap(), token);
    assert_eq!(transport.requests().len(), sent);
}

#[tokio::test]
async fn ensure_valid_refreshes_expired_token() {
    let transport = MockTransport::new();
    let manager = common::manager(&transport);
    common::sign_in_with_sms(&transport, &manager, &expired_jwt(7)).await;
    assert!(!manager.is_authenticated());

    let access = common::live_jwt(7);
    transport.queue_ok(json!({"access_token": access}));
    assert_eq!(manager.get_valid_access_token().await.unwrap(), access);

    assert!(manager.is_authenticated());
    assert_eq!(manager.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
    let transport = MockTransport::with_delay(Duration::from_millis(50));
    let manager = common::manager(&transport);
    common::sign_in_with_sms(&transport, &manager, &expired_jwt(7)).await;

    let access = common::live_jwt(7);
    transport.queue_ok(json!({"access_token": access}));

    let (a, b, c) = tokio::join!(
        manager.get_valid_access_token(),
        manager.get_valid_access_token(),
        manager.get_valid_access_token()
    );

    assert_eq!(a.unwrap(), access);
    assert_eq!(b.unwrap(), access);
    assert_eq!(c.unwrap(), access);
    assert_eq!(transport.requests_to("driver/getAccessToken").len(), 1);
}

#[tokio::test]
async fn concurrent_callers_share_refresh_failure() {
    let transport = MockTransport::with_delay(Duration::from_millis(50));
    let manager = common::manager(&transport);
    common::sign_in_with_sms(&transport, &manager, &expired_jwt(7)).await;

    transport.queue_response(401, json!({"code": 401}));

    let (a, b) = tokio::join!(manager.ensure_valid(), manager.ensure_valid());

    assert_eq!(a.unwrap_err().kind(), AuthErrorKind::Authentication);
    assert_eq!(b.unwrap_err().kind(), AuthErrorKind::Authentication);
    assert_eq!(transport.requests_to("driver/getAccessToken").len(), 1);
}

#[tokio::test]
async fn refresh_failure_logs_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let transport = MockTransport::new();
    let manager = common::manager_with_store(
        &transport,
        Box::new(token_store::FileTokenStore::new(&path)),
    );
    common::sign_in_with_sms(&transport, &manager, &expired_jwt(7)).await;

    transport.queue_transport_error(TransportError::Connect("refused".to_string()));
    match manager.ensure_valid().await.unwrap_err() {
        AuthError::Authentication { message, .. } => assert_eq!(message, "refresh failed"),
        other => panic!("unexpected {:?}", other),
    }

    assert!(manager.credential().is_none());
    assert!(manager.identity().is_none());
    assert_eq!(manager.state(), SessionState::Unauthenticated);
    assert!(!path.exists());

    // Later calls see a clean "no token"
    match manager.ensure_valid().await.unwrap_err() {
        AuthError::Authentication { message, .. } => assert_eq!(message, "no token"),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn authenticated_request_carries_session_params() {
    let transport = MockTransport::new();
    let manager = common::manager(&transport);
    let token = common::live_jwt(4711);
    common::sign_in_with_sms(&transport, &manager, &token).await;
    manager.set_location(Some(Location { lat: 50.0, lng: 19.9 }));

    let request = manager
        .build_authenticated_request(Method::Get, "driver/getRideHistory")
        .await
        .unwrap();

    let session_id = manager.identity().unwrap().session_id;
    assert!(request.url.path().ends_with("driver/getRideHistory"));
    assert_eq!(request.bearer_token(), Some(token.as_str()));
    assert_eq!(request.query_param("driver_id"), Some("4711"));
    assert_eq!(request.query_param("session_id"), Some(session_id.as_str()));
    assert_eq!(request.query_param("lat"), Some("50"));
    assert_eq!(request.query_param("device_id"), Some("device-123"));
}

#[tokio::test]
async fn authenticated_request_requires_session() {
    let transport = MockTransport::new();
    let manager = common::manager(&transport);

    let err = manager
        .build_authenticated_request(Method::Get, "driver/getRideHistory")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), AuthErrorKind::Authentication);
}

#[tokio::test]
async fn validate_existing_only_fails_on_503() {
    let transport = MockTransport::new();
    let manager = common::manager(&transport);
    common::sign_in_with_sms(&transport, &manager, &common::live_jwt(7)).await;

    transport.queue_response(503, json!({"message": "unavailable"}));
    assert!(!manager.validate_existing().await);

    transport.queue_response(500, json!({"message": "boom"}));
    assert!(manager.validate_existing().await);

    transport.queue_transport_error(TransportError::Timeout);
    assert!(manager.validate_existing().await);

    transport.queue_ok(json!({"state": "online"}));
    assert!(manager.validate_existing().await);

    let probes = transport.requests_to("driver/getDriverState");
    assert_eq!(probes.len(), 4);
    assert!(probes.iter().all(|p| p.bearer_token().is_some()));
}

#[tokio::test]
async fn validate_existing_without_session_is_false() {
    let transport = MockTransport::new();
    let manager = common::manager(&transport);

    assert!(!manager.validate_existing().await);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn logout_is_idempotent() {
    let transport = MockTransport::new();
    let manager = common::manager(&transport);
    common::sign_in_with_sms(&transport, &manager, &common::live_jwt(7)).await;

    manager.logout();
    manager.logout();

    assert!(manager.credential().is_none());
    assert!(!manager.is_authenticated());
    assert_eq!(manager.state(), SessionState::Unauthenticated);
}
