mod common;

use common::MockTransport;
use driver_auth::{SessionManager, SessionState, Transport};
use std::sync::Arc;
use tempfile::tempdir;
use token_store::{now_millis, Credential, FileTokenStore, Identity, StoredSnapshot, TokenStore};

fn credential(access: &str, expires_at: i64) -> Credential {
    Credential {
        access_token: access.to_string(),
        refresh_token: "refresh".to_string(),
        token_type: "bearer".to_string(),
        expires_at,
    }
}

fn resolved_identity() -> Identity {
    Identity {
        session_id: "session-9".to_string(),
        driver_id: 9,
        partner_id: 2,
        company_id: 3,
        company_city_id: 4,
        degraded: false,
    }
}

#[tokio::test]
async fn open_restores_live_session_before_returning() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    FileTokenStore::new(&path)
        .save(&StoredSnapshot::new(
            credential("stored-access", now_millis() + 600_000),
            resolved_identity(),
        ))
        .unwrap();

    let transport = MockTransport::new();
    let manager = common::manager_with_store(&transport, Box::new(FileTokenStore::new(&path)));

    assert_eq!(manager.state(), SessionState::Authenticated);
    assert!(manager.is_authenticated());
    assert_eq!(manager.identity().unwrap(), resolved_identity());
    assert_eq!(
        manager.get_valid_access_token().await.unwrap(),
        "stored-access"
    );
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn new_waits_for_explicit_restore() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    FileTokenStore::new(&path)
        .save(&StoredSnapshot::new(
            credential("stored-access", now_millis() + 600_000),
            resolved_identity(),
        ))
        .unwrap();

    let transport: Arc<dyn Transport> = MockTransport::new();
    let manager = SessionManager::new(
        transport,
        Box::new(FileTokenStore::new(&path)),
        common::base_url(),
        common::context(),
    );
    assert_eq!(manager.state(), SessionState::Unauthenticated);
    assert!(manager.credential().is_none());

    assert_eq!(manager.restore(), SessionState::Authenticated);
    assert_eq!(manager.identity().unwrap().driver_id, 9);
}

#[tokio::test]
async fn unresolved_identity_is_re_extracted_and_persisted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    let token = common::live_jwt(321);
    FileTokenStore::new(&path)
        .save(&StoredSnapshot::new(
            credential(&token, now_millis() + 600_000),
            Identity::unresolved("session-1"),
        ))
        .unwrap();

    let transport = MockTransport::new();
    let manager = common::manager_with_store(&transport, Box::new(FileTokenStore::new(&path)));

    let identity = manager.identity().unwrap();
    assert_eq!(identity.driver_id, 321);
    assert_eq!(identity.session_id, "session-1");

    let stored = FileTokenStore::new(&path).load().unwrap().unwrap();
    assert_eq!(stored.session_info.driver_id, 321);
    assert!(!stored.session_info.degraded);
}

#[tokio::test]
async fn placeholder_identity_is_upgraded_from_claims() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    let token = common::live_jwt(55);
    FileTokenStore::new(&path)
        .save(&StoredSnapshot::new(
            credential(&token, now_millis() + 600_000),
            Identity::placeholder("session-2"),
        ))
        .unwrap();

    let transport = MockTransport::new();
    let manager = common::manager_with_store(&transport, Box::new(FileTokenStore::new(&path)));

    let identity = manager.identity().unwrap();
    assert_eq!(identity.driver_id, 55);
    assert!(!identity.degraded);
}

#[tokio::test]
async fn expired_snapshot_is_discarded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    FileTokenStore::new(&path)
        .save(&StoredSnapshot::new(
            credential("old", now_millis() - 1_000),
            resolved_identity(),
        ))
        .unwrap();

    let transport = MockTransport::new();
    let manager = common::manager_with_store(&transport, Box::new(FileTokenStore::new(&path)));

    assert_eq!(manager.state(), SessionState::Unauthenticated);
    assert!(manager.credential().is_none());
    assert!(!path.exists());
}

#[tokio::test]
async fn corrupt_snapshot_is_discarded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{ definitely not json").unwrap();

    let transport = MockTransport::new();
    let manager = common::manager_with_store(&transport, Box::new(FileTokenStore::new(&path)));

    assert_eq!(manager.state(), SessionState::Unauthenticated);
    assert!(!path.exists());
}

#[tokio::test]
async fn logout_removes_snapshot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    let transport = MockTransport::new();
    let manager = common::manager_with_store(&transport, Box::new(FileTokenStore::new(&path)));

    common::sign_in_with_sms(&transport, &manager, &common::live_jwt(1)).await;
    assert!(path.exists());

    manager.logout();
    assert!(!path.exists());

    // A fresh manager finds nothing to restore
    let again = common::manager_with_store(&transport, Box::new(FileTokenStore::new(&path)));
    assert_eq!(again.state(), SessionState::Unauthenticated);
}
