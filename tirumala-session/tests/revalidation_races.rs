//! In-flight revalidation must not resurrect or clobber a newer session

mod common;

use common::{manager, persisted_token, persisted_user, seeded_store, user, Reply, ScriptedIdentity};
use serde_json::json;
use std::sync::Arc;
use tirumala_core::CredentialStore;
use tirumala_session::{AuthState, MemoryCredentialStore};

#[tokio::test]
async fn test_refresh_result_after_logout_is_discarded() {
    let store = Arc::new(MemoryCredentialStore::new());
    let identity = ScriptedIdentity::held([Reply::User(json!({ "id": 5, "role": "FARMER" }))]);
    let manager = manager(&store, &identity);
    manager.login("tok1", user(json!({ "id": 5 }))).await.unwrap();

    let refreshing = tokio::spawn({
        let manager = manager.clone();
        async move { manager.refresh().await }
    });
    identity.wait_for_calls(1).await;

    manager.logout().await.unwrap();
    identity.release();
    refreshing.await.unwrap().unwrap();

    assert_eq!(manager.state(), AuthState::Unauthenticated);
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn test_stale_rejection_does_not_end_new_session() {
    let store = Arc::new(MemoryCredentialStore::new());
    let identity = ScriptedIdentity::held([Reply::Unauthorized]);
    let manager = manager(&store, &identity);
    manager.login("tok1", user(json!({ "id": 5 }))).await.unwrap();

    let refreshing = tokio::spawn({
        let manager = manager.clone();
        async move { manager.refresh().await }
    });
    identity.wait_for_calls(1).await;

    manager.login("tok2", user(json!({ "id": 6 }))).await.unwrap();
    identity.release();
    refreshing.await.unwrap().unwrap();

    let session = manager.session();
    assert_eq!(session.token(), Some("tok2"));
    assert_eq!(session.user().and_then(|u| u.id()), Some("6"));
    assert_eq!(persisted_token(&store).as_deref(), Some("tok2"));
    assert_eq!(persisted_user(&store), Some(json!({ "id": 6 })));
}

#[tokio::test]
async fn test_startup_revalidation_does_not_overwrite_login() {
    let store = seeded_store("old", json!({ "id": 1 })).await;
    let identity = ScriptedIdentity::held([Reply::User(json!({ "id": 1, "role": "EXPERT" }))]);
    let manager = manager(&store, &identity);

    let restoring = tokio::spawn({
        let manager = manager.clone();
        async move { manager.restore().await }
    });
    identity.wait_for_calls(1).await;
    assert!(manager.session().loading());
    assert_eq!(manager.session().token(), Some("old"));

    manager.login("new", user(json!({ "id": 2 }))).await.unwrap();
    identity.release();
    restoring.await.unwrap();

    let session = manager.session();
    assert!(!session.loading());
    assert_eq!(session.token(), Some("new"));
    assert_eq!(session.user().and_then(|u| u.id()), Some("2"));
    assert_eq!(persisted_user(&store), Some(json!({ "id": 2 })));
}

#[tokio::test]
async fn test_concurrent_logins_leave_store_and_memory_consistent() {
    let store = Arc::new(MemoryCredentialStore::new());
    let manager = manager(&store, &ScriptedIdentity::new([]));

    let mut handles = Vec::new();
    for i in 0..16 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager
                .login(format!("tok{i}"), user(json!({ "id": i })))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let session = manager.session();
    let token = session.token().map(str::to_string);
    assert_eq!(store.get("auth_token").await.unwrap(), token);

    let persisted_id = persisted_user(&store).and_then(|u| u["id"].as_u64());
    let memory_id = session.user().and_then(|u| u.id()).map(str::to_string);
    assert_eq!(persisted_id.map(|id| id.to_string()), memory_id);
    assert_eq!(token, memory_id.map(|id| format!("tok{id}")));
}
