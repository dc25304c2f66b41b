//! Postgres store tests.
//!
//! Need a running Postgres reachable through `configuration.yaml` or the
//! `APP_DATABASE__*` variables, and `APP_JWT__SECRET` set so the settings
//! load; run with `cargo test -- --ignored`.

use chrono::{Duration, Utc};
use notes_auth::auth::{NewRefreshToken, RefreshTokenStore};
use notes_auth::configuration::{get_configuration, DatabaseSettings};
use notes_auth::domain::{NewNote, NewUser, NoteStore, NoteType, UserStore};
use notes_auth::error::AppError;
use notes_auth::store::PgStore;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::sync::Arc;

async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn spawn_store() -> Arc<PgStore> {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    Arc::new(PgStore::new(configure_database(&configuration.database).await))
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        password_hash: "$2b$04$placeholderplaceholderplaceholderplaceholderplace".to_string(),
    }
}

#[tokio::test]
#[ignore]
async fn duplicate_email_is_a_conflict() {
    let store = spawn_store().await;

    store.create(new_user("a@x.com")).await.unwrap();
    let err = store.create(new_user("a@x.com")).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert!(store.exists_by_email("a@x.com").await.unwrap());
}

#[tokio::test]
#[ignore]
async fn rotate_consumes_record_once() {
    let store = spawn_store().await;
    let user = store.create(new_user("a@x.com")).await.unwrap();

    let first = RefreshTokenStore::insert(
        store.as_ref(),
        NewRefreshToken::new(user.id, "digest-1".to_string(), 60),
    )
    .await
    .unwrap();

    let second = store
        .rotate(&first, NewRefreshToken::new(user.id, "digest-2".to_string(), 60))
        .await
        .unwrap()
        .expect("first rotation succeeds");
    assert_eq!(second.hashed_token, "digest-2");

    let replay = store
        .rotate(&first, NewRefreshToken::new(user.id, "digest-3".to_string(), 60))
        .await
        .unwrap();
    assert!(replay.is_none());

    assert!(store.find_by_user_and_digest(user.id, "digest-1").await.unwrap().is_none());
    assert!(store.find_by_user_and_digest(user.id, "digest-3").await.unwrap().is_none());
    let live = store
        .find_by_user_and_digest(user.id, "digest-2")
        .await
        .unwrap()
        .expect("replacement stored");
    assert_eq!(live.id, second.id);
}

#[tokio::test]
#[ignore]
async fn concurrent_rotation_has_one_winner() {
    let store = spawn_store().await;
    let user = store.create(new_user("a@x.com")).await.unwrap();
    let record = RefreshTokenStore::insert(
        store.as_ref(),
        NewRefreshToken::new(user.id, "digest".to_string(), 60),
    )
    .await
    .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let store = store.clone();
            let record = record.clone();
            tokio::spawn(async move {
                store
                    .rotate(&record, NewRefreshToken::new(record.user_id, format!("next-{}", i), 60))
                    .await
                    .unwrap()
                    .is_some()
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
#[ignore]
async fn deleting_user_cascades() {
    let store = spawn_store().await;
    let user = store.create(new_user("a@x.com")).await.unwrap();

    RefreshTokenStore::insert(
        store.as_ref(),
        NewRefreshToken::new(user.id, "digest".to_string(), 60),
    )
    .await
    .unwrap();
    let note = NoteStore::insert(
        store.as_ref(),
        NewNote {
            user_id: user.id,
            title: "t".to_string(),
            content: String::new(),
            note_type: NoteType::Checklist,
        },
    )
    .await
    .unwrap();

    assert!(UserStore::delete(store.as_ref(), user.id).await.unwrap());

    assert!(UserStore::find_by_id(store.as_ref(), user.id).await.unwrap().is_none());
    assert!(NoteStore::find_by_id(store.as_ref(), note.id).await.unwrap().is_none());
    assert!(store.find_by_user_and_digest(user.id, "digest").await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn note_for_missing_user_is_not_found() {
    let store = spawn_store().await;

    let err = NoteStore::insert(
        store.as_ref(),
        NewNote {
            user_id: uuid::Uuid::new_v4(),
            title: "t".to_string(),
            content: String::new(),
            note_type: NoteType::Text,
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
#[ignore]
async fn purge_removes_only_expired_records() {
    let store = spawn_store().await;
    let user = store.create(new_user("a@x.com")).await.unwrap();

    let mut stale = NewRefreshToken::new(user.id, "stale".to_string(), 60);
    stale.expires_at = Utc::now() - Duration::seconds(1);
    RefreshTokenStore::insert(store.as_ref(), stale).await.unwrap();
    RefreshTokenStore::insert(
        store.as_ref(),
        NewRefreshToken::new(user.id, "fresh".to_string(), 60),
    )
    .await
    .unwrap();

    assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 1);
    assert!(store.find_by_user_and_digest(user.id, "fresh").await.unwrap().is_some());
}

#[tokio::test]
#[ignore]
async fn delete_removes_refresh_token_once() {
    let store = spawn_store().await;
    let user = store.create(new_user("a@x.com")).await.unwrap();
    let record = RefreshTokenStore::insert(
        store.as_ref(),
        NewRefreshToken::new(user.id, "digest".to_string(), 60),
    )
    .await
    .unwrap();

    assert!(RefreshTokenStore::delete(store.as_ref(), &record).await.unwrap());
    assert!(store.find_by_user_and_digest(user.id, "digest").await.unwrap().is_none());
    assert!(!RefreshTokenStore::delete(store.as_ref(), &record).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn update_user_maps_taken_email_to_conflict() {
    let store = spawn_store().await;
    let user = store.create(new_user("a@x.com")).await.unwrap();
    store.create(new_user("b@x.com")).await.unwrap();

    let updated = UserStore::update(store.as_ref(), user.id, Some("Ann"), "ann@x.com")
        .await
        .unwrap()
        .expect("user exists");
    assert_eq!(updated.name.as_deref(), Some("Ann"));
    assert_eq!(updated.email, "ann@x.com");

    let err = UserStore::update(store.as_ref(), user.id, None, "b@x.com")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let missing = UserStore::update(store.as_ref(), uuid::Uuid::new_v4(), None, "c@x.com")
        .await
        .unwrap();
    assert!(missing.is_none());
}
