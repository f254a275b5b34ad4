use chrono::Duration;
use readltr_core::model::{ContentId, ProgressPercent, SessionId};
use readltr_core::time::fixed_now;
use storage::repository::{ReadingSessionRepository, StorageError};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn pct(v: i64) -> ProgressPercent {
    ProgressPercent::new(v).unwrap()
}

#[tokio::test]
async fn sqlite_session_roundtrip() {
    let repo = connect("memdb_session_roundtrip").await;
    let content = ContentId::new("article-1").unwrap();
    let start = fixed_now();

    let id = repo.create_session(&content, start).await.unwrap();
    repo.update_progress(&id, pct(40), start + Duration::seconds(10))
        .await
        .unwrap();
    repo.update_progress(&id, pct(25), start + Duration::seconds(20))
        .await
        .unwrap();
    repo.mark_finished(&id, start + Duration::seconds(25))
        .await
        .unwrap();
    repo.close_session(&id, pct(95), start + Duration::seconds(30))
        .await
        .unwrap();

    let record = repo.get_session(&id).await.unwrap();
    assert_eq!(record.content_id, content);
    assert_eq!(record.progress, pct(95));
    assert_eq!(record.started_at, start);
    assert_eq!(record.closed_at, Some(start + Duration::seconds(30)));
    assert_eq!(record.finished_at, Some(start + Duration::seconds(25)));
}

#[tokio::test]
async fn sqlite_progress_is_monotonic() {
    let repo = connect("memdb_session_monotonic").await;
    let id = repo
        .create_session(&ContentId::new("a").unwrap(), fixed_now())
        .await
        .unwrap();

    repo.update_progress(&id, pct(70), fixed_now()).await.unwrap();
    repo.close_session(&id, pct(10), fixed_now()).await.unwrap();

    assert_eq!(repo.get_session(&id).await.unwrap().progress, pct(70));
}

#[tokio::test]
async fn sqlite_rejects_writes_after_close() {
    let repo = connect("memdb_session_closed").await;
    let id = repo
        .create_session(&ContentId::new("a").unwrap(), fixed_now())
        .await
        .unwrap();
    repo.close_session(&id, pct(50), fixed_now()).await.unwrap();

    let err = repo
        .update_progress(&id, pct(60), fixed_now())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let missing = SessionId::new("nope").unwrap();
    let err = repo
        .close_session(&missing, pct(60), fixed_now())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_lists_sessions_newest_first() {
    let repo = connect("memdb_session_list").await;
    let content = ContentId::new("article-7").unwrap();
    let first = repo.create_session(&content, fixed_now()).await.unwrap();
    let second = repo
        .create_session(&content, fixed_now() + Duration::hours(2))
        .await
        .unwrap();
    repo.create_session(&ContentId::new("other").unwrap(), fixed_now())
        .await
        .unwrap();

    let listed = repo.list_sessions(&content, 10).await.unwrap();
    let ids: Vec<_> = listed.into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![second.clone(), first]);

    let limited = repo.list_sessions(&content, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, second);
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = connect("memdb_session_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
}

#[tokio::test]
async fn sqlite_connections_enforce_foreign_keys() {
    let repo = connect("memdb_pragmas").await;
    let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys;")
        .fetch_one(repo.pool())
        .await
        .expect("pragma");
    assert_eq!(enabled, 1);
}
