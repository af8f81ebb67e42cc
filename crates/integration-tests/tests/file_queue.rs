//! Queue operations against a real queue file

use std::sync::Arc;

use mapqueue_core::application::QueueService;
use mapqueue_core::domain::{Queue, ResetPolicy, SessionId};
use mapqueue_core::port::id_provider::UuidProvider;
use mapqueue_core::AppError;
use mapqueue_infra_fs::JsonFileQueueStore;

fn sid(s: &str) -> SessionId {
    SessionId::new(s).unwrap()
}

fn service_for(path: &std::path::Path) -> QueueService {
    QueueService::new(
        Arc::new(JsonFileQueueStore::new(path)),
        Arc::new(UuidProvider),
    )
}

#[tokio::test]
async fn test_sequential_enqueues_load_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_for(&dir.path().join("queue.json"));
    service.initialize(ResetPolicy::Reset).await.unwrap();

    let ids: Vec<SessionId> = (0..25).map(|i| sid(&format!("visitor-{i}"))).collect();
    for id in &ids {
        service.enqueue(id).await.unwrap();
    }

    assert_eq!(service.load(false).await.unwrap().into_vec(), ids);
}

#[tokio::test]
async fn test_position_zero_only_for_front() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_for(&dir.path().join("queue.json"));

    for s in ["a", "b", "c"] {
        service.enqueue(&sid(s)).await.unwrap();
    }
    let front = service.front_of().await.unwrap().unwrap();
    for s in ["a", "b", "c"] {
        let is_front = service.position_of(&sid(s)).await.unwrap() == Some(0);
        assert_eq!(is_front, sid(s) == front);
    }
    assert_eq!(service.position_of(&sid("b")).await.unwrap(), Some(1));

    service.remove(&sid("a")).await.unwrap();
    assert_eq!(service.position_of(&sid("b")).await.unwrap(), Some(0));
    assert_eq!(service.position_of(&sid("a")).await.unwrap(), None);
}

#[tokio::test]
async fn test_remove_twice_leaves_queue_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_for(&dir.path().join("queue.json"));
    service.enqueue(&sid("a")).await.unwrap();
    service.enqueue(&sid("b")).await.unwrap();

    assert!(service.remove(&sid("b")).await.unwrap());
    let after_first = service.snapshot().await.unwrap();
    assert!(!service.remove(&sid("b")).await.unwrap());
    assert_eq!(service.snapshot().await.unwrap(), after_first);
}

#[tokio::test]
async fn test_save_load_round_trip_including_empty() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_for(&dir.path().join("queue.json"));

    for q in [
        Queue::new(),
        vec![sid("only")].into(),
        vec![sid("dup"), sid("x"), sid("dup")].into(),
        vec![sid("üñí"), sid("with \"quotes\"")].into(),
    ] {
        service.save(&q).await.unwrap();
        assert_eq!(service.load(false).await.unwrap(), q);
    }
}

#[tokio::test]
async fn test_state_is_shared_between_store_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.json");
    let first = service_for(&path);
    let second = service_for(&path);

    first.enqueue(&sid("a")).await.unwrap();
    second.enqueue(&sid("b")).await.unwrap();

    assert_eq!(first.position_of(&sid("b")).await.unwrap(), Some(1));
    second.remove(&sid("a")).await.unwrap();
    assert_eq!(first.front_of().await.unwrap(), Some(sid("b")));
}

#[tokio::test]
async fn test_restart_with_reset_forgets_waiters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.json");

    {
        let service = service_for(&path);
        service.initialize(ResetPolicy::Reset).await.unwrap();
        service.enqueue(&sid("a")).await.unwrap();
    }

    // Preserve keeps in-flight sessions
    let service = service_for(&path);
    let q = service.initialize(ResetPolicy::Preserve).await.unwrap();
    assert_eq!(q.len(), 1);

    // Reset drops them: the waiter now finds itself absent
    service.initialize(ResetPolicy::Reset).await.unwrap();
    assert_eq!(service.position_of(&sid("a")).await.unwrap(), None);
}

#[tokio::test]
async fn test_corrupt_file_surfaces_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.json");
    std::fs::write(&path, "not json at all").unwrap();
    let service = service_for(&path);

    let err = service.enqueue(&sid("a")).await.unwrap_err();
    assert!(matches!(err, AppError::CorruptState { .. }));
    assert!(err.to_string().contains("queue.json"));

    service.initialize(ResetPolicy::Reset).await.unwrap();
    assert_eq!(service.enqueue(&sid("a")).await.unwrap(), 0);
}
