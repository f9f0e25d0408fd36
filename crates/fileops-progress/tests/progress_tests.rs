use fileops_core::{OperationKind, OperationStatus};
use fileops_progress::{ProgressTracker, WILDCARD};
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;

#[test]
fn test_capacity_one_wildcard_keeps_initial_snapshot() {
    let registry = ProgressTracker::new();
    let mut all = registry.subscribe_with_capacity(WILDCARD, 1);

    let tracker = registry.start_operation("cleanup-1", OperationKind::Cleanup, 4);
    for _ in 0..5 {
        tracker.increment_progress(1, 0);
    }

    let first = all.try_recv().unwrap();
    assert_eq!(first.items_processed, 0);
    assert_eq!(first.status, OperationStatus::Running);
    assert_eq!(all.try_recv(), Err(TryRecvError::Empty));
}

#[test]
fn test_updates_arrive_in_order() {
    let registry = ProgressTracker::new();
    let mut rx = registry.subscribe_with_capacity("ownership-1", 16);

    let tracker = registry.start_operation("ownership-1", OperationKind::Ownership, 2);
    tracker.update_step("Scanning files");
    tracker.increment_progress(1, 0);
    tracker.increment_progress(1, 0);
    tracker.complete();

    let mut items = Vec::new();
    let mut last_status = OperationStatus::Pending;
    while let Ok(info) = rx.try_recv() {
        items.push(info.items_processed);
        last_status = info.status;
    }
    assert_eq!(items, vec![0, 0, 1, 2, 2]);
    assert_eq!(last_status, OperationStatus::Completed);
}

#[test]
fn test_unsubscribe_closes_channel() {
    let registry = ProgressTracker::new();
    let mut rx = registry.subscribe("cleanup-1");

    assert!(registry.unsubscribe("cleanup-1"));
    assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    assert!(!registry.unsubscribe("cleanup-1"));
}

#[test]
fn test_cleanup_never_evicts_active_trackers() {
    let registry = ProgressTracker::new();
    registry.start_operation("running", OperationKind::Cleanup, 1);
    registry.start_operation("paused", OperationKind::Cleanup, 1).pause();
    registry.start_operation("failed", OperationKind::Cleanup, 1).fail("boom");
    let mut failed_rx = registry.subscribe("failed");

    assert_eq!(registry.cleanup_completed(Duration::ZERO), 1);
    assert!(registry.get_operation("running").is_some());
    assert_eq!(
        registry.get_progress("paused").unwrap().status,
        OperationStatus::Paused
    );
    assert!(registry.get_operation("failed").is_none());
    assert_eq!(failed_rx.try_recv(), Err(TryRecvError::Disconnected));
}

#[test]
fn test_get_all_progress_lists_every_tracker() {
    let registry = ProgressTracker::new();
    registry.start_operation("a", OperationKind::Cleanup, 1);
    registry.start_operation("b", OperationKind::Ownership, 1);

    let ids: Vec<String> = registry.get_all_progress().into_iter().map(|p| p.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"a".to_string()));
    assert!(ids.contains(&"b".to_string()));
}

#[test]
fn test_eta_reported_once_speed_is_known() {
    let registry = ProgressTracker::new();
    let tracker = registry.start_operation("cleanup-1", OperationKind::Cleanup, 1);
    tracker.set_totals(1_000_000, 0);
    tracker.increment_progress(1, 0);
    std::thread::sleep(Duration::from_millis(20));
    tracker.increment_progress(1, 0);

    let info = tracker.progress_info();
    assert!(info.speed > 0.0);
    let eta = info.eta.unwrap();
    assert!(eta > Duration::ZERO);

    tracker.update_progress(1_000_000, 1_000_000, 0, 0);
    assert!(tracker.progress_info().eta.is_none());
}

#[tokio::test]
async fn test_auto_reporting_rebroadcasts_running_trackers() {
    let registry = std::sync::Arc::new(ProgressTracker::new());
    let tracker = registry.start_operation("cleanup-1", OperationKind::Cleanup, 1);
    registry.start_operation("done", OperationKind::Cleanup, 1).complete();
    let mut rx = registry.subscribe_with_capacity(WILDCARD, 64);

    let token = CancellationToken::new();
    let reporter = {
        let registry = std::sync::Arc::clone(&registry);
        let token = token.clone();
        tokio::spawn(async move {
            registry
                .start_auto_reporting(Duration::from_millis(10), token)
                .await
        })
    };

    let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.id, tracker.id());

    token.cancel();
    reporter.await.unwrap();

    while let Ok(info) = rx.try_recv() {
        assert_eq!(info.id, "cleanup-1");
    }
}

#[tokio::test]
async fn test_auto_reporting_evicts_expired_trackers() {
    let registry = std::sync::Arc::new(ProgressTracker::new().with_retention(Duration::ZERO));
    registry.start_operation("done", OperationKind::Cleanup, 1).complete();
    let running = registry.start_operation("running", OperationKind::Cleanup, 1);

    let token = CancellationToken::new();
    let reporter = {
        let registry = std::sync::Arc::clone(&registry);
        let token = token.clone();
        tokio::spawn(async move {
            registry
                .start_auto_reporting(Duration::from_millis(10), token)
                .await
        })
    };

    for _ in 0..200 {
        if registry.get_operation("done").is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    token.cancel();
    reporter.await.unwrap();

    assert!(registry.get_operation("done").is_none());
    assert_eq!(registry.get_progress("running").unwrap().id, running.id());
}

#[test]
fn test_default_retention_keeps_finished_trackers() {
    let registry = ProgressTracker::new();
    registry.start_operation("done", OperationKind::Cleanup, 1).complete();

    assert_eq!(registry.cleanup_completed(fileops_progress::DEFAULT_RETENTION), 0);
    assert!(registry.get_operation("done").is_some());
}
