mod support;

use std::time::Duration;

use scenewatch_api::JobStatus;
use scenewatch_sync::{SceneView, SyncError};
use tokio::time::sleep;

use support::{FakeGateway, job, scene, snapshot, workspace};

#[tokio::test]
async fn deleting_the_only_selected_job_empties_every_view() {
    let gateway = FakeGateway::with_jobs(vec![job("A", JobStatus::Done)]);
    gateway.set_snapshots("A", vec![snapshot("a1", 0.0)]);
    gateway.set_scenes("A", vec![scene("s1", 0.0, 5.0)]);
    let ws = workspace(&gateway);

    ws.refresh_jobs().await.expect("refresh");
    ws.open_scenes().await.expect("open scenes");
    assert_eq!(ws.scenes().view().scenes.len(), 1);

    ws.delete_job("A").await.expect("delete");

    let jobs = ws.jobs().view();
    assert!(jobs.jobs.is_empty());
    assert_eq!(jobs.selected, None);
    assert_eq!(jobs.detail, None);
    assert!(jobs.snapshots.is_empty());
    assert_eq!(ws.scenes().view(), SceneView::default());
}

#[tokio::test]
async fn selecting_another_job_clears_scenes() {
    let gateway = FakeGateway::with_jobs(vec![job("A", JobStatus::Done), job("B", JobStatus::Done)]);
    gateway.set_scenes("A", vec![scene("s1", 0.0, 5.0)]);
    let ws = workspace(&gateway);
    ws.refresh_jobs().await.expect("refresh");
    ws.open_scenes().await.expect("open scenes");

    ws.select_job("B").await.expect("select B");

    let scenes = ws.scenes().view();
    assert_eq!(scenes.job_id.as_deref(), Some("B"));
    assert!(scenes.scenes.is_empty());
    assert_eq!(scenes.selected, None);
    assert_eq!(scenes.detail, None);
}

#[tokio::test]
async fn scene_load_started_before_job_switch_is_discarded() {
    let gateway = FakeGateway::with_jobs(vec![job("A", JobStatus::Done), job("B", JobStatus::Done)]);
    gateway.set_scenes("A", vec![scene("s1", 0.0, 5.0)]);
    let ws = workspace(&gateway);
    ws.refresh_jobs().await.expect("refresh");
    let gate = gateway.gate("list_scenes:A");

    let open = tokio::spawn({
        let ws = ws.clone();
        async move { ws.open_scenes().await }
    });
    gate.entered().await;
    ws.select_job("B").await.expect("select B");
    gate.release();

    assert!(open.await.expect("join").expect("open scenes").is_stale());
    assert!(ws.scenes().view().scenes.is_empty());
}

#[tokio::test]
async fn opening_scenes_requires_a_selected_job() {
    let gateway = FakeGateway::with_jobs(Vec::new());
    let ws = workspace(&gateway);
    ws.refresh_jobs().await.expect("refresh");

    let err = ws.open_scenes().await.expect_err("nothing selected");
    assert!(matches!(err, SyncError::NoJobSelected));
}

#[tokio::test(start_paused = true)]
async fn extraction_on_selected_job_starts_polling() {
    let gateway = FakeGateway::with_jobs(vec![job("A", JobStatus::Uploaded)]);
    let ws = workspace(&gateway);
    ws.refresh_jobs().await.expect("refresh");
    sleep(Duration::from_millis(100)).await;
    assert!(ws.jobs().view().polling);

    // Uploaded is active, so the loop is already running and no second one starts.
    let response = ws.trigger_extraction("A").await.expect("extract");
    assert!(response.is_some());
    assert!(ws.jobs().view().polling);

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(
        ws.jobs().view().detail.map(|job| job.status),
        Some(JobStatus::Extracting)
    );

    gateway.set_status("A", JobStatus::Done);
    sleep(Duration::from_millis(1500)).await;
    assert!(!ws.jobs().view().polling);
}

#[tokio::test(start_paused = true)]
async fn extraction_restarts_polling_for_finished_job() {
    let gateway = FakeGateway::with_jobs(vec![job("A", JobStatus::Done)]);
    let ws = workspace(&gateway);
    ws.refresh_jobs().await.expect("refresh");
    assert!(!ws.jobs().view().polling);

    ws.trigger_extraction("A").await.expect("extract");
    assert!(ws.jobs().view().polling);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(
        ws.jobs().view().detail.map(|job| job.status),
        Some(JobStatus::Extracting)
    );
}

#[tokio::test(start_paused = true)]
async fn unmount_quiesces_both_stores() {
    let gateway = FakeGateway::with_jobs(vec![job("A", JobStatus::Extracting)]);
    gateway.set_scenes("A", vec![scene("s1", 0.0, 5.0)]);
    let ws = workspace(&gateway);
    ws.refresh_jobs().await.expect("refresh");
    ws.open_scenes().await.expect("open scenes");
    sleep(Duration::from_millis(100)).await;
    let polled = gateway.calls("get_job:A");

    ws.unmount();
    sleep(Duration::from_secs(10)).await;

    assert_eq!(gateway.calls("get_job:A"), polled);
    assert!(!ws.jobs().view().polling);
    assert!(!ws.scenes().view().loading);
}
