mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeViewport, content, settle};
use readltr_core::model::{SessionState, Visibility};
use readltr_core::time::fixed_clock;
use services::{ReaderEvent, TrackerConfig, TrackingServices};
use storage::repository::ReadingSessionRepository;

fn in_memory_services() -> TrackingServices {
    TrackingServices::in_memory(fixed_clock(), TrackerConfig::default())
}

#[tokio::test(start_paused = true)]
async fn scroll_events_drive_progress_until_unmount() {
    let services = in_memory_services();
    let viewport = Arc::new(FakeViewport::new(2000.0, 1000.0));
    let view = services.mount(content(), viewport.clone());

    viewport.scroll_to(500.0);
    view.notify(ReaderEvent::Scroll);
    settle().await;
    assert_eq!(view.progress().map(|p| p.value()), Some(75));

    view.unmount();
    viewport.scroll_to(1000.0);
    view.notify(ReaderEvent::Scroll);
    settle().await;
    assert_eq!(view.progress().map(|p| p.value()), Some(75));
    assert_eq!(view.state(), Some(SessionState::Closed));
    view.shutdown().await;

    let sessions = services.store().list_sessions(&content(), 10).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].progress.value(), 75);
    assert!(sessions[0].is_closed());
}

#[tokio::test(start_paused = true)]
async fn timer_catches_progress_without_scroll_events() {
    let services = in_memory_services();
    let viewport = Arc::new(FakeViewport::new(4000.0, 1000.0));
    let view = services.mount(content(), viewport.clone());

    // Keyboard paging: the offset moves but the renderer sends nothing.
    viewport.scroll_to(1000.0);
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(view.progress().map(|p| p.value()), Some(50));
    view.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn hiding_the_view_closes_the_session() {
    let services = in_memory_services();
    let viewport = Arc::new(FakeViewport::new(4000.0, 1000.0));
    let view = services.mount(content(), viewport.clone());
    settle().await;
    assert_eq!(view.state(), Some(SessionState::Opening));

    viewport.set_visibility(Visibility::Hidden);
    view.notify(ReaderEvent::VisibilityChanged);
    settle().await;
    assert_eq!(view.state(), Some(SessionState::Closed));

    viewport.set_visibility(Visibility::Visible);
    view.notify(ReaderEvent::VisibilityChanged);
    settle().await;
    view.shutdown().await;

    let sessions = services.store().list_sessions(&content(), 10).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].is_closed());
}

#[tokio::test]
async fn sqlite_backed_tracker_persists_progress() {
    let services = TrackingServices::sqlite(
        "sqlite:file:memdb_tracker_sqlite?mode=memory&cache=shared",
        fixed_clock(),
        TrackerConfig::default(),
    )
    .await
    .expect("sqlite services");

    let mut tracker = services.tracker(content());
    tracker.mount();
    tracker.clock_mut().advance(chrono::Duration::seconds(12));
    tracker.on_scroll(readltr_core::model::ScrollGeometry::new(2000.0, 10_000.0, 1000.0));
    tracker.shutdown().await;

    let sessions = services.store().list_sessions(&content(), 10).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].progress.value(), 30);
    assert!(sessions[0].is_closed());
    assert!(sessions[0].finished_at.is_none());
}
