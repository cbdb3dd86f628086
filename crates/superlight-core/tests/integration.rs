//! End-to-end tests driving sessions and the coordinator over the mock
//! transport.

use std::sync::Arc;
use std::time::Duration;

use superlight_core::{
    BulbConfig, BulbSession, Error, MockTransport, ScanCoordinator, SessionConfig, SessionState,
};

const ADDRESS: &str = "aa:bb:cc:dd:ee:ff";

async fn wait_for_state(session: &BulbSession, want: SessionState) {
    for _ in 0..200 {
        if session.state().await == want {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "session never reached {want:?}, stuck at {:?}",
        session.state().await
    );
}

/// Spin up a coordinator with one registered session and bring it to Ready.
async fn ready_setup() -> (Arc<MockTransport>, Arc<ScanCoordinator>, Arc<BulbSession>) {
    let mock = MockTransport::new();
    let coordinator = ScanCoordinator::new(Arc::clone(&mock) as _);
    let session = Arc::new(
        BulbSession::new(Arc::clone(&mock) as _, BulbConfig::new(ADDRESS)).unwrap(),
    );
    coordinator.register(Arc::clone(&session)).await;
    coordinator.spawn();

    mock.emit_adapter(true);
    mock.emit_discovered(ADDRESS);
    wait_for_state(&session, SessionState::Ready).await;
    (mock, coordinator, session)
}

#[tokio::test]
async fn full_lifecycle_reaches_ready() {
    let mock = MockTransport::new();
    let coordinator = ScanCoordinator::new(Arc::clone(&mock) as _);
    let session = Arc::new(
        BulbSession::new(Arc::clone(&mock) as _, BulbConfig::new(ADDRESS)).unwrap(),
    );
    coordinator.register(Arc::clone(&session)).await;
    coordinator.spawn();

    assert_eq!(session.state().await, SessionState::Idle);

    mock.emit_adapter(true);
    wait_for_state(&session, SessionState::Scanning).await;
    assert_eq!(mock.start_scan_count(), 1);

    // A foreign peripheral must not trigger a connection.
    mock.emit_discovered("11:22:33:44:55:66");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.connect_count(), 0);

    mock.emit_discovered(ADDRESS);
    wait_for_state(&session, SessionState::Ready).await;
    assert_eq!(mock.connect_count(), 1);
    assert_eq!(mock.stop_scan_count(), 1);
}

#[tokio::test]
async fn sets_produce_expected_frames() {
    let (mock, _coordinator, session) = ready_setup().await;

    // Default cached color is full-brightness white.
    session.set_power(true).await.unwrap();
    session.set_saturation(100).await.unwrap();
    session.set_hue(120).await.unwrap();

    let frames = mock.written_frames().await;
    assert_eq!(frames[0], vec![0xD0, 255, 255, 255]);
    assert_eq!(frames[1], vec![0xD0, 255, 0, 0]);
    assert_eq!(frames[2], vec![0xD0, 0, 255, 0]);
}

#[tokio::test]
async fn powered_off_frames_are_dark() {
    let (mock, _coordinator, session) = ready_setup().await;

    session.set_hue(240).await.unwrap();
    session.set_saturation(100).await.unwrap();
    session.set_power(false).await.unwrap();

    assert_eq!(
        mock.written_frames().await.last().unwrap(),
        &vec![0xD0, 0, 0, 0]
    );
    // The cached color survives the off frame.
    assert_eq!(session.last_known_color().await.hue, 240);
}

#[tokio::test(start_paused = true)]
async fn concurrent_getters_share_one_read() {
    let mock = MockTransport::new();
    mock.set_read_frame(0, 0, 255).await;
    mock.set_read_latency_ms(100);
    let session = Arc::new(
        BulbSession::new(Arc::clone(&mock) as _, BulbConfig::new(ADDRESS)).unwrap(),
    );
    session_establish(&session).await;

    let (hue, saturation, brightness) = tokio::join!(
        {
            let s = Arc::clone(&session);
            tokio::spawn(async move { s.hue().await })
        },
        {
            let s = Arc::clone(&session);
            tokio::spawn(async move { s.saturation().await })
        },
        {
            let s = Arc::clone(&session);
            tokio::spawn(async move { s.brightness().await })
        },
    );

    assert_eq!(hue.unwrap().unwrap(), 240);
    assert_eq!(saturation.unwrap().unwrap(), 100);
    assert_eq!(brightness.unwrap().unwrap(), 100);
    assert_eq!(session.physical_reads(), 1);
}

#[tokio::test]
async fn disconnect_resumes_scan_and_recovers() {
    let (mock, _coordinator, session) = ready_setup().await;

    session.set_power(true).await.unwrap();

    mock.emit_disconnected(ADDRESS, Some("supervision timeout".to_string()));
    wait_for_state(&session, SessionState::Scanning).await;
    assert_eq!(mock.start_scan_count(), 2);

    // Cached state is preserved across the drop.
    assert!(session.last_known_power().await);

    // Operations while disconnected fail cleanly.
    let err = session.set_hue(10).await.unwrap_err();
    assert!(matches!(err, Error::DeviceNotReady));

    mock.emit_discovered(ADDRESS);
    wait_for_state(&session, SessionState::Ready).await;
    assert_eq!(mock.connect_count(), 2);
}

#[tokio::test]
async fn foreign_disconnect_does_not_restart_scan() {
    let (mock, _coordinator, session) = ready_setup().await;

    // Some unrelated peripheral drops off while our session is connected.
    mock.emit_disconnected("99:88:77:66:55:44", None);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session.state().await, SessionState::Ready);
    assert_eq!(mock.start_scan_count(), 1);
}

#[tokio::test]
async fn pre_powered_adapter_starts_scan_without_transition() {
    let mock = MockTransport::new();
    mock.set_powered(true);
    let coordinator = ScanCoordinator::new(Arc::clone(&mock) as _);
    let session = Arc::new(
        BulbSession::new(Arc::clone(&mock) as _, BulbConfig::new(ADDRESS)).unwrap(),
    );
    coordinator.register(Arc::clone(&session)).await;
    coordinator.spawn();

    // No AdapterStateChanged event is ever emitted; the coordinator must
    // pick the powered state up by querying the transport.
    wait_for_state(&session, SessionState::Scanning).await;
    assert_eq!(mock.start_scan_count(), 1);

    mock.emit_discovered(ADDRESS);
    wait_for_state(&session, SessionState::Ready).await;
}

#[tokio::test]
async fn getters_fail_before_first_connection() {
    let mock = MockTransport::new();
    let session = BulbSession::new(Arc::clone(&mock) as _, BulbConfig::new(ADDRESS)).unwrap();

    assert!(matches!(
        session.power().await.unwrap_err(),
        Error::DeviceNotReady
    ));
    assert!(matches!(
        session.brightness().await.unwrap_err(),
        Error::DeviceNotReady
    ));
}

#[tokio::test]
async fn read_failure_fans_out_to_all_getters() {
    let mock = MockTransport::new();
    mock.set_fail_read(true);
    let session = Arc::new(
        BulbSession::new(Arc::clone(&mock) as _, BulbConfig::new(ADDRESS)).unwrap(),
    );
    session_establish(&session).await;

    let err = session.hue().await.unwrap_err();
    assert!(err.to_string().contains("mock read failure"));

    // Recovery after the failure.
    mock.set_fail_read(false);
    mock.set_read_frame(255, 0, 0).await;
    assert_eq!(session.hue().await.unwrap(), 0);
    assert_eq!(session.saturation().await.unwrap(), 100);
}

#[tokio::test]
async fn identify_runs_against_live_session() {
    let mock = MockTransport::new();
    let session = Arc::new(
        BulbSession::with_config(
            Arc::clone(&mock) as _,
            BulbConfig::new(ADDRESS),
            SessionConfig::default().flash_step(Duration::ZERO),
        )
        .unwrap(),
    );
    session_establish(&session).await;

    session.set_hue(40).await.unwrap();
    session.set_power(true).await.unwrap();
    let before = mock.written_frames().await.len();

    session.identify().await.unwrap();

    let frames = mock.written_frames().await;
    assert_eq!(frames.len(), before + 4);
    assert_eq!(frames[before], vec![0xD0, 255, 0, 0]);
    assert_eq!(frames[before + 1], vec![0xD0, 0, 255, 0]);
    assert_eq!(frames[before + 2], vec![0xD0, 0, 0, 255]);
    // The restore frame replays the pre-flash color.
    assert_eq!(session.last_known_color().await.hue, 40);
    assert!(session.last_known_power().await);
}

/// Bring a standalone session (no coordinator) to Ready.
async fn session_establish(session: &BulbSession) {
    session.establish().await.unwrap();
}
