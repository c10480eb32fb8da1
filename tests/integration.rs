//! Integration tests for stereo-sync.
//!
//! Every test drives the public API through `MockChannel`, which invokes the
//! registered callbacks on the delivering thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use stereo_sync::{
    configure_sensor, AccessError, DataSource, DeviceInfo, ImagerKind, MockChannel, PoolError,
    SensorConfig, Session, StereoSync, StereoSyncError, SyncEvent,
};

const WIDTH: u32 = 16;
const HEIGHT: u32 = 8;

fn frame(source: DataSource, id: i64) -> stereo_sync::FrameHeader {
    MockChannel::synthetic_frame(source, id, WIDTH, HEIGHT)
}

fn start_colour(channel: &Arc<MockChannel>, events: Option<Arc<Mutex<Vec<SyncEvent>>>>) -> Session {
    let mut builder = StereoSync::builder()
        .add_pair("left", DataSource::LumaLeft, DataSource::ChromaLeft)
        .add_single("disparity", DataSource::Disparity);
    if let Some(events) = events {
        builder = builder.on_event(move |e| events.lock().push(e));
    }
    builder.start(channel.clone()).unwrap()
}

fn assert_no_leaks(channel: &MockChannel) {
    let stats = channel.pool_stats();
    assert_eq!(stats.held, 0, "buffers still held: {stats:?}");
    assert_eq!(stats.reserved, stats.released);
}

#[test]
fn test_pair_published_only_when_ids_agree() {
    let channel = Arc::new(MockChannel::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    let session = start_colour(&channel, Some(events.clone()));
    let accessor = session.accessor();

    channel.deliver(&frame(DataSource::LumaLeft, 5));
    assert!(matches!(
        accessor.matched_pair("left"),
        Err(AccessError::NotReady { .. })
    ));
    channel.deliver(&frame(DataSource::ChromaLeft, 5));
    assert_eq!(accessor.matched_pair("left").unwrap().frame_id(), 5);

    channel.deliver(&frame(DataSource::LumaLeft, 6));
    channel.deliver(&frame(DataSource::LumaLeft, 7));
    assert_eq!(accessor.matched_pair("left").unwrap().frame_id(), 5);

    channel.deliver(&frame(DataSource::ChromaLeft, 7));
    let pair = accessor.matched_pair("left").unwrap();
    assert_eq!(pair.first.frame_id, 7);
    assert_eq!(pair.second.unwrap().frame_id, 7);

    let discarded: Vec<i64> = events
        .lock()
        .iter()
        .filter_map(|e| match e {
            SyncEvent::FrameDiscarded { frame_id, .. } => Some(*frame_id),
            _ => None,
        })
        .collect();
    assert_eq!(discarded, vec![6]);

    let stats = session.stop().unwrap();
    assert_eq!(stats.pairs_matched, 2);
    assert_eq!(stats.frames_discarded, 1);
    assert_eq!(stats.handles_released, 2);
    assert_no_leaks(&channel);
}

#[test]
fn test_single_source_keeps_latest() {
    let channel = Arc::new(MockChannel::new());
    let session = start_colour(&channel, None);

    for id in 0..20 {
        channel.deliver(&frame(DataSource::Disparity, id));
    }

    let latest = session
        .accessor()
        .latest_single(DataSource::Disparity)
        .unwrap();
    assert_eq!(latest.frame_id, 19);
    assert_eq!(latest.data.len(), latest.expected_len());
    assert_eq!(channel.pool_stats().held, 1);

    session.stop().unwrap();
    assert_no_leaks(&channel);
}

#[tokio::test]
async fn test_duplicate_match_stops_session() {
    let channel = Arc::new(MockChannel::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    let session = start_colour(&channel, Some(events.clone()));

    channel.deliver(&frame(DataSource::LumaLeft, 5));
    channel.deliver(&frame(DataSource::ChromaLeft, 5));
    // One repeat is enough: the chroma side still reads 5.
    channel.deliver(&frame(DataSource::LumaLeft, 5));
    channel.deliver(&frame(DataSource::ChromaLeft, 5));

    let err = session.run_until_shutdown().await.unwrap_err();
    assert!(matches!(
        err,
        StereoSyncError::DuplicateMatch { frame_id: 5, .. }
    ));
    assert!(err.is_invariant_violation());
    assert!(!session.is_running());

    // Frames after the fault, including the fourth above, are ignored
    // without reserving.
    let reserved = channel.pool_stats().reserved;
    channel.deliver(&frame(DataSource::Disparity, 9));
    assert_eq!(channel.pool_stats().reserved, reserved);
    assert_eq!(session.stats().frames_ignored, 2);
    assert_eq!(session.stats().pairs_matched, 1);

    assert!(events
        .lock()
        .iter()
        .any(|e| matches!(e, SyncEvent::InvariantViolation { .. })));

    session.stop().unwrap();
    assert_no_leaks(&channel);
}

#[tokio::test]
async fn test_pool_failure_is_fatal() {
    let channel = Arc::new(MockChannel::new());
    let session = start_colour(&channel, None);

    channel.fail_next_reserve();
    channel.deliver(&frame(DataSource::Disparity, 1));

    let err = session.run_until_shutdown().await.unwrap_err();
    assert!(matches!(
        err,
        StereoSyncError::Pool(PoolError::ReserveFailed { .. })
    ));
    assert_eq!(session.fault(), Some(err));
}

#[tokio::test]
async fn test_shutdown_handle_ends_run() {
    let channel = Arc::new(MockChannel::new());
    let session = start_colour(&channel, None);
    let handle = session.shutdown_handle();

    let producer = {
        let channel = channel.clone();
        tokio::spawn(async move {
            for id in 0..10 {
                channel.deliver(&frame(DataSource::LumaLeft, id));
                channel.deliver(&frame(DataSource::ChromaLeft, id));
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            handle.shutdown();
        })
    };

    session.run_until_shutdown().await.unwrap();
    producer.await.unwrap();

    let stats = session.stop().unwrap();
    assert_eq!(stats.pairs_matched, 10);
    assert_no_leaks(&channel);
}

#[tokio::test]
async fn test_subscriber_sees_publications() {
    let channel = Arc::new(MockChannel::new());
    let session = start_colour(&channel, None);
    let mut notices = session.subscribe();

    channel.deliver(&frame(DataSource::LumaLeft, 3));
    channel.deliver(&frame(DataSource::ChromaLeft, 3));

    tokio::time::timeout(Duration::from_secs(1), notices.changed())
        .await
        .unwrap()
        .unwrap();
    let notice = notices.borrow_and_update().clone().unwrap();
    assert_eq!(notice.group.as_str(), "left");
    assert_eq!(notice.frame_id, 3);

    // A pending frame publishes nothing.
    channel.deliver(&frame(DataSource::LumaLeft, 4));
    assert!(!notices.has_changed().unwrap());
}

#[test]
fn test_shutdown_after_many_arrivals_releases_all() {
    let channel = Arc::new(MockChannel::new());
    let session = start_colour(&channel, None);

    for id in 0..50 {
        channel.deliver(&frame(DataSource::LumaLeft, id));
        if id % 3 != 0 {
            channel.deliver(&frame(DataSource::ChromaLeft, id));
        }
        channel.deliver(&frame(DataSource::Disparity, id));
    }
    channel.deliver(&frame(DataSource::LumaLeft, 50));

    let stats = session.stop().unwrap();
    assert_eq!(stats.handles_released, 4);
    assert_no_leaks(&channel);

    // Callbacks outlive the session but reserve nothing.
    channel.deliver(&frame(DataSource::ChromaLeft, 50));
    assert_no_leaks(&channel);
}

#[test]
fn test_partial_release_failure_still_counted() {
    let channel = Arc::new(MockChannel::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    let session = start_colour(&channel, Some(events.clone()));

    channel.deliver(&frame(DataSource::LumaLeft, 1));
    channel.deliver(&frame(DataSource::ChromaLeft, 1));
    channel.deliver(&frame(DataSource::LumaLeft, 2));
    channel.deliver(&frame(DataSource::Disparity, 1));

    channel.fail_next_release();
    let err = session.stop().unwrap_err();
    assert!(matches!(
        err,
        StereoSyncError::Pool(PoolError::ReleaseFailed { .. })
    ));

    let released = events.lock().iter().find_map(|e| match e {
        SyncEvent::ShutdownCompleted { handles_released } => Some(*handles_released),
        _ => None,
    });
    assert_eq!(released, Some(3));
    assert_eq!(channel.pool_stats().held, 1);
}

#[test]
fn test_drop_releases_all() {
    let channel = Arc::new(MockChannel::new());
    {
        let _session = start_colour(&channel, None);
        channel.deliver(&frame(DataSource::LumaLeft, 1));
        channel.deliver(&frame(DataSource::ChromaLeft, 1));
        channel.deliver(&frame(DataSource::Disparity, 1));
        assert_eq!(channel.pool_stats().held, 3);
    }
    assert_no_leaks(&channel);
}

#[test]
fn test_grey_sensor_runs_unpaired() {
    let channel = Arc::new(MockChannel::new().with_device_info(DeviceInfo {
        imager_kind: ImagerKind::Grey,
        ..Default::default()
    }));
    let setup = configure_sensor(channel.as_ref(), &SensorConfig::default(), None).unwrap();

    let session = StereoSync::builder()
        .add_pair("left", DataSource::LumaLeft, DataSource::ChromaLeft)
        .add_single("disparity", DataSource::Disparity)
        .pairing(setup.pairing)
        .start(channel.clone())
        .unwrap();
    assert!(!channel.streaming().contains(DataSource::ChromaLeft));

    for id in 0..3 {
        channel.deliver(&frame(DataSource::LumaLeft, id));
        let pair = session.accessor().matched_pair("left").unwrap();
        assert_eq!(pair.frame_id(), id);
        assert!(pair.second.is_none());
    }

    let stats = session.stop().unwrap();
    assert_eq!(stats.frames_promoted, 3);
    assert_no_leaks(&channel);
}

#[test]
fn test_concurrent_producers_never_mismatch() {
    const FRAMES: i64 = 2_000;

    let channel = Arc::new(MockChannel::new());
    let session = start_colour(&channel, None);
    let accessor = session.accessor();
    let done = Arc::new(AtomicBool::new(false));

    let producer = |source: DataSource, skip: i64| {
        let channel = channel.clone();
        thread::spawn(move || {
            for id in 0..FRAMES {
                if skip > 0 && id % skip == 0 {
                    continue;
                }
                channel.deliver(&frame(source, id));
            }
        })
    };

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let accessor = accessor.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut reads = 0u64;
                while !done.load(Ordering::SeqCst) {
                    if let Ok(pair) = accessor.matched_pair("left") {
                        let second = pair.second.expect("paired group");
                        assert_eq!(pair.first.frame_id, second.frame_id);
                        reads += 1;
                    }
                    if let Ok(disparity) = accessor.latest_single(DataSource::Disparity) {
                        assert!(!disparity.is_sentinel());
                    }
                }
                reads
            })
        })
        .collect();

    let producers = [
        producer(DataSource::LumaLeft, 0),
        producer(DataSource::ChromaLeft, 7),
        producer(DataSource::Disparity, 0),
    ];
    for handle in producers {
        handle.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    for reader in readers {
        reader.join().unwrap();
    }

    assert!(session.is_running(), "fault: {:?}", session.fault());
    let stats = session.stop().unwrap();
    assert_eq!(stats.frames_received as i64, FRAMES * 3 - (FRAMES + 6) / 7);
    assert_no_leaks(&channel);
}
