//! Mock stereo capture example.
//!
//! Drives a full session against `MockChannel`: luma, chroma and disparity
//! are produced on separate threads, chroma occasionally drops a frame, and a
//! consumer task prints every matched pair it observes.
//!
//! Run with: cargo run --example mock_stereo
//!
//! Set `RUST_LOG=stereo_sync=debug` to see every match.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stereo_sync::format::{disparity_to_f32, normalize_to_u8};
use stereo_sync::{
    configure_sensor, event_callback, DataSource, MockChannel, SensorConfig, StereoSync,
    SyncEvent,
};
use tracing_subscriber::EnvFilter;

const FRAMES: i64 = 90;
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("stereo_sync=info".parse()?))
        .init();

    let channel = Arc::new(MockChannel::new());

    let events = event_callback(|event| match event {
        SyncEvent::FrameDiscarded {
            group,
            data_source,
            frame_id,
        } => println!("[{group}] {data_source} frame {frame_id} dropped unmatched"),
        SyncEvent::ConfigWarning { setting, status } => {
            println!("warning: could not set {setting} ({status})");
        }
        other => println!("event: {other:?}"),
    });

    let setup = configure_sensor(channel.as_ref(), &SensorConfig::default(), Some(&events))?;
    println!(
        "Sensor '{}': {}x{} streaming {}",
        setup.device.name, setup.width, setup.height, setup.required_sources
    );

    let session = StereoSync::builder()
        .add_pair("left", DataSource::LumaLeft, DataSource::ChromaLeft)
        .add_single("disparity", DataSource::Disparity)
        .pairing(setup.pairing)
        .on_event({
            let events = events.clone();
            move |e| events(e)
        })
        .start(channel.clone())?;

    // Stand-ins for the channel's callback threads.
    let (width, height) = (setup.width, setup.height);
    let producers: Vec<_> = [
        (DataSource::LumaLeft, None),
        (DataSource::ChromaLeft, Some(11)),
        (DataSource::Disparity, None),
    ]
    .into_iter()
    .map(|(source, drop_every)| {
        let channel = channel.clone();
        thread::spawn(move || {
            for id in 0..FRAMES {
                if drop_every.is_some_and(|n| id % n == 5) {
                    continue;
                }
                channel.deliver(&MockChannel::synthetic_frame(source, id, width, height));
                thread::sleep(FRAME_INTERVAL);
            }
        })
    })
    .collect();

    // Consumer: wake on every publication and read the latest views.
    let consumer = {
        let accessor = session.accessor();
        let mut notices = session.subscribe();
        tokio::spawn(async move {
            while notices.changed().await.is_ok() {
                let Some(notice) = notices.borrow_and_update().clone() else {
                    continue;
                };
                if notice.group.as_str() == "left" {
                    if let Ok(pair) = accessor.matched_pair("left") {
                        println!(
                            "pair {:>3}: luma {} bytes, chroma {}",
                            pair.frame_id(),
                            pair.first.data.len(),
                            pair.second
                                .map_or_else(|| "none".to_string(), |c| format!("{} bytes", c.data.len()))
                        );
                    }
                } else if let Ok(disparity) = accessor.latest_single(DataSource::Disparity) {
                    let pixels = disparity_to_f32(&disparity.data);
                    let display = normalize_to_u8(&pixels);
                    let max = pixels.iter().copied().fold(0.0f32, f32::max);
                    println!(
                        "disparity {:>3}: max {max:.1}px, {} display pixels",
                        disparity.frame_id,
                        display.len()
                    );
                }
            }
        })
    };

    // Stop once every producer has delivered its last frame.
    let finished = {
        let shutdown = session.shutdown_handle();
        tokio::task::spawn_blocking(move || {
            for producer in producers {
                let _ = producer.join();
            }
            shutdown.shutdown();
        })
    };

    let result = session.run_until_shutdown().await;
    consumer.abort();
    finished.await?;

    let stats = session.stop()?;
    result?;

    println!();
    println!("Pairs matched:     {}", stats.pairs_matched);
    println!("Frames promoted:   {}", stats.frames_promoted);
    println!("Frames discarded:  {}", stats.frames_discarded);
    println!("Frames ignored:    {}", stats.frames_ignored);
    println!("Buffers released:  {}", stats.handles_released);

    let pool = channel.pool_stats();
    println!(
        "Pool: {} reserved, {} released, {} held",
        pool.reserved, pool.released, pool.held
    );

    Ok(())
}
