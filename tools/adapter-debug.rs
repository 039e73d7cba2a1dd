//! Debug harness: runs the adapter server and loopback capture, printing
//! active-player snapshots and a smoothed spectrum peak to the log.
//!
//! `SOUNDRING_PORT` overrides the adapter port.

use futures::StreamExt;
use soundring::services::media::{Config, MediaService};
use soundring::services::spectrum::CaptureEngine;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,soundring=debug".into()),
        )
        .init();

    let port = std::env::var("SOUNDRING_PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(soundring::services::media::DEFAULT_PORT);

    let media = MediaService::start(Config {
        port,
        ..Config::default()
    })
    .await?;
    info!(addr = %media.local_addr(), "adapter server ready");

    let mut capture = CaptureEngine::new();
    if let Err(e) = capture.start() {
        warn!(error = %e, "running without spectrum capture");
    }

    let mut players = std::pin::pin!(media.updates_stream());
    let mut bands = std::pin::pin!(capture.bands_stream());

    // Exponential smoothing over the per-frame peak, the same blend a
    // visualizer front-end would apply.
    let mut smoothed_peak = 0.0f32;
    let mut frames: u64 = 0;

    loop {
        tokio::select! {
            Some(player) = players.next() => {
                info!(
                    player_id = player.id,
                    name = %player.name,
                    title = %player.title,
                    artist = %player.artist,
                    state = ?player.state,
                    position = player.position,
                    duration = player.duration,
                    "active player"
                );
            }
            Some(frame) = bands.next() => {
                let peak = frame.iter().copied().fold(0.0f32, f32::max);
                smoothed_peak = smoothed_peak * 0.8 + peak * 0.2;
                frames += 1;
                if frames % 60 == 0 {
                    info!(frames, peak = smoothed_peak, "spectrum");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    capture.stop();
    media.shutdown().await;
    Ok(())
}
