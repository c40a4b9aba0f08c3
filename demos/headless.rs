use gst_frame_player::{GstCapture, VideoPlayer};
use std::time::{Duration, Instant};

/// Plays a file once without a window, logging every frame that comes out.
///
/// Usage: `headless <path> [speed]`
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        log::error!("usage: headless <path> [speed]");
        std::process::exit(2);
    };
    let speed = args.next().and_then(|s| s.parse().ok()).unwrap_or(1.0);

    let mut player = VideoPlayer::new(GstCapture::new())
        .with_looping(false)
        .with_speed(speed);
    if let Err(err) = player.load(&path) {
        log::error!("unable to load movie: {err}");
        std::process::exit(1);
    }

    log::info!("{} loaded successfully", player.file_path().display());
    log::info!(" > Codec: {}", player.codec());
    log::info!(" > Duration: {:.3}s", player.duration());
    log::info!(" > FPS: {:.3}", player.frame_rate());
    log::info!(" > Num frames: {}", player.num_frames());
    log::info!(" > Size: {:?}", player.size());

    // give up if nothing arrives for a while (end of stream or a stuck decoder)
    let idle_limit = Duration::from_secs(2);
    let mut last_frame = Instant::now();

    player.play();
    while last_frame.elapsed() < idle_limit {
        if player.update() {
            last_frame = Instant::now();
            if let Some(surface) = player.create_surface() {
                log::info!(
                    "frame {:>5} @ {:>8.3}s ({:>5.1}%) {}x{}",
                    player.elapsed_frames(),
                    player.elapsed_seconds(),
                    player.position() * 100.0,
                    surface.width(),
                    surface.height(),
                );
            }
        } else {
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    player.unload();
}
