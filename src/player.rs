use crate::capture::{fourcc_to_string, Capture, Property};
use crate::{Error, Surface};
use log::{debug, trace, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Seek target in the media.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum Position {
    /// Position based on time.
    Time(Duration),
    /// Position based on nth frame.
    Frame(u32),
    /// Position as a fraction of the total duration.
    ///
    /// Not clamped up front; out of range values land on the nearest end.
    Ratio(f64),
}

impl From<Duration> for Position {
    fn from(t: Duration) -> Self {
        Position::Time(t)
    }
}

impl From<u32> for Position {
    fn from(f: u32) -> Self {
        Position::Frame(f)
    }
}

/// A single-stream playback cursor driven by the host's own tick.
///
/// The player owns its [`Capture`] exclusively and is move-only. Call
/// [`VideoPlayer::update`] once per host frame; when it returns `true` a new
/// frame is ready and [`VideoPlayer::create_surface`] will hand it out.
///
/// Dropping the player unloads it.
pub struct VideoPlayer<C: Capture> {
    capture: C,

    codec: String,
    file_path: PathBuf,
    size: (i32, i32),
    frame_rate: f64,
    frame_duration: f64,
    num_frames: u32,
    duration: f64,

    elapsed_frames: u32,
    elapsed_seconds: f64,
    position: f64,
    grab_time: Instant,

    speed: f32,
    looping: bool,
    playing: bool,
    loaded: bool,
}

impl<C: Capture> Drop for VideoPlayer<C> {
    fn drop(&mut self) {
        self.unload();
    }
}

impl<C: Capture + Default> Default for VideoPlayer<C> {
    fn default() -> Self {
        VideoPlayer::new(C::default())
    }
}

impl<C: Capture> VideoPlayer<C> {
    /// Creates an empty, unloaded player around a decode engine.
    ///
    /// Looping is on by default and the player starts paused.
    pub fn new(capture: C) -> Self {
        VideoPlayer {
            capture,

            codec: String::new(),
            file_path: PathBuf::new(),
            size: (0, 0),
            frame_rate: 0.0,
            frame_duration: 0.0,
            num_frames: 0,
            duration: 0.0,

            elapsed_frames: 0,
            elapsed_seconds: 0.0,
            position: 0.0,
            grab_time: Instant::now(),

            speed: 1.0,
            looping: true,
            playing: false,
            loaded: false,
        }
    }

    /// Sets if the media will loop or not.
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.set_looping(looping);
        self
    }

    /// Sets if the media is playing or not. See [`VideoPlayer::set_playing`].
    pub fn with_playing(mut self, playing: bool) -> Self {
        self.set_playing(playing);
        self
    }

    /// Sets the playback speed. See [`VideoPlayer::set_speed`].
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.set_speed(speed);
        self
    }

    /// Loads the media at `path`, unloading whatever was loaded before.
    ///
    /// On failure the player is left fully unloaded.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        self.unload();

        if let Err(err) = self.capture.open(path) {
            warn!("unable to load {}: {err}", path.display());
            self.capture.release();
            return Err(err);
        }
        if !self.capture.is_opened() {
            warn!("unable to load {}: decoder reports no open source", path.display());
            self.capture.release();
            return Err(Error::NotOpened);
        }

        self.codec = fourcc_to_string(self.capture.get(Property::FourCc) as i64 as u32);
        self.file_path = path.to_path_buf();
        self.frame_rate = self.capture.get(Property::Fps);
        self.num_frames = self.capture.get(Property::FrameCount) as u32;
        self.size = (
            self.capture.get(Property::FrameWidth) as i32,
            self.capture.get(Property::FrameHeight) as i32,
        );

        if self.frame_rate > 0.0 {
            self.duration = self.num_frames as f64 / self.frame_rate;
            self.frame_duration = 1.0 / self.frame_rate;
        }
        self.loaded = true;

        debug!(
            "loaded {}: codec {:?}, {:.3}s, {} fps, {} frames, {}x{}",
            path.display(),
            self.codec,
            self.duration,
            self.frame_rate,
            self.num_frames,
            self.size.0,
            self.size.1,
        );
        Ok(())
    }

    /// Rewinds to the start and begins playing.
    ///
    /// Always restarts from the beginning; use [`VideoPlayer::set_playing`] to
    /// resume from where playback was paused.
    pub fn play(&mut self) {
        if self.loaded {
            self.stop();
            self.playing = true;
        }
    }

    /// Jumps to `seconds`, clamped into `[0, duration]`.
    pub fn seek(&mut self, seconds: f64) {
        self.seek_at(seconds, Instant::now());
    }

    /// Seeks and restarts the frame interval at `now`.
    fn seek_at(&mut self, seconds: f64, now: Instant) {
        if !self.capture.is_opened() || !self.loaded {
            return;
        }

        let seconds = if seconds.is_nan() {
            0.0
        } else {
            seconds.clamp(0.0, self.duration)
        };
        let millis = seconds * 1000.0;
        if !self.capture.set(Property::PosMsec, millis) {
            warn!("decoder rejected seek to {millis:.1}ms");
        }

        self.grab_time = now;
        self.position = if self.duration > 0.0 {
            seconds / self.duration
        } else {
            0.0
        };
        self.elapsed_frames = (self.position * self.num_frames as f64) as u32;
        self.elapsed_seconds = millis * 0.001;
        trace!("seek to {seconds:.3}s (frame {})", self.elapsed_frames);
    }

    /// Jumps to the start of frame `frame`.
    pub fn seek_frame(&mut self, frame: u32) {
        self.seek(frame as f64 * self.frame_duration);
    }

    /// Jumps to `ratio` of the total duration.
    pub fn seek_position(&mut self, ratio: f32) {
        self.seek(ratio as f64 * self.duration);
    }

    /// Jumps to a specific position in the media.
    pub fn seek_to(&mut self, position: impl Into<Position>) {
        match position.into() {
            Position::Time(t) => self.seek(t.as_secs_f64()),
            Position::Frame(f) => self.seek_frame(f),
            Position::Ratio(r) => self.seek(r * self.duration),
        }
    }

    /// Pauses and rewinds to the start.
    pub fn stop(&mut self) {
        self.set_playing(false);
        self.seek(0.0);
    }

    /// Stops playback, releases the decoder and resets all metadata.
    ///
    /// Safe to call in any state; the player can be loaded again afterwards.
    pub fn unload(&mut self) {
        self.stop();
        if self.capture.is_opened() {
            self.capture.release();
        }
        if self.loaded {
            debug!("unloaded {}", self.file_path.display());
        }

        self.codec.clear();
        self.file_path = PathBuf::new();
        self.size = (0, 0);
        self.frame_rate = 0.0;
        self.frame_duration = 0.0;
        self.num_frames = 0;
        self.duration = 0.0;
        self.elapsed_frames = 0;
        self.elapsed_seconds = 0.0;
        self.position = 0.0;
        self.loaded = false;
    }

    /// Advances by at most one frame if enough time has passed since the last one.
    ///
    /// Returns `true` when a new frame was grabbed. Falling behind never makes
    /// this skip frames; playback slows down instead.
    pub fn update(&mut self) -> bool {
        self.update_at(Instant::now())
    }

    /// Same as [`VideoPlayer::update`], measuring elapsed time up to `now`.
    pub fn update_at(&mut self, now: Instant) -> bool {
        if !self.capture.is_opened()
            || !self.loaded
            || !self.playing
            || self.num_frames == 0
            || self.duration <= 0.0
        {
            return false;
        }

        let delta = now.saturating_duration_since(self.grab_time).as_secs_f64();
        let next_frame = self.capture.get(Property::PosFrames) as u32;
        let loop_pending = self.looping && next_frame == self.num_frames - 1;

        if delta < self.frame_duration / self.speed as f64 {
            return false;
        }
        if !self.capture.grab() {
            // the reported frame count can overshoot the stream, so the
            // last-frame check above never fires
            if self.looping && self.capture.is_end_of_stream() {
                trace!("end of stream before frame {next_frame}, looping");
                self.seek_at(0.0, now);
            } else {
                trace!("no frame to grab after frame {next_frame}");
            }
            return false;
        }

        // counts the frame just grabbed
        self.elapsed_frames = next_frame.saturating_add(1);
        self.elapsed_seconds = self.capture.get(Property::PosMsec) * 0.001;
        self.grab_time = now;
        self.position = self.capture.get(Property::PosRatio);
        if loop_pending {
            trace!("end of stream, looping");
            self.seek_at(0.0, now);
        }
        true
    }

    /// Returns the pixels of the last grabbed frame, if any.
    pub fn create_surface(&mut self) -> Option<Surface> {
        if !self.loaded {
            return None;
        }
        self.capture.retrieve()
    }

    /// Get the codec fourcc, empty when unknown or unloaded.
    pub fn codec(&self) -> &str {
        &self.codec
    }

    /// Get the media duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Get the number of frames played so far.
    pub fn elapsed_frames(&self) -> u32 {
        self.elapsed_frames
    }

    /// Get the current playback position in seconds.
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    /// Get the path of the loaded media, empty when unloaded.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Get the framerate of the video as frames per second.
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Get the total number of frames in the media.
    pub fn num_frames(&self) -> u32 {
        self.num_frames
    }

    /// Get the playback progress in `[0, 1]`.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Get the size/resolution of the video as `(width, height)`.
    pub fn size(&self) -> (i32, i32) {
        self.size
    }

    /// Get the current playback speed.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Get if a media is loaded or not.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Get if the media will loop or not.
    pub fn looping(&self) -> bool {
        self.looping
    }

    /// Get if the media is playing or not.
    pub fn playing(&self) -> bool {
        self.playing
    }

    /// Get the underlying decode engine.
    pub fn capture(&self) -> &C {
        &self.capture
    }

    /// Set if the media will loop or not.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Resumes (`true`) or pauses (`false`) playback without seeking.
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    /// Pauses (`true`) or resumes (`false`) playback without seeking.
    pub fn set_paused(&mut self, paused: bool) {
        self.set_playing(!paused);
    }

    /// Set the playback speed of the media.
    /// The default speed is `1.0`; zero, negative and NaN speeds reset it to `1.0`.
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = if speed > 0.0 { speed } else { 1.0 };
    }
}
