use crate::capture::{fourcc, Capture, Property};
use crate::{Error, Surface};
use gstreamer as gst;
use gstreamer_app as gst_app;
use gstreamer_app::prelude::*;
use log::{debug, error, warn};
use std::path::Path;
use std::time::Duration;

const APP_SINK_NAME: &str = "gst_frame_player";

struct Internal {
    bus: gst::Bus,
    source: gst::Pipeline,
    app_sink: gst_app::AppSink,

    width: i32,
    height: i32,
    framerate: f64,
    duration: Duration,
    fourcc: u32,

    sample: Option<gst::Sample>,
    position: Duration,
    next_frame: u64,
}

impl Internal {
    fn frame_count(&self) -> u64 {
        (self.duration.as_secs_f64() * self.framerate).round() as u64
    }

    fn seek(&mut self, target: Duration) -> bool {
        let target = target.min(self.duration);
        if let Err(err) = self.source.seek_simple(
            gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE,
            gst::ClockTime::from_nseconds(target.as_nanos() as u64),
        ) {
            warn!("seek to {target:?} failed: {err}");
            return false;
        }
        self.sample = None;
        self.position = target;
        self.next_frame = (target.as_secs_f64() * self.framerate).round() as u64;
        true
    }

    fn drain_bus(&self) {
        for msg in self.bus.iter() {
            if let gst::MessageView::Error(err) = msg.view() {
                error!("bus returned an error: {err}");
            }
        }
    }
}

/// A [`Capture`] backed by a GStreamer `playbin` feeding an `appsink`.
///
/// The sink does not sync to the pipeline clock and holds a single buffer, so
/// decoding only moves forward when [`Capture::grab`] pulls a frame.
pub struct GstCapture {
    inner: Option<Internal>,
    pull_timeout: Duration,
}

impl Default for GstCapture {
    fn default() -> Self {
        GstCapture::new()
    }
}

impl Drop for GstCapture {
    fn drop(&mut self) {
        self.release();
    }
}

impl GstCapture {
    pub fn new() -> Self {
        GstCapture {
            inner: None,
            pull_timeout: Duration::from_millis(100),
        }
    }

    /// Sets how long a single grab waits for the decoder before giving up.
    pub fn pull_timeout(mut self, pull_timeout: Duration) -> Self {
        self.pull_timeout = pull_timeout;
        self
    }

    /// Get the underlying GStreamer pipeline, if a source is open.
    pub fn pipeline(&self) -> Option<gst::Pipeline> {
        self.inner.as_ref().map(|inner| inner.source.clone())
    }

    fn build(uri: &url::Url) -> Result<Internal, Error> {
        let pipeline = format!("playbin uri=\"{}\" flags=video video-sink=\"videoconvert ! videoscale ! appsink name={APP_SINK_NAME} sync=false max-buffers=1 caps=video/x-raw,format=RGBA,pixel-aspect-ratio=1/1\"", uri.as_str());
        let pipeline = gst::parse::launch(pipeline.as_ref())?
            .downcast::<gst::Pipeline>()
            .map_err(|_| Error::Cast)?;

        let video_sink: gst::Element = pipeline.property("video-sink");
        let pad = video_sink.pads().first().cloned().ok_or(Error::Cast)?;
        let pad = pad
            .dynamic_cast::<gst::GhostPad>()
            .map_err(|_| Error::Cast)?;
        let bin = pad
            .parent_element()
            .ok_or(Error::Cast)?
            .downcast::<gst::Bin>()
            .map_err(|_| Error::Cast)?;
        let app_sink = bin
            .by_name(APP_SINK_NAME)
            .ok_or(Error::Cast)?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| Error::Cast)?;

        match Self::preroll(&pipeline, app_sink) {
            Ok(internal) => Ok(internal),
            Err(err) => {
                let _ = pipeline.set_state(gst::State::Null);
                Err(err)
            }
        }
    }

    fn preroll(pipeline: &gst::Pipeline, app_sink: gst_app::AppSink) -> Result<Internal, Error> {
        pipeline.set_state(gst::State::Playing)?;

        // wait for up to 5 seconds until the decoder gets the source capabilities
        pipeline.state(gst::ClockTime::from_seconds(5)).0?;

        let pad = app_sink.static_pad("sink").ok_or(Error::Caps)?;
        let caps = pad.current_caps().ok_or(Error::Caps)?;
        let s = caps.structure(0).ok_or(Error::Caps)?;
        let width = s.get::<i32>("width").map_err(|_| Error::Caps)?;
        let height = s.get::<i32>("height").map_err(|_| Error::Caps)?;
        let framerate = s
            .get::<gst::Fraction>("framerate")
            .map_err(|_| Error::Caps)?;
        // variable framerate streams report 0/1
        let framerate = if framerate.denom() == 0 {
            0.0
        } else {
            framerate.numer() as f64 / framerate.denom() as f64
        };
        if framerate.is_nan() || framerate.is_infinite() || framerate < 0.0 {
            return Err(Error::Framerate(framerate));
        }

        let duration = Duration::from_nanos(
            pipeline
                .query_duration::<gst::ClockTime>()
                .map(|duration| duration.nseconds())
                .unwrap_or(0),
        );

        Ok(Internal {
            bus: pipeline.bus().ok_or(Error::Cast)?,
            source: pipeline.clone(),
            app_sink,

            width,
            height,
            framerate,
            duration,
            fourcc: decoder_fourcc(pipeline),

            sample: None,
            position: Duration::ZERO,
            next_frame: 0,
        })
    }
}

impl Capture for GstCapture {
    fn open(&mut self, path: &Path) -> Result<(), Error> {
        self.release();
        gst::init()?;

        let path = path.canonicalize()?;
        let uri = url::Url::from_file_path(&path).map_err(|_| Error::Uri)?;
        let inner = Self::build(&uri)?;
        debug!(
            "opened {uri}: {}x{} @ {:.3} fps, {:?}",
            inner.width, inner.height, inner.framerate, inner.duration
        );
        self.inner = Some(inner);
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.inner.is_some()
    }

    fn get(&self, property: Property) -> f64 {
        let Some(inner) = &self.inner else {
            return 0.0;
        };
        match property {
            Property::FourCc => inner.fourcc as f64,
            Property::Fps => inner.framerate,
            Property::FrameCount => inner.frame_count() as f64,
            Property::FrameWidth => inner.width as f64,
            Property::FrameHeight => inner.height as f64,
            Property::PosMsec => inner.position.as_secs_f64() * 1000.0,
            Property::PosRatio => {
                if inner.duration.is_zero() {
                    0.0
                } else {
                    (inner.position.as_secs_f64() / inner.duration.as_secs_f64()).min(1.0)
                }
            }
            Property::PosFrames => inner.next_frame as f64,
        }
    }

    fn set(&mut self, property: Property, value: f64) -> bool {
        let Some(inner) = self.inner.as_mut() else {
            return false;
        };
        if !value.is_finite() {
            return false;
        }
        let value = value.max(0.0);
        let target = match property {
            Property::PosMsec => {
                Duration::try_from_secs_f64(value * 0.001).unwrap_or(inner.duration)
            }
            Property::PosRatio => inner.duration.mul_f64(value.min(1.0)),
            Property::PosFrames if inner.framerate > 0.0 => {
                Duration::try_from_secs_f64(value / inner.framerate).unwrap_or(inner.duration)
            }
            _ => return false,
        };
        inner.seek(target)
    }

    fn grab(&mut self) -> bool {
        let timeout = gst::ClockTime::from_mseconds(self.pull_timeout.as_millis() as u64);
        let Some(inner) = self.inner.as_mut() else {
            return false;
        };
        inner.drain_bus();

        let Some(sample) = inner.app_sink.try_pull_sample(timeout) else {
            return false;
        };
        match sample.buffer().and_then(|buffer| buffer.pts()) {
            Some(pts) => {
                inner.position = Duration::from_nanos(pts.nseconds());
                inner.next_frame =
                    (inner.position.as_secs_f64() * inner.framerate).round() as u64 + 1;
            }
            None => inner.next_frame += 1,
        }
        inner.sample = Some(sample);
        true
    }

    fn is_end_of_stream(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.app_sink.is_eos())
    }

    fn retrieve(&mut self) -> Option<Surface> {
        let sample = self.inner.as_ref()?.sample.as_ref()?;
        let caps = sample.caps()?;
        let s = caps.structure(0)?;
        let width = s.get::<i32>("width").ok()?;
        let height = s.get::<i32>("height").ok()?;

        let buffer = sample.buffer()?;
        let map = buffer.map_readable().ok()?;
        Surface::from_rgba(width as u32, height as u32, map.as_slice().to_vec())
    }

    fn release(&mut self) {
        if let Some(inner) = self.inner.take() {
            if let Err(err) = inner.source.set_state(gst::State::Null) {
                error!("failed to stop pipeline: {err}");
            }
        }
    }
}

/// Reads the codec off the sink caps of the first video decoder in `pipeline`.
fn decoder_fourcc(pipeline: &gst::Pipeline) -> u32 {
    let mut elements = pipeline.iterate_recurse();
    loop {
        match elements.next() {
            Ok(Some(element)) => {
                let is_video_decoder = element.factory().is_some_and(|factory| {
                    let klass = factory.klass();
                    klass.contains("Decoder") && klass.contains("Video")
                });
                if !is_video_decoder {
                    continue;
                }
                let code = element
                    .static_pad("sink")
                    .and_then(|pad| pad.current_caps())
                    .and_then(|caps| caps.structure(0).and_then(media_type_fourcc));
                if let Some(code) = code {
                    return code;
                }
            }
            Ok(None) => return 0,
            Err(gst::IteratorError::Resync) => elements.resync(),
            Err(gst::IteratorError::Error) => return 0,
        }
    }
}

fn media_type_fourcc(s: &gst::StructureRef) -> Option<u32> {
    let code = match s.name().as_str() {
        "video/x-h264" => b"avc1",
        "video/x-h265" => b"hvc1",
        "video/x-vp8" => b"VP80",
        "video/x-vp9" => b"VP90",
        "video/x-av1" => b"av01",
        "video/mpeg" if matches!(s.get::<i32>("mpegversion"), Ok(4)) => b"mp4v",
        "image/jpeg" => b"MJPG",
        _ => return None,
    };
    Some(fourcc(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unopened_capture_is_inert() {
        let mut capture = GstCapture::new().pull_timeout(Duration::from_millis(1));
        assert!(!capture.is_opened());
        assert_eq!(capture.get(Property::Fps), 0.0);
        assert!(!capture.set(Property::PosMsec, 10.0));
        assert!(!capture.grab());
        assert!(!capture.is_end_of_stream());
        assert!(capture.retrieve().is_none());
        assert!(capture.pipeline().is_none());
        capture.release();
    }

    #[test]
    fn maps_media_types() {
        gst::init().unwrap();
        let h264 = gst::Structure::new_empty("video/x-h264");
        assert_eq!(media_type_fourcc(&h264), Some(fourcc(b"avc1")));
        let mpeg4 = gst::Structure::builder("video/mpeg")
            .field("mpegversion", 4i32)
            .build();
        assert_eq!(media_type_fourcc(&mpeg4), Some(fourcc(b"mp4v")));
        let raw = gst::Structure::new_empty("video/x-raw");
        assert_eq!(media_type_fourcc(&raw), None);
    }
}
