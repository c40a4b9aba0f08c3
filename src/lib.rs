mod capture;
mod gst_capture;
mod player;
mod surface;

use gstreamer as gst;
use thiserror::Error;

pub use capture::{fourcc, fourcc_to_string, Capture, Property};
pub use gst_capture::GstCapture;
pub use player::{Position, VideoPlayer};
pub use surface::Surface;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Glib(#[from] glib::Error),
    #[error("{0}")]
    Bool(#[from] glib::BoolError),
    #[error("{0}")]
    StateChange(#[from] gst::StateChangeError),
    #[error("failed to cast gstreamer element")]
    Cast,
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("invalid URI")]
    Uri,
    #[error("failed to get media capabilities")]
    Caps,
    #[error("invalid framerate: {0}")]
    Framerate(f64),
    #[error("decoder did not open the source")]
    NotOpened,
}
