//! Where frames and audio go once the core has produced them.

use crate::error::RenderError;
use retro_core::types::Frame;
use retro_core::Viewport;

/// Output target driven by the session on the frame thread.
pub trait RenderSink {
    /// Draw `frame` into `viewport`. Never called with an empty viewport.
    fn present(&mut self, frame: &Frame, viewport: Viewport) -> Result<(), RenderError>;

    /// Queue interleaved stereo samples. The default discards them.
    fn queue_audio(&mut self, _samples: &[i16]) {}

    /// The surface went to the background; stop using GPU resources.
    fn suspend(&mut self) {}

    fn resume(&mut self) {}

    /// Free every resource held for presentation. Called once at teardown.
    fn release(&mut self) {}
}

/// Sink that keeps only the last frame, for headless runs and tests.
#[derive(Debug, Default)]
pub struct NullSink {
    pub last_frame: Option<Frame>,
    pub last_viewport: Option<Viewport>,
    pub frames_presented: u64,
    pub samples_queued: u64,
    pub suspended: bool,
    pub released: bool,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderSink for NullSink {
    fn present(&mut self, frame: &Frame, viewport: Viewport) -> Result<(), RenderError> {
        if self.released {
            return Err(RenderError::SurfaceLost);
        }
        self.last_frame = Some(frame.clone());
        self.last_viewport = Some(viewport);
        self.frames_presented += 1;
        Ok(())
    }

    fn queue_audio(&mut self, samples: &[i16]) {
        self.samples_queued += samples.len() as u64;
    }

    fn suspend(&mut self) {
        self.suspended = true;
    }

    fn resume(&mut self) {
        self.suspended = false;
    }

    fn release(&mut self) {
        self.last_frame = None;
        self.released = true;
    }
}

impl<S: RenderSink + ?Sized> RenderSink for Box<S> {
    fn present(&mut self, frame: &Frame, viewport: Viewport) -> Result<(), RenderError> {
        (**self).present(frame, viewport)
    }

    fn queue_audio(&mut self, samples: &[i16]) {
        (**self).queue_audio(samples)
    }

    fn suspend(&mut self) {
        (**self).suspend()
    }

    fn resume(&mut self) {
        (**self).resume()
    }

    fn release(&mut self) {
        (**self).release()
    }
}
