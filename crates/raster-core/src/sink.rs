//! The host collaborator every decoder in this workspace talks to (§6).
//!
//! The core never owns a buffer-allocation strategy of its own: scratch
//! memory is requested from and returned to the sink, and the final surface
//! is hand-delivered to it exactly once, on the success path only.

use crate::surface::NormalizedSurface;

/// Severity tier of a recoverable decode problem (§7).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorCategory {
    Truncated,
    Malformed,
    Unsupported,
    Policy,
}

pub trait ImageSink {
    /// Returns a zero-initialized buffer of the requested size, or `None` if
    /// the host declines (e.g. over its own budget).
    fn request_image_buffer(&mut self, bytes: usize) -> Option<Vec<u8>>;

    /// Releases a buffer obtained from `request_image_buffer`.
    fn free_image_buffer(&mut self, buffer: Vec<u8>);

    /// Hands over the decoded raster. Called at most once per successful
    /// decode, and is the last observable effect of that call.
    fn store_image(&mut self, surface: NormalizedSurface);

    /// Reports a recoverable format or policy violation.
    fn log_error(&mut self, text: &str, category: ErrorCategory);
}

/// RAII guard around a sink-provided scratch buffer.
///
/// Dropping the guard calls `free_image_buffer` exactly once, on every exit
/// path — success, early return, or `?` propagation alike — without the
/// decoder having to remember to do so manually.
pub struct ScratchBuffer<'s, S: ImageSink + ?Sized> {
    sink: &'s mut S,
    buffer: Option<Vec<u8>>,
}

impl<'s, S: ImageSink + ?Sized> ScratchBuffer<'s, S> {
    pub fn request(sink: &'s mut S, bytes: usize) -> Option<Self> {
        let buffer = sink.request_image_buffer(bytes)?;
        Some(ScratchBuffer {
            sink,
            buffer: Some(buffer),
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        self.buffer.as_deref().unwrap_or(&[])
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buffer.as_deref_mut().unwrap_or(&mut [])
    }

    /// Takes the buffer out without triggering the release callback,
    /// leaving the caller to do something else with its contents (e.g. copy
    /// it into a [`NormalizedSurface`] before the guard drops).
    pub fn into_inner(mut self) -> Vec<u8> {
        self.buffer.take().unwrap_or_default()
    }
}

impl<'s, S: ImageSink + ?Sized> Drop for ScratchBuffer<'s, S> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.sink.free_image_buffer(buffer);
        }
    }
}
