//! Presentation sink: engine readback to display surface.
//!
//! The display surface is an external collaborator that only knows how to be resized
//! and how to take an RGBA image at its origin. [`PresentationSink`] owns the
//! contract checks between the engine's buffer and that surface.

use crate::error::{RenderError, RenderResult};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Something that can show an RGBA8 image.
pub trait DisplaySurface: Send {
    /// Current surface size in pixels.
    fn size(&self) -> (u32, u32);

    /// Change the surface size. Existing contents are discarded.
    fn resize(&mut self, width: u32, height: u32);

    /// Write a row-major RGBA8 image of the given width at the origin.
    fn put_image(&mut self, rgba: &[u8], width: u32);
}

/// In-memory RGBA canvas.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    writes: u64,
}

impl MemorySurface {
    /// Blank surface of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; rgba_len(width, height)],
            writes: 0,
        }
    }

    /// Current contents.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Number of images written since creation.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Encode the current contents as PNG.
    pub fn save_png(&self, path: impl AsRef<Path>) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::Validation("surface is empty".into()));
        }
        image::save_buffer_with_format(
            path.as_ref(),
            &self.pixels,
            self.width,
            self.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )?;
        Ok(())
    }
}

impl DisplaySurface for MemorySurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(rgba_len(width, height), 0);
    }

    fn put_image(&mut self, rgba: &[u8], width: u32) {
        let n = rgba.len().min(self.pixels.len());
        if width == self.width {
            self.pixels[..n].copy_from_slice(&rgba[..n]);
        } else {
            // Narrower or wider image: clip row by row.
            let src_stride = width as usize * 4;
            let dst_stride = self.width as usize * 4;
            let row_bytes = src_stride.min(dst_stride);
            if row_bytes > 0 {
                for (src, dst) in rgba
                    .chunks_exact(src_stride)
                    .zip(self.pixels.chunks_exact_mut(dst_stride))
                {
                    dst[..row_bytes].copy_from_slice(&src[..row_bytes]);
                }
            }
        }
        self.writes += 1;
    }
}

/// [`MemorySurface`] shared between the render task and viewers.
#[derive(Debug, Clone, Default)]
pub struct SharedSurface(Arc<Mutex<MemorySurface>>);

impl SharedSurface {
    /// Blank shared surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self(Arc::new(Mutex::new(MemorySurface::new(width, height))))
    }

    /// Copy of the current surface.
    pub fn snapshot(&self) -> MemorySurface {
        self.0.lock().clone()
    }

    /// Encode the current contents as PNG.
    pub fn save_png(&self, path: impl AsRef<Path>) -> RenderResult<()> {
        self.0.lock().save_png(path)
    }
}

impl DisplaySurface for SharedSurface {
    fn size(&self) -> (u32, u32) {
        self.0.lock().size()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.0.lock().resize(width, height);
    }

    fn put_image(&mut self, rgba: &[u8], width: u32) {
        self.0.lock().put_image(rgba, width);
    }
}

/// Writes engine readbacks to a display surface.
pub struct PresentationSink {
    surface: Box<dyn DisplaySurface>,
    presented: u64,
}

impl PresentationSink {
    /// Sink over any surface.
    pub fn new(surface: impl DisplaySurface + 'static) -> Self {
        Self {
            surface: Box::new(surface),
            presented: 0,
        }
    }

    /// Resize the surface if it is not already `width` x `height`.
    ///
    /// Returns whether a resize happened.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.surface.size() == (width, height) {
            return false;
        }
        debug!(width, height, "Resizing display surface");
        self.surface.resize(width, height);
        true
    }

    /// Show one readback.
    ///
    /// # Errors
    ///
    /// `Presentation` if `buffer` is not exactly `width * height * 4` bytes. The
    /// surface is left untouched in that case.
    pub fn present(&mut self, buffer: &[u8], width: u32, height: u32) -> RenderResult<()> {
        let expected = rgba_len(width, height);
        if buffer.len() != expected {
            return Err(RenderError::Presentation {
                width,
                height,
                expected,
                actual: buffer.len(),
            });
        }
        self.resize(width, height);
        self.surface.put_image(buffer, width);
        self.presented += 1;
        Ok(())
    }

    /// Current surface size.
    pub fn surface_size(&self) -> (u32, u32) {
        self.surface.size()
    }

    /// Successful presents so far.
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl std::fmt::Debug for PresentationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationSink")
            .field("size", &self.surface.size())
            .field("presented", &self.presented)
            .finish()
    }
}

fn rgba_len(width: u32, height: u32) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(4)
}
