// An output surface for the video pipeline
//
// This is the destination of a draw: a buffer that has already been
// allocated (usually for a display plane) that the hardware writes
// the composited layer into.
use crate::buffer::Dmabuf;
use utils::region::Rect;

#[derive(Debug)]
pub struct OutputSurface {
    /// The buffer backing this surface
    os_buffer: Dmabuf,
}

impl OutputSurface {
    pub fn new(buffer: Dmabuf) -> Self {
        Self { os_buffer: buffer }
    }

    pub fn buffer(&self) -> &Dmabuf {
        &self.os_buffer
    }

    /// Swap in a new backing buffer, returning the old one
    pub fn replace_buffer(&mut self, buffer: Dmabuf) -> Dmabuf {
        std::mem::replace(&mut self.os_buffer, buffer)
    }

    pub fn width(&self) -> u32 {
        self.os_buffer.db_width
    }

    pub fn height(&self) -> u32 {
        self.os_buffer.db_height
    }

    /// The whole surface, which is what a draw covers
    pub fn full_region(&self) -> Rect<i32> {
        Rect::new(0, 0, self.width() as i32, self.height() as i32)
    }
}
