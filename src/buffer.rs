// Buffer facade
//
// An imported buffer is described by one dmabuf container fd plus
// per-plane pitch/offset. Allocating and importing the buffer from a
// platform handle is done elsewhere, through `BufferImporter`.
use crate::format;
use crate::Result;

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};

/// The most planes a buffer can have
pub const MAX_PLANES: usize = 4;

bitflags! {
    /// What kind of content a buffer holds
    #[derive(Default)]
    pub struct BufferUsage: u32 {
        const NORMAL = 0;
        const CURSOR = 1 << 0;
        const VIDEO = 1 << 1;
    }
}

/// One plane of a dmabuf
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DmabufPlane {
    pub db_offset: u32,
    pub db_stride: u32,
    pub db_mods: u64,
}

impl DmabufPlane {
    pub fn new(offset: u32, stride: u32, mods: u64) -> Self {
        Self {
            db_offset: offset,
            db_stride: stride,
            db_mods: mods,
        }
    }
}

/// The overall dmabuf tracking struct
///
/// This owns the container fd. All planes live in that one
/// container at different offsets.
#[derive(Debug)]
pub struct Dmabuf {
    pub db_fd: OwnedFd,
    pub db_width: u32,
    pub db_height: u32,
    /// DRM fourcc of the contents
    pub db_format: u32,
    pub db_usage: BufferUsage,

    /// The individual plane specifications
    pub db_planes: Vec<DmabufPlane>,
}

impl Dmabuf {
    pub fn new(fd: OwnedFd, width: u32, height: u32, format: u32) -> Self {
        Self {
            db_fd: fd,
            db_width: width,
            db_height: height,
            db_format: format,
            db_usage: BufferUsage::NORMAL,
            db_planes: Vec::with_capacity(1),
        }
    }

    /// Append a plane. Planes past `MAX_PLANES` are ignored.
    pub fn add_plane(&mut self, plane: DmabufPlane) {
        if self.db_planes.len() < MAX_PLANES {
            self.db_planes.push(plane);
        }
    }

    pub fn set_usage(&mut self, usage: BufferUsage) {
        self.db_usage = usage;
    }

    pub fn plane_count(&self) -> u32 {
        self.db_planes.len() as u32
    }

    pub fn pitches(&self) -> [u32; MAX_PLANES] {
        let mut ret = [0; MAX_PLANES];
        for (i, plane) in self.db_planes.iter().enumerate() {
            ret[i] = plane.db_stride;
        }
        ret
    }

    pub fn offsets(&self) -> [u32; MAX_PLANES] {
        let mut ret = [0; MAX_PLANES];
        for (i, plane) in self.db_planes.iter().enumerate() {
            ret[i] = plane.db_offset;
        }
        ret
    }

    pub fn is_video(&self) -> bool {
        self.db_usage.contains(BufferUsage::VIDEO)
    }

    pub fn is_cursor(&self) -> bool {
        self.db_usage.contains(BufferUsage::CURSOR)
    }

    /// Duplicate this buffer's description, with a new fd for the container
    pub fn try_clone(&self) -> Result<Dmabuf> {
        Ok(Dmabuf {
            db_fd: self.db_fd.try_clone()?,
            db_width: self.db_width,
            db_height: self.db_height,
            db_format: self.db_format,
            db_usage: self.db_usage,
            db_planes: self.db_planes.clone(),
        })
    }

    pub fn dump(&self) {
        utils::log::info!(
            "Buffer: fd {} {}x{} format {} usage {:?}",
            self.db_fd.as_raw_fd(),
            self.db_width,
            self.db_height,
            format::fourcc_name(self.db_format),
            self.db_usage
        );
        for (i, plane) in self.db_planes.iter().enumerate() {
            utils::log::info!(
                "  plane {}: offset {} pitch {} modifier {:#x}",
                i,
                plane.db_offset,
                plane.db_stride,
                plane.db_mods
            );
        }
    }
}

impl AsFd for Dmabuf {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.db_fd.as_fd()
    }
}

/// Turns a platform buffer handle into a described dmabuf
///
/// This is provided by the buffer allocator of the platform.
pub trait BufferImporter {
    type Handle;

    fn import_buffer(&self, handle: &Self::Handle) -> Result<Dmabuf>;
}
