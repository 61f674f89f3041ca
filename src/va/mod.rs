// The video processing hardware seam
//
// VaDriver is the small slice of VA-API that the renderer needs:
// import external surfaces, create a VideoProc config/context, submit
// one pipeline buffer and wait on the output. The renderer only talks
// to the hardware through this trait.
mod handle;
pub mod renderer;

#[cfg(feature = "libva")]
mod ffi;
#[cfg(feature = "libva")]
mod libva;

pub use handle::{Scoped, VaHandle};
#[cfg(feature = "libva")]
pub use libva::LibVa;
pub use renderer::VaRenderer;

use crate::buffer::MAX_PLANES;

use std::ops::BitOr;
use std::os::fd::BorrowedFd;

/// A VA status code, 0 is success
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct VaStatus(pub i32);

impl VaStatus {
    pub const SUCCESS: VaStatus = VaStatus(0);
    pub const ERROR_OPERATION_FAILED: VaStatus = VaStatus(0x0000_0001);
    pub const ERROR_ALLOCATION_FAILED: VaStatus = VaStatus(0x0000_0002);
    pub const ERROR_INVALID_DISPLAY: VaStatus = VaStatus(0x0000_0003);
    pub const ERROR_INVALID_CONFIG: VaStatus = VaStatus(0x0000_0004);
    pub const ERROR_INVALID_CONTEXT: VaStatus = VaStatus(0x0000_0005);
    pub const ERROR_INVALID_SURFACE: VaStatus = VaStatus(0x0000_0006);
    pub const ERROR_INVALID_BUFFER: VaStatus = VaStatus(0x0000_0007);
    pub const ERROR_UNSUPPORTED_RT_FORMAT: VaStatus = VaStatus(0x0000_0010);

    pub fn is_success(&self) -> bool {
        self.0 == 0
    }

    /// Convert a raw status into a Result
    pub fn check(self) -> std::result::Result<(), VaStatus> {
        match self.is_success() {
            true => Ok(()),
            false => Err(self),
        }
    }
}

impl BitOr for VaStatus {
    type Output = VaStatus;

    fn bitor(self, rhs: VaStatus) -> VaStatus {
        VaStatus(self.0 | rhs.0)
    }
}

/// Result type of a single driver call
pub type VaResult<T> = std::result::Result<T, VaStatus>;

macro_rules! define_va_id {
    ($name:ident) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);

        impl $name {
            /// VA_INVALID_ID
            pub const INVALID: $name = $name(0xffff_ffff);

            pub fn is_valid(&self) -> bool {
                *self != Self::INVALID
            }
        }
    };
}

define_va_id!(SurfaceId);
define_va_id!(ConfigId);
define_va_id!(ContextId);
define_va_id!(BufferId);

/// A rectangle in the pipeline's terms
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct VaRect {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

impl VaRect {
    pub fn new(x: i16, y: i16, width: u16, height: u16) -> Self {
        Self {
            x: x,
            y: y,
            width: width,
            height: height,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ColorStandard {
    None,
    BT601,
    BT709,
}

/// Description of an external dmabuf to import as a surface
#[derive(Debug, Copy, Clone)]
pub struct ExternalBuffer<'a> {
    /// VA fourcc, 0 if the format is not supported
    pub eb_pixel_format: u32,
    pub eb_width: u32,
    pub eb_height: u32,
    pub eb_num_planes: u32,
    pub eb_pitches: [u32; MAX_PLANES],
    pub eb_offsets: [u32; MAX_PLANES],
    /// The single dmabuf container holding every plane
    pub eb_fd: BorrowedFd<'a>,
}

/// The parameters of one video processing operation
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PipelineParams {
    pub pp_surface: SurfaceId,
    pub pp_surface_region: VaRect,
    pub pp_surface_color_standard: ColorStandard,
    pub pp_output_region: VaRect,
    pub pp_output_color_standard: ColorStandard,
    /// VA_ROTATION_* value
    pub pp_rotation: u32,
    /// VA_MIRROR_* bits
    pub pp_mirror: u8,
}

/// The hardware video processing interface
///
/// Calls take `&self` so that scoped handles can each hold a reference
/// to the driver while the draw continues. A driver is only ever used
/// from one thread at a time.
pub trait VaDriver: Send {
    /// Import an external buffer as a surface of the given render target class
    fn create_surface(&self, rt_format: u32, external: &ExternalBuffer<'_>) -> VaResult<SurfaceId>;
    fn destroy_surface(&self, surface: SurfaceId);

    /// Create a VideoProc config for the given render target class
    fn create_config(&self, rt_format: u32) -> VaResult<ConfigId>;
    fn destroy_config(&self, config: ConfigId);

    fn create_context(
        &self,
        config: ConfigId,
        width: i32,
        height: i32,
        render_target: SurfaceId,
    ) -> VaResult<ContextId>;
    fn destroy_context(&self, context: ContextId);

    fn create_pipeline_buffer(
        &self,
        context: ContextId,
        params: &PipelineParams,
    ) -> VaResult<BufferId>;
    fn destroy_buffer(&self, buffer: BufferId);

    fn begin_picture(&self, context: ContextId, render_target: SurfaceId) -> VaResult<()>;
    fn render_picture(&self, context: ContextId, buffer: BufferId) -> VaResult<()>;
    fn end_picture(&self, context: ContextId) -> VaResult<()>;

    /// Block until all work targeting `surface` has finished
    fn sync_surface(&self, surface: SurfaceId) -> VaResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_or() {
        let s = VaStatus::SUCCESS | VaStatus::ERROR_INVALID_CONTEXT | VaStatus::SUCCESS;
        assert!(!s.is_success());
        assert_eq!(s, VaStatus::ERROR_INVALID_CONTEXT);
        assert!(VaStatus::SUCCESS.check().is_ok());
        assert_eq!(VaStatus(7).check(), Err(VaStatus(7)));
    }

    #[test]
    fn invalid_ids() {
        assert!(!SurfaceId::INVALID.is_valid());
        assert!(SurfaceId(0).is_valid());
        assert!(!ContextId::INVALID.is_valid());
    }
}
