// libva driver
//
// Drives a real VA display opened on a DRM render node.
use super::ffi;
use super::{
    BufferId, ColorStandard, ConfigId, ContextId, ExternalBuffer, PipelineParams, SurfaceId,
    VaDriver, VaResult, VaStatus,
};
use crate::{Result, VaError};
use utils::log;

use libc::{c_int, c_void};
use std::cell::RefCell;
use std::collections::HashMap;
use std::mem;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::ptr;

/// A VA display for one GPU
pub struct LibVa {
    lv_display: ffi::VADisplay,
    /// The pipeline buffers point at their regions, which VA reads
    /// at render time. Keep them alive until the buffer is destroyed.
    lv_regions: RefCell<HashMap<ffi::VABufferID, Box<[ffi::VARectangle; 2]>>>,
}

// The display is only used by the thread that owns the LibVa
unsafe impl Send for LibVa {}

fn status(ret: ffi::VAStatus) -> VaResult<()> {
    VaStatus(ret).check()
}

fn color_standard(standard: ColorStandard) -> c_int {
    match standard {
        ColorStandard::None => ffi::VAProcColorStandardNone,
        ColorStandard::BT601 => ffi::VAProcColorStandardBT601,
        ColorStandard::BT709 => ffi::VAProcColorStandardBT709,
    }
}

impl LibVa {
    /// Get and initialize the VA display for a DRM fd
    pub fn open(gpu_fd: BorrowedFd<'_>) -> Result<LibVa> {
        let display = unsafe { ffi::vaGetDisplayDRM(gpu_fd.as_raw_fd()) };
        if display.is_null() {
            log::error!("vaGetDisplayDRM failed for fd {}", gpu_fd.as_raw_fd());
            return Err(VaError::INVALID_DISPLAY);
        }

        let (mut major, mut minor) = (0, 0);
        let ret = unsafe { ffi::vaInitialize(display, &mut major, &mut minor) };
        if ret != ffi::VA_STATUS_SUCCESS {
            log::error!("vaInitialize failed with status {:#x}", ret);
            unsafe { ffi::vaTerminate(display) };
            return Err(VaError::VA_STATUS(ret));
        }
        log::debug!("Initialized VA-API {}.{}", major, minor);

        Ok(LibVa {
            lv_display: display,
            lv_regions: RefCell::new(HashMap::new()),
        })
    }
}

impl Drop for LibVa {
    fn drop(&mut self) {
        unsafe {
            ffi::vaTerminate(self.lv_display);
        }
    }
}

impl VaDriver for LibVa {
    fn create_surface(&self, rt_format: u32, external: &ExternalBuffer<'_>) -> VaResult<SurfaceId> {
        let mut prime_fd = external.eb_fd.as_raw_fd() as libc::uintptr_t;
        let mut desc = ffi::VASurfaceAttribExternalBuffers {
            pixel_format: external.eb_pixel_format,
            width: external.eb_width,
            height: external.eb_height,
            data_size: 0,
            num_planes: external.eb_num_planes,
            pitches: external.eb_pitches,
            offsets: external.eb_offsets,
            buffers: &mut prime_fd,
            num_buffers: 1,
            flags: 0,
            private_data: ptr::null_mut(),
            va_reserved: [0; ffi::VA_PADDING_LOW],
        };

        let mut attribs = [
            ffi::VASurfaceAttrib {
                type_: ffi::VASurfaceAttribMemoryType,
                flags: ffi::VA_SURFACE_ATTRIB_SETTABLE,
                value: ffi::VAGenericValue {
                    type_: ffi::VAGenericValueTypeInteger,
                    value: ffi::VAGenericValueUnion {
                        i: ffi::VA_SURFACE_ATTRIB_MEM_TYPE_DRM_PRIME,
                    },
                },
            },
            ffi::VASurfaceAttrib {
                type_: ffi::VASurfaceAttribExternalBufferDescriptor,
                flags: ffi::VA_SURFACE_ATTRIB_SETTABLE,
                value: ffi::VAGenericValue {
                    type_: ffi::VAGenericValueTypePointer,
                    value: ffi::VAGenericValueUnion {
                        p: &mut desc as *mut _ as *mut c_void,
                    },
                },
            },
        ];

        let mut surface = ffi::VA_INVALID_ID;
        status(unsafe {
            ffi::vaCreateSurfaces(
                self.lv_display,
                rt_format,
                external.eb_width,
                external.eb_height,
                &mut surface,
                1,
                attribs.as_mut_ptr(),
                attribs.len() as u32,
            )
        })?;

        Ok(SurfaceId(surface))
    }

    fn destroy_surface(&self, surface: SurfaceId) {
        let mut id = surface.0;
        unsafe {
            ffi::vaDestroySurfaces(self.lv_display, &mut id, 1);
        }
    }

    fn create_config(&self, rt_format: u32) -> VaResult<ConfigId> {
        let mut attrib = ffi::VAConfigAttrib {
            type_: ffi::VAConfigAttribRTFormat,
            value: rt_format,
        };

        let mut config = ffi::VA_INVALID_ID;
        status(unsafe {
            ffi::vaCreateConfig(
                self.lv_display,
                ffi::VAProfileNone,
                ffi::VAEntrypointVideoProc,
                &mut attrib,
                1,
                &mut config,
            )
        })?;

        Ok(ConfigId(config))
    }

    fn destroy_config(&self, config: ConfigId) {
        unsafe {
            ffi::vaDestroyConfig(self.lv_display, config.0);
        }
    }

    fn create_context(
        &self,
        config: ConfigId,
        width: i32,
        height: i32,
        render_target: SurfaceId,
    ) -> VaResult<ContextId> {
        let mut target = render_target.0;
        let mut context = ffi::VA_INVALID_ID;
        status(unsafe {
            ffi::vaCreateContext(
                self.lv_display,
                config.0,
                width,
                height,
                0,
                &mut target,
                1,
                &mut context,
            )
        })?;

        Ok(ContextId(context))
    }

    fn destroy_context(&self, context: ContextId) {
        unsafe {
            ffi::vaDestroyContext(self.lv_display, context.0);
        }
    }

    fn create_pipeline_buffer(
        &self,
        context: ContextId,
        params: &PipelineParams,
    ) -> VaResult<BufferId> {
        let regions = Box::new([
            ffi::VARectangle {
                x: params.pp_surface_region.x,
                y: params.pp_surface_region.y,
                width: params.pp_surface_region.width,
                height: params.pp_surface_region.height,
            },
            ffi::VARectangle {
                x: params.pp_output_region.x,
                y: params.pp_output_region.y,
                width: params.pp_output_region.width,
                height: params.pp_output_region.height,
            },
        ]);

        let mut param: ffi::VAProcPipelineParameterBuffer = unsafe { mem::zeroed() };
        param.surface = params.pp_surface.0;
        param.surface_region = &regions[0];
        param.surface_color_standard = color_standard(params.pp_surface_color_standard);
        param.output_region = &regions[1];
        param.output_color_standard = color_standard(params.pp_output_color_standard);
        param.filters = ptr::null_mut();
        param.num_filters = 0;
        param.filter_flags = ffi::VA_FRAME_PICTURE;
        param.rotation_state = params.pp_rotation;
        param.mirror_state = params.pp_mirror;

        let mut buffer = ffi::VA_INVALID_ID;
        status(unsafe {
            ffi::vaCreateBuffer(
                self.lv_display,
                context.0,
                ffi::VAProcPipelineParameterBufferType,
                mem::size_of::<ffi::VAProcPipelineParameterBuffer>() as u32,
                1,
                &mut param as *mut _ as *mut c_void,
                &mut buffer,
            )
        })?;

        self.lv_regions.borrow_mut().insert(buffer, regions);
        Ok(BufferId(buffer))
    }

    fn destroy_buffer(&self, buffer: BufferId) {
        unsafe {
            ffi::vaDestroyBuffer(self.lv_display, buffer.0);
        }
        self.lv_regions.borrow_mut().remove(&buffer.0);
    }

    fn begin_picture(&self, context: ContextId, render_target: SurfaceId) -> VaResult<()> {
        status(unsafe { ffi::vaBeginPicture(self.lv_display, context.0, render_target.0) })
    }

    fn render_picture(&self, context: ContextId, buffer: BufferId) -> VaResult<()> {
        let mut id = buffer.0;
        status(unsafe { ffi::vaRenderPicture(self.lv_display, context.0, &mut id, 1) })
    }

    fn end_picture(&self, context: ContextId) -> VaResult<()> {
        status(unsafe { ffi::vaEndPicture(self.lv_display, context.0) })
    }

    fn sync_surface(&self, surface: SurfaceId) -> VaResult<()> {
        status(unsafe { ffi::vaSyncSurface(self.lv_display, surface.0) })
    }
}
