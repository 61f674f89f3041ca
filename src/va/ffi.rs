// Raw libva bindings
//
// Only the entry points and structs used by the VPP path. Layouts
// follow va.h/va_vpp.h from libva 2.x.
#![allow(non_snake_case, non_upper_case_globals, dead_code)]
use libc::{c_int, c_uint, c_void};

pub type VADisplay = *mut c_void;
pub type VAStatus = c_int;
pub type VAGenericID = c_uint;
pub type VASurfaceID = VAGenericID;
pub type VAConfigID = VAGenericID;
pub type VAContextID = VAGenericID;
pub type VABufferID = VAGenericID;

pub const VA_STATUS_SUCCESS: VAStatus = 0;
pub const VA_INVALID_ID: VAGenericID = 0xffff_ffff;

pub const VAProfileNone: c_int = -1;
pub const VAEntrypointVideoProc: c_int = 10;
pub const VAConfigAttribRTFormat: c_int = 0;
pub const VAProcPipelineParameterBufferType: c_int = 41;

pub const VASurfaceAttribMemoryType: c_int = 6;
pub const VASurfaceAttribExternalBufferDescriptor: c_int = 7;
pub const VAGenericValueTypeInteger: c_int = 1;
pub const VAGenericValueTypePointer: c_int = 3;
pub const VA_SURFACE_ATTRIB_SETTABLE: u32 = 0x0000_0002;
pub const VA_SURFACE_ATTRIB_MEM_TYPE_DRM_PRIME: i32 = 0x2000_0000;

pub const VA_FRAME_PICTURE: u32 = 0x0000_0000;
pub const VAProcColorStandardNone: c_int = 0;
pub const VAProcColorStandardBT601: c_int = 1;
pub const VAProcColorStandardBT709: c_int = 2;

pub const VA_PADDING_LOW: usize = 4;
pub const VA_PADDING_LARGE: usize = 32;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct VARectangle {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct VAConfigAttrib {
    pub type_: c_int,
    pub value: u32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union VAGenericValueUnion {
    pub i: i32,
    pub f: f32,
    pub p: *mut c_void,
    pub func: Option<unsafe extern "C" fn()>,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct VAGenericValue {
    pub type_: c_int,
    pub value: VAGenericValueUnion,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct VASurfaceAttrib {
    pub type_: c_int,
    pub flags: u32,
    pub value: VAGenericValue,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct VASurfaceAttribExternalBuffers {
    pub pixel_format: u32,
    pub width: u32,
    pub height: u32,
    pub data_size: u32,
    pub num_planes: u32,
    pub pitches: [u32; 4],
    pub offsets: [u32; 4],
    pub buffers: *mut libc::uintptr_t,
    pub num_buffers: u32,
    pub flags: u32,
    pub private_data: *mut c_void,
    pub va_reserved: [u32; VA_PADDING_LOW],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct VAProcColorProperties {
    pub chroma_sample_location: u8,
    pub color_range: u8,
    pub colour_primaries: u8,
    pub transfer_characteristics: u8,
    pub matrix_coefficients: u8,
    pub reserved: [u8; 3],
}

#[cfg(target_pointer_width = "64")]
const PIPELINE_RESERVED: usize = VA_PADDING_LARGE - 16;
#[cfg(not(target_pointer_width = "64"))]
const PIPELINE_RESERVED: usize = VA_PADDING_LARGE - 13;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct VAProcPipelineParameterBuffer {
    pub surface: VASurfaceID,
    pub surface_region: *const VARectangle,
    pub surface_color_standard: c_int,
    pub output_region: *const VARectangle,
    pub output_background_color: u32,
    pub output_color_standard: c_int,
    pub pipeline_flags: u32,
    pub filter_flags: u32,
    pub filters: *mut VABufferID,
    pub num_filters: u32,
    pub forward_references: *mut VASurfaceID,
    pub num_forward_references: u32,
    pub backward_references: *mut VASurfaceID,
    pub num_backward_references: u32,
    pub rotation_state: u32,
    pub blend_state: *const c_void,
    pub mirror_state: u8,
    pub additional_outputs: *mut VASurfaceID,
    pub num_additional_outputs: u32,
    pub input_surface_flag: u32,
    pub output_surface_flag: u32,
    pub input_color_properties: VAProcColorProperties,
    pub output_color_properties: VAProcColorProperties,
    pub processing_mode: c_int,
    pub output_hdr_metadata: *mut c_void,
    pub va_reserved: [u32; PIPELINE_RESERVED],
}

extern "C" {
    pub fn vaGetDisplayDRM(fd: c_int) -> VADisplay;
    pub fn vaInitialize(dpy: VADisplay, major: *mut c_int, minor: *mut c_int) -> VAStatus;
    pub fn vaTerminate(dpy: VADisplay) -> VAStatus;

    pub fn vaCreateSurfaces(
        dpy: VADisplay,
        format: c_uint,
        width: c_uint,
        height: c_uint,
        surfaces: *mut VASurfaceID,
        num_surfaces: c_uint,
        attrib_list: *mut VASurfaceAttrib,
        num_attribs: c_uint,
    ) -> VAStatus;
    pub fn vaDestroySurfaces(dpy: VADisplay, surfaces: *mut VASurfaceID, num: c_int) -> VAStatus;

    pub fn vaCreateConfig(
        dpy: VADisplay,
        profile: c_int,
        entrypoint: c_int,
        attrib_list: *mut VAConfigAttrib,
        num_attribs: c_int,
        config_id: *mut VAConfigID,
    ) -> VAStatus;
    pub fn vaDestroyConfig(dpy: VADisplay, config_id: VAConfigID) -> VAStatus;

    pub fn vaCreateContext(
        dpy: VADisplay,
        config_id: VAConfigID,
        picture_width: c_int,
        picture_height: c_int,
        flag: c_int,
        render_targets: *mut VASurfaceID,
        num_render_targets: c_int,
        context: *mut VAContextID,
    ) -> VAStatus;
    pub fn vaDestroyContext(dpy: VADisplay, context: VAContextID) -> VAStatus;

    pub fn vaCreateBuffer(
        dpy: VADisplay,
        context: VAContextID,
        type_: c_int,
        size: c_uint,
        num_elements: c_uint,
        data: *mut c_void,
        buf_id: *mut VABufferID,
    ) -> VAStatus;
    pub fn vaDestroyBuffer(dpy: VADisplay, buf_id: VABufferID) -> VAStatus;

    pub fn vaBeginPicture(
        dpy: VADisplay,
        context: VAContextID,
        render_target: VASurfaceID,
    ) -> VAStatus;
    pub fn vaRenderPicture(
        dpy: VADisplay,
        context: VAContextID,
        buffers: *mut VABufferID,
        num_buffers: c_int,
    ) -> VAStatus;
    pub fn vaEndPicture(dpy: VADisplay, context: VAContextID) -> VAStatus;
    pub fn vaSyncSurface(dpy: VADisplay, render_target: VASurfaceID) -> VAStatus;
}
